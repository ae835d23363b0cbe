//! Root lifecycle context for the process.

use std::fmt;
use std::sync::{Arc, OnceLock};

use tokio_util::sync::CancellationToken;

/// Why the lifecycle context was canceled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownCause {
    /// SIGINT / Ctrl+C.
    Interrupt,
    /// SIGTERM.
    Terminate,
    /// Explicit stop request from inside the process.
    Requested,
}

impl fmt::Display for ShutdownCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShutdownCause::Interrupt => write!(f, "SIGINT"),
            ShutdownCause::Terminate => write!(f, "SIGTERM"),
            ShutdownCause::Requested => write!(f, "requested"),
        }
    }
}

/// A one-shot cancellation signal shared by every long-running task.
///
/// Cloning is cheap and every clone observes the same state. Cancellation is
/// idempotent: the first call records its cause, later calls change nothing.
#[derive(Debug, Clone, Default)]
pub struct LifecycleContext {
    token: CancellationToken,
    cause: Arc<OnceLock<ShutdownCause>>,
}

impl LifecycleContext {
    /// Create a new, live context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Cancel the context.
    ///
    /// Returns `true` only for the call that actually performed the
    /// cancellation.
    pub fn cancel(&self, cause: ShutdownCause) -> bool {
        if self.cause.set(cause).is_err() {
            return false;
        }
        tracing::info!(cause = %cause, "Lifecycle context canceled");
        self.token.cancel();
        true
    }

    /// Whether the context has been canceled.
    pub fn is_done(&self) -> bool {
        self.token.is_cancelled()
    }

    /// The cause recorded by the first cancellation, if any.
    pub fn cause(&self) -> Option<ShutdownCause> {
        self.cause.get().copied()
    }

    /// Wait until the context is canceled.
    pub async fn done(&self) {
        self.token.cancelled().await
    }

    /// A token that fires when this context is canceled, and that can also be
    /// canceled on its own without affecting the parent.
    pub fn child_token(&self) -> CancellationToken {
        self.token.child_token()
    }
}
