//! OS signal handling.
//!
//! SIGINT and SIGTERM both cancel the root lifecycle context. Signals after
//! the first are ignored; the shutdown deadline bounds how long we wait.

use tokio::task::JoinHandle;

use super::shutdown::{LifecycleContext, ShutdownCause};

/// Install signal handlers and cancel `ctx` on the first SIGINT/SIGTERM.
///
/// Returns the watcher task; it finishes once the context is canceled for
/// any reason.
pub fn spawn_signal_watcher(ctx: LifecycleContext) -> JoinHandle<()> {
    tokio::spawn(async move {
        tokio::select! {
            cause = wait_for_signal() => {
                tracing::warn!(signal = %cause, "Received signal, shutting down");
                ctx.cancel(cause);
            }
            _ = ctx.done() => {}
        }
    })
}

#[cfg(unix)]
async fn wait_for_signal() -> ShutdownCause {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = match signal(SignalKind::terminate()) {
        Ok(sig) => sig,
        Err(e) => {
            tracing::warn!(error = %e, "Failed to install SIGTERM handler, listening for SIGINT only");
            return wait_for_ctrl_c().await;
        }
    };

    tokio::select! {
        cause = wait_for_ctrl_c() => cause,
        _ = sigterm.recv() => ShutdownCause::Terminate,
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() -> ShutdownCause {
    wait_for_ctrl_c().await
}

async fn wait_for_ctrl_c() -> ShutdownCause {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to install Ctrl+C handler");
        // Without a handler only SIGTERM or an explicit stop can end the process.
        std::future::pending::<()>().await;
    }
    ShutdownCause::Interrupt
}
