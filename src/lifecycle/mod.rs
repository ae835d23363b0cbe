//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → cancel root LifecycleContext (shutdown.rs)
//!
//! Coordinator (coordinator.rs):
//!     start → accept path + cancellation watcher
//!     context canceled → arm deadline → stop accepting → drain → Stopped
//!     deadline fires first → ForcedExit
//! ```
//!
//! # Design Decisions
//! - Ordered shutdown: stop accept, drain, close
//! - Shutdown has timeout: forced exit after deadline
//! - Cancellation is one-shot; the first cause is kept for logging

pub mod coordinator;
pub mod shutdown;
pub mod signals;

pub use coordinator::{
    exit_process, FatalHandler, FatalReason, GracefulServer, Listener, ServerError, ServerState,
};
pub use shutdown::{LifecycleContext, ShutdownCause};
pub use signals::spawn_signal_watcher;
