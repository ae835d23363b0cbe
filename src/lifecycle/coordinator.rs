//! Graceful start/stop of a network listener.
//!
//! ```text
//!  Idle ──start──▶ Starting ──▶ Running ──ctx canceled / stop()──▶ Draining
//!                                                                    │
//!                                   drain finished before deadline ◀─┤
//!                                            │                       │
//!                                            ▼                       ▼
//!                                         Stopped              ForcedExit
//! ```
//!
//! A listener error at any point after `start` goes straight to ForcedExit.
//!
//! Two tasks run between `start` and `stop`: the accept path and the
//! cancellation watcher. Both are joined by `stop`. The deadline timer is
//! detached; if it fires, the process is terminating anyway.

use std::fmt;
use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::shutdown::LifecycleContext;
use crate::observability::metrics;

/// Something that accepts connections until told to stop.
///
/// `serve` must stop accepting as soon as `stop` is canceled, then return
/// once in-flight work has finished. Returning `Ok` means the listener was
/// closed as expected; any error is treated as fatal by the coordinator.
pub trait Listener: Send + 'static {
    fn local_addr(&self) -> io::Result<SocketAddr>;

    fn serve(self, stop: CancellationToken) -> impl Future<Output = io::Result<()>> + Send;
}

/// Observable state of a [`GracefulServer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerState {
    Idle,
    Starting,
    Running,
    Draining,
    Stopped,
    ForcedExit,
}

impl fmt::Display for ServerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ServerState::Idle => "idle",
            ServerState::Starting => "starting",
            ServerState::Running => "running",
            ServerState::Draining => "draining",
            ServerState::Stopped => "stopped",
            ServerState::ForcedExit => "forced-exit",
        };
        f.write_str(s)
    }
}

/// Errors returned to the caller of `start`/`stop`.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// `start` was called without a configured listener.
    #[error("a listener is required to start the server")]
    MissingListener,

    #[error("server is already started")]
    AlreadyStarted,

    /// One of the supervised tasks panicked or was aborted.
    #[error("server task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Conditions the process cannot recover from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FatalReason {
    /// The accept path ended with an error instead of a clean close.
    ListenerFailed(String),
    /// In-flight work did not finish within the grace period.
    DrainTimedOut(Duration),
}

impl fmt::Display for FatalReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FatalReason::ListenerFailed(e) => write!(f, "listener failed: {}", e),
            FatalReason::DrainTimedOut(grace) => {
                write!(f, "graceful shutdown timed out after {:?}, forcing exit", grace)
            }
        }
    }
}

/// Action taken on a [`FatalReason`].
pub type FatalHandler = Arc<dyn Fn(FatalReason) + Send + Sync>;

/// Log the reason and terminate the process.
pub fn exit_process(reason: FatalReason) {
    tracing::error!(reason = %reason, "Fatal server condition");
    std::process::exit(1);
}

/// Supervises a [`Listener`]: start, drain on cancellation, and force an exit
/// when draining overruns the grace period.
pub struct GracefulServer<L: Listener> {
    listener: Option<L>,
    local_addr: Option<SocketAddr>,
    grace_period: Duration,
    fatal: FatalHandler,
    state: watch::Sender<ServerState>,
    running: Option<Running>,
}

struct Running {
    stop: CancellationToken,
    accept: JoinHandle<()>,
    watcher: JoinHandle<()>,
}

impl<L: Listener> GracefulServer<L> {
    /// Wrap a listener. Passing `None` is allowed; `start` then reports
    /// [`ServerError::MissingListener`].
    pub fn new(listener: impl Into<Option<L>>, grace_period: Duration) -> Self {
        let listener = listener.into();
        let local_addr = listener.as_ref().and_then(|l| l.local_addr().ok());
        let (state, _) = watch::channel(ServerState::Idle);
        Self {
            listener,
            local_addr,
            grace_period,
            fatal: Arc::new(exit_process),
            state,
            running: None,
        }
    }

    /// Replace the default fatal action (log and `exit(1)`).
    pub fn with_fatal_handler<F>(mut self, handler: F) -> Self
    where
        F: Fn(FatalReason) + Send + Sync + 'static,
    {
        self.fatal = Arc::new(handler);
        self
    }

    pub fn state(&self) -> ServerState {
        *self.state.borrow()
    }

    /// Watch state transitions.
    pub fn subscribe(&self) -> watch::Receiver<ServerState> {
        self.state.subscribe()
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    pub fn grace_period(&self) -> Duration {
        self.grace_period
    }

    /// Start serving. Returns once the accept path and the cancellation
    /// watcher are spawned; serving failures after this point are fatal.
    pub fn start(&mut self, ctx: &LifecycleContext) -> Result<(), ServerError> {
        if self.running.is_some() {
            return Err(ServerError::AlreadyStarted);
        }
        let listener = self.listener.take().ok_or(ServerError::MissingListener)?;

        self.state.send_replace(ServerState::Starting);

        let stop = ctx.child_token();
        let drain = CancellationToken::new();
        let (drained_tx, drained_rx) = oneshot::channel::<()>();

        let accept = {
            let fatal = self.fatal.clone();
            let drain = drain.clone();
            let state = self.state.clone();
            tokio::spawn(async move {
                match listener.serve(drain).await {
                    Ok(()) => {
                        let _ = drained_tx.send(());
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "Listener terminated unexpectedly");
                        state.send_replace(ServerState::ForcedExit);
                        metrics::record_shutdown("listener_failed");
                        fatal(FatalReason::ListenerFailed(e.to_string()));
                    }
                }
            })
        };

        // The accept path may already have failed and published ForcedExit.
        self.state.send_if_modified(|s| {
            let starting = *s == ServerState::Starting;
            if starting {
                *s = ServerState::Running;
            }
            starting
        });
        tracing::info!(
            address = ?self.local_addr,
            grace_period = ?self.grace_period,
            "Server running"
        );

        let watcher = {
            let stop = stop.clone();
            let state = self.state.clone();
            let fatal = self.fatal.clone();
            let grace = self.grace_period;
            tokio::spawn(async move {
                stop.cancelled().await;

                // The listener already failed; nothing left to drain.
                if *state.borrow() == ServerState::ForcedExit {
                    return;
                }
                state.send_replace(ServerState::Draining);
                tracing::info!(grace_period = ?grace, "Draining in-flight requests");

                let deadline = Deadline::arm(grace, fatal, state.clone());
                drain.cancel();

                match drained_rx.await {
                    Ok(()) if deadline.disarm() => {
                        state.send_replace(ServerState::Stopped);
                        metrics::record_shutdown("clean");
                        tracing::info!("Server stopped");
                    }
                    Ok(()) => {
                        tracing::warn!("Drain finished after the deadline fired");
                    }
                    Err(_) => {
                        // Accept path failed; the fatal handler has already run.
                        deadline.disarm();
                    }
                }
            })
        };

        self.running = Some(Running {
            stop,
            accept,
            watcher,
        });
        Ok(())
    }

    /// Begin draining (if not already) and wait for both supervised tasks.
    ///
    /// A no-op when the server was never started or is already stopped.
    pub async fn stop(&mut self) -> Result<(), ServerError> {
        let Some(running) = self.running.take() else {
            return Ok(());
        };

        running.stop.cancel();
        let (accept, watcher) = tokio::join!(running.accept, running.watcher);
        accept?;
        watcher?;
        Ok(())
    }
}

/// A one-shot timer that forces an exit unless disarmed first.
struct Deadline {
    settled: Arc<AtomicBool>,
    cancel: CancellationToken,
}

impl Deadline {
    fn arm(grace: Duration, fatal: FatalHandler, state: watch::Sender<ServerState>) -> Self {
        let settled = Arc::new(AtomicBool::new(false));
        let cancel = CancellationToken::new();

        let timer_settled = settled.clone();
        let timer_cancel = cancel.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = tokio::time::sleep(grace) => {
                    if timer_settled
                        .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
                        .is_ok()
                    {
                        state.send_replace(ServerState::ForcedExit);
                        metrics::record_shutdown("forced");
                        fatal(FatalReason::DrainTimedOut(grace));
                    }
                }
                _ = timer_cancel.cancelled() => {}
            }
        });

        Self { settled, cancel }
    }

    /// Returns `false` if the timer already fired.
    fn disarm(&self) -> bool {
        let won = self
            .settled
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok();
        self.cancel.cancel();
        won
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::ShutdownCause;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Mutex;
    use tokio::net::TcpListener;

    /// Listener that takes `drain_time` to finish after being stopped.
    struct FakeListener {
        addr: SocketAddr,
        drain_time: Duration,
        fail_with: Option<io::ErrorKind>,
        serves: Arc<AtomicUsize>,
        stops: Arc<AtomicUsize>,
    }

    impl FakeListener {
        fn new(drain_time: Duration) -> Self {
            Self {
                addr: "127.0.0.1:0".parse().unwrap(),
                drain_time,
                fail_with: None,
                serves: Arc::new(AtomicUsize::new(0)),
                stops: Arc::new(AtomicUsize::new(0)),
            }
        }
    }

    impl Listener for FakeListener {
        fn local_addr(&self) -> io::Result<SocketAddr> {
            Ok(self.addr)
        }

        async fn serve(self, stop: CancellationToken) -> io::Result<()> {
            self.serves.fetch_add(1, Ordering::SeqCst);
            if let Some(kind) = self.fail_with {
                return Err(io::Error::new(kind, "accept failed"));
            }
            stop.cancelled().await;
            self.stops.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.drain_time).await;
            Ok(())
        }
    }

    fn recording_handler() -> (Arc<Mutex<Vec<FatalReason>>>, impl Fn(FatalReason) + Send + Sync) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        (seen, move |reason| sink.lock().unwrap().push(reason))
    }

    #[tokio::test]
    async fn stop_before_start_is_noop() {
        let listener = FakeListener::new(Duration::ZERO);
        let serves = listener.serves.clone();
        let mut server = GracefulServer::new(listener, Duration::from_secs(5));

        server.stop().await.unwrap();

        assert_eq!(server.state(), ServerState::Idle);
        assert_eq!(serves.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn start_without_listener_is_config_error() {
        let mut server = GracefulServer::<FakeListener>::new(None, Duration::from_secs(5));
        let ctx = LifecycleContext::new();

        let err = server.start(&ctx).unwrap_err();

        assert!(matches!(err, ServerError::MissingListener));
        assert_eq!(server.state(), ServerState::Idle);
        server.stop().await.unwrap();
    }

    #[tokio::test]
    async fn clean_stop_within_grace_period() {
        let (fatal, handler) = recording_handler();
        let listener = FakeListener::new(Duration::from_millis(20));
        let stops = listener.stops.clone();
        let mut server =
            GracefulServer::new(listener, Duration::from_secs(5)).with_fatal_handler(handler);
        let ctx = LifecycleContext::new();

        server.start(&ctx).unwrap();
        assert_eq!(server.state(), ServerState::Running);

        let started = std::time::Instant::now();
        server.stop().await.unwrap();

        assert!(started.elapsed() < Duration::from_secs(1));
        assert_eq!(server.state(), ServerState::Stopped);
        assert_eq!(stops.load(Ordering::SeqCst), 1);
        assert!(fatal.lock().unwrap().is_empty());

        // Second stop is a no-op.
        server.stop().await.unwrap();
    }

    #[tokio::test]
    async fn context_cancellation_drains_once() {
        let listener = FakeListener::new(Duration::ZERO);
        let stops = listener.stops.clone();
        let mut server = GracefulServer::new(listener, Duration::from_secs(5));
        let mut states = server.subscribe();
        let ctx = LifecycleContext::new();

        server.start(&ctx).unwrap();
        assert!(ctx.cancel(ShutdownCause::Terminate));
        assert!(!ctx.cancel(ShutdownCause::Interrupt));

        states
            .wait_for(|s| *s == ServerState::Stopped)
            .await
            .unwrap();
        server.stop().await.unwrap();

        assert_eq!(stops.load(Ordering::SeqCst), 1);
        assert_eq!(ctx.cause(), Some(ShutdownCause::Terminate));
    }

    #[tokio::test]
    async fn stop_does_not_cancel_root_context() {
        let mut server = GracefulServer::new(FakeListener::new(Duration::ZERO), Duration::from_secs(5));
        let ctx = LifecycleContext::new();

        server.start(&ctx).unwrap();
        server.stop().await.unwrap();

        assert!(!ctx.is_done());
    }

    #[tokio::test]
    async fn drain_overrun_forces_exit() {
        let (fatal, handler) = recording_handler();
        let grace = Duration::from_millis(50);
        let mut server = GracefulServer::new(FakeListener::new(Duration::from_secs(10)), grace)
            .with_fatal_handler(handler);
        let mut states = server.subscribe();
        let ctx = LifecycleContext::new();

        server.start(&ctx).unwrap();
        let started = std::time::Instant::now();
        ctx.cancel(ShutdownCause::Interrupt);

        tokio::time::timeout(
            Duration::from_secs(2),
            states.wait_for(|s| *s == ServerState::ForcedExit),
        )
        .await
        .expect("deadline should fire")
        .unwrap();

        let elapsed = started.elapsed();
        assert!(elapsed >= grace);
        assert!(elapsed < Duration::from_secs(2));
        assert_eq!(*fatal.lock().unwrap(), vec![FatalReason::DrainTimedOut(grace)]);
    }

    #[tokio::test]
    async fn listener_error_is_fatal() {
        let (fatal, handler) = recording_handler();
        let mut listener = FakeListener::new(Duration::ZERO);
        listener.fail_with = Some(io::ErrorKind::AddrInUse);
        let mut server =
            GracefulServer::new(listener, Duration::from_secs(5)).with_fatal_handler(handler);
        let ctx = LifecycleContext::new();
        let mut states = server.subscribe();

        server.start(&ctx).unwrap();
        tokio::time::timeout(
            Duration::from_secs(1),
            states.wait_for(|s| *s == ServerState::ForcedExit),
        )
        .await
        .unwrap()
        .unwrap();
        assert_eq!(fatal.lock().unwrap().len(), 1);

        server.stop().await.unwrap();

        assert_eq!(server.state(), ServerState::ForcedExit);
        let seen = fatal.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert!(matches!(seen[0], FatalReason::ListenerFailed(_)));
    }

    #[tokio::test]
    async fn start_twice_is_rejected() {
        let mut server = GracefulServer::new(FakeListener::new(Duration::ZERO), Duration::from_secs(5));
        let ctx = LifecycleContext::new();

        server.start(&ctx).unwrap();
        assert!(matches!(server.start(&ctx), Err(ServerError::AlreadyStarted)));
        server.stop().await.unwrap();
    }

    #[tokio::test]
    async fn reports_bound_address() {
        struct Tcp(TcpListener);
        impl Listener for Tcp {
            fn local_addr(&self) -> io::Result<SocketAddr> {
                self.0.local_addr()
            }
            async fn serve(self, stop: CancellationToken) -> io::Result<()> {
                stop.cancelled().await;
                Ok(())
            }
        }

        let tcp = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let expected = tcp.local_addr().unwrap();
        let server = GracefulServer::new(Tcp(tcp), Duration::from_secs(1));
        assert_eq!(server.local_addr(), Some(expected));
    }
}
