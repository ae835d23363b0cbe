//! In-flight request tracking.
//!
//! The HTTP layer holds a [`RequestGuard`] for the lifetime of each request,
//! so the drain phase can report how much work is still outstanding.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::observability::metrics;

/// Global atomic counter for request sequence numbers.
/// Relaxed ordering is enough; we only need uniqueness.
static REQUEST_SEQ: AtomicU64 = AtomicU64::new(1);

/// Monotonic per-process request number, used in trace events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RequestSeq(u64);

impl RequestSeq {
    pub fn next() -> Self {
        Self(REQUEST_SEQ.fetch_add(1, Ordering::Relaxed))
    }
}

impl std::fmt::Display for RequestSeq {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "req-{}", self.0)
    }
}

/// Counts requests currently being served.
#[derive(Debug, Clone, Default)]
pub struct InFlightTracker {
    active: Arc<AtomicU64>,
}

impl InFlightTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a new request. The returned guard decrements on drop.
    pub fn track(&self) -> RequestGuard {
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        metrics::record_in_flight(now);
        RequestGuard {
            active: Arc::clone(&self.active),
            seq: RequestSeq::next(),
        }
    }

    pub fn active_count(&self) -> u64 {
        self.active.load(Ordering::SeqCst)
    }
}

/// Held while a request is in flight.
#[derive(Debug)]
pub struct RequestGuard {
    active: Arc<AtomicU64>,
    seq: RequestSeq,
}

impl RequestGuard {
    pub fn seq(&self) -> RequestSeq {
        self.seq
    }
}

impl Drop for RequestGuard {
    fn drop(&mut self) {
        let now = self.active.fetch_sub(1, Ordering::SeqCst) - 1;
        metrics::record_in_flight(now);
        tracing::trace!(request = %self.seq, "Request finished");
    }
}
