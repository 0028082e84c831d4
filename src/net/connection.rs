//! Connection identity and in-flight receive tracking.
//!
//! # Responsibilities
//! - Generate unique connection IDs for tracing
//! - Count receives currently inside the pipe
//! - Let a graceful stop wait for that count to reach zero

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::watch;

/// Global atomic counter for connection IDs.
/// Relaxed ordering is enough since we only need uniqueness.
static CONNECTION_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Unique identifier for a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Generate a new unique connection ID.
    pub fn new() -> Self {
        Self(CONNECTION_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Counts receives in flight so a stop can drain them.
///
/// The count lives in a watch channel so waiters wake on every change
/// instead of polling.
#[derive(Debug, Clone)]
pub struct ReceiveTracker {
    in_flight: Arc<watch::Sender<u64>>,
}

impl ReceiveTracker {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(0);
        Self {
            in_flight: Arc::new(tx),
        }
    }

    /// Record a receive entering the pipe. Returns a guard that decrements on drop.
    pub fn track(&self) -> ReceiveGuard {
        self.in_flight.send_modify(|n| *n += 1);
        ReceiveGuard {
            in_flight: Arc::clone(&self.in_flight),
        }
    }

    /// Current number of receives in flight.
    pub fn in_flight(&self) -> u64 {
        *self.in_flight.borrow()
    }

    /// Wait until no receive is in flight.
    pub async fn wait_idle(&self) {
        let mut rx = self.in_flight.subscribe();
        // The sender lives in `self`, so the channel cannot close here.
        let _ = rx.wait_for(|n| *n == 0).await;
    }
}

impl Default for ReceiveTracker {
    fn default() -> Self {
        Self::new()
    }
}

/// Guard for one in-flight receive.
#[derive(Debug)]
pub struct ReceiveGuard {
    in_flight: Arc<watch::Sender<u64>>,
}

impl Drop for ReceiveGuard {
    fn drop(&mut self) {
        self.in_flight.send_modify(|n| *n = n.saturating_sub(1));
    }
}
