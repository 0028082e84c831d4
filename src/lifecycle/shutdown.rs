//! One-shot stop signalling.

use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::watch;

/// A one-shot "stopping" signal.
///
/// The flag flips from not-stopping to stopping at most once. Any number of
/// callers may [`trigger`](Self::trigger) it concurrently; only the first one
/// observes `true`. Listeners can poll the flag or await the flip.
#[derive(Debug)]
pub struct StopSignal {
    /// Test-and-set flag deciding who fired first.
    fired: AtomicBool,
    /// Fan-out to async observers.
    tx: watch::Sender<bool>,
}

impl StopSignal {
    /// Create a signal in the not-stopping state.
    pub fn new() -> Self {
        let (tx, _) = watch::channel(false);
        Self {
            fired: AtomicBool::new(false),
            tx,
        }
    }

    /// Fire the signal.
    ///
    /// Returns `true` if this call performed the transition, `false` if the
    /// signal had already fired.
    pub fn trigger(&self) -> bool {
        if self.fired.swap(true, Ordering::AcqRel) {
            return false;
        }
        self.tx.send_replace(true);
        true
    }

    /// Whether the signal has fired.
    pub fn is_triggered(&self) -> bool {
        self.fired.load(Ordering::Acquire)
    }

    /// Create a listener observing this signal.
    pub fn listener(&self) -> StopListener {
        StopListener {
            rx: self.tx.subscribe(),
        }
    }
}

impl Default for StopSignal {
    fn default() -> Self {
        Self::new()
    }
}

/// Read side of a [`StopSignal`].
#[derive(Debug, Clone)]
pub struct StopListener {
    rx: watch::Receiver<bool>,
}

impl StopListener {
    /// Whether the signal has fired.
    pub fn is_stopping(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolve once the signal fires.
    ///
    /// Never resolves if the signal is dropped without firing.
    pub async fn fired(&self) {
        let mut rx = self.rx.clone();
        let closed = rx.wait_for(|stopping| *stopping).await.is_err();
        if closed {
            std::future::pending::<()>().await;
        }
    }
}
