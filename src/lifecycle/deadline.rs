//! Stop deadlines.
//!
//! A [`Deadline`] bounds the graceful phase of a stop. It expires when its
//! instant passes or when any attached [`StopListener`] fires, whichever
//! comes first. The endpoint never arms a timer itself: it forwards the
//! deadline and the transport decides what to do when it expires.

use std::time::Duration;

use futures_util::future::select_all;
use tokio::time::Instant;

use crate::lifecycle::shutdown::StopListener;

/// Bound on how long a graceful stop may take.
#[derive(Debug, Clone, Default)]
pub struct Deadline {
    at: Option<Instant>,
    cancel: Vec<StopListener>,
}

impl Deadline {
    /// A deadline that never expires on its own.
    pub fn none() -> Self {
        Self::default()
    }

    /// Expire `timeout` from now.
    pub fn after(timeout: Duration) -> Self {
        Self::at(Instant::now() + timeout)
    }

    /// Expire at the given instant.
    pub fn at(at: Instant) -> Self {
        Self {
            at: Some(at),
            cancel: Vec::new(),
        }
    }

    /// Also expire when `listener` fires.
    pub fn or_cancelled(mut self, listener: StopListener) -> Self {
        self.cancel.push(listener);
        self
    }

    /// Whether the deadline has already expired.
    pub fn is_expired(&self) -> bool {
        self.at.is_some_and(|at| Instant::now() >= at)
            || self.cancel.iter().any(StopListener::is_stopping)
    }

    /// Time left before the instant passes.
    ///
    /// `None` when there is no instant. Cancellation is not reflected here.
    pub fn remaining(&self) -> Option<Duration> {
        self.at.map(|at| at.saturating_duration_since(Instant::now()))
    }

    /// Resolve once the deadline expires.
    pub async fn expired(&self) {
        let timer = async {
            match self.at {
                Some(at) => tokio::time::sleep_until(at).await,
                None => std::future::pending().await,
            }
        };

        let cancelled = async {
            if self.cancel.is_empty() {
                return std::future::pending().await;
            }
            let fired = self.cancel.iter().map(|listener| Box::pin(listener.fired()));
            select_all(fired).await;
        };

        tokio::select! {
            _ = timer => {}
            _ = cancelled => {}
        }
    }
}
