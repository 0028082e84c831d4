//! Built-in filters.

use std::sync::Arc;

use futures_util::future::{self, BoxFuture, FutureExt};
use tokio::sync::Semaphore;

use crate::endpoint::InputAddress;
use crate::lifecycle::StopListener;
use crate::observability::metrics;
use crate::pipeline::{Filter, Pipe, PipeError, ReceiveContext};

/// Rejects new contexts once the endpoint's stopping signal has fired.
///
/// Every started endpoint puts one of these in front of its consume pipe, so
/// a message the transport hands over after a stop request never reaches a
/// consumer.
pub struct StopGate {
    address: InputAddress,
    stopping: StopListener,
}

impl StopGate {
    pub fn new(address: InputAddress, stopping: StopListener) -> Self {
        Self { address, stopping }
    }
}

impl Filter for StopGate {
    fn send<'a>(
        &'a self,
        context: &'a mut ReceiveContext,
        next: &'a dyn Pipe,
    ) -> BoxFuture<'a, Result<(), PipeError>> {
        if self.stopping.is_stopping() {
            tracing::debug!(
                address = %self.address,
                message_id = %context.message_id(),
                "Rejecting message, endpoint is stopping"
            );
            return future::ready(Err(PipeError::Stopping(self.address.clone()))).boxed();
        }
        next.send(context)
    }
}

/// Logs each message and records message metrics.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogFilter;

impl Filter for LogFilter {
    fn send<'a>(
        &'a self,
        context: &'a mut ReceiveContext,
        next: &'a dyn Pipe,
    ) -> BoxFuture<'a, Result<(), PipeError>> {
        async move {
            let message_id = context.message_id();
            let address = context.input_address().clone();

            tracing::debug!(
                address = %address,
                message_id = %message_id,
                bytes = context.body().len(),
                "Dispatching message"
            );

            let result = next.send(context).await;
            let elapsed = context.elapsed();

            match &result {
                Ok(()) => {
                    tracing::trace!(message_id = %message_id, elapsed = ?elapsed, "Message consumed");
                    metrics::record_message(&address, "ok", elapsed);
                }
                Err(e) => {
                    tracing::warn!(message_id = %message_id, error = %e, "Message not consumed");
                    metrics::record_message(&address, e.kind(), elapsed);
                }
            }

            result
        }
        .boxed()
    }
}

/// Bounds how many contexts may be inside the rest of the pipe at once.
///
/// Callers beyond the limit wait for a slot.
#[derive(Debug, Clone)]
pub struct ConcurrencyLimit {
    permits: Arc<Semaphore>,
    max: usize,
}

impl ConcurrencyLimit {
    /// Allow at most `max` concurrent dispatches. A limit of zero is raised to one.
    pub fn new(max: usize) -> Self {
        let max = max.max(1);
        Self {
            permits: Arc::new(Semaphore::new(max)),
            max,
        }
    }

    pub fn max(&self) -> usize {
        self.max
    }

    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }
}

impl Filter for ConcurrencyLimit {
    fn send<'a>(
        &'a self,
        context: &'a mut ReceiveContext,
        next: &'a dyn Pipe,
    ) -> BoxFuture<'a, Result<(), PipeError>> {
        async move {
            let _permit = self
                .permits
                .acquire()
                .await
                .map_err(|_| PipeError::Rejected("concurrency limit closed".into()))?;
            next.send(context).await
        }
        .boxed()
    }
}
