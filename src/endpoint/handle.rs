//! Lifecycle handle of a started endpoint.
//!
//! # States
//! ```text
//! Running ──stop/dispose──▶ Stopping ──transport released──▶ Stopped
//! ```
//!
//! The stopping signal fires before the transport is asked to stop, so
//! anything observing it (the stop gate in front of the consume pipe) sees
//! the flip before the transport starts draining.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use thiserror::Error;
use tokio::sync::watch;

use crate::endpoint::{InputAddress, ReceiveEndpoint};
use crate::lifecycle::{Deadline, StopListener, StopSignal};
use crate::observability::metrics;
use crate::transport::{ReceiveTransport, TransportError, TransportHandle};

/// Lifecycle state of an [`EndpointHandle`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandleState {
    /// Receiving; no stop requested.
    Running,
    /// Stop requested; the transport handle is not released yet.
    Stopping,
    /// The transport handle has been released.
    Stopped,
}

/// A stop did not complete cleanly.
///
/// The stopping signal is set regardless, so the endpoint accepts no new work.
/// Resource state is uncertain; [`EndpointHandle::dispose`] forces release.
#[derive(Debug, Clone, Error)]
pub enum StopError {
    #[error("transport for {address} failed to stop: {source}")]
    Transport {
        address: InputAddress,
        #[source]
        source: Arc<TransportError>,
    },

    #[error("stop of {address} was abandoned before the transport finished")]
    Abandoned { address: InputAddress },
}

impl StopError {
    pub fn transport_error(&self) -> Option<&TransportError> {
        match self {
            StopError::Transport { source, .. } => Some(source),
            StopError::Abandoned { .. } => None,
        }
    }
}

/// Who holds the transport handle.
enum Slot<H> {
    Held(H),
    /// Taken by the winning stop. A dispose arriving meanwhile leaves the
    /// release to that stop.
    Stopping { dispose_requested: bool },
    Released,
}

type Outcome = Option<Result<(), StopError>>;

/// Control over a started [`ReceiveEndpoint`].
///
/// All methods take `&self`; share the handle (e.g. in an `Arc`) to stop it
/// from several tasks. Only the first stop or dispose has effect on the
/// stopping signal, and the transport handle is stopped by one caller only.
#[must_use = "dropping the handle disposes the endpoint's transport"]
pub struct EndpointHandle<T: ReceiveTransport> {
    endpoint: ReceiveEndpoint<T>,
    stopping: StopSignal,
    /// Cuts an in-flight graceful stop short.
    force: StopSignal,
    slot: Mutex<Slot<T::Handle>>,
    outcome: watch::Sender<Outcome>,
}

impl<T: ReceiveTransport> EndpointHandle<T> {
    pub(crate) fn new(endpoint: ReceiveEndpoint<T>, stopping: StopSignal, transport: T::Handle) -> Self {
        let (outcome, _) = watch::channel(None);
        Self {
            endpoint,
            stopping,
            force: StopSignal::new(),
            slot: Mutex::new(Slot::Held(transport)),
            outcome,
        }
    }

    /// The endpoint this handle was started from.
    pub fn endpoint(&self) -> &ReceiveEndpoint<T> {
        &self.endpoint
    }

    pub fn state(&self) -> HandleState {
        if !self.stopping.is_triggered() {
            return HandleState::Running;
        }
        match *self.lock_slot() {
            Slot::Released => HandleState::Stopped,
            _ => HandleState::Stopping,
        }
    }

    /// Listener for the stopping signal.
    pub fn stopping(&self) -> StopListener {
        self.stopping.listener()
    }

    pub fn is_stopping(&self) -> bool {
        self.stopping.is_triggered()
    }

    /// Stop gracefully, letting the transport drain until `deadline`.
    ///
    /// Sets the stopping signal, then awaits the transport's own stop. Later
    /// or concurrent calls do not stop the transport again; they wait for
    /// the first stop and return its outcome.
    pub async fn stop(&self, deadline: Deadline) -> Result<(), StopError> {
        let address = self.endpoint.input_address();

        if !self.stopping.trigger() {
            tracing::debug!(address = %address, "Stop already requested, awaiting outcome");
            return self.outcome().await;
        }

        tracing::info!(
            address = %address,
            timeout = ?deadline.remaining(),
            "Stopping receive endpoint"
        );

        let Some(transport) = self.take_for_stop() else {
            // A dispose released the transport between our trigger and now.
            return self.outcome().await;
        };

        let mut in_flight = InFlight {
            owner: self,
            transport: Some(transport),
        };
        let deadline = deadline.or_cancelled(self.force.listener());
        let result = match in_flight.transport.as_mut() {
            Some(transport) => transport.stop(deadline).await,
            None => Ok(()),
        };
        let transport = in_flight.transport.take();

        let result = result.map_err(|source| StopError::Transport {
            address: address.clone(),
            source: Arc::new(source),
        });
        let result = self.settle(transport, result);

        match &result {
            Ok(()) => {
                tracing::info!(address = %address, "Receive endpoint stopped");
                metrics::record_stop(address, "ok");
            }
            Err(e) => {
                tracing::warn!(address = %address, error = %e, "Receive endpoint stop failed");
                metrics::record_stop(address, "error");
            }
        }

        self.publish(result)
    }

    /// Tear down immediately without waiting for in-flight work.
    ///
    /// Sets the stopping signal and releases the transport handle. If a
    /// graceful stop is in flight, its deadline is cut short and that stop
    /// performs the release; a dispose failure on that path is reported by
    /// [`stop`](Self::stop), not here. Repeated calls return `Ok(())`.
    pub fn dispose(&self) -> Result<(), StopError> {
        let address = self.endpoint.input_address();
        let first = self.stopping.trigger();
        self.force.trigger();

        let mut slot = self.lock_slot();
        match std::mem::replace(&mut *slot, Slot::Released) {
            Slot::Held(mut transport) => {
                drop(slot);
                tracing::info!(address = %address, first, "Disposing receive endpoint");

                let result = transport.dispose().map_err(|source| StopError::Transport {
                    address: address.clone(),
                    source: Arc::new(source),
                });
                drop(transport);

                if let Err(e) = &result {
                    tracing::warn!(address = %address, error = %e, "Transport dispose failed");
                }
                metrics::record_dispose(address);
                metrics::record_released(address);
                self.outcome.send_replace(Some(result.clone()));
                result
            }
            Slot::Stopping { .. } => {
                *slot = Slot::Stopping {
                    dispose_requested: true,
                };
                drop(slot);
                tracing::info!(address = %address, "Forcing in-flight stop to close");
                metrics::record_dispose(address);
                Ok(())
            }
            Slot::Released => Ok(()),
        }
    }

    fn lock_slot(&self) -> MutexGuard<'_, Slot<T::Handle>> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn take_for_stop(&self) -> Option<T::Handle> {
        let mut slot = self.lock_slot();
        match std::mem::replace(&mut *slot, Slot::Stopping { dispose_requested: false }) {
            Slot::Held(transport) => Some(transport),
            other => {
                *slot = other;
                None
            }
        }
    }

    /// Put the transport handle back after a stop, or release it.
    ///
    /// Returns the stop outcome with any dispose failure folded in. The
    /// stop's own error takes precedence.
    fn settle(&self, transport: Option<T::Handle>, result: Result<(), StopError>) -> Result<(), StopError> {
        let address = self.endpoint.input_address();
        let mut slot = self.lock_slot();
        let dispose_requested = matches!(
            *slot,
            Slot::Stopping {
                dispose_requested: true
            }
        );

        let Some(mut transport) = transport else {
            *slot = Slot::Released;
            return result;
        };

        if dispose_requested {
            *slot = Slot::Released;
            drop(slot);
            let disposed = transport.dispose();
            drop(transport);
            metrics::record_released(address);

            match disposed {
                Ok(()) => result,
                Err(source) => {
                    tracing::warn!(address = %address, error = %source, "Transport dispose failed after stop");
                    result.and(Err(StopError::Transport {
                        address: address.clone(),
                        source: Arc::new(source),
                    }))
                }
            }
        } else if result.is_ok() {
            *slot = Slot::Released;
            drop(slot);
            drop(transport);
            metrics::record_released(address);
            result
        } else {
            // Kept for a fallback dispose.
            *slot = Slot::Held(transport);
            result
        }
    }

    /// Record the first outcome; later ones leave it unchanged.
    fn publish(&self, result: Result<(), StopError>) -> Result<(), StopError> {
        self.outcome.send_if_modified(|outcome| {
            if outcome.is_some() {
                return false;
            }
            *outcome = Some(result.clone());
            true
        });
        result
    }

    async fn outcome(&self) -> Result<(), StopError> {
        let mut rx = self.outcome.subscribe();
        let outcome = match rx.wait_for(Option::is_some).await {
            Ok(outcome) => (*outcome).clone(),
            Err(_) => None,
        };
        outcome.unwrap_or(Ok(()))
    }
}

impl<T: ReceiveTransport> Drop for EndpointHandle<T> {
    fn drop(&mut self) {
        let held = matches!(*self.lock_slot(), Slot::Held(_));
        if held {
            if let Err(e) = self.dispose() {
                tracing::warn!(
                    address = %self.endpoint.input_address(),
                    error = %e,
                    "Dispose on drop failed"
                );
            }
        }
    }
}

impl<T: ReceiveTransport> std::fmt::Debug for EndpointHandle<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EndpointHandle")
            .field("input_address", self.endpoint.input_address())
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

/// Transport handle owned by a stop in progress.
///
/// If the stop future is dropped before the transport returns, the handle
/// goes back into the slot and waiters see [`StopError::Abandoned`].
struct InFlight<'a, T: ReceiveTransport> {
    owner: &'a EndpointHandle<T>,
    transport: Option<T::Handle>,
}

impl<T: ReceiveTransport> Drop for InFlight<'_, T> {
    fn drop(&mut self) {
        let Some(transport) = self.transport.take() else {
            return;
        };

        let address = self.owner.endpoint.input_address().clone();
        tracing::warn!(address = %address, "Stop abandoned before the transport finished");
        metrics::record_stop(&address, "abandoned");
        let result = self
            .owner
            .settle(Some(transport), Err(StopError::Abandoned { address }));
        let _ = self.owner.publish(result);
    }
}
