//! Receive endpoints.
//!
//! # Data Flow
//! ```text
//! ReceiveEndpoint::new(transport, consume_pipe)
//!     → start()
//!         → StopGate(stopping) + consume_pipe = receive pipe
//!         → transport.start(receive pipe) → TransportHandle
//!         → EndpointHandle (Running)
//!     → handle.stop(deadline) | handle.dispose()
//!         → stopping fires first, then the transport stops (Stopping → Stopped)
//! ```
//!
//! # Design Decisions
//! - The endpoint only coordinates; transport and pipe are injected
//! - The handle exclusively owns the transport handle
//! - Start never retries; retry belongs to the transport or a supervisor

pub mod address;
pub mod handle;

use std::sync::Arc;

use thiserror::Error;

use crate::lifecycle::StopSignal;
use crate::observability::metrics;
use crate::pipeline::builder::FilterPipe;
use crate::pipeline::{SharedPipe, StopGate};
use crate::transport::{ReceiveTransport, TransportError};

pub use address::InputAddress;
pub use handle::{EndpointHandle, HandleState, StopError};

/// The transport could not begin receiving.
#[derive(Debug, Error)]
#[error("failed to start receive endpoint {address}: {source}")]
pub struct StartError {
    pub address: InputAddress,
    #[source]
    pub source: TransportError,
}

impl StartError {
    /// The transport's error, as reported.
    pub fn transport_error(&self) -> &TransportError {
        &self.source
    }
}

/// A transport bound to the pipe its messages are consumed by.
///
/// Cloning is cheap and clones share the same transport and pipe.
pub struct ReceiveEndpoint<T> {
    inner: Arc<Inner<T>>,
}

struct Inner<T> {
    transport: T,
    consume_pipe: SharedPipe,
}

impl<T> Clone for ReceiveEndpoint<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: ReceiveTransport> ReceiveEndpoint<T> {
    pub fn new(transport: T, consume_pipe: SharedPipe) -> Self {
        Self {
            inner: Arc::new(Inner {
                transport,
                consume_pipe,
            }),
        }
    }

    /// Address identifying this endpoint, as defined by its transport.
    pub fn input_address(&self) -> &InputAddress {
        self.inner.transport.input_address()
    }

    /// The pipe received messages are consumed by.
    pub fn consume_pipe(&self) -> &SharedPipe {
        &self.inner.consume_pipe
    }

    pub fn transport(&self) -> &T {
        &self.inner.transport
    }

    /// Start the transport against this endpoint's pipe.
    ///
    /// Returns once the transport has finished its setup. Every call yields an
    /// independent handle with its own transport handle and stopping signal.
    pub async fn start(&self) -> Result<EndpointHandle<T>, StartError> {
        let address = self.input_address().clone();
        let stopping = StopSignal::new();

        let gate = StopGate::new(address.clone(), stopping.listener());
        let receive_pipe: SharedPipe = Arc::new(FilterPipe::new(
            Arc::new(gate),
            Arc::clone(&self.inner.consume_pipe),
        ));

        tracing::debug!(address = %address, "Starting receive endpoint");

        let transport_handle = match self.inner.transport.start(receive_pipe).await {
            Ok(handle) => handle,
            Err(source) => {
                tracing::error!(address = %address, error = %source, "Receive endpoint failed to start");
                metrics::record_start_failure(&address);
                return Err(StartError { address, source });
            }
        };

        tracing::info!(address = %address, "Receive endpoint started");
        metrics::record_start(&address);

        Ok(EndpointHandle::new(self.clone(), stopping, transport_handle))
    }
}

impl<T: ReceiveTransport> std::fmt::Debug for ReceiveEndpoint<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReceiveEndpoint")
            .field("input_address", self.input_address())
            .finish_non_exhaustive()
    }
}
