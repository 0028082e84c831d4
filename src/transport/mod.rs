//! Transport contract.
//!
//! A transport owns the protocol-specific receive loop. The endpoint hands it
//! a receive pipe and gets back a [`TransportHandle`], which it owns
//! exclusively from then on.
//!
//! # Data Flow
//! ```text
//! ReceiveTransport::start(pipe)
//!     → bind / connect (synchronous setup, may suspend)
//!     → spawn receive loop (runs independently)
//!     → TransportHandle
//!
//! TransportHandle::stop(deadline)
//!     → stop receiving → drain in-flight → force closure on deadline
//! TransportHandle::dispose()
//!     → release everything now
//! ```

use std::future::Future;

use thiserror::Error;

use crate::endpoint::InputAddress;
use crate::lifecycle::Deadline;
use crate::pipeline::SharedPipe;

/// Failures reported by a transport.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Could not bind the local listening resource.
    #[error("failed to bind {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: std::io::Error,
    },

    /// Could not connect to the remote broker.
    #[error("failed to connect to {address}: {source}")]
    Connect {
        address: String,
        #[source]
        source: std::io::Error,
    },

    /// The stop deadline expired before in-flight receives drained.
    #[error("stop deadline expired with {in_flight} receives still in flight")]
    DeadlineExpired { in_flight: u64 },

    /// Releasing transport resources failed.
    #[error("failed to release transport resources: {0}")]
    Release(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// A protocol-specific message source.
pub trait ReceiveTransport: Send + Sync + 'static {
    type Handle: TransportHandle;

    /// Address identifying what this transport receives from.
    fn input_address(&self) -> &InputAddress;

    /// Begin receiving, routing every received message into `pipe`.
    ///
    /// Returns once setup is done; the receive loop keeps running on its own.
    fn start(
        &self,
        pipe: SharedPipe,
    ) -> impl Future<Output = Result<Self::Handle, TransportError>> + Send;
}

/// Control over a running receive loop.
pub trait TransportHandle: Send + 'static {
    /// Stop receiving and wait for in-flight work, bounded by `deadline`.
    fn stop(&mut self, deadline: Deadline) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Release resources immediately without draining.
    fn dispose(&mut self) -> Result<(), TransportError>;
}
