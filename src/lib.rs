//! Receive endpoint lifecycle coordination.
//!
//! Binds a message-receiving transport to a receive pipeline, starts the
//! receive loop, and hands back a handle that stops it exactly once.

pub mod config;
pub mod endpoint;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod pipeline;
pub mod resilience;
pub mod transport;

pub use config::schema::EndpointConfig;
pub use endpoint::{EndpointHandle, HandleState, InputAddress, ReceiveEndpoint, StartError, StopError};
pub use lifecycle::{Deadline, StopListener, StopSignal};
pub use pipeline::{Pipe, PipeBuilder, PipeError, ReceiveContext, SharedPipe};
pub use transport::{ReceiveTransport, TransportError, TransportHandle};
