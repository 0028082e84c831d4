//! Receive pipeline.
//!
//! # Data Flow
//! ```text
//! transport receive loop
//!     → ReceiveContext (context.rs)
//!     → filters in insertion order (filters.rs, composed by builder.rs)
//!     → terminal pipe (consumer dispatch)
//! ```
//!
//! # Design Decisions
//! - A pipe is a single capability: send a context through
//! - Filters wrap the next pipe instead of inheriting from it
//! - Pipes are object safe so endpoints can hold `Arc<dyn Pipe>`

pub mod builder;
pub mod context;
pub mod filters;

use std::sync::Arc;

use futures_util::future::BoxFuture;
use thiserror::Error;

use crate::endpoint::InputAddress;

pub use builder::{DiscardPipe, FnPipe, PipeBuilder};
pub use context::ReceiveContext;
pub use filters::{ConcurrencyLimit, LogFilter, StopGate};

/// A pipe shared between an endpoint and its transport.
pub type SharedPipe = Arc<dyn Pipe>;

/// Errors produced while sending a context through a pipe.
#[derive(Debug, Error)]
pub enum PipeError {
    /// The endpoint has been asked to stop and accepts no new work.
    #[error("endpoint {0} is stopping")]
    Stopping(InputAddress),

    /// A filter refused the message.
    #[error("message rejected: {0}")]
    Rejected(String),

    /// The consumer failed while handling the message.
    #[error("consumer faulted: {0}")]
    Faulted(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl PipeError {
    /// Wrap any error as a consumer fault.
    pub fn faulted<E>(error: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        PipeError::Faulted(error.into())
    }

    /// Short label used in logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            PipeError::Stopping(_) => "stopping",
            PipeError::Rejected(_) => "rejected",
            PipeError::Faulted(_) => "faulted",
        }
    }
}

/// An ordered chain of processing stages over a [`ReceiveContext`].
pub trait Pipe: Send + Sync {
    /// Send a context through the pipe.
    fn send<'a>(&'a self, context: &'a mut ReceiveContext) -> BoxFuture<'a, Result<(), PipeError>>;
}

impl<P: Pipe + ?Sized> Pipe for Arc<P> {
    fn send<'a>(&'a self, context: &'a mut ReceiveContext) -> BoxFuture<'a, Result<(), PipeError>> {
        (**self).send(context)
    }
}

/// A stage that may act on a context before and after passing it on.
///
/// A filter that does not call `next` short-circuits the rest of the pipe.
pub trait Filter: Send + Sync {
    fn send<'a>(
        &'a self,
        context: &'a mut ReceiveContext,
        next: &'a dyn Pipe,
    ) -> BoxFuture<'a, Result<(), PipeError>>;
}
