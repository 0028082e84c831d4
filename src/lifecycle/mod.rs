//! Lifecycle primitives.
//!
//! # Data Flow
//! ```text
//! Stop requested (shutdown.rs):
//!     StopSignal::trigger → listeners observe "stopping"
//!
//! Bounded drain (deadline.rs):
//!     Deadline(instant | cancelled) → transport stops waiting and forces closure
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → caller stops its endpoints
//! ```
//!
//! # Design Decisions
//! - Stopping is one-shot: only the first trigger has effect
//! - Deadlines are values passed down, never timers owned by the endpoint

pub mod deadline;
pub mod shutdown;
pub mod signals;

pub use deadline::Deadline;
pub use shutdown::{StopListener, StopSignal};
