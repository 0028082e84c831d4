//! TCP receive transport.
//!
//! # Data Flow
//! ```text
//! Incoming TCP connection
//!     → listener.rs (accept loop, connection limits)
//!     → tcp.rs (read newline frames, push through receive pipe)
//!     → connection.rs (in-flight tracking for drain)
//!
//! Stop:
//!     stop accepting → stop reading → drain in-flight → abort on deadline
//! ```
//!
//! # Design Decisions
//! - Bounded accept queue prevents resource exhaustion
//! - Every in-flight receive is tracked for graceful shutdown
//! - Dispose aborts in-flight receives instead of waiting

pub mod connection;
pub mod listener;
pub mod tcp;

pub use tcp::{TcpReceiveTransport, TcpTransportHandle, CONNECTION_HEADER, PEER_HEADER};
