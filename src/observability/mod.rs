//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Endpoint lifecycle + pipeline filters produce:
//!     → logging.rs (structured log events)
//!     → metrics.rs (counters, gauges, histograms)
//!
//! Consumers:
//!     → Log aggregation (stdout)
//!     → Metrics endpoint (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - Structured logging (JSON) for machine parsing
//! - Every event carries the endpoint input address
//! - Metrics are cheap (atomic increments)

pub mod logging;
pub mod metrics;
