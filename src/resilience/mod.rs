//! Retry pacing for transient transport failures.
//!
//! # Design Decisions
//! - Exponential growth with a cap and a little jitter
//! - Callers own the attempt counter and reset it on success

pub mod backoff;
