//! Metrics collection and exposition.
//!
//! # Metrics
//! - `receive_endpoint_starts_total` (counter): successful starts by address
//! - `receive_endpoint_start_failures_total` (counter): failed starts by address
//! - `receive_endpoint_stops_total` (counter): graceful stops by address, outcome
//! - `receive_endpoint_disposals_total` (counter): immediate teardowns by address
//! - `receive_endpoint_active` (gauge): handles holding a transport
//! - `receive_messages_total` (counter): messages by address, outcome
//! - `receive_message_duration_seconds` (histogram): dispatch latency
//!
//! # Design Decisions
//! - Recording is a no-op until a recorder is installed
//! - The Prometheus exporter is opt-in via configuration

use std::net::SocketAddr;
use std::time::Duration;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

use crate::endpoint::InputAddress;

/// Install the Prometheus exporter listening on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_start(address: &InputAddress) {
    counter!("receive_endpoint_starts_total", "address" => address.to_string()).increment(1);
    gauge!("receive_endpoint_active", "address" => address.to_string()).increment(1.0);
}

pub fn record_start_failure(address: &InputAddress) {
    counter!("receive_endpoint_start_failures_total", "address" => address.to_string()).increment(1);
}

pub fn record_stop(address: &InputAddress, outcome: &'static str) {
    counter!(
        "receive_endpoint_stops_total",
        "address" => address.to_string(),
        "outcome" => outcome
    )
    .increment(1);
}

pub fn record_dispose(address: &InputAddress) {
    counter!("receive_endpoint_disposals_total", "address" => address.to_string()).increment(1);
}

/// A handle released its transport.
pub fn record_released(address: &InputAddress) {
    gauge!("receive_endpoint_active", "address" => address.to_string()).decrement(1.0);
}

pub fn record_message(address: &InputAddress, outcome: &'static str, elapsed: Duration) {
    counter!(
        "receive_messages_total",
        "address" => address.to_string(),
        "outcome" => outcome
    )
    .increment(1);
    histogram!("receive_message_duration_seconds", "address" => address.to_string())
        .record(elapsed.as_secs_f64());
}
