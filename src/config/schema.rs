//! Configuration schema definitions.
//!
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Root configuration for a receive endpoint host.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct EndpointConfig {
    /// Endpoint identity and dispatch settings.
    pub endpoint: ReceiveConfig,

    /// Transport settings (bind address, limits).
    pub transport: TransportConfig,

    /// Shutdown behavior.
    pub shutdown: ShutdownConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Endpoint identity and dispatch settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ReceiveConfig {
    /// Input address identifying the endpoint (e.g., "tcp://127.0.0.1:5672/orders").
    pub input_address: String,

    /// Maximum messages dispatched into the consume pipe at once.
    pub concurrency_limit: usize,
}

impl Default for ReceiveConfig {
    fn default() -> Self {
        Self {
            input_address: "tcp://127.0.0.1:5672/input".to_string(),
            concurrency_limit: 32,
        }
    }
}

/// TCP transport configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TransportConfig {
    /// Bind address (e.g., "0.0.0.0:5672").
    pub bind_address: String,

    /// Maximum concurrent connections (backpressure).
    pub max_connections: usize,

    /// Largest frame accepted, in bytes, excluding the newline.
    pub max_frame_bytes: usize,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1:5672".to_string(),
            max_connections: 1_000,
            max_frame_bytes: 64 * 1024,
        }
    }
}

/// Shutdown configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ShutdownConfig {
    /// How long a graceful stop may drain in-flight messages, in seconds.
    pub stop_timeout_secs: u64,
}

impl ShutdownConfig {
    pub fn stop_timeout(&self) -> Duration {
        Duration::from_secs(self.stop_timeout_secs)
    }
}

impl Default for ShutdownConfig {
    fn default() -> Self {
        Self {
            stop_timeout_secs: 30,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log filter directive (overridden by `RUST_LOG`).
    pub log_filter: String,

    /// Emit logs as JSON.
    pub json_logs: bool,

    /// Enable the Prometheus exporter.
    pub metrics_enabled: bool,

    /// Exporter listen address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_filter: "receive_endpoint=info".to_string(),
            json_logs: false,
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}
