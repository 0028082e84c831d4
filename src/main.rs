//! Receive endpoint host.
//!
//! # Architecture Overview
//!
//! ```text
//!                 ┌──────────────────────────────────────────────────┐
//!                 │                 RECEIVE ENDPOINT                  │
//!                 │                                                   │
//!   TCP frames    │  ┌─────────┐   ┌──────────┐   ┌───────────────┐  │
//!   ──────────────┼─▶│   net   │──▶│ stop gate│──▶│ consume pipe  │  │
//!                 │  │transport│   │ (filter) │   │ log → limit → │  │
//!                 │  └────┬────┘   └────┬─────┘   │   consumer    │  │
//!                 │       │             │         └───────────────┘  │
//!                 │       ▼             ▼                            │
//!                 │  ┌──────────────────────────┐                    │
//!                 │  │ EndpointHandle           │◀── SIGINT/SIGTERM  │
//!                 │  │ stopping → stop → dispose│                    │
//!                 │  └──────────────────────────┘                    │
//!                 └──────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;

use clap::Parser;

use receive_endpoint::config::{self, EndpointConfig};
use receive_endpoint::lifecycle::signals::shutdown_signal;
use receive_endpoint::net::TcpReceiveTransport;
use receive_endpoint::observability::{logging, metrics};
use receive_endpoint::pipeline::filters::{ConcurrencyLimit, LogFilter};
use receive_endpoint::pipeline::{FnPipe, PipeBuilder, ReceiveContext};
use receive_endpoint::{Deadline, InputAddress, ReceiveEndpoint};

#[derive(Parser)]
#[command(name = "receive-endpoint")]
#[command(about = "Receive newline-framed messages over TCP and consume them", long_about = None)]
struct Cli {
    /// Path to a TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => config::load_config(path)?,
        None => EndpointConfig::default(),
    };

    logging::init_logging(&config.observability)?;

    tracing::info!(
        input_address = %config.endpoint.input_address,
        bind_address = %config.transport.bind_address,
        max_connections = config.transport.max_connections,
        stop_timeout_secs = config.shutdown.stop_timeout_secs,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let address = InputAddress::parse(&config.endpoint.input_address)?;
    let consume_pipe = PipeBuilder::new()
        .filter(LogFilter)
        .filter(ConcurrencyLimit::new(config.endpoint.concurrency_limit))
        .build(FnPipe::new(|ctx: &mut ReceiveContext| {
            tracing::info!(
                message_id = %ctx.message_id(),
                body = ctx.body_str().unwrap_or("<binary>"),
                "Message received"
            );
            Ok(())
        }));

    let transport = TcpReceiveTransport::new(address, config.transport.clone());
    let endpoint = ReceiveEndpoint::new(transport, consume_pipe);
    let handle = endpoint.start().await?;

    shutdown_signal().await;

    let deadline = Deadline::after(config.shutdown.stop_timeout());
    if let Err(e) = handle.stop(deadline).await {
        tracing::warn!(error = %e, "Graceful stop failed, disposing");
        handle.dispose()?;
    }

    tracing::info!("Shutdown complete");
    Ok(())
}
