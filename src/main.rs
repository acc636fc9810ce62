//! Telegate - pluggable telemetry gateway
//!
//! Listens on configured UDP sockets, decodes collectd / ceilometer /
//! sensubility payloads, and re-exports the metrics for prometheus while
//! logging the events.
//!
//! # Usage
//! ```sh
//! TELEGATE_PIPELINES=udp:0.0.0.0:5001:collectd cargo run
//! ```
//!
//! # Environment Variables
//! - `TELEGATE_PIPELINES` - Comma-separated `udp:<bind-addr>:<handler>` entries
//! - `TELEGATE_BUS_BLOCKING` - Run subscribers inline instead of queued (default: false)
//! - `TELEGATE_EXPIRATION_MULTIPLE` - Missed intervals before a series is stale (default: 2)

use anyhow::Result;
use clap::Parser;
use telegate::application::system::Gateway;
use telegate::config::Config;
use tracing::{Level, info};
use tracing_subscriber::prelude::*;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Load and print the configuration, then exit without binding sockets
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Setup logging (stdout only)
    let stdout_layer = tracing_subscriber::fmt::layer().with_target(false).pretty();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env().add_directive(Level::INFO.into()))
        .with(stdout_layer)
        .init();

    let cli = Cli::parse();

    info!("Telegate {} starting...", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let config = Config::from_env()?;
    info!(
        "Configuration loaded: {} pipeline(s), blocking={}, queue_capacity={}",
        config.pipelines.len(),
        config.bus.blocking,
        config.bus.queue_capacity
    );
    for pipeline in &config.pipelines {
        info!("Pipeline: {}", pipeline);
    }

    if cli.dry_run {
        info!("Dry run complete. Exiting.");
        return Ok(());
    }

    // Build and start the gateway
    let gateway = Gateway::build(config)?;
    let handle = gateway.start().await?;

    info!("Gateway running. Press Ctrl+C to shutdown.");

    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received. Exiting...");

    handle.shutdown().await;

    Ok(())
}
