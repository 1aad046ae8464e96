//! Cricket Collector - host telemetry agent for the Cricket ingestion API
//!
//! Periodically gathers system resource metrics and submits them:
//! - CPU, memory, swap, disk usage and I/O, network counters
//! - Host identity on every submission (implicit server registration)
//! - Fixed cadence, no local queue: a failed submission waits for the next tick

mod config;
mod discovery;
mod metrics;
mod scheduler;
mod submit;

use anyhow::{Context, Result};
use config::Config;
use metrics::probe::SysinfoProbe;
use metrics::Collector;
use scheduler::Scheduler;
use std::sync::Arc;
use submit::IngestClient;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // Optional .env file; real environment variables take precedence
    dotenvy::dotenv().ok();

    let config = Arc::new(Config::resolve().context("Invalid configuration")?);

    let default_level = if config.debug { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(format!("cricket_collector={default_level}"))),
        )
        .init();

    info!("Starting Cricket Performance Collector");
    info!("API URL: {}", config.api_url);
    info!("Server Name: {}", config.server_name);
    info!("Collection Interval: {} seconds", config.collect_interval_secs);

    let client = IngestClient::new(&config).context("Failed to build HTTP client")?;
    let collector = Collector::new(SysinfoProbe::new());

    Scheduler::new(config, collector, client).run().await;
    Ok(())
}
