//! orientd - IMU telemetry producer
//!
//! Samples the sensor at a fixed cadence and publishes each reading to the
//! configured store until interrupted.

use anyhow::{bail, Result};
use clap::Parser;
use orient_common::{open_store, OrientConfig};
use orientd::{IngestionClient, SimulatedImu};
use std::path::PathBuf;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "orientd")]
#[command(about = "Orient telemetry producer", long_about = None)]
#[command(version)]
struct Cli {
    /// Config file (defaults to /etc/orient/config.toml)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Probability that a simulated sensor read fails
    #[arg(long, default_value_t = 0.0)]
    fault_rate: f64,

    /// Seed for the simulated sensor
    #[arg(long, default_value_t = 1)]
    seed: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    info!("orientd v{} starting", env!("CARGO_PKG_VERSION"));

    let config = OrientConfig::load(cli.config.as_deref())?;
    let store = match open_store(&config.store).await {
        Ok(store) => store,
        Err(e) => {
            error!("Cannot open store: {:#}", e);
            return Err(e);
        }
    };

    let ingest = &config.ingest;
    let source = SimulatedImu::new(cli.seed, ingest.cadence().as_secs_f64()).with_fault_rate(cli.fault_rate);
    let client = IngestionClient::new(ingest.device_id.clone(), source, store, ingest.retry_policy());

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for ctrl-c: {}", e);
        }
        info!("Shutting down gracefully");
    };

    let counts = client.run(ingest.cadence(), ingest.stall_after(), shutdown).await;
    info!(
        "Final: {} captured, {} published, {} retries, {} lost, {} read errors",
        counts.captured, counts.published, counts.retries, counts.lost, counts.read_errors
    );

    if counts.captured > 0 && counts.published == 0 {
        bail!("store never acknowledged a write");
    }
    Ok(())
}
