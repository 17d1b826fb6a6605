//! orientctl - IMU telemetry dashboard
//!
//! Reads the window the producer has written and shows orientation,
//! calibration and tilt warnings.

use anyhow::Result;
use clap::{Parser, Subcommand};
use orient_common::OrientConfig;
use orientctl::commands;
use orientctl::TimeRange;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "orientctl")]
#[command(about = "Orient telemetry dashboard", long_about = None)]
#[command(version)]
struct Cli {
    /// Config file (defaults to /etc/orient/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Live dashboard
    Watch {
        #[arg(long, value_enum, default_value_t = TimeRange::Latest)]
        range: TimeRange,

        /// Draw a single frame and exit
        #[arg(long)]
        once: bool,
    },

    /// Write the window to a CSV file
    Export {
        /// Output path (defaults to sensor_data_<timestamp>.csv)
        #[arg(long)]
        out: Option<PathBuf>,

        #[arg(long, value_enum, default_value_t = TimeRange::Latest)]
        range: TimeRange,
    },

    /// Summary statistics for the window
    Stats {
        #[arg(long, value_enum, default_value_t = TimeRange::Latest)]
        range: TimeRange,
    },

    /// Store record count and producer liveness
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = OrientConfig::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Watch { range, once } => commands::watch::run(&config, range, once).await,
        Commands::Export { out, range } => commands::export::run(&config, range, out).await,
        Commands::Stats { range } => commands::stats::run(&config, range).await,
        Commands::Status => commands::status::run(&config).await,
    }
}
