//! Meter Bridge
//!
//! Reads raw three-phase meter output from a serial device (or stdin),
//! assembles complete samples and forwards each one to the energy
//! predictor.

mod bridge;
mod client;
mod output;
mod source;

use anyhow::Result;
use clap::Parser;
use std::time::Duration;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Serial to /predict bridge for the energy predictor
#[derive(Parser)]
#[command(name = "meter-bridge")]
#[command(author, version, about = "Serial to /predict bridge for the energy predictor", long_about = None)]
pub struct Cli {
    /// Serial device to read (e.g. /dev/ttyUSB0), or - for stdin
    #[arg(long, env = "METER_PORT")]
    pub port: String,

    /// Predictor endpoint
    #[arg(
        long,
        env = "PREDICT_URL",
        default_value = "http://127.0.0.1:5000/predict"
    )]
    pub url: String,

    /// Seconds to wait before reopening a failed device
    #[arg(long, default_value_t = 3)]
    pub retry_secs: u64,

    /// Timeout for each POST, in seconds
    #[arg(long, default_value_t = 3)]
    pub timeout_secs: u64,

    /// Enable verbose output
    #[arg(long, short)]
    pub verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .with(fmt::layer().compact())
        .init();

    let client = client::PredictClient::new(&cli.url, Duration::from_secs(cli.timeout_secs))?;
    tracing::info!(url = %client.url(), port = %cli.port, "Starting meter bridge");

    let mut bridge = bridge::Bridge::new(
        source::LineSource::parse(&cli.port),
        client,
        Duration::from_secs(cli.retry_secs),
    );

    tokio::select! {
        result = bridge.run() => result?,
        signal = tokio::signal::ctrl_c() => {
            signal?;
            output::print_info("Exiting on user request");
        }
    }

    Ok(())
}
