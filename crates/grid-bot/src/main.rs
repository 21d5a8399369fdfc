//! Grid ladder bot - entry point.
//!
//! Runs the ladder against the paper venue, replaying a price file as the
//! market, with an optional HTTP status server.

use anyhow::Result;
use clap::Parser;
use tracing::info;

/// Grid ladder bot
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Configuration file path (can also be set via GRID_CONFIG env var)
    #[arg(short, long)]
    config: Option<String>,

    /// Log filter used when RUST_LOG is unset
    #[arg(long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    grid_telemetry::init_logging(args.log_level.as_deref())?;

    info!("Starting grid bot v{}", env!("CARGO_PKG_VERSION"));

    // CLI arg > GRID_CONFIG env var > default
    let config_path = args
        .config
        .or_else(|| std::env::var("GRID_CONFIG").ok())
        .unwrap_or_else(|| "config/default.toml".to_string());

    info!(config_path = %config_path, "Loading configuration");

    let config = grid_bot::AppConfig::from_file(&config_path)?;
    info!(
        pair = %config.pair,
        interval_percent = %config.grid.price_interval_percent,
        capital_percent = %config.grid.trading_capital_percent,
        "Configuration loaded"
    );

    let app = grid_bot::Application::new(config)?;
    app.run().await?;

    Ok(())
}
