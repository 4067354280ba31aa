//! Automated digit trading bot - entry point.

use anyhow::Result;
use clap::Parser;
use tracing::info;

/// Automated digit trading bot
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Configuration file path (can also be set via DIGITBOT_CONFIG env var)
    #[arg(short, long)]
    config: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize TLS crypto provider (must be before any WS connections)
    digit_ws::init_crypto();

    let args = Args::parse();

    digit_bot::logging::init_logging();

    info!("Starting digit-bot v{}", env!("CARGO_PKG_VERSION"));

    let config_path = args
        .config
        .or_else(|| std::env::var("DIGITBOT_CONFIG").ok())
        .unwrap_or_else(|| "config/default.toml".to_string());

    info!(config_path = %config_path, "Loading configuration");
    let config = digit_bot::AppConfig::load(&config_path)?;
    info!(
        symbol = %config.strategy.symbol,
        contract_type = %config.strategy.contract_type,
        "Configuration loaded"
    );

    let app = digit_bot::Application::new(config)?;
    match app.run().await? {
        Some(summary) => info!(
            reason = ?summary.reason,
            profit = %summary.cumulative_profit,
            trades = summary.trades,
            "Run complete"
        ),
        None => info!("Run interrupted"),
    }

    Ok(())
}
