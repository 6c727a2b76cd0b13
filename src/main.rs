//! lever-learning - Adaptive Coefficient Learning Engine
//!
//! Command-line front end: record closed trades, query multipliers and run
//! the lesson miner against a JSON store.

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::{fmt, EnvFilter};

use lever_learning::adapters::cli::{self, CliApp};
use lever_learning::config::load_config_or_default;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if it exists
    dotenvy::dotenv().ok();

    let app = CliApp::parse();

    let config = load_config_or_default(app.config.as_deref())
        .context("Failed to load configuration")?;

    init_logging(app.verbose, app.debug, &config.logging.level)?;

    cli::execute(app, config).await
}

fn init_logging(verbose: bool, debug: bool, configured: &str) -> Result<()> {
    let filter = if debug {
        EnvFilter::new("debug")
    } else if verbose {
        EnvFilter::new("info")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(configured))
    };

    fmt().with_env_filter(filter).init();
    Ok(())
}
