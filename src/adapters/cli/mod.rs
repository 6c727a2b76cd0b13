//! CLI Adapter
//!
//! Command-line interface for the lever-learning engine.
//! Uses clap derive macros for argument parsing.

mod commands;

pub use commands::{
    parse_lever, parse_trades, CliApp, Command, LessonsCmd, MineCmd, MultiplierCmd,
    OutputFormat, RecordCmd, SetCmd, StatusCmd, TimeframesCmd,
};

use anyhow::Result;

use crate::config::Config;

/// Execute the CLI command
pub async fn execute(app: CliApp, config: Config) -> Result<()> {
    commands::execute(app, config).await
}
