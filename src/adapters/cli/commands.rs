//! CLI Command Handlers
//!
//! Implementation of all CLI commands for the lever-learning engine.

use anyhow::{bail, Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use std::collections::BTreeMap;
use std::io::Read;
use std::path::PathBuf;
use std::sync::Arc;

use crate::adapters::json_store::JsonFileStore;
use crate::application::{LearningEngine, MiningScheduler};
use crate::config::Config;
use crate::domain::{ActionCategory, ClosedTrade, EntryContext};
use crate::ports::{ConfigRow, LearningStore};

/// lever-learning - Adaptive coefficient learning for trade sizing
#[derive(Parser, Debug)]
#[command(
    name = "lever-learning",
    version = env!("CARGO_PKG_VERSION"),
    about = "Adaptive coefficient learning for trade sizing",
    long_about = "Learns confidence-weighted lever multipliers from closed-trade outcomes \
                  and mines significance-gated lessons for position management."
)]
pub struct CliApp {
    /// The command to execute
    #[command(subcommand)]
    pub command: Command,

    /// Path to configuration file (defaults to ./config.toml when present)
    #[arg(short, long, value_name = "FILE", global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Record closed trades from JSON
    Record(RecordCmd),

    /// Allocation multiplier for an entry context
    Multiplier(MultiplierCmd),

    /// Learned timeframe weights
    Timeframes(TimeframesCmd),

    /// Mine lessons from recent trade events
    Mine(MineCmd),

    /// List mined lessons and overrides
    Lessons(LessonsCmd),

    /// Persist a learning parameter override for the current module
    Set(SetCmd),

    /// Show learned state summary
    Status(StatusCmd),
}

/// Output format
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// Record closed trades
#[derive(Parser, Debug)]
pub struct RecordCmd {
    /// JSON file with one trade per line, or a JSON array ("-" reads stdin)
    #[arg(value_name = "FILE", default_value = "-")]
    pub input: String,
}

/// Allocation multiplier
#[derive(Parser, Debug)]
pub struct MultiplierCmd {
    /// Lever value as name=value (repeatable)
    #[arg(short, long = "lever", value_name = "NAME=VALUE", value_parser = parse_lever)]
    pub levers: Vec<(String, String)>,

    #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
}

/// Timeframe weights
#[derive(Parser, Debug)]
pub struct TimeframesCmd {
    /// Scale weights to sum to 1.0
    #[arg(short, long)]
    pub normalized: bool,

    #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
}

/// Mine lessons
#[derive(Parser, Debug)]
pub struct MineCmd {
    /// Run a single pass and exit
    #[arg(long)]
    pub once: bool,

    /// Override seconds between passes
    #[arg(long, value_name = "SECS")]
    pub interval: Option<u64>,
}

/// List lessons
#[derive(Parser, Debug)]
pub struct LessonsCmd {
    /// Only this pattern
    #[arg(short, long, value_name = "PATTERN")]
    pub pattern: Option<String>,

    /// Only this action category (entry, add, trim, exit)
    #[arg(short, long, value_name = "ACTION")]
    pub action: Option<ActionCategory>,

    #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
}

/// Persist a parameter override
#[derive(Parser, Debug)]
pub struct SetCmd {
    /// Parameter name (e.g. n_min, lever_weight.curator)
    #[arg(value_name = "KEY")]
    pub key: String,

    #[arg(value_name = "VALUE")]
    pub value: String,
}

/// Learned state summary
#[derive(Parser, Debug)]
pub struct StatusCmd {
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
}

/// Parse a `name=value` lever argument
pub fn parse_lever(raw: &str) -> Result<(String, String), String> {
    let (name, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=VALUE, got '{}'", raw))?;
    let (name, value) = (name.trim(), value.trim());
    if name.is_empty() {
        return Err(format!("empty lever name in '{}'", raw));
    }
    Ok((name.to_string(), value.to_string()))
}

/// Parse closed trades from a JSON array or JSON lines
pub fn parse_trades(content: &str) -> Result<Vec<ClosedTrade>> {
    let trimmed = content.trim_start();
    if trimmed.starts_with('[') {
        return serde_json::from_str(trimmed).context("Failed to parse trade array");
    }

    content
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(i, line)| {
            serde_json::from_str(line).with_context(|| format!("Invalid trade on line {}", i + 1))
        })
        .collect()
}

fn print_output<T: Serialize>(format: OutputFormat, value: &T, text: impl FnOnce()) -> Result<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(value)?),
        OutputFormat::Text => text(),
    }
    Ok(())
}

fn open_engine(config: &Config) -> Result<Arc<LearningEngine>> {
    let path = config.store.get_path();
    let store: Arc<dyn LearningStore> = Arc::new(
        JsonFileStore::open(&path)
            .with_context(|| format!("Failed to open learning store at {}", path.display()))?,
    );

    let engine = LearningEngine::new(store, config.learning.clone(), config.scope.lever_scope())
        .context("Failed to create learning engine")?;
    Ok(Arc::new(engine))
}

/// Execute a parsed command against a loaded configuration
pub async fn execute(app: CliApp, config: Config) -> Result<()> {
    let engine = open_engine(&config)?;

    match app.command {
        Command::Record(cmd) => record_command(&engine, cmd),
        Command::Multiplier(cmd) => multiplier_command(&engine, cmd),
        Command::Timeframes(cmd) => timeframes_command(&engine, cmd),
        Command::Mine(cmd) => mine_command(engine, &config, cmd).await,
        Command::Lessons(cmd) => lessons_command(&engine, cmd),
        Command::Set(cmd) => set_command(&engine, cmd),
        Command::Status(cmd) => status_command(&engine, cmd),
    }
}

fn record_command(engine: &LearningEngine, cmd: RecordCmd) -> Result<()> {
    let content = if cmd.input == "-" {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("Failed to read trades from stdin")?;
        buf
    } else {
        std::fs::read_to_string(&cmd.input)
            .with_context(|| format!("Failed to read trades from {}", cmd.input))?
    };

    let trades = parse_trades(&content)?;
    let now = Utc::now();

    let mut recorded = 0;
    let mut rejected = 0;
    for trade in &trades {
        match engine.record_closed_trade(trade, now) {
            Ok(_) => recorded += 1,
            Err(e) => {
                tracing::warn!("Trade {} not recorded: {}", trade.trade_id, e);
                rejected += 1;
            }
        }
    }

    println!("Recorded {} trades ({} rejected)", recorded, rejected);
    if recorded == 0 && rejected > 0 {
        bail!("No trades were recorded");
    }
    Ok(())
}

fn multiplier_command(engine: &LearningEngine, cmd: MultiplierCmd) -> Result<()> {
    let context: EntryContext = cmd.levers.iter().cloned().collect();
    let reader = engine.reader();
    let scope = reader.scope();

    let levers: BTreeMap<String, f64> = context
        .populated()
        .map(|(lever, value)| {
            let weight = reader.lever_weight(&scope.module, &scope.scope, lever, value);
            (format!("{}={}", lever, value), weight)
        })
        .collect();
    let multiplier = reader.allocation_multiplier(&context);

    #[derive(Serialize)]
    struct Output<'a> {
        multiplier: f64,
        levers: &'a BTreeMap<String, f64>,
    }

    print_output(
        cmd.format,
        &Output {
            multiplier,
            levers: &levers,
        },
        || {
            for (lever, weight) in &levers {
                println!("  {:<32} {:.3}", lever, weight);
            }
            println!("Allocation multiplier: {:.3}", multiplier);
        },
    )
}

fn timeframes_command(engine: &LearningEngine, cmd: TimeframesCmd) -> Result<()> {
    let weights = if cmd.normalized {
        engine.reader().timeframe_allocation()
    } else {
        engine.reader().timeframe_weights()
    };

    print_output(cmd.format, &weights, || {
        for (tf, weight) in &weights {
            println!("  {:<6} {:.3}", tf, weight);
        }
    })
}

async fn mine_command(engine: Arc<LearningEngine>, config: &Config, cmd: MineCmd) -> Result<()> {
    if cmd.once {
        let report = engine.mine(Utc::now()).context("Mining pass failed")?;
        println!(
            "Mined {} lessons and {} overrides from {} events ({} pruned)",
            report.lessons_written, report.overrides_written, report.events_scanned, report.pruned
        );
        return Ok(());
    }

    let interval = cmd
        .interval
        .map(std::time::Duration::from_secs)
        .unwrap_or_else(|| config.miner.interval());
    let scheduler = Arc::new(MiningScheduler::new(engine).with_interval(interval));

    // Setup Ctrl+C handler
    let sched = scheduler.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        tracing::info!("Shutdown signal received");
        sched.stop().await;
    });

    scheduler.run().await;

    let status = scheduler.status().await;
    println!("Mining stopped after {} passes ({} failed)", status.runs, status.failures);
    Ok(())
}

fn lessons_command(engine: &LearningEngine, cmd: LessonsCmd) -> Result<()> {
    let mut lessons = engine
        .store()
        .lessons()
        .context("Failed to read lessons")?;
    lessons.retain(|l| {
        cmd.pattern.as_deref().map_or(true, |p| l.pattern_key == p)
            && cmd.action.map_or(true, |a| l.action_category == a)
    });

    let mut overrides = Vec::new();
    let mut groups: Vec<(String, ActionCategory)> = lessons
        .iter()
        .map(|l| (l.pattern_key.clone(), l.action_category))
        .collect();
    groups.sort();
    groups.dedup();
    for (pattern, action) in &groups {
        overrides.extend(engine.reader().active_overrides(pattern, *action));
    }

    #[derive(Serialize)]
    struct Output<'a> {
        lessons: &'a [crate::domain::Lesson],
        overrides: &'a [crate::domain::PmOverride],
    }

    print_output(
        cmd.format,
        &Output {
            lessons: &lessons,
            overrides: &overrides,
        },
        || {
            println!("{} lessons", lessons.len());
            for lesson in &lessons {
                println!(
                    "  {} n={} conf={:.2} mean_rr={:.2} win={:.0}% edge={:+.3}",
                    lesson.key(),
                    lesson.n,
                    lesson.confidence,
                    lesson.stats.mean_rr,
                    lesson.stats.win_rate * 100.0,
                    lesson.stats.asymmetric_edge
                );
            }
            println!("{} overrides", overrides.len());
            for o in &overrides {
                println!(
                    "  {} {} ladder={:+.3} size={:+.3} conf={:.2}",
                    o.key(),
                    o.tuning.direction,
                    o.tuning.ladder_spacing_delta,
                    o.tuning.size_delta,
                    o.confidence
                );
            }
        },
    )
}

fn set_command(engine: &LearningEngine, cmd: SetCmd) -> Result<()> {
    // Reject values the engine would ignore on the next start
    let mut candidate = engine.config().clone();
    candidate
        .apply(&cmd.key, &cmd.value)
        .with_context(|| format!("Invalid override {}={}", cmd.key, cmd.value))?;
    candidate
        .validate()
        .with_context(|| format!("Override {}={} leaves config invalid", cmd.key, cmd.value))?;

    let module = &engine.lever_scope().module;
    engine
        .store()
        .put_config_row(ConfigRow::new(module, &cmd.key, &cmd.value))
        .context("Failed to persist override")?;

    println!("Set {}.{} = {}", module, cmd.key, cmd.value);
    Ok(())
}

fn status_command(engine: &LearningEngine, cmd: StatusCmd) -> Result<()> {
    let status = engine.status(Utc::now()).context("Failed to read status")?;

    print_output(cmd.format, &status, || {
        println!("Module:        {}", status.module);
        println!("Scope:         {}", status.scope);
        println!(
            "Events:        {} in the last {} days",
            status.events_in_window, status.lookback_days
        );
        println!("Lessons:       {}", status.lessons);
    })
}
