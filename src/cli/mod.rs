//! Command-line parsing for the macro release tracker.
//!
//! Parsing stays here; dispatch lives in `crate::app`.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::events::DEFAULT_LOOKBACK_WINDOW;

pub const DEFAULT_DATA_DIR: &str = "data/processed";

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(
    name = "mtrack",
    version,
    about = "Macro release tracker: polls FRED/ECB and flags surprise releases"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Poll every indicator now, then on a fixed interval until interrupted.
    Run(RunArgs),
    /// Run a single ingestion cycle and exit.
    Once(CommonArgs),
    /// Launch the terminal dashboard over the stored series.
    ///
    /// On a first run with an empty data directory, one ingestion cycle is
    /// executed before the dashboard opens.
    Dashboard(CommonArgs),
}

/// Options shared by every subcommand.
#[derive(Debug, Args, Clone)]
pub struct CommonArgs {
    /// Directory holding the per-indicator CSVs and `calendar.csv`.
    #[arg(long, value_name = "DIR", default_value = DEFAULT_DATA_DIR)]
    pub data_dir: PathBuf,

    /// Indicator table CSV (`id,source,display_name,units`). Defaults to the built-in table.
    #[arg(long, value_name = "CSV")]
    pub registry: Option<PathBuf>,

    /// Trailing observations used for the surprise baseline (including the latest).
    #[arg(long, default_value_t = DEFAULT_LOOKBACK_WINDOW)]
    pub lookback: usize,
}

#[derive(Debug, Args, Clone)]
pub struct RunArgs {
    #[command(flatten)]
    pub common: CommonArgs,

    /// Seconds between polling cycles.
    #[arg(long, default_value_t = 60)]
    pub interval_secs: u64,
}

/// Rewrite argv so `mtrack` defaults to `mtrack run`.
///
/// Rules:
/// - `mtrack`                          -> `mtrack run`
/// - `mtrack --data-dir x ...`         -> `mtrack run --data-dir x ...`
/// - `mtrack --help/--version/-h`      -> unchanged (show top-level help/version)
pub fn rewrite_args(mut argv: Vec<String>) -> Vec<String> {
    let Some(arg1) = argv.get(1).cloned() else {
        argv.push("run".to_string());
        return argv;
    };

    let is_top_level_help_or_version = matches!(
        arg1.as_str(),
        "-h" | "--help" | "-V" | "--version" | "help"
    );
    if is_top_level_help_or_version {
        return argv;
    }

    if arg1.starts_with('-') {
        argv.insert(1, "run".to_string());
    }
    argv
}
