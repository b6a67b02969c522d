//! Top-level application wiring.
//!
//! `src/main.rs` is intentionally tiny; this module is the "real main" that:
//! - parses CLI arguments
//! - loads the indicator registry and opens the CSV store
//! - binds source adapters and builds the orchestrator
//! - runs the polling loop, a single cycle, or the dashboard

use std::time::Duration;

use clap::Parser;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::cli::{Command, CommonArgs, RunArgs, rewrite_args};
use crate::data::{Adapters, EcbClient, FredClient};
use crate::domain::SourceKind;
use crate::error::AppError;
use crate::events::EventDetector;
use crate::io::{CsvStore, Registry};
use crate::report::TerminalAlertSink;

pub mod orchestrator;
pub mod scheduler;

use orchestrator::Orchestrator;
use scheduler::Scheduler;

/// Entry point for the `mtrack` binary.
pub fn run() -> Result<(), AppError> {
    let argv = rewrite_args(std::env::args().collect());
    let cli = crate::cli::Cli::parse_from(argv);

    match cli.command {
        Command::Run(args) => {
            init_tracing();
            handle_run(args)
        }
        Command::Once(args) => {
            init_tracing();
            handle_once(args)
        }
        // No subscriber here: log lines would corrupt the alternate screen.
        Command::Dashboard(args) => handle_dashboard(args),
    }
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "macro_tracker=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

/// Everything a command needs, built from the common flags.
struct Context {
    registry: Registry,
    store: CsvStore,
    fred: FredClient,
    detector: EventDetector,
}

impl Context {
    fn from_args(args: &CommonArgs) -> Result<Self, AppError> {
        let registry = Registry::load_or_builtin(args.registry.as_deref())?;
        let store = CsvStore::open(args.data_dir.clone())?;
        let fred = FredClient::from_env()?;
        let detector = EventDetector::new(args.lookback)?;
        Ok(Self {
            registry,
            store,
            fred,
            detector,
        })
    }

    fn orchestrator(&self) -> Result<Orchestrator<CsvStore, TerminalAlertSink>, AppError> {
        let adapters = Adapters::new()
            .with(SourceKind::Fred, self.fred.clone())
            .with(SourceKind::Ecb, EcbClient::new()?);
        Orchestrator::new(
            &self.registry,
            adapters,
            self.store.clone(),
            TerminalAlertSink::stdout(),
            self.detector,
        )
    }
}

fn handle_run(args: RunArgs) -> Result<(), AppError> {
    let ctx = Context::from_args(&args.common)?;
    let mut orchestrator = ctx.orchestrator()?;
    info!(
        indicators = orchestrator.indicators().len(),
        data_dir = %ctx.store.dir().display(),
        "Macro tracker started"
    );

    Scheduler::new(Duration::from_secs(args.interval_secs.max(1))).run_forever(&mut orchestrator);
    Ok(())
}

fn handle_once(args: CommonArgs) -> Result<(), AppError> {
    let ctx = Context::from_args(&args)?;
    let mut orchestrator = ctx.orchestrator()?;
    let report = orchestrator.run_cycle();

    println!("{}", crate::report::format_cycle_summary(&report));
    if let Some(rows) = ctx.store.load_calendar()? {
        println!("{}", crate::report::format_calendar(&rows));
    }
    Ok(())
}

fn handle_dashboard(args: CommonArgs) -> Result<(), AppError> {
    let ctx = Context::from_args(&args)?;

    if ctx.store.load_all()?.is_empty() {
        println!(
            "No stored series in {}; running a first ingestion cycle...",
            ctx.store.dir().display()
        );
        ctx.orchestrator()?.run_cycle();
    }

    crate::tui::run(ctx.registry, ctx.store, ctx.fred)
}
