#![allow(missing_docs)]

//! Taintflow CLI: replay recorded event traces through the tracker and
//! report whether configured sources reached configured sinks.

use std::io::BufReader;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;

use taintflow::config::{targets, TaintflowConfig};
use taintflow::host::replay::{InMemoryTaint, ReplayInspector};
use taintflow::trace;
use taintflow::tracker::{TargetCatalog, Tracker};

#[derive(Parser)]
#[command(name = "taintflow", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Replay a recorded JSONL event trace and print the flow summary.
    Replay {
        /// Path to the trace file.
        trace: PathBuf,
        /// Sources list file (overrides config).
        #[arg(long)]
        sources: Option<String>,
        /// Sinks list file (overrides config).
        #[arg(long)]
        sinks: Option<String>,
        /// Single-flow shortcut: source peer address.
        #[arg(long, requires = "source_port")]
        source_address: Option<String>,
        /// Single-flow shortcut: source peer port.
        #[arg(long)]
        source_port: Option<u16>,
        /// Single-flow shortcut: sink peer address.
        #[arg(long, requires = "sink_port")]
        sink_address: Option<String>,
        /// Single-flow shortcut: sink peer port.
        #[arg(long)]
        sink_port: Option<u16>,
        /// Emit the summary as JSON instead of text.
        #[arg(long)]
        json: bool,
    },
    /// Parse a targets file and echo what loaded (malformed rows are
    /// skipped with a diagnostic).
    CheckTargets {
        /// Path to the targets file.
        file: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Precedence: env vars > ./taintflow.toml > defaults.
    let mut config = TaintflowConfig::load().context("failed to load configuration")?;
    taintflow::logging::init(&config.tracker.log_level);

    match cli.command {
        Command::Replay {
            trace,
            sources,
            sinks,
            source_address,
            source_port,
            sink_address,
            sink_port,
            json,
        } => {
            if sources.is_some() {
                config.targets.sources_file = sources;
            }
            if sinks.is_some() {
                config.targets.sinks_file = sinks;
            }
            if source_address.is_some() {
                config.flow.source_address = source_address;
                config.flow.source_port = source_port;
            }
            if sink_address.is_some() {
                config.flow.sink_address = sink_address;
                config.flow.sink_port = sink_port;
            }
            run_replay(&config, &trace, json)
        }
        Command::CheckTargets { file } => {
            for target in targets::parse_targets_file(&file) {
                println!("{target}");
            }
            Ok(())
        }
    }
}

fn run_replay(config: &TaintflowConfig, trace_path: &Path, json: bool) -> Result<()> {
    let (sources, sinks) = config.resolve_targets();
    let catalog = TargetCatalog::load(sources, sinks);
    info!(
        sources = catalog.sources().len(),
        sinks = catalog.sinks().len(),
        "catalogs loaded"
    );
    for source in catalog.sources() {
        info!(index = source.index, target = %source.target, "source");
    }
    for sink in catalog.sinks() {
        info!(index = sink.index, target = %sink.target, "sink");
    }

    let file = std::fs::File::open(trace_path)
        .with_context(|| format!("failed to open trace {}", trace_path.display()))?;
    let events = trace::read_events(BufReader::new(file)).context("failed to parse trace")?;
    info!(events = events.len(), "trace loaded");

    let mut tracker = Tracker::new(catalog, ReplayInspector::new(), InMemoryTaint::new());
    trace::apply(&mut tracker, &events);

    let summary = tracker.summary();
    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&summary).context("failed to encode summary")?
        );
    } else {
        print!("{}", summary.render_text());
    }
    Ok(())
}
