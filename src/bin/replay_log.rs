//! Replay Log Tool
//!
//! Folds a tagged JSONL event log through the single-worker pipeline and
//! prints every output record as `<port>\t<json>`. The same log always
//! produces the same output.
//!
//! Usage:
//!   replay_log --log events.jsonl --window-secs 60 --lateness-secs 30

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, Level};
use tracing_subscriber::EnvFilter;

use tampering_detector::config::AppConfig;
use tampering_detector::replay::replay;
use tampering_detector::stream::pipeline::EngineSettings;
use tampering_detector::stream::SourceId;

#[derive(Parser, Debug)]
#[command(name = "replay_log")]
#[command(about = "Deterministic replay of a tagged control/contact event log")]
struct Args {
    /// Tagged JSONL event log
    #[arg(long)]
    log: PathBuf,

    /// Take timing parameters from this config instead of the flags below
    #[arg(long)]
    config: Option<PathBuf>,

    #[arg(long, default_value = "60")]
    window_secs: u64,

    #[arg(long, default_value = "5")]
    watermark_secs: u64,

    #[arg(long, default_value = "60")]
    idle_secs: u64,

    #[arg(long, default_value = "30")]
    lateness_secs: u64,

    /// Number of mention sources to register up front (ids 0..n)
    #[arg(long, default_value = "1")]
    sources: u32,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(Level::INFO.into()))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let settings = match &args.config {
        Some(path) => AppConfig::load(path)?.engine_settings(),
        None => EngineSettings::from_secs(
            args.window_secs,
            args.watermark_secs,
            args.idle_secs,
            args.lateness_secs,
        ),
    };
    anyhow::ensure!(settings.window_size > 0, "window size must be greater than zero");

    let contents = std::fs::read_to_string(&args.log)
        .with_context(|| format!("Failed to read {}", args.log.display()))?;
    let sources: Vec<SourceId> = (0..args.sources).collect();

    let outcome = replay(settings, &sources, contents.lines());

    for record in &outcome.records {
        println!("{}\t{}", record.port(), record.to_wire()?);
    }

    let c = outcome.counters;
    info!(
        controls = c.controls,
        contacts = c.contacts_in,
        suppressed = c.contacts_suppressed,
        late = c.contacts_late,
        results = c.results,
        skipped = outcome.skipped,
        "replay complete"
    );
    Ok(())
}
