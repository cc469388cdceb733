//! Tampering Detector Service
//!
//! Consumes the team-control and mention streams, runs the event-time
//! detection lanes, and writes results, late contacts and the audit trail to
//! their output streams.
//!
//! Usage:
//!   tampering-detector --config tampering.toml --data-dir ./streams --stats-port 9090
//!
//! Environment:
//!   TAMPERING_CONFIG - Config file path (default: tampering.toml)
//!   TAMPERING_DATA_DIR - Directory holding `<stream>.jsonl` files
//!   TAMPERING_STATS_PORT - Serve /health and /stats on this port (optional)
//!   RUST_LOG - Log filter

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use axum::{routing::get, Json, Router};
use clap::Parser;
use dotenv::dotenv;
use tokio::sync::watch;
use tracing::{info, warn, Level};
use tracing_subscriber::EnvFilter;

use tampering_detector::config::AppConfig;
use tampering_detector::ingest::{
    Enricher, MemoryPlayerDirectory, PlayerDirectory, SqlitePlayerDirectory,
};
use tampering_detector::runtime::{PipelineStats, Runtime, RuntimeOptions};
use tampering_detector::sinks::{JsonlFileSink, Notifier, SinkHub, ALERT_QUEUE_CAPACITY};

/// How long queued alerts may take to go out after the run ends.
const ALERT_DRAIN_GRACE: Duration = Duration::from_secs(10);

#[derive(Parser, Debug)]
#[command(name = "tampering-detector")]
#[command(about = "Event-time NBA tampering detection over mention and control streams")]
struct Args {
    /// TOML configuration file
    #[arg(long, env = "TAMPERING_CONFIG", default_value = "tampering.toml")]
    config: PathBuf,

    /// Directory holding the input and output stream files
    #[arg(long, env = "TAMPERING_DATA_DIR", default_value = "streams")]
    data_dir: PathBuf,

    /// Stats HTTP port (optional)
    #[arg(long, env = "TAMPERING_STATS_PORT")]
    stats_port: Option<u16>,
}

fn init_tracing() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive(Level::INFO.into())
                .add_directive("tampering_detector=info".parse()?),
        )
        .init();
    Ok(())
}

fn load_directory(config: &AppConfig) -> Result<Arc<dyn PlayerDirectory>> {
    let enrichment = &config.enrichment;
    if let Some(db) = &enrichment.directory_db {
        let dir = SqlitePlayerDirectory::new(db)?;
        if let Some(roster) = &enrichment.roster_path {
            let seed = MemoryPlayerDirectory::from_roster_file(roster)?;
            let players: Vec<_> = seed.players().cloned().collect();
            let n = dir.import(&players)?;
            info!("📥 Imported {} roster players into {}", n, db);
        }
        return Ok(Arc::new(dir));
    }
    match &enrichment.roster_path {
        Some(roster) => Ok(Arc::new(MemoryPlayerDirectory::from_roster_file(roster)?)),
        None => bail!("[enrichment] needs roster_path or directory_db to resolve players"),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    init_tracing()?;

    let args = Args::parse();
    let config = AppConfig::load(&args.config)?;

    info!("🏀 Starting tampering detector");
    info!("  Config: {}", args.config.display());
    info!("  Data dir: {}", args.data_dir.display());
    info!(
        "  Window: {}s, watermark delay: {}s, idle: {}s, lateness: {}s",
        config.application.window.seconds,
        config.application.watermark.seconds,
        config.application.idle.seconds,
        config.application.lateness.seconds
    );
    info!("  Mention streams: {:?}", config.mention_consumer.streams);
    info!("  Lanes: {}", config.runtime.lanes);

    let directory = load_directory(&config)?;
    let enricher = Enricher::new(directory, config.enrichment.lookup_timeout());

    let stats = Arc::new(PipelineStats::default());
    let producer = &config.producer;
    let (alerts, alert_task) = match &config.notify.webhook_url {
        Some(url) => {
            let notifier = Notifier::new(url.clone(), config.notify.subject.clone())?;
            let (sender, task) = notifier.spawn(ALERT_QUEUE_CAPACITY, stats.clone());
            (Some(sender), Some(task))
        }
        None => (None, None),
    };
    let hub = SinkHub::new(
        Arc::new(JsonlFileSink::create(&args.data_dir, &producer.stream).await?),
        Arc::new(JsonlFileSink::create(&args.data_dir, &producer.late_stream).await?),
        Arc::new(JsonlFileSink::create(&args.data_dir, &producer.audit_stream).await?),
        stats.clone(),
    )
    .with_alerts(alerts);

    if let Some(port) = args.stats_port {
        let stats = stats.clone();
        tokio::spawn(async move {
            if let Err(e) = start_stats_server(port, stats).await {
                warn!("Stats server stopped: {:#}", e);
            }
        });
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("Shutdown signal received");
        shutdown_tx.send(true).ok();
        // Keep the sender alive so readers observe the flag.
        std::future::pending::<()>().await;
    });

    let runtime = Runtime::new(RuntimeOptions::from_config(&config), enricher, hub, stats);
    let summary = runtime
        .run_files(
            &args.data_dir,
            &config.control_consumer.stream,
            &config.mention_consumer.streams,
            shutdown_rx,
        )
        .await
        .context("pipeline run failed")?;

    // Dropping the runtime drops the last alert sender; give queued alerts a
    // bounded chance to go out.
    drop(runtime);
    if let Some(task) = alert_task {
        if tokio::time::timeout(ALERT_DRAIN_GRACE, task).await.is_err() {
            warn!("Alert queue not drained within {:?}", ALERT_DRAIN_GRACE);
        }
    }

    info!(
        "Tampering detector stopped: {} results, {} late, {} audited (flushed: {})",
        summary.stats.results_emitted,
        summary.stats.late_records,
        summary.stats.audit_records,
        summary.flushed
    );
    Ok(())
}

async fn start_stats_server(port: u16, stats: Arc<PipelineStats>) -> Result<()> {
    let app = Router::new()
        .route("/health", get(|| async { "OK" }))
        .route(
            "/stats",
            get(move || {
                let snapshot = stats.snapshot();
                async move { Json(snapshot) }
            }),
        );

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port))
        .await
        .with_context(|| format!("Failed to bind stats port {}", port))?;

    info!("Stats server listening on port {}", port);
    axum::serve(listener, app).await?;
    Ok(())
}
