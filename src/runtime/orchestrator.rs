//! Runtime orchestrator
//!
//! Wires the stages into tokio tasks connected by bounded channels:
//!
//! ```text
//!  control reader ─┐                     ┌─ gate lane 0 ─┐                     ┌─ window lane 0 ─┐
//!                  ├─ team hash ─────────┤      ...      ├─▶ watermark stage ─▶┤       ...       ├─▶ sink hub
//!  mention readers ┘ (dedup + enrich)    └─ gate lane N ─┘  (contacts, then    └─ window lane N ─┘
//!                                                            watermarks to all)
//! ```
//!
//! Each mention stream is one watermark source. Enrichment runs with bounded
//! concurrency per stream, so a slow lookup only holds its own slot. When all
//! inputs end, a final `Watermark::MAX` fires and closes every window. On a
//! shutdown signal the readers stop and no flush is performed.

use crate::config::AppConfig;
use crate::ingest::{parse_control, Enricher, MentionDeduplicator, MentionRecord};
use crate::runtime::lanes::{lane_for, run_gate_lane, run_window_lane, WindowLaneMsg};
use crate::runtime::stats::{PipelineStats, PipelineStatsSnapshot};
use crate::sinks::SinkHub;
use crate::stream::clock::Watermark;
use crate::stream::gate::{GateInput, SourcedContact};
use crate::stream::output::OutputRecord;
use crate::stream::pipeline::EngineSettings;
use crate::stream::watermark::{SourceId, WatermarkGenerator};
use crate::transport::StreamReader;
use anyhow::{Context, Result};
use futures_util::{stream, StreamExt};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RuntimeOptions {
    pub settings: EngineSettings,
    pub lanes: usize,
    pub channel_capacity: usize,
    pub max_in_flight: usize,
    pub dedup_capacity: usize,
}

impl RuntimeOptions {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            settings: config.engine_settings(),
            lanes: config.runtime.lanes.max(1),
            channel_capacity: config.runtime.channel_capacity.max(1),
            max_in_flight: config.enrichment.max_in_flight.max(1),
            dedup_capacity: config.enrichment.dedup_capacity,
        }
    }
}

/// Raw record channels feeding the runtime.
pub struct RuntimeInputs {
    pub controls: mpsc::Receiver<String>,
    /// One receiver per mention stream, index = source id
    pub mentions: Vec<mpsc::Receiver<String>>,
}

#[derive(Debug, Clone)]
pub struct RunSummary {
    pub final_watermark: Watermark,
    pub flushed: bool,
    pub stats: PipelineStatsSnapshot,
}

pub struct Runtime {
    options: RuntimeOptions,
    enricher: Enricher,
    hub: Arc<SinkHub>,
    stats: Arc<PipelineStats>,
}

impl Runtime {
    pub fn new(
        options: RuntimeOptions,
        enricher: Enricher,
        hub: SinkHub,
        stats: Arc<PipelineStats>,
    ) -> Self {
        Self {
            options,
            enricher,
            hub: Arc::new(hub),
            stats,
        }
    }

    pub fn stats(&self) -> Arc<PipelineStats> {
        self.stats.clone()
    }

    /// Open the stream files under `data_dir` and run until they are exhausted
    /// or `shutdown` flips to `true`.
    pub async fn run_files(
        &self,
        data_dir: &Path,
        control_stream: &str,
        mention_streams: &[String],
        shutdown: watch::Receiver<bool>,
    ) -> Result<RunSummary> {
        let capacity = self.options.channel_capacity;

        let control_reader = StreamReader::open(data_dir, control_stream).await?;
        let (control_tx, control_rx) = mpsc::channel(capacity);
        let mut readers = vec![spawn_reader(control_reader, control_tx, shutdown.clone())];

        let mut mention_rxs = Vec::with_capacity(mention_streams.len());
        for stream_name in mention_streams {
            let reader = StreamReader::open(data_dir, stream_name).await?;
            let (tx, rx) = mpsc::channel(capacity);
            readers.push(spawn_reader(reader, tx, shutdown.clone()));
            mention_rxs.push(rx);
        }

        let inputs = RuntimeInputs {
            controls: control_rx,
            mentions: mention_rxs,
        };
        let summary = self.run(inputs, shutdown).await?;

        for reader in readers {
            reader.await.context("stream reader panicked")??;
        }
        Ok(summary)
    }

    /// Run the full stage graph over already-open input channels.
    pub async fn run(
        &self,
        inputs: RuntimeInputs,
        shutdown: watch::Receiver<bool>,
    ) -> Result<RunSummary> {
        let opts = self.options;
        let lanes = opts.lanes;
        let capacity = opts.channel_capacity;

        // Sink hub
        let (out_tx, mut out_rx) = mpsc::channel::<OutputRecord>(capacity);
        let hub = self.hub.clone();
        let sink_task = tokio::spawn(async move {
            while let Some(record) = out_rx.recv().await {
                hub.route(&record).await;
            }
        });

        // Window lanes
        let mut window_txs = Vec::with_capacity(lanes);
        let mut window_tasks = Vec::with_capacity(lanes);
        for lane in 0..lanes {
            let (tx, rx) = mpsc::channel(capacity);
            window_txs.push(tx);
            window_tasks.push(tokio::spawn(run_window_lane(
                lane,
                opts.settings,
                rx,
                out_tx.clone(),
            )));
        }
        drop(out_tx);

        // Watermark stage
        let (admitted_tx, admitted_rx) = mpsc::channel::<SourcedContact>(capacity);
        let sources = inputs.mentions.len() as SourceId;
        let watermark_task = tokio::spawn(run_watermark_stage(
            opts.settings,
            sources,
            admitted_rx,
            window_txs,
            self.stats.clone(),
            shutdown.clone(),
        ));

        // Gate lanes
        let mut gate_txs = Vec::with_capacity(lanes);
        let mut gate_tasks = Vec::with_capacity(lanes);
        for lane in 0..lanes {
            let (tx, rx) = mpsc::channel(capacity);
            gate_txs.push(tx);
            gate_tasks.push(tokio::spawn(run_gate_lane(
                lane,
                rx,
                admitted_tx.clone(),
                self.stats.clone(),
            )));
        }
        drop(admitted_tx);

        // Readers → gate lanes
        let control_task = tokio::spawn(route_controls(
            inputs.controls,
            gate_txs.clone(),
            self.stats.clone(),
        ));
        let mut mention_tasks = Vec::with_capacity(inputs.mentions.len());
        for (source, rx) in inputs.mentions.into_iter().enumerate() {
            mention_tasks.push(tokio::spawn(route_mentions(
                source as SourceId,
                rx,
                gate_txs.clone(),
                self.enricher.clone(),
                opts,
                self.stats.clone(),
            )));
        }
        drop(gate_txs);

        // Drain in pipeline order.
        control_task.await.context("control router panicked")?;
        for task in mention_tasks {
            task.await.context("mention router panicked")?;
        }
        for task in gate_tasks {
            task.await.context("gate lane panicked")?;
        }
        let (final_watermark, flushed) =
            watermark_task.await.context("watermark stage panicked")?;
        for task in window_tasks {
            task.await.context("window lane panicked")?;
        }
        sink_task.await.context("sink hub panicked")?;

        let stats = self.stats.snapshot();
        info!(
            watermark = %final_watermark,
            flushed,
            results = stats.results_emitted,
            late = stats.late_records,
            audit = stats.audit_records,
            "🏁 run complete"
        );
        Ok(RunSummary {
            final_watermark,
            flushed,
            stats,
        })
    }
}

fn spawn_reader(
    mut reader: StreamReader,
    tx: mpsc::Sender<String>,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<Result<()>> {
    tokio::spawn(async move {
        if *shutdown.borrow() {
            debug!(stream = reader.stream(), "shutdown already requested; reader not started");
            return Ok(());
        }
        // Once the shutdown sender is gone, no stop signal can arrive.
        let mut watching = true;
        loop {
            let record = if watching {
                tokio::select! {
                    changed = shutdown.changed() => {
                        match changed {
                            Ok(()) if *shutdown.borrow() => {
                                debug!(stream = reader.stream(), "reader stopping on shutdown");
                                break;
                            }
                            Ok(()) => continue,
                            Err(_) => {
                                watching = false;
                                continue;
                            }
                        }
                    }
                    record = reader.next_record() => record?,
                }
            } else {
                reader.next_record().await?
            };

            match record {
                Some(line) => {
                    if tx.send(line).await.is_err() {
                        break;
                    }
                }
                None => {
                    info!(stream = reader.stream(), lines = reader.line_no(), "stream exhausted");
                    break;
                }
            }
        }
        Ok(())
    })
}

async fn route_controls(
    mut rx: mpsc::Receiver<String>,
    gate_txs: Vec<mpsc::Sender<GateInput>>,
    stats: Arc<PipelineStats>,
) {
    let mut sequence = 0u64;
    while let Some(raw) = rx.recv().await {
        PipelineStats::incr(&stats.controls_read);
        let change = match parse_control(&raw) {
            Ok(change) => change,
            Err(e) => {
                PipelineStats::incr(&stats.control_errors);
                warn!(error = %e, "skipping control record");
                continue;
            }
        };
        sequence += 1;
        let lane = lane_for(&change.team, gate_txs.len());
        let input = GateInput::Control(change.with_sequence(sequence));
        if gate_txs[lane].send(input).await.is_err() {
            break;
        }
    }
}

async fn route_mentions(
    source: SourceId,
    rx: mpsc::Receiver<String>,
    gate_txs: Vec<mpsc::Sender<GateInput>>,
    enricher: Enricher,
    opts: RuntimeOptions,
    stats: Arc<PipelineStats>,
) {
    let mut dedup = MentionDeduplicator::new(opts.dedup_capacity);
    let parse_stats = stats.clone();

    let raw = stream::unfold(rx, |mut rx| async move { rx.recv().await.map(|r| (r, rx)) });
    let contacts = raw
        .filter_map(move |payload| {
            PipelineStats::incr(&parse_stats.mentions_read);
            let parsed = match MentionRecord::parse(&payload) {
                Ok(mention) if dedup.first_sighting(mention.id.as_deref()) => Some(mention),
                Ok(mention) => {
                    PipelineStats::incr(&parse_stats.mentions_duplicate);
                    debug!(source, id = ?mention.id, "duplicate mention dropped");
                    None
                }
                Err(e) => {
                    PipelineStats::incr(&parse_stats.mention_parse_errors);
                    debug!(source, error = %e, "skipping mention");
                    None
                }
            };
            futures_util::future::ready(parsed)
        })
        .map(|mention| {
            let enricher = enricher.clone();
            async move { enricher.resolve(&mention).await }
        })
        .buffer_unordered(opts.max_in_flight);
    tokio::pin!(contacts);

    while let Some(resolved) = contacts.next().await {
        let contact = match resolved {
            Ok(contact) => contact,
            Err(miss) => {
                PipelineStats::incr(&stats.lookup_misses);
                debug!(source, reason = %miss, "lookup miss");
                continue;
            }
        };
        PipelineStats::incr(&stats.contacts_enriched);
        let lane = lane_for(&contact.source.team, gate_txs.len());
        let input = GateInput::Contact(SourcedContact::new(source, contact));
        if gate_txs[lane].send(input).await.is_err() {
            break;
        }
    }
}

/// Single owner of the watermark generator. Returns the final watermark and
/// whether an end-of-input flush was sent.
async fn run_watermark_stage(
    settings: EngineSettings,
    sources: SourceId,
    mut rx: mpsc::Receiver<SourcedContact>,
    window_txs: Vec<mpsc::Sender<WindowLaneMsg>>,
    stats: Arc<PipelineStats>,
    shutdown: watch::Receiver<bool>,
) -> (Watermark, bool) {
    let mut generator = WatermarkGenerator::new(settings.bounded_delay, settings.idle_timeout);
    for source in 0..sources {
        generator.register_source(source);
    }
    let mut broadcast = Watermark::MIN;

    while let Some(admitted) = rx.recv().await {
        let stamped = generator.assign(admitted);
        let contact = stamped.sourced.contact;
        let lane = lane_for(&contact.source.team, window_txs.len());
        if window_txs[lane].send(WindowLaneMsg::Contact(contact)).await.is_err() {
            return (broadcast, false);
        }

        let watermark = generator.advance();
        if watermark > broadcast {
            broadcast = watermark;
            stats.record_watermark(watermark.as_millis());
            for tx in &window_txs {
                if tx.send(WindowLaneMsg::Watermark(watermark)).await.is_err() {
                    return (broadcast, false);
                }
            }
        }
    }

    if *shutdown.borrow() {
        info!(watermark = %broadcast, "shutdown requested; open windows not flushed");
        return (broadcast, false);
    }
    for tx in &window_txs {
        // Lanes that already exited have nothing left to flush.
        let _ = tx.send(WindowLaneMsg::Watermark(Watermark::MAX)).await;
    }
    (Watermark::MAX, true)
}
