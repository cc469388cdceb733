//! Team-partitioned lanes.
//!
//! Every stateful stage is split into lanes by a stable hash of the team. A
//! team's control changes and contacts always land in the same gate lane, and
//! its windows always live in the same window lane, so each lane owns its
//! state outright.

use crate::models::Contact;
use crate::runtime::stats::PipelineStats;
use crate::stream::clock::Watermark;
use crate::stream::engine::{EngineStats, WindowEngine};
use crate::stream::gate::{ControlGate, GateInput, GateStats, SourcedContact};
use crate::stream::output::OutputRecord;
use crate::stream::pipeline::EngineSettings;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info};

const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

/// Stable team → lane assignment (FNV-1a), identical across runs and builds.
pub fn lane_for(team: &str, lanes: usize) -> usize {
    let hash = team
        .bytes()
        .fold(FNV_OFFSET, |h, b| (h ^ b as u64).wrapping_mul(FNV_PRIME));
    (hash % lanes.max(1) as u64) as usize
}

/// Messages into a window lane. FIFO order per lane: a contact is evaluated
/// against every watermark sent before it and none sent after.
#[derive(Debug, Clone)]
pub enum WindowLaneMsg {
    Contact(Contact),
    Watermark(Watermark),
}

/// One gate lane: applies control changes, forwards admitted contacts.
pub async fn run_gate_lane(
    lane: usize,
    mut rx: mpsc::Receiver<GateInput>,
    tx: mpsc::Sender<SourcedContact>,
    stats: Arc<PipelineStats>,
) -> GateStats {
    let mut gate = ControlGate::new();
    while let Some(input) = rx.recv().await {
        let is_contact = matches!(input, GateInput::Contact(_));
        match gate.process(input) {
            Some(admitted) => {
                if tx.send(admitted).await.is_err() {
                    debug!(lane, "watermark stage gone; gate lane stopping");
                    break;
                }
            }
            None if is_contact => PipelineStats::incr(&stats.contacts_suppressed),
            None => PipelineStats::incr(&stats.controls_applied),
        }
    }
    let gate_stats = gate.stats();
    debug!(
        lane,
        controls = gate_stats.controls_applied,
        passed = gate_stats.contacts_passed,
        suppressed = gate_stats.contacts_suppressed,
        "gate lane finished"
    );
    gate_stats
}

/// One window lane: owns a window engine for its share of the teams.
pub async fn run_window_lane(
    lane: usize,
    settings: EngineSettings,
    mut rx: mpsc::Receiver<WindowLaneMsg>,
    out: mpsc::Sender<OutputRecord>,
) -> EngineStats {
    let mut engine = WindowEngine::new(settings.window_size, settings.allowed_lateness);
    let mut produced = Vec::new();

    while let Some(msg) = rx.recv().await {
        match msg {
            WindowLaneMsg::Contact(contact) => {
                engine.on_contact(contact, &mut produced);
            }
            WindowLaneMsg::Watermark(watermark) => engine.advance(watermark, &mut produced),
        }
        for record in produced.drain(..) {
            if out.send(record).await.is_err() {
                debug!(lane, "sink hub gone; window lane stopping");
                return engine.stats();
            }
        }
    }

    let stats = engine.stats();
    info!(
        lane,
        opened = stats.windows_opened,
        fired = stats.windows_fired,
        results = stats.results_emitted,
        late = stats.late_accepted,
        live = engine.live_windows(),
        "window lane finished"
    );
    stats
}
