//! Single-Worker Pipeline
//!
//! Synchronous composition of the core: Gate → Watermark Generator → Window
//! Engine → Aggregator. One call per input, returning the tagged output
//! records that input produced. Used directly for deterministic replay and
//! tests; the lane runtime splits the same stages across tasks.

use crate::models::{Contact, ControlChange};
use crate::stream::clock::{secs_to_millis, Millis, Watermark};
use crate::stream::engine::{Admission, WindowEngine};
use crate::stream::gate::{ControlGate, GateInput, SourcedContact};
use crate::stream::output::OutputRecord;
use crate::stream::watermark::{SourceId, WatermarkGenerator};
use serde::{Deserialize, Serialize};

/// Engine timing parameters, all in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineSettings {
    pub window_size: Millis,
    pub bounded_delay: Millis,
    pub idle_timeout: Millis,
    pub allowed_lateness: Millis,
}

impl EngineSettings {
    pub fn from_secs(window: u64, watermark: u64, idle: u64, lateness: u64) -> Self {
        Self {
            window_size: secs_to_millis(window),
            bounded_delay: secs_to_millis(watermark),
            idle_timeout: secs_to_millis(idle),
            allowed_lateness: secs_to_millis(lateness),
        }
    }
}

/// Counters for one pipeline run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PipelineCounters {
    pub controls: u64,
    pub contacts_in: u64,
    pub contacts_suppressed: u64,
    pub contacts_buffered: u64,
    pub contacts_late: u64,
    pub results: u64,
}

pub struct Pipeline {
    gate: ControlGate,
    watermarks: WatermarkGenerator,
    windows: WindowEngine,
    counters: PipelineCounters,
}

impl Pipeline {
    pub fn new(settings: EngineSettings) -> Self {
        Self {
            gate: ControlGate::new(),
            watermarks: WatermarkGenerator::new(settings.bounded_delay, settings.idle_timeout),
            windows: WindowEngine::new(settings.window_size, settings.allowed_lateness),
            counters: PipelineCounters::default(),
        }
    }

    /// Declare an ingestion source before its first event.
    pub fn register_source(&mut self, source: SourceId) {
        self.watermarks.register_source(source);
    }

    /// Process one tagged input and return what it produced.
    pub fn process(&mut self, input: GateInput) -> Vec<OutputRecord> {
        let mut out = Vec::new();
        match &input {
            GateInput::Control(_) => self.counters.controls += 1,
            GateInput::Contact(_) => self.counters.contacts_in += 1,
        }
        let is_contact = matches!(input, GateInput::Contact(_));

        match self.gate.process(input) {
            Some(sourced) => {
                let stamped = self.watermarks.assign(sourced);
                match self.windows.on_contact(stamped.sourced.contact, &mut out) {
                    Admission::Buffered => self.counters.contacts_buffered += 1,
                    Admission::Late => self.counters.contacts_late += 1,
                    Admission::Dropped => {}
                }
                let watermark = self.watermarks.advance();
                self.windows.advance(watermark, &mut out);
            }
            None if is_contact => self.counters.contacts_suppressed += 1,
            None => {}
        }

        self.count_results(&out);
        out
    }

    pub fn apply_control(&mut self, change: ControlChange) -> Vec<OutputRecord> {
        self.process(GateInput::Control(change))
    }

    pub fn offer(&mut self, source: SourceId, contact: Contact) -> Vec<OutputRecord> {
        self.process(GateInput::Contact(SourcedContact::new(source, contact)))
    }

    /// End of input: fire and close every remaining window.
    pub fn finish(&mut self) -> Vec<OutputRecord> {
        let mut out = Vec::new();
        self.windows.advance(Watermark::MAX, &mut out);
        self.count_results(&out);
        out
    }

    fn count_results(&mut self, out: &[OutputRecord]) {
        self.counters.results += out
            .iter()
            .filter(|r| matches!(r, OutputRecord::Tampering(_)))
            .count() as u64;
    }

    pub fn watermark(&self) -> Watermark {
        self.windows.watermark()
    }

    pub fn counters(&self) -> PipelineCounters {
        self.counters
    }

    pub fn gate(&self) -> &ControlGate {
        &self.gate
    }

    pub fn windows(&self) -> &WindowEngine {
        &self.windows
    }

    pub fn watermarks(&self) -> &WatermarkGenerator {
        &self.watermarks
    }
}
