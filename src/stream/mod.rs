//! Event-Time Stream Core
//!
//! Detects cross-team contact toward a player while the contacting team is not
//! under a league control restriction.
//!
//! # Architecture
//!
//! ```text
//!  ControlChange ─┐
//!                 ▼
//!          ┌─────────────┐     ┌────────────────────┐     ┌──────────────┐
//!  Contact▶│ ControlGate │────▶│ WatermarkGenerator │────▶│ WindowEngine │
//!          │ (tracker)   │     │ (per-source min)   │     │ (tumbling)   │
//!          └─────────────┘     └────────────────────┘     └──────┬───────┘
//!                                                                │ reduce()
//!                                          ┌─────────────────────┼──────────────┐
//!                                          ▼                     ▼              ▼
//!                                       Primary                 Late          Audit
//! ```
//!
//! # Determinism Guarantees
//!
//! - **Clock**: no system time; the watermark is derived from event timestamps
//!   and passed explicitly into the window engine.
//! - **State**: control flags and window buffers are owned by one worker per
//!   key partition; nothing is shared.
//! - **Output**: windows fire in `(start, key)` order.

pub mod aggregate;
pub mod clock;
pub mod control;
pub mod engine;
pub mod gate;
pub mod output;
pub mod pipeline;
pub mod watermark;
pub mod windows;
#[cfg(test)]
mod pipeline_tests;

// Re-exports for convenience
pub use clock::{Millis, Watermark, MILLIS_PER_SEC};
pub use control::{ControlEntry, ControlTracker};
pub use engine::{Admission, EngineStats, WindowEngine, WindowPhase};
pub use gate::{ControlGate, GateInput, GateStats, SourcedContact};
pub use output::{OutputPort, OutputRecord};
pub use pipeline::{EngineSettings, Pipeline, PipelineCounters};
pub use watermark::{SourceId, TimestampedContact, WatermarkGenerator};
pub use windows::{TumblingWindows, WindowBounds};
