//! Lane-per-partition execution of the stream core on tokio.

pub mod lanes;
pub mod orchestrator;
pub mod stats;

pub use lanes::{lane_for, WindowLaneMsg};
pub use orchestrator::{RunSummary, Runtime, RuntimeInputs, RuntimeOptions};
pub use stats::{PipelineStats, PipelineStatsSnapshot};
