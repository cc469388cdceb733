//! Tampering Detector Library
//!
//! Event-time detection of cross-team player contact ("tampering") from a
//! social-media mention stream, gated by a league team-control stream.
//! Exposes the stream core, ingestion, sinks and the tokio runtime for use by
//! the binaries and integration tests.

pub mod config;
pub mod ingest;
pub mod models;
pub mod replay;
pub mod runtime;
pub mod sinks;
pub mod stream;
pub mod transport;
