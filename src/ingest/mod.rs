//! Ingestion: raw payloads to core inputs.
//!
//! Mentions are parsed, de-duplicated by tweet id and enriched against the
//! player directory into `Contact`s. Control records are parsed into
//! `ControlChange`s. Anything that fails here is skipped with a log line and
//! never reaches the stream core.

pub mod control_record;
pub mod dedup;
pub mod directory;
pub mod enrichment;
pub mod mention;

pub use control_record::{control_from_value, parse_control, ControlRecordError};
pub use dedup::MentionDeduplicator;
pub use directory::{MemoryPlayerDirectory, PlayerDirectory, SqlitePlayerDirectory};
pub use enrichment::{Enricher, LookupMiss};
pub use mention::{MentionParseError, MentionRecord};
