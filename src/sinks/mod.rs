//! Output sinks.
//!
//! One [`RecordSink`] per output port plus an optional alert notifier. Sinks
//! are fail-open: a failed write is logged and counted, and processing
//! continues.

pub mod hub;
pub mod notifier;

pub use hub::SinkHub;
pub use notifier::{AlertSender, Notifier, ALERT_QUEUE_CAPACITY};

use crate::transport::StreamWriter;
use anyhow::Result;
use std::path::Path;
use std::sync::Arc;

#[async_trait::async_trait]
pub trait RecordSink: Send + Sync {
    fn name(&self) -> &str;

    /// Deliver one serialized record.
    async fn send(&self, record: &str) -> Result<()>;
}

/// Appends records to a JSONL stream file.
pub struct JsonlFileSink {
    name: String,
    writer: tokio::sync::Mutex<StreamWriter>,
}

impl JsonlFileSink {
    pub async fn create(data_dir: &Path, stream: &str) -> Result<Self> {
        let writer = StreamWriter::create(data_dir, stream).await?;
        Ok(Self {
            name: stream.to_string(),
            writer: tokio::sync::Mutex::new(writer),
        })
    }
}

#[async_trait::async_trait]
impl RecordSink for JsonlFileSink {
    fn name(&self) -> &str {
        &self.name
    }

    async fn send(&self, record: &str) -> Result<()> {
        self.writer.lock().await.append(record).await
    }
}

/// Collects records in memory. Used by replay tooling and tests.
#[derive(Default)]
pub struct MemorySink {
    name: String,
    records: parking_lot::Mutex<Vec<String>>,
}

impl MemorySink {
    pub fn new(name: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            records: parking_lot::Mutex::new(Vec::new()),
        })
    }

    pub fn records(&self) -> Vec<String> {
        self.records.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }
}

#[async_trait::async_trait]
impl RecordSink for MemorySink {
    fn name(&self) -> &str {
        &self.name
    }

    async fn send(&self, record: &str) -> Result<()> {
        self.records.lock().push(record.to_string());
        Ok(())
    }
}
