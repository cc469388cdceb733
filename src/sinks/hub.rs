//! Routes tagged output records to their port's sink.

use crate::runtime::stats::PipelineStats;
use crate::sinks::{AlertSender, RecordSink};
use crate::stream::output::{OutputPort, OutputRecord};
use std::sync::Arc;
use tracing::warn;

pub struct SinkHub {
    primary: Arc<dyn RecordSink>,
    late: Arc<dyn RecordSink>,
    audit: Arc<dyn RecordSink>,
    alerts: Option<AlertSender>,
    stats: Arc<PipelineStats>,
}

impl SinkHub {
    pub fn new(
        primary: Arc<dyn RecordSink>,
        late: Arc<dyn RecordSink>,
        audit: Arc<dyn RecordSink>,
        stats: Arc<PipelineStats>,
    ) -> Self {
        Self {
            primary,
            late,
            audit,
            alerts: None,
            stats,
        }
    }

    /// Queue primary results for alerting. See [`crate::sinks::Notifier::spawn`].
    pub fn with_alerts(mut self, alerts: Option<AlertSender>) -> Self {
        self.alerts = alerts;
        self
    }

    fn sink(&self, port: OutputPort) -> &Arc<dyn RecordSink> {
        match port {
            OutputPort::Primary => &self.primary,
            OutputPort::Late => &self.late,
            OutputPort::Audit => &self.audit,
        }
    }

    /// Deliver one record. Never fails: errors are logged and counted.
    pub async fn route(&self, record: &OutputRecord) {
        let port = record.port();
        match port {
            OutputPort::Primary => PipelineStats::incr(&self.stats.results_emitted),
            OutputPort::Late => PipelineStats::incr(&self.stats.late_records),
            OutputPort::Audit => PipelineStats::incr(&self.stats.audit_records),
        }

        let sink = self.sink(port);
        match record.to_wire() {
            Ok(line) => {
                if let Err(e) = sink.send(&line).await {
                    PipelineStats::incr(&self.stats.sink_errors);
                    warn!(sink = sink.name(), port = %port, error = %e, "sink write failed");
                }
            }
            Err(e) => {
                PipelineStats::incr(&self.stats.sink_errors);
                warn!(port = %port, error = %e, "record serialization failed");
            }
        }

        if let (Some(alerts), OutputRecord::Tampering(result)) = (&self.alerts, record) {
            alerts.offer(result);
        }
    }

    pub async fn route_all(&self, records: &[OutputRecord]) {
        for record in records {
            self.route(record).await;
        }
    }
}
