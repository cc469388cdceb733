//! Runtime counters.
//!
//! Lock-free counters shared by every runtime task, with a serializable
//! snapshot served on `/stats`.

use crate::stream::clock::Millis;
use serde::Serialize;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};

#[derive(Debug)]
pub struct PipelineStats {
    pub mentions_read: AtomicU64,
    pub mentions_duplicate: AtomicU64,
    pub mention_parse_errors: AtomicU64,
    pub lookup_misses: AtomicU64,
    pub contacts_enriched: AtomicU64,
    pub controls_read: AtomicU64,
    pub control_errors: AtomicU64,
    /// Control changes applied by a gate lane
    pub controls_applied: AtomicU64,
    pub contacts_suppressed: AtomicU64,
    pub results_emitted: AtomicU64,
    pub late_records: AtomicU64,
    pub audit_records: AtomicU64,
    pub sink_errors: AtomicU64,
    pub notifications_sent: AtomicU64,
    pub notifications_dropped: AtomicU64,
    /// Last watermark broadcast to the window lanes
    pub watermark: AtomicI64,
}

impl Default for PipelineStats {
    fn default() -> Self {
        Self {
            mentions_read: AtomicU64::new(0),
            mentions_duplicate: AtomicU64::new(0),
            mention_parse_errors: AtomicU64::new(0),
            lookup_misses: AtomicU64::new(0),
            contacts_enriched: AtomicU64::new(0),
            controls_read: AtomicU64::new(0),
            control_errors: AtomicU64::new(0),
            controls_applied: AtomicU64::new(0),
            contacts_suppressed: AtomicU64::new(0),
            results_emitted: AtomicU64::new(0),
            late_records: AtomicU64::new(0),
            audit_records: AtomicU64::new(0),
            sink_errors: AtomicU64::new(0),
            notifications_sent: AtomicU64::new(0),
            notifications_dropped: AtomicU64::new(0),
            watermark: AtomicI64::new(Millis::MIN),
        }
    }
}

impl PipelineStats {
    #[inline]
    pub fn incr(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_watermark(&self, watermark: Millis) {
        self.watermark.fetch_max(watermark, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> PipelineStatsSnapshot {
        let watermark = self.watermark.load(Ordering::Relaxed);
        PipelineStatsSnapshot {
            mentions_read: self.mentions_read.load(Ordering::Relaxed),
            mentions_duplicate: self.mentions_duplicate.load(Ordering::Relaxed),
            mention_parse_errors: self.mention_parse_errors.load(Ordering::Relaxed),
            lookup_misses: self.lookup_misses.load(Ordering::Relaxed),
            contacts_enriched: self.contacts_enriched.load(Ordering::Relaxed),
            controls_read: self.controls_read.load(Ordering::Relaxed),
            control_errors: self.control_errors.load(Ordering::Relaxed),
            controls_applied: self.controls_applied.load(Ordering::Relaxed),
            contacts_suppressed: self.contacts_suppressed.load(Ordering::Relaxed),
            results_emitted: self.results_emitted.load(Ordering::Relaxed),
            late_records: self.late_records.load(Ordering::Relaxed),
            audit_records: self.audit_records.load(Ordering::Relaxed),
            sink_errors: self.sink_errors.load(Ordering::Relaxed),
            notifications_sent: self.notifications_sent.load(Ordering::Relaxed),
            notifications_dropped: self.notifications_dropped.load(Ordering::Relaxed),
            watermark: (watermark != Millis::MIN).then_some(watermark),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PipelineStatsSnapshot {
    pub mentions_read: u64,
    pub mentions_duplicate: u64,
    pub mention_parse_errors: u64,
    pub lookup_misses: u64,
    pub contacts_enriched: u64,
    pub controls_read: u64,
    pub control_errors: u64,
    pub controls_applied: u64,
    pub contacts_suppressed: u64,
    pub results_emitted: u64,
    pub late_records: u64,
    pub audit_records: u64,
    pub sink_errors: u64,
    pub notifications_sent: u64,
    pub notifications_dropped: u64,
    pub watermark: Option<Millis>,
}
