//! Watermark Generator
//!
//! Assigns event-time timestamps to gated contacts and tracks a monotonic
//! watermark across parallel ingestion sources.
//!
//! # Bounded Out-of-Orderness
//!
//! Per source: `source_watermark = max_event_time_seen - bounded_delay`.
//! Overall: the minimum over all *active* sources, clamped so it never
//! decreases.
//!
//! # Idleness
//!
//! Idleness is measured in event time, not wall-clock time. The *frontier* is
//! the greatest event time observed on any source. Each source remembers the
//! frontier at its last arrival; a source whose last arrival lags the current
//! frontier by more than `idle_timeout` is idle and excluded from the minimum.
//! It rejoins on its next event with its own max-seen timestamp. The source
//! that set the frontier is never idle, so the active set is never empty once
//! any event has been seen.
//!
//! Registered sources that have produced nothing hold the watermark back until
//! they too exceed the idle timeout, measured from the first event observed.
//!
//! Because every input is an event timestamp, the watermark sequence is a pure
//! function of the event log and replays identically.

use crate::stream::clock::{Millis, Watermark};
use crate::stream::gate::SourcedContact;
use std::collections::BTreeMap;
use tracing::debug;

/// Identifies one ingestion source (one mention stream or shard).
pub type SourceId = u32;

/// A gated contact with its assigned event-time timestamp.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimestampedContact {
    pub timestamp: Millis,
    pub sourced: SourcedContact,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct SourceProgress {
    max_event_time: Option<Millis>,
    /// Frontier value when this source last delivered an event.
    frontier_at_last_arrival: Option<Millis>,
}

/// Snapshot of one source, for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceStatus {
    pub source: SourceId,
    pub max_event_time: Option<Millis>,
    pub idle: bool,
}

#[derive(Debug, Clone)]
pub struct WatermarkGenerator {
    bounded_delay: Millis,
    idle_timeout: Millis,
    sources: BTreeMap<SourceId, SourceProgress>,
    /// Greatest event time seen on any source.
    frontier: Option<Millis>,
    first_event_time: Option<Millis>,
    current: Watermark,
}

impl WatermarkGenerator {
    pub fn new(bounded_delay: Millis, idle_timeout: Millis) -> Self {
        Self {
            bounded_delay: bounded_delay.max(0),
            idle_timeout: idle_timeout.max(0),
            sources: BTreeMap::new(),
            frontier: None,
            first_event_time: None,
            current: Watermark::MIN,
        }
    }

    /// Declare a source up front so it holds the watermark until it either
    /// produces data or goes idle.
    pub fn register_source(&mut self, source: SourceId) {
        self.sources.entry(source).or_default();
    }

    /// Extract the event timestamp and record source progress.
    pub fn assign(&mut self, sourced: SourcedContact) -> TimestampedContact {
        let ts = sourced.contact.event_time;

        let frontier = self.frontier.map_or(ts, |f| f.max(ts));
        self.frontier = Some(frontier);
        self.first_event_time.get_or_insert(ts);

        let progress = self.sources.entry(sourced.source).or_default();
        progress.max_event_time = Some(progress.max_event_time.map_or(ts, |m| m.max(ts)));
        progress.frontier_at_last_arrival = Some(frontier);

        TimestampedContact {
            timestamp: ts,
            sourced,
        }
    }

    /// Recompute the watermark. Never returns less than a previous result.
    pub fn advance(&mut self) -> Watermark {
        let Some(frontier) = self.frontier else {
            return self.current;
        };

        let mut min_active: Option<Millis> = None;
        for progress in self.sources.values() {
            if self.is_idle(progress, frontier) {
                continue;
            }
            match progress.max_event_time {
                Some(max) => {
                    min_active = Some(min_active.map_or(max, |m| m.min(max)));
                }
                // An active source with no data yet holds everything back.
                None => return self.current,
            }
        }

        if let Some(min) = min_active {
            let candidate = Watermark(min.saturating_sub(self.bounded_delay));
            if self.current.advance_to(candidate) {
                debug!(watermark = %self.current, "watermark advanced");
            }
        }
        self.current
    }

    /// Current watermark without recomputation.
    #[inline]
    pub fn current(&self) -> Watermark {
        self.current
    }

    pub fn frontier(&self) -> Option<Millis> {
        self.frontier
    }

    pub fn source_status(&self) -> Vec<SourceStatus> {
        let frontier = self.frontier;
        self.sources
            .iter()
            .map(|(&source, progress)| SourceStatus {
                source,
                max_event_time: progress.max_event_time,
                idle: frontier.is_some_and(|f| self.is_idle(progress, f)),
            })
            .collect()
    }

    fn is_idle(&self, progress: &SourceProgress, frontier: Millis) -> bool {
        let anchor = progress
            .frontier_at_last_arrival
            .or(self.first_event_time)
            .unwrap_or(frontier);
        frontier.saturating_sub(anchor) > self.idle_timeout
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Contact, Player};

    fn sourced(source: SourceId, t: Millis) -> SourcedContact {
        SourcedContact::new(
            source,
            Contact::new(
                t,
                Player::new("a", "A", "LAL"),
                Player::new("b", "B", "BKN"),
            ),
        )
    }

    #[test]
    fn test_assign_uses_event_time() {
        let mut gen = WatermarkGenerator::new(5_000, 60_000);
        let stamped = gen.assign(sourced(0, 42_000));
        assert_eq!(stamped.timestamp, 42_000);
        assert_eq!(stamped.sourced.source, 0);
    }

    #[test]
    fn test_no_events_keeps_min() {
        let mut gen = WatermarkGenerator::new(5_000, 60_000);
        assert_eq!(gen.advance(), Watermark::MIN);
    }

    #[test]
    fn test_bounded_delay() {
        let mut gen = WatermarkGenerator::new(5_000, 60_000);
        gen.assign(sourced(0, 20_000));
        assert_eq!(gen.advance(), Watermark(15_000));

        // Out-of-order event does not pull the watermark back.
        gen.assign(sourced(0, 10_000));
        assert_eq!(gen.advance(), Watermark(15_000));

        gen.assign(sourced(0, 30_000));
        assert_eq!(gen.advance(), Watermark(25_000));
    }

    #[test]
    fn test_minimum_across_active_sources() {
        let mut gen = WatermarkGenerator::new(0, 60_000);
        gen.assign(sourced(0, 10_000));
        gen.assign(sourced(1, 4_000));
        assert_eq!(gen.advance(), Watermark(4_000));

        gen.assign(sourced(1, 12_000));
        assert_eq!(gen.advance(), Watermark(10_000));
    }

    #[test]
    fn test_registered_silent_source_holds_until_idle() {
        let mut gen = WatermarkGenerator::new(0, 10_000);
        gen.register_source(0);
        gen.register_source(1);

        gen.assign(sourced(0, 1_000));
        assert_eq!(gen.advance(), Watermark::MIN);

        gen.assign(sourced(0, 11_000));
        // Frontier moved exactly idle_timeout since the first event: not longer.
        assert_eq!(gen.advance(), Watermark::MIN);

        gen.assign(sourced(0, 11_001));
        assert_eq!(gen.advance(), Watermark(11_001));
    }

    #[test]
    fn test_source_status_reports_idle() {
        let mut gen = WatermarkGenerator::new(0, 1_000);
        gen.assign(sourced(0, 0));
        gen.assign(sourced(1, 5_000));
        let status = gen.source_status();
        assert_eq!(status.len(), 2);
        assert!(status[0].idle);
        assert!(!status[1].idle);
        assert_eq!(gen.frontier(), Some(5_000));
    }
}
