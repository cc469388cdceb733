//! Window Engine
//!
//! Buffers contacts into tumbling windows keyed by `(source team, destination
//! player name)` and fires them against an explicitly passed watermark.
//!
//! # Lifecycle (per key × interval)
//!
//! ```text
//!   first contact         watermark >= end        late contact
//!  ──────────────▶ Open ──────────────────▶ Fired ─────────────▶ LateAccepting
//!                   │                         │                      │
//!                   └─────────────────────────┴──────────────────────┘
//!                           watermark >= end + allowed_lateness
//!                                        ▼
//!                                     Closed (state dropped)
//! ```
//!
//! - Firing runs the aggregator once over the buffered contacts. A result goes
//!   to the primary port; every buffered contact goes to the audit port once.
//! - A contact for a fired-but-live window is stored, sent to the late port and
//!   to the audit port. The on-time aggregate is never re-fired.
//! - A contact whose window is already past allowed lateness is dropped and
//!   appears on no port.
//!
//! Contacts are evaluated against the watermark current at their arrival;
//! watermark advances are applied afterwards via [`WindowEngine::advance`].

use crate::models::{Contact, WindowKey};
use crate::stream::aggregate;
use crate::stream::clock::{Millis, Watermark};
use crate::stream::output::OutputRecord;
use crate::stream::windows::{TumblingWindows, WindowBounds};
use std::collections::BTreeMap;
use tracing::{debug, trace};

/// Lifecycle phase of a live window. `Closed` windows have no state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WindowPhase {
    Open,
    Fired,
    LateAccepting,
}

/// Identifies one window instance. Orders by start time, then key.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct WindowId {
    pub start: Millis,
    pub key: WindowKey,
}

#[derive(Debug, Clone)]
struct WindowCell {
    bounds: WindowBounds,
    phase: WindowPhase,
    contacts: Vec<Contact>,
}

/// What happened to one contact offered to the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// Buffered into an open window.
    Buffered,
    /// Accepted after firing; routed to the late and audit ports.
    Late,
    /// Past allowed lateness; discarded.
    Dropped,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EngineStats {
    pub windows_opened: u64,
    pub windows_fired: u64,
    pub windows_closed: u64,
    pub results_emitted: u64,
    pub late_accepted: u64,
}

#[derive(Debug)]
pub struct WindowEngine {
    assigner: TumblingWindows,
    allowed_lateness: Millis,
    watermark: Watermark,
    windows: BTreeMap<WindowId, WindowCell>,
    stats: EngineStats,
}

impl WindowEngine {
    pub fn new(window_size: Millis, allowed_lateness: Millis) -> Self {
        Self {
            assigner: TumblingWindows::new(window_size),
            allowed_lateness: allowed_lateness.max(0),
            watermark: Watermark::MIN,
            windows: BTreeMap::new(),
            stats: EngineStats::default(),
        }
    }

    /// Offer one contact. Output records (late/audit) are appended to `out`.
    pub fn on_contact(&mut self, contact: Contact, out: &mut Vec<OutputRecord>) -> Admission {
        let bounds = self.assigner.assign(contact.event_time);

        if bounds.is_expired(self.watermark, self.allowed_lateness) {
            trace!(
                contact = %contact,
                window = %bounds,
                watermark = %self.watermark,
                "contact past allowed lateness dropped"
            );
            return Admission::Dropped;
        }

        let id = WindowId {
            start: bounds.start,
            key: contact.window_key(),
        };
        let watermark = self.watermark;
        let stats = &mut self.stats;
        let cell = self.windows.entry(id).or_insert_with(|| {
            stats.windows_opened += 1;
            // A window first seen after its end has already passed fires with
            // no on-time contacts; it starts out accepting late data.
            let phase = if bounds.is_complete(watermark) {
                WindowPhase::Fired
            } else {
                WindowPhase::Open
            };
            WindowCell {
                bounds,
                phase,
                contacts: Vec::new(),
            }
        });

        match cell.phase {
            WindowPhase::Open => {
                cell.contacts.push(contact);
                Admission::Buffered
            }
            WindowPhase::Fired | WindowPhase::LateAccepting => {
                cell.phase = WindowPhase::LateAccepting;
                out.push(OutputRecord::Late(contact.clone()));
                out.push(OutputRecord::Audit(contact.clone()));
                cell.contacts.push(contact);
                self.stats.late_accepted += 1;
                Admission::Late
            }
        }
    }

    /// Move the watermark forward and fire / close every window it passes.
    ///
    /// A watermark behind the current one is ignored. Windows are processed in
    /// `(start, key)` order so output is deterministic.
    pub fn advance(&mut self, watermark: Watermark, out: &mut Vec<OutputRecord>) {
        if !self.watermark.advance_to(watermark) {
            return;
        }
        let watermark = self.watermark;
        let lateness = self.allowed_lateness;

        let mut expired = Vec::new();
        for (id, cell) in self.windows.iter_mut() {
            if !cell.bounds.is_complete(watermark) {
                // Later starts have later ends; nothing further can fire.
                break;
            }
            if cell.phase == WindowPhase::Open {
                Self::fire(&id.key, cell, &mut self.stats, out);
            }
            if cell.bounds.is_expired(watermark, lateness) {
                expired.push(id.clone());
            }
        }

        for id in expired {
            if let Some(cell) = self.windows.remove(&id) {
                self.stats.windows_closed += 1;
                trace!(key = %id.key, window = %cell.bounds, phase = ?cell.phase, "window closed");
            }
        }
    }

    fn fire(key: &WindowKey, cell: &mut WindowCell, stats: &mut EngineStats, out: &mut Vec<OutputRecord>) {
        cell.phase = WindowPhase::Fired;
        stats.windows_fired += 1;

        if let Some(result) = aggregate::reduce(key, cell.bounds, &cell.contacts) {
            debug!(
                team = %result.team,
                counterpart = %result.counterpart,
                total = result.total,
                window = %cell.bounds,
                "tampering detected"
            );
            stats.results_emitted += 1;
            out.push(OutputRecord::Tampering(result));
        }
        out.extend(cell.contacts.iter().cloned().map(OutputRecord::Audit));
    }

    #[inline]
    pub fn watermark(&self) -> Watermark {
        self.watermark
    }

    pub fn live_windows(&self) -> usize {
        self.windows.len()
    }

    /// Phase of a live window, `None` once closed or never opened.
    pub fn phase(&self, key: &WindowKey, start: Millis) -> Option<WindowPhase> {
        let id = WindowId {
            start,
            key: key.clone(),
        };
        self.windows.get(&id).map(|cell| cell.phase)
    }

    pub fn assigner(&self) -> TumblingWindows {
        self.assigner
    }

    pub fn stats(&self) -> EngineStats {
        self.stats
    }
}
