//! Control Gate
//!
//! Two-input join between control-state updates and enriched contacts, folded
//! through one sequential state machine. Both inputs arrive on one tagged
//! channel (`GateInput`), so a team's updates and queries are serialized by
//! construction.
//!
//! - `Control`: applied to the tracker, emits nothing.
//! - `Contact`: forwarded unchanged unless the source player's team is
//!   currently restricted, in which case it is suppressed.

use crate::models::{Contact, ControlChange};
use crate::stream::control::ControlTracker;
use crate::stream::watermark::SourceId;
use tracing::trace;

/// A contact together with the ingestion source it was read from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourcedContact {
    pub source: SourceId,
    pub contact: Contact,
}

impl SourcedContact {
    pub fn new(source: SourceId, contact: Contact) -> Self {
        Self { source, contact }
    }

    /// Team whose control flag decides this contact.
    #[inline]
    pub fn control_team(&self) -> &str {
        &self.contact.source.team
    }
}

/// Tagged gate input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateInput {
    Control(ControlChange),
    Contact(SourcedContact),
}

impl GateInput {
    /// Partition key: the team whose control state this input reads or writes.
    pub fn team(&self) -> &str {
        match self {
            GateInput::Control(change) => &change.team,
            GateInput::Contact(sourced) => sourced.control_team(),
        }
    }
}

/// Gate counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GateStats {
    pub controls_applied: u64,
    pub contacts_passed: u64,
    pub contacts_suppressed: u64,
}

#[derive(Debug, Default)]
pub struct ControlGate {
    tracker: ControlTracker,
    stats: GateStats,
}

impl ControlGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Process one input. Returns the contact when it passes the gate.
    pub fn process(&mut self, input: GateInput) -> Option<SourcedContact> {
        match input {
            GateInput::Control(change) => {
                self.tracker.apply(&change);
                self.stats.controls_applied += 1;
                None
            }
            GateInput::Contact(sourced) => {
                if self.tracker.currently_restricted(sourced.control_team()) {
                    self.stats.contacts_suppressed += 1;
                    trace!(
                        team = sourced.control_team(),
                        contact = %sourced.contact,
                        "contact suppressed: team under control"
                    );
                    None
                } else {
                    self.stats.contacts_passed += 1;
                    Some(sourced)
                }
            }
        }
    }

    pub fn tracker(&self) -> &ControlTracker {
        &self.tracker
    }

    pub fn stats(&self) -> GateStats {
        self.stats
    }
}
