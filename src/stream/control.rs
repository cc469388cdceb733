//! Control Tracker
//!
//! Keeps, per team, the latest known league restriction flag derived from the
//! control-change stream.
//!
//! # Semantics
//! - Last write wins, by processing order within the team's partition.
//! - A removal stores `restricted = false`; the team stays a known key.
//! - A team never seen is not restricted (fail-open).
//!
//! The tracker is owned by exactly one lane; all of a team's control changes
//! and gate queries go through that lane, so no locking is involved.

use crate::models::ControlChange;
use std::collections::HashMap;
use tracing::debug;

/// Last applied state of one team.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControlEntry {
    pub restricted: bool,
    /// Sequence of the change that produced this entry.
    pub sequence: u64,
}

#[derive(Debug, Default)]
pub struct ControlTracker {
    teams: HashMap<String, ControlEntry>,
    changes_applied: u64,
}

impl ControlTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one control change, overwriting any prior value for the team.
    pub fn apply(&mut self, change: &ControlChange) {
        let restricted = change.restricted && !change.removal;
        let entry = ControlEntry {
            restricted,
            sequence: change.sequence,
        };
        let previous = self.teams.insert(change.team.clone(), entry);
        self.changes_applied += 1;

        debug!(
            team = %change.team,
            restricted,
            removal = change.removal,
            previous = ?previous.map(|e| e.restricted),
            "control change applied"
        );
    }

    /// Point-in-time query. Unseen teams are not restricted.
    #[inline]
    pub fn currently_restricted(&self, team: &str) -> bool {
        self.teams.get(team).map(|e| e.restricted).unwrap_or(false)
    }

    pub fn entry(&self, team: &str) -> Option<ControlEntry> {
        self.teams.get(team).copied()
    }

    pub fn is_known(&self, team: &str) -> bool {
        self.teams.contains_key(team)
    }

    pub fn known_teams(&self) -> usize {
        self.teams.len()
    }

    pub fn changes_applied(&self) -> u64 {
        self.changes_applied
    }
}
