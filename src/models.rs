use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

use crate::stream::clock::{format_millis, Millis};

/// A resolved player. Sourced from the player directory, never mutated by the core.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Player {
    /// Social-media account handle (unique id)
    pub account: String,
    pub name: String,
    pub team: String,
}

impl Player {
    pub fn new(
        account: impl Into<String>,
        name: impl Into<String>,
        team: impl Into<String>,
    ) -> Self {
        Self {
            account: account.into(),
            name: name.into(),
            team: team.into(),
        }
    }
}

/// One mention of `destination` by `source`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Contact {
    /// Event time in epoch milliseconds
    pub event_time: Millis,
    #[serde(rename = "sourcePlayer")]
    pub source: Player,
    #[serde(rename = "destinationPlayer")]
    pub destination: Player,
}

impl Contact {
    pub fn new(event_time: Millis, source: Player, destination: Player) -> Self {
        Self {
            event_time,
            source,
            destination,
        }
    }

    /// Contacts between players of the same team are not tampering signals.
    #[inline]
    pub fn is_cross_team(&self) -> bool {
        self.source.team != self.destination.team
    }

    /// Window key: courting team (the source's) and the courted player's name.
    #[inline]
    pub fn window_key(&self) -> WindowKey {
        WindowKey::new(&self.source.team, &self.destination.name)
    }
}

impl fmt::Display for Contact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.source.name, self.destination.name)
    }
}

/// Upsert or removal of a team's restriction flag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlChange {
    pub team: String,
    pub restricted: bool,
    /// Removal of the team's control row; always carries `restricted = false`.
    pub removal: bool,
    /// Arrival order assigned by the reader of the control stream.
    pub sequence: u64,
}

impl ControlChange {
    pub fn upsert(team: impl Into<String>, restricted: bool) -> Self {
        Self {
            team: team.into(),
            restricted,
            removal: false,
            sequence: 0,
        }
    }

    pub fn removal(team: impl Into<String>) -> Self {
        Self {
            team: team.into(),
            restricted: false,
            removal: true,
            sequence: 0,
        }
    }

    pub fn with_sequence(mut self, sequence: u64) -> Self {
        self.sequence = sequence;
        self
    }
}

/// `(team, counterpart player name)`: identifies one tumbling window series.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct WindowKey {
    pub team: String,
    pub counterpart: String,
}

impl WindowKey {
    pub fn new(team: impl Into<String>, counterpart: impl Into<String>) -> Self {
        Self {
            team: team.into(),
            counterpart: counterpart.into(),
        }
    }
}

impl fmt::Display for WindowKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.team, self.counterpart)
    }
}

/// Primary-channel record: a team/player pair with more than one disallowed
/// contact inside one window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TamperingResult {
    pub team: String,
    #[serde(rename = "tamperingPlayer")]
    pub counterpart: String,
    pub total: u64,
    /// Distinct instigating players, sorted for stable output
    pub players: BTreeSet<String>,
    pub window_start: Millis,
    pub window_end: Millis,
}

impl TamperingResult {
    /// Human-readable alert line used by the notifier.
    pub fn summary(&self) -> String {
        let players: Vec<&str> = self.players.iter().map(String::as_str).collect();
        format!(
            "Players {} made {} cross-team mentions of {} ({}) in window [{}, {})",
            players.join(", "),
            self.total,
            self.counterpart,
            self.team,
            format_millis(self.window_start),
            format_millis(self.window_end),
        )
    }
}
