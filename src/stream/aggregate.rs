//! Per-window tampering reduction.
//!
//! Counts cross-team contacts and collects the distinct instigating players.
//! A result exists only when the count exceeds [`TAMPERING_THRESHOLD`].

use crate::models::{Contact, TamperingResult, WindowKey};
use crate::stream::windows::WindowBounds;
use std::collections::BTreeSet;

/// A window is reported when its cross-team contact count is strictly greater.
pub const TAMPERING_THRESHOLD: u64 = 1;

/// Reduce one window's buffered contacts.
pub fn reduce<'a, I>(key: &WindowKey, bounds: WindowBounds, contacts: I) -> Option<TamperingResult>
where
    I: IntoIterator<Item = &'a Contact>,
{
    let mut total = 0u64;
    let mut players = BTreeSet::new();

    for contact in contacts {
        if !contact.is_cross_team() {
            continue;
        }
        total += 1;
        players.insert(contact.source.name.clone());
    }

    if total <= TAMPERING_THRESHOLD {
        return None;
    }

    Some(TamperingResult {
        team: key.team.clone(),
        counterpart: key.counterpart.clone(),
        total,
        players,
        window_start: bounds.start,
        window_end: bounds.end,
    })
}
