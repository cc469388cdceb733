//! Duplicate mention suppression.
//!
//! Remembers the most recent `capacity` tweet ids in arrival order and drops
//! repeats. Mentions without an id always pass.

use std::collections::{HashSet, VecDeque};

#[derive(Debug)]
pub struct MentionDeduplicator {
    capacity: usize,
    seen: HashSet<String>,
    order: VecDeque<String>,
    duplicates: u64,
}

impl MentionDeduplicator {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            seen: HashSet::with_capacity(capacity.min(1 << 16)),
            order: VecDeque::new(),
            duplicates: 0,
        }
    }

    /// Returns `true` the first time an id is observed.
    pub fn first_sighting(&mut self, id: Option<&str>) -> bool {
        let Some(id) = id else {
            return true;
        };
        if self.seen.contains(id) {
            self.duplicates += 1;
            return false;
        }
        if self.order.len() == self.capacity {
            if let Some(evicted) = self.order.pop_front() {
                self.seen.remove(&evicted);
            }
        }
        self.seen.insert(id.to_string());
        self.order.push_back(id.to_string());
        true
    }

    pub fn duplicates(&self) -> u64 {
        self.duplicates
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}
