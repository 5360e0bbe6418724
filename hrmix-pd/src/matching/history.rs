//! Recently played ring
//!
//! Bounded, ordered set of track ids. Inserting past capacity evicts the
//! oldest entry; re-inserting a present id moves it to the newest slot.

use hrmix_common::TrackId;
use std::collections::VecDeque;

pub const DEFAULT_RECENT_CAPACITY: usize = 5;

#[derive(Debug, Clone, PartialEq)]
pub struct RecentHistory {
    entries: VecDeque<TrackId>,
    capacity: usize,
}

impl RecentHistory {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Record a play; returns the evicted id, if any
    pub fn record(&mut self, id: TrackId) -> Option<TrackId> {
        if self.capacity == 0 {
            return None;
        }

        if let Some(pos) = self.entries.iter().position(|e| *e == id) {
            self.entries.remove(pos);
        }
        self.entries.push_back(id);

        if self.entries.len() > self.capacity {
            self.entries.pop_front()
        } else {
            None
        }
    }

    pub fn contains(&self, id: &TrackId) -> bool {
        self.entries.contains(id)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Oldest first
    pub fn iter(&self) -> impl Iterator<Item = &TrackId> {
        self.entries.iter()
    }
}

impl Default for RecentHistory {
    fn default() -> Self {
        Self::new(DEFAULT_RECENT_CAPACITY)
    }
}
