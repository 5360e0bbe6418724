//! Match state owned by the orchestrator

use super::history::RecentHistory;
use hrmix_common::TrackId;
use std::time::Instant;

/// Idle until the first song is chosen, Playing afterwards
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchPhase {
    Idle,
    Playing,
}

#[derive(Debug, Clone, Default)]
pub struct MatchState {
    pub current: Option<TrackId>,
    pub last_switch_at: Option<Instant>,
    pub recently_played: RecentHistory,
}

impl MatchState {
    pub fn new(recent_capacity: usize) -> Self {
        Self {
            current: None,
            last_switch_at: None,
            recently_played: RecentHistory::new(recent_capacity),
        }
    }

    pub fn phase(&self) -> MatchPhase {
        if self.current.is_some() {
            MatchPhase::Playing
        } else {
            MatchPhase::Idle
        }
    }

    /// Make `id` current as of `now`
    pub fn record_switch(&mut self, id: TrackId, now: Instant) {
        self.recently_played.record(id.clone());
        self.current = Some(id);
        self.last_switch_at = Some(now);
    }

    /// Back to Idle with an empty history
    pub fn reset(&mut self) {
        self.current = None;
        self.last_switch_at = None;
        self.recently_played.clear();
    }
}
