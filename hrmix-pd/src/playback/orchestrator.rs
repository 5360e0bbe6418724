//! Playback orchestrator
//!
//! Owns the match state and the song pool, and turns inbound events
//! (heart-rate samples, playlist loads, ticks, disconnects) into commands.
//! It performs no I/O itself: every entry point takes the current instant
//! and returns the commands the caller should execute, in order.
//!
//! **Invariants:**
//! - At most one `PlayTrack` per entry point call
//! - `current` is updated before the play command leaves, so a rejected
//!   dispatch still leaves `current` pointing at the attempted song
//! - Ticks do nothing while disconnected

use crate::config::{DisconnectPolicy, MatchingConfig};
use crate::error::Result;
use crate::matching::{
    CandidateSelector, FeatureStore, FeatureUpdate, MatchPhase, MatchState, Selection,
    SongScorer, SwitchDecision, SwitchPolicy,
};
use hrmix_common::events::{EngineErrorKind, SwitchReason};
use hrmix_common::{AudioFeatures, Song, TrackId};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Side effect requested by the orchestrator
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Ask the external player to start this track (fire-and-forget)
    PlayTrack(TrackId),
    /// Tell listeners the current song changed
    ReportSwitch {
        track_id: TrackId,
        reason: SwitchReason,
        bpm: Option<u16>,
    },
    /// Report a recoverable error
    ReportError { kind: EngineErrorKind, detail: String },
}

impl Command {
    fn error(kind: EngineErrorKind, detail: impl Into<String>) -> Self {
        Command::ReportError {
            kind,
            detail: detail.into(),
        }
    }
}

pub struct Orchestrator<R: Rng = StdRng> {
    selector: CandidateSelector,
    policy: SwitchPolicy,
    disconnect_policy: DisconnectPolicy,
    playlist: Vec<Song>,
    /// Subset of `playlist` suggested by the recommendation channel
    recommended: Option<Vec<Song>>,
    features: FeatureStore,
    state: MatchState,
    latest_bpm: Option<u16>,
    connected: bool,
    rng: R,
    empty_pool_reported: bool,
}

impl Orchestrator<StdRng> {
    /// Build from configuration; `seed` makes selection reproducible
    pub fn from_config(config: &MatchingConfig, seed: Option<u64>) -> Result<Self> {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self::with_rng(config, rng)
    }
}

impl<R: Rng> Orchestrator<R> {
    pub fn with_rng(config: &MatchingConfig, rng: R) -> Result<Self> {
        config.validate()?;
        let zones = Arc::new(config.zone_table()?);
        let scorer = SongScorer::new(config.weights, config.bpm_tolerance, Arc::clone(&zones));
        let selector = CandidateSelector::new(scorer, config.selector_settings());
        let policy = SwitchPolicy::new(
            config.min_dwell(),
            config.strict_band,
            config.energy_switch_threshold,
            zones,
        );

        Ok(Self {
            selector,
            policy,
            disconnect_policy: config.disconnect_policy,
            playlist: Vec::new(),
            recommended: None,
            features: FeatureStore::new(),
            state: MatchState::new(config.recent_capacity),
            latest_bpm: None,
            connected: false,
            rng,
            empty_pool_reported: false,
        })
    }

    // ========================================
    // Inbound events
    // ========================================

    /// A heart-rate reading arrived; marks the sensor connected
    ///
    /// A reading of 0 means the sensor has no usable signal and is rejected
    /// without touching the buffered value.
    pub fn on_heart_rate_sample(&mut self, bpm: u16, now: Instant) -> Vec<Command> {
        if bpm == 0 {
            warn!("Ignoring heart-rate sample of 0 BPM");
            return vec![Command::error(
                EngineErrorKind::InvalidHeartRate,
                "heart rate of 0 BPM",
            )];
        }

        self.latest_bpm = Some(bpm);
        self.connected = true;

        if self.state.phase() == MatchPhase::Idle {
            debug!("First usable sample ({} BPM) while idle", bpm);
            return self.select_and_play(bpm, SwitchReason::Initial, now);
        }
        Vec::new()
    }

    /// Replace the song pool and feature store
    ///
    /// Recently played history is cleared; the last switch time is kept.
    pub fn on_playlist_loaded(
        &mut self,
        songs: Vec<Song>,
        features: impl IntoIterator<Item = (TrackId, AudioFeatures)>,
        now: Instant,
    ) -> Vec<Command> {
        let (store, update) = FeatureStore::from_entries(features);
        let mut commands = rejected_feature_reports(&update);

        self.playlist = songs;
        self.recommended = None;
        self.features = store;
        self.state.recently_played.clear();
        self.empty_pool_reported = false;

        info!(
            "Playlist loaded: {} songs, {} with features",
            self.playlist.len(),
            self.scoreable_count()
        );

        if self.playlist.is_empty() {
            commands.extend(self.report_empty_pool());
            return commands;
        }

        match self.latest_bpm {
            Some(bpm) => {
                commands.extend(self.select_and_play(bpm, SwitchReason::PlaylistLoaded, now));
            }
            None => {
                // No reading yet: start at the top of the list
                let first = self.playlist[0].id.clone();
                commands.extend(self.play(first, SwitchReason::PlaylistLoaded, None, now));
            }
        }
        commands
    }

    /// Periodic evaluation against the buffered heart rate
    pub fn on_tick(&mut self, now: Instant) -> Vec<Command> {
        if !self.connected {
            return Vec::new();
        }
        let Some(bpm) = self.latest_bpm else {
            return Vec::new();
        };
        if self.active_pool().is_empty() {
            return self.report_empty_pool();
        }

        let current_features = self
            .state
            .current
            .as_ref()
            .and_then(|id| self.features.get(id))
            .copied();

        match self
            .policy
            .should_switch(&self.state, f64::from(bpm), current_features.as_ref(), now)
        {
            SwitchDecision::Stay(why) => {
                debug!("Tick at {} BPM: staying ({:?})", bpm, why);
                Vec::new()
            }
            SwitchDecision::Switch(reason) => {
                debug!("Tick at {} BPM: switching ({})", bpm, reason);
                self.select_and_play(bpm, reason, now)
            }
        }
    }

    /// Sensor went away: forget the reading and stop evaluating
    pub fn on_disconnect(&mut self) {
        self.latest_bpm = None;
        self.connected = false;

        match self.disconnect_policy {
            DisconnectPolicy::Keep => {}
            DisconnectPolicy::ClearHistory => self.state.recently_played.clear(),
            DisconnectPolicy::ResetAll => self.state.reset(),
        }
        info!("Sensor disconnected ({:?})", self.disconnect_policy);
    }

    /// Merge a partial feature map into a new store snapshot
    pub fn on_features_updated(
        &mut self,
        partial: impl IntoIterator<Item = (TrackId, AudioFeatures)>,
    ) -> (FeatureUpdate, Vec<Command>) {
        let (store, update) = self.features.with_updates(partial);
        self.features = store;
        debug!(
            "Features updated: {} accepted, {} rejected",
            update.accepted,
            update.rejected.len()
        );
        let commands = rejected_feature_reports(&update);
        (update, commands)
    }

    /// User asked for a different song; dwell time does not apply
    ///
    /// The current song is never picked again unless it is the only one in
    /// the pool. Without a buffered heart rate the next song in pool order
    /// plays.
    pub fn skip(&mut self, now: Instant) -> Vec<Command> {
        if self.active_pool().is_empty() {
            return self.report_empty_pool();
        }

        match self.latest_bpm {
            Some(bpm) => {
                let current = self.state.current.clone();
                self.select_and_play_excluding(bpm, SwitchReason::UserSkip, current.as_ref(), now)
            }
            None => {
                let pool = self.active_pool();
                let next = match self
                    .state
                    .current
                    .as_ref()
                    .and_then(|id| pool.iter().position(|s| &s.id == id))
                {
                    Some(idx) => pool[(idx + 1) % pool.len()].id.clone(),
                    None => pool[0].id.clone(),
                };
                self.play(next, SwitchReason::UserSkip, None, now)
            }
        }
    }

    /// Narrow selection to recommended tracks that are in the playlist
    ///
    /// Returns false (and changes nothing) when none of them are.
    pub fn on_recommendations(&mut self, track_ids: &[TrackId]) -> bool {
        let subset: Vec<Song> = self
            .playlist
            .iter()
            .filter(|song| track_ids.contains(&song.id))
            .cloned()
            .collect();

        if subset.is_empty() {
            debug!(
                "Ignoring {} recommendations with no playlist overlap",
                track_ids.len()
            );
            return false;
        }

        info!("Selecting from {} recommended songs", subset.len());
        self.recommended = Some(subset);
        true
    }

    pub fn clear_recommendations(&mut self) {
        self.recommended = None;
    }

    // ========================================
    // Accessors
    // ========================================

    pub fn current_track(&self) -> Option<&TrackId> {
        self.state.current.as_ref()
    }

    pub fn state(&self) -> &MatchState {
        &self.state
    }

    pub fn latest_bpm(&self) -> Option<u16> {
        self.latest_bpm
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    pub fn playlist(&self) -> &[Song] {
        &self.playlist
    }

    /// Songs selection currently draws from
    pub fn active_pool(&self) -> &[Song] {
        self.recommended.as_deref().unwrap_or(&self.playlist)
    }

    pub fn features(&self) -> &FeatureStore {
        &self.features
    }

    /// Playlist songs that have audio features
    pub fn scoreable_count(&self) -> usize {
        self.playlist
            .iter()
            .filter(|song| self.features.contains(&song.id))
            .count()
    }

    pub fn zone_label(&self, bpm: u16) -> &str {
        &self.selector.scorer().zones().zone_for(f64::from(bpm)).label
    }

    // ========================================
    // Internals
    // ========================================

    fn select_and_play(&mut self, bpm: u16, reason: SwitchReason, now: Instant) -> Vec<Command> {
        self.select_and_play_excluding(bpm, reason, None, now)
    }

    /// Select with `exclude` removed from the pool, unless nothing else is left
    fn select_and_play_excluding(
        &mut self,
        bpm: u16,
        reason: SwitchReason,
        exclude: Option<&TrackId>,
        now: Instant,
    ) -> Vec<Command> {
        let active = self.recommended.as_deref().unwrap_or(&self.playlist);
        let remaining: Vec<Song> = match exclude {
            Some(id) => active.iter().filter(|s| &s.id != id).cloned().collect(),
            None => Vec::new(),
        };
        let pool = if remaining.is_empty() {
            active
        } else {
            &remaining[..]
        };
        let pool_len = pool.len();
        let selection = self.selector.select(
            pool,
            &self.features,
            f64::from(bpm),
            &self.state.recently_played,
            &mut self.rng,
        );

        let Some(Selection { song, score, band }) = selection else {
            return self.report_empty_pool();
        };

        let mut commands = Vec::with_capacity(3);
        if !score.is_finite() {
            warn!("No scoreable songs for {} BPM; playing {} unscored", bpm, song.id);
            commands.push(Command::error(
                EngineErrorKind::NoScoreableSongs,
                format!("no song in a pool of {} has audio features", pool_len),
            ));
        }
        debug!("Picked {} (score {:.3}, {:?})", song.id, score, band);
        commands.extend(self.play(song.id, reason, Some(bpm), now));
        commands
    }

    fn play(
        &mut self,
        track_id: TrackId,
        reason: SwitchReason,
        bpm: Option<u16>,
        now: Instant,
    ) -> Vec<Command> {
        info!("Switching to {} ({})", track_id, reason);
        self.state.record_switch(track_id.clone(), now);
        vec![
            Command::PlayTrack(track_id.clone()),
            Command::ReportSwitch {
                track_id,
                reason,
                bpm,
            },
        ]
    }

    fn report_empty_pool(&mut self) -> Vec<Command> {
        if self.empty_pool_reported {
            return Vec::new();
        }
        self.empty_pool_reported = true;
        warn!("Song pool is empty; nothing to play");
        vec![Command::error(EngineErrorKind::EmptyPool, "song pool is empty")]
    }
}

fn rejected_feature_reports(update: &FeatureUpdate) -> Vec<Command> {
    update
        .rejected
        .iter()
        .map(|(_, reason)| Command::error(EngineErrorKind::InvalidFeatures, reason.clone()))
        .collect()
}
