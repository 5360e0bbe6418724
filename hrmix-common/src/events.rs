//! Event types for the hrmix event system
//!
//! Provides the shared event definitions and the EventBus used by the
//! playback service to publish "now playing" and error notifications.

use crate::models::TrackId;
use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::broadcast;

/// hrmix event types
///
/// Events are broadcast via EventBus and serialize with a `type` tag so a UI
/// adapter can forward them unchanged.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum HrmixEvent {
    /// A heart-rate sample was accepted from the sensor adapter
    HeartRateSampled {
        bpm: u16,
        /// Label of the zone the sample falls in
        zone: String,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A new playlist replaced the song pool
    PlaylistLoaded {
        song_count: usize,
        /// Songs that have audio features attached
        scoreable_count: usize,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Audio features were merged into the feature store
    FeaturesUpdated {
        accepted: usize,
        rejected: usize,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// The engine switched to a new song (a play command was dispatched)
    SongSwitched {
        track_id: TrackId,
        reason: SwitchReason,
        /// Heart rate the selection was made for, if one was buffered
        bpm: Option<u16>,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A recoverable engine error
    EngineError {
        kind: EngineErrorKind,
        detail: String,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// The heart-rate sensor went away; periodic evaluation stopped
    SensorDisconnected {
        timestamp: chrono::DateTime<chrono::Utc>,
    },
}

impl HrmixEvent {
    /// Get event type as string for filtering
    pub fn event_type(&self) -> &str {
        match self {
            HrmixEvent::HeartRateSampled { .. } => "HeartRateSampled",
            HrmixEvent::PlaylistLoaded { .. } => "PlaylistLoaded",
            HrmixEvent::FeaturesUpdated { .. } => "FeaturesUpdated",
            HrmixEvent::SongSwitched { .. } => "SongSwitched",
            HrmixEvent::EngineError { .. } => "EngineError",
            HrmixEvent::SensorDisconnected { .. } => "SensorDisconnected",
        }
    }
}

// ========================================
// Supporting Enums
// ========================================

/// Why the engine switched songs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SwitchReason {
    /// Nothing was playing yet
    Initial,
    /// A new playlist was loaded
    PlaylistLoaded,
    /// Current song's tempo left the strict band around the heart rate
    TempoOutOfBand,
    /// Current song's energy is too far from the zone's target energy
    EnergyMismatch,
    /// Current song has no audio features and is never defended
    Unscoreable,
    /// The user asked for a different song
    UserSkip,
}

impl fmt::Display for SwitchReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SwitchReason::Initial => "initial",
            SwitchReason::PlaylistLoaded => "playlist loaded",
            SwitchReason::TempoOutOfBand => "tempo out of band",
            SwitchReason::EnergyMismatch => "energy mismatch",
            SwitchReason::Unscoreable => "current song unscoreable",
            SwitchReason::UserSkip => "user skip",
        };
        f.write_str(s)
    }
}

/// Recoverable error conditions reported by the engine
///
/// None of these stop the evaluation loop; the worst outcome is that
/// nothing plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EngineErrorKind {
    /// Pool is non-empty but no song has features; an unscored pick was made
    NoScoreableSongs,
    /// There are no songs at all; nothing was played
    EmptyPool,
    /// The external player rejected a play command
    PlaybackDispatchFailed,
    /// A heart-rate reading was unusable (zero / no skin contact)
    InvalidHeartRate,
    /// A feature update contained out-of-range values
    InvalidFeatures,
}

impl fmt::Display for EngineErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            EngineErrorKind::NoScoreableSongs => "NoScoreableSongs",
            EngineErrorKind::EmptyPool => "EmptyPool",
            EngineErrorKind::PlaybackDispatchFailed => "PlaybackDispatchFailed",
            EngineErrorKind::InvalidHeartRate => "InvalidHeartRate",
            EngineErrorKind::InvalidFeatures => "InvalidFeatures",
        };
        f.write_str(s)
    }
}

// ========================================
// EventBus Implementation
// ========================================

/// Central event distribution bus
///
/// Thin wrapper over `tokio::sync::broadcast`. Slow subscribers lose the
/// oldest events once `capacity` is exceeded.
///
/// # Examples
///
/// ```
/// use hrmix_common::events::{EventBus, HrmixEvent};
///
/// let bus = EventBus::new(16);
/// let mut rx = bus.subscribe();
/// bus.emit_lossy(HrmixEvent::SensorDisconnected { timestamp: chrono::Utc::now() });
/// assert!(matches!(rx.try_recv(), Ok(HrmixEvent::SensorDisconnected { .. })));
/// ```
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<HrmixEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus with specified channel capacity
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is 0; configuration loading rejects that value.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    ///
    /// Events emitted before subscription are not received.
    pub fn subscribe(&self) -> broadcast::Receiver<HrmixEvent> {
        self.tx.subscribe()
    }

    /// Emit an event, ignoring if no subscribers are listening
    pub fn emit_lossy(&self, event: HrmixEvent) {
        let _ = self.tx.send(event);
    }

    /// Get the current number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Get the configured channel capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
