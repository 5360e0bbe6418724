//! Track player seam
//!
//! The external music service is reached through `TrackPlayer`. The engine
//! only ever asks it to start a track; timeouts and retries belong to the
//! implementation.

use async_trait::async_trait;
use hrmix_common::TrackId;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use thiserror::Error;
use tracing::info;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PlayerError {
    /// No device is available to play on
    #[error("No active playback device")]
    NoActiveDevice,

    /// The service refused the request
    #[error("Play request rejected: {0}")]
    Rejected(String),
}

#[async_trait]
pub trait TrackPlayer: Send + Sync {
    async fn play_track(&self, track_id: &TrackId) -> Result<(), PlayerError>;
}

/// Player that only logs, for running without a music service
///
/// Can be told to reject every request to emulate a missing device.
#[derive(Debug, Default)]
pub struct LoggingPlayer {
    reject: AtomicBool,
    played: AtomicUsize,
}

impl LoggingPlayer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rejecting() -> Self {
        let player = Self::default();
        player.set_reject(true);
        player
    }

    pub fn set_reject(&self, reject: bool) {
        self.reject.store(reject, Ordering::Relaxed);
    }

    /// Number of accepted play requests
    pub fn played_count(&self) -> usize {
        self.played.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl TrackPlayer for LoggingPlayer {
    async fn play_track(&self, track_id: &TrackId) -> Result<(), PlayerError> {
        if self.reject.load(Ordering::Relaxed) {
            return Err(PlayerError::NoActiveDevice);
        }
        self.played.fetch_add(1, Ordering::Relaxed);
        info!("▶ Now playing {}", track_id);
        Ok(())
    }
}
