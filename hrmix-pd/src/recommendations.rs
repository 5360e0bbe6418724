//! Recommendation channel messages
//!
//! A remote recommender may suggest which playlist songs suit the current
//! heart rate. The hint is best-effort: the engine keeps selecting locally
//! whether or not an answer ever arrives. Only the message shapes live
//! here; the transport is the caller's business.

use crate::error::Result;
use crate::matching::FeatureStore;
use hrmix_common::{AudioFeatures, Song, TrackId};
use serde::{Deserialize, Serialize};

/// Lowest tempo ever requested
pub const MIN_REQUEST_BPM: f64 = 40.0;
/// Highest tempo ever requested
pub const MAX_REQUEST_BPM: f64 = 200.0;

/// Tempo window for a heart rate: ±10%, clamped to 40..=200
pub fn bpm_range_for(heart_rate: u16) -> (f64, f64) {
    let hr = f64::from(heart_rate);
    (
        (hr * 0.9).max(MIN_REQUEST_BPM),
        (hr * 1.1).min(MAX_REQUEST_BPM),
    )
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SongDescriptor {
    pub track_id: TrackId,
    pub track_name: String,
    pub artist_name: String,
    /// Absent when the song has no known features; never filled with guesses
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub features: Option<AudioFeatures>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecommendationRequest {
    pub bpm_range: (f64, f64),
    pub current_heart_rate: u16,
    pub songs: Vec<SongDescriptor>,
}

impl RecommendationRequest {
    pub fn for_pool(heart_rate: u16, songs: &[Song], features: &FeatureStore) -> Self {
        let songs = songs
            .iter()
            .map(|song| SongDescriptor {
                track_id: song.id.clone(),
                track_name: song.name.clone(),
                artist_name: song.artist.clone(),
                features: features.get(&song.id).copied(),
            })
            .collect();

        Self {
            bpm_range: bpm_range_for(heart_rate),
            current_heart_rate: heart_rate,
            songs,
        }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecommendationResponse {
    #[serde(default)]
    pub track_ids: Vec<TrackId>,
}

impl RecommendationResponse {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}
