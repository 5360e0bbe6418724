//! Track and audio feature models

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable track identifier, as found in the last segment of a track URI
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TrackId(String);

impl TrackId {
    /// Wrap an already-extracted identifier
    pub fn new(id: impl Into<String>) -> Result<Self> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(Error::InvalidTrackId("empty track id".to_string()));
        }
        Ok(Self(id))
    }

    /// Extract the identifier from a `<scheme>:track:<id>` URI
    ///
    /// A value without any `:` is taken to be a bare id.
    pub fn from_uri(uri: &str) -> Result<Self> {
        let uri = uri.trim();
        if !uri.contains(':') {
            return Self::new(uri);
        }

        let mut parts = uri.split(':');
        match (parts.next(), parts.next(), parts.next(), parts.next()) {
            (Some(_), Some(_), Some(id), None) if !id.is_empty() => Ok(Self(id.to_string())),
            _ => Err(Error::InvalidTrackId(format!("malformed track URI: {}", uri))),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TrackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A playable track from an imported playlist
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Song {
    pub id: TrackId,
    pub name: String,
    pub artist: String,
}

impl Song {
    pub fn new(id: TrackId, name: impl Into<String>, artist: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            artist: artist.into(),
        }
    }

    /// Build a song from a playlist row's track URI
    pub fn from_uri(uri: &str, name: impl Into<String>, artist: impl Into<String>) -> Result<Self> {
        Ok(Self::new(TrackId::from_uri(uri)?, name, artist))
    }
}

/// Audio analysis values for one track
///
/// `tempo` is in BPM; the other three are normalised to 0.0-1.0.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AudioFeatures {
    pub tempo: f64,
    pub energy: f64,
    pub danceability: f64,
    pub valence: f64,
}

impl AudioFeatures {
    pub fn new(tempo: f64, energy: f64, danceability: f64, valence: f64) -> Self {
        Self {
            tempo,
            energy,
            danceability,
            valence,
        }
    }

    /// Reject values outside their documented ranges
    ///
    /// Out-of-range values are never clamped: a track with bad features is
    /// treated exactly like a track with no features.
    pub fn validate(&self, track: &TrackId) -> Result<()> {
        let invalid = |reason: String| Error::InvalidFeatures {
            track: track.to_string(),
            reason,
        };

        if !self.tempo.is_finite() || self.tempo <= 0.0 {
            return Err(invalid(format!("tempo must be > 0, got {}", self.tempo)));
        }

        for (name, value) in [
            ("energy", self.energy),
            ("danceability", self.danceability),
            ("valence", self.valence),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(invalid(format!("{} must be within 0..=1, got {}", name, value)));
            }
        }

        Ok(())
    }
}
