//! Playlist files
//!
//! ```json
//! {
//!   "songs": [
//!     { "uri": "spotify:track:4uLU6hMCjMI75M1A2tKUQC", "name": "Song", "artist": "Artist" }
//!   ],
//!   "features": {
//!     "4uLU6hMCjMI75M1A2tKUQC": { "tempo": 120.0, "energy": 0.6, "danceability": 0.7, "valence": 0.5 }
//!   }
//! }
//! ```
//!
//! `features` may be omitted or cover only some songs. Songs whose URI does
//! not yield a track id are skipped with a warning.

use crate::error::{Error, Result};
use hrmix_common::{AudioFeatures, Song, TrackId};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use tracing::{info, warn};

#[derive(Debug, Deserialize)]
struct PlaylistFile {
    songs: Vec<SongEntry>,
    #[serde(default)]
    features: HashMap<String, AudioFeatures>,
}

#[derive(Debug, Deserialize)]
struct SongEntry {
    uri: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    artist: String,
}

/// Songs in file order plus whatever features came with them
#[derive(Debug, Clone, Default)]
pub struct Playlist {
    pub songs: Vec<Song>,
    pub features: Vec<(TrackId, AudioFeatures)>,
}

impl Playlist {
    pub fn from_json(json: &str) -> Result<Self> {
        let file: PlaylistFile = serde_json::from_str(json)?;

        let mut songs = Vec::with_capacity(file.songs.len());
        for entry in file.songs {
            match Song::from_uri(&entry.uri, entry.name, entry.artist) {
                Ok(song) => songs.push(song),
                Err(e) => warn!("Skipping playlist entry: {}", e),
            }
        }

        let mut features = Vec::with_capacity(file.features.len());
        for (id, values) in file.features {
            features.push((TrackId::new(id)?, values));
        }

        Ok(Self { songs, features })
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let playlist = Self::from_json(&content).map_err(|e| match e {
            Error::Json(e) => Error::InvalidPlaylist(format!("{}: {}", path.display(), e)),
            other => other,
        })?;
        info!(
            "Read playlist {} ({} songs, {} feature entries)",
            path.display(),
            playlist.songs.len(),
            playlist.features.len()
        );
        Ok(playlist)
    }
}
