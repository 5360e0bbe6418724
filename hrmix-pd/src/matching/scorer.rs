//! Song suitability scoring
//!
//! Higher is better. A song without features scores `f64::NEG_INFINITY`
//! so it loses every comparison against a scoreable song.

use super::zones::ZoneTable;
use hrmix_common::AudioFeatures;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Relative weight of each scoring term
///
/// The weights are expected to sum to 1.0 so scores stay within 0..=1,
/// but this is not enforced.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoreWeights {
    pub bpm_weight: f64,
    pub energy_weight: f64,
    pub danceability_weight: f64,
    pub valence_weight: f64,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            bpm_weight: 0.4,
            energy_weight: 0.3,
            danceability_weight: 0.2,
            valence_weight: 0.1,
        }
    }
}

impl ScoreWeights {
    pub fn total(&self) -> f64 {
        self.bpm_weight + self.energy_weight + self.danceability_weight + self.valence_weight
    }
}

/// 1.0 at an exact tempo match, falling linearly to 0.0 at `tolerance` BPM away
pub fn bpm_score(tempo: f64, target_bpm: f64, tolerance: f64) -> f64 {
    (1.0 - (tempo - target_bpm).abs() / tolerance).max(0.0)
}

/// 1.0 at an exact energy match, 0.0 at the opposite end of the scale
pub fn energy_score(energy: f64, target_energy: f64) -> f64 {
    1.0 - (energy - target_energy).abs()
}

/// Scores songs against a target heart rate
#[derive(Debug, Clone)]
pub struct SongScorer {
    weights: ScoreWeights,
    bpm_tolerance: f64,
    zones: Arc<ZoneTable>,
}

impl SongScorer {
    pub fn new(weights: ScoreWeights, bpm_tolerance: f64, zones: Arc<ZoneTable>) -> Self {
        Self {
            weights,
            bpm_tolerance,
            zones,
        }
    }

    pub fn score(&self, features: Option<&AudioFeatures>, target_bpm: f64) -> f64 {
        let Some(features) = features else {
            return f64::NEG_INFINITY;
        };

        let target_energy = self.zones.target_energy(target_bpm);
        let w = &self.weights;

        w.bpm_weight * bpm_score(features.tempo, target_bpm, self.bpm_tolerance)
            + w.energy_weight * energy_score(features.energy, target_energy)
            + w.danceability_weight * features.danceability
            + w.valence_weight * features.valence
    }

    pub fn zones(&self) -> &ZoneTable {
        &self.zones
    }

    pub fn weights(&self) -> &ScoreWeights {
        &self.weights
    }
}

impl Default for SongScorer {
    fn default() -> Self {
        Self::new(ScoreWeights::default(), 15.0, Arc::new(ZoneTable::default()))
    }
}
