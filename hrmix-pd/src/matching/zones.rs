//! Heart-rate zone table
//!
//! A ladder of BPM breakpoints, each mapped to the music energy that suits
//! that level of exertion. The table is fixed for the process lifetime.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// One rung of the zone ladder as written in configuration
///
/// `below_bpm` is the exclusive upper bound; the last rung leaves it unset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZoneStep {
    #[serde(default)]
    pub below_bpm: Option<f64>,
    pub target_energy: f64,
    pub label: String,
}

impl ZoneStep {
    fn new(below_bpm: Option<f64>, target_energy: f64, label: &str) -> Self {
        Self {
            below_bpm,
            target_energy,
            label: label.to_string(),
        }
    }
}

/// A heart-rate range `[min_bpm, max_bpm)` and its target energy
#[derive(Debug, Clone, PartialEq)]
pub struct Zone {
    pub min_bpm: f64,
    pub max_bpm: f64,
    pub target_energy: f64,
    pub label: String,
}

impl Zone {
    pub fn contains(&self, bpm: f64) -> bool {
        bpm >= self.min_bpm && bpm < self.max_bpm
    }
}

/// Ordered, contiguous, non-overlapping zones
#[derive(Debug, Clone, PartialEq)]
pub struct ZoneTable {
    zones: Vec<Zone>,
}

impl ZoneTable {
    /// Default eight-step ladder from rest (<60 BPM) to maximum effort
    pub fn default_steps() -> Vec<ZoneStep> {
        vec![
            ZoneStep::new(Some(60.0), 0.2, "Rest"),
            ZoneStep::new(Some(80.0), 0.3, "Recovery"),
            ZoneStep::new(Some(100.0), 0.4, "Light"),
            ZoneStep::new(Some(120.0), 0.5, "Moderate"),
            ZoneStep::new(Some(140.0), 0.6, "Cardio"),
            ZoneStep::new(Some(160.0), 0.7, "Intense"),
            ZoneStep::new(Some(180.0), 0.8, "Very intense"),
            ZoneStep::new(None, 0.9, "Maximum"),
        ]
    }

    /// Build a table from a ladder, rejecting anything that would break
    /// monotonicity (a higher heart rate never gets a lower target energy)
    pub fn from_steps(steps: &[ZoneStep]) -> Result<Self> {
        validate_steps(steps)?;
        Ok(Self::build(steps))
    }

    fn build(steps: &[ZoneStep]) -> Self {
        let mut min_bpm = 0.0;
        let zones = steps
            .iter()
            .map(|step| {
                let max_bpm = step.below_bpm.unwrap_or(f64::INFINITY);
                let zone = Zone {
                    min_bpm,
                    max_bpm,
                    target_energy: step.target_energy,
                    label: step.label.clone(),
                };
                min_bpm = max_bpm;
                zone
            })
            .collect();
        Self { zones }
    }

    /// Zone containing `bpm`; readings below the first bound use the first zone
    pub fn zone_for(&self, bpm: f64) -> &Zone {
        self.zones
            .iter()
            .find(|z| bpm < z.max_bpm)
            .or_else(|| self.zones.last())
            .unwrap_or(&FALLBACK_ZONE)
    }

    pub fn target_energy(&self, bpm: f64) -> f64 {
        self.zone_for(bpm).target_energy
    }

    pub fn zones(&self) -> &[Zone] {
        &self.zones
    }
}

impl Default for ZoneTable {
    fn default() -> Self {
        Self::build(&Self::default_steps())
    }
}

// Only reachable through an empty table, which `from_steps` refuses to build.
static FALLBACK_ZONE: Zone = Zone {
    min_bpm: 0.0,
    max_bpm: f64::INFINITY,
    target_energy: 0.5,
    label: String::new(),
};

fn validate_steps(steps: &[ZoneStep]) -> Result<()> {
    if steps.is_empty() {
        return Err(Error::InvalidZoneTable("at least one zone is required".to_string()));
    }

    let mut min_bpm = 0.0_f64;
    let mut prev_energy = f64::NEG_INFINITY;
    let last = steps.len() - 1;

    for (i, step) in steps.iter().enumerate() {
        if !(0.0..=1.0).contains(&step.target_energy) {
            return Err(Error::InvalidZoneTable(format!(
                "zone '{}' target energy {} outside 0..=1",
                step.label, step.target_energy
            )));
        }
        if step.target_energy < prev_energy {
            return Err(Error::InvalidZoneTable(format!(
                "zone '{}' lowers target energy to {} (previous {})",
                step.label, step.target_energy, prev_energy
            )));
        }

        match (step.below_bpm, i == last) {
            (None, true) => {}
            (Some(_), true) => {
                return Err(Error::InvalidZoneTable(format!(
                    "last zone '{}' must be open-ended",
                    step.label
                )))
            }
            (None, false) => {
                return Err(Error::InvalidZoneTable(format!(
                    "zone '{}' is missing below_bpm",
                    step.label
                )))
            }
            (Some(bound), false) if !bound.is_finite() || bound <= min_bpm => {
                return Err(Error::InvalidZoneTable(format!(
                    "zone '{}' upper bound {} not above {}",
                    step.label, bound, min_bpm
                )))
            }
            (Some(bound), false) => min_bpm = bound,
        }
        prev_energy = step.target_energy;
    }

    Ok(())
}
