//! Scripted heart-rate source for running without a sensor
//!
//! Walks through named effort presets, holding each for a number of samples
//! and adding a little jitter so consecutive readings are not identical.

use crate::error::{Error, Result};
use rand::Rng;

/// Named effort level and its nominal heart rate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Preset {
    pub label: &'static str,
    pub bpm: u16,
}

pub const PRESETS: [Preset; 5] = [
    Preset { label: "Rest", bpm: 60 },
    Preset { label: "Walk", bpm: 90 },
    Preset { label: "Jog", bpm: 120 },
    Preset { label: "Run", bpm: 150 },
    Preset { label: "Sprint", bpm: 170 },
];

/// Simulated readings never leave this range
pub const SIMULATED_BPM_RANGE: (u16, u16) = (40, 200);

impl Preset {
    /// Case-insensitive lookup by label
    pub fn find(label: &str) -> Option<Preset> {
        PRESETS
            .iter()
            .find(|p| p.label.eq_ignore_ascii_case(label.trim()))
            .copied()
    }
}

/// Parse a comma-separated preset list such as `rest,jog,run`
pub fn parse_presets(list: &str) -> Result<Vec<Preset>> {
    let presets = list
        .split(',')
        .filter(|s| !s.trim().is_empty())
        .map(|label| {
            Preset::find(label).ok_or_else(|| {
                Error::Config(format!(
                    "unknown preset '{}' (expected one of rest, walk, jog, run, sprint)",
                    label.trim()
                ))
            })
        })
        .collect::<Result<Vec<_>>>()?;

    if presets.is_empty() {
        return Err(Error::Config("preset list is empty".to_string()));
    }
    Ok(presets)
}

/// Sequence of jittered samples, `samples_per_preset` for each preset
pub struct HeartRateWalk<R> {
    presets: Vec<Preset>,
    samples_per_preset: usize,
    jitter: u16,
    position: usize,
    rng: R,
}

impl<R: Rng> HeartRateWalk<R> {
    pub fn new(presets: Vec<Preset>, samples_per_preset: usize, jitter: u16, rng: R) -> Self {
        Self {
            presets,
            samples_per_preset: samples_per_preset.max(1),
            jitter,
            position: 0,
            rng,
        }
    }

    /// Preset the next sample belongs to
    pub fn current_preset(&self) -> Option<Preset> {
        self.presets
            .get(self.position / self.samples_per_preset)
            .copied()
    }
}

impl<R: Rng> Iterator for HeartRateWalk<R> {
    type Item = (Preset, u16);

    fn next(&mut self) -> Option<Self::Item> {
        let preset = self.current_preset()?;
        self.position += 1;

        let jitter = i32::from(self.jitter);
        let offset = if jitter > 0 {
            self.rng.gen_range(-jitter..=jitter)
        } else {
            0
        };
        let (low, high) = SIMULATED_BPM_RANGE;
        let bpm = (i32::from(preset.bpm) + offset).clamp(i32::from(low), i32::from(high));
        Some((preset, bpm as u16))
    }
}
