//! Switch policy (debounce state machine)
//!
//! Decides whether the current song should be replaced for a new heart-rate
//! reading. The decision is pure: it reads the match state and never
//! changes it.
//!
//! Order of checks from Playing:
//! 1. dwell time not yet elapsed → stay
//! 2. current song has no features → switch
//! 3. tempo outside the strict band → switch
//! 4. energy too far from the zone target → switch

use super::state::{MatchPhase, MatchState};
use super::zones::ZoneTable;
use hrmix_common::events::SwitchReason;
use hrmix_common::time::elapsed_between;
use hrmix_common::AudioFeatures;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Why the current song stays
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StayReason {
    /// Minimum dwell time has not elapsed since the last switch
    Dwelling,
    /// Current song still fits the heart rate
    InBand,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwitchDecision {
    Stay(StayReason),
    Switch(SwitchReason),
}

impl SwitchDecision {
    pub fn is_switch(&self) -> bool {
        matches!(self, SwitchDecision::Switch(_))
    }
}

#[derive(Debug, Clone)]
pub struct SwitchPolicy {
    min_dwell: Duration,
    strict_band: f64,
    energy_switch_threshold: f64,
    zones: Arc<ZoneTable>,
}

impl SwitchPolicy {
    pub fn new(
        min_dwell: Duration,
        strict_band: f64,
        energy_switch_threshold: f64,
        zones: Arc<ZoneTable>,
    ) -> Self {
        Self {
            min_dwell,
            strict_band,
            energy_switch_threshold,
            zones,
        }
    }

    pub fn min_dwell(&self) -> Duration {
        self.min_dwell
    }

    pub fn should_switch(
        &self,
        state: &MatchState,
        new_bpm: f64,
        current_features: Option<&AudioFeatures>,
        now: Instant,
    ) -> SwitchDecision {
        if state.phase() == MatchPhase::Idle {
            return SwitchDecision::Switch(SwitchReason::Initial);
        }

        if let Some(last) = state.last_switch_at {
            if elapsed_between(last, now) < self.min_dwell {
                return SwitchDecision::Stay(StayReason::Dwelling);
            }
        }

        let Some(features) = current_features else {
            return SwitchDecision::Switch(SwitchReason::Unscoreable);
        };

        if (features.tempo - new_bpm).abs() > self.strict_band {
            return SwitchDecision::Switch(SwitchReason::TempoOutOfBand);
        }

        let target_energy = self.zones.target_energy(new_bpm);
        if (features.energy - target_energy).abs() > self.energy_switch_threshold {
            return SwitchDecision::Switch(SwitchReason::EnergyMismatch);
        }

        SwitchDecision::Stay(StayReason::InBand)
    }
}

impl Default for SwitchPolicy {
    fn default() -> Self {
        Self::new(
            Duration::from_millis(5000),
            4.0,
            0.3,
            Arc::new(ZoneTable::default()),
        )
    }
}
