//! Configuration for the hrmix program director
//!
//! Loaded once at startup from TOML (see `hrmix_common::config` for how the
//! file is located). Every field has a built-in default, so an empty file
//! or no file at all yields a working configuration.
//!
//! ```toml
//! [logging]
//! level = "debug"
//!
//! [matching]
//! min_dwell_ms = 8000
//! min_candidates_after_recency = 2
//! disconnect_policy = "clear_history"
//!
//! [matching.weights]
//! bpm_weight = 0.5
//! energy_weight = 0.3
//! danceability_weight = 0.1
//! valence_weight = 0.1
//!
//! [[matching.zones]]
//! below_bpm = 100
//! target_energy = 0.3
//! label = "Easy"
//!
//! [[matching.zones]]
//! target_energy = 0.8
//! label = "Hard"
//! ```

use crate::error::{Error, Result};
use crate::matching::{ScoreWeights, SelectorSettings, ZoneStep, ZoneTable};
use hrmix_common::config::ConfigSource;
use serde::Deserialize;
use std::time::Duration;

/// Top-level TOML document
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TomlConfig {
    pub logging: LoggingConfig,
    pub matching: MatchingConfig,
    pub events: EventsConfig,
}

impl TomlConfig {
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self = hrmix_common::config::parse_toml(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a resolved source, falling back to defaults for `BuiltIn`
    pub fn load(source: &ConfigSource) -> Result<Self> {
        let config: Self = hrmix_common::config::load_config(source)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.matching.validate()?;
        if self.events.capacity == 0 {
            return Err(Error::Config("events.capacity must be at least 1".to_string()));
        }
        Ok(())
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error); RUST_LOG overrides it
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// Event bus configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EventsConfig {
    /// Events buffered per subscriber before the oldest are dropped
    pub capacity: usize,
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self { capacity: 256 }
    }
}

/// What happens to match state when the sensor disconnects
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisconnectPolicy {
    /// Keep current song, last switch time and history
    #[default]
    Keep,
    /// Forget recently played songs only
    ClearHistory,
    /// Return to Idle with empty history
    ResetAll,
}

/// Matching and timing tunables
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MatchingConfig {
    pub weights: ScoreWeights,
    /// Distance in BPM at which the tempo term of the score reaches zero
    pub bpm_tolerance: f64,
    pub strict_band: f64,
    pub widen_step: f64,
    pub top_n: usize,
    /// Recency exclusion is skipped when it would leave fewer candidates
    pub min_candidates_after_recency: usize,
    pub recent_capacity: usize,
    pub min_dwell_ms: u64,
    pub energy_switch_threshold: f64,
    pub tick_interval_ms: u64,
    pub disconnect_policy: DisconnectPolicy,
    pub zones: Vec<ZoneStep>,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        let selector = SelectorSettings::default();
        Self {
            weights: ScoreWeights::default(),
            bpm_tolerance: 15.0,
            strict_band: selector.strict_band,
            widen_step: selector.widen_step,
            top_n: selector.top_n,
            min_candidates_after_recency: selector.min_candidates_after_recency,
            recent_capacity: 5,
            min_dwell_ms: 5000,
            energy_switch_threshold: 0.3,
            tick_interval_ms: 1000,
            disconnect_policy: DisconnectPolicy::default(),
            zones: ZoneTable::default_steps(),
        }
    }
}

impl MatchingConfig {
    pub fn validate(&self) -> Result<()> {
        if !(self.bpm_tolerance > 0.0) {
            return Err(Error::Config(format!(
                "bpm_tolerance must be > 0, got {}",
                self.bpm_tolerance
            )));
        }
        if !(self.strict_band >= 0.0) || !(self.widen_step >= 0.0) {
            return Err(Error::Config(
                "strict_band and widen_step must not be negative".to_string(),
            ));
        }
        if self.top_n == 0 {
            return Err(Error::Config("top_n must be at least 1".to_string()));
        }
        if !self.energy_switch_threshold.is_finite() || self.energy_switch_threshold < 0.0 {
            return Err(Error::Config(format!(
                "energy_switch_threshold must be a finite value >= 0, got {}",
                self.energy_switch_threshold
            )));
        }
        if self.tick_interval_ms == 0 {
            return Err(Error::Config("tick_interval_ms must be > 0".to_string()));
        }
        ZoneTable::from_steps(&self.zones)?;
        Ok(())
    }

    pub fn zone_table(&self) -> Result<ZoneTable> {
        ZoneTable::from_steps(&self.zones)
    }

    pub fn selector_settings(&self) -> SelectorSettings {
        SelectorSettings {
            strict_band: self.strict_band,
            widen_step: self.widen_step,
            top_n: self.top_n,
            min_candidates_after_recency: self.min_candidates_after_recency,
        }
    }

    pub fn min_dwell(&self) -> Duration {
        hrmix_common::time::millis_to_duration(self.min_dwell_ms)
    }

    pub fn tick_interval(&self) -> Duration {
        hrmix_common::time::millis_to_duration(self.tick_interval_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_document_uses_defaults() {
        let config = TomlConfig::from_toml_str("").unwrap();
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.events.capacity, 256);
        assert_eq!(config.matching.min_dwell(), Duration::from_secs(5));
        assert_eq!(config.matching.tick_interval(), Duration::from_secs(1));
        assert_eq!(config.matching.strict_band, 4.0);
        assert_eq!(config.matching.widen_step, 2.0);
        assert_eq!(config.matching.top_n, 3);
        assert_eq!(config.matching.recent_capacity, 5);
        assert_eq!(config.matching.disconnect_policy, DisconnectPolicy::Keep);
        assert_eq!(config.matching.zones.len(), 8);
    }

    #[test]
    fn test_partial_overrides() {
        let config = TomlConfig::from_toml_str(
            r#"
            [logging]
            level = "debug"

            [matching]
            min_dwell_ms = 8000
            disconnect_policy = "clear_history"

            [matching.weights]
            bpm_weight = 0.5
            "#,
        )
        .unwrap();
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.matching.min_dwell_ms, 8000);
        assert_eq!(config.matching.disconnect_policy, DisconnectPolicy::ClearHistory);
        assert_eq!(config.matching.weights.bpm_weight, 0.5);
        assert_eq!(config.matching.weights.energy_weight, 0.3);
        assert_eq!(config.matching.tick_interval_ms, 1000);
    }

    #[test]
    fn test_custom_zone_ladder() {
        let config = TomlConfig::from_toml_str(
            r#"
            [[matching.zones]]
            below_bpm = 100
            target_energy = 0.3
            label = "Easy"

            [[matching.zones]]
            target_energy = 0.8
            label = "Hard"
            "#,
        )
        .unwrap();
        let table = config.matching.zone_table().unwrap();
        assert_eq!(table.target_energy(90.0), 0.3);
        assert_eq!(table.zone_for(140.0).label, "Hard");
    }

    #[test]
    fn test_non_monotonic_zones_rejected() {
        let result = TomlConfig::from_toml_str(
            r#"
            [[matching.zones]]
            below_bpm = 100
            target_energy = 0.8
            label = "A"

            [[matching.zones]]
            target_energy = 0.2
            label = "B"
            "#,
        );
        assert!(matches!(result, Err(Error::InvalidZoneTable(_))));
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(TomlConfig::from_toml_str("[matching]\nbpm_tolerance = 0").is_err());
        assert!(TomlConfig::from_toml_str("[matching]\ntop_n = 0").is_err());
        assert!(TomlConfig::from_toml_str("[matching]\ntick_interval_ms = 0").is_err());
        assert!(TomlConfig::from_toml_str("[matching]\nstrict_band = -1.0").is_err());
    }

    /// **Given:** out-of-range thresholds and an event buffer of zero
    /// **When:** the document is loaded
    /// **Then:** each is a config error rather than a later panic
    #[test]
    fn test_zero_capacity_and_bad_energy_threshold_rejected() {
        for doc in [
            "[events]\ncapacity = 0\n",
            "[matching]\nenergy_switch_threshold = -0.1\n",
            "[matching]\nenergy_switch_threshold = nan\n",
            "[matching]\nenergy_switch_threshold = inf\n",
        ] {
            let result = TomlConfig::from_toml_str(doc);
            assert!(matches!(result, Err(Error::Config(_))), "{doc:?} accepted");
        }

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[events]\ncapacity = 0\n").unwrap();
        let result = TomlConfig::load(&ConfigSource::CommandLine(path));
        assert!(matches!(result, Err(Error::Config(_))));

        assert!(TomlConfig::from_toml_str("[matching]\nenergy_switch_threshold = 0.0\n").is_ok());
    }

    #[test]
    fn test_recency_floor_reaches_selector() {
        let config = TomlConfig::from_toml_str("[matching]\nmin_candidates_after_recency = 1\n")
            .unwrap();
        assert_eq!(config.matching.selector_settings().min_candidates_after_recency, 1);

        let defaults = MatchingConfig::default();
        assert_eq!(defaults.selector_settings().min_candidates_after_recency, 2);
    }

    #[test]
    fn test_load_builtin_and_file() {
        let config = TomlConfig::load(&ConfigSource::BuiltIn).unwrap();
        assert_eq!(config.events.capacity, 256);

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[events]\ncapacity = 32\n").unwrap();
        let config = TomlConfig::load(&ConfigSource::CommandLine(path)).unwrap();
        assert_eq!(config.events.capacity, 32);
    }

    #[test]
    fn test_unknown_policy_is_parse_error() {
        let result = TomlConfig::from_toml_str("[matching]\ndisconnect_policy = \"forget\"");
        assert!(matches!(result, Err(Error::Common(_))));
    }
}
