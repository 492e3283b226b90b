//! TOML-based scenario configuration and preset definitions.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::devices::{BatteryOptions, SolarProfile, Technology, Topology};
use crate::error::ConfigurationError;
use crate::sim::{StrategyParams, StrategyResult, simulate};

/// Top-level scenario configuration parsed from TOML.
///
/// All sections have defaults matching the baseline scenario. Load from
/// TOML with [`ScenarioConfig::from_toml_file`] or use
/// [`ScenarioConfig::baseline`] for the built-in default.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScenarioConfig {
    /// Step duration and strategy selection.
    #[serde(default)]
    pub simulation: SimulationConfig,
    /// Battery rating, technology and flags.
    #[serde(default)]
    pub battery: BatteryOptions,
    /// Generation profile source.
    #[serde(default)]
    pub profile: ProfileConfig,
    /// Free-form strategy parameters, forwarded verbatim.
    #[serde(default)]
    pub strategy: StrategyParams,
}

/// Step duration and strategy selection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SimulationConfig {
    /// Step duration in hours (must be > 0 and match the profile resolution).
    pub dt_hours: f64,
    /// Strategy tag.
    pub strategy: String,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            dt_hours: 1.0,
            strategy: "capacity_shaving".to_string(),
        }
    }
}

/// Where the generation profile comes from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProfileKind {
    /// Generated from `[profile.synthetic]`.
    #[default]
    Synthetic,
    /// Taken verbatim from `values`.
    Inline,
}

/// Generation profile section.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProfileConfig {
    pub kind: ProfileKind,
    /// Generation per step (MW), used when `kind = "inline"`.
    pub values: Vec<f64>,
    /// Synthetic PV parameters, used when `kind = "synthetic"`.
    pub synthetic: SolarProfile,
}

/// Scenario error with field path and constraint description.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("config error: {field}: {message}")]
pub struct ScenarioError {
    /// Dotted field path (e.g., `"battery.power_mw"`).
    pub field: String,
    /// Human-readable constraint description.
    pub message: String,
}

impl ScenarioError {
    fn new(field: &str, message: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

impl ScenarioConfig {
    /// Returns the baseline scenario: 1 MW / 2 h LFP shaving a 1.5 MW PV day at 1 MW.
    pub fn baseline() -> Self {
        Self {
            strategy: StrategyParams::new().with("ceiling_mw", 1.0),
            ..Self::default()
        }
    }

    /// Returns the evening-peak preset: large PV array shifting midday surplus
    /// into the evening over two days.
    pub fn evening_peak() -> Self {
        Self {
            simulation: SimulationConfig {
                strategy: "night_shift".to_string(),
                ..SimulationConfig::default()
            },
            battery: BatteryOptions {
                power_mw: 2.0,
                duration_h: 4.0,
                technology: Technology::Premium,
                initial_soc: 0.2,
                ..BatteryOptions::default()
            },
            profile: ProfileConfig {
                synthetic: SolarProfile {
                    peak_mw: 3.0,
                    days: 2,
                    ..SolarProfile::default()
                },
                ..ProfileConfig::default()
            },
            strategy: StrategyParams::new()
                .with("store_above_mw", 1.0)
                .with("release_start_hour", 17.0)
                .with("release_end_hour", 23.0),
        }
    }

    /// Returns the ramp-smoothing preset: noisy 15-minute PV through a series
    /// DC battery with a ramp-rate limit.
    pub fn ramp_smoothing() -> Self {
        Self {
            simulation: SimulationConfig {
                dt_hours: 0.25,
                strategy: "ramp_limit".to_string(),
            },
            battery: BatteryOptions {
                power_mw: 1.0,
                duration_h: 1.0,
                topology: Topology::SeriesDc,
                ..BatteryOptions::default()
            },
            profile: ProfileConfig {
                synthetic: SolarProfile {
                    peak_mw: 2.0,
                    steps_per_day: 96,
                    noise_std: 0.15,
                    ..SolarProfile::default()
                },
                ..ProfileConfig::default()
            },
            strategy: StrategyParams::new().with("max_ramp_mw_per_h", 0.8),
        }
    }

    /// Available preset names.
    pub const PRESETS: &[&str] = &["baseline", "evening_peak", "ramp_smoothing"];

    /// Loads a scenario from a named preset.
    ///
    /// # Errors
    ///
    /// Returns a `ScenarioError` if the preset name is unknown.
    pub fn from_preset(name: &str) -> Result<Self, ScenarioError> {
        match name {
            "baseline" => Ok(Self::baseline()),
            "evening_peak" => Ok(Self::evening_peak()),
            "ramp_smoothing" => Ok(Self::ramp_smoothing()),
            _ => Err(ScenarioError::new(
                "preset",
                format!(
                    "unknown preset \"{name}\", available: {}",
                    Self::PRESETS.join(", ")
                ),
            )),
        }
    }

    /// Parses a scenario from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns a `ScenarioError` if the file cannot be read or the TOML is invalid.
    pub fn from_toml_file(path: &Path) -> Result<Self, ScenarioError> {
        let content = fs::read_to_string(path).map_err(|e| {
            ScenarioError::new("scenario", format!("cannot read \"{}\": {e}", path.display()))
        })?;
        Self::from_toml_str(&content)
    }

    /// Parses a scenario from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns a `ScenarioError` if the TOML is invalid or contains unknown fields.
    pub fn from_toml_str(s: &str) -> Result<Self, ScenarioError> {
        toml::from_str(s).map_err(|e| ScenarioError::new("toml", e.to_string()))
    }

    /// Overrides the seed of the synthetic profile.
    pub fn set_seed(&mut self, seed: u64) {
        self.profile.synthetic.seed = seed;
    }

    /// Generation profile described by the `[profile]` section (MW per step).
    pub fn generation_profile(&self) -> Vec<f64> {
        match self.profile.kind {
            ProfileKind::Synthetic => self.profile.synthetic.generate(),
            ProfileKind::Inline => self.profile.values.clone(),
        }
    }

    /// Builds the battery, generates the profile and runs the strategy.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigurationError` for invalid battery options or run inputs.
    pub fn simulate(&self) -> Result<StrategyResult, ConfigurationError> {
        simulate(
            self.battery.clone(),
            &self.generation_profile(),
            self.simulation.dt_hours,
            &self.simulation.strategy,
            &self.strategy,
        )
    }

    /// Validates all fields and returns a list of errors.
    ///
    /// Returns an empty vector if configuration is valid. An unknown strategy
    /// tag is not an error; it runs as pass-through.
    pub fn validate(&self) -> Vec<ScenarioError> {
        let mut errors = Vec::new();
        let s = &self.simulation;

        let dt_ok = s.dt_hours.is_finite() && s.dt_hours > 0.0;
        if !dt_ok {
            errors.push(ScenarioError::new("simulation.dt_hours", "must be > 0"));
        }
        if s.strategy.trim().is_empty() {
            errors.push(ScenarioError::new("simulation.strategy", "must not be empty"));
        }

        let bat = &self.battery;
        if !(bat.power_mw.is_finite() && bat.power_mw > 0.0) {
            errors.push(ScenarioError::new("battery.power_mw", "must be > 0"));
        }
        if !(bat.duration_h.is_finite() && bat.duration_h > 0.0) {
            errors.push(ScenarioError::new("battery.duration_h", "must be > 0"));
        }
        if !(0.0..=1.0).contains(&bat.initial_soc) {
            errors.push(ScenarioError::new("battery.initial_soc", "must be in [0.0, 1.0]"));
        }
        if bat.track_history && bat.history_capacity == 0 {
            errors.push(ScenarioError::new(
                "battery.history_capacity",
                "must be > 0 when track_history is on",
            ));
        }

        match self.profile.kind {
            ProfileKind::Inline => {
                if self.profile.values.is_empty() {
                    errors.push(ScenarioError::new(
                        "profile.values",
                        "must not be empty for an inline profile",
                    ));
                }
                if let Some(i) = self.profile.values.iter().position(|v| !v.is_finite()) {
                    errors.push(ScenarioError::new(
                        "profile.values",
                        format!("value at index {i} is not finite"),
                    ));
                }
            }
            ProfileKind::Synthetic => {
                let pv = &self.profile.synthetic;
                if pv.steps_per_day == 0 {
                    errors.push(ScenarioError::new("profile.synthetic.steps_per_day", "must be > 0"));
                }
                if pv.days == 0 {
                    errors.push(ScenarioError::new("profile.synthetic.days", "must be > 0"));
                }
                if !(pv.peak_mw.is_finite() && pv.peak_mw >= 0.0) {
                    errors.push(ScenarioError::new("profile.synthetic.peak_mw", "must be >= 0"));
                }
                if !(pv.noise_std.is_finite() && pv.noise_std >= 0.0) {
                    errors.push(ScenarioError::new("profile.synthetic.noise_std", "must be >= 0"));
                }
                if !(0.0 <= pv.sunrise_hour && pv.sunrise_hour < pv.sunset_hour && pv.sunset_hour <= 24.0) {
                    errors.push(ScenarioError::new(
                        "profile.synthetic.sunrise_hour",
                        "must satisfy 0 <= sunrise_hour < sunset_hour <= 24",
                    ));
                }
                // No resampling: the profile must already be at the simulation step.
                if dt_ok && pv.steps_per_day > 0 && (pv.dt_hours() - s.dt_hours).abs() > 1e-9 {
                    errors.push(ScenarioError::new(
                        "simulation.dt_hours",
                        format!(
                            "must equal the synthetic profile step of {} h (24 / steps_per_day)",
                            pv.dt_hours()
                        ),
                    ));
                }
            }
        }

        errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn presets_are_valid() {
        for name in ScenarioConfig::PRESETS {
            let cfg = ScenarioConfig::from_preset(name).expect("known preset");
            let errors = cfg.validate();
            assert!(errors.is_empty(), "{name} should be valid: {errors:?}");
        }
    }

    #[test]
    fn from_preset_unknown() {
        let err = ScenarioConfig::from_preset("nonexistent").expect_err("unknown preset");
        assert!(err.message.contains("unknown preset"));
        assert_eq!(err.field, "preset");
    }

    #[test]
    fn valid_toml_parses() {
        let toml = r#"
[simulation]
dt_hours = 0.5
strategy = "flat_day"

[battery]
power_mw = 4.0
duration_h = 2.0
technology = "premium"
topology = "hybrid"
initial_soc = 0.3

[profile]
kind = "synthetic"

[profile.synthetic]
peak_mw = 6.0
steps_per_day = 48
days = 2
seed = 7

[strategy]
start_hour = 8.0
end_hour = 16.0
"#;
        let cfg = ScenarioConfig::from_toml_str(toml).expect("valid TOML should parse");
        assert_eq!(cfg.simulation.strategy, "flat_day");
        assert_eq!(cfg.battery.technology, Technology::Premium);
        assert_eq!(cfg.battery.topology, Topology::Hybrid);
        assert_eq!(cfg.profile.synthetic.steps_per_day, 48);
        assert_eq!(cfg.strategy.get("start_hour"), Some(8.0));
        assert!(cfg.validate().is_empty());
        assert_eq!(cfg.generation_profile().len(), 96);
    }

    #[test]
    fn inline_profile_is_used_verbatim() {
        let toml = r#"
[profile]
kind = "inline"
values = [2.0, 0.0, -1.0, 0.0]

[strategy]
ceiling_mw = 1.0
"#;
        let cfg = ScenarioConfig::from_toml_str(toml).expect("valid TOML should parse");
        assert!(cfg.validate().is_empty());
        assert_eq!(cfg.generation_profile(), vec![2.0, 0.0, -1.0, 0.0]);
        let result = cfg.simulate().expect("valid run");
        assert!(result.verdict.valid, "{}", result.verdict);
    }

    #[test]
    fn boolean_strategy_flag_reaches_the_policy() {
        let toml = r#"
[profile]
kind = "inline"
values = [2.0, 0.0, -1.0, 0.0]

[strategy]
ceiling_mw = 1.0
fill_shortfall = false
"#;
        let cfg = ScenarioConfig::from_toml_str(toml).expect("valid TOML should parse");
        assert!(!cfg.strategy.flag("fill_shortfall", true));
        let result = cfg.simulate().expect("valid run");
        assert!(result.battery_mw[0] < 0.0);
        assert!(result.battery_mw[1..].iter().all(|&p| p == 0.0));
    }

    #[test]
    fn invalid_toml_unknown_field() {
        let toml = r#"
[battery]
power_mw = 1.0
bogus_field = true
"#;
        assert!(ScenarioConfig::from_toml_str(toml).is_err());
    }

    #[test]
    fn unknown_technology_is_rejected() {
        let toml = r#"
[battery]
technology = "lead_acid"
"#;
        assert!(ScenarioConfig::from_toml_str(toml).is_err());
    }

    #[test]
    fn validation_catches_bad_battery() {
        let mut cfg = ScenarioConfig::baseline();
        cfg.battery.power_mw = -1.0;
        cfg.battery.initial_soc = 1.5;
        let errors = cfg.validate();
        assert!(errors.iter().any(|e| e.field == "battery.power_mw"));
        assert!(errors.iter().any(|e| e.field == "battery.initial_soc"));
    }

    #[test]
    fn validation_catches_dt_mismatch() {
        let mut cfg = ScenarioConfig::baseline();
        cfg.simulation.dt_hours = 0.5;
        let errors = cfg.validate();
        assert!(errors.iter().any(|e| e.field == "simulation.dt_hours"));
    }

    #[test]
    fn validation_catches_empty_inline_profile() {
        let mut cfg = ScenarioConfig::baseline();
        cfg.profile.kind = ProfileKind::Inline;
        let errors = cfg.validate();
        assert!(errors.iter().any(|e| e.field == "profile.values"));
    }

    #[test]
    fn unknown_strategy_is_not_a_config_error() {
        let mut cfg = ScenarioConfig::baseline();
        cfg.simulation.strategy = "does_not_exist".to_string();
        assert!(cfg.validate().is_empty());
    }

    #[test]
    fn seed_override_changes_profile() {
        let mut cfg = ScenarioConfig::baseline();
        let before = cfg.generation_profile();
        cfg.set_seed(1234);
        assert_ne!(cfg.generation_profile(), before);
    }

    #[test]
    fn baseline_round_trips_through_toml() {
        let cfg = ScenarioConfig::baseline();
        let text = toml::to_string(&cfg).expect("serializable");
        let back = ScenarioConfig::from_toml_str(&text).expect("parsable");
        assert_eq!(back, cfg);
    }
}
