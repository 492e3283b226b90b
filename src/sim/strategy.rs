//! Dispatch policy contract and the tag-keyed strategy library.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::warn;

use super::policies;
use crate::devices::BatteryModel;

/// Value of a single strategy parameter.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Number(f64),
    Flag(bool),
}

impl From<f64> for ParamValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<bool> for ParamValue {
    fn from(value: bool) -> Self {
        Self::Flag(value)
    }
}

/// Free-form named parameters forwarded verbatim to a policy.
///
/// Deserializes from a flat TOML table of numbers and booleans. A flag may
/// also be given as a number (0 = off).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StrategyParams(BTreeMap<String, ParamValue>);

impl StrategyParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    #[must_use]
    pub fn with(mut self, name: &str, value: impl Into<ParamValue>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert(&mut self, name: &str, value: impl Into<ParamValue>) {
        self.0.insert(name.to_string(), value.into());
    }

    /// Numeric value of `name`. Flags and non-finite numbers read as absent.
    pub fn get(&self, name: &str) -> Option<f64> {
        match self.0.get(name) {
            Some(&ParamValue::Number(v)) if v.is_finite() => Some(v),
            _ => None,
        }
    }

    pub fn get_or(&self, name: &str, default: f64) -> f64 {
        self.get(name).unwrap_or(default)
    }

    pub fn flag(&self, name: &str, default: bool) -> bool {
        match self.0.get(name) {
            Some(&ParamValue::Flag(b)) => b,
            Some(&ParamValue::Number(v)) if v.is_finite() => v != 0.0,
            _ => default,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, ParamValue)> {
        self.0.iter().map(|(k, v)| (k.as_str(), *v))
    }
}

/// Read-only view of the battery handed to a policy.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BatteryView {
    pub soc: f64,
    pub effective_power_mw: f64,
    /// Terminal energy the battery can still absorb before its SOC ceiling (MWh).
    pub chargeable_mwh: f64,
    /// Terminal energy the battery can still deliver before its SOC floor (MWh).
    pub dischargeable_mwh: f64,
}

impl BatteryView {
    pub fn of(battery: &BatteryModel) -> Self {
        let cfg = battery.config();
        let stored = battery.state().stored_energy_mwh;
        let eta = cfg.one_way_efficiency;
        Self {
            soc: battery.soc(),
            effective_power_mw: cfg.effective_power_mw,
            chargeable_mwh: (cfg.soc_max * cfg.capacity_mwh - stored).max(0.0) / eta,
            dischargeable_mwh: (stored - cfg.soc_min * cfg.capacity_mwh).max(0.0) * eta,
        }
    }
}

/// Everything a policy may look at when choosing the request for one step.
#[derive(Debug, Clone, Copy)]
pub struct DispatchContext<'a> {
    pub step: usize,
    pub hour_of_day: f64,
    pub dt_hours: f64,
    /// Generation at this step (MW).
    pub generation_mw: f64,
    /// Whole generation profile, for look-ahead or trailing statistics.
    pub profile: &'a [f64],
    /// Grid output of the previous step, `None` on the first step.
    pub previous_grid_mw: Option<f64>,
    pub battery: BatteryView,
}

/// A dispatch policy producing one battery power request per step.
///
/// Requests follow the battery convention (negative = charge, positive =
/// discharge) and may exceed any limit; the battery saturates them.
pub trait DispatchPolicy {
    /// Tag the policy is registered under.
    fn name(&self) -> &'static str;

    /// Called once before the first step.
    fn prepare(&mut self, _profile: &[f64], _dt_hours: f64) {}

    /// Power request for the step described by `ctx` (MW).
    fn request_mw(&mut self, ctx: &DispatchContext<'_>) -> f64;

    /// Export ceiling on combined output for the step described by `ctx`.
    ///
    /// Generation pushing combined output above it is curtailed. Called after
    /// [`request_mw`](Self::request_mw) for the same step.
    fn export_limit_mw(&self, _ctx: &DispatchContext<'_>) -> Option<f64> {
        None
    }
}

/// Builds a policy from its parameters.
pub type PolicyFactory = fn(&StrategyParams) -> Box<dyn DispatchPolicy>;

/// Whether a policy is validated for production use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stability {
    Stable,
    /// Aggressive or illustrative; may break conservative dispatch assumptions.
    Experimental,
}

impl fmt::Display for Stability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stable => f.write_str("stable"),
            Self::Experimental => f.write_str("experimental"),
        }
    }
}

struct Entry {
    stability: Stability,
    factory: PolicyFactory,
}

/// Tag-keyed catalog of dispatch policies.
///
/// Unknown tags resolve to the pass-through policy instead of failing.
pub struct StrategyLibrary {
    entries: BTreeMap<String, Entry>,
}

impl StrategyLibrary {
    /// A library with no policies registered.
    pub fn empty() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }

    /// The built-in catalog.
    pub fn standard() -> Self {
        let mut library = Self::empty();
        library.register("capacity_shaving", Stability::Stable, policies::CapacityShaving::boxed);
        library.register("flat_day", Stability::Stable, policies::FlatDay::boxed);
        library.register("night_shift", Stability::Stable, policies::NightShift::boxed);
        library.register("ramp_limit", Stability::Stable, policies::RampLimit::boxed);
        library.register("cycle_stress", Stability::Experimental, policies::CycleStress::boxed);
        library.register("smoothing", Stability::Experimental, policies::Smoothing::boxed);
        library.register(policies::PASSTHROUGH, Stability::Stable, policies::PassThrough::boxed);
        library
    }

    /// Adds or replaces the policy registered under `tag`.
    pub fn register(&mut self, tag: &str, stability: Stability, factory: PolicyFactory) {
        self.entries.insert(tag.to_string(), Entry { stability, factory });
    }

    pub fn contains(&self, tag: &str) -> bool {
        self.entries.contains_key(tag)
    }

    pub fn stability(&self, tag: &str) -> Option<Stability> {
        self.entries.get(tag).map(|e| e.stability)
    }

    /// Registered tags in alphabetical order.
    pub fn tags(&self) -> impl Iterator<Item = (&str, Stability)> {
        self.entries.iter().map(|(tag, e)| (tag.as_str(), e.stability))
    }

    /// Builds the policy for `tag`, falling back to pass-through.
    pub fn resolve(&self, tag: &str, params: &StrategyParams) -> Box<dyn DispatchPolicy> {
        match self.entries.get(tag) {
            Some(entry) => (entry.factory)(params),
            None => {
                warn!(strategy = tag, "unknown strategy, battery stays idle");
                policies::PassThrough::boxed(params)
            }
        }
    }
}

impl Default for StrategyLibrary {
    fn default() -> Self {
        Self::standard()
    }
}
