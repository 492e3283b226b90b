use std::collections::VecDeque;

use ndarray::{ArrayView, Dimension, ShapeError};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, trace};

use super::catalog::{Technology, Topology};
use super::transition::{
    LimitedBy, Precision, Transition, TransitionArrays, transition, transition_array,
    transition_with_precision,
};
use crate::error::ConfigurationError;

/// Options accepted by [`BatteryModel::new`].
///
/// Also the `[battery]` section of a scenario file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BatteryOptions {
    /// Nameplate power (MW, must be > 0).
    pub power_mw: f64,
    /// Hours of storage at nameplate power (must be > 0).
    pub duration_h: f64,
    pub technology: Technology,
    pub topology: Topology,
    /// Initial state of charge (0.0 to 1.0).
    pub initial_soc: f64,
    /// Record an [`OperationRecord`] for every step.
    pub track_history: bool,
    /// Maximum number of records kept; older records are evicted first.
    pub history_capacity: usize,
    /// Emit informational log events. Has no effect on the physics.
    pub verbose: bool,
}

impl Default for BatteryOptions {
    fn default() -> Self {
        Self {
            power_mw: 1.0,
            duration_h: 2.0,
            technology: Technology::default(),
            topology: Topology::default(),
            initial_soc: 0.5,
            track_history: false,
            history_capacity: 8760,
            verbose: false,
        }
    }
}

/// Immutable battery parameters resolved from [`BatteryOptions`] and the catalog.
#[derive(Debug, Clone, PartialEq)]
pub struct BatteryConfiguration {
    /// Nameplate power (MW).
    pub rated_power_mw: f64,
    /// Rated duration (h).
    pub rated_duration_h: f64,
    /// Energy capacity, `rated_power_mw * rated_duration_h` (MWh).
    pub capacity_mwh: f64,
    pub technology: Technology,
    pub topology: Topology,
    /// Nameplate power after topology derating (MW).
    pub effective_power_mw: f64,
    /// Round-trip efficiency including topology conversion loss.
    pub round_trip_efficiency: f64,
    /// Efficiency applied on each of charge and discharge.
    pub one_way_efficiency: f64,
    pub soc_min: f64,
    pub soc_max: f64,
    /// Maximum C-rate (1/h).
    pub max_c_rate: f64,
}

impl BatteryConfiguration {
    /// Validates options and resolves catalog parameters.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigurationError` for non-positive (or non-finite) power or
    /// duration, or an initial SOC outside [0, 1].
    pub fn resolve(options: &BatteryOptions) -> Result<Self, ConfigurationError> {
        if !(options.power_mw.is_finite() && options.power_mw > 0.0) {
            return Err(ConfigurationError::NonPositivePower(options.power_mw));
        }
        if !(options.duration_h.is_finite() && options.duration_h > 0.0) {
            return Err(ConfigurationError::NonPositiveDuration(options.duration_h));
        }
        if !(0.0..=1.0).contains(&options.initial_soc) {
            return Err(ConfigurationError::InvalidInitialSoc(options.initial_soc));
        }

        let tech = options.technology.params();
        let topo = options.topology.params();
        let round_trip_efficiency = tech.round_trip_efficiency * (1.0 - topo.extra_loss);

        Ok(Self {
            rated_power_mw: options.power_mw,
            rated_duration_h: options.duration_h,
            // Duration is defined against nameplate power, so derating comes after.
            capacity_mwh: options.power_mw * options.duration_h,
            technology: options.technology,
            topology: options.topology,
            effective_power_mw: options.power_mw * (1.0 - topo.power_derating),
            round_trip_efficiency,
            one_way_efficiency: round_trip_efficiency.sqrt(),
            soc_min: tech.soc_min,
            soc_max: tech.soc_max,
            max_c_rate: tech.max_c_rate,
        })
    }

    /// Energy between the usable SOC floor and ceiling (MWh).
    pub fn usable_capacity_mwh(&self) -> f64 {
        self.capacity_mwh * (self.soc_max - self.soc_min)
    }

    /// Power allowed by the technology C-rate (MW).
    pub fn rate_ceiling_mw(&self) -> f64 {
        self.max_c_rate * self.capacity_mwh
    }
}

/// Mutable state of one battery.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BatteryState {
    /// State of charge as a fraction of capacity (0.0 to 1.0).
    pub soc: f64,
    /// Stored energy, `soc * capacity` (MWh).
    pub stored_energy_mwh: f64,
    /// Cumulative equivalent full cycles.
    pub equivalent_full_cycles: f64,
    /// Cumulative conversion loss (MWh).
    pub cumulative_loss_mwh: f64,
}

/// Diagnostic snapshot of one [`BatteryModel::step`] call.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct OperationRecord {
    pub requested_mw: f64,
    pub actual_mw: f64,
    pub loss_mwh: f64,
    pub soc: f64,
    pub limited_by: LimitedBy,
}

/// A battery energy storage system that charges and discharges over discrete steps.
///
/// `BatteryModel` owns its [`BatteryState`]; only [`step`](Self::step) mutates
/// it. The same physics is available without state through
/// [`next_state`](Self::next_state) and [`next_state_array`](Self::next_state_array),
/// which only need `&self` and can be called from many threads at once.
#[derive(Debug, Clone)]
pub struct BatteryModel {
    config: BatteryConfiguration,
    state: BatteryState,
    history: Option<VecDeque<OperationRecord>>,
    history_capacity: usize,
    verbose: bool,
}

impl BatteryModel {
    /// Creates a new battery from the given options.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigurationError` if power or duration is not positive or
    /// the initial SOC is outside [0, 1].
    pub fn new(options: BatteryOptions) -> Result<Self, ConfigurationError> {
        let config = BatteryConfiguration::resolve(&options)?;
        let state = BatteryState {
            soc: options.initial_soc,
            stored_energy_mwh: options.initial_soc * config.capacity_mwh,
            equivalent_full_cycles: 0.0,
            cumulative_loss_mwh: 0.0,
        };

        if options.verbose {
            info!(
                power_mw = config.rated_power_mw,
                effective_power_mw = config.effective_power_mw,
                capacity_mwh = config.capacity_mwh,
                technology = %config.technology,
                topology = %config.topology,
                round_trip_efficiency = config.round_trip_efficiency,
                "battery configured"
            );
        } else {
            debug!(capacity_mwh = config.capacity_mwh, "battery configured");
        }

        let history = options
            .track_history
            .then(|| VecDeque::with_capacity(options.history_capacity.min(1024)));

        Ok(Self {
            config,
            state,
            history,
            history_capacity: options.history_capacity,
            verbose: options.verbose,
        })
    }

    /// Shorthand for a battery with default technology, topology and flags.
    ///
    /// # Errors
    ///
    /// Same as [`BatteryModel::new`].
    pub fn with_rating(power_mw: f64, duration_h: f64) -> Result<Self, ConfigurationError> {
        Self::new(BatteryOptions {
            power_mw,
            duration_h,
            ..BatteryOptions::default()
        })
    }

    pub fn config(&self) -> &BatteryConfiguration {
        &self.config
    }

    pub fn state(&self) -> &BatteryState {
        &self.state
    }

    pub fn soc(&self) -> f64 {
        self.state.soc
    }

    /// Applies `request_mw` for `dt_hours` and returns what actually happened.
    ///
    /// Requests beyond any limit are saturated, never rejected. The binding
    /// constraint is reported in [`OperationRecord::limited_by`].
    pub fn step(&mut self, request_mw: f64, dt_hours: f64) -> OperationRecord {
        let t = transition(&self.config, self.state.soc, request_mw, dt_hours);
        self.apply(&t);

        let record = OperationRecord {
            requested_mw: request_mw,
            actual_mw: t.power_mw,
            loss_mwh: t.loss_mwh,
            soc: t.soc,
            limited_by: t.limited_by,
        };

        if t.limited_by != LimitedBy::None {
            if self.verbose {
                info!(requested_mw = request_mw, actual_mw = t.power_mw, limited_by = %t.limited_by, "request saturated");
            } else {
                trace!(requested_mw = request_mw, actual_mw = t.power_mw, limited_by = %t.limited_by, "request saturated");
            }
        }

        if let Some(history) = self.history.as_mut() {
            if history.len() >= self.history_capacity {
                history.pop_front();
            }
            if self.history_capacity > 0 {
                history.push_back(record);
            }
        }
        record
    }

    fn apply(&mut self, t: &Transition) {
        let usable = self.config.usable_capacity_mwh();
        self.state.soc = t.soc;
        self.state.stored_energy_mwh = t.soc * self.config.capacity_mwh;
        if usable > 0.0 {
            self.state.equivalent_full_cycles += t.stored_delta_mwh.abs() / (2.0 * usable);
        }
        self.state.cumulative_loss_mwh += t.loss_mwh;
    }

    /// Pure transition from `soc` under `request_mw` for `dt_hours`.
    ///
    /// Shares the physics of [`step`](Self::step) but reads nothing from, and
    /// writes nothing to, this instance's state.
    pub fn next_state(
        &self,
        soc: f64,
        request_mw: f64,
        dt_hours: f64,
        precision: Precision,
    ) -> Transition {
        transition_with_precision(&self.config, soc, request_mw, dt_hours, precision)
    }

    /// Element-wise [`next_state`](Self::next_state) over arrays of any shape.
    ///
    /// `request_mw` is broadcast to the shape of `soc`.
    ///
    /// # Errors
    ///
    /// Returns a `ShapeError` if the request array cannot be broadcast.
    pub fn next_state_array<D, E>(
        &self,
        soc: ArrayView<'_, f64, D>,
        request_mw: ArrayView<'_, f64, E>,
        dt_hours: f64,
        precision: Precision,
    ) -> Result<TransitionArrays<D>, ShapeError>
    where
        D: Dimension,
        E: Dimension,
    {
        transition_array(&self.config, soc, request_mw, dt_hours, precision)
    }

    /// Recorded operations, oldest first. Empty when history is disabled.
    pub fn history(&self) -> impl Iterator<Item = &OperationRecord> {
        self.history.iter().flatten()
    }

    pub fn clear_history(&mut self) {
        if let Some(history) = self.history.as_mut() {
            history.clear();
        }
    }
}
