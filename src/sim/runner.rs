//! Full-horizon orchestration of a dispatch policy against one battery.

use serde::Serialize;
use tracing::{debug, info};

use super::clock::Clock;
use super::metrics::{SeriesRef, StorageChange, StrategyMetrics};
use super::strategy::{BatteryView, DispatchContext, StrategyLibrary, StrategyParams};
use super::validator::{Validator, Verdict};
use crate::devices::{BatteryModel, BatteryOptions, LimitedBy};
use crate::error::{ConfigurationError, ValidationFailure};

/// Output bundle of one run: equal-length series plus metrics and verdict.
///
/// Owned by the caller; the runner keeps nothing after returning it.
#[derive(Debug, Clone, Serialize)]
pub struct StrategyResult {
    /// Tag the run was requested with.
    pub strategy: String,
    /// Tag of the policy that actually ran (differs on pass-through fallback).
    pub policy: &'static str,
    pub dt_hours: f64,
    pub generation_mw: Vec<f64>,
    /// Combined output after curtailment (MW).
    pub grid_mw: Vec<f64>,
    /// Battery terminal power (MW, negative = charge).
    pub battery_mw: Vec<f64>,
    /// SOC at the end of each step.
    pub soc: Vec<f64>,
    pub curtailed_mw: Vec<f64>,
    pub loss_mwh: Vec<f64>,
    pub limited_by: Vec<LimitedBy>,
    pub capacity_mwh: f64,
    pub effective_power_mw: f64,
    pub initial_stored_mwh: f64,
    pub final_stored_mwh: f64,
    pub metrics: StrategyMetrics,
    pub verdict: Verdict,
}

impl StrategyResult {
    /// Number of simulated steps.
    pub fn len(&self) -> usize {
        self.generation_mw.len()
    }

    pub fn is_empty(&self) -> bool {
        self.generation_mw.is_empty()
    }

    /// Elapsed hours at the start of each step.
    pub fn time_hr(&self, step: usize) -> f64 {
        step as f64 * self.dt_hours
    }

    /// Surfaces an invalid verdict as an error.
    ///
    /// # Errors
    ///
    /// Returns a [`ValidationFailure`] if the attached verdict is not valid.
    pub fn ensure_valid(&self) -> Result<(), ValidationFailure> {
        self.verdict.clone().into_result()
    }
}

/// Drives a policy from a [`StrategyLibrary`] over a generation profile.
#[derive(Default)]
pub struct StrategyRunner {
    library: StrategyLibrary,
    validator: Validator,
}

impl StrategyRunner {
    pub fn new(library: StrategyLibrary, validator: Validator) -> Self {
        Self { library, validator }
    }

    pub fn library(&self) -> &StrategyLibrary {
        &self.library
    }

    /// Runs `strategy` over `profile` and validates the result.
    ///
    /// The profile is consumed at its native resolution: `dt_hours` must be
    /// the step duration the profile was sampled at.
    ///
    /// # Arguments
    ///
    /// * `battery` - Battery to dispatch; its state carries over after the run
    /// * `profile` - Generation per step (MW)
    /// * `dt_hours` - Step duration in hours
    /// * `strategy` - Policy tag; unknown tags fall back to pass-through
    /// * `params` - Parameters forwarded verbatim to the policy
    ///
    /// # Errors
    ///
    /// Returns a `ConfigurationError` for an empty profile, a non-finite
    /// generation value or a non-positive `dt_hours`. An invalid verdict is
    /// not an error here; see [`StrategyResult::ensure_valid`].
    pub fn run(
        &self,
        battery: &mut BatteryModel,
        profile: &[f64],
        dt_hours: f64,
        strategy: &str,
        params: &StrategyParams,
    ) -> Result<StrategyResult, ConfigurationError> {
        if profile.is_empty() {
            return Err(ConfigurationError::EmptyProfile);
        }
        if !(dt_hours.is_finite() && dt_hours > 0.0) {
            return Err(ConfigurationError::InvalidTimeStep(dt_hours));
        }
        if let Some(step) = profile.iter().position(|g| !g.is_finite()) {
            return Err(ConfigurationError::NonFiniteGeneration(step));
        }

        let mut policy = self.library.resolve(strategy, params);
        policy.prepare(profile, dt_hours);

        info!(
            strategy,
            policy = policy.name(),
            steps = profile.len(),
            dt_hours,
            "strategy run started"
        );

        let n = profile.len();
        let initial_stored_mwh = battery.state().stored_energy_mwh;
        let initial_cycles = battery.state().equivalent_full_cycles;

        let mut grid_mw = Vec::with_capacity(n);
        let mut battery_mw = Vec::with_capacity(n);
        let mut soc = Vec::with_capacity(n);
        let mut curtailed_mw = Vec::with_capacity(n);
        let mut loss_mwh = Vec::with_capacity(n);
        let mut limited_by = Vec::with_capacity(n);
        let mut previous_grid_mw = None;

        let mut clock = Clock::new(n, dt_hours);
        let hours: Vec<f64> = (0..n).map(|t| clock.hour_of_day(t)).collect();
        clock.run(|t| {
            let generation_mw = profile[t];
            let ctx = DispatchContext {
                step: t,
                hour_of_day: hours[t],
                dt_hours,
                generation_mw,
                profile,
                previous_grid_mw,
                battery: BatteryView::of(battery),
            };
            let request = policy.request_mw(&ctx);
            let export_limit = policy.export_limit_mw(&ctx);
            let record = battery.step(request, dt_hours);

            // Only positive generation can be curtailed.
            let combined = generation_mw + record.actual_mw;
            let curtailed = export_limit.map_or(0.0, |limit| {
                (combined - limit).clamp(0.0, generation_mw.max(0.0))
            });
            let grid = combined - curtailed;

            debug!(
                step = t,
                generation_mw,
                request_mw = request,
                battery_mw = record.actual_mw,
                grid_mw = grid,
                soc = record.soc,
                "step"
            );

            grid_mw.push(grid);
            battery_mw.push(record.actual_mw);
            soc.push(record.soc);
            curtailed_mw.push(curtailed);
            loss_mwh.push(record.loss_mwh);
            limited_by.push(record.limited_by);
            previous_grid_mw = Some(grid);
        });

        let final_stored_mwh = battery.state().stored_energy_mwh;
        let metrics = StrategyMetrics::from_series(
            &SeriesRef {
                generation_mw: profile,
                grid_mw: &grid_mw,
                battery_mw: &battery_mw,
                curtailed_mw: &curtailed_mw,
                loss_mwh: &loss_mwh,
            },
            dt_hours,
            &StorageChange {
                stored_delta_mwh: final_stored_mwh - initial_stored_mwh,
                one_way_efficiency: battery.config().one_way_efficiency,
                equivalent_full_cycles: battery.state().equivalent_full_cycles - initial_cycles,
            },
        );

        let config = battery.config();
        let mut result = StrategyResult {
            strategy: strategy.to_string(),
            policy: policy.name(),
            dt_hours,
            generation_mw: profile.to_vec(),
            grid_mw,
            battery_mw,
            soc,
            curtailed_mw,
            loss_mwh,
            limited_by,
            capacity_mwh: config.capacity_mwh,
            effective_power_mw: config.effective_power_mw,
            initial_stored_mwh,
            final_stored_mwh,
            metrics,
            verdict: Verdict::default(),
        };
        result.verdict = self.validator.validate(&result);

        info!(
            strategy,
            delivered_mwh = result.metrics.total_delivered_mwh,
            curtailed_mwh = result.metrics.total_curtailed_mwh,
            cycles = result.metrics.equivalent_full_cycles,
            valid = result.verdict.valid,
            "strategy run finished"
        );

        Ok(result)
    }
}

/// Builds a fresh battery and runs `strategy` with the standard library.
///
/// # Errors
///
/// Returns a `ConfigurationError` for invalid battery options or run inputs.
pub fn simulate(
    options: BatteryOptions,
    profile: &[f64],
    dt_hours: f64,
    strategy: &str,
    params: &StrategyParams,
) -> Result<StrategyResult, ConfigurationError> {
    let mut battery = BatteryModel::new(options)?;
    StrategyRunner::default().run(&mut battery, profile, dt_hours, strategy, params)
}
