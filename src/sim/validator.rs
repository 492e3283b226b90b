//! Post-run physical checks on a [`StrategyResult`].

use std::fmt;

use serde::Serialize;

use super::runner::StrategyResult;
use crate::error::ValidationFailure;

/// Default relative tolerance on the energy balance (0.5%).
pub const DEFAULT_TOLERANCE: f64 = 0.005;

/// Slack on the power bound to absorb float rounding in the clamps.
const POWER_SLACK: f64 = 1e-9;

/// Outcome of validating one run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Verdict {
    pub valid: bool,
    /// Why the run is invalid. `None` when valid.
    pub reason: Option<String>,
    /// Relative energy-balance error (fraction, not percent).
    pub energy_balance_error: f64,
}

impl Verdict {
    fn pass(energy_balance_error: f64) -> Self {
        Self {
            valid: true,
            reason: None,
            energy_balance_error,
        }
    }

    fn fail(reason: impl Into<String>, energy_balance_error: f64) -> Self {
        Self {
            valid: false,
            reason: Some(reason.into()),
            energy_balance_error,
        }
    }

    /// Turns an invalid verdict into an error so callers can propagate it.
    ///
    /// # Errors
    ///
    /// Returns a [`ValidationFailure`] when the verdict is not valid.
    pub fn into_result(self) -> Result<(), ValidationFailure> {
        if self.valid {
            Ok(())
        } else {
            Err(ValidationFailure {
                reason: self.reason.unwrap_or_else(|| "unspecified".to_string()),
                energy_balance_error: self.energy_balance_error,
            })
        }
    }
}

impl Default for Verdict {
    /// A verdict for a run that has not been validated yet.
    fn default() -> Self {
        Self::fail("not validated", 0.0)
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.reason {
            None => write!(
                f,
                "VALID (energy balance error {:.4}%)",
                self.energy_balance_error * 100.0
            ),
            Some(reason) => write!(
                f,
                "INVALID: {reason} (energy balance error {:.4}%)",
                self.energy_balance_error * 100.0
            ),
        }
    }
}

/// Checks energy conservation and physical bounds of a completed run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Validator {
    /// Maximum relative energy-balance error accepted.
    pub tolerance: f64,
}

impl Default for Validator {
    fn default() -> Self {
        Self {
            tolerance: DEFAULT_TOLERANCE,
        }
    }
}

impl Validator {
    pub fn new(tolerance: f64) -> Self {
        Self { tolerance }
    }

    /// Validates `result`. Checks run in order and the first failure wins,
    /// but the energy balance error is always measured when the arrays allow it.
    pub fn validate(&self, result: &StrategyResult) -> Verdict {
        let n = result.generation_mw.len();
        let lengths = [
            result.grid_mw.len(),
            result.battery_mw.len(),
            result.soc.len(),
            result.curtailed_mw.len(),
            result.loss_mwh.len(),
            result.limited_by.len(),
        ];
        if lengths.iter().any(|&len| len != n) {
            return Verdict::fail(format!("output arrays differ in length from the {n}-step profile"), 0.0);
        }

        let all_finite = [
            &result.generation_mw,
            &result.grid_mw,
            &result.battery_mw,
            &result.soc,
            &result.curtailed_mw,
            &result.loss_mwh,
        ]
        .iter()
        .all(|series| series.iter().all(|v| v.is_finite()));
        if !all_finite {
            return Verdict::fail("non-finite value in output", f64::NAN);
        }

        let error = energy_balance_error(result);

        if let Some(step) = result.soc.iter().position(|s| !(0.0..=1.0).contains(s)) {
            return Verdict::fail(
                format!("SOC {:.6} outside [0, 1] at step {step}", result.soc[step]),
                error,
            );
        }

        let bound = result.effective_power_mw * (1.0 + POWER_SLACK);
        if let Some(step) = result.battery_mw.iter().position(|p| p.abs() > bound) {
            return Verdict::fail(
                format!(
                    "battery power {:.6} MW exceeds effective rating {:.6} MW at step {step}",
                    result.battery_mw[step], result.effective_power_mw
                ),
                error,
            );
        }

        if error > self.tolerance {
            return Verdict::fail(
                format!(
                    "energy balance error {:.4}% above tolerance {:.4}%",
                    error * 100.0,
                    self.tolerance * 100.0
                ),
                error,
            );
        }

        Verdict::pass(error)
    }
}

/// Relative error of `generation = grid + curtailed + losses + Δstored`.
///
/// Normalised by the larger of absolute generation energy and absolute battery
/// throughput so an idle battery on a zero profile does not divide by zero.
pub fn energy_balance_error(result: &StrategyResult) -> f64 {
    let dt = result.dt_hours;
    let generation: f64 = result.generation_mw.iter().sum::<f64>() * dt;
    let grid: f64 = result.grid_mw.iter().sum::<f64>() * dt;
    let curtailed: f64 = result.curtailed_mw.iter().sum::<f64>() * dt;
    let losses: f64 = result.loss_mwh.iter().sum();
    let stored_change = result.final_stored_mwh - result.initial_stored_mwh;

    let imbalance = generation - (grid + curtailed + losses + stored_change);

    let scale = result
        .generation_mw
        .iter()
        .map(|g| g.abs())
        .sum::<f64>()
        .max(result.battery_mw.iter().map(|p| p.abs()).sum::<f64>())
        * dt;
    imbalance.abs() / scale.max(f64::EPSILON)
}
