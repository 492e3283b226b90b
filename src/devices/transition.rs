//! Pure battery state transition.
//!
//! Both the mutating [`BatteryModel::step`](super::BatteryModel::step) and the
//! stateless `next_state` family are thin wrappers around [`transition`].
//!
//! # Power Convention (Plant)
//! - Negative power: charging (absorbing generation or grid energy)
//! - Positive power: discharging (delivering energy)

use std::fmt;

use ndarray::{Array, ArrayView, Dimension, ErrorKind, ShapeError, Zip};
use serde::Serialize;

use super::battery::BatteryConfiguration;

/// Relative threshold below which remaining headroom counts as exhausted.
const HEADROOM_EPS: f64 = 1e-12;

/// Constraint that bound the delivered power on a step.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LimitedBy {
    /// Request was within every limit.
    #[default]
    None,
    /// Clamped to the effective rated power.
    PowerLimit,
    /// The battery was already at the edge of its usable band.
    SocLimit,
    /// Clamped by the C-rate ceiling or by the headroom left for this step.
    RateLimit,
}

impl LimitedBy {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::PowerLimit => "power_limit",
            Self::SocLimit => "soc_limit",
            Self::RateLimit => "rate_limit",
        }
    }
}

impl fmt::Display for LimitedBy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Floating-point precision of `next_state` outputs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Precision {
    /// Outputs are rounded through `f32`.
    ///
    /// SOC and power round toward zero so a saturated step never reports more
    /// than the rating or a SOC above 1.
    Single,
    #[default]
    Double,
}

impl Precision {
    fn round(self, value: f64) -> f64 {
        match self {
            Self::Single => f64::from(value as f32),
            Self::Double => value,
        }
    }

    fn round_toward_zero(self, value: f64) -> f64 {
        match self {
            Self::Single => {
                let single = value as f32;
                if f64::from(single).abs() > value.abs() {
                    // One ulp smaller in magnitude, whatever the sign.
                    f64::from(f32::from_bits(single.to_bits() - 1))
                } else {
                    f64::from(single)
                }
            }
            Self::Double => value,
        }
    }
}

/// Result of one state transition.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transition {
    /// State of charge after the step (0.0 to 1.0).
    pub soc: f64,
    /// Power actually delivered (+) or absorbed (-) at the terminals (MW).
    pub power_mw: f64,
    /// Conversion loss over the step (MWh, >= 0).
    pub loss_mwh: f64,
    /// Change of stored energy over the step (MWh).
    pub stored_delta_mwh: f64,
    pub limited_by: LimitedBy,
}

impl Transition {
    fn idle(soc: f64) -> Self {
        Self {
            soc,
            power_mw: 0.0,
            loss_mwh: 0.0,
            stored_delta_mwh: 0.0,
            limited_by: LimitedBy::None,
        }
    }

    fn rounded(self, precision: Precision) -> Self {
        Self {
            soc: precision.round_toward_zero(self.soc),
            power_mw: precision.round_toward_zero(self.power_mw),
            loss_mwh: precision.round(self.loss_mwh),
            stored_delta_mwh: precision.round(self.stored_delta_mwh),
            limited_by: self.limited_by,
        }
    }
}

/// Element-wise outputs of [`transition_array`], all shaped like the input SOC.
#[derive(Debug, Clone, PartialEq)]
pub struct TransitionArrays<D: Dimension> {
    pub soc: Array<f64, D>,
    pub power_mw: Array<f64, D>,
    pub loss_mwh: Array<f64, D>,
}

/// Computes the battery state after applying `request_mw` for `dt_hours`.
///
/// Never fails: out-of-range requests are saturated, a NaN request or SOC is
/// treated as zero, and a non-positive or non-finite `dt_hours` produces an
/// idle step.
///
/// # Arguments
///
/// * `config` - Resolved battery configuration
/// * `soc` - State of charge before the step, clipped to [0, 1]
/// * `request_mw` - Requested power (negative = charge, positive = discharge)
/// * `dt_hours` - Step duration in hours
pub fn transition(
    config: &BatteryConfiguration,
    soc: f64,
    request_mw: f64,
    dt_hours: f64,
) -> Transition {
    let soc = if soc.is_nan() { 0.0 } else { soc.clamp(0.0, 1.0) };
    let request_mw = if request_mw.is_nan() { 0.0 } else { request_mw };
    if request_mw == 0.0 || !(dt_hours.is_finite() && dt_hours > 0.0) {
        return Transition::idle(soc);
    }

    let capacity = config.capacity_mwh;
    let eta = config.one_way_efficiency;
    let stored = soc * capacity;

    let mut limited_by = LimitedBy::None;
    let mut power = request_mw;

    // Enforce MW limits
    if power.abs() > config.effective_power_mw {
        power = config.effective_power_mw.copysign(power);
        limited_by = LimitedBy::PowerLimit;
    }
    let rate_ceiling = config.rate_ceiling_mw();
    if power.abs() > rate_ceiling {
        power = rate_ceiling.copysign(power);
        limited_by = LimitedBy::RateLimit;
    }

    let (new_stored, loss) = if power < 0.0 {
        // Charging: limit by headroom below the usable band ceiling
        let headroom = (config.soc_max * capacity - stored).max(0.0);
        let max_mw_soc = headroom / (eta * dt_hours);
        if -power > max_mw_soc {
            if headroom <= HEADROOM_EPS * capacity {
                power = 0.0;
                limited_by = LimitedBy::SocLimit;
            } else {
                power = -max_mw_soc;
                limited_by = LimitedBy::RateLimit;
            }
        }
        let energy_in = -power * dt_hours;
        let gained = energy_in * eta;
        (stored + gained, energy_in - gained)
    } else {
        // Discharging: limit by energy above the usable band floor
        let available = (stored - config.soc_min * capacity).max(0.0);
        let max_mw_soc = available * eta / dt_hours;
        if power > max_mw_soc {
            if available <= HEADROOM_EPS * capacity {
                power = 0.0;
                limited_by = LimitedBy::SocLimit;
            } else {
                power = max_mw_soc;
                limited_by = LimitedBy::RateLimit;
            }
        }
        let delivered = power * dt_hours;
        let drawn = delivered / eta;
        (stored - drawn, drawn - delivered)
    };

    let new_soc = (new_stored / capacity).clamp(0.0, 1.0);
    Transition {
        soc: new_soc,
        power_mw: power,
        loss_mwh: loss,
        stored_delta_mwh: new_soc * capacity - stored,
        limited_by,
    }
}

/// [`transition`] with outputs rounded to the requested precision.
pub fn transition_with_precision(
    config: &BatteryConfiguration,
    soc: f64,
    request_mw: f64,
    dt_hours: f64,
    precision: Precision,
) -> Transition {
    transition(config, soc, request_mw, dt_hours).rounded(precision)
}

/// Element-wise [`transition`] over arrays of any dimension.
///
/// `request_mw` is broadcast to the shape of `soc` (a 0-d array applies one
/// request to every element). Outputs take the shape of `soc`.
///
/// # Errors
///
/// Returns a `ShapeError` if `request_mw` cannot be broadcast to `soc`.
pub fn transition_array<D, E>(
    config: &BatteryConfiguration,
    soc: ArrayView<'_, f64, D>,
    request_mw: ArrayView<'_, f64, E>,
    dt_hours: f64,
    precision: Precision,
) -> Result<TransitionArrays<D>, ShapeError>
where
    D: Dimension,
    E: Dimension,
{
    let request_mw = request_mw
        .broadcast(soc.raw_dim())
        .ok_or_else(|| ShapeError::from_kind(ErrorKind::IncompatibleShape))?;

    let transitions = Zip::from(&soc).and(&request_mw).map_collect(|&s, &r| {
        transition_with_precision(config, s, r, dt_hours, precision)
    });

    Ok(TransitionArrays {
        soc: transitions.map(|t| t.soc),
        power_mw: transitions.map(|t| t.power_mw),
        loss_mwh: transitions.map(|t| t.loss_mwh),
    })
}
