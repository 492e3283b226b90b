//! Built-in dispatch policies.
//!
//! Combined output is `generation + battery power`, so a request of
//! `target - generation` moves the combined output onto `target`.

use super::clock::{hour_in_window, hours_until};
use super::strategy::{DispatchContext, DispatchPolicy, StrategyParams};

/// Tag of the idle policy, also the fallback for unknown tags.
pub const PASSTHROUGH: &str = "passthrough";

/// Keeps combined output at or below a ceiling.
///
/// Charges from generation above the ceiling and, when `fill_shortfall` is
/// on, discharges to lift combined output up to the ceiling. The ceiling is
/// also the export limit, so generation that can neither be exported nor
/// stored is curtailed.
///
/// Parameters: `ceiling_mw` (1.0), `fill_shortfall` (1).
#[derive(Debug, Clone)]
pub struct CapacityShaving {
    ceiling_mw: f64,
    fill_shortfall: bool,
}

impl CapacityShaving {
    pub fn new(params: &StrategyParams) -> Self {
        Self {
            ceiling_mw: params.get_or("ceiling_mw", 1.0),
            fill_shortfall: params.flag("fill_shortfall", true),
        }
    }

    pub fn boxed(params: &StrategyParams) -> Box<dyn DispatchPolicy> {
        Box::new(Self::new(params))
    }
}

impl DispatchPolicy for CapacityShaving {
    fn name(&self) -> &'static str {
        "capacity_shaving"
    }

    fn request_mw(&mut self, ctx: &DispatchContext<'_>) -> f64 {
        let excess = ctx.generation_mw - self.ceiling_mw;
        if excess > 0.0 || self.fill_shortfall {
            -excess
        } else {
            0.0
        }
    }

    fn export_limit_mw(&self, _ctx: &DispatchContext<'_>) -> Option<f64> {
        Some(self.ceiling_mw)
    }
}

/// Holds combined output constant during a daylight window.
///
/// Parameters: `target_mw` (mean generation inside the window),
/// `start_hour` (6), `end_hour` (18).
#[derive(Debug, Clone)]
pub struct FlatDay {
    target_mw: Option<f64>,
    start_hour: f64,
    end_hour: f64,
}

impl FlatDay {
    pub fn new(params: &StrategyParams) -> Self {
        Self {
            target_mw: params.get("target_mw"),
            start_hour: params.get_or("start_hour", 6.0),
            end_hour: params.get_or("end_hour", 18.0),
        }
    }

    pub fn boxed(params: &StrategyParams) -> Box<dyn DispatchPolicy> {
        Box::new(Self::new(params))
    }
}

impl DispatchPolicy for FlatDay {
    fn name(&self) -> &'static str {
        "flat_day"
    }

    fn prepare(&mut self, profile: &[f64], dt_hours: f64) {
        if self.target_mw.is_some() {
            return;
        }
        let (sum, count) = profile
            .iter()
            .enumerate()
            .filter(|(t, _)| {
                let hour = (*t as f64 * dt_hours).rem_euclid(24.0);
                hour_in_window(hour, self.start_hour, self.end_hour)
            })
            .fold((0.0, 0_usize), |(sum, count), (_, &g)| (sum + g, count + 1));
        self.target_mw = Some(if count > 0 { sum / count as f64 } else { 0.0 });
    }

    fn request_mw(&mut self, ctx: &DispatchContext<'_>) -> f64 {
        if !hour_in_window(ctx.hour_of_day, self.start_hour, self.end_hour) {
            return 0.0;
        }
        self.target_mw.unwrap_or(ctx.generation_mw) - ctx.generation_mw
    }
}

/// Stores daytime surplus and releases it over an evening/night window.
///
/// Release power is spread evenly over the steps left in the release window.
///
/// Parameters: `day_start_hour` (6), `day_end_hour` (18),
/// `release_start_hour` (18), `release_end_hour` (6), `store_above_mw` (0).
#[derive(Debug, Clone)]
pub struct NightShift {
    day_start_hour: f64,
    day_end_hour: f64,
    release_start_hour: f64,
    release_end_hour: f64,
    store_above_mw: f64,
}

impl NightShift {
    pub fn new(params: &StrategyParams) -> Self {
        Self {
            day_start_hour: params.get_or("day_start_hour", 6.0),
            day_end_hour: params.get_or("day_end_hour", 18.0),
            release_start_hour: params.get_or("release_start_hour", 18.0),
            release_end_hour: params.get_or("release_end_hour", 6.0),
            store_above_mw: params.get_or("store_above_mw", 0.0),
        }
    }

    pub fn boxed(params: &StrategyParams) -> Box<dyn DispatchPolicy> {
        Box::new(Self::new(params))
    }
}

impl DispatchPolicy for NightShift {
    fn name(&self) -> &'static str {
        "night_shift"
    }

    fn request_mw(&mut self, ctx: &DispatchContext<'_>) -> f64 {
        let hour = ctx.hour_of_day;
        if hour_in_window(hour, self.day_start_hour, self.day_end_hour) {
            let surplus = ctx.generation_mw - self.store_above_mw;
            return if surplus > 0.0 { -surplus } else { 0.0 };
        }
        if hour_in_window(hour, self.release_start_hour, self.release_end_hour) {
            let remaining = hours_until(hour, self.release_end_hour);
            let steps_left = (remaining / ctx.dt_hours).ceil().max(1.0);
            return ctx.battery.dischargeable_mwh / (steps_left * ctx.dt_hours);
        }
        0.0
    }
}

/// Bounds the step-to-step change of combined output.
///
/// Upward ramps the battery cannot absorb are curtailed. Downward ramps are
/// only bounded while the battery has energy and power left to fill them.
///
/// Parameters: `max_ramp_mw_per_h` (half the effective power per hour).
#[derive(Debug, Clone)]
pub struct RampLimit {
    max_ramp_mw_per_h: Option<f64>,
}

impl RampLimit {
    pub fn new(params: &StrategyParams) -> Self {
        Self {
            max_ramp_mw_per_h: params.get("max_ramp_mw_per_h").map(f64::abs),
        }
    }

    pub fn boxed(params: &StrategyParams) -> Box<dyn DispatchPolicy> {
        Box::new(Self::new(params))
    }

    fn max_step_mw(&self, ctx: &DispatchContext<'_>) -> f64 {
        let per_hour = self
            .max_ramp_mw_per_h
            .unwrap_or(0.5 * ctx.battery.effective_power_mw);
        per_hour * ctx.dt_hours
    }
}

impl DispatchPolicy for RampLimit {
    fn name(&self) -> &'static str {
        "ramp_limit"
    }

    fn request_mw(&mut self, ctx: &DispatchContext<'_>) -> f64 {
        let Some(previous) = ctx.previous_grid_mw else {
            return 0.0;
        };
        let max_step = self.max_step_mw(ctx);
        let target = ctx
            .generation_mw
            .clamp(previous - max_step, previous + max_step);
        target - ctx.generation_mw
    }

    fn export_limit_mw(&self, ctx: &DispatchContext<'_>) -> Option<f64> {
        ctx.previous_grid_mw
            .map(|previous| previous + self.max_step_mw(ctx))
    }
}

/// Alternates full-power charge and discharge blocks regardless of generation.
///
/// Exists to stress cycle counting; it ignores any economic sense.
///
/// Parameters: `period_steps` (4).
#[derive(Debug, Clone)]
pub struct CycleStress {
    period_steps: usize,
}

impl CycleStress {
    pub fn new(params: &StrategyParams) -> Self {
        Self {
            period_steps: params.get_or("period_steps", 4.0).max(1.0) as usize,
        }
    }

    pub fn boxed(params: &StrategyParams) -> Box<dyn DispatchPolicy> {
        Box::new(Self::new(params))
    }
}

impl DispatchPolicy for CycleStress {
    fn name(&self) -> &'static str {
        "cycle_stress"
    }

    fn request_mw(&mut self, ctx: &DispatchContext<'_>) -> f64 {
        let power = ctx.battery.effective_power_mw;
        if (ctx.step / self.period_steps) % 2 == 0 {
            -power
        } else {
            power
        }
    }
}

/// Tracks a trailing moving average of generation.
///
/// Parameters: `window_steps` (4).
#[derive(Debug, Clone)]
pub struct Smoothing {
    window_steps: usize,
}

impl Smoothing {
    pub fn new(params: &StrategyParams) -> Self {
        Self {
            window_steps: params.get_or("window_steps", 4.0).max(1.0) as usize,
        }
    }

    pub fn boxed(params: &StrategyParams) -> Box<dyn DispatchPolicy> {
        Box::new(Self::new(params))
    }
}

impl DispatchPolicy for Smoothing {
    fn name(&self) -> &'static str {
        "smoothing"
    }

    fn request_mw(&mut self, ctx: &DispatchContext<'_>) -> f64 {
        let end = (ctx.step + 1).min(ctx.profile.len());
        let start = end.saturating_sub(self.window_steps);
        let window = &ctx.profile[start..end];
        if window.is_empty() {
            return 0.0;
        }
        let mean = window.iter().sum::<f64>() / window.len() as f64;
        mean - ctx.generation_mw
    }
}

/// Leaves the battery idle.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassThrough;

impl PassThrough {
    pub fn boxed(_params: &StrategyParams) -> Box<dyn DispatchPolicy> {
        Box::new(Self)
    }
}

impl DispatchPolicy for PassThrough {
    fn name(&self) -> &'static str {
        PASSTHROUGH
    }

    fn request_mw(&mut self, _ctx: &DispatchContext<'_>) -> f64 {
        0.0
    }
}
