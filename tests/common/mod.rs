//! Shared test fixtures for integration tests.

use bess_sim::devices::{BatteryModel, BatteryOptions, SolarProfile, Technology, Topology};
use bess_sim::sim::StrategyParams;

/// Four-step profile with an over-ceiling step and an import step.
pub const SHAVING_PROFILE: [f64; 4] = [2.0, 0.0, -1.0, 0.0];

/// 1 MW / 2 h modern LFP on a parallel AC coupling, half charged.
pub fn default_options() -> BatteryOptions {
    BatteryOptions {
        power_mw: 1.0,
        duration_h: 2.0,
        technology: Technology::ModernLfp,
        topology: Topology::ParallelAc,
        ..BatteryOptions::default()
    }
}

/// 2 MW / 4 h premium battery, large enough to rarely saturate on a 1.5 MW PV day.
pub fn large_options() -> BatteryOptions {
    BatteryOptions {
        power_mw: 2.0,
        duration_h: 4.0,
        technology: Technology::Premium,
        ..BatteryOptions::default()
    }
}

pub fn battery(options: BatteryOptions) -> BatteryModel {
    BatteryModel::new(options).expect("valid battery options")
}

/// Noise-free hourly PV day (1.5 MW peak, sunrise 6, sunset 18).
pub fn clear_sky_day() -> Vec<f64> {
    SolarProfile {
        noise_std: 0.0,
        ..SolarProfile::default()
    }
    .generate()
}

/// Two noisy hourly PV days (seed 42).
pub fn noisy_days() -> Vec<f64> {
    SolarProfile {
        days: 2,
        noise_std: 0.1,
        ..SolarProfile::default()
    }
    .generate()
}

pub fn ceiling(ceiling_mw: f64) -> StrategyParams {
    StrategyParams::new().with("ceiling_mw", ceiling_mw)
}

/// Population standard deviation.
pub fn std_dev(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    (values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n).sqrt()
}
