//! Full-horizon strategy runs through the public API.

mod common;

use approx::assert_abs_diff_eq;
use bess_sim::devices::{BatteryModel, BatteryOptions, LimitedBy};
use bess_sim::error::{ConfigurationError, EngineError};
use bess_sim::sim::policies::PASSTHROUGH;
use bess_sim::sim::{StrategyLibrary, StrategyParams, StrategyRunner, simulate};

#[test]
fn shaving_keeps_grid_under_ceiling_and_curtails_the_rest() {
    let result = simulate(
        common::default_options(),
        &common::SHAVING_PROFILE,
        1.0,
        "capacity_shaving",
        &common::ceiling(1.0),
    )
    .expect("valid run");

    assert_eq!(result.len(), 4);
    assert!(result.grid_mw[0] <= 1.0 + 1e-9);
    assert!(result.curtailed_mw[0] > 0.0);
    assert!(result.verdict.valid, "{}", result.verdict);
    assert!(result.ensure_valid().is_ok());

    // 0.9 MWh of headroom below 95% SOC absorbed in one hour
    let eta = 0.92_f64.sqrt();
    assert_abs_diff_eq!(result.battery_mw[0], -0.9 / eta, epsilon = 1e-12);
    assert_eq!(result.limited_by[0], LimitedBy::RateLimit);
    assert_abs_diff_eq!(result.curtailed_mw[0], 1.0 - 0.9 / eta, epsilon = 1e-12);
    assert_abs_diff_eq!(result.soc[0], 0.95, epsilon = 1e-12);

    // The battery ends below its starting energy; that energy is not counted
    // as recovered.
    let rte = result.metrics.realized_round_trip_efficiency.expect("battery charged");
    assert!(rte <= 1.0, "rte {rte}");
    assert_abs_diff_eq!(rte, 0.92, epsilon = 1e-9);
}

#[test]
fn closed_cycle_recovers_the_configured_round_trip() {
    let options = BatteryOptions {
        initial_soc: 0.05,
        ..common::default_options()
    };
    let expected = common::battery(options.clone()).config().round_trip_efficiency;
    let result = simulate(
        options,
        &[2.0, 2.0, 0.0, 0.0, 0.0, 0.0],
        1.0,
        "capacity_shaving",
        &common::ceiling(1.0),
    )
    .expect("valid run");

    // Charged to the top of the band, then drained back to the floor
    assert_abs_diff_eq!(result.final_stored_mwh, result.initial_stored_mwh, epsilon = 1e-9);
    let m = &result.metrics;
    let rte = m.realized_round_trip_efficiency.expect("battery charged");
    assert_abs_diff_eq!(rte, expected, epsilon = 1e-9);
    assert_abs_diff_eq!(m.total_discharged_mwh / m.total_charged_mwh, expected, epsilon = 1e-6);
}

#[test]
fn negative_power_is_a_configuration_error() {
    let err = BatteryModel::new(BatteryOptions {
        power_mw: -1.0,
        ..common::default_options()
    })
    .expect_err("negative power");
    assert_eq!(err, ConfigurationError::NonPositivePower(-1.0));

    let err = simulate(
        BatteryOptions {
            power_mw: -1.0,
            ..common::default_options()
        },
        &common::SHAVING_PROFILE,
        1.0,
        "capacity_shaving",
        &StrategyParams::new(),
    )
    .expect_err("negative power");
    assert!(matches!(EngineError::from(err), EngineError::Configuration(_)));
}

#[test]
fn unknown_strategy_runs_as_passthrough() {
    let result = simulate(
        common::default_options(),
        &common::SHAVING_PROFILE,
        1.0,
        "does_not_exist",
        &StrategyParams::new(),
    )
    .expect("valid run");

    assert_eq!(result.policy, PASSTHROUGH);
    assert_eq!(result.strategy, "does_not_exist");
    assert!(result.battery_mw.iter().all(|&p| p == 0.0));
    assert_eq!(result.grid_mw, common::SHAVING_PROFILE.to_vec());
    assert!(result.verdict.valid, "{}", result.verdict);
}

#[test]
fn every_registered_strategy_passes_validation() {
    let library = StrategyLibrary::standard();
    let profile = common::noisy_days();
    for (tag, _) in library.tags() {
        let result = simulate(
            common::default_options(),
            &profile,
            1.0,
            tag,
            &StrategyParams::new(),
        )
        .expect("valid run");
        assert_eq!(result.policy, tag);
        assert!(result.verdict.valid, "{tag}: {}", result.verdict);
        assert!(result.soc.iter().all(|s| (0.0..=1.0).contains(s)), "{tag}");
    }
}

#[test]
fn metrics_agree_with_series() {
    let result = simulate(
        common::large_options(),
        &common::noisy_days(),
        1.0,
        "night_shift",
        &StrategyParams::new(),
    )
    .expect("valid run");
    let m = &result.metrics;

    assert_abs_diff_eq!(m.total_delivered_mwh, result.grid_mw.iter().sum::<f64>(), epsilon = 1e-9);
    assert_abs_diff_eq!(m.total_losses_mwh, result.loss_mwh.iter().sum::<f64>(), epsilon = 1e-12);
    assert!(m.total_charged_mwh > 0.0);
    assert!(m.total_discharged_mwh > 0.0);
    assert!(m.equivalent_full_cycles > 0.0);
    let rte = m.realized_round_trip_efficiency.expect("battery charged");
    assert!(rte > 0.0 && rte <= 1.0, "rte {rte}");

    // Charged energy either came back out, was lost or is still stored.
    let stored_change = result.final_stored_mwh - result.initial_stored_mwh;
    assert_abs_diff_eq!(
        m.total_charged_mwh - m.total_discharged_mwh,
        m.total_losses_mwh + stored_change,
        epsilon = 1e-9
    );
}

#[test]
fn flat_day_flattens_daylight_output() {
    let profile = common::clear_sky_day();
    let result = simulate(
        common::large_options(),
        &profile,
        1.0,
        "flat_day",
        &StrategyParams::new(),
    )
    .expect("valid run");

    let window = 6..18;
    let generation_spread = common::std_dev(&profile[window.clone()]);
    let grid_spread = common::std_dev(&result.grid_mw[window]);
    assert!(
        grid_spread < 0.5 * generation_spread,
        "grid spread {grid_spread:.3} vs generation {generation_spread:.3}"
    );
    assert!(result.verdict.valid, "{}", result.verdict);
}

#[test]
fn night_shift_moves_energy_into_the_evening() {
    let profile = common::clear_sky_day();
    let result = simulate(
        common::large_options(),
        &profile,
        1.0,
        "night_shift",
        &StrategyParams::new().with("store_above_mw", 0.5),
    )
    .expect("valid run");

    let evening: f64 = result.grid_mw[18..].iter().sum();
    assert!(evening > 0.0, "no evening delivery");
    assert!(result.battery_mw[12] < 0.0, "should charge at noon");
    assert!(result.battery_mw[..6].iter().all(|&p| p >= 0.0));
}

#[test]
fn ramp_limit_bounds_upward_ramps_and_unsaturated_drops() {
    let profile = common::noisy_days();
    let max_ramp = 0.3;
    let result = simulate(
        common::large_options(),
        &profile,
        1.0,
        "ramp_limit",
        &StrategyParams::new().with("max_ramp_mw_per_h", max_ramp),
    )
    .expect("valid run");

    for t in 1..result.len() {
        let ramp = result.grid_mw[t] - result.grid_mw[t - 1];
        assert!(ramp <= max_ramp + 1e-9, "step {t}: ramp up {ramp:.4}");
        if result.limited_by[t] == LimitedBy::None {
            assert!(ramp >= -max_ramp - 1e-9, "step {t}: ramp down {ramp:.4}");
        }
    }
    assert!(result.verdict.valid, "{}", result.verdict);
}

#[test]
fn ramp_limit_curtails_once_the_battery_is_full() {
    let result = simulate(
        BatteryOptions {
            initial_soc: 0.95,
            ..common::default_options()
        },
        &[0.0, 3.0, 3.0],
        1.0,
        "ramp_limit",
        &StrategyParams::new().with("max_ramp_mw_per_h", 0.5),
    )
    .expect("valid run");

    assert_eq!(result.limited_by[1], LimitedBy::SocLimit);
    assert_abs_diff_eq!(result.grid_mw[1], 0.5, epsilon = 1e-12);
    assert_abs_diff_eq!(result.grid_mw[2], 1.0, epsilon = 1e-12);
    assert_abs_diff_eq!(result.curtailed_mw[1], 2.5, epsilon = 1e-12);
    assert!(result.verdict.valid, "{}", result.verdict);
}

#[test]
fn cycle_stress_accumulates_cycles() {
    let result = simulate(
        common::default_options(),
        &[0.0; 48],
        0.5,
        "cycle_stress",
        &StrategyParams::new(),
    )
    .expect("valid run");
    assert!(result.metrics.equivalent_full_cycles > 1.0);
    assert!(result.limited_by.contains(&LimitedBy::SocLimit) || result.limited_by.contains(&LimitedBy::RateLimit));
    assert!(result.verdict.valid, "{}", result.verdict);
}

#[test]
fn history_records_every_step_of_a_run() {
    let mut battery = common::battery(BatteryOptions {
        track_history: true,
        ..common::default_options()
    });
    let result = StrategyRunner::default()
        .run(&mut battery, &common::SHAVING_PROFILE, 1.0, "capacity_shaving", &common::ceiling(1.0))
        .expect("valid run");

    let actual: Vec<f64> = battery.history().map(|r| r.actual_mw).collect();
    assert_eq!(actual, result.battery_mw);
    let limited: Vec<LimitedBy> = battery.history().map(|r| r.limited_by).collect();
    assert_eq!(limited, result.limited_by);
}
