//! Physical properties of the battery model that hold for every configuration.

mod common;

use approx::assert_abs_diff_eq;
use bess_sim::devices::{
    BatteryModel, BatteryOptions, LimitedBy, Precision, Technology, Topology,
};
use ndarray::{Array, Array3, arr0};

fn all_configurations() -> Vec<BatteryOptions> {
    let mut out = Vec::new();
    for technology in Technology::ALL {
        for topology in Topology::ALL {
            for (power_mw, duration_h) in [(1.0, 2.0), (5.0, 0.5), (0.25, 8.0)] {
                out.push(BatteryOptions {
                    power_mw,
                    duration_h,
                    technology,
                    topology,
                    ..BatteryOptions::default()
                });
            }
        }
    }
    out
}

#[test]
fn capacity_is_power_times_duration_before_derating() {
    for options in all_configurations() {
        let battery = common::battery(options.clone());
        let cfg = battery.config();
        assert_eq!(cfg.capacity_mwh, options.power_mw * options.duration_h);
        assert!(cfg.effective_power_mw <= options.power_mw);
    }
}

#[test]
fn next_state_saturates_any_request() {
    let requests = [
        f64::NEG_INFINITY,
        -1e9,
        -5.0,
        -0.1,
        0.0,
        0.1,
        5.0,
        1e9,
        f64::INFINITY,
        f64::NAN,
    ];
    for options in all_configurations() {
        let battery = common::battery(options);
        let limit = battery.config().effective_power_mw;
        for soc in [0.0, 0.03, 0.5, 0.97, 1.0] {
            for &request in &requests {
                for dt in [0.01, 1.0, 24.0] {
                    for precision in [Precision::Double, Precision::Single] {
                        let t = battery.next_state(soc, request, dt, precision);
                        assert!(
                            (0.0..=1.0).contains(&t.soc),
                            "soc {} from {soc}/{request}/{dt}/{precision:?}",
                            t.soc
                        );
                        assert!(
                            t.power_mw.abs() <= limit * (1.0 + 1e-12),
                            "power {} over {limit} ({precision:?})",
                            t.power_mw
                        );
                        assert!(t.loss_mwh >= 0.0);
                    }
                }
            }
        }
    }
}

#[test]
fn zero_requests_leave_state_unchanged() {
    let mut battery = common::battery(common::default_options());
    battery.step(-0.7, 1.0);
    let before = *battery.state();
    for dt in [0.25, 1.0, 3.0] {
        let record = battery.step(0.0, dt);
        assert_eq!(record.limited_by, LimitedBy::None);
        assert_eq!(record.loss_mwh, 0.0);
    }
    assert_eq!(battery.state().soc, before.soc);
    assert_eq!(battery.state().equivalent_full_cycles, before.equivalent_full_cycles);

    let t = battery.next_state(0.37, 0.0, 1.0, Precision::Double);
    assert_eq!(t.soc, 0.37);
}

#[test]
fn next_state_is_pure() {
    let battery = common::battery(common::default_options());
    for request in [-3.0, -0.4, 0.0, 0.6, 2.0] {
        let a = battery.next_state(0.42, request, 0.5, Precision::Double);
        let b = battery.next_state(0.42, request, 0.5, Precision::Double);
        assert_eq!(a, b);
    }
    assert_eq!(battery.soc(), 0.5);
}

#[test]
fn array_outputs_mirror_input_shape() {
    let battery = common::battery(common::default_options());
    let soc = Array3::from_shape_fn((2, 3, 4), |(i, j, k)| (i + j + k) as f64 / 7.0);
    let request = Array3::from_shape_fn((2, 3, 4), |(i, j, k)| i as f64 - j as f64 + 0.25 * k as f64);
    let out = battery
        .next_state_array(soc.view(), request.view(), 0.5, Precision::Double)
        .expect("same shapes");
    assert_eq!(out.soc.shape(), &[2, 3, 4]);
    assert_eq!(out.power_mw.shape(), &[2, 3, 4]);
    assert_eq!(out.loss_mwh.shape(), &[2, 3, 4]);

    let scalar = battery.next_state(soc[[1, 2, 3]], request[[1, 2, 3]], 0.5, Precision::Double);
    assert_eq!(out.soc[[1, 2, 3]], scalar.soc);
    assert_eq!(out.loss_mwh[[1, 2, 3]], scalar.loss_mwh);

    let zero_d = battery
        .next_state_array(arr0(0.5).view(), arr0(-0.25).view(), 1.0, Precision::Single)
        .expect("scalar shapes");
    assert_eq!(zero_d.soc.ndim(), 0);
    let expected = battery.next_state(0.5, -0.25, 1.0, Precision::Single);
    assert_eq!(zero_d.soc.into_scalar(), expected.soc);
}

#[test]
fn array_request_row_broadcasts_over_paths() {
    let battery = common::battery(common::default_options());
    let soc = Array::from_elem((5, 3), 0.5);
    let request = ndarray::arr1(&[-1.0, 0.0, 1.0]);
    let out = battery
        .next_state_array(soc.view(), request.view(), 1.0, Precision::Double)
        .expect("row broadcasts");
    assert_eq!(out.power_mw.shape(), &[5, 3]);
    assert!(out.power_mw.column(1).iter().all(|&p| p == 0.0));
    assert!(out.power_mw.column(0).iter().all(|&p| p < 0.0));
}

#[test]
fn round_trip_delivers_less_than_absorbed_by_the_losses() {
    for technology in Technology::ALL {
        let soc_min = technology.params().soc_min;
        let mut battery = common::battery(BatteryOptions {
            technology,
            initial_soc: soc_min,
            ..common::default_options()
        });

        let (rate, dt) = (0.5, 0.5);
        let mut absorbed = 0.0;
        let mut losses = 0.0;
        for _ in 0..4 {
            let record = battery.step(-rate, dt);
            assert_eq!(record.limited_by, LimitedBy::None);
            absorbed += -record.actual_mw * dt;
            losses += record.loss_mwh;
        }
        assert_abs_diff_eq!(absorbed, rate * 2.0, epsilon = 1e-12);

        let mut delivered = 0.0;
        for _ in 0..100 {
            let record = battery.step(1.0, dt);
            delivered += record.actual_mw * dt;
            losses += record.loss_mwh;
            if record.limited_by == LimitedBy::SocLimit {
                break;
            }
        }

        let residual = battery.state().stored_energy_mwh - soc_min * battery.config().capacity_mwh;
        assert!(delivered <= absorbed, "{technology}");
        assert_abs_diff_eq!(absorbed - delivered, losses + residual, epsilon = 1e-9);
        assert_abs_diff_eq!(
            delivered / absorbed,
            battery.config().round_trip_efficiency,
            epsilon = 1e-9
        );
    }
}

#[test]
fn cycle_count_never_decreases() {
    let mut battery = BatteryModel::with_rating(1.0, 1.0).expect("valid rating");
    let mut last = 0.0;
    for t in 0..200 {
        let request = ((t as f64) * 0.7).sin() * 1.5;
        battery.step(request, 0.25);
        let cycles = battery.state().equivalent_full_cycles;
        assert!(cycles >= last);
        last = cycles;
    }
    assert!(last > 0.0);
}

#[test]
fn derated_topologies_lose_more() {
    let mut deliveries = Vec::new();
    for topology in Topology::ALL {
        let mut battery = common::battery(BatteryOptions {
            topology,
            ..common::default_options()
        });
        battery.step(-0.5, 1.0);
        deliveries.push(battery.state().stored_energy_mwh);
    }
    // parallel_ac > hybrid > series_dc
    assert!(deliveries[0] > deliveries[2]);
    assert!(deliveries[2] > deliveries[1]);
}
