//! Vectorised Monte Carlo rollouts over many independent paths.
//!
//! Rollouts use the pure transition only, so the battery is borrowed shared
//! and path blocks can be evaluated on separate threads.

use std::panic;
use std::thread::{self, ScopedJoinHandle};

use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis, ErrorKind, ShapeError, concatenate, s};
use rand::{SeedableRng, rngs::StdRng};
use tracing::debug;

use crate::devices::profile::perturb;
use crate::devices::{BatteryModel, Precision};

/// Trajectories of a batch rollout.
#[derive(Debug, Clone, PartialEq)]
pub struct RolloutResult {
    /// SOC per path, including the initial column (`paths x (horizon + 1)`).
    pub soc: Array2<f64>,
    /// Battery terminal power per path and step (`paths x horizon`).
    pub power_mw: Array2<f64>,
    /// Total conversion loss per path (MWh).
    pub loss_mwh: Array1<f64>,
}

impl RolloutResult {
    pub fn paths(&self) -> usize {
        self.power_mw.nrows()
    }

    pub fn horizon(&self) -> usize {
        self.power_mw.ncols()
    }
}

/// `paths` noisy copies of `base`, one per row, reproducible from `seed`.
pub fn perturbed_profiles(base: &[f64], noise_std: f64, paths: usize, seed: u64) -> Array2<f64> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut out = Array2::zeros((paths, base.len()));
    for mut row in out.rows_mut() {
        let noisy = perturb(base, noise_std, &mut rng);
        row.assign(&ArrayView1::from(noisy.as_slice()));
    }
    out
}

/// Requests that keep combined output of each path at or below `ceiling_mw`.
///
/// Charges on the excess above the ceiling and discharges into the shortfall,
/// the same rule the capacity-shaving policy applies one step at a time.
pub fn shaving_requests(profiles: ArrayView2<'_, f64>, ceiling_mw: f64) -> Array2<f64> {
    profiles.mapv(|g| ceiling_mw - g)
}

/// Rolls every path of `requests` forward from `initial_soc`.
///
/// # Arguments
///
/// * `battery` - Supplies the configuration; its own state is not touched
/// * `initial_soc` - Starting SOC per path
/// * `requests` - Power request per path and step (`paths x horizon`)
/// * `dt_hours` - Step duration in hours
/// * `precision` - Output precision of each transition
///
/// # Errors
///
/// Returns a `ShapeError` if `initial_soc` and `requests` disagree on the
/// number of paths.
pub fn rollout(
    battery: &BatteryModel,
    initial_soc: ArrayView1<'_, f64>,
    requests: ArrayView2<'_, f64>,
    dt_hours: f64,
    precision: Precision,
) -> Result<RolloutResult, ShapeError> {
    let (paths, horizon) = requests.dim();
    if initial_soc.len() != paths {
        return Err(ShapeError::from_kind(ErrorKind::IncompatibleShape));
    }

    let mut soc = Array2::zeros((paths, horizon + 1));
    let mut power_mw = Array2::zeros((paths, horizon));
    let mut loss_mwh = Array1::zeros(paths);
    soc.column_mut(0).assign(&initial_soc);

    for t in 0..horizon {
        let next = battery.next_state_array(
            soc.column(t),
            requests.column(t),
            dt_hours,
            precision,
        )?;
        soc.column_mut(t + 1).assign(&next.soc);
        power_mw.column_mut(t).assign(&next.power_mw);
        loss_mwh += &next.loss_mwh;
    }

    Ok(RolloutResult {
        soc,
        power_mw,
        loss_mwh,
    })
}

/// [`rollout`] with the paths split into contiguous blocks on scoped threads.
///
/// Produces the same result as the sequential rollout for any thread count.
///
/// # Errors
///
/// Same as [`rollout`].
pub fn rollout_parallel(
    battery: &BatteryModel,
    initial_soc: ArrayView1<'_, f64>,
    requests: ArrayView2<'_, f64>,
    dt_hours: f64,
    precision: Precision,
    threads: usize,
) -> Result<RolloutResult, ShapeError> {
    let paths = requests.nrows();
    if initial_soc.len() != paths {
        return Err(ShapeError::from_kind(ErrorKind::IncompatibleShape));
    }
    let threads = threads.clamp(1, paths.max(1));
    if threads == 1 {
        return rollout(battery, initial_soc, requests, dt_hours, precision);
    }

    let block = paths.div_ceil(threads);
    debug!(paths, threads, block, "parallel rollout");

    let parts = thread::scope(|scope| {
        let handles: Vec<_> = (0..paths)
            .step_by(block)
            .map(|start| {
                let end = (start + block).min(paths);
                let soc = initial_soc.slice(s![start..end]);
                let req = requests.slice(s![start..end, ..]);
                scope.spawn(move || rollout(battery, soc, req, dt_hours, precision))
            })
            .collect();
        handles
            .into_iter()
            .map(join_worker)
            .collect::<Result<Vec<_>, _>>()
    })?;

    let soc_views: Vec<_> = parts.iter().map(|p| p.soc.view()).collect();
    let power_views: Vec<_> = parts.iter().map(|p| p.power_mw.view()).collect();
    let loss_views: Vec<_> = parts.iter().map(|p| p.loss_mwh.view()).collect();

    Ok(RolloutResult {
        soc: concatenate(Axis(0), &soc_views)?,
        power_mw: concatenate(Axis(0), &power_views)?,
        loss_mwh: concatenate(Axis(0), &loss_views)?,
    })
}

/// Waits for a worker, re-raising its panic on the calling thread.
fn join_worker<T>(handle: ScopedJoinHandle<'_, T>) -> T {
    handle.join().unwrap_or_else(|payload| panic::resume_unwind(payload))
}
