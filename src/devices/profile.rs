//! Synthetic generation profiles.
//!
//! Real profiles come from an external data-access layer; these are for
//! presets, tests and Monte Carlo perturbation.

use rand::{Rng, SeedableRng, rngs::StdRng};
use serde::{Deserialize, Serialize};

/// Half-sine solar PV generation profile with multiplicative Gaussian noise.
///
/// Generation is positive (plant convention) and zero outside daylight hours.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SolarProfile {
    /// Peak generation under clear sky (MW).
    pub peak_mw: f64,
    /// Steps per simulated day (must be > 0).
    pub steps_per_day: usize,
    /// Number of simulated days.
    pub days: usize,
    /// Hour of sunrise (inclusive).
    pub sunrise_hour: f64,
    /// Hour of sunset (exclusive).
    pub sunset_hour: f64,
    /// Standard deviation of the noise as a fraction of output.
    pub noise_std: f64,
    /// Random seed for reproducible noise.
    pub seed: u64,
}

impl Default for SolarProfile {
    fn default() -> Self {
        Self {
            peak_mw: 1.5,
            steps_per_day: 24,
            days: 1,
            sunrise_hour: 6.0,
            sunset_hour: 18.0,
            noise_std: 0.05,
            seed: 42,
        }
    }
}

impl SolarProfile {
    /// Step duration implied by `steps_per_day` (hours).
    pub fn dt_hours(&self) -> f64 {
        24.0 / self.steps_per_day.max(1) as f64
    }

    /// Clear-sky fraction of peak output at `hour` of day, in [0, 1].
    pub fn daylight_frac(&self, hour: f64) -> f64 {
        if hour < self.sunrise_hour || hour >= self.sunset_hour {
            return 0.0;
        }
        let span = self.sunset_hour - self.sunrise_hour;
        (std::f64::consts::PI * (hour - self.sunrise_hour) / span)
            .sin()
            .max(0.0)
    }

    /// Generates the full profile, one value per step.
    pub fn generate(&self) -> Vec<f64> {
        let mut rng = StdRng::seed_from_u64(self.seed);
        let dt = self.dt_hours();
        let total = self.steps_per_day * self.days;
        let peak = self.peak_mw.max(0.0);

        (0..total)
            .map(|t| {
                let hour = (t % self.steps_per_day.max(1)) as f64 * dt;
                let frac = self.daylight_frac(hour);
                if frac <= 0.0 {
                    return 0.0;
                }
                let noise_mult = 1.0 + gaussian_noise(&mut rng, self.noise_std);
                (peak * frac * noise_mult).max(0.0)
            })
            .collect()
    }
}

/// Gaussian noise with mean 0 and the given standard deviation (Box-Muller).
pub fn gaussian_noise(rng: &mut impl Rng, std_dev: f64) -> f64 {
    if std_dev <= 0.0 {
        return 0.0;
    }

    let u1: f64 = rng.random::<f64>().clamp(1e-12, 1.0);
    let u2: f64 = rng.random::<f64>();
    let z0 = (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos();
    z0 * std_dev
}

/// Returns a copy of `profile` with multiplicative noise, clipped at zero.
pub fn perturb(profile: &[f64], noise_std: f64, rng: &mut impl Rng) -> Vec<f64> {
    profile
        .iter()
        .map(|&v| (v * (1.0 + gaussian_noise(&mut *rng, noise_std))).max(0.0))
        .collect()
}
