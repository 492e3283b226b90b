//! Post-hoc summary metrics computed from a run's time series.

use std::fmt;

use serde::Serialize;

/// Aggregate indicators derived from a complete strategy run.
///
/// Computed from the output arrays so the reported numbers always agree with
/// the time series they summarize.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StrategyMetrics {
    /// Total generation over the horizon (MWh).
    pub total_generation_mwh: f64,
    /// Total energy delivered to the grid (MWh, net of imports).
    pub total_delivered_mwh: f64,
    /// Energy absorbed by the battery at its terminals (MWh).
    pub total_charged_mwh: f64,
    /// Energy delivered by the battery at its terminals (MWh).
    pub total_discharged_mwh: f64,
    /// Conversion losses (MWh).
    pub total_losses_mwh: f64,
    /// Curtailed generation (MWh).
    pub total_curtailed_mwh: f64,
    /// Fraction of the charged energy recovered at the terminals. `None` if
    /// the battery never charged.
    ///
    /// The net change of stored energy over the run is valued at what it
    /// would deliver if discharged, so a run that drains its starting
    /// energy does not count that energy as recovered.
    pub realized_round_trip_efficiency: Option<f64>,
    /// Equivalent full cycles accumulated during the run.
    pub equivalent_full_cycles: f64,
    /// Highest grid output (MW).
    pub peak_grid_mw: f64,
}

/// Borrowed time series the metrics are computed from.
pub struct SeriesRef<'a> {
    pub generation_mw: &'a [f64],
    pub grid_mw: &'a [f64],
    pub battery_mw: &'a [f64],
    pub curtailed_mw: &'a [f64],
    pub loss_mwh: &'a [f64],
}

/// Battery-side totals of a run that are not visible in its power series.
#[derive(Debug, Clone, Copy, Default)]
pub struct StorageChange {
    /// Final minus initial stored energy (MWh).
    pub stored_delta_mwh: f64,
    /// Efficiency of a single charge or discharge conversion.
    pub one_way_efficiency: f64,
    /// Cycles accumulated by the battery during the run.
    pub equivalent_full_cycles: f64,
}

impl StrategyMetrics {
    /// Computes all metrics from the run's time series.
    ///
    /// # Arguments
    ///
    /// * `series` - Output arrays of the run
    /// * `dt_hours` - Step duration in hours
    /// * `storage` - Stored energy change, efficiency and cycles of the battery
    pub fn from_series(series: &SeriesRef<'_>, dt_hours: f64, storage: &StorageChange) -> Self {
        if series.generation_mw.is_empty() {
            return Self::default();
        }

        let energy = |values: &[f64]| values.iter().sum::<f64>() * dt_hours;
        let charged = series.battery_mw.iter().map(|p| (-p).max(0.0)).sum::<f64>() * dt_hours;
        let discharged = series.battery_mw.iter().map(|p| p.max(0.0)).sum::<f64>() * dt_hours;
        let recovered = discharged + storage.stored_delta_mwh * storage.one_way_efficiency;

        Self {
            total_generation_mwh: energy(series.generation_mw),
            total_delivered_mwh: energy(series.grid_mw),
            total_charged_mwh: charged,
            total_discharged_mwh: discharged,
            total_losses_mwh: series.loss_mwh.iter().sum(),
            total_curtailed_mwh: energy(series.curtailed_mw),
            realized_round_trip_efficiency: (charged > 0.0)
                .then(|| (recovered / charged).clamp(0.0, 1.0)),
            equivalent_full_cycles: storage.equivalent_full_cycles,
            peak_grid_mw: series
                .grid_mw
                .iter()
                .copied()
                .fold(f64::NEG_INFINITY, f64::max),
        }
    }
}

impl fmt::Display for StrategyMetrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "--- Strategy Metrics ---")?;
        writeln!(f, "Generation:            {:.3} MWh", self.total_generation_mwh)?;
        writeln!(f, "Delivered to grid:     {:.3} MWh", self.total_delivered_mwh)?;
        writeln!(f, "Peak grid output:      {:.3} MW", self.peak_grid_mw)?;
        writeln!(
            f,
            "Battery charged:       {:.3} MWh (discharged {:.3} MWh)",
            self.total_charged_mwh, self.total_discharged_mwh
        )?;
        match self.realized_round_trip_efficiency {
            Some(rte) => writeln!(f, "Realized round trip:   {:.1}%", rte * 100.0)?,
            None => writeln!(f, "Realized round trip:   n/a")?,
        }
        writeln!(f, "Equivalent cycles:     {:.3}", self.equivalent_full_cycles)?;
        writeln!(f, "Losses:                {:.3} MWh", self.total_losses_mwh)?;
        write!(f, "Curtailed:             {:.3} MWh", self.total_curtailed_mwh)
    }
}
