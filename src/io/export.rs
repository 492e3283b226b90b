//! CSV export for strategy run results.

use std::fs::File;
use std::io::{self, Write};
use std::path::Path;

use crate::sim::StrategyResult;

/// Column header for CSV telemetry export.
const HEADER: &str = "timestep,time_hr,generation_mw,grid_mw,battery_mw,\
                      soc,curtailed_mw,loss_mwh,limited_by";

/// Exports a run to a CSV file at the given path.
///
/// Writes a header row followed by one data row per step. Produces
/// deterministic output for identical inputs.
///
/// # Arguments
///
/// * `result` - Completed strategy run
/// * `path` - Output file path
///
/// # Errors
///
/// Returns an `io::Error` if file creation or writing fails.
pub fn export_csv(result: &StrategyResult, path: &Path) -> io::Result<()> {
    let file = File::create(path)?;
    let buf = io::BufWriter::new(file);
    write_csv(result, buf)
}

/// Writes a run as CSV to any writer.
///
/// # Errors
///
/// Returns an `io::Error` if writing fails.
pub fn write_csv(result: &StrategyResult, writer: impl Write) -> io::Result<()> {
    let mut wtr = csv::WriterBuilder::new().from_writer(writer);

    wtr.write_record(HEADER.split(',').map(str::trim))?;

    for t in 0..result.len() {
        wtr.write_record(&[
            t.to_string(),
            format!("{:.2}", result.time_hr(t)),
            format!("{:.6}", result.generation_mw[t]),
            format!("{:.6}", result.grid_mw[t]),
            format!("{:.6}", result.battery_mw[t]),
            format!("{:.6}", result.soc[t]),
            format!("{:.6}", result.curtailed_mw[t]),
            format!("{:.6}", result.loss_mwh[t]),
            result.limited_by[t].to_string(),
        ])?;
    }

    wtr.flush()?;
    Ok(())
}
