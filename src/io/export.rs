//! Export the summary table to CSV.
//!
//! The export is meant to be easy to consume in spreadsheets or plotting
//! scripts. Column names follow the analysis convention (`N_mean`, `g2_sem`, ...).

use std::fs::File;
use std::path::Path;

use serde::Serialize;

use crate::domain::PositionSummary;
use crate::error::AppError;

#[derive(Debug, Serialize)]
struct SummaryRow {
    x_mm: f64,
    dt_s: f64,
    window_ns: f64,
    #[serde(rename = "N_mean")]
    n_mean: f64,
    #[serde(rename = "N_std")]
    n_std: f64,
    #[serde(rename = "N_sem")]
    n_sem: f64,
    #[serde(rename = "N_total")]
    n_total: f64,
    #[serde(rename = "N_mean_raw")]
    n_mean_raw: f64,
    #[serde(rename = "N_total_raw")]
    n_total_raw: f64,
    g2_mean: f64,
    g2_std: f64,
    g2_sem: f64,
    n_intervals: usize,
    #[serde(rename = "N_acc_mean")]
    n_acc_mean: f64,
}

impl From<&PositionSummary> for SummaryRow {
    fn from(s: &PositionSummary) -> Self {
        Self {
            x_mm: s.x_mm,
            dt_s: s.dt_s,
            window_ns: s.window_ns,
            n_mean: s.counts.mean,
            n_std: s.counts.std,
            n_sem: s.counts.sem,
            n_total: s.counts.total,
            n_mean_raw: s.raw.mean,
            n_total_raw: s.raw.total,
            g2_mean: s.g2.mean,
            g2_std: s.g2.std,
            g2_sem: s.g2.sem,
            n_intervals: s.n_intervals,
            n_acc_mean: s.accidental_mean,
        }
    }
}

/// Write the summary table to a CSV file (one row per position).
pub fn write_summary_csv(path: &Path, summary: &[PositionSummary]) -> Result<(), AppError> {
    let file = File::create(path).map_err(|e| AppError::io(path, e))?;
    let mut writer = csv::Writer::from_writer(file);

    for s in summary {
        writer
            .serialize(SummaryRow::from(s))
            .map_err(|e| AppError::Export(format!("Failed to write summary row: {e}")))?;
    }
    writer
        .flush()
        .map_err(|e| AppError::io(path, e))?;

    log::info!("Wrote summary table to {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::SeriesStats;

    #[test]
    fn summary_csv_has_expected_header() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("summary.csv");
        let s = PositionSummary {
            x_mm: 1.5,
            dt_s: 0.5,
            window_ns: 25.0,
            counts: SeriesStats { mean: 10.0, std: 2.0, sem: 1.0, total: 40.0 },
            raw: SeriesStats { mean: 11.0, std: 2.0, sem: 1.0, total: 44.0 },
            g2: SeriesStats { mean: 1.8, std: 0.2, sem: 0.1, total: 7.2 },
            accidental_mean: 1.0,
            n_intervals: 4,
        };
        write_summary_csv(&path, &[s]).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let mut lines = text.lines();
        assert_eq!(
            lines.next().unwrap(),
            "x_mm,dt_s,window_ns,N_mean,N_std,N_sem,N_total,N_mean_raw,N_total_raw,g2_mean,g2_std,g2_sem,n_intervals,N_acc_mean"
        );
        assert!(lines.next().unwrap().starts_with("1.5,0.5,25.0,10.0,"));
    }
}
