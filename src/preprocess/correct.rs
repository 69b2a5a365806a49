//! Accidental-coincidence correction.
//!
//! For uncorrelated detectors the expected number of accidental coincidences in
//! an interval of length `T` with window `τ` is:
//!
//! ```text
//! N_acc = NT · NR · τ / T
//! ```
//!
//! and the true-coincidence estimate is `N_true = max(0, NTR - N_acc)`.
//!
//! Clamping at 0 trades a small upward bias (in intervals where fluctuations
//! push `NTR` below `N_acc`) for non-negative counts. This is intentional.

use crate::domain::{CorrectedRecord, CorrectedRow, IntervalRow, PositionRecord};

/// Expected accidental coincidences for one interval.
pub fn accidental_estimate(row: &IntervalRow, window_s: f64, measurement_time_s: f64) -> f64 {
    row.singles_t * row.singles_r * window_s / measurement_time_s
}

/// Compute the corrected series for a position.
pub fn correct(record: &PositionRecord) -> CorrectedRecord {
    let window_s = record.window_ns * 1e-9;
    let rows = record
        .rows
        .iter()
        .map(|row| {
            let accidental = accidental_estimate(row, window_s, record.measurement_time_s);
            CorrectedRow {
                raw: *row,
                accidental,
                true_coincidences: (row.coincidences_tr - accidental).max(0.0),
            }
        })
        .collect();

    CorrectedRecord {
        x_mm: record.x_mm,
        rows,
        measurement_time_s: record.measurement_time_s,
        window_ns: record.window_ns,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn record(rows: Vec<IntervalRow>) -> PositionRecord {
        PositionRecord {
            x_mm: 1.0,
            rows,
            measurement_time_s: 0.5,
            window_ns: 25.0,
            folder: PathBuf::from("1.0"),
        }
    }

    fn row(nt: f64, nr: f64, ntr: f64) -> IntervalRow {
        IntervalRow {
            singles_t: nt,
            singles_r: nr,
            coincidences_tr: ntr,
            g2: 1.0,
        }
    }

    #[test]
    fn accidental_formula() {
        // 1e5 * 2e5 * 25e-9 / 0.5 = 1000
        let c = correct(&record(vec![row(1e5, 2e5, 1500.0)]));
        assert!((c.rows[0].accidental - 1000.0).abs() < 1e-9);
        assert!((c.rows[0].true_coincidences - 500.0).abs() < 1e-9);
    }

    #[test]
    fn true_coincidences_never_negative() {
        let rows = (0..50)
            .map(|i| row(1e5 + 1e3 * i as f64, 2e5, (i % 7) as f64 * 300.0))
            .collect();
        let c = correct(&record(rows));
        assert!(c.rows.iter().all(|r| r.true_coincidences >= 0.0));
        assert!(c.rows.iter().any(|r| r.true_coincidences == 0.0));
    }

    #[test]
    fn correction_is_repeatable_and_leaves_input_untouched() {
        let rec = record(vec![row(1e5, 2e5, 1500.0), row(9e4, 1.8e5, 600.0)]);
        let before = rec.clone();
        let first = correct(&rec);
        let second = correct(&rec);
        assert_eq!(first, second);
        assert_eq!(rec, before);
    }
}
