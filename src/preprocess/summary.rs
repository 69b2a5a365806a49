//! Per-position aggregate statistics.

use rayon::prelude::*;

use crate::domain::{CorrectedRecord, PositionRecord, PositionSummary, SeriesStats, SummaryTable};
use crate::preprocess::correct;

/// Summarize a corrected position.
///
/// `use_true` selects the accidental-corrected series for `counts`; `raw` and
/// `g2` are always computed.
pub fn summarize(record: &CorrectedRecord, use_true: bool) -> PositionSummary {
    let raw: Vec<f64> = record.rows.iter().map(|r| r.raw.coincidences_tr).collect();
    let g2: Vec<f64> = record.rows.iter().map(|r| r.raw.g2).collect();
    let accidental: Vec<f64> = record.rows.iter().map(|r| r.accidental).collect();

    let raw_stats = SeriesStats::from_values(&raw);
    let counts = if use_true {
        let truth: Vec<f64> = record.rows.iter().map(|r| r.true_coincidences).collect();
        SeriesStats::from_values(&truth)
    } else {
        raw_stats
    };

    PositionSummary {
        x_mm: record.x_mm,
        dt_s: record.measurement_time_s,
        window_ns: record.window_ns,
        counts,
        raw: raw_stats,
        g2: SeriesStats::from_values(&g2),
        accidental_mean: crate::math::mean(&accidental),
        n_intervals: record.rows.len(),
    }
}

/// Correct and summarize a raw record.
pub fn summarize_record(record: &PositionRecord, use_true: bool) -> PositionSummary {
    summarize(&correct(record), use_true)
}

/// Build the summary table, sorted ascending by `x_mm`.
pub fn build_summary(records: &[PositionRecord], use_true: bool) -> SummaryTable {
    let mut table: SummaryTable = records
        .par_iter()
        .map(|r| summarize_record(r, use_true))
        .collect();
    table.sort_by(|a, b| a.x_mm.total_cmp(&b.x_mm));
    table
}
