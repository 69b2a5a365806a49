//! Read/write fit JSON files.
//!
//! Fit JSON is the "portable" representation of a fit:
//! - model variant, region and physical constants
//! - parameters, covariance and inclusion mask
//! - a precomputed model curve for quick plotting
//!
//! The schema is defined by `domain::FitFile`.

use std::fs::File;
use std::path::Path;

use crate::domain::{FitCurve, FitFile, FitResult, PhysicalConstants, PositionSummary};
use crate::error::AppError;
use crate::models::{SlitGeometry, predict_many};

/// Number of curve samples written to the JSON file.
const CURVE_POINTS: usize = 401;

/// Build the portable representation of a fit.
pub fn fit_file(fit: &FitResult, summary: &[PositionSummary], physics: &PhysicalConstants) -> FitFile {
    let covariance = (0..fit.covariance.nrows())
        .map(|i| fit.covariance.row(i).iter().copied().collect())
        .collect();

    FitFile {
        tool: "dslit".to_string(),
        variant: fit.variant,
        region: fit.region,
        physics: *physics,
        x0_mm: fit.x0_mm,
        params: fit.params.clone(),
        free_params: fit.free_params.clone(),
        covariance,
        mask: fit.mask.clone(),
        chi2: fit.chi2,
        dof: fit.dof,
        curve: build_curve(fit, summary, physics, CURVE_POINTS),
    }
}

/// Write a fit JSON file.
pub fn write_fit_json(
    path: &Path,
    fit: &FitResult,
    summary: &[PositionSummary],
    physics: &PhysicalConstants,
) -> Result<(), AppError> {
    let file = File::create(path).map_err(|e| AppError::io(path, e))?;
    serde_json::to_writer_pretty(file, &fit_file(fit, summary, physics))
        .map_err(|e| AppError::Export(format!("Failed to write fit JSON: {e}")))?;
    log::info!("Wrote fit result to {}", path.display());
    Ok(())
}

/// Read a fit JSON file.
pub fn read_fit_json(path: &Path) -> Result<FitFile, AppError> {
    let file = File::open(path).map_err(|e| AppError::io(path, e))?;
    serde_json::from_reader(file)
        .map_err(|e| AppError::Configuration(format!("Invalid fit JSON '{}': {e}", path.display())))
}

fn build_curve(
    fit: &FitResult,
    summary: &[PositionSummary],
    physics: &PhysicalConstants,
    n: usize,
) -> FitCurve {
    let n = n.max(2);
    let (mut x_lo, mut x_hi) = summary
        .iter()
        .map(|s| s.x_mm)
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), x| (lo.min(x), hi.max(x)));
    if !(x_lo.is_finite() && x_hi.is_finite()) || x_hi <= x_lo {
        x_lo = fit.x0_mm - 1.0;
        x_hi = fit.x0_mm + 1.0;
    }

    let x_mm: Vec<f64> = (0..n)
        .map(|i| x_lo + (x_hi - x_lo) * i as f64 / (n as f64 - 1.0))
        .collect();
    let x_rel: Vec<f64> = x_mm.iter().map(|x| x - fit.x0_mm).collect();
    let geometry = SlitGeometry::from(physics);
    let values = fit.values();

    FitCurve {
        n: predict_many(fit.variant, &geometry, &x_rel, &values),
        x_mm,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{FitRegion, FittedParam, ModelVariant, ParamName, SeriesStats};
    use nalgebra::DMatrix;

    fn fit() -> FitResult {
        FitResult {
            variant: ModelVariant::Basic,
            region: FitRegion::Full,
            params: vec![
                FittedParam { name: ParamName::N0, value: 20.0, stderr: Some(1.0), fixed: false },
                FittedParam { name: ParamName::V, value: 0.5, stderr: Some(0.1), fixed: false },
                FittedParam { name: ParamName::Delta, value: 0.0, stderr: None, fixed: true },
            ],
            free_params: vec![ParamName::N0, ParamName::V],
            covariance: DMatrix::from_row_slice(2, 2, &[1.0, 0.02, 0.02, 0.01]),
            x0_mm: 1.0,
            mask: vec![true, true],
            chi2: 0.0,
            dof: 0,
            iterations: 3,
        }
    }

    fn summary(x_mm: f64) -> PositionSummary {
        PositionSummary {
            x_mm,
            dt_s: 1.0,
            window_ns: 10.0,
            counts: SeriesStats::default(),
            raw: SeriesStats::default(),
            g2: SeriesStats::default(),
            accidental_mean: 0.0,
            n_intervals: 1,
        }
    }

    #[test]
    fn written_file_reads_back() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("fit.json");
        let physics = PhysicalConstants::default();
        write_fit_json(&path, &fit(), &[summary(0.0), summary(2.0)], &physics).unwrap();

        let file = read_fit_json(&path).unwrap();
        assert_eq!(file.variant, ModelVariant::Basic);
        assert_eq!(file.covariance, vec![vec![1.0, 0.02], vec![0.02, 0.01]]);
        assert_eq!(file.curve.x_mm.len(), CURVE_POINTS);
        assert_eq!(file.curve.x_mm[0], 0.0);
        assert_eq!(*file.curve.x_mm.last().unwrap(), 2.0);
        // Peak of the curve sits at x0 with value N0 * (1 + V) / 2.
        let mid = CURVE_POINTS / 2;
        assert!((file.curve.n[mid] - 15.0).abs() < 1e-9);
    }
}
