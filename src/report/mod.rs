//! Reporting utilities: per-position residuals and formatted terminal output.

pub mod format;

pub use format::*;

use crate::domain::{FitResult, PhysicalConstants, PositionSummary};
use crate::error::AppError;
use crate::models::{SlitGeometry, predict};

/// Observed vs fitted count at one position.
#[derive(Debug, Clone, PartialEq)]
pub struct PositionResidual {
    pub x_mm: f64,
    pub observed: f64,
    pub fitted: f64,
    pub residual: f64,
    /// Residual in units of the standard error; `None` when the error is zero.
    pub pull: Option<f64>,
    /// Whether the position was inside the fit region.
    pub used: bool,
}

/// Compute fitted values and residuals for each position of the table.
pub fn compute_residuals(
    summary: &[PositionSummary],
    fit: &FitResult,
    physics: &PhysicalConstants,
) -> Result<Vec<PositionResidual>, AppError> {
    let geometry = SlitGeometry::from(physics);
    let values = fit.values();
    let mut out = Vec::with_capacity(summary.len());
    for (i, s) in summary.iter().enumerate() {
        let fitted = predict(fit.variant, &geometry, s.x_mm - fit.x0_mm, &values);
        if !fitted.is_finite() {
            return Err(AppError::DegenerateInput(format!(
                "non-finite model prediction at x = {} mm",
                s.x_mm
            )));
        }
        let residual = s.counts.mean - fitted;
        out.push(PositionResidual {
            x_mm: s.x_mm,
            observed: s.counts.mean,
            fitted,
            residual,
            pull: (s.counts.sem > 0.0).then(|| residual / s.counts.sem),
            used: fit.mask.get(i).copied().unwrap_or(false),
        });
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{FitRegion, FittedParam, ModelVariant, ParamName, SeriesStats};
    use nalgebra::DMatrix;

    fn summary(x_mm: f64, mean: f64, sem: f64) -> PositionSummary {
        PositionSummary {
            x_mm,
            dt_s: 1.0,
            window_ns: 10.0,
            counts: SeriesStats { mean, std: sem, sem, total: mean },
            raw: SeriesStats::default(),
            g2: SeriesStats::default(),
            accidental_mean: 0.0,
            n_intervals: 1,
        }
    }

    #[test]
    fn residuals_at_center_and_pulls() {
        let fit = FitResult {
            variant: ModelVariant::Basic,
            region: FitRegion::UpToCenter,
            params: vec![
                FittedParam { name: ParamName::N0, value: 20.0, stderr: Some(1.0), fixed: false },
                FittedParam { name: ParamName::V, value: 1.0, stderr: Some(0.1), fixed: false },
                FittedParam { name: ParamName::Delta, value: 0.0, stderr: Some(0.1), fixed: false },
            ],
            free_params: vec![ParamName::N0, ParamName::V, ParamName::Delta],
            covariance: DMatrix::identity(3, 3),
            x0_mm: 2.0,
            mask: vec![false, true],
            chi2: 0.0,
            dof: 0,
            iterations: 1,
        };
        let table = [summary(3.0, 5.0, 0.0), summary(2.0, 22.0, 0.5)];
        let rows = compute_residuals(&table, &fit, &PhysicalConstants::default()).unwrap();

        // At x0 the model equals N0 (1 + V) / 2.
        assert!((rows[1].fitted - 20.0).abs() < 1e-12);
        assert!((rows[1].residual - 2.0).abs() < 1e-12);
        assert_eq!(rows[1].pull, Some(4.0));
        assert!(rows[1].used);
        assert_eq!(rows[0].pull, None);
        assert!(!rows[0].used);
    }
}
