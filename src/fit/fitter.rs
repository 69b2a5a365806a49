//! Weighted, bounded nonlinear fit of the pattern model.
//!
//! Given the summary table we:
//! - estimate the center `x0` (first maximum of `N_mean`)
//! - select points per the region policy
//! - minimize `Σ ((N(x_i - x0; p) - N_mean_i) / σ_i)²` inside the parameter box
//!
//! `σ_i` are the per-position standard errors, treated as absolute
//! uncertainties: the covariance is `(JᵀJ)⁻¹` of the weighted residuals and is
//! not rescaled by the reduced chi².

use nalgebra::{DMatrix, DVector};

use crate::domain::{
    AnalysisOptions, FitRegion, FitResult, FittedParam, ModelVariant, ParamName, PositionSummary,
};
use crate::error::AppError;
use crate::fit::region::{estimate_center, fit_mask, guard_sigmas};
use crate::math::{LmError, LmOptions, minimize_bounded, normal_matrix_inverse};
use crate::models::{SlitGeometry, param_specs, predict};

/// Fitting options.
#[derive(Debug, Clone)]
pub struct FitOptions {
    pub variant: ModelVariant,
    pub region: FitRegion,
    /// Parameters held at a fixed value (excluded from the free set).
    pub fixed: Vec<(ParamName, f64)>,
    pub solver: LmOptions,
}

impl FitOptions {
    pub fn from_analysis(opts: &AnalysisOptions) -> Self {
        Self {
            variant: opts.variant,
            region: opts.fit_region,
            fixed: opts.fixed.clone(),
            solver: LmOptions {
                max_iterations: opts.max_iterations,
                ..LmOptions::default()
            },
        }
    }

    fn fixed_value(&self, name: ParamName) -> Option<f64> {
        // Last occurrence wins, so later CLI flags override earlier ones.
        self.fixed.iter().rev().find(|(n, _)| *n == name).map(|(_, v)| *v)
    }
}

/// Fit the selected model to the summary table.
pub fn fit_counts(
    summary: &[PositionSummary],
    geometry: &SlitGeometry,
    opts: &FitOptions,
) -> Result<FitResult, AppError> {
    let x0_mm = estimate_center(summary).ok_or_else(|| {
        AppError::DegenerateInput("no finite mean coincidence count to locate the center".into())
    })?;

    let x_mm: Vec<f64> = summary.iter().map(|s| s.x_mm).collect();
    let mask = fit_mask(&x_mm, x0_mm, opts.region);

    let mut x_rel = Vec::new();
    let mut y = Vec::new();
    let mut sigma_raw = Vec::new();
    for (s, _) in summary.iter().zip(&mask).filter(|(_, m)| **m) {
        x_rel.push(s.x_mm - x0_mm);
        y.push(s.counts.mean);
        sigma_raw.push(s.counts.sem);
    }
    if y.iter().any(|v| !v.is_finite()) {
        return Err(AppError::DegenerateInput(
            "non-finite mean coincidence count in the fit region".into(),
        ));
    }

    let specs = param_specs(opts.variant);
    let free: Vec<usize> = (0..specs.len())
        .filter(|&k| opts.fixed_value(specs[k].name).is_none())
        .collect();
    if y.len() < free.len() {
        return Err(AppError::UnderdeterminedFit {
            points: y.len(),
            params: free.len(),
        });
    }

    let sigma = guard_sigmas(&sigma_raw)?;

    // Full parameter vector in model order; free entries get overwritten by
    // the solver's proposals.
    let base: Vec<f64> = specs
        .iter()
        .map(|spec| {
            opts.fixed_value(spec.name)
                .unwrap_or_else(|| spec.guess.resolve(&y).clamp(spec.lower, spec.upper))
        })
        .collect();
    let p0: Vec<f64> = free.iter().map(|&k| base[k]).collect();
    let lower: Vec<f64> = free.iter().map(|&k| specs[k].lower).collect();
    let upper: Vec<f64> = free.iter().map(|&k| specs[k].upper).collect();

    let assemble = |free_values: &[f64]| {
        let mut full = base.clone();
        for (c, &k) in free.iter().enumerate() {
            full[k] = free_values[c];
        }
        full
    };

    let residuals = |free_values: &[f64]| {
        let full = assemble(free_values);
        DVector::from_iterator(
            y.len(),
            x_rel
                .iter()
                .zip(&y)
                .zip(&sigma)
                .map(|((&x, &yi), &si)| (predict(opts.variant, geometry, x, &full) - yi) / si),
        )
    };

    let solution = if free.is_empty() {
        None
    } else {
        Some(
            minimize_bounded(&residuals, &p0, &lower, &upper, &opts.solver)
                .map_err(convergence_error)?,
        )
    };

    let (values, chi2, iterations, covariance) = match &solution {
        Some(sol) => {
            let jtj = sol.jacobian.transpose() * &sol.jacobian;
            let covariance = normal_matrix_inverse(&jtj).unwrap_or_else(|| {
                log::warn!("Normal matrix could not be inverted; covariance set to infinity");
                DMatrix::from_element(free.len(), free.len(), f64::INFINITY)
            });
            (assemble(&sol.params), sol.cost, sol.iterations, covariance)
        }
        None => {
            let r = residuals(&p0);
            (base.clone(), r.norm_squared(), 0, DMatrix::zeros(0, 0))
        }
    };

    let params: Vec<FittedParam> = specs
        .iter()
        .enumerate()
        .map(|(k, spec)| {
            let column = free.iter().position(|&f| f == k);
            FittedParam {
                name: spec.name,
                value: values[k],
                stderr: column.map(|c| covariance[(c, c)].sqrt()),
                fixed: column.is_none(),
            }
        })
        .collect();

    let dof = y.len() - free.len();
    log::info!(
        "Fit ({}) converged in {iterations} iteration(s): chi2={chi2:.4} dof={dof} x0={x0_mm} mm",
        opts.variant.display_name()
    );

    Ok(FitResult {
        variant: opts.variant,
        region: opts.region,
        params,
        free_params: free.iter().map(|&k| specs[k].name).collect(),
        covariance,
        x0_mm,
        mask,
        chi2,
        dof,
        iterations,
    })
}

fn convergence_error(e: LmError) -> AppError {
    let iterations = match &e {
        LmError::IterationLimit { iterations, .. } => *iterations,
        _ => 0,
    };
    AppError::FitConvergence {
        iterations,
        message: e.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{PhysicalConstants, SeriesStats};

    fn summary(x_mm: f64, mean: f64, sem: f64) -> PositionSummary {
        PositionSummary {
            x_mm,
            dt_s: 1.0,
            window_ns: 10.0,
            counts: SeriesStats {
                mean,
                std: sem * 3.0,
                sem,
                total: mean * 9.0,
            },
            raw: SeriesStats::default(),
            g2: SeriesStats::default(),
            accidental_mean: 0.0,
            n_intervals: 9,
        }
    }

    fn geometry() -> SlitGeometry {
        SlitGeometry::from(&PhysicalConstants::default())
    }

    fn options(variant: ModelVariant, region: FitRegion) -> FitOptions {
        FitOptions {
            variant,
            region,
            fixed: Vec::new(),
            solver: LmOptions::default(),
        }
    }

    fn synthetic(variant: ModelVariant, truth: &[f64], x0: f64) -> Vec<PositionSummary> {
        let g = geometry();
        (0..41)
            .map(|i| {
                let x = -6.0 + 0.3 * i as f64 + x0;
                let y = predict(variant, &g, x - x0, truth);
                summary(x, y, 0.5 + 0.02 * y.abs().sqrt())
            })
            .collect()
    }

    #[test]
    fn recovers_basic_parameters() {
        // Center the synthetic pattern on a grid point with delta = 0, so the
        // peak really is at x0.
        let truth = [200.0, 0.8, 0.0];
        let table = synthetic(ModelVariant::Basic, &truth, 0.0);
        let fit = fit_counts(&table, &geometry(), &options(ModelVariant::Basic, FitRegion::Full)).unwrap();

        assert_eq!(fit.x0_mm, table[20].x_mm);
        assert!((fit.value(ParamName::N0).unwrap() - 200.0).abs() < 1e-3);
        assert!((fit.value(ParamName::V).unwrap() - 0.8).abs() < 1e-5);
        assert!(fit.value(ParamName::Delta).unwrap().abs() < 1e-4);
        assert!(fit.chi2 < 1e-6);
        assert_eq!(fit.dof, 41 - 3);
        assert_eq!(fit.covariance.nrows(), 3);
        assert!(fit.params.iter().all(|p| p.stderr.unwrap().is_finite()));
    }

    #[test]
    fn extended_fit_respects_bounds() {
        let truth = [150.0, 0.6, 0.0, 1.1, 4.0];
        let table = synthetic(ModelVariant::Extended, &truth, 0.0);
        let fit =
            fit_counts(&table, &geometry(), &options(ModelVariant::Extended, FitRegion::Full)).unwrap();

        for (p, spec) in fit.params.iter().zip(param_specs(ModelVariant::Extended)) {
            assert!(p.value >= spec.lower && p.value <= spec.upper, "{:?} out of bounds", p.name);
        }
        assert!((fit.value(ParamName::XScale).unwrap() - 1.1).abs() < 1e-3);
        assert!((fit.value(ParamName::NBg).unwrap() - 4.0).abs() < 1e-2);
    }

    #[test]
    fn mask_is_reported_for_region() {
        let truth = [200.0, 0.8, 0.0];
        let table = synthetic(ModelVariant::Basic, &truth, 0.0);
        let fit =
            fit_counts(&table, &geometry(), &options(ModelVariant::Basic, FitRegion::UpToCenter)).unwrap();
        assert_eq!(fit.mask.len(), table.len());
        assert_eq!(fit.points_used(), 21);
        assert!(fit.mask[..21].iter().all(|m| *m));
        assert!(fit.mask[21..].iter().all(|m| !*m));
    }

    #[test]
    fn too_few_points_is_underdetermined() {
        let table = vec![summary(0.0, 10.0, 1.0), summary(1.0, 4.0, 0.5)];
        let err = fit_counts(&table, &geometry(), &options(ModelVariant::Basic, FitRegion::Full))
            .unwrap_err();
        assert!(matches!(err, AppError::UnderdeterminedFit { points: 2, params: 3 }));
    }

    #[test]
    fn all_zero_errors_are_degenerate() {
        let table = vec![
            summary(0.0, 10.0, 0.0),
            summary(1.0, 4.0, 0.0),
            summary(2.0, 3.0, 0.0),
        ];
        let err = fit_counts(&table, &geometry(), &options(ModelVariant::Basic, FitRegion::Full))
            .unwrap_err();
        assert!(matches!(err, AppError::DegenerateInput(_)));
    }

    #[test]
    fn empty_table_is_degenerate() {
        let err = fit_counts(&[], &geometry(), &options(ModelVariant::Basic, FitRegion::Full))
            .unwrap_err();
        assert!(matches!(err, AppError::DegenerateInput(_)));
    }

    #[test]
    fn iteration_cap_is_a_convergence_error() {
        let truth = [200.0, 0.8, 0.0];
        let table = synthetic(ModelVariant::Basic, &truth, 0.0);
        let mut opts = options(ModelVariant::Basic, FitRegion::Full);
        opts.solver.max_iterations = 1;

        let err = fit_counts(&table, &geometry(), &opts).unwrap_err();
        assert!(matches!(err, AppError::FitConvergence { iterations: 1, .. }), "{err}");
        assert!(err.is_fit_error());
        assert_eq!(err.exit_code(), 4);
    }

    #[test]
    fn analysis_options_set_the_iteration_cap() {
        let analysis = AnalysisOptions {
            max_iterations: 17,
            ..AnalysisOptions::default()
        };
        assert_eq!(FitOptions::from_analysis(&analysis).solver.max_iterations, 17);
    }

    #[test]
    fn fixed_parameters_do_not_move() {
        let truth = [200.0, 0.8, 0.0];
        let table = synthetic(ModelVariant::Basic, &truth, 0.0);
        let mut opts = options(ModelVariant::Basic, FitRegion::Full);
        opts.fixed.push((ParamName::V, 0.8));

        let fit = fit_counts(&table, &geometry(), &opts).unwrap();
        let v = fit.params.iter().find(|p| p.name == ParamName::V).unwrap();
        assert_eq!(v.value, 0.8);
        assert!(v.fixed);
        assert!(v.stderr.is_none());
        assert_eq!(fit.free_params, vec![ParamName::N0, ParamName::Delta]);
        assert_eq!(fit.covariance.nrows(), 2);
    }
}
