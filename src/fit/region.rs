//! Center estimation, region masks and the zero-weight guard.

use crate::domain::{FitRegion, PositionSummary};
use crate::error::AppError;

/// Position of the first maximum of `N_mean`.
///
/// Non-finite means are ignored. Returns `None` if no finite mean exists.
pub fn estimate_center(summary: &[PositionSummary]) -> Option<f64> {
    let mut best: Option<(f64, f64)> = None;
    for s in summary {
        let y = s.counts.mean;
        if !y.is_finite() {
            continue;
        }
        match best {
            Some((_, y_best)) if y <= y_best => {}
            _ => best = Some((s.x_mm, y)),
        }
    }
    best.map(|(x, _)| x)
}

/// Inclusion mask for each position, relative to the center `x0_mm`.
pub fn fit_mask(x_mm: &[f64], x0_mm: f64, region: FitRegion) -> Vec<bool> {
    match region {
        FitRegion::Full => vec![true; x_mm.len()],
        FitRegion::UpToCenter => x_mm.iter().map(|&x| x <= x0_mm).collect(),
        FitRegion::AroundCenter => {
            let w = FitRegion::AROUND_CENTER_HALF_WIDTH_MM;
            x_mm.iter()
                .map(|&x| x >= x0_mm - w && x <= x0_mm + w)
                .collect()
        }
    }
}

/// Replace zero standard errors by the smallest nonzero one.
///
/// A zero error would give that point infinite weight. If every error is zero
/// there is no scale to borrow and the fit cannot be weighted.
pub fn guard_sigmas(sigma: &[f64]) -> Result<Vec<f64>, AppError> {
    let floor = sigma
        .iter()
        .copied()
        .filter(|s| s.is_finite() && *s > 0.0)
        .fold(f64::INFINITY, f64::min);
    if !floor.is_finite() {
        return Err(AppError::DegenerateInput(
            "all standard errors in the fit region are zero".to_string(),
        ));
    }

    let replaced = sigma.iter().filter(|s| **s == 0.0).count();
    if replaced > 0 {
        log::warn!("Replacing {replaced} zero standard error(s) with {floor:.6e}");
    }

    sigma
        .iter()
        .map(|&s| {
            if s == 0.0 {
                Ok(floor)
            } else if s.is_finite() && s > 0.0 {
                Ok(s)
            } else {
                Err(AppError::DegenerateInput(format!(
                    "invalid standard error {s} in the fit region"
                )))
            }
        })
        .collect()
}
