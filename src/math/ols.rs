//! Dense linear-algebra helpers for the nonlinear fitter.
//!
//! The fitter repeatedly solves small damped normal-equation systems and,
//! once converged, inverts `JᵀJ` for the parameter covariance.
//!
//! Implementation choices:
//! - We use SVD for both so near-singular systems degrade gracefully instead of
//!   panicking. (Nalgebra's `QR::solve` is intended for square systems and will
//!   panic for non-square matrices.)
//! - Parameter dimension is tiny (3–5 columns), so SVD cost is negligible.

use nalgebra::{DMatrix, DVector};

/// Solve a least squares problem using SVD.
///
/// Returns `None` if the system is too ill-conditioned to solve robustly.
pub fn solve_least_squares(x: &DMatrix<f64>, y: &DVector<f64>) -> Option<DVector<f64>> {
    let svd = x.clone().svd(true, true);

    // Try progressively looser tolerances if strict solve fails.
    for &tol in &[1e-12, 1e-10, 1e-8] {
        if let Ok(beta) = svd.solve(y, tol) {
            if beta.iter().all(|v| v.is_finite()) {
                return Some(beta);
            }
        }
    }

    None
}

/// Moore–Penrose inverse of a symmetric normal matrix.
///
/// Singular values below `1e-15 * max_sv` are treated as zero, so a parameter
/// the data cannot constrain gets zero covariance rather than an overflow.
pub fn normal_matrix_inverse(jtj: &DMatrix<f64>) -> Option<DMatrix<f64>> {
    let svd = jtj.clone().svd(true, true);
    let max_sv = svd.singular_values.iter().copied().fold(0.0_f64, f64::max);
    let eps = (max_sv * 1e-15).max(f64::MIN_POSITIVE);
    let inv = svd.pseudo_inverse(eps).ok()?;
    if inv.iter().all(|v| v.is_finite()) {
        Some(inv)
    } else {
        None
    }
}
