//! Box-constrained Levenberg–Marquardt.
//!
//! Minimizes `Σ r_i(p)²` subject to `lower <= p <= upper`:
//!
//! ```text
//! (J_fᵀ J_f + λ D) δ = -J_fᵀ r
//! ```
//!
//! where `J_f` holds the Jacobian columns of the *free* parameters and `D` is
//! the Marquardt diagonal scaling.
//!
//! Bound handling:
//! - A parameter sitting on a bound whose gradient points outward is frozen for
//!   that iteration (active set).
//! - Every trial step is projected back into the box, so residuals are never
//!   evaluated outside the bounds.
//!
//! The damped system is solved in its augmented least-squares form
//! `[J_f; sqrt(λD)] δ = [-r; 0]`, which avoids squaring the condition number.

use nalgebra::{DMatrix, DVector};

use crate::math::solve_least_squares;

/// Damping is never reduced below this.
const LAMBDA_MIN: f64 = 1e-12;

/// Past this damping no step can reduce the cost; the point is a minimum.
const LAMBDA_MAX: f64 = 1e16;

/// Solver tolerances and limits.
#[derive(Debug, Clone, Copy)]
pub struct LmOptions {
    /// Cap on residual evaluations for trial steps (accepted or rejected).
    pub max_iterations: usize,
    /// Relative cost reduction below which we stop.
    pub ftol: f64,
    /// Relative step size below which we stop.
    pub xtol: f64,
    /// Projected-gradient infinity norm below which we stop.
    pub gtol: f64,
    pub initial_lambda: f64,
}

impl Default for LmOptions {
    fn default() -> Self {
        Self {
            max_iterations: 1000,
            ftol: 1e-12,
            xtol: 1e-12,
            gtol: 1e-12,
            initial_lambda: 1e-3,
        }
    }
}

/// Converged solution.
#[derive(Debug, Clone)]
pub struct LmSolution {
    pub params: Vec<f64>,
    /// `Σ r_i²` at `params`.
    pub cost: f64,
    /// Jacobian of the residuals at `params` (all parameters).
    pub jacobian: DMatrix<f64>,
    pub iterations: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub enum LmError {
    /// Residuals were NaN/inf at the starting point.
    NonFiniteStart,
    /// A Jacobian column could not be evaluated.
    NonFiniteJacobian { param: usize },
    /// The iteration cap was reached before any stopping criterion held.
    IterationLimit { iterations: usize, cost: f64 },
    /// Bounds are inconsistent (`lower > upper`, NaN, or length mismatch).
    InvalidBounds,
}

impl std::fmt::Display for LmError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LmError::NonFiniteStart => write!(f, "residuals are not finite at the initial guess"),
            LmError::NonFiniteJacobian { param } => {
                write!(f, "Jacobian column {param} is not finite")
            }
            LmError::IterationLimit { iterations, cost } => {
                write!(f, "iteration limit {iterations} reached (cost={cost:.6e})")
            }
            LmError::InvalidBounds => write!(f, "invalid parameter bounds"),
        }
    }
}

/// Minimize `Σ r(p)²` inside `[lower, upper]` starting from `p0`.
///
/// `p0` is projected into the box before the first evaluation.
pub fn minimize_bounded<F>(
    residuals: F,
    p0: &[f64],
    lower: &[f64],
    upper: &[f64],
    opts: &LmOptions,
) -> Result<LmSolution, LmError>
where
    F: Fn(&[f64]) -> DVector<f64>,
{
    let n_p = p0.len();
    if lower.len() != n_p
        || upper.len() != n_p
        || lower.iter().zip(upper).any(|(lo, hi)| lo.is_nan() || hi.is_nan() || lo > hi)
    {
        return Err(LmError::InvalidBounds);
    }

    let mut p: Vec<f64> = p0.to_vec();
    project(&mut p, lower, upper);

    let mut r = residuals(&p);
    if r.iter().any(|v| !v.is_finite()) {
        return Err(LmError::NonFiniteStart);
    }
    let mut cost = r.norm_squared();
    let mut jac = jacobian(&residuals, &p, &r, upper)?;
    let mut lambda = opts.initial_lambda.max(LAMBDA_MIN);
    let mut iterations = 0usize;

    loop {
        if cost == 0.0 {
            return Ok(solution(p, cost, jac, iterations));
        }

        let grad = jac.transpose() * &r;
        let free = free_indices(&p, &grad, lower, upper);
        let pg_norm = free.iter().map(|&k| grad[k].abs()).fold(0.0_f64, f64::max);
        if free.is_empty() || pg_norm <= opts.gtol {
            return Ok(solution(p, cost, jac, iterations));
        }

        let jf = jac.select_columns(free.iter());
        let scale: Vec<f64> = (0..free.len())
            .map(|c| jf.column(c).norm_squared().max(1e-12))
            .collect();

        // Inner loop: raise the damping until a step reduces the cost.
        loop {
            iterations += 1;
            if iterations > opts.max_iterations {
                return Err(LmError::IterationLimit { iterations: opts.max_iterations, cost });
            }
            if lambda > LAMBDA_MAX {
                log::debug!("LM damping saturated at cost={cost:.6e}; treating as converged");
                return Ok(solution(p, cost, jac, iterations));
            }

            let Some(delta) = damped_step(&jf, &r, &scale, lambda) else {
                lambda *= 10.0;
                continue;
            };

            let mut trial = p.clone();
            for (c, &k) in free.iter().enumerate() {
                trial[k] += delta[c];
            }
            project(&mut trial, lower, upper);

            let step_norm = trial
                .iter()
                .zip(&p)
                .map(|(a, b)| (a - b) * (a - b))
                .sum::<f64>()
                .sqrt();
            let p_norm = p.iter().map(|v| v * v).sum::<f64>().sqrt();
            if step_norm <= opts.xtol * (opts.xtol + p_norm) {
                return Ok(solution(p, cost, jac, iterations));
            }

            let r_trial = residuals(&trial);
            let cost_trial = r_trial.norm_squared();
            if cost_trial.is_finite() && cost_trial < cost {
                let rel = (cost - cost_trial) / cost;
                p = trial;
                r = r_trial;
                cost = cost_trial;
                jac = jacobian(&residuals, &p, &r, upper)?;
                lambda = (lambda / 10.0).max(LAMBDA_MIN);
                if rel <= opts.ftol {
                    return Ok(solution(p, cost, jac, iterations));
                }
                break;
            }
            lambda *= 10.0;
        }
    }
}

fn solution(params: Vec<f64>, cost: f64, jacobian: DMatrix<f64>, iterations: usize) -> LmSolution {
    LmSolution {
        params,
        cost,
        jacobian,
        iterations,
    }
}

fn project(p: &mut [f64], lower: &[f64], upper: &[f64]) {
    for ((v, lo), hi) in p.iter_mut().zip(lower).zip(upper) {
        *v = v.clamp(*lo, *hi);
    }
}

/// Parameters allowed to move this iteration.
///
/// The cost gradient is `2 Jᵀr`; descent follows `-grad`. A parameter on its
/// lower bound with `grad > 0` (or upper bound with `grad < 0`) would leave
/// the box and is held.
fn free_indices(p: &[f64], grad: &DVector<f64>, lower: &[f64], upper: &[f64]) -> Vec<usize> {
    (0..p.len())
        .filter(|&k| {
            let at_lower = p[k] <= lower[k] && grad[k] > 0.0;
            let at_upper = p[k] >= upper[k] && grad[k] < 0.0;
            let pinned = lower[k] == upper[k];
            !(at_lower || at_upper || pinned)
        })
        .collect()
}

fn damped_step(
    jf: &DMatrix<f64>,
    r: &DVector<f64>,
    scale: &[f64],
    lambda: f64,
) -> Option<DVector<f64>> {
    let m = jf.nrows();
    let nf = jf.ncols();
    let mut a = DMatrix::<f64>::zeros(m + nf, nf);
    let mut b = DVector::<f64>::zeros(m + nf);

    a.view_mut((0, 0), (m, nf)).copy_from(jf);
    for i in 0..m {
        b[i] = -r[i];
    }
    for c in 0..nf {
        a[(m + c, c)] = (lambda * scale[c]).sqrt();
    }

    solve_least_squares(&a, &b)
}

/// Forward-difference Jacobian. Steps point inward at the upper bound.
fn jacobian<F>(residuals: &F, p: &[f64], r: &DVector<f64>, upper: &[f64]) -> Result<DMatrix<f64>, LmError>
where
    F: Fn(&[f64]) -> DVector<f64>,
{
    let m = r.len();
    let mut jac = DMatrix::<f64>::zeros(m, p.len());
    let rel = f64::EPSILON.sqrt();

    for k in 0..p.len() {
        let mut h = rel * p[k].abs().max(1.0);
        if p[k] + h > upper[k] {
            h = -h;
        }
        let mut shifted = p.to_vec();
        shifted[k] += h;
        let r_shift = residuals(&shifted);
        for i in 0..m {
            let d = (r_shift[i] - r[i]) / h;
            if !d.is_finite() {
                return Err(LmError::NonFiniteJacobian { param: k });
            }
            jac[(i, k)] = d;
        }
    }

    Ok(jac)
}
