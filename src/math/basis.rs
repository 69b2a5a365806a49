//! Stable special functions for the diffraction envelope.
//!
//! The normalized sinc is:
//!
//! - `sinc(z) = sin(πz) / (πz)`, with `sinc(0) = 1`
//!
//! Numerical notes:
//! - For small `z`, `sin(πz) / (πz)` is a 0/0 form and loses precision well
//!   before `z` reaches 0. We switch to the Taylor series there.

use std::f64::consts::PI;

/// Threshold below which we switch to a small-argument series approximation.
const SMALL_Z: f64 = 1e-4;

/// Normalized sinc, `sin(πz) / (πz)`.
pub fn sinc(z: f64) -> f64 {
    let u = PI * z;
    if u.abs() < SMALL_Z {
        // Series: sin(u)/u ≈ 1 - u^2/6 + u^4/120
        let u2 = u * u;
        return 1.0 - u2 / 6.0 + (u2 * u2) / 120.0;
    }
    u.sin() / u
}
