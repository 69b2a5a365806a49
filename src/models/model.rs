//! Model evaluation for the basic and extended double-slit pattern.
//!
//! Basic:
//!
//! ```text
//! N(x) = N0 · sinc²(β/π) · ½ (1 + V cos(2α + δ))
//! α = π d x / (λ L),  β = π b x / (λ L)
//! ```
//!
//! Extended replaces `x` by `x_scale · x` and adds a constant `N_bg`.
//! Positions are given in millimeters relative to the pattern center and
//! converted to meters internally.

use std::f64::consts::PI;

use crate::domain::{ModelVariant, PhysicalConstants};
use crate::math::sinc;

/// Geometry entering `α` and `β`. All lengths in meters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SlitGeometry {
    pub wavelength_m: f64,
    pub distance_m: f64,
    pub separation_m: f64,
    pub width_m: f64,
}

impl From<&PhysicalConstants> for SlitGeometry {
    fn from(c: &PhysicalConstants) -> Self {
        Self {
            wavelength_m: c.wavelength_m,
            distance_m: c.distance_m,
            separation_m: c.separation_m,
            width_m: c.width_m,
        }
    }
}

impl SlitGeometry {
    /// `(α, β)` at a position given in meters.
    fn phases(&self, x_m: f64) -> (f64, f64) {
        let k = PI * x_m / (self.wavelength_m * self.distance_m);
        (k * self.separation_m, k * self.width_m)
    }
}

fn pattern(geometry: &SlitGeometry, x_m: f64, n0: f64, v: f64, delta: f64) -> f64 {
    let (alpha, beta) = geometry.phases(x_m);
    let s = sinc(beta / PI);
    let envelope = s * s;
    let interference = 0.5 * (1.0 + v * (2.0 * alpha + delta).cos());
    n0 * envelope * interference
}

/// Basic pattern at `x_mm` (relative to center).
pub fn counts_basic(geometry: &SlitGeometry, x_mm: f64, n0: f64, v: f64, delta: f64) -> f64 {
    pattern(geometry, x_mm * 1e-3, n0, v, delta)
}

/// Extended pattern: horizontal scale and constant background.
pub fn counts_extended(
    geometry: &SlitGeometry,
    x_mm: f64,
    n0: f64,
    v: f64,
    delta: f64,
    x_scale: f64,
    n_bg: f64,
) -> f64 {
    n_bg + pattern(geometry, x_scale * (x_mm * 1e-3), n0, v, delta)
}

/// Predict the mean coincidence count for a variant.
///
/// `params` are in [`crate::models::param_specs`] order.
///
/// # Panics
/// Panics if `params.len()` is shorter than the variant's parameter count.
pub fn predict(variant: ModelVariant, geometry: &SlitGeometry, x_mm: f64, params: &[f64]) -> f64 {
    match variant {
        ModelVariant::Basic => counts_basic(geometry, x_mm, params[0], params[1], params[2]),
        ModelVariant::Extended => counts_extended(
            geometry, x_mm, params[0], params[1], params[2], params[3], params[4],
        ),
    }
}

/// Vectorized [`predict`].
pub fn predict_many(
    variant: ModelVariant,
    geometry: &SlitGeometry,
    x_mm: &[f64],
    params: &[f64],
) -> Vec<f64> {
    x_mm.iter()
        .map(|&x| predict(variant, geometry, x, params))
        .collect()
}

/// Theoretical visibility `|V| = exp(-(π d w0 / (λ z))²)`.
///
/// Returns `None` when the beam waist or source distance is not configured.
pub fn visibility_theory(constants: &PhysicalConstants) -> Option<f64> {
    let w0 = constants.beam_waist_m?;
    let z = constants.source_distance_m?;
    let arg = PI * constants.separation_m * w0 / (constants.wavelength_m * z);
    Some((-(arg * arg)).exp())
}
