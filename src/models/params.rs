//! Parameter tables for each model variant.
//!
//! Each variant maps to a fixed list of `{name, lower, upper, initial guess}`
//! entries; the fitter only iterates this table.

use std::f64::consts::PI;

use crate::domain::{ModelVariant, ParamName};

/// How the starting value of a parameter is derived from the masked data.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InitialGuess {
    /// `max - min` of the masked means.
    Span,
    /// `min` of the masked means.
    Floor,
    Constant(f64),
}

impl InitialGuess {
    pub fn resolve(self, y: &[f64]) -> f64 {
        let (lo, hi) = y
            .iter()
            .filter(|v| v.is_finite())
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)));
        if !lo.is_finite() {
            return match self {
                InitialGuess::Constant(c) => c,
                _ => 0.0,
            };
        }
        match self {
            InitialGuess::Span => hi - lo,
            InitialGuess::Floor => lo,
            InitialGuess::Constant(c) => c,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParamSpec {
    pub name: ParamName,
    pub lower: f64,
    pub upper: f64,
    pub guess: InitialGuess,
}

const N0: ParamSpec = ParamSpec {
    name: ParamName::N0,
    lower: 0.0,
    upper: f64::INFINITY,
    guess: InitialGuess::Span,
};

const V: ParamSpec = ParamSpec {
    name: ParamName::V,
    lower: 0.0,
    upper: 1.0,
    guess: InitialGuess::Constant(0.5),
};

const DELTA: ParamSpec = ParamSpec {
    name: ParamName::Delta,
    lower: -2.0 * PI,
    upper: 2.0 * PI,
    guess: InitialGuess::Constant(0.0),
};

const X_SCALE: ParamSpec = ParamSpec {
    name: ParamName::XScale,
    lower: 0.3,
    upper: 3.0,
    guess: InitialGuess::Constant(1.0),
};

const N_BG: ParamSpec = ParamSpec {
    name: ParamName::NBg,
    lower: 0.0,
    upper: f64::INFINITY,
    guess: InitialGuess::Floor,
};

static BASIC: [ParamSpec; 3] = [N0, V, DELTA];
static EXTENDED: [ParamSpec; 5] = [N0, V, DELTA, X_SCALE, N_BG];

/// Parameter table in model order.
pub fn param_specs(variant: ModelVariant) -> &'static [ParamSpec] {
    match variant {
        ModelVariant::Basic => &BASIC,
        ModelVariant::Extended => &EXTENDED,
    }
}
