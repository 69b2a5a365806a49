//! Data sources other than lab measurements.
//!
//! - `synth`: reproducible synthetic scans in the on-disk measurement layout

pub mod synth;

pub use synth::*;
