//! Fit orchestration.
//!
//! Responsibilities:
//!
//! - estimate the pattern center and build the region mask
//! - guard the per-point uncertainties against zero weights
//! - run the bounded weighted least-squares fit of the pattern model

pub mod fitter;
pub mod region;

pub use fitter::*;
pub use region::*;
