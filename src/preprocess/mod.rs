//! Coincidence preprocessing.
//!
//! Two explicit stages:
//!
//! 1. `correct`: per-interval accidental estimate and true-coincidence estimate
//!    (a new `CorrectedRecord`; the input is never mutated)
//! 2. `summarize`: per-position statistics of the selected series

pub mod correct;
pub mod summary;

pub use correct::*;
pub use summary::*;
