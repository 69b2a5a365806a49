//! Mathematical utilities: special functions, series statistics, least squares
//! and the bounded Levenberg–Marquardt solver.

pub mod basis;
pub mod lm;
pub mod ols;
pub mod stats;

pub use basis::*;
pub use lm::*;
pub use ols::*;
pub use stats::*;
