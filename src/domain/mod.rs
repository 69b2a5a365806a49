//! Domain types used throughout the pipeline.
//!
//! This module defines:
//!
//! - configuration (`ExperimentConfig`, `PhysicalConstants`, `AnalysisOptions`)
//! - per-position measurements (`PositionRecord`, `CorrectedRecord`)
//! - aggregates and fit outputs (`PositionSummary`, `FitResult`)

pub mod types;

pub use types::*;
