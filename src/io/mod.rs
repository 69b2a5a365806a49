//! Input/output helpers.
//!
//! - position folder discovery + parsing (`ingest`)
//! - summary table export (CSV) (`export`)
//! - fit result read/write (JSON) (`fit_json`)

pub mod export;
pub mod fit_json;
pub mod ingest;

pub use export::*;
pub use fit_json::*;
pub use ingest::*;
