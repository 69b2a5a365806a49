//! Double-slit coincidence-pattern models.
//!
//! Models are implemented as small, pure functions so that fitting code can
//! stay generic over the variant.

pub mod model;
pub mod params;

pub use model::*;
pub use params::*;
