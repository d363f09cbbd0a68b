//! Plot boundary geometry
//!
//! Turns raw vertex lists into validated polygons and derives the planar
//! shape features every plot detector works from.

mod features;
mod formats;
mod parser;

pub use features::*;
pub use formats::*;
pub use parser::*;

use thiserror::Error;

/// Reasons a boundary is rejected before any detector runs
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GeometryError {
    #[error("No coordinates found in boundary")]
    NoCoordinates,

    #[error("Polygon must have at least 3 distinct vertices, found {found}")]
    TooFewVertices { found: usize },

    #[error("Polygon has zero area")]
    ZeroArea,

    #[error("Boundary contains non-finite coordinates")]
    NonFinite,

    #[error("Self-intersecting boundary could not be repaired")]
    Unrepairable,

    #[error("Invalid boundary format: {0}")]
    Format(String),
}
