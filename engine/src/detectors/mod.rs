//! Plot fraud detectors and the verdict combinator

pub mod area;
pub mod combinator;
pub mod density;
pub mod overlap;
pub mod shape;

pub use area::AreaOutlierDetector;
pub use combinator::{combine, CombinedDecision};
pub use density::{dbscan, SpatialDensityDetector};
pub use overlap::{overlap_pct, OverlapDetector};
pub use shape::{hausdorff_distance, shape_similarity, NormalizedOutline, ShapeSimilarityDetector};
