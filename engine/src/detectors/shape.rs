//! Shape similarity check
//!
//! Outlines are compared after removing position and size: each polygon's
//! vertices are centered on their mean and divided by their largest distance
//! from it. The distance between two outlines is the symmetric Hausdorff
//! distance between the normalized vertex sets and similarity is
//! `1 / (1 + distance)`. Rotated copies are not normalized and score lower.

use std::sync::Arc;

use shared::{vertex_mean, CorpusEntry, LonLat, PlotPolygon, ShapeCheckResult, ShapeMatch};

/// Position- and scale-free outline
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedOutline(Vec<(f64, f64)>);

impl NormalizedOutline {
    pub fn from_vertices(vertices: &[LonLat]) -> Self {
        let center = vertex_mean(vertices);
        let centered: Vec<(f64, f64)> = vertices
            .iter()
            .map(|v| (v.lon - center.lon, v.lat - center.lat))
            .collect();
        let extent = centered
            .iter()
            .map(|(x, y)| x.hypot(*y))
            .fold(0.0, f64::max);

        if extent > 0.0 {
            Self(centered.into_iter().map(|(x, y)| (x / extent, y / extent)).collect())
        } else {
            Self(centered)
        }
    }

    pub fn from_polygon(polygon: &PlotPolygon) -> Self {
        Self::from_vertices(&polygon.vertices())
    }

    pub fn points(&self) -> &[(f64, f64)] {
        &self.0
    }

    pub fn similarity(&self, other: &NormalizedOutline) -> f64 {
        1.0 / (1.0 + hausdorff_distance(&self.0, &other.0))
    }
}

fn directed_hausdorff(from: &[(f64, f64)], to: &[(f64, f64)]) -> f64 {
    from.iter()
        .map(|(ax, ay)| {
            to.iter()
                .map(|(bx, by)| (ax - bx).hypot(ay - by))
                .fold(f64::INFINITY, f64::min)
        })
        .fold(0.0, f64::max)
}

/// Symmetric Hausdorff distance between two point sets
pub fn hausdorff_distance(a: &[(f64, f64)], b: &[(f64, f64)]) -> f64 {
    directed_hausdorff(a, b).max(directed_hausdorff(b, a))
}

/// Similarity of two plot outlines in (0, 1]
pub fn shape_similarity(a: &PlotPolygon, b: &PlotPolygon) -> f64 {
    NormalizedOutline::from_polygon(a).similarity(&NormalizedOutline::from_polygon(b))
}

/// Flags corpus plots whose outline nearly matches the candidate's
///
/// # Scaling
///
/// Every submission is compared against every corpus entry and each
/// comparison is a brute-force Hausdorff distance, so one evaluation costs
/// O(corpus_size × vertices²). This is sized for corpora of thousands of
/// plots with typical field boundaries (tens of vertices). Larger corpora
/// need a spatial or shape index in front of this scan.
#[derive(Debug, Clone)]
pub struct ShapeSimilarityDetector {
    threshold: f64,
}

impl ShapeSimilarityDetector {
    pub fn new(threshold: f64) -> Self {
        Self { threshold }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Corpus plots whose similarity strictly exceeds the threshold, in corpus order
    pub fn evaluate(&self, candidate: &PlotPolygon, corpus: &[Arc<CorpusEntry>]) -> ShapeCheckResult {
        let outline = NormalizedOutline::from_polygon(candidate);
        let mut result = ShapeCheckResult {
            compared: corpus.len(),
            ..ShapeCheckResult::default()
        };

        for entry in corpus {
            let similarity = outline.similarity(&NormalizedOutline::from_polygon(&entry.polygon));
            result.max_similarity = result.max_similarity.max(similarity);
            if similarity > self.threshold {
                result.matches.push(ShapeMatch {
                    plot_id: entry.plot_id.clone(),
                    owner_id: entry.owner_id.clone(),
                    similarity,
                });
            }
        }

        result
    }
}
