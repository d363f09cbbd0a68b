//! Overlap check

use std::sync::Arc;

use geo::{Area, BooleanOps, BoundingRect, Intersects};
use shared::{CorpusEntry, OverlapCheckResult, OverlapMatch, PlotPolygon};

/// Intersection area as a percentage of the candidate's area
pub fn overlap_pct(candidate: &PlotPolygon, other: &PlotPolygon) -> f64 {
    let candidate_area = candidate.area_deg2();
    if candidate_area <= 0.0 {
        return 0.0;
    }

    let (a, b) = (candidate.as_geo(), other.as_geo());
    let disjoint = match (a.bounding_rect(), b.bounding_rect()) {
        (Some(ra), Some(rb)) => !ra.intersects(&rb),
        _ => true,
    };
    if disjoint {
        return 0.0;
    }

    let shared_area = a.intersection(b).unsigned_area();
    (shared_area / candidate_area * 100.0).clamp(0.0, 100.0)
}

#[derive(Debug, Clone)]
pub struct OverlapDetector {
    min_overlap_pct: f64,
}

impl OverlapDetector {
    pub fn new(min_overlap_pct: f64) -> Self {
        Self { min_overlap_pct }
    }

    /// Corpus plots overlapping the candidate by more than the threshold
    pub fn evaluate(&self, candidate: &PlotPolygon, corpus: &[Arc<CorpusEntry>]) -> OverlapCheckResult {
        let mut result = OverlapCheckResult::default();

        for entry in corpus {
            let pct = overlap_pct(candidate, &entry.polygon);
            result.max_overlap_pct = result.max_overlap_pct.max(pct);
            if pct > self.min_overlap_pct {
                result.overlaps.push(OverlapMatch {
                    plot_id: entry.plot_id.clone(),
                    owner_id: entry.owner_id.clone(),
                    overlap_pct: pct,
                });
            }
        }

        result
    }
}
