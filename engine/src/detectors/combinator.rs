//! Combine per-detector results into a plot decision
//!
//! Confidence starts at 1.0 and is multiplied by a fixed penalty for each
//! triggered detector; reasons are listed in detector order.

use shared::{PlotChecks, PlotStatus};

pub const AREA_PENALTY: f64 = 0.7;
pub const SHAPE_PENALTY: f64 = 0.6;
pub const OVERLAP_PENALTY: f64 = 0.5;
pub const DENSITY_PENALTY: f64 = 0.8;

/// Similar plot ids quoted in a reason
const MAX_QUOTED_IDS: usize = 3;

#[derive(Debug, Clone, PartialEq)]
pub struct CombinedDecision {
    pub status: PlotStatus,
    pub confidence: f64,
    pub reasons: Vec<String>,
}

pub fn combine(checks: &PlotChecks) -> CombinedDecision {
    let mut confidence = 1.0;
    let mut reasons = Vec::new();

    if checks.area.is_outlier {
        confidence *= AREA_PENALTY;
        reasons.push(
            checks
                .area
                .reason
                .clone()
                .unwrap_or_else(|| format!("Atypical plot size: {:.2} ha", checks.area.area_ha)),
        );
    }

    if let Some(shape) = checks.shape.as_ref().filter(|s| s.is_suspicious()) {
        confidence *= SHAPE_PENALTY;
        let ids: Vec<&str> = shape
            .matches
            .iter()
            .take(MAX_QUOTED_IDS)
            .map(|m| m.plot_id.as_str())
            .collect();
        reasons.push(format!("Similar to existing plot(s): {}", ids.join(", ")));
    }

    if let Some(overlap) = checks.overlap.as_ref().filter(|o| o.is_suspicious()) {
        confidence *= OVERLAP_PENALTY;
        reasons.push(format!(
            "Overlaps with {} existing plot(s)",
            overlap.overlaps.len()
        ));
    }

    if let Some(density) = checks.density.as_ref().filter(|d| d.is_suspicious) {
        confidence *= DENSITY_PENALTY;
        reasons.push(
            density
                .reason
                .clone()
                .unwrap_or_else(|| format!("{} plots within 1km radius", density.cluster_size)),
        );
    }

    let status = if reasons.is_empty() {
        PlotStatus::Verified
    } else {
        PlotStatus::Suspicious
    };

    CombinedDecision {
        status,
        confidence,
        reasons,
    }
}
