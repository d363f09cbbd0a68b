//! Plot verification models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::geometry::{PlotFeatures, PlotPolygon};
use crate::types::Band;

/// Final categorical decision for a plot
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PlotStatus {
    Verified,
    Suspicious,
    Error,
}

impl std::fmt::Display for PlotStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PlotStatus::Verified => write!(f, "verified"),
            PlotStatus::Suspicious => write!(f, "suspicious"),
            PlotStatus::Error => write!(f, "error"),
        }
    }
}

/// A previously processed plot kept for comparison
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorpusEntry {
    pub plot_id: String,
    pub owner_id: String,
    pub polygon: PlotPolygon,
    pub features: PlotFeatures,
    pub submitted_at: DateTime<Utc>,
}

/// Area outlier check
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AreaCheckResult {
    pub is_outlier: bool,
    /// Raw model score; more negative is more anomalous
    pub score: f64,
    pub area_ha: f64,
    /// Band of typical areas the decision was explained against
    pub expected_band: Band,
    pub reason: Option<String>,
    /// The learned model was unavailable and the fallback band was used
    pub degraded: bool,
}

/// A corpus plot whose normalized outline matches the candidate
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ShapeMatch {
    pub plot_id: String,
    pub owner_id: String,
    pub similarity: f64,
}

/// Shape similarity check against the corpus
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct ShapeCheckResult {
    pub matches: Vec<ShapeMatch>,
    pub max_similarity: f64,
    pub compared: usize,
}

impl ShapeCheckResult {
    pub fn is_suspicious(&self) -> bool {
        !self.matches.is_empty()
    }
}

/// A corpus plot overlapping the candidate
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OverlapMatch {
    pub plot_id: String,
    pub owner_id: String,
    /// Intersection area as a percentage of the candidate's area
    pub overlap_pct: f64,
}

/// Overlap check against the corpus
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct OverlapCheckResult {
    pub overlaps: Vec<OverlapMatch>,
    /// Largest overlap seen, including those below threshold
    pub max_overlap_pct: f64,
}

impl OverlapCheckResult {
    pub fn is_suspicious(&self) -> bool {
        !self.overlaps.is_empty()
    }
}

/// Same-owner spatial density check
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct DensityCheckResult {
    pub is_suspicious: bool,
    /// Owner's prior plots in the corpus
    pub owner_plot_count: usize,
    /// Size of the cluster containing the candidate (0 when it is noise)
    pub cluster_size: usize,
    /// False while the owner is under the cold-start threshold
    pub active: bool,
    pub reason: Option<String>,
}

/// Per-detector results; corpus checks are `None` when they were skipped
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlotChecks {
    pub area: AreaCheckResult,
    pub shape: Option<ShapeCheckResult>,
    pub overlap: Option<OverlapCheckResult>,
    pub density: Option<DensityCheckResult>,
}

/// Summary of the photo evidence submitted with a plot
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct EvidenceSummary {
    pub photo_count: usize,
    pub min_quality_score: f64,
    pub duplicate_count: usize,
    pub gps_tagged_count: usize,
    pub dark_material_detected: bool,
}

/// Verdict for one plot submission
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlotVerdict {
    pub plot_id: String,
    pub owner_id: String,
    pub status: PlotStatus,
    pub confidence: f64,
    /// Triggered detector reasons, in detector order
    pub reasons: Vec<String>,
    /// Skipped checks, repairs and evidence notes
    pub warnings: Vec<String>,
    /// Some checks could not run
    pub degraded: bool,
    pub features: Option<PlotFeatures>,
    pub checks: Option<PlotChecks>,
    pub max_overlap_pct: f64,
    pub similar_plot_ids: Vec<String>,
    pub evidence: Option<EvidenceSummary>,
    pub evaluated_at: DateTime<Utc>,
}

impl PlotVerdict {
    /// Error verdict for a submission that never reached the detectors
    pub fn error(plot_id: &str, owner_id: &str, reason: impl Into<String>) -> Self {
        Self {
            plot_id: plot_id.to_string(),
            owner_id: owner_id.to_string(),
            status: PlotStatus::Error,
            confidence: 0.0,
            reasons: vec![reason.into()],
            warnings: Vec::new(),
            degraded: false,
            features: None,
            checks: None,
            max_overlap_pct: 0.0,
            similar_plot_ids: Vec::new(),
            evidence: None,
            evaluated_at: Utc::now(),
        }
    }

    pub fn is_verified(&self) -> bool {
        self.status == PlotStatus::Verified
    }
}
