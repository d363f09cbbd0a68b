//! Plot verification service
//!
//! Runs a submitted boundary through the area, shape, overlap and density
//! detectors, combines them into a verdict and records the plot in the
//! corpus according to the append policy.

use std::sync::{Arc, Mutex};

use chrono::Utc;
use shared::{
    extract_features, parse_boundary, CorpusEntry, EvidenceSummary, GeometryError, LonLat,
    ParsedBoundary, PhotoReport, PlotChecks, PlotStatus, PlotVerdict,
};

use crate::config::{AppendPolicy, PlotConfig};
use crate::corpus::PlotCorpus;
use crate::detectors::{
    combine, AreaOutlierDetector, OverlapDetector, ShapeSimilarityDetector, SpatialDensityDetector,
};
use crate::error::{EngineError, EngineResult};
use crate::ml::ModelStore;

/// Verifies plot submissions
pub trait PlotVerifier: Send + Sync {
    fn verify_plot_with_evidence(
        &self,
        boundary: &[LonLat],
        owner_id: &str,
        plot_id: &str,
        photos: &[PhotoReport],
    ) -> EngineResult<PlotVerdict>;

    fn verify_plot(
        &self,
        boundary: &[LonLat],
        owner_id: &str,
        plot_id: &str,
    ) -> EngineResult<PlotVerdict> {
        self.verify_plot_with_evidence(boundary, owner_id, plot_id, &[])
    }

    /// Like `verify_plot`, but malformed geometry becomes an error verdict
    fn verdict(
        &self,
        boundary: &[LonLat],
        owner_id: &str,
        plot_id: &str,
        photos: &[PhotoReport],
    ) -> EngineResult<PlotVerdict> {
        match self.verify_plot_with_evidence(boundary, owner_id, plot_id, photos) {
            Err(EngineError::MalformedGeometry(e)) => Ok(invalid_boundary(plot_id, owner_id, &e)),
            other => other,
        }
    }
}

/// Error verdict for a boundary that could not be read or validated
pub fn invalid_boundary(plot_id: &str, owner_id: &str, error: &GeometryError) -> PlotVerdict {
    PlotVerdict::error(plot_id, owner_id, format!("Invalid boundary: {}", error))
}

pub struct PlotVerificationService {
    area: AreaOutlierDetector,
    shape: ShapeSimilarityDetector,
    overlap: OverlapDetector,
    density: SpatialDensityDetector,
    append_policy: AppendPolicy,
    corpus: Arc<dyn PlotCorpus>,
    /// Serializes snapshot-then-append so each verdict sees every earlier one
    submissions: Mutex<()>,
}

impl PlotVerificationService {
    pub fn new(config: &PlotConfig, models: &ModelStore, corpus: Arc<dyn PlotCorpus>) -> Self {
        Self {
            area: AreaOutlierDetector::new(models, config.fallback_area_band),
            shape: ShapeSimilarityDetector::new(config.similarity_threshold),
            overlap: OverlapDetector::new(config.min_overlap_pct),
            density: SpatialDensityDetector::new(
                config.density_eps_deg,
                config.density_min_samples,
                config.density_min_history,
                config.density_max_cluster,
            ),
            append_policy: config.append_policy,
            corpus,
            submissions: Mutex::new(()),
        }
    }

    fn evaluate(
        &self,
        parsed: ParsedBoundary,
        owner_id: &str,
        plot_id: &str,
        photos: &[PhotoReport],
    ) -> PlotVerdict {
        let features = extract_features(&parsed.polygon);
        let mut warnings = Vec::new();
        if parsed.repaired {
            warnings.push("Boundary self-intersected and was repaired".to_string());
        }

        let area = self.area.evaluate(features.area_ha);
        let mut degraded = area.degraded;
        if area.degraded {
            warnings.push("Area model unavailable: fixed area band used".to_string());
        }

        // Guard is () so a poisoned lock carries no broken state
        let _guard = self
            .submissions
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        let snapshot = match self.corpus.snapshot() {
            Ok(snapshot) => Some(snapshot),
            Err(e) => {
                tracing::warn!(plot_id, "Corpus unavailable, skipping comparison checks: {}", e);
                warnings.push("Corpus unavailable: shape, overlap and density checks skipped".to_string());
                degraded = true;
                None
            }
        };

        let checks = PlotChecks {
            area,
            shape: snapshot
                .as_ref()
                .map(|corpus| self.shape.evaluate(&parsed.polygon, corpus)),
            overlap: snapshot
                .as_ref()
                .map(|corpus| self.overlap.evaluate(&parsed.polygon, corpus)),
            density: snapshot
                .as_ref()
                .map(|corpus| self.density.evaluate(features.centroid, owner_id, corpus)),
        };

        let decision = combine(&checks);
        let evidence = summarize_evidence(photos, &mut warnings);

        let mut verdict = PlotVerdict {
            plot_id: plot_id.to_string(),
            owner_id: owner_id.to_string(),
            status: decision.status,
            confidence: decision.confidence,
            reasons: decision.reasons,
            warnings,
            degraded,
            max_overlap_pct: checks.overlap.as_ref().map_or(0.0, |o| o.max_overlap_pct),
            similar_plot_ids: checks
                .shape
                .as_ref()
                .map(|s| s.matches.iter().map(|m| m.plot_id.clone()).collect())
                .unwrap_or_default(),
            features: Some(features.clone()),
            checks: Some(checks),
            evidence,
            evaluated_at: Utc::now(),
        };

        if snapshot.is_some() && self.should_record(verdict.status) {
            let entry = CorpusEntry {
                plot_id: plot_id.to_string(),
                owner_id: owner_id.to_string(),
                polygon: parsed.polygon,
                features,
                submitted_at: verdict.evaluated_at,
            };
            if let Err(e) = self.corpus.append(entry) {
                tracing::warn!(plot_id, "Failed to record plot in corpus: {}", e);
                verdict
                    .warnings
                    .push("Plot could not be recorded in the corpus".to_string());
            }
        }

        verdict
    }

    fn should_record(&self, status: PlotStatus) -> bool {
        match self.append_policy {
            AppendPolicy::AcceptedOnly => status == PlotStatus::Verified,
            AppendPolicy::Always => status != PlotStatus::Error,
        }
    }
}

impl PlotVerifier for PlotVerificationService {
    fn verify_plot_with_evidence(
        &self,
        boundary: &[LonLat],
        owner_id: &str,
        plot_id: &str,
        photos: &[PhotoReport],
    ) -> EngineResult<PlotVerdict> {
        let parsed = parse_boundary(boundary)?;
        let verdict = self.evaluate(parsed, owner_id, plot_id, photos);

        tracing::info!(
            plot_id,
            owner_id,
            status = %verdict.status,
            confidence = verdict.confidence,
            degraded = verdict.degraded,
            "Plot verified"
        );
        Ok(verdict)
    }
}

/// Accepts every well-formed plot without consulting models or the corpus
#[derive(Debug, Clone, Default)]
pub struct StubPlotVerifier;

impl PlotVerifier for StubPlotVerifier {
    fn verify_plot_with_evidence(
        &self,
        boundary: &[LonLat],
        owner_id: &str,
        plot_id: &str,
        photos: &[PhotoReport],
    ) -> EngineResult<PlotVerdict> {
        let parsed = parse_boundary(boundary)?;
        let mut warnings = vec!["Fraud checks disabled: stub verifier".to_string()];
        let evidence = summarize_evidence(photos, &mut warnings);

        Ok(PlotVerdict {
            plot_id: plot_id.to_string(),
            owner_id: owner_id.to_string(),
            status: PlotStatus::Verified,
            confidence: 1.0,
            reasons: Vec::new(),
            warnings,
            degraded: true,
            features: Some(extract_features(&parsed.polygon)),
            checks: None,
            max_overlap_pct: 0.0,
            similar_plot_ids: Vec::new(),
            evidence,
            evaluated_at: Utc::now(),
        })
    }
}

const LOW_QUALITY_PHOTO: f64 = 0.5;

/// Photo evidence adds warnings but never changes the plot decision
fn summarize_evidence(photos: &[PhotoReport], warnings: &mut Vec<String>) -> Option<EvidenceSummary> {
    if photos.is_empty() {
        return None;
    }

    for (index, photo) in photos.iter().enumerate() {
        if photo.duplicate_flag {
            warnings.push(format!(
                "Photo {} duplicates a previously submitted image ({:.0}% similar)",
                index + 1,
                photo.duplicate_similarity * 100.0
            ));
        }
        if !photo.exif.has_gps {
            warnings.push(format!("Photo {} has no GPS coordinates", index + 1));
        }
        if photo.quality_score < LOW_QUALITY_PHOTO {
            warnings.push(format!(
                "Photo {} has a low quality score ({:.2})",
                index + 1,
                photo.quality_score
            ));
        }
    }

    Some(EvidenceSummary {
        photo_count: photos.len(),
        min_quality_score: photos
            .iter()
            .map(|p| p.quality_score)
            .fold(f64::INFINITY, f64::min),
        duplicate_count: photos.iter().filter(|p| p.duplicate_flag).count(),
        gps_tagged_count: photos.iter().filter(|p| p.exif.has_gps).count(),
        dark_material_detected: photos.iter().any(|p| p.dark_material_detected),
    })
}
