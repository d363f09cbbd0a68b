//! Verification engine facade
//!
//! Owns the configured services and the registry of photo fingerprints seen
//! so far, and exposes one entry point per submission kind.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use shared::{
    parse_boundary, parse_geojson_boundary, parse_kml_coordinates, validate_identifier,
    BatchVerdict, LonLat, PhotoReport, PlotVerdict,
};

use crate::config::{Config, VerifierMode};
use crate::corpus::{self, PlotCorpus, UnavailableCorpus};
use crate::error::{EngineError, EngineResult};
use crate::ml::ModelStore;
use crate::services::photo::{closest_duplicate, parse_hash};
use crate::services::{
    invalid_boundary, BatchAnomalyService, PhotoIntegrityAnalyzer, PlotVerificationService,
    PlotVerifier, StubPlotVerifier,
};

pub struct VerificationEngine {
    config: Arc<Config>,
    plots: Arc<dyn PlotVerifier>,
    batches: BatchAnomalyService,
    photos: PhotoIntegrityAnalyzer,
    seen_hashes: Mutex<HashSet<u64>>,
}

impl VerificationEngine {
    /// Build an engine around an already loaded model store and corpus
    pub fn new(config: Config, models: &ModelStore, corpus: Arc<dyn PlotCorpus>) -> EngineResult<Self> {
        config.validate()?;

        let plots: Arc<dyn PlotVerifier> = match config.plot.verifier {
            VerifierMode::Full => Arc::new(PlotVerificationService::new(&config.plot, models, corpus)),
            VerifierMode::Stub => {
                tracing::warn!("Plot fraud checks disabled (stub verifier)");
                Arc::new(StubPlotVerifier)
            }
        };

        Ok(Self {
            batches: BatchAnomalyService::new(&config.batch, models),
            photos: PhotoIntegrityAnalyzer::new(&config.photo),
            plots,
            seen_hashes: Mutex::new(HashSet::new()),
            config: Arc::new(config),
        })
    }

    /// Load models and open the corpus named by the configuration
    ///
    /// A corpus that cannot be opened does not stop the engine: plot verdicts
    /// skip the comparison checks and come back degraded.
    pub fn from_config(config: Config) -> EngineResult<Self> {
        config.validate()?;
        let models = ModelStore::load(&config.models);
        let corpus = corpus::open(&config.corpus).unwrap_or_else(|e| {
            tracing::error!(path = %config.corpus.path.display(), "Plot corpus unavailable: {}", e);
            Arc::new(UnavailableCorpus::new(e.to_string())) as Arc<dyn PlotCorpus>
        });
        Self::new(config, &models, corpus)
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn verify_plot(&self, boundary: &[LonLat], owner_id: &str, plot_id: &str) -> EngineResult<PlotVerdict> {
        check_ids(owner_id, plot_id)?;
        self.plots.verify_plot(boundary, owner_id, plot_id)
    }

    /// Verify a plot together with its evidence photos
    ///
    /// The boundary is validated first so a rejected submission does not
    /// register its photos; then photos are analyzed before the plot.
    pub fn verify_plot_with_evidence(
        &self,
        boundary: &[LonLat],
        owner_id: &str,
        plot_id: &str,
        photos: &[Vec<u8>],
    ) -> EngineResult<PlotVerdict> {
        check_ids(owner_id, plot_id)?;
        parse_boundary(boundary)?;
        let reports = self.analyze_evidence(photos);
        self.plots
            .verify_plot_with_evidence(boundary, owner_id, plot_id, &reports)
    }

    /// Like `verify_plot_with_evidence`, but malformed geometry yields an error verdict
    pub fn plot_verdict(
        &self,
        boundary: &[LonLat],
        owner_id: &str,
        plot_id: &str,
        photos: &[Vec<u8>],
    ) -> EngineResult<PlotVerdict> {
        check_ids(owner_id, plot_id)?;
        if let Err(e) = parse_boundary(boundary) {
            return Ok(invalid_boundary(plot_id, owner_id, &e));
        }
        let reports = self.analyze_evidence(photos);
        self.plots.verdict(boundary, owner_id, plot_id, &reports)
    }

    /// Verify a KML boundary; unreadable files give an error verdict
    pub fn verify_plot_kml(&self, kml: &str, owner_id: &str, plot_id: &str) -> EngineResult<PlotVerdict> {
        check_ids(owner_id, plot_id)?;
        match parse_kml_coordinates(kml) {
            Ok(boundary) => self.plots.verdict(&boundary, owner_id, plot_id, &[]),
            Err(e) => Ok(invalid_boundary(plot_id, owner_id, &e)),
        }
    }

    /// Verify a GeoJSON boundary; unreadable documents give an error verdict
    pub fn verify_plot_geojson(
        &self,
        geojson: &str,
        owner_id: &str,
        plot_id: &str,
    ) -> EngineResult<PlotVerdict> {
        check_ids(owner_id, plot_id)?;
        match parse_geojson_boundary(geojson) {
            Ok(boundary) => self.plots.verdict(&boundary, owner_id, plot_id, &[]),
            Err(e) => Ok(invalid_boundary(plot_id, owner_id, &e)),
        }
    }

    pub fn evaluate_batch(
        &self,
        biomass_in: f64,
        char_out: f64,
        category: &str,
    ) -> EngineResult<BatchVerdict> {
        self.batches.evaluate_batch(biomass_in, char_out, category)
    }

    /// Analyze a photo against `known_hashes` and every fingerprint seen so far
    ///
    /// Only the registry lookup and insert run under the lock; together they
    /// are atomic, so identical photos submitted concurrently are still caught.
    pub fn analyze_photo(&self, image_bytes: &[u8], known_hashes: &[String]) -> PhotoReport {
        let threshold = self.config.photo.duplicate_hamming_threshold;
        self.photos.analyze_with(image_bytes, |hash| {
            let mut seen = self
                .seen_hashes
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            let supplied = known_hashes.iter().filter_map(|h| parse_hash(h));
            let duplicate = closest_duplicate(hash, supplied.chain(seen.iter().copied()), threshold);
            seen.insert(hash);
            duplicate
        })
    }

    fn analyze_evidence(&self, photos: &[Vec<u8>]) -> Vec<PhotoReport> {
        photos.iter().map(|bytes| self.analyze_photo(bytes, &[])).collect()
    }

    pub fn seen_photo_count(&self) -> usize {
        self.seen_hashes
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }
}

fn check_ids(owner_id: &str, plot_id: &str) -> EngineResult<()> {
    validate_identifier(owner_id)
        .and_then(|_| validate_identifier(plot_id))
        .map_err(|e| EngineError::InvalidRequest(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CorpusBackend, ModelBackend};
    use crate::corpus::InMemoryCorpus;
    use shared::PlotStatus;

    fn engine() -> VerificationEngine {
        VerificationEngine::new(
            Config::default(),
            &ModelStore::stub(),
            Arc::new(InMemoryCorpus::new()),
        )
        .unwrap()
    }

    #[test]
    fn test_invalid_config_rejected() {
        let mut config = Config::default();
        config.plot.min_overlap_pct = 250.0;
        let result = VerificationEngine::new(config, &ModelStore::stub(), Arc::new(InMemoryCorpus::new()));
        assert!(result.is_err());
    }

    #[test]
    fn test_kml_submission() {
        let kml = r#"<Placemark><Polygon><outerBoundaryIs><LinearRing>
            <coordinates>30.0,10.0,0 30.01,10.0,0 30.01,10.01,0 30.0,10.01,0 30.0,10.0,0</coordinates>
        </LinearRing></outerBoundaryIs></Polygon></Placemark>"#;
        let verdict = engine().verify_plot_kml(kml, "F1", "P1").unwrap();
        assert_eq!(verdict.status, PlotStatus::Verified);
    }

    #[test]
    fn test_stub_verifier_mode() {
        let mut config = Config::default();
        config.plot.verifier = VerifierMode::Stub;
        let engine =
            VerificationEngine::new(config, &ModelStore::stub(), Arc::new(InMemoryCorpus::new()))
                .unwrap();
        let boundary = [
            LonLat::new(0.0, 0.0),
            LonLat::new(1.0, 0.0),
            LonLat::new(1.0, 1.0),
        ];
        let verdict = engine.verify_plot(&boundary, "F1", "P1").unwrap();
        assert!(verdict.checks.is_none());
        assert!(verdict.degraded);
    }

    #[test]
    fn test_blank_identifiers_rejected() {
        let boundary = [
            LonLat::new(0.0, 0.0),
            LonLat::new(1.0, 0.0),
            LonLat::new(1.0, 1.0),
        ];
        let err = engine().verify_plot(&boundary, " ", "P1").unwrap_err();
        assert_eq!(err.code(), "INVALID_REQUEST");
        let err = engine().plot_verdict(&boundary, "F1", "", &[]).unwrap_err();
        assert_eq!(err.code(), "INVALID_REQUEST");
    }

    #[test]
    fn test_unreadable_photo_is_not_registered() {
        let engine = engine();
        let report = engine.analyze_photo(b"nope", &[]);
        assert_eq!(report.quality_score, 0.0);
        assert_eq!(engine.seen_photo_count(), 0);
    }

    fn jsonl_config(path: &std::path::Path) -> Config {
        let mut config = Config::default();
        config.models.backend = ModelBackend::Stub;
        config.corpus.backend = CorpusBackend::Jsonl;
        config.corpus.path = path.to_path_buf();
        config
    }

    fn small_square(lon: f64) -> Vec<LonLat> {
        vec![
            LonLat::new(lon, 10.0),
            LonLat::new(lon + 0.01, 10.0),
            LonLat::new(lon + 0.01, 10.01),
            LonLat::new(lon, 10.01),
        ]
    }

    #[test]
    fn test_starts_after_torn_corpus_write() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("corpus.jsonl");
        {
            let engine = VerificationEngine::from_config(jsonl_config(&path)).unwrap();
            engine.verify_plot(&small_square(30.0), "F1", "P1").unwrap();
        }
        let intact = std::fs::read(&path).unwrap();
        let mut torn = intact.clone();
        torn.extend_from_slice(&intact[..intact.len() / 2]);
        std::fs::write(&path, torn).unwrap();

        let engine = VerificationEngine::from_config(jsonl_config(&path)).unwrap();
        let verdict = engine.verify_plot(&small_square(30.0), "F2", "P2").unwrap();
        assert!(!verdict.degraded);
        assert_eq!(verdict.status, PlotStatus::Suspicious);
        assert_eq!(verdict.similar_plot_ids, vec!["P1".to_string()]);
    }

    #[test]
    fn test_unreadable_corpus_degrades_plot_checks() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("corpus.jsonl");
        std::fs::write(&path, "{\"plot_id\": 3}\n").unwrap();

        let engine = VerificationEngine::from_config(jsonl_config(&path)).unwrap();
        let verdict = engine.verify_plot(&small_square(30.0), "F1", "P1").unwrap();
        assert!(verdict.degraded);
        assert!(verdict.checks.unwrap().shape.is_none());
        // The damaged file is left for an operator to inspect
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "{\"plot_id\": 3}\n");
    }

    #[test]
    fn test_unreadable_boundary_files_give_error_verdicts() {
        let engine = engine();

        let verdict = engine.verify_plot_kml("<Placemark/>", "F1", "K1").unwrap();
        assert_eq!(verdict.status, PlotStatus::Error);
        assert!(verdict.reasons[0].starts_with("Invalid boundary"));

        let verdict = engine
            .verify_plot_kml("<coordinates>0,0 1,0</coordinates>", "F1", "K2")
            .unwrap();
        assert_eq!(verdict.status, PlotStatus::Error);

        let verdict = engine.verify_plot_geojson("{not json", "F1", "G1").unwrap();
        assert_eq!(verdict.status, PlotStatus::Error);
        assert_eq!(verdict.confidence, 0.0);
    }
}
