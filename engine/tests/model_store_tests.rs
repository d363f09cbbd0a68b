//! Tests for model loading, persistence and degraded operation

use std::sync::Arc;

use mrv_engine::config::{Config, ModelBackend, ModelsConfig};
use mrv_engine::ml::{AnomalyDetector, ModelStore, AREA_MODEL_NAME, BATCH_MODEL_NAME};
use mrv_engine::{InMemoryCorpus, VerificationEngine};
use shared::{LonLat, PlotStatus};

fn models_config(dir: &std::path::Path) -> ModelsConfig {
    ModelsConfig {
        dir: dir.to_path_buf(),
        n_estimators: 30,
        ..ModelsConfig::default()
    }
}

fn small_square() -> Vec<LonLat> {
    vec![
        LonLat::new(30.0, 10.0),
        LonLat::new(30.01, 10.0),
        LonLat::new(30.01, 10.01),
        LonLat::new(30.0, 10.01),
    ]
}

// =============================================================================
// Persistence Tests
// =============================================================================

mod persistence {
    use super::*;

    #[test]
    fn trained_models_are_saved_and_reloaded() {
        let dir = tempfile::tempdir().unwrap();
        let config = models_config(dir.path());

        let first = ModelStore::load(&config);
        assert!(dir.path().join(format!("{}.mrvm", AREA_MODEL_NAME)).exists());
        assert!(dir.path().join(format!("{}.mrvm", BATCH_MODEL_NAME)).exists());

        let second = ModelStore::load(&config);
        for area_ha in [0.05, 1.0, 2.7, 8.0, 500.0] {
            let a = first.area().unwrap().score(&[area_ha]).unwrap();
            let b = second.area().unwrap().score(&[area_ha]).unwrap();
            assert_eq!(a, b);
        }

        let batch = [600.0, 150.0, 0.25, 1.0];
        assert_eq!(
            first.batch().unwrap().score(&batch).unwrap(),
            second.batch().unwrap().score(&batch).unwrap()
        );
    }

    #[test]
    fn corrupt_blob_degrades_instead_of_retraining() {
        let dir = tempfile::tempdir().unwrap();
        let blob_path = dir.path().join(format!("{}.mrvm", AREA_MODEL_NAME));
        std::fs::write(&blob_path, b"MRVM garbage").unwrap();

        let store = ModelStore::load(&models_config(dir.path()));
        assert!(!store.area_slot().is_ready());
        assert!(store.batch_slot().is_ready());
        assert_eq!(std::fs::read(&blob_path).unwrap(), b"MRVM garbage");
    }

    #[test]
    fn stub_backend_skips_training() {
        let dir = tempfile::tempdir().unwrap();
        let store = ModelStore::load(&ModelsConfig {
            backend: ModelBackend::Stub,
            ..models_config(dir.path())
        });
        let score = store.area().unwrap().score(&[1.0e6]).unwrap();
        assert!(!score.is_anomaly);
        assert!(!dir.path().join(format!("{}.mrvm", AREA_MODEL_NAME)).exists());
    }
}

// =============================================================================
// Degraded Operation Tests
// =============================================================================

mod degraded {
    use super::*;

    #[test]
    fn missing_area_model_uses_fixed_band() {
        let engine = VerificationEngine::new(
            Config::default(),
            &ModelStore::unavailable("no models"),
            Arc::new(InMemoryCorpus::new()),
        )
        .unwrap();

        // 0.01° square is about 124 ha, outside the 0.1..10 ha fallback band
        let verdict = engine.verify_plot(&small_square(), "F1", "P1").unwrap();
        assert!(verdict.degraded);
        assert_eq!(verdict.status, PlotStatus::Suspicious);
        assert!(verdict.reasons[0].starts_with("Unusually large plot"));
        assert!(verdict
            .warnings
            .contains(&"Area model unavailable: fixed area band used".to_string()));

        let area = verdict.checks.unwrap().area;
        assert!(area.degraded);
        assert_eq!(area.score, 0.0);
    }

    #[test]
    fn learned_area_model_scores_typical_plots_higher() {
        let dir = tempfile::tempdir().unwrap();
        let store = ModelStore::load(&models_config(dir.path()));
        let model = store.area().unwrap();

        let typical = model.score(&[2.7]).unwrap();
        let huge = model.score(&[5000.0]).unwrap();
        assert!(!typical.is_anomaly);
        assert!(huge.is_anomaly);
        assert!(huge.raw_score < typical.raw_score);
        assert!(model.expected_band().unwrap().contains(2.7));
    }
}
