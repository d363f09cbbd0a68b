//! Tests for the plot verification path
//! Covers end-to-end plot scenarios, detector properties and degraded modes

use std::sync::Arc;

use mrv_engine::config::{AppendPolicy, Config, CorpusBackend, ModelBackend};
use mrv_engine::detectors::{overlap_pct, shape_similarity};
use mrv_engine::ml::training::train_area_model;
use mrv_engine::ml::{AnomalyDetector, ModelSlot, ModelStore};
use mrv_engine::{InMemoryCorpus, PlotCorpus, VerificationEngine};
use proptest::prelude::*;
use shared::{parse_boundary, LonLat, PlotPolygon, PlotStatus};

fn unit_square() -> Vec<LonLat> {
    vec![
        LonLat::new(0.0, 0.0),
        LonLat::new(1.0, 0.0),
        LonLat::new(1.0, 1.0),
        LonLat::new(0.0, 1.0),
    ]
}

fn small_square(lon: f64, lat: f64) -> Vec<LonLat> {
    let size = 0.01;
    vec![
        LonLat::new(lon, lat),
        LonLat::new(lon + size, lat),
        LonLat::new(lon + size, lat + size),
        LonLat::new(lon, lat + size),
    ]
}

fn stub_engine(config: Config) -> (VerificationEngine, Arc<InMemoryCorpus>) {
    let corpus = Arc::new(InMemoryCorpus::new());
    let engine = VerificationEngine::new(config, &ModelStore::stub(), corpus.clone()).unwrap();
    (engine, corpus)
}

/// Star-shaped polygon: one vertex per equal angle step, varying radius
fn star_polygon(center: (f64, f64), radii: &[f64]) -> PlotPolygon {
    let step = std::f64::consts::TAU / radii.len() as f64;
    let vertices: Vec<LonLat> = radii
        .iter()
        .enumerate()
        .map(|(i, r)| {
            let angle = step * i as f64;
            LonLat::new(center.0 + r * angle.cos(), center.1 + r * angle.sin())
        })
        .collect();
    parse_boundary(&vertices).unwrap().polygon
}

// =============================================================================
// End-to-end Scenarios
// Unit square submitted twice by the same owner
// =============================================================================

mod scenarios {
    use super::*;

    #[test]
    fn scenario_a_first_submission_is_verified() {
        let (engine, corpus) = stub_engine(Config::default());

        let verdict = engine.verify_plot(&unit_square(), "F1", "P1").unwrap();

        assert_eq!(verdict.status, PlotStatus::Verified);
        assert_eq!(verdict.confidence, 1.0);
        assert!(verdict.reasons.is_empty());
        assert!(!verdict.degraded);
        assert_eq!(corpus.len().unwrap(), 1);
    }

    #[test]
    fn scenario_b_resubmission_is_suspicious() {
        let (engine, _corpus) = stub_engine(Config::default());
        engine.verify_plot(&unit_square(), "F1", "P1").unwrap();

        let verdict = engine.verify_plot(&unit_square(), "F1", "P2").unwrap();

        assert_eq!(verdict.status, PlotStatus::Suspicious);
        assert!(verdict.confidence < 1.0);
        assert_eq!(verdict.similar_plot_ids, vec!["P1".to_string()]);
        assert!(verdict.reasons.iter().any(|r| r.contains("P1")));
        assert!(verdict
            .reasons
            .contains(&"Overlaps with 1 existing plot(s)".to_string()));
    }

    #[test]
    fn learned_area_model_flags_unit_square() {
        // A 1° square is about 1.24 million ha
        let store = ModelStore::new(
            ModelSlot::Ready(Arc::new(train_area_model(42, 50).unwrap())),
            ModelSlot::Unavailable("unused".into()),
        );
        let engine =
            VerificationEngine::new(Config::default(), &store, Arc::new(InMemoryCorpus::new()))
                .unwrap();

        let verdict = engine.verify_plot(&unit_square(), "F1", "P1").unwrap();
        assert_eq!(verdict.status, PlotStatus::Suspicious);
        assert!(verdict.reasons[0].starts_with("Unusually large plot"));
        assert!((verdict.confidence - 0.7).abs() < 1e-12);
    }

    #[test]
    fn malformed_boundary_is_rejected() {
        let (engine, corpus) = stub_engine(Config::default());
        let err = engine
            .verify_plot(&[LonLat::new(0.0, 0.0), LonLat::new(1.0, 1.0)], "F1", "P1")
            .unwrap_err();
        assert_eq!(err.code(), "MALFORMED_GEOMETRY");
        assert!(corpus.is_empty().unwrap());
    }

    #[test]
    fn self_intersecting_boundary_is_repaired() {
        let (engine, _corpus) = stub_engine(Config::default());
        let bowtie = vec![
            LonLat::new(30.0, 10.0),
            LonLat::new(30.03, 10.03),
            LonLat::new(30.03, 10.0),
            LonLat::new(30.0, 10.01),
        ];

        let verdict = engine.verify_plot(&bowtie, "F1", "P1").unwrap();
        assert_eq!(verdict.status, PlotStatus::Verified);
        assert!(verdict
            .warnings
            .contains(&"Boundary self-intersected and was repaired".to_string()));
        assert!(verdict.features.unwrap().area_ha > 0.0);
    }

    #[test]
    fn geojson_feature_submission() {
        let (engine, _corpus) = stub_engine(Config::default());
        let geojson = r#"{
            "type": "Feature",
            "properties": {"name": "north field"},
            "geometry": {
                "type": "Polygon",
                "coordinates": [[[30.0, 10.0], [30.01, 10.0], [30.01, 10.01], [30.0, 10.01], [30.0, 10.0]]]
            }
        }"#;
        let verdict = engine.verify_plot_geojson(geojson, "F1", "P1").unwrap();
        assert_eq!(verdict.status, PlotStatus::Verified);
        let features = verdict.features.unwrap();
        assert_eq!(features.vertex_count, 4);
    }
}

// =============================================================================
// Corpus Policy Tests
// Which verdicts enter the comparison corpus
// =============================================================================

mod corpus_policy {
    use super::*;

    #[test]
    fn suspicious_plots_stay_out_by_default() {
        let (engine, corpus) = stub_engine(Config::default());
        engine.verify_plot(&small_square(30.0, 10.0), "F1", "P1").unwrap();
        engine.verify_plot(&small_square(30.0, 10.0), "F2", "P2").unwrap();
        engine.verify_plot(&small_square(30.0, 10.0), "F3", "P3").unwrap();

        let ids: Vec<String> = corpus
            .snapshot()
            .unwrap()
            .iter()
            .map(|e| e.plot_id.clone())
            .collect();
        assert_eq!(ids, vec!["P1".to_string()]);
    }

    #[test]
    fn always_policy_records_every_plot() {
        let mut config = Config::default();
        config.plot.append_policy = AppendPolicy::Always;
        let (engine, corpus) = stub_engine(config);

        engine.verify_plot(&small_square(30.0, 10.0), "F1", "P1").unwrap();
        let second = engine.verify_plot(&small_square(30.0, 10.0), "F2", "P2").unwrap();
        let third = engine.verify_plot(&small_square(30.0, 10.0), "F3", "P3").unwrap();

        assert_eq!(corpus.len().unwrap(), 3);
        assert_eq!(second.similar_plot_ids, vec!["P1".to_string()]);
        assert_eq!(
            third.similar_plot_ids,
            vec!["P1".to_string(), "P2".to_string()]
        );
    }

    #[test]
    fn concurrent_duplicates_see_each_other() {
        let (engine, corpus) = stub_engine(Config::default());
        let engine = Arc::new(engine);

        let verdicts: Vec<_> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..8)
                .map(|i| {
                    let engine = engine.clone();
                    scope.spawn(move || {
                        let owner = format!("F{}", i);
                        let plot = format!("P{}", i);
                        engine
                            .verify_plot(&small_square(30.0, 10.0), &owner, &plot)
                            .unwrap()
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        let verified = verdicts.iter().filter(|v| v.is_verified()).count();
        assert_eq!(verified, 1);
        assert_eq!(corpus.len().unwrap(), 1);
    }

    #[test]
    fn jsonl_corpus_persists_between_engines() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.models.backend = ModelBackend::Stub;
        config.corpus.backend = CorpusBackend::Jsonl;
        config.corpus.path = dir.path().join("corpus.jsonl");

        {
            let engine = VerificationEngine::from_config(config.clone()).unwrap();
            let first = engine.verify_plot(&small_square(30.0, 10.0), "F1", "P1").unwrap();
            assert!(first.is_verified());
        }

        let engine = VerificationEngine::from_config(config).unwrap();
        let again = engine.verify_plot(&small_square(30.0, 10.0), "F2", "P2").unwrap();
        assert_eq!(again.status, PlotStatus::Suspicious);
        assert_eq!(again.similar_plot_ids, vec!["P1".to_string()]);
    }
}

// =============================================================================
// Density Tests
// Same-owner clustering only activates after enough history
// =============================================================================

mod density {
    use super::*;

    #[test]
    fn owner_with_many_nearby_plots_is_flagged() {
        let mut config = Config::default();
        config.plot.append_policy = AppendPolicy::Always;
        let (engine, _corpus) = stub_engine(config);

        // Twelve small, non-overlapping plots within ~600 m
        let plot = |i: usize| {
            let lon = 30.0 + i as f64 * 0.0005;
            vec![
                LonLat::new(lon, 10.0),
                LonLat::new(lon + 0.0004, 10.0),
                LonLat::new(lon + 0.0004, 10.0004),
                LonLat::new(lon, 10.0004),
            ]
        };

        let mut verdicts = Vec::new();
        for i in 0..12 {
            verdicts.push(engine.verify_plot(&plot(i), "F1", &format!("P{}", i)).unwrap());
        }

        let early = verdicts[3].checks.as_ref().unwrap().density.clone().unwrap();
        assert!(!early.active);
        assert_eq!(early.owner_plot_count, 3);

        let last = verdicts.last().unwrap();
        assert_eq!(last.max_overlap_pct, 0.0);
        let density = last.checks.as_ref().unwrap().density.clone().unwrap();
        assert!(density.active);
        assert!(density.is_suspicious);
        assert_eq!(density.owner_plot_count, 11);
        assert_eq!(density.cluster_size, 12);
        assert!(last
            .reasons
            .contains(&"12 plots within 1km radius".to_string()));
    }

    #[test]
    fn other_owners_do_not_count() {
        let mut config = Config::default();
        config.plot.append_policy = AppendPolicy::Always;
        let (engine, _corpus) = stub_engine(config);

        for i in 0..12 {
            let lon = 30.0 + i as f64 * 0.0005;
            let boundary = vec![
                LonLat::new(lon, 10.0),
                LonLat::new(lon + 0.0004, 10.0),
                LonLat::new(lon + 0.0004, 10.0004),
                LonLat::new(lon, 10.0004),
            ];
            engine
                .verify_plot(&boundary, &format!("F{}", i), &format!("P{}", i))
                .unwrap();
        }

        let verdict = engine
            .verify_plot(&small_square(31.0, 10.0), "F0", "P-new")
            .unwrap();
        let density = verdict.checks.unwrap().density.unwrap();
        assert_eq!(density.owner_plot_count, 1);
        assert!(!density.is_suspicious);
    }
}

// =============================================================================
// Detector Properties
// Identity of shape similarity and zero overlap of disjoint plots
// =============================================================================

mod detector_properties {
    use super::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn shape_similarity_identity(
            radii in prop::collection::vec(0.5f64..2.0, 3..12),
            lon in -170.0f64..170.0,
            lat in -80.0f64..80.0,
        ) {
            let polygon = star_polygon((lon, lat), &radii);
            prop_assert_eq!(shape_similarity(&polygon, &polygon), 1.0);
        }

        #[test]
        fn disjoint_plots_do_not_overlap(
            radii_a in prop::collection::vec(0.5f64..2.0, 3..10),
            radii_b in prop::collection::vec(0.5f64..2.0, 3..10),
            gap in 4.5f64..50.0,
        ) {
            let a = star_polygon((0.0, 0.0), &radii_a);
            let b = star_polygon((gap, 0.0), &radii_b);
            prop_assert_eq!(overlap_pct(&a, &b), 0.0);
            prop_assert_eq!(overlap_pct(&b, &a), 0.0);
        }

        #[test]
        fn area_scoring_is_deterministic(area_ha in 0.01f64..10_000.0) {
            let model = train_area_model(7, 20).unwrap();
            let first = model.score(&[area_ha]).unwrap();
            let second = model.score(&[area_ha]).unwrap();
            prop_assert_eq!(first, second);
        }
    }
}
