//! Model training from synthetic distributions or batch history

use std::path::Path;

use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use shared::{validate_quantities, Band, BatchReading};

use super::isolation_forest::{quantile, IsolationForest, IsolationForestParams};
use super::scaler::StandardScaler;
use super::{AnomalyDetector, AnomalyScore, ModelError};

pub const AREA_MODEL_NAME: &str = "plot_area";
pub const BATCH_MODEL_NAME: &str = "batch_conversion";

const AREA_SAMPLES: usize = 500;
const AREA_CONTAMINATION: f64 = 0.05;
const BATCH_NORMAL_SAMPLES: usize = 500;
const BATCH_EDGE_SAMPLES: usize = 50;
const BATCH_CONTAMINATION: f64 = 0.1;

/// A trained isolation forest with optional input scaling
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutlierModel {
    pub name: String,
    pub scaler: Option<StandardScaler>,
    pub forest: IsolationForest,
    /// Central training range of the first feature
    pub band: Option<Band>,
    pub trained_on: usize,
    pub trained_at: DateTime<Utc>,
}

impl OutlierModel {
    pub fn fit(
        name: &str,
        samples: &[Vec<f64>],
        params: IsolationForestParams,
        scaled: bool,
    ) -> Result<Self, ModelError> {
        let contamination = params.contamination;
        let scaler = if scaled {
            Some(StandardScaler::fit(samples)?)
        } else {
            None
        };
        let transformed = match &scaler {
            Some(scaler) => samples
                .iter()
                .map(|s| scaler.transform(s))
                .collect::<Result<Vec<_>, _>>()?,
            None => samples.to_vec(),
        };
        let forest = IsolationForest::fit(&transformed, params)?;

        let first: Vec<f64> = samples.iter().filter_map(|s| s.first().copied()).collect();
        let band = Band::new(
            quantile(&first, contamination / 2.0),
            quantile(&first, 1.0 - contamination / 2.0),
        );

        Ok(Self {
            name: name.to_string(),
            scaler,
            forest,
            band: Some(band),
            trained_on: samples.len(),
            trained_at: Utc::now(),
        })
    }
}

impl AnomalyDetector for OutlierModel {
    fn name(&self) -> &str {
        &self.name
    }

    fn score(&self, sample: &[f64]) -> Result<AnomalyScore, ModelError> {
        let raw_score = match &self.scaler {
            Some(scaler) => self.forest.score_sample(&scaler.transform(sample)?)?,
            None => self.forest.score_sample(sample)?,
        };
        Ok(AnomalyScore {
            is_anomaly: self.forest.is_anomaly(raw_score),
            raw_score,
        })
    }

    fn expected_band(&self) -> Option<Band> {
        self.band
    }
}

/// Standard normal draw (Box-Muller)
fn standard_normal(rng: &mut StdRng) -> f64 {
    let u1: f64 = 1.0 - rng.gen::<f64>();
    let u2: f64 = rng.gen();
    (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos()
}

/// Plot areas (ha) drawn from lognormal(mean 1, sigma 0.5)
pub fn synthetic_area_samples(seed: u64) -> Vec<Vec<f64>> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..AREA_SAMPLES)
        .map(|_| vec![(1.0 + 0.5 * standard_normal(&mut rng)).exp()])
        .collect()
}

/// Batch feature vectors: typical retort batches plus near-band edge cases
pub fn synthetic_batch_samples(seed: u64) -> Vec<Vec<f64>> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut samples = Vec::with_capacity(BATCH_NORMAL_SAMPLES + BATCH_EDGE_SAMPLES);

    for _ in 0..BATCH_NORMAL_SAMPLES {
        let biomass = rng.gen_range(200.0..1000.0);
        let ratio = rng.gen_range(0.20..0.30);
        let kiln = f64::from(rng.gen_range(1u8..=2));
        samples.push(vec![biomass, biomass * ratio, ratio, kiln]);
    }
    for _ in 0..BATCH_EDGE_SAMPLES {
        let biomass = rng.gen_range(200.0..1000.0);
        let ratio = rng.gen_range(0.18..0.32);
        let kiln = f64::from(rng.gen_range(1u8..=2));
        samples.push(vec![biomass, biomass * ratio, ratio, kiln]);
    }
    samples
}

pub fn train_area_model(seed: u64, n_estimators: usize) -> Result<OutlierModel, ModelError> {
    let params = IsolationForestParams {
        n_estimators,
        contamination: AREA_CONTAMINATION,
        seed,
        ..IsolationForestParams::default()
    };
    OutlierModel::fit(AREA_MODEL_NAME, &synthetic_area_samples(seed), params, false)
}

pub fn train_batch_model(
    samples: &[Vec<f64>],
    seed: u64,
    n_estimators: usize,
) -> Result<OutlierModel, ModelError> {
    let params = IsolationForestParams {
        n_estimators,
        contamination: BATCH_CONTAMINATION,
        seed,
        ..IsolationForestParams::default()
    };
    OutlierModel::fit(BATCH_MODEL_NAME, samples, params, true)
}

/// Read historical batches (`biomass_in,char_out,category`) as feature vectors
///
/// Rows that fail quantity validation are skipped.
pub fn load_batch_history(path: &Path) -> Result<Vec<Vec<f64>>, ModelError> {
    let mut reader = csv::Reader::from_path(path)
        .map_err(|e| ModelError::Training(format!("cannot open {}: {}", path.display(), e)))?;

    let mut samples = Vec::new();
    for (row, record) in reader.deserialize::<BatchReading>().enumerate() {
        let reading =
            record.map_err(|e| ModelError::Training(format!("row {}: {}", row + 1, e)))?;
        if let Err(reason) = validate_quantities(reading.biomass_in, reading.char_out) {
            tracing::warn!(row = row + 1, reason, "Skipping invalid batch history row");
            continue;
        }
        samples.push(reading.feature_vector().to_vec());
    }

    if samples.len() < 2 {
        return Err(ModelError::Training(format!(
            "{} has too few valid rows ({})",
            path.display(),
            samples.len()
        )));
    }
    Ok(samples)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_synthetic_areas_are_deterministic() {
        let a = synthetic_area_samples(42);
        let b = synthetic_area_samples(42);
        assert_eq!(a, b);
        assert_eq!(a.len(), AREA_SAMPLES);
        assert!(a.iter().all(|s| s[0] > 0.0));

        // lognormal(1, 0.5) has median e ≈ 2.72 ha
        let median = quantile(&a.iter().map(|s| s[0]).collect::<Vec<_>>(), 0.5);
        assert!((2.0..3.5).contains(&median));
    }

    #[test]
    fn test_synthetic_batches_cover_band() {
        let samples = synthetic_batch_samples(42);
        assert_eq!(samples.len(), BATCH_NORMAL_SAMPLES + BATCH_EDGE_SAMPLES);
        assert!(samples.iter().all(|s| (0.18..0.32).contains(&s[2])));
        assert!(samples.iter().all(|s| s[3] == 1.0 || s[3] == 2.0));
    }

    #[test]
    fn test_area_model_flags_extremes() {
        let model = train_area_model(42, 100).unwrap();
        assert!(!model.score(&[2.5]).unwrap().is_anomaly);
        assert!(model.score(&[500.0]).unwrap().is_anomaly);
        assert!(model.score(&[500.0]).unwrap().raw_score < model.score(&[2.5]).unwrap().raw_score);

        let band = model.expected_band().unwrap();
        assert!(band.min < 2.5 && 2.5 < band.max);
    }

    #[test]
    fn test_batch_model_scales_features() {
        let model = train_batch_model(&synthetic_batch_samples(42), 42, 100).unwrap();
        assert!(model.scaler.is_some());
        let typical = model.score(&[600.0, 150.0, 0.25, 1.0]).unwrap();
        let extreme = model.score(&[600.0, 540.0, 0.9, 4.0]).unwrap();
        assert!(extreme.raw_score < typical.raw_score);
        assert!(extreme.is_anomaly);
        assert!(matches!(
            model.score(&[1.0, 2.0]),
            Err(ModelError::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn test_load_batch_history_skips_invalid_rows() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "biomass_in,char_out,category").unwrap();
        writeln!(file, "500,125,TLUD").unwrap();
        writeln!(file, "0,10,TLUD").unwrap();
        writeln!(file, "800,200,Batch Retort Kiln").unwrap();
        file.flush().unwrap();

        let samples = load_batch_history(file.path()).unwrap();
        assert_eq!(samples.len(), 2);
        assert_eq!(samples[0], vec![500.0, 125.0, 0.25, 3.0]);
    }
}
