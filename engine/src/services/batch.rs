//! Batch anomaly service
//!
//! Combines the fixed conversion-ratio rule with the learned batch model.
//! Either signal flags the batch; when the model cannot score, the verdict is
//! rule-only and says so.

use std::sync::Arc;

use chrono::Utc;
use shared::{
    check_conversion_ratio, validate_quantities, Band, BatchReading, BatchStatus, BatchVerdict,
    KilnType,
};

use crate::config::BatchConfig;
use crate::error::{EngineError, EngineResult};
use crate::ml::{AnomalyDetector, ModelStore};

const SMALL_BATCH_KG: f64 = 100.0;
const LARGE_BATCH_KG: f64 = 2000.0;

/// Raw scores are mapped to confidence by -score / 1.5, clamped to [0, 1]
const CONFIDENCE_SCALE: f64 = 1.5;

#[derive(Debug, Clone)]
pub struct BatchAnomalyService {
    config: BatchConfig,
    model: Result<Arc<dyn AnomalyDetector>, String>,
}

impl BatchAnomalyService {
    pub fn new(config: &BatchConfig, models: &ModelStore) -> Self {
        let model = models.batch().map_err(|e| {
            tracing::warn!("Batch model unavailable, rule-only evaluation: {}", e);
            e.to_string()
        });
        Self {
            config: config.clone(),
            model,
        }
    }

    /// Ratio band for a kiln type, falling back to the default band
    pub fn ratio_band_for(&self, kiln: &KilnType) -> Band {
        self.config
            .category_bands
            .get(&kiln.key())
            .copied()
            .unwrap_or(self.config.ratio_band)
    }

    pub fn evaluate_batch(
        &self,
        biomass_in: f64,
        char_out: f64,
        category: &str,
    ) -> EngineResult<BatchVerdict> {
        self.evaluate(&BatchReading::new(biomass_in, char_out, category))
    }

    pub fn evaluate(&self, reading: &BatchReading) -> EngineResult<BatchVerdict> {
        validate_quantities(reading.biomass_in, reading.char_out)
            .map_err(|e| EngineError::InvalidQuantity(e.to_string()))?;

        let kiln_type = reading.kiln_type();
        let ratio = reading.ratio();
        let ratio_band = self.ratio_band_for(&kiln_type);
        let rule_status = check_conversion_ratio(ratio, &ratio_band);

        let scored = self
            .model
            .as_ref()
            .map_err(|reason| reason.clone())
            .and_then(|model| {
                model
                    .score(&reading.feature_vector())
                    .map_err(|e| e.to_string())
            });

        let (ml_status, confidence, anomaly_score) = match &scored {
            Ok(score) => (
                if score.is_anomaly {
                    BatchStatus::Flagged
                } else {
                    BatchStatus::Verified
                },
                (-score.raw_score / CONFIDENCE_SCALE).clamp(0.0, 1.0),
                score.raw_score,
            ),
            Err(_) => (BatchStatus::Error, 0.0, 0.0),
        };

        let combined_status =
            if rule_status == BatchStatus::Flagged || ml_status == BatchStatus::Flagged {
                BatchStatus::Flagged
            } else {
                BatchStatus::Verified
            };

        let mut parts = explain(reading, ratio, &ratio_band, confidence);
        if let Err(reason) = &scored {
            tracing::warn!("Batch model failed, rule-only verdict: {}", reason);
            parts.push("ML check unavailable: rule-only evaluation".to_string());
        }

        let verdict = BatchVerdict {
            rule_status,
            ml_status,
            combined_status,
            confidence,
            anomaly_score,
            ratio,
            co2_equivalent_kg: reading.co2_equivalent_kg(),
            ratio_band,
            kiln_type,
            explanation: parts.join(" | "),
            evaluated_at: Utc::now(),
        };

        tracing::info!(
            ratio,
            rule = %verdict.rule_status,
            ml = %verdict.ml_status,
            combined = %verdict.combined_status,
            "Batch evaluated"
        );
        Ok(verdict)
    }
}

fn explain(reading: &BatchReading, ratio: f64, band: &Band, confidence: f64) -> Vec<String> {
    let mut parts = Vec::new();

    let pct = ratio * 100.0;
    if ratio < band.min {
        parts.push(format!("Very low ratio ({:.2}%)", pct));
    } else if ratio > band.max {
        parts.push(format!("Very high ratio ({:.2}%)", pct));
    } else {
        parts.push(format!("Ratio within normal range ({:.2}%)", pct));
    }

    if reading.biomass_in < SMALL_BATCH_KG {
        parts.push("Small batch volume".to_string());
    } else if reading.biomass_in > LARGE_BATCH_KG {
        parts.push("Large batch volume".to_string());
    }

    if confidence > 0.7 {
        parts.push("High anomaly confidence".to_string());
    } else if confidence > 0.4 {
        parts.push("Moderate anomaly signal".to_string());
    }

    parts
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ml::training::{synthetic_batch_samples, train_batch_model};
    use crate::ml::ModelSlot;
    use rust_decimal::Decimal;

    fn stub_service() -> BatchAnomalyService {
        BatchAnomalyService::new(&BatchConfig::default(), &ModelStore::stub())
    }

    #[test]
    fn test_typical_batch_is_verified() {
        let verdict = stub_service().evaluate_batch(500.0, 125.0, "TLUD").unwrap();
        assert_eq!(verdict.rule_status, BatchStatus::Verified);
        assert_eq!(verdict.ml_status, BatchStatus::Verified);
        assert_eq!(verdict.combined_status, BatchStatus::Verified);
        assert_eq!(verdict.co2_equivalent_kg, Decimal::new(36667, 2));
        assert_eq!(verdict.kiln_type, KilnType::Tlud);
        assert_eq!(verdict.explanation, "Ratio within normal range (25.00%)");
    }

    #[test]
    fn test_rule_alone_flags() {
        let verdict = stub_service().evaluate_batch(500.0, 50.0, "TLUD").unwrap();
        assert_eq!(verdict.rule_status, BatchStatus::Flagged);
        assert_eq!(verdict.combined_status, BatchStatus::Flagged);
        assert!(verdict.explanation.starts_with("Very low ratio (10.00%)"));
    }

    #[test]
    fn test_invalid_quantities_rejected() {
        let service = stub_service();
        let err = service.evaluate_batch(0.0, 10.0, "TLUD").unwrap_err();
        assert_eq!(err.code(), "INVALID_QUANTITY");
        assert!(service.evaluate_batch(100.0, -1.0, "TLUD").is_err());
    }

    #[test]
    fn test_volume_explanations() {
        let service = stub_service();
        let small = service.evaluate_batch(50.0, 12.5, "TLUD").unwrap();
        assert!(small.explanation.contains("Small batch volume"));
        let large = service.evaluate_batch(3000.0, 750.0, "TLUD").unwrap();
        assert!(large.explanation.contains("Large batch volume"));
    }

    #[test]
    fn test_category_band_override() {
        let mut config = BatchConfig::default();
        config
            .category_bands
            .insert("tlud".to_string(), Band::new(0.10, 0.20));
        let service = BatchAnomalyService::new(&config, &ModelStore::stub());

        let tlud = service.evaluate_batch(500.0, 75.0, "TLUD").unwrap();
        assert_eq!(tlud.rule_status, BatchStatus::Verified);
        assert_eq!(tlud.ratio_band, Band::new(0.10, 0.20));

        let retort = service.evaluate_batch(500.0, 75.0, "Batch Retort Kiln").unwrap();
        assert_eq!(retort.rule_status, BatchStatus::Flagged);
    }

    #[test]
    fn test_unavailable_model_is_rule_only() {
        let service =
            BatchAnomalyService::new(&BatchConfig::default(), &ModelStore::unavailable("missing"));
        let verdict = service.evaluate_batch(500.0, 125.0, "TLUD").unwrap();
        assert_eq!(verdict.ml_status, BatchStatus::Error);
        assert_eq!(verdict.rule_status, BatchStatus::Verified);
        assert_eq!(verdict.combined_status, BatchStatus::Verified);
        assert_eq!(verdict.confidence, 0.0);
        assert!(verdict.explanation.contains("rule-only"));
    }

    #[test]
    fn test_learned_model_flags_extreme_ratio() {
        let model = train_batch_model(&synthetic_batch_samples(42), 42, 100).unwrap();
        let store = ModelStore::new(
            ModelSlot::Unavailable("unused".into()),
            ModelSlot::Ready(Arc::new(model)),
        );
        let service = BatchAnomalyService::new(&BatchConfig::default(), &store);

        let verdict = service.evaluate_batch(600.0, 540.0, "Rocket Kiln").unwrap();
        assert_eq!(verdict.ml_status, BatchStatus::Flagged);
        assert_eq!(verdict.combined_status, BatchStatus::Flagged);
        assert!(verdict.confidence > 0.0 && verdict.confidence <= 1.0);
        assert!(verdict.anomaly_score < 0.0);
    }
}
