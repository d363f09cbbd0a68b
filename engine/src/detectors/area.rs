//! Area outlier check

use std::sync::Arc;

use shared::{AreaCheckResult, Band};

use crate::ml::{AnomalyDetector, ModelStore};

/// Flags plot areas atypical relative to the learned area distribution
///
/// When the model is unavailable the detector falls back to a fixed band and
/// marks its result as degraded.
#[derive(Debug, Clone)]
pub struct AreaOutlierDetector {
    model: Option<Arc<dyn AnomalyDetector>>,
    fallback_band: Band,
}

impl AreaOutlierDetector {
    pub fn new(models: &ModelStore, fallback_band: Band) -> Self {
        let model = match models.area() {
            Ok(model) => Some(model),
            Err(e) => {
                tracing::warn!("Area model unavailable, using fixed band: {}", e);
                None
            }
        };
        Self {
            model,
            fallback_band,
        }
    }

    pub fn evaluate(&self, area_ha: f64) -> AreaCheckResult {
        let scored = self
            .model
            .as_ref()
            .map(|model| model.score(&[area_ha]).map(|score| (score, model.expected_band())));

        match scored {
            Some(Ok((score, band))) => {
                let band = band.unwrap_or(self.fallback_band);
                AreaCheckResult {
                    is_outlier: score.is_anomaly,
                    score: score.raw_score,
                    area_ha,
                    expected_band: band,
                    reason: score.is_anomaly.then(|| describe(area_ha, &band)),
                    degraded: false,
                }
            }
            other => {
                if let Some(Err(e)) = other {
                    tracing::warn!(area_ha, "Area model failed, using fixed band: {}", e);
                }
                let is_outlier = !self.fallback_band.contains(area_ha);
                AreaCheckResult {
                    is_outlier,
                    score: 0.0,
                    area_ha,
                    expected_band: self.fallback_band,
                    reason: is_outlier.then(|| describe(area_ha, &self.fallback_band)),
                    degraded: true,
                }
            }
        }
    }
}

fn describe(area_ha: f64, band: &Band) -> String {
    if area_ha > band.max {
        format!("Unusually large plot: {:.2} ha", area_ha)
    } else if area_ha < band.min {
        format!("Unusually small plot: {:.2} ha", area_ha)
    } else {
        format!("Atypical plot size: {:.2} ha", area_ha)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ml::training::train_area_model;
    use crate::ml::ModelSlot;

    fn fallback() -> Band {
        Band::new(0.1, 10.0)
    }

    #[test]
    fn test_learned_model_flags_huge_plot() {
        let store = ModelStore::new(
            ModelSlot::Ready(Arc::new(train_area_model(42, 50).unwrap())),
            ModelSlot::Unavailable("unused".into()),
        );
        let detector = AreaOutlierDetector::new(&store, fallback());

        let typical = detector.evaluate(2.7);
        assert!(!typical.is_outlier);
        assert!(typical.reason.is_none());
        assert!(!typical.degraded);

        let huge = detector.evaluate(1_240_000.0);
        assert!(huge.is_outlier);
        assert_eq!(huge.reason.as_deref(), Some("Unusually large plot: 1240000.00 ha"));
    }

    #[test]
    fn test_fallback_band_when_model_unavailable() {
        let detector = AreaOutlierDetector::new(&ModelStore::unavailable("missing"), fallback());

        let small = detector.evaluate(0.05);
        assert!(small.is_outlier);
        assert!(small.degraded);
        assert_eq!(small.reason.as_deref(), Some("Unusually small plot: 0.05 ha"));

        let ok = detector.evaluate(1.0);
        assert!(!ok.is_outlier);
        assert!(ok.degraded);
    }

    #[test]
    fn test_stub_model_never_flags() {
        let detector = AreaOutlierDetector::new(&ModelStore::stub(), fallback());
        let result = detector.evaluate(1_000_000.0);
        assert!(!result.is_outlier);
        assert!(!result.degraded);
        assert_eq!(result.expected_band, fallback());
    }
}
