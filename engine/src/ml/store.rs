//! Loading models at startup
//!
//! A missing blob is trained from the synthetic distribution (or batch
//! history) and persisted. A blob that exists but cannot be decoded leaves its
//! slot unavailable; callers then run their degraded path instead of silently
//! replacing a model someone deployed.

use std::path::Path;
use std::sync::Arc;

use crate::config::{ModelBackend, ModelsConfig};

use super::persistence::{load_model, save_model};
use super::training::{
    load_batch_history, synthetic_batch_samples, train_area_model, train_batch_model,
    OutlierModel, AREA_MODEL_NAME, BATCH_MODEL_NAME,
};
use super::{AnomalyDetector, ModelError, StubDetector};

/// A model that is either ready to score or unavailable with a reason
#[derive(Debug, Clone)]
pub enum ModelSlot {
    Ready(Arc<dyn AnomalyDetector>),
    Unavailable(String),
}

impl ModelSlot {
    pub fn get(&self) -> Result<Arc<dyn AnomalyDetector>, ModelError> {
        match self {
            ModelSlot::Ready(model) => Ok(model.clone()),
            ModelSlot::Unavailable(reason) => Err(ModelError::NotLoaded(reason.clone())),
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, ModelSlot::Ready(_))
    }
}

/// The two learned models, loaded once and shared read-only
#[derive(Debug, Clone)]
pub struct ModelStore {
    area: ModelSlot,
    batch: ModelSlot,
}

impl ModelStore {
    pub fn new(area: ModelSlot, batch: ModelSlot) -> Self {
        Self { area, batch }
    }

    /// Always-inlier detectors for both checks
    pub fn stub() -> Self {
        Self {
            area: ModelSlot::Ready(Arc::new(StubDetector::new(AREA_MODEL_NAME))),
            batch: ModelSlot::Ready(Arc::new(StubDetector::new(BATCH_MODEL_NAME))),
        }
    }

    /// Both slots unavailable
    pub fn unavailable(reason: &str) -> Self {
        Self {
            area: ModelSlot::Unavailable(reason.to_string()),
            batch: ModelSlot::Unavailable(reason.to_string()),
        }
    }

    pub fn load(config: &ModelsConfig) -> Self {
        if config.backend == ModelBackend::Stub {
            tracing::info!("Using stub anomaly detectors");
            return Self::stub();
        }

        let area = load_or_train(&config.dir.join(format!("{}.mrvm", AREA_MODEL_NAME)), || {
            train_area_model(config.seed, config.n_estimators)
        });
        let batch = load_or_train(&config.dir.join(format!("{}.mrvm", BATCH_MODEL_NAME)), || {
            let samples = match &config.batch_training_csv {
                Some(csv) => {
                    tracing::info!(path = %csv.display(), "Training batch model from history");
                    load_batch_history(csv)?
                }
                None => synthetic_batch_samples(config.seed),
            };
            train_batch_model(&samples, config.seed, config.n_estimators)
        });

        Self { area, batch }
    }

    pub fn area(&self) -> Result<Arc<dyn AnomalyDetector>, ModelError> {
        self.area.get()
    }

    pub fn batch(&self) -> Result<Arc<dyn AnomalyDetector>, ModelError> {
        self.batch.get()
    }

    pub fn area_slot(&self) -> &ModelSlot {
        &self.area
    }

    pub fn batch_slot(&self) -> &ModelSlot {
        &self.batch
    }
}

fn load_or_train<F>(path: &Path, train: F) -> ModelSlot
where
    F: FnOnce() -> Result<OutlierModel, ModelError>,
{
    match load_model(path) {
        Ok(Some(model)) => {
            tracing::info!(
                model = %model.name,
                trained_on = model.trained_on,
                path = %path.display(),
                "Loaded model"
            );
            ModelSlot::Ready(Arc::new(model))
        }
        Ok(None) => match train() {
            Ok(model) => {
                tracing::info!(model = %model.name, trained_on = model.trained_on, "Trained model");
                if let Err(e) = save_model(path, &model) {
                    tracing::warn!(path = %path.display(), "Failed to persist model: {}", e);
                }
                ModelSlot::Ready(Arc::new(model))
            }
            Err(e) => {
                tracing::error!(path = %path.display(), "Model training failed: {}", e);
                ModelSlot::Unavailable(e.to_string())
            }
        },
        Err(e) => {
            tracing::error!(path = %path.display(), "Model blob unusable: {}", e);
            ModelSlot::Unavailable(format!("{}: {}", path.display(), e))
        }
    }
}
