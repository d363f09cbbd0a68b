//! Learned anomaly models
//!
//! The plot area check and the batch check each score a feature vector with
//! an [`AnomalyDetector`]. The production implementation is an isolation
//! forest trained once and persisted as a versioned blob; a stub detector
//! stands in when learned checks are disabled.

pub mod isolation_forest;
pub mod persistence;
pub mod scaler;
pub mod store;
pub mod training;

use serde::{Deserialize, Serialize};
use shared::Band;
use thiserror::Error;

pub use isolation_forest::{IsolationForest, IsolationForestParams};
pub use persistence::{decode_model, encode_model, load_model, save_model};
pub use scaler::StandardScaler;
pub use store::{ModelSlot, ModelStore};
pub use training::{OutlierModel, AREA_MODEL_NAME, BATCH_MODEL_NAME};

/// Model errors
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("model '{0}' is not loaded")]
    NotLoaded(String),

    #[error("expected {expected} features, got {found}")]
    DimensionMismatch { expected: usize, found: usize },

    #[error("feature vector contains a non-finite value")]
    NonFinite,

    #[error("model blob is corrupt: {0}")]
    Corrupt(String),

    #[error("unsupported model format version {0}")]
    UnsupportedVersion(u16),

    #[error("training failed: {0}")]
    Training(String),

    #[error("model I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result of scoring one sample
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AnomalyScore {
    pub is_anomaly: bool,
    /// Raw score; more negative is more anomalous
    pub raw_score: f64,
}

/// Scores feature vectors against a learned notion of normal
pub trait AnomalyDetector: Send + Sync + std::fmt::Debug {
    fn name(&self) -> &str;

    fn score(&self, sample: &[f64]) -> Result<AnomalyScore, ModelError>;

    /// Typical range of the first feature, when the model knows one
    fn expected_band(&self) -> Option<Band> {
        None
    }
}

/// Detector that considers every sample normal
#[derive(Debug, Clone)]
pub struct StubDetector {
    name: String,
}

impl StubDetector {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl AnomalyDetector for StubDetector {
    fn name(&self) -> &str {
        &self.name
    }

    fn score(&self, sample: &[f64]) -> Result<AnomalyScore, ModelError> {
        if sample.iter().any(|v| !v.is_finite()) {
            return Err(ModelError::NonFinite);
        }
        Ok(AnomalyScore {
            is_anomaly: false,
            raw_score: 0.0,
        })
    }
}
