//! Per-feature standardization

use serde::{Deserialize, Serialize};

use super::ModelError;

/// Zero-mean, unit-variance scaling fitted on training data
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    mean: Vec<f64>,
    scale: Vec<f64>,
}

impl StandardScaler {
    /// Fit on rows of equal length; constant features keep a scale of 1
    pub fn fit(samples: &[Vec<f64>]) -> Result<Self, ModelError> {
        let first = samples
            .first()
            .ok_or_else(|| ModelError::Training("no samples to fit scaler".into()))?;
        let dims = first.len();
        let n = samples.len() as f64;

        let mut mean = vec![0.0; dims];
        for row in samples {
            if row.len() != dims {
                return Err(ModelError::DimensionMismatch {
                    expected: dims,
                    found: row.len(),
                });
            }
            for (m, v) in mean.iter_mut().zip(row) {
                *m += v / n;
            }
        }

        let mut variance = vec![0.0; dims];
        for row in samples {
            for ((var, v), m) in variance.iter_mut().zip(row).zip(&mean) {
                *var += (v - m).powi(2) / n;
            }
        }

        let scale = variance
            .into_iter()
            .map(|var| {
                let std = var.sqrt();
                if std > f64::EPSILON {
                    std
                } else {
                    1.0
                }
            })
            .collect();

        Ok(Self { mean, scale })
    }

    pub fn dims(&self) -> usize {
        self.mean.len()
    }

    pub fn transform(&self, sample: &[f64]) -> Result<Vec<f64>, ModelError> {
        if sample.len() != self.dims() {
            return Err(ModelError::DimensionMismatch {
                expected: self.dims(),
                found: sample.len(),
            });
        }
        Ok(sample
            .iter()
            .zip(self.mean.iter().zip(&self.scale))
            .map(|(v, (m, s))| (v - m) / s)
            .collect())
    }
}
