//! Plot corpus: previously processed plots that candidates are compared against
//!
//! Readers take a snapshot; appends come from a single writer (the plot
//! service serializes its snapshot-then-append sequence).

mod jsonl;
mod memory;

use std::sync::Arc;

use shared::CorpusEntry;
use thiserror::Error;

use crate::config::{CorpusBackend, CorpusConfig};

pub use jsonl::JsonlCorpus;
pub use memory::InMemoryCorpus;

/// Corpus errors
#[derive(Debug, Error)]
pub enum CorpusError {
    #[error("corpus store unreachable: {0}")]
    Unreachable(String),

    #[error("corpus I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("corpus record {line} is invalid: {message}")]
    InvalidRecord { line: usize, message: String },

    #[error("corpus lock poisoned")]
    Poisoned,
}

pub trait PlotCorpus: Send + Sync {
    /// All entries at the time of the call
    fn snapshot(&self) -> Result<Vec<Arc<CorpusEntry>>, CorpusError>;

    fn append(&self, entry: CorpusEntry) -> Result<(), CorpusError>;

    fn len(&self) -> Result<usize, CorpusError> {
        Ok(self.snapshot()?.len())
    }

    fn is_empty(&self) -> Result<bool, CorpusError> {
        Ok(self.len()? == 0)
    }
}

/// Stand-in for a corpus that failed to open; every read reports `reason`
#[derive(Debug, Clone)]
pub struct UnavailableCorpus {
    reason: String,
}

impl UnavailableCorpus {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

impl PlotCorpus for UnavailableCorpus {
    fn snapshot(&self) -> Result<Vec<Arc<CorpusEntry>>, CorpusError> {
        Err(CorpusError::Unreachable(self.reason.clone()))
    }

    fn append(&self, _entry: CorpusEntry) -> Result<(), CorpusError> {
        Err(CorpusError::Unreachable(self.reason.clone()))
    }
}

/// Open the corpus named by the configuration
pub fn open(config: &CorpusConfig) -> Result<Arc<dyn PlotCorpus>, CorpusError> {
    match config.backend {
        CorpusBackend::Memory => Ok(Arc::new(InMemoryCorpus::new())),
        CorpusBackend::Jsonl => Ok(Arc::new(JsonlCorpus::open(&config.path)?)),
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use chrono::Utc;
    use shared::{extract_features, parse_boundary, CorpusEntry, LonLat};

    /// Square of side `size` degrees with its lower-left corner at (lon, lat)
    pub fn square(lon: f64, lat: f64, size: f64) -> Vec<LonLat> {
        vec![
            LonLat::new(lon, lat),
            LonLat::new(lon + size, lat),
            LonLat::new(lon + size, lat + size),
            LonLat::new(lon, lat + size),
        ]
    }

    pub fn entry(plot_id: &str, owner_id: &str, boundary: &[LonLat]) -> CorpusEntry {
        let polygon = parse_boundary(boundary).unwrap().polygon;
        CorpusEntry {
            plot_id: plot_id.to_string(),
            owner_id: owner_id.to_string(),
            features: extract_features(&polygon),
            polygon,
            submitted_at: Utc::now(),
        }
    }
}
