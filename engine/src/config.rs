//! Configuration management for the biochar MRV verification engine
//!
//! Supports hierarchical configuration loading:
//! 1. Default values in code
//! 2. Configuration files (config/development.toml, config/production.toml)
//! 3. Environment variable overrides with MRV__ prefix

use std::collections::HashMap;
use std::path::PathBuf;

use config::{ConfigError, Environment, File};
use serde::Deserialize;
use shared::{validate_ratio_band, Band, DEFAULT_RATIO_BAND};

use crate::error::{EngineError, EngineResult};

/// Main engine configuration
#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct Config {
    /// Current environment (development, production)
    pub environment: String,

    /// Learned model configuration
    pub models: ModelsConfig,

    /// Plot detector thresholds
    pub plot: PlotConfig,

    /// Batch ratio bands
    pub batch: BatchConfig,

    /// Photo analysis thresholds
    pub photo: PhotoConfig,

    /// Plot corpus storage
    pub corpus: CorpusConfig,
}

/// Which anomaly detector implementation backs the learned checks
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ModelBackend {
    #[default]
    IsolationForest,
    /// Always-inlier detector for tests and offline demos
    Stub,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ModelsConfig {
    pub backend: ModelBackend,

    /// Directory holding persisted model blobs
    pub dir: PathBuf,

    /// Seed for synthetic training data and tree construction
    pub seed: u64,

    /// Trees per isolation forest
    pub n_estimators: usize,

    /// Optional CSV of historical batches (biomass_in,char_out,category)
    pub batch_training_csv: Option<PathBuf>,
}

/// Which plot verifier implementation is used
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum VerifierMode {
    #[default]
    Full,
    /// Accept every well-formed plot without running the detectors
    Stub,
}

/// When an evaluated plot is added to the comparison corpus
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum AppendPolicy {
    /// Only verified plots enter the corpus
    #[default]
    AcceptedOnly,
    /// Every evaluated plot enters the corpus
    Always,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct PlotConfig {
    pub verifier: VerifierMode,

    /// Normalized outline similarity above which two plots match
    pub similarity_threshold: f64,

    /// Overlap percentage above which two plots conflict
    pub min_overlap_pct: f64,

    /// DBSCAN neighbourhood radius, degrees
    pub density_eps_deg: f64,

    /// DBSCAN core point threshold
    pub density_min_samples: usize,

    /// Prior owner plots required before density runs
    pub density_min_history: usize,

    /// Cluster size above which density is suspicious
    pub density_max_cluster: usize,

    /// Typical plot area band (ha) used when the area model is unavailable
    pub fallback_area_band: Band,

    pub append_policy: AppendPolicy,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct BatchConfig {
    /// Default char/biomass ratio band
    pub ratio_band: Band,

    /// Per-kiln overrides keyed by snake_case kiln name
    pub category_bands: HashMap<String, Band>,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct PhotoConfig {
    pub min_width: u32,
    pub min_height: u32,

    /// Laplacian variance mapped to a sharpness of 1.0
    pub blur_normalizer: f64,

    /// Sharpness below which a photo is reported as blurry
    pub blur_warning: f64,

    pub dark_brightness: f64,
    pub bright_brightness: f64,

    /// HSV value at or below which a pixel counts as dark material
    pub dark_value_threshold: u8,

    /// Dark pixel ratio at which biochar is considered present
    pub dark_ratio_threshold: f64,

    /// Maximum Hamming distance between duplicate fingerprints
    pub duplicate_hamming_threshold: u32,

    pub max_file_size_bytes: usize,

    pub low_quality_threshold: f64,
}

/// Where the plot corpus lives
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum CorpusBackend {
    #[default]
    Memory,
    /// Append-only JSON lines file
    Jsonl,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct CorpusConfig {
    pub backend: CorpusBackend,
    pub path: PathBuf,
}

impl Config {
    /// Load configuration from files and environment variables
    pub fn load() -> Result<Self, ConfigError> {
        let environment = std::env::var("MRV_ENVIRONMENT").unwrap_or_else(|_| "development".into());

        let config = config::Config::builder()
            // Start with default values
            .set_default("environment", environment.clone())?
            .set_default("models.dir", "models")?
            .set_default("models.seed", 42)?
            .set_default("models.n_estimators", 100)?
            .set_default("plot.similarity_threshold", 0.95)?
            .set_default("plot.min_overlap_pct", 5.0)?
            .set_default("corpus.path", "data/corpus.jsonl")?
            // Load environment-specific config file
            .add_source(File::with_name(&format!("config/{}", environment)).required(false))
            // Override with environment variables (MRV__ prefix)
            .add_source(
                Environment::with_prefix("MRV")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    /// Reject settings the detectors cannot work with
    pub fn validate(&self) -> EngineResult<()> {
        validate_ratio_band(&self.batch.ratio_band)
            .map_err(|e| EngineError::Configuration(format!("batch.ratio_band: {}", e)))?;
        for (key, band) in &self.batch.category_bands {
            validate_ratio_band(band).map_err(|e| {
                EngineError::Configuration(format!("batch.category_bands.{}: {}", key, e))
            })?;
        }

        if !(0.0..=1.0).contains(&self.plot.similarity_threshold) {
            return Err(EngineError::Configuration(
                "plot.similarity_threshold must lie within [0, 1]".into(),
            ));
        }
        if !(0.0..=100.0).contains(&self.plot.min_overlap_pct) {
            return Err(EngineError::Configuration(
                "plot.min_overlap_pct must lie within [0, 100]".into(),
            ));
        }
        if self.plot.density_eps_deg <= 0.0 || self.plot.density_min_samples == 0 {
            return Err(EngineError::Configuration(
                "plot density radius and min_samples must be positive".into(),
            ));
        }
        if self.plot.fallback_area_band.min > self.plot.fallback_area_band.max {
            return Err(EngineError::Configuration(
                "plot.fallback_area_band minimum exceeds maximum".into(),
            ));
        }
        if self.models.n_estimators == 0 {
            return Err(EngineError::Configuration(
                "models.n_estimators must be positive".into(),
            ));
        }
        if self.photo.blur_normalizer <= 0.0 {
            return Err(EngineError::Configuration(
                "photo.blur_normalizer must be positive".into(),
            ));
        }
        Ok(())
    }
}

impl Default for ModelsConfig {
    fn default() -> Self {
        Self {
            backend: ModelBackend::IsolationForest,
            dir: PathBuf::from("models"),
            seed: 42,
            n_estimators: 100,
            batch_training_csv: None,
        }
    }
}

impl Default for PlotConfig {
    fn default() -> Self {
        Self {
            verifier: VerifierMode::Full,
            similarity_threshold: 0.95,
            min_overlap_pct: 5.0,
            density_eps_deg: 0.01,
            density_min_samples: 5,
            density_min_history: 5,
            density_max_cluster: 10,
            fallback_area_band: Band::new(0.1, 10.0),
            append_policy: AppendPolicy::AcceptedOnly,
        }
    }
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            ratio_band: DEFAULT_RATIO_BAND,
            category_bands: HashMap::new(),
        }
    }
}

impl Default for PhotoConfig {
    fn default() -> Self {
        Self {
            min_width: 800,
            min_height: 600,
            blur_normalizer: 500.0,
            blur_warning: 0.3,
            dark_brightness: 0.2,
            bright_brightness: 0.9,
            dark_value_threshold: 80,
            dark_ratio_threshold: 0.15,
            duplicate_hamming_threshold: 5,
            max_file_size_bytes: 10 * 1024 * 1024,
            low_quality_threshold: 0.5,
        }
    }
}

impl Default for CorpusConfig {
    fn default() -> Self {
        Self {
            backend: CorpusBackend::Memory,
            path: PathBuf::from("data/corpus.jsonl"),
        }
    }
}
