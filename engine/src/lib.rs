//! Biochar MRV verification engine
//!
//! Anti-fraud checks for carbon-credit submissions: plot boundaries are
//! screened for atypical size, reused outlines, overlaps and same-owner
//! clustering; biomass-to-char batches for implausible conversion ratios;
//! evidence photos for quality, duplication and visible char.

pub mod config;
pub mod corpus;
pub mod detectors;
pub mod engine;
pub mod error;
pub mod ml;
pub mod runner;
pub mod services;

pub use config::Config;
pub use corpus::{InMemoryCorpus, JsonlCorpus, PlotCorpus};
pub use engine::VerificationEngine;
pub use error::{EngineError, EngineResult};
pub use ml::{AnomalyDetector, ModelStore};
pub use services::{PlotVerifier, StubPlotVerifier};
