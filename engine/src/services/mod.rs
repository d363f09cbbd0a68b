//! Verification services for the biochar MRV engine

pub mod batch;
pub mod photo;
pub mod plot;

pub use batch::BatchAnomalyService;
pub use photo::PhotoIntegrityAnalyzer;
pub use plot::{invalid_boundary, PlotVerificationService, PlotVerifier, StubPlotVerifier};
