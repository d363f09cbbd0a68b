//! Error handling for the verification engine
//!
//! Validation failures abort an evaluation; model and corpus failures are
//! recoverable and are normally turned into degraded results by the services
//! before they reach a caller.

use serde::Serialize;
use shared::GeometryError;
use thiserror::Error;

use crate::corpus::CorpusError;
use crate::ml::ModelError;

/// Engine error types
#[derive(Error, Debug)]
pub enum EngineError {
    // Validation errors (terminal)
    #[error("Malformed geometry: {0}")]
    MalformedGeometry(#[from] GeometryError),

    #[error("Invalid quantity: {0}")]
    InvalidQuantity(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    // Collaborator errors (recoverable)
    #[error("Model unavailable: {0}")]
    ModelUnavailable(#[from] ModelError),

    #[error("Corpus unavailable: {0}")]
    CorpusUnavailable(#[from] CorpusError),

    // Setup errors
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<config::ConfigError> for EngineError {
    fn from(e: config::ConfigError) -> Self {
        EngineError::Configuration(e.to_string())
    }
}

/// Error response structure
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(Debug, Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
    pub recoverable: bool,
}

impl EngineError {
    /// Stable machine-readable code
    pub fn code(&self) -> &'static str {
        match self {
            EngineError::MalformedGeometry(_) => "MALFORMED_GEOMETRY",
            EngineError::InvalidQuantity(_) => "INVALID_QUANTITY",
            EngineError::InvalidRequest(_) => "INVALID_REQUEST",
            EngineError::ModelUnavailable(_) => "MODEL_UNAVAILABLE",
            EngineError::CorpusUnavailable(_) => "CORPUS_UNAVAILABLE",
            EngineError::Configuration(_) => "CONFIGURATION_ERROR",
            EngineError::Io(_) => "IO_ERROR",
        }
    }

    /// Whether the evaluation can continue in a degraded mode
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            EngineError::ModelUnavailable(_) | EngineError::CorpusUnavailable(_)
        )
    }

    pub fn to_response(&self) -> ErrorResponse {
        // Log the error for debugging
        tracing::error!("Error: {:?}", self);

        ErrorResponse {
            error: ErrorDetail {
                code: self.code().to_string(),
                message: self.to_string(),
                recoverable: self.is_recoverable(),
            },
        }
    }
}

/// Result type alias for engine operations
pub type EngineResult<T> = Result<T, EngineError>;
