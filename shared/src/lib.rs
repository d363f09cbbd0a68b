//! Shared types and models for the biochar MRV verification engine
//!
//! This crate contains the value types and pure computations shared between
//! the engine and the offline field app (via WASM): boundary parsing, plot
//! shape features, verdict models and the batch ratio rule.

pub mod geometry;
pub mod models;
pub mod types;
pub mod validation;

pub use geometry::*;
pub use models::*;
pub use types::*;
pub use validation::*;
