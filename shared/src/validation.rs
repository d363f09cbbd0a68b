//! Validation utilities for the biochar MRV verification engine
//!
//! Input checks shared by the engine and the offline field app.

use crate::types::Band;

// ============================================================================
// Batch Validations
// ============================================================================

/// Validate batch quantities: biomass must be positive, char non-negative
pub fn validate_quantities(biomass_in: f64, char_out: f64) -> Result<(), &'static str> {
    if !biomass_in.is_finite() || biomass_in <= 0.0 {
        return Err("Biomass input must be a positive number");
    }
    if !char_out.is_finite() || char_out < 0.0 {
        return Err("Char output must be zero or a positive number");
    }
    Ok(())
}

/// Validate a conversion ratio band (0 ≤ min ≤ max ≤ 1)
pub fn validate_ratio_band(band: &Band) -> Result<(), &'static str> {
    if !band.min.is_finite() || !band.max.is_finite() {
        return Err("Ratio band bounds must be finite");
    }
    if band.min < 0.0 || band.max > 1.0 {
        return Err("Ratio band must lie within [0, 1]");
    }
    if band.min > band.max {
        return Err("Ratio band minimum exceeds maximum");
    }
    Ok(())
}

// ============================================================================
// Photo Validations
// ============================================================================

/// Check that a fingerprint is a 64-bit average hash (16 hex digits)
pub fn is_valid_average_hash(hash: &str) -> bool {
    hash.len() == 16 && hash.chars().all(|c| c.is_ascii_hexdigit())
}

// ============================================================================
// Plot Validations
// ============================================================================

/// Validate an identifier used for plots and owners
pub fn validate_identifier(id: &str) -> Result<(), &'static str> {
    if id.trim().is_empty() {
        return Err("Identifier must not be empty");
    }
    if id.len() > 128 {
        return Err("Identifier must be at most 128 characters");
    }
    Ok(())
}
