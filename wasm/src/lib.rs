//! WebAssembly module for the biochar MRV field app
//!
//! Provides client-side computation for:
//! - Boundary validation before upload
//! - Plot shape features
//! - Conversion ratio pre-check and CO2 equivalent
//! - Photo quality preview

use wasm_bindgen::prelude::*;

// Re-export shared types for use in JavaScript
pub use shared::geometry::*;
pub use shared::models::*;
pub use shared::types::*;
pub use shared::validation::*;

fn parse_vertices(boundary_json: &str) -> Result<Vec<LonLat>, String> {
    serde_json::from_str(boundary_json).map_err(|e| format!("Invalid boundary JSON: {}", e))
}

/// Validate a `[[lon, lat], ...]` boundary; returns an empty string when valid
#[wasm_bindgen]
pub fn validate_boundary(boundary_json: &str) -> String {
    match parse_vertices(boundary_json).and_then(|v| parse_boundary(&v).map_err(|e| e.to_string()))
    {
        Ok(_) => String::new(),
        Err(message) => message,
    }
}

/// Shape features of a boundary as JSON
#[wasm_bindgen]
pub fn extract_plot_features(boundary_json: &str) -> Result<String, JsValue> {
    let vertices = parse_vertices(boundary_json).map_err(|e| JsValue::from_str(&e))?;
    let parsed = parse_boundary(&vertices).map_err(|e| JsValue::from_str(&e.to_string()))?;
    let features = extract_features(&parsed.polygon);

    serde_json::to_string(&features).map_err(|e| JsValue::from_str(&e.to_string()))
}

/// Boundary read from a KML document, as `[[lon, lat], ...]` JSON
#[wasm_bindgen]
pub fn kml_to_boundary(kml: &str) -> Result<String, JsValue> {
    let vertices = parse_kml_coordinates(kml).map_err(|e| JsValue::from_str(&e.to_string()))?;
    serde_json::to_string(&vertices).map_err(|e| JsValue::from_str(&e.to_string()))
}

/// Fixed-band ratio rule; returns "verified", "flagged" or "error"
#[wasm_bindgen]
pub fn check_batch_ratio(biomass_in: f64, char_out: f64) -> String {
    if validate_quantities(biomass_in, char_out).is_err() {
        return BatchStatus::Error.to_string();
    }
    let reading = BatchReading::new(biomass_in, char_out, "");
    check_conversion_ratio(reading.ratio(), &DEFAULT_RATIO_BAND).to_string()
}

/// CO2 equivalent of a char mass, kg
#[wasm_bindgen]
pub fn calculate_co2_equivalent(char_out: f64) -> f64 {
    if !char_out.is_finite() || char_out < 0.0 {
        return 0.0;
    }
    co2_equivalent_kg(char_out).to_string().parse().unwrap_or(0.0)
}

/// Numeric kiln code used by the batch model
#[wasm_bindgen]
pub fn encode_kiln_type(label: &str) -> u8 {
    KilnType::from_label(label).code()
}

/// Preview of the weighted photo quality score
#[wasm_bindgen]
pub fn calculate_photo_quality(
    sharpness: f64,
    brightness: f64,
    has_gps: bool,
    width: u32,
    height: u32,
    is_duplicate: bool,
) -> f64 {
    quality_score(&QualityFactors {
        sharpness,
        brightness,
        has_gps,
        resolution: Resolution::new(width, height),
        is_duplicate,
    })
}
