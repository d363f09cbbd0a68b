//! Photo evidence models and the quality score

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::GpsCoordinates;

/// Quality score weights; they sum to exactly 1.0
pub const SHARPNESS_WEIGHT: f64 = 0.3;
pub const BRIGHTNESS_WEIGHT: f64 = 0.2;
pub const GPS_WEIGHT: f64 = 0.2;
pub const RESOLUTION_WEIGHT: f64 = 0.15;
pub const NON_DUPLICATE_WEIGHT: f64 = 0.15;

/// Pixel count at which resolution adequacy saturates (1920×1080)
pub const FULL_RESOLUTION_PIXELS: f64 = 1920.0 * 1080.0;

/// Image size in pixels
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn meets(&self, min_width: u32, min_height: u32) -> bool {
        self.width >= min_width && self.height >= min_height
    }

    /// min(w·h / 1920·1080, 1)
    pub fn adequacy(&self) -> f64 {
        (f64::from(self.width) * f64::from(self.height) / FULL_RESOLUTION_PIXELS).min(1.0)
    }
}

/// Metadata recovered from EXIF
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct ExifSummary {
    pub has_gps: bool,
    pub gps: Option<GpsCoordinates>,
    pub captured_at: Option<String>,
    pub camera_make: Option<String>,
    pub camera_model: Option<String>,
}

/// Inputs of the weighted quality score
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QualityFactors {
    /// Normalized sharpness in [0, 1]
    pub sharpness: f64,
    /// Mean luminance in [0, 1]
    pub brightness: f64,
    pub has_gps: bool,
    pub resolution: Resolution,
    pub is_duplicate: bool,
}

impl QualityFactors {
    /// 1.0 at mid-gray, 0.0 at pure black or white
    pub fn brightness_centering(&self) -> f64 {
        (1.0 - (self.brightness - 0.5).abs() * 2.0).clamp(0.0, 1.0)
    }
}

/// Weighted quality score in [0, 1]
pub fn quality_score(factors: &QualityFactors) -> f64 {
    let gps = if factors.has_gps { 1.0 } else { 0.0 };
    let non_duplicate = if factors.is_duplicate { 0.0 } else { 1.0 };

    factors.sharpness.clamp(0.0, 1.0) * SHARPNESS_WEIGHT
        + factors.brightness_centering() * BRIGHTNESS_WEIGHT
        + gps * GPS_WEIGHT
        + factors.resolution.adequacy() * RESOLUTION_WEIGHT
        + non_duplicate * NON_DUPLICATE_WEIGHT
}

/// Integrity report for one photo
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhotoReport {
    pub quality_score: f64,
    /// Normalized sharpness; higher is sharper
    pub blur_score: f64,
    pub brightness: f64,
    pub resolution: Resolution,
    pub file_size_bytes: usize,
    pub dark_material_ratio: f64,
    pub dark_material_detected: bool,
    pub dark_material_confidence: f64,
    pub duplicate_flag: bool,
    pub duplicate_similarity: f64,
    /// 64-bit average hash as 16 hex digits; empty when the image was unreadable
    pub perceptual_hash: String,
    pub exif: ExifSummary,
    pub warnings: Vec<String>,
    pub analyzed_at: DateTime<Utc>,
}
