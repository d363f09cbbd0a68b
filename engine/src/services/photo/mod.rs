//! Photo integrity analysis
//!
//! Scores evidence photos for sharpness, exposure, resolution, GPS tagging
//! and uniqueness, and estimates whether dark char material is in frame.
//! Analysis never fails: unreadable input produces a zero-score report whose
//! warnings say why.

pub mod fingerprint;
pub mod metadata;
pub mod quality;

use chrono::Utc;
use shared::{quality_score, ExifSummary, PhotoReport, QualityFactors, Resolution};

use crate::config::PhotoConfig;

pub use fingerprint::{
    average_hash, closest_duplicate, find_duplicate, format_hash, hamming_distance, parse_hash,
};
pub use metadata::read_exif;
pub use quality::{dark_pixel_ratio, laplacian_variance, mean_brightness};

pub const WARN_UNREADABLE: &str = "Failed to read image";
pub const WARN_NO_GPS: &str = "No GPS coordinates found";
pub const WARN_LOW_RESOLUTION: &str = "Low resolution (minimum 800x600 recommended)";
pub const WARN_BLURRY: &str = "Image appears blurry";
pub const WARN_DARK: &str = "Very dark image";
pub const WARN_OVEREXPOSED: &str = "Overexposed image";
pub const WARN_LARGE_FILE: &str = "Large file size (>10MB)";
pub const WARN_LOW_QUALITY: &str = "Overall low quality score";

#[derive(Debug, Clone)]
pub struct PhotoIntegrityAnalyzer {
    config: PhotoConfig,
}

impl PhotoIntegrityAnalyzer {
    pub fn new(config: &PhotoConfig) -> Self {
        Self {
            config: config.clone(),
        }
    }

    /// Analyze an encoded image against previously seen fingerprints
    pub fn analyze<'a, I>(&self, bytes: &[u8], known_hashes: I) -> PhotoReport
    where
        I: IntoIterator<Item = &'a str>,
    {
        let threshold = self.config.duplicate_hamming_threshold;
        self.analyze_with(bytes, |hash| find_duplicate(hash, known_hashes, threshold))
    }

    /// Analyze an encoded image, asking `lookup` for the closest duplicate
    ///
    /// `lookup` gets the image fingerprint and returns the similarity of the
    /// closest known match. It is not called for unreadable input.
    pub fn analyze_with<F>(&self, bytes: &[u8], lookup: F) -> PhotoReport
    where
        F: FnOnce(u64) -> Option<f64>,
    {
        let image = match image::load_from_memory(bytes) {
            Ok(image) => image,
            Err(e) => {
                tracing::warn!(size = bytes.len(), "Unreadable photo: {}", e);
                return self.unreadable(bytes.len());
            }
        };

        let gray = image.to_luma8();
        let rgb = image.to_rgb8();
        let resolution = Resolution::new(image.width(), image.height());
        let mut warnings = Vec::new();

        if !resolution.meets(self.config.min_width, self.config.min_height) {
            warnings.push(WARN_LOW_RESOLUTION.to_string());
        }

        let blur_score = (laplacian_variance(&gray) / self.config.blur_normalizer).min(1.0);
        if blur_score < self.config.blur_warning {
            warnings.push(WARN_BLURRY.to_string());
        }

        let brightness = mean_brightness(&gray);
        if brightness < self.config.dark_brightness {
            warnings.push(WARN_DARK.to_string());
        } else if brightness > self.config.bright_brightness {
            warnings.push(WARN_OVEREXPOSED.to_string());
        }

        if bytes.len() > self.config.max_file_size_bytes {
            warnings.push(WARN_LARGE_FILE.to_string());
        }

        let exif = read_exif(bytes);
        if !exif.has_gps {
            warnings.push(WARN_NO_GPS.to_string());
        }

        let dark_material_ratio = dark_pixel_ratio(&rgb, self.config.dark_value_threshold);
        let dark_material_detected = dark_material_ratio >= self.config.dark_ratio_threshold;
        let dark_material_confidence = if dark_material_detected {
            (dark_material_ratio * 3.0).min(1.0)
        } else {
            0.0
        };

        let hash = average_hash(&gray);
        let duplicate = lookup(hash);
        if let Some(similarity) = duplicate {
            warnings.push(format!(
                "Possible duplicate image (similarity: {:.0}%)",
                similarity * 100.0
            ));
        }

        let quality_score = quality_score(&QualityFactors {
            sharpness: blur_score,
            brightness,
            has_gps: exif.has_gps,
            resolution,
            is_duplicate: duplicate.is_some(),
        });
        if quality_score < self.config.low_quality_threshold {
            warnings.push(WARN_LOW_QUALITY.to_string());
        }

        tracing::debug!(
            width = resolution.width,
            height = resolution.height,
            quality_score,
            duplicate = duplicate.is_some(),
            "Photo analyzed"
        );

        PhotoReport {
            quality_score,
            blur_score,
            brightness,
            resolution,
            file_size_bytes: bytes.len(),
            dark_material_ratio,
            dark_material_detected,
            dark_material_confidence,
            duplicate_flag: duplicate.is_some(),
            duplicate_similarity: duplicate.unwrap_or(0.0),
            perceptual_hash: format_hash(hash),
            exif,
            warnings,
            analyzed_at: Utc::now(),
        }
    }

    fn unreadable(&self, file_size_bytes: usize) -> PhotoReport {
        let mut warnings = vec![
            WARN_UNREADABLE.to_string(),
            WARN_LOW_RESOLUTION.to_string(),
            WARN_BLURRY.to_string(),
        ];
        if file_size_bytes > self.config.max_file_size_bytes {
            warnings.push(WARN_LARGE_FILE.to_string());
        }
        warnings.push(WARN_NO_GPS.to_string());
        warnings.push(WARN_LOW_QUALITY.to_string());

        PhotoReport {
            quality_score: 0.0,
            blur_score: 0.0,
            brightness: 0.0,
            resolution: Resolution::default(),
            file_size_bytes,
            dark_material_ratio: 0.0,
            dark_material_detected: false,
            dark_material_confidence: 0.0,
            duplicate_flag: false,
            duplicate_similarity: 0.0,
            perceptual_hash: String::new(),
            exif: ExifSummary::default(),
            warnings,
            analyzed_at: Utc::now(),
        }
    }
}
