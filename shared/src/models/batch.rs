//! Biomass-to-char conversion batch models

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::types::Band;

/// Expected char/biomass ratio for slow pyrolysis
pub const DEFAULT_RATIO_BAND: Band = Band {
    min: 0.20,
    max: 0.30,
};

/// Kiln type the batch was produced in
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum KilnType {
    BatchRetortKiln,
    ContinuousRetort,
    Tlud,
    RocketKiln,
    /// Unrecognized label, scored as a batch retort kiln
    Other(String),
}

impl KilnType {
    /// Parse the label used on batch records; unknown labels are kept verbatim
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_ascii_lowercase().as_str() {
            "batch retort kiln" | "batch_retort_kiln" => KilnType::BatchRetortKiln,
            "continuous retort" | "continuous_retort" => KilnType::ContinuousRetort,
            "tlud" => KilnType::Tlud,
            "rocket kiln" | "rocket_kiln" => KilnType::RocketKiln,
            _ => KilnType::Other(label.trim().to_string()),
        }
    }

    /// Numeric code used as a model feature
    pub fn code(&self) -> u8 {
        match self {
            KilnType::BatchRetortKiln => 1,
            KilnType::ContinuousRetort => 2,
            KilnType::Tlud => 3,
            KilnType::RocketKiln => 4,
            KilnType::Other(_) => 1,
        }
    }

    /// Lowercase snake_case key used for per-category configuration
    pub fn key(&self) -> String {
        match self {
            KilnType::BatchRetortKiln => "batch_retort_kiln".to_string(),
            KilnType::ContinuousRetort => "continuous_retort".to_string(),
            KilnType::Tlud => "tlud".to_string(),
            KilnType::RocketKiln => "rocket_kiln".to_string(),
            KilnType::Other(name) => name
                .trim()
                .to_ascii_lowercase()
                .split_whitespace()
                .collect::<Vec<_>>()
                .join("_"),
        }
    }
}

impl std::fmt::Display for KilnType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            KilnType::BatchRetortKiln => write!(f, "Batch Retort Kiln"),
            KilnType::ContinuousRetort => write!(f, "Continuous Retort"),
            KilnType::Tlud => write!(f, "TLUD"),
            KilnType::RocketKiln => write!(f, "Rocket Kiln"),
            KilnType::Other(name) => write!(f, "{}", name),
        }
    }
}

/// One recorded conversion of biomass into char
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BatchReading {
    /// Biomass fed in, kg
    pub biomass_in: f64,
    /// Char produced, kg
    pub char_out: f64,
    /// Kiln type label
    pub category: String,
}

impl BatchReading {
    pub fn new(biomass_in: f64, char_out: f64, category: impl Into<String>) -> Self {
        Self {
            biomass_in,
            char_out,
            category: category.into(),
        }
    }

    /// char_out / biomass_in
    pub fn ratio(&self) -> f64 {
        if self.biomass_in > 0.0 {
            self.char_out / self.biomass_in
        } else {
            0.0
        }
    }

    pub fn kiln_type(&self) -> KilnType {
        KilnType::from_label(&self.category)
    }

    /// Model feature vector: [biomass_in, char_out, ratio, category_code]
    pub fn feature_vector(&self) -> [f64; 4] {
        [
            self.biomass_in,
            self.char_out,
            self.ratio(),
            f64::from(self.kiln_type().code()),
        ]
    }

    /// CO2 removed, kg, rounded to 2 places
    pub fn co2_equivalent_kg(&self) -> Decimal {
        co2_equivalent_kg(self.char_out)
    }
}

/// char_out × 0.8 carbon fraction × 44/12 (CO2 per carbon mass), kg
pub fn co2_equivalent_kg(char_out: f64) -> Decimal {
    let char_out = Decimal::try_from(char_out).unwrap_or(Decimal::ZERO);
    let carbon_fraction = Decimal::new(8, 1);
    (char_out * carbon_fraction * Decimal::from(44) / Decimal::from(12)).round_dp(2)
}

/// Result of a single batch check
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BatchStatus {
    Verified,
    Flagged,
    Error,
}

impl std::fmt::Display for BatchStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BatchStatus::Verified => write!(f, "verified"),
            BatchStatus::Flagged => write!(f, "flagged"),
            BatchStatus::Error => write!(f, "error"),
        }
    }
}

/// Fixed-band rule on the conversion ratio
pub fn check_conversion_ratio(ratio: f64, band: &Band) -> BatchStatus {
    if band.contains(ratio) {
        BatchStatus::Verified
    } else {
        BatchStatus::Flagged
    }
}

/// Verdict for one batch
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchVerdict {
    pub rule_status: BatchStatus,
    pub ml_status: BatchStatus,
    pub combined_status: BatchStatus,
    /// Anomaly confidence in [0, 1]; higher is more anomalous
    pub confidence: f64,
    /// Raw model score; 0.0 when the model did not run
    pub anomaly_score: f64,
    pub ratio: f64,
    pub co2_equivalent_kg: Decimal,
    pub ratio_band: Band,
    pub kiln_type: KilnType,
    pub explanation: String,
    pub evaluated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kiln_codes() {
        assert_eq!(KilnType::from_label("Batch Retort Kiln").code(), 1);
        assert_eq!(KilnType::from_label("Continuous Retort").code(), 2);
        assert_eq!(KilnType::from_label("TLUD").code(), 3);
        assert_eq!(KilnType::from_label("rocket kiln").code(), 4);
        let other = KilnType::from_label("Pit");
        assert_eq!(other, KilnType::Other("Pit".into()));
        assert_eq!(other.code(), 1);
    }

    #[test]
    fn test_kiln_keys() {
        assert_eq!(KilnType::from_label("TLUD").key(), "tlud");
        assert_eq!(KilnType::from_label("Batch Retort Kiln").key(), "batch_retort_kiln");
        assert_eq!(KilnType::from_label("Open  Pit Kiln").key(), "open_pit_kiln");
    }

    #[test]
    fn test_ratio_and_features() {
        let reading = BatchReading::new(500.0, 125.0, "TLUD");
        assert_eq!(reading.ratio(), 0.25);
        assert_eq!(reading.feature_vector(), [500.0, 125.0, 0.25, 3.0]);
    }

    #[test]
    fn test_co2_equivalent_rounding() {
        // 125 × 0.8 × 44/12 = 366.666…
        let reading = BatchReading::new(500.0, 125.0, "TLUD");
        assert_eq!(reading.co2_equivalent_kg(), Decimal::new(36667, 2));
        assert_eq!(co2_equivalent_kg(0.0), Decimal::ZERO);
    }

    #[test]
    fn test_ratio_rule_band_edges() {
        assert_eq!(check_conversion_ratio(0.20, &DEFAULT_RATIO_BAND), BatchStatus::Verified);
        assert_eq!(check_conversion_ratio(0.30, &DEFAULT_RATIO_BAND), BatchStatus::Verified);
        assert_eq!(check_conversion_ratio(0.15, &DEFAULT_RATIO_BAND), BatchStatus::Flagged);
        assert_eq!(check_conversion_ratio(0.50, &DEFAULT_RATIO_BAND), BatchStatus::Flagged);
    }
}
