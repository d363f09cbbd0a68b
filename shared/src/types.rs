//! Common types used across the engine

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A boundary vertex in decimal degrees
///
/// Serialized as a `[lon, lat]` pair so boundary payloads read like GeoJSON rings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f64; 2]", into = "[f64; 2]")]
pub struct LonLat {
    pub lon: f64,
    pub lat: f64,
}

impl LonLat {
    pub fn new(lon: f64, lat: f64) -> Self {
        Self { lon, lat }
    }

    pub fn is_finite(&self) -> bool {
        self.lon.is_finite() && self.lat.is_finite()
    }
}

impl From<[f64; 2]> for LonLat {
    fn from([lon, lat]: [f64; 2]) -> Self {
        Self { lon, lat }
    }
}

impl From<LonLat> for [f64; 2] {
    fn from(v: LonLat) -> Self {
        [v.lon, v.lat]
    }
}

impl From<(f64, f64)> for LonLat {
    fn from((lon, lat): (f64, f64)) -> Self {
        Self { lon, lat }
    }
}

/// GPS coordinates recovered from photo metadata
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GpsCoordinates {
    pub latitude: Decimal,
    pub longitude: Decimal,
}

impl GpsCoordinates {
    pub fn new(latitude: Decimal, longitude: Decimal) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Build from decimal degrees, keeping six places (~0.1 m)
    pub fn from_degrees(latitude: f64, longitude: f64) -> Option<Self> {
        let latitude = Decimal::try_from(latitude).ok()?.round_dp(6);
        let longitude = Decimal::try_from(longitude).ok()?.round_dp(6);
        Some(Self::new(latitude, longitude))
    }
}

/// An inclusive `[min, max]` band on a numeric signal
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Band {
    pub min: f64,
    pub max: f64,
}

impl Band {
    pub fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }
}
