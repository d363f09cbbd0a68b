//! Planar shape features of a plot polygon

use std::f64::consts::PI;

use geo::{Area, BoundingRect, Centroid, ConvexHull, LineString};
use serde::{Deserialize, Serialize};

use super::PlotPolygon;
use crate::types::LonLat;

/// Meters per decimal degree used by the planar approximation.
///
/// Adequate at field-plot scale; not valid near the poles.
pub const METERS_PER_DEGREE: f64 = 111_320.0;

/// Square meters per hectare
pub const SQ_METERS_PER_HECTARE: f64 = 10_000.0;

/// Shape features derived from a plot polygon
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlotFeatures {
    pub area_ha: f64,
    pub area_sq_m: f64,
    pub perimeter_m: f64,
    /// Distinct exterior vertices
    pub vertex_count: usize,
    /// perimeter² / (4π·area); 1.0 for a circle, larger when irregular
    pub shape_complexity: f64,
    /// Bounding-box width / height
    pub aspect_ratio: f64,
    /// area / convex hull area, at most 1.0
    pub convexity: f64,
    pub centroid: LonLat,
    pub bbox_width_m: f64,
    pub bbox_height_m: f64,
}

/// Derive features from a polygon
pub fn extract_features(polygon: &PlotPolygon) -> PlotFeatures {
    let poly = polygon.as_geo();

    let area_deg2 = poly.unsigned_area();
    let area_sq_m = area_deg2 * METERS_PER_DEGREE * METERS_PER_DEGREE;
    let area_ha = area_sq_m / SQ_METERS_PER_HECTARE;

    let perimeter_deg = ring_length(poly.exterior())
        + poly.interiors().iter().map(ring_length).sum::<f64>();
    let perimeter_m = perimeter_deg * METERS_PER_DEGREE;

    let shape_complexity = if area_sq_m > 0.0 {
        perimeter_m.powi(2) / (4.0 * PI * area_sq_m)
    } else {
        0.0
    };

    let (bbox_width_m, bbox_height_m) = poly
        .bounding_rect()
        .map(|r| (r.width() * METERS_PER_DEGREE, r.height() * METERS_PER_DEGREE))
        .unwrap_or((0.0, 0.0));
    let aspect_ratio = if bbox_height_m > 0.0 {
        bbox_width_m / bbox_height_m
    } else {
        1.0
    };

    let hull_area = poly.convex_hull().unsigned_area();
    let convexity = if hull_area > 0.0 {
        (area_deg2 / hull_area).min(1.0)
    } else {
        1.0
    };

    let vertices = polygon.vertices();
    let centroid = poly
        .centroid()
        .map(|p| LonLat::new(p.x(), p.y()))
        .unwrap_or_else(|| vertex_mean(&vertices));

    PlotFeatures {
        area_ha,
        area_sq_m,
        perimeter_m,
        vertex_count: vertices.len(),
        shape_complexity,
        aspect_ratio,
        convexity,
        centroid,
        bbox_width_m,
        bbox_height_m,
    }
}

fn ring_length(ring: &LineString<f64>) -> f64 {
    ring.lines().map(|l| l.dx().hypot(l.dy())).sum()
}

/// Arithmetic mean of a vertex list
pub fn vertex_mean(vertices: &[LonLat]) -> LonLat {
    if vertices.is_empty() {
        return LonLat::new(0.0, 0.0);
    }
    let n = vertices.len() as f64;
    let (lon, lat) = vertices
        .iter()
        .fold((0.0, 0.0), |(x, y), v| (x + v.lon, y + v.lat));
    LonLat::new(lon / n, lat / n)
}
