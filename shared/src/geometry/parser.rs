//! Boundary validation and self-intersection repair

use geo::algorithm::line_intersection::{line_intersection, LineIntersection};
use geo::{Area, BooleanOps, ConvexHull, Coord, Line, LineString, Polygon};
use serde::{Deserialize, Serialize};

use super::GeometryError;
use crate::types::LonLat;

/// Minimum number of distinct vertices for a plot boundary
pub const MIN_VERTICES: usize = 3;

/// Areas at or below this (square degrees, ~0.01 m²) count as degenerate
pub const MIN_AREA_DEG2: f64 = 1e-12;

/// A validated simple plot polygon in decimal degrees
///
/// Serialized as its exterior ring without the closing vertex. Deserializing
/// runs the same validation as [`parse_boundary`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(into = "Vec<LonLat>", try_from = "Vec<LonLat>")]
pub struct PlotPolygon(Polygon<f64>);

impl PlotPolygon {
    pub fn as_geo(&self) -> &Polygon<f64> {
        &self.0
    }

    /// Exterior vertices, without the closing duplicate
    pub fn vertices(&self) -> Vec<LonLat> {
        let coords = &self.0.exterior().0;
        let open = coords.len().saturating_sub(1);
        coords[..open]
            .iter()
            .map(|c| LonLat::new(c.x, c.y))
            .collect()
    }

    /// Planar area in square degrees
    pub fn area_deg2(&self) -> f64 {
        self.0.unsigned_area()
    }
}

impl From<PlotPolygon> for Vec<LonLat> {
    fn from(polygon: PlotPolygon) -> Self {
        polygon.vertices()
    }
}

impl TryFrom<Vec<LonLat>> for PlotPolygon {
    type Error = GeometryError;

    fn try_from(vertices: Vec<LonLat>) -> Result<Self, Self::Error> {
        parse_boundary(&vertices).map(|parsed| parsed.polygon)
    }
}

/// Outcome of parsing a boundary
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedBoundary {
    pub polygon: PlotPolygon,
    /// The input self-intersected and was re-noded
    pub repaired: bool,
}

/// Validate a vertex list and build a simple polygon from it
///
/// A closing vertex equal to the first one is ignored and consecutive
/// duplicates are collapsed. Self-intersecting rings are repaired by a
/// zero-width union with themselves; the largest surviving component is kept.
pub fn parse_boundary(vertices: &[LonLat]) -> Result<ParsedBoundary, GeometryError> {
    if vertices.is_empty() {
        return Err(GeometryError::NoCoordinates);
    }
    if vertices.iter().any(|v| !v.is_finite()) {
        return Err(GeometryError::NonFinite);
    }

    let ring = normalize_ring(vertices);
    let distinct = count_distinct(&ring);
    if distinct < MIN_VERTICES {
        return Err(GeometryError::TooFewVertices { found: distinct });
    }

    let polygon = Polygon::new(LineString::from(ring.clone()), vec![]);

    // Collinear input has no interior to repair
    if polygon.convex_hull().unsigned_area() <= MIN_AREA_DEG2 {
        return Err(GeometryError::ZeroArea);
    }

    if !is_simple(&ring) {
        let repaired = repair(&polygon).ok_or(GeometryError::Unrepairable)?;
        return Ok(ParsedBoundary {
            polygon: PlotPolygon(repaired),
            repaired: true,
        });
    }

    if polygon.unsigned_area() <= MIN_AREA_DEG2 {
        return Err(GeometryError::ZeroArea);
    }

    Ok(ParsedBoundary {
        polygon: PlotPolygon(polygon),
        repaired: false,
    })
}

fn normalize_ring(vertices: &[LonLat]) -> Vec<Coord<f64>> {
    let mut ring: Vec<Coord<f64>> = Vec::with_capacity(vertices.len());
    for v in vertices {
        let c = Coord { x: v.lon, y: v.lat };
        if ring.last() != Some(&c) {
            ring.push(c);
        }
    }
    while ring.len() > 1 && ring.first() == ring.last() {
        ring.pop();
    }
    ring
}

fn count_distinct(ring: &[Coord<f64>]) -> usize {
    let mut keys: Vec<(u64, u64)> = ring
        .iter()
        .map(|c| (c.x.to_bits(), c.y.to_bits()))
        .collect();
    keys.sort_unstable();
    keys.dedup();
    keys.len()
}

/// True when no two boundary segments cross, touch or fold back
fn is_simple(ring: &[Coord<f64>]) -> bool {
    let n = ring.len();
    let segments: Vec<Line<f64>> = (0..n)
        .map(|i| Line::new(ring[i], ring[(i + 1) % n]))
        .collect();

    for i in 0..n {
        for j in (i + 1)..n {
            let adjacent = j == i + 1 || (i == 0 && j == n - 1);
            match line_intersection(segments[i], segments[j]) {
                None => {}
                Some(LineIntersection::SinglePoint { .. }) => {
                    if !adjacent {
                        return false;
                    }
                }
                Some(LineIntersection::Collinear { intersection }) => {
                    if !adjacent || intersection.start != intersection.end {
                        return false;
                    }
                }
            }
        }
    }
    true
}

fn repair(polygon: &Polygon<f64>) -> Option<Polygon<f64>> {
    polygon
        .union(polygon)
        .0
        .into_iter()
        .filter(|p| p.unsigned_area() > MIN_AREA_DEG2)
        .max_by(|a, b| a.unsigned_area().total_cmp(&b.unsigned_area()))
}
