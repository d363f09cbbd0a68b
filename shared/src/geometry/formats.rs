//! Boundary file readers (KML, GeoJSON)

use serde_json::Value;

use super::GeometryError;
use crate::types::LonLat;

/// Read the vertex list from the first `<coordinates>` element of a KML document
///
/// Tuples are `lon,lat[,alt]` separated by whitespace. The element may carry a
/// namespace prefix (`<kml:coordinates>`) and its body may be wrapped in
/// CDATA. Tuples with fewer than two components are skipped.
pub fn parse_kml_coordinates(kml: &str) -> Result<Vec<LonLat>, GeometryError> {
    let text = coordinates_text(kml).ok_or(GeometryError::NoCoordinates)?;
    let text = strip_cdata(text);

    let mut vertices = Vec::new();
    for tuple in text.split_whitespace() {
        let mut parts = tuple.split(',');
        let (Some(lon), Some(lat)) = (parts.next(), parts.next()) else {
            continue;
        };
        vertices.push(LonLat::new(parse_degree(lon)?, parse_degree(lat)?));
    }

    if vertices.is_empty() {
        return Err(GeometryError::NoCoordinates);
    }
    Ok(vertices)
}

fn coordinates_text(kml: &str) -> Option<&str> {
    let mut cursor = 0;
    while let Some(offset) = kml[cursor..].find('<') {
        let start = cursor + offset;
        let tag_end = start + kml[start..].find('>')?;
        let tag = &kml[start + 1..tag_end];
        let name = tag.split_whitespace().next().unwrap_or("");
        let local = name.rsplit(':').next().unwrap_or(name);

        if local == "coordinates" && !tag.ends_with('/') {
            let body_start = tag_end + 1;
            let close = kml[body_start..].find("</")?;
            return Some(&kml[body_start..body_start + close]);
        }
        cursor = tag_end + 1;
    }
    None
}

fn strip_cdata(text: &str) -> &str {
    let trimmed = text.trim();
    trimmed
        .strip_prefix("<![CDATA[")
        .and_then(|inner| inner.strip_suffix("]]>"))
        .unwrap_or(text)
}

fn parse_degree(raw: &str) -> Result<f64, GeometryError> {
    raw.trim()
        .parse::<f64>()
        .map_err(|_| GeometryError::Format(format!("invalid coordinate '{}'", raw.trim())))
}

/// Read the exterior ring of a GeoJSON polygon
///
/// Accepts a bare `Polygon` or `MultiPolygon` geometry, a `Feature`, or a
/// `FeatureCollection` (first feature carrying a polygon).
pub fn parse_geojson_boundary(json: &str) -> Result<Vec<LonLat>, GeometryError> {
    let value: Value =
        serde_json::from_str(json).map_err(|e| GeometryError::Format(e.to_string()))?;
    let ring = exterior_ring(&value).ok_or(GeometryError::NoCoordinates)?;

    ring.iter()
        .map(|position| {
            let pair = position
                .as_array()
                .filter(|p| p.len() >= 2)
                .ok_or_else(|| GeometryError::Format("position must be [lon, lat]".into()))?;
            match (pair[0].as_f64(), pair[1].as_f64()) {
                (Some(lon), Some(lat)) => Ok(LonLat::new(lon, lat)),
                _ => Err(GeometryError::Format("position values must be numbers".into())),
            }
        })
        .collect()
}

fn exterior_ring(value: &Value) -> Option<&Vec<Value>> {
    match value.get("type")?.as_str()? {
        "Polygon" => value.get("coordinates")?.get(0)?.as_array(),
        "MultiPolygon" => value.get("coordinates")?.get(0)?.get(0)?.as_array(),
        "Feature" => exterior_ring(value.get("geometry")?),
        "FeatureCollection" => value
            .get("features")?
            .as_array()?
            .iter()
            .find_map(exterior_ring),
        _ => None,
    }
}
