//! EXIF metadata: capture location, time and camera

use std::io::Cursor;

use exif::{Exif, In, Tag, Value};
use shared::{ExifSummary, GpsCoordinates};

/// Read what EXIF the container carries; anything missing stays `None`
pub fn read_exif(bytes: &[u8]) -> ExifSummary {
    let exif = match exif::Reader::new().read_from_container(&mut Cursor::new(bytes)) {
        Ok(exif) => exif,
        Err(_) => return ExifSummary::default(),
    };

    let gps = gps_coordinates(&exif);
    ExifSummary {
        has_gps: gps.is_some(),
        gps,
        captured_at: ascii_field(&exif, Tag::DateTimeOriginal)
            .or_else(|| ascii_field(&exif, Tag::DateTime)),
        camera_make: ascii_field(&exif, Tag::Make),
        camera_model: ascii_field(&exif, Tag::Model),
    }
}

fn ascii_field(exif: &Exif, tag: Tag) -> Option<String> {
    match &exif.get_field(tag, In::PRIMARY)?.value {
        Value::Ascii(parts) => parts
            .first()
            .map(|raw| String::from_utf8_lossy(raw).trim().to_string())
            .filter(|s| !s.is_empty()),
        _ => None,
    }
}

/// Degrees/minutes/seconds rationals to signed decimal degrees
fn dms_degrees(exif: &Exif, tag: Tag, ref_tag: Tag, negative_ref: &str) -> Option<f64> {
    let degrees = match &exif.get_field(tag, In::PRIMARY)?.value {
        Value::Rational(parts) if parts.len() >= 3 => {
            parts[0].to_f64() + parts[1].to_f64() / 60.0 + parts[2].to_f64() / 3600.0
        }
        _ => return None,
    };
    if !degrees.is_finite() {
        return None;
    }

    let negative = ascii_field(exif, ref_tag)
        .map(|r| r.eq_ignore_ascii_case(negative_ref))
        .unwrap_or(false);
    Some(if negative { -degrees } else { degrees })
}

fn gps_coordinates(exif: &Exif) -> Option<GpsCoordinates> {
    let latitude = dms_degrees(exif, Tag::GPSLatitude, Tag::GPSLatitudeRef, "S")?;
    let longitude = dms_degrees(exif, Tag::GPSLongitude, Tag::GPSLongitudeRef, "W")?;
    GpsCoordinates::from_degrees(latitude, longitude)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_non_image_bytes_have_no_exif() {
        let summary = read_exif(b"definitely not an image");
        assert!(!summary.has_gps);
        assert!(summary.gps.is_none());
        assert!(summary.camera_make.is_none());
    }
}
