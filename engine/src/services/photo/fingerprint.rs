//! Average-intensity perceptual hash
//!
//! The image is reduced to 8×8 grayscale; each bit is set when its pixel is
//! brighter than the mean, first pixel in the most significant bit.

use image::imageops::{self, FilterType};
use image::GrayImage;

const HASH_SIDE: u32 = 8;
pub const HASH_BITS: u32 = 64;

pub fn average_hash(gray: &GrayImage) -> u64 {
    let small = imageops::resize(gray, HASH_SIDE, HASH_SIDE, FilterType::Lanczos3);
    let pixels = small.as_raw();
    let mean = pixels.iter().map(|&p| f64::from(p)).sum::<f64>() / pixels.len() as f64;

    pixels
        .iter()
        .fold(0u64, |hash, &p| (hash << 1) | u64::from(f64::from(p) > mean))
}

pub fn format_hash(hash: u64) -> String {
    format!("{:016x}", hash)
}

pub fn parse_hash(hex: &str) -> Option<u64> {
    if !shared::is_valid_average_hash(hex) {
        return None;
    }
    u64::from_str_radix(hex, 16).ok()
}

pub fn hamming_distance(a: u64, b: u64) -> u32 {
    (a ^ b).count_ones()
}

/// Closest known fingerprint within `threshold` bits, as a similarity in [0, 1]
///
/// Malformed entries in `known` are skipped.
pub fn find_duplicate<'a, I>(hash: u64, known: I, threshold: u32) -> Option<f64>
where
    I: IntoIterator<Item = &'a str>,
{
    closest_duplicate(hash, known.into_iter().filter_map(parse_hash), threshold)
}

/// Like [`find_duplicate`] over already parsed fingerprints
pub fn closest_duplicate<I>(hash: u64, known: I, threshold: u32) -> Option<f64>
where
    I: IntoIterator<Item = u64>,
{
    known
        .into_iter()
        .map(|other| hamming_distance(hash, other))
        .filter(|&distance| distance <= threshold)
        .min()
        .map(|distance| 1.0 - f64::from(distance) / f64::from(HASH_BITS))
}
