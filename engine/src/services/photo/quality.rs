//! Per-pixel quality measures

use image::{GrayImage, RgbImage};

/// Variance of the 4-neighbour Laplacian over interior pixels
///
/// Images narrower or shorter than 3 pixels have no interior and score 0.
pub fn laplacian_variance(gray: &GrayImage) -> f64 {
    let (width, height) = gray.dimensions();
    if width < 3 || height < 3 {
        return 0.0;
    }

    let px = |x: u32, y: u32| f64::from(gray.get_pixel(x, y)[0]);
    let mut sum = 0.0;
    let mut sum_sq = 0.0;
    let mut count = 0.0;

    for y in 1..height - 1 {
        for x in 1..width - 1 {
            let response =
                px(x - 1, y) + px(x + 1, y) + px(x, y - 1) + px(x, y + 1) - 4.0 * px(x, y);
            sum += response;
            sum_sq += response * response;
            count += 1.0;
        }
    }

    let mean = sum / count;
    (sum_sq / count - mean * mean).max(0.0)
}

/// Mean luminance in [0, 1]
pub fn mean_brightness(gray: &GrayImage) -> f64 {
    let pixels = gray.as_raw();
    if pixels.is_empty() {
        return 0.0;
    }
    let total: u64 = pixels.iter().map(|&p| u64::from(p)).sum();
    total as f64 / pixels.len() as f64 / 255.0
}

/// Share of pixels whose HSV value (max channel) is at or below `max_value`
pub fn dark_pixel_ratio(rgb: &RgbImage, max_value: u8) -> f64 {
    let total = u64::from(rgb.width()) * u64::from(rgb.height());
    if total == 0 {
        return 0.0;
    }
    let dark = rgb
        .pixels()
        .filter(|p| p.0.iter().copied().max().unwrap_or(0) <= max_value)
        .count();
    dark as f64 / total as f64
}
