//! Procedural background used when no provider could supply one.
//!
//! The output depends only on the requested dimensions, so every placeholder
//! of a given size is byte-for-byte identical.

use std::io::Cursor;

use image::{ImageFormat, Rgba, RgbaImage};
use tracing::error;

const GRADIENT_TOP: [u8; 3] = [15, 23, 42];
const GRADIENT_BOTTOM: [u8; 3] = [30, 41, 59];
const LINE_COLOR: Rgba<u8> = Rgba([59, 130, 246, 77]);
const LINE_ROWS: u32 = 15;

/// Vertical offset of a pattern line at column `x` for the given row.
pub fn noise(x: f64, row: u32) -> f64 {
    (x * 0.01 + f64::from(row)).sin() * 50.0 + (x * 0.02).cos() * 30.0
}

/// Draws the placeholder: a dark vertical gradient crossed by fifteen
/// sinusoidal lines spaced `height / 15` apart.
pub fn render_placeholder(width: u32, height: u32) -> RgbaImage {
    let mut img = RgbaImage::new(width, height);
    let span = height.saturating_sub(1).max(1) as f32;
    for y in 0..height {
        let t = y as f32 / span;
        let color = Rgba([
            lerp(GRADIENT_TOP[0], GRADIENT_BOTTOM[0], t),
            lerp(GRADIENT_TOP[1], GRADIENT_BOTTOM[1], t),
            lerp(GRADIENT_TOP[2], GRADIENT_BOTTOM[2], t),
            255,
        ]);
        for x in 0..width {
            img.put_pixel(x, y, color);
        }
    }

    let spacing = f64::from(height) / f64::from(LINE_ROWS);
    for row in 0..LINE_ROWS {
        let baseline = f64::from(row) * spacing;
        let mut previous: Option<i64> = None;
        for x in 0..width {
            let y = (baseline + noise(f64::from(x), row)).round() as i64;
            // join consecutive samples so steep slopes stay continuous
            let (from, to) = match previous {
                Some(prev) if prev < y => (prev + 1, y),
                Some(prev) if prev > y => (y, prev - 1),
                _ => (y, y),
            };
            for py in from..=to {
                blend_pixel(&mut img, i64::from(x), py, LINE_COLOR, 1.0);
                blend_pixel(&mut img, i64::from(x), py + 1, LINE_COLOR, 1.0);
            }
            previous = Some(y);
        }
    }
    img
}

/// Placeholder encoded as PNG.
///
/// Encoding into memory only fails for degenerate dimensions; in that case
/// the error is logged and an empty buffer comes back, which the pipeline
/// does not cache and the renderer treats as an undecodable background.
pub fn placeholder_png(width: u32, height: u32) -> Vec<u8> {
    match encode_png(&render_placeholder(width, height)) {
        Ok(bytes) => bytes,
        Err(err) => {
            error!("Failed to encode {}x{} placeholder: {}", width, height, err);
            Vec::new()
        }
    }
}

/// Encodes an RGBA canvas as PNG.
pub fn encode_png(img: &RgbaImage) -> Result<Vec<u8>, image::ImageError> {
    let mut out = Cursor::new(Vec::new());
    img.write_to(&mut out, ImageFormat::Png)?;
    Ok(out.into_inner())
}

/// Alpha-blends `color` onto the pixel at (`x`, `y`), ignoring anything
/// outside the canvas. `coverage` scales the colour's own alpha.
pub(crate) fn blend_pixel(img: &mut RgbaImage, x: i64, y: i64, color: Rgba<u8>, coverage: f32) {
    if x < 0 || y < 0 || x >= i64::from(img.width()) || y >= i64::from(img.height()) {
        return;
    }
    let alpha = (f32::from(color.0[3]) / 255.0) * coverage.clamp(0.0, 1.0);
    if alpha <= 0.0 {
        return;
    }
    let inv = 1.0 - alpha;
    let dst = img.get_pixel_mut(x as u32, y as u32);
    for channel in 0..3 {
        dst.0[channel] =
            (f32::from(color.0[channel]) * alpha + f32::from(dst.0[channel]) * inv).round() as u8;
    }
    dst.0[3] = 255;
}

fn lerp(from: u8, to: u8, t: f32) -> u8 {
    (f32::from(from) + (f32::from(to) - f32::from(from)) * t).round() as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn placeholder_is_deterministic_for_dimensions() {
        let first = placeholder_png(1200, 630);
        let second = placeholder_png(1200, 630);
        assert!(!first.is_empty());
        assert_eq!(first, second);
    }

    #[test]
    fn placeholder_decodes_at_requested_size() {
        let bytes = placeholder_png(1200, 630);
        let decoded = image::load_from_memory(&bytes).expect("decode placeholder");
        assert_eq!(decoded.width(), 1200);
        assert_eq!(decoded.height(), 630);
    }

    #[test]
    fn gradient_endpoints() {
        assert_eq!(lerp(15, 30, 0.0), 15);
        assert_eq!(lerp(15, 30, 1.0), 30);
        assert_eq!(lerp(42, 59, 0.5), 51);
    }

    #[test]
    fn placeholder_is_opaque() {
        let img = render_placeholder(320, 180);
        assert!(img.pixels().all(|p| p.0[3] == 255));
    }

    #[test]
    fn noise_matches_formula() {
        let value = noise(100.0, 3);
        let expected = (1.0f64 + 3.0).sin() * 50.0 + (2.0f64).cos() * 30.0;
        assert!((value - expected).abs() < 1e-9);
    }

    #[test]
    fn blend_ignores_out_of_bounds() {
        let mut img = RgbaImage::new(2, 2);
        blend_pixel(&mut img, -1, 0, Rgba([255, 0, 0, 255]), 1.0);
        blend_pixel(&mut img, 0, 5, Rgba([255, 0, 0, 255]), 1.0);
        assert!(img.pixels().all(|p| p.0 == [0, 0, 0, 0]));
        blend_pixel(&mut img, 1, 1, Rgba([255, 0, 0, 255]), 1.0);
        assert_eq!(img.get_pixel(1, 1).0, [255, 0, 0, 255]);
    }
}
