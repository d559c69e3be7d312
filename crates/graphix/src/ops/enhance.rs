//! Per-pixel enhancement operations: brightness, contrast, opacity, noise,
//! blur, pixelate, quantize, and hue rotation.

use color_quant::NeuQuant;
use image::{DynamicImage, imageops::FilterType as Resample};
use rand::Rng;

use crate::{
    backend::ImageHandle,
    ops::{channel, restore_mode},
};

/// Scales the color channels by `value / 100` (100 is identity).
pub fn brightness(handle: &mut ImageHandle, value: f64) {
    let factor = value / 100.0;
    let original = handle.image.color();
    let mut rgba = handle.image.to_rgba8();
    for pixel in rgba.pixels_mut() {
        for component in &mut pixel.0[..3] {
            *component = channel(f64::from(*component) * factor);
        }
    }
    handle.image = restore_mode(DynamicImage::ImageRgba8(rgba), original);
}

/// Interpolates the color channels between the mean luminance and the
/// original by `value / 100`, matching the usual enhancer semantics.
pub fn contrast(handle: &mut ImageHandle, value: f64) {
    let factor = value / 100.0;
    let original = handle.image.color();
    let luma = handle.image.to_luma8();
    let pixel_count = u64::from(luma.width()) * u64::from(luma.height());
    if pixel_count == 0 {
        return;
    }
    let total: u64 = luma.pixels().map(|p| u64::from(p.0[0])).sum();
    let mean = (total as f64 / pixel_count as f64 + 0.5).floor();
    let mut rgba = handle.image.to_rgba8();
    for pixel in rgba.pixels_mut() {
        for component in &mut pixel.0[..3] {
            *component = channel(mean + factor * (f64::from(*component) - mean));
        }
    }
    handle.image = restore_mode(DynamicImage::ImageRgba8(rgba), original);
}

/// Ensures an alpha channel and multiplies it by `value / 100`.
pub fn opacity(handle: &mut ImageHandle, value: f64) {
    let factor = value / 100.0;
    let mut rgba = handle.image.to_rgba8();
    for pixel in rgba.pixels_mut() {
        pixel.0[3] = channel(f64::from(pixel.0[3]) * factor);
    }
    handle.image = DynamicImage::ImageRgba8(rgba);
}

/// Adds uniform noise in `[-L, L]` where `L = round(value * 2.55)`. The same
/// offset is applied to all three channels of a pixel, so the noise is
/// achromatic.
pub fn noise(handle: &mut ImageHandle, value: f64, rng: &mut impl Rng) {
    let level = (value * 2.55).round().max(0.0) as i32;
    let mut rgb = handle.image.to_rgb8();
    for pixel in rgb.pixels_mut() {
        let offset = rng.gen_range(-level..=level);
        for component in &mut pixel.0 {
            *component = (i32::from(*component) + offset).clamp(0, 255) as u8;
        }
    }
    handle.image = DynamicImage::ImageRgb8(rgb);
}

/// Gaussian blur with radius `value / 10`. Zero is a no-op.
pub fn blur(handle: &mut ImageHandle, value: f64) {
    let sigma = (value / 10.0) as f32;
    if sigma > 0.0 {
        handle.image = handle.image.blur(sigma);
    }
}

/// Nearest-neighbor downscale/upscale pixelation. Returns the block size
/// used.
///
/// The block formula `min(w, h) / (101 - value)` diverges as the value
/// approaches 100: at 100 the whole image collapses to a near-single block.
pub fn pixelate(handle: &mut ImageHandle, value: f64) -> u32 {
    let (width, height) = (handle.width(), handle.height());
    let value = value.clamp(0.0, 100.0);
    let block = (f64::from(width.min(height)) / (101.0 - value)).floor().max(1.0) as u32;
    let small = handle
        .image
        .resize_exact((width / block).max(1), (height / block).max(1), Resample::Nearest);
    handle.image = small.resize_exact(width, height, Resample::Nearest);
    block
}

/// Reduces the palette to at most `colors` entries via NeuQuant. Alpha is
/// preserved when the source had an alpha channel.
pub fn quantize(handle: &mut ImageHandle, colors: u32) {
    let had_alpha = handle.image.color().has_alpha();
    let mut rgba = handle.image.to_rgba8();
    let colors = colors.clamp(1, 256) as usize;
    let quantizer = NeuQuant::new(10, colors, rgba.as_raw());
    let palette = quantizer.color_map_rgba();
    for pixel in rgba.pixels_mut() {
        let base = quantizer.index_of(&pixel.0) * 4;
        pixel.0 = [palette[base], palette[base + 1], palette[base + 2], palette[base + 3]];
    }
    let quantized = DynamicImage::ImageRgba8(rgba);
    handle.image = if had_alpha {
        quantized
    } else {
        DynamicImage::ImageRgb8(quantized.to_rgb8())
    };
}

/// Rotates every pixel's hue by `degrees` (wrapped into 0..360) through an
/// HSV round trip.
pub fn hue(handle: &mut ImageHandle, degrees: f64) {
    let shift = degrees.rem_euclid(360.0) / 360.0;
    let mut rgb = handle.image.to_rgb8();
    for pixel in rgb.pixels_mut() {
        let [r, g, b] = pixel.0;
        let (h, s, v) = rgb_to_hsv(f64::from(r) / 255.0, f64::from(g) / 255.0, f64::from(b) / 255.0);
        let (r, g, b) = hsv_to_rgb((h + shift).rem_euclid(1.0), s, v);
        pixel.0 = [channel(r * 255.0), channel(g * 255.0), channel(b * 255.0)];
    }
    handle.image = DynamicImage::ImageRgb8(rgb);
}

fn rgb_to_hsv(r: f64, g: f64, b: f64) -> (f64, f64, f64) {
    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let value = max;
    if max == min {
        return (0.0, 0.0, value);
    }
    let saturation = (max - min) / max;
    let rc = (max - r) / (max - min);
    let gc = (max - g) / (max - min);
    let bc = (max - b) / (max - min);
    let hue = if r == max {
        bc - gc
    } else if g == max {
        2.0 + rc - bc
    } else {
        4.0 + gc - rc
    };
    ((hue / 6.0).rem_euclid(1.0), saturation, value)
}

fn hsv_to_rgb(h: f64, s: f64, v: f64) -> (f64, f64, f64) {
    if s == 0.0 {
        return (v, v, v);
    }
    let sector = (h * 6.0).floor();
    let fraction = h * 6.0 - sector;
    let p = v * (1.0 - s);
    let q = v * (1.0 - s * fraction);
    let t = v * (1.0 - s * (1.0 - fraction));
    match (sector as i64).rem_euclid(6) {
        0 => (v, t, p),
        1 => (q, v, p),
        2 => (p, v, t),
        3 => (p, q, v),
        4 => (t, p, v),
        _ => (v, p, q),
    }
}

#[cfg(test)]
mod tests {
    use image::{Rgb, RgbImage, Rgba, RgbaImage};
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    use super::*;

    fn rgb_handle(width: u32, height: u32, pixel: [u8; 3]) -> ImageHandle {
        ImageHandle::new(DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, Rgb(pixel))))
    }

    #[test]
    fn brightness_identity_at_100() {
        let mut handle = rgb_handle(2, 2, [10, 128, 250]);
        brightness(&mut handle, 100.0);
        assert_eq!(handle.image.to_rgb8().get_pixel(0, 0).0, [10, 128, 250]);
    }

    #[test]
    fn brightness_scales_and_clamps() {
        let mut handle = rgb_handle(1, 1, [100, 200, 0]);
        brightness(&mut handle, 150.0);
        assert_eq!(handle.image.to_rgb8().get_pixel(0, 0).0, [150, 255, 0]);
        let mut dark = rgb_handle(1, 1, [100, 50, 7]);
        brightness(&mut dark, 0.0);
        assert_eq!(dark.image.to_rgb8().get_pixel(0, 0).0, [0, 0, 0]);
    }

    #[test]
    fn brightness_keeps_color_mode() {
        let mut handle = rgb_handle(1, 1, [10, 20, 30]);
        brightness(&mut handle, 120.0);
        assert_eq!(handle.image.color(), image::ColorType::Rgb8);
    }

    #[test]
    fn contrast_zero_flattens_to_mean() {
        let image = RgbImage::from_fn(2, 1, |x, _| if x == 0 { Rgb([0, 0, 0]) } else { Rgb([200, 200, 200]) });
        let mut handle = ImageHandle::new(DynamicImage::ImageRgb8(image));
        contrast(&mut handle, 0.0);
        let rgb = handle.image.to_rgb8();
        assert_eq!(rgb.get_pixel(0, 0), rgb.get_pixel(1, 0));
    }

    #[test]
    fn opacity_scales_alpha_only() {
        let image = RgbaImage::from_pixel(1, 1, Rgba([5, 6, 7, 200]));
        let mut handle = ImageHandle::new(DynamicImage::ImageRgba8(image));
        opacity(&mut handle, 50.0);
        assert_eq!(handle.image.to_rgba8().get_pixel(0, 0).0, [5, 6, 7, 100]);
    }

    #[test]
    fn opacity_forces_alpha_channel() {
        let mut handle = rgb_handle(1, 1, [1, 2, 3]);
        opacity(&mut handle, 40.0);
        assert!(handle.image.color().has_alpha());
    }

    #[test]
    fn noise_zero_level_is_identity() {
        let mut handle = rgb_handle(3, 3, [120, 10, 250]);
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        noise(&mut handle, 0.0, &mut rng);
        assert_eq!(handle.image.to_rgb8().get_pixel(1, 1).0, [120, 10, 250]);
    }

    #[test]
    fn noise_stays_in_channel_range() {
        let mut handle = rgb_handle(8, 8, [250, 3, 128]);
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        noise(&mut handle, 100.0, &mut rng);
        // clamping keeps every channel valid; nothing stronger can be said
        assert_eq!(handle.image.color(), image::ColorType::Rgb8);
    }

    #[test]
    fn pixelate_at_100_collapses_to_one_block() {
        let image = RgbImage::from_fn(10, 10, |x, y| Rgb([(x * 20) as u8, (y * 20) as u8, 0]));
        let mut handle = ImageHandle::new(DynamicImage::ImageRgb8(image));
        let block = pixelate(&mut handle, 100.0);
        assert_eq!(block, 10);
        let rgb = handle.image.to_rgb8();
        let first = rgb.get_pixel(0, 0);
        assert!(rgb.pixels().all(|p| p == first));
        assert_eq!((handle.width(), handle.height()), (10, 10));
    }

    #[test]
    fn pixelate_block_floor_is_one() {
        let mut handle = rgb_handle(10, 10, [1, 2, 3]);
        assert_eq!(pixelate(&mut handle, 0.0), 1);
    }

    #[test]
    fn quantize_limits_distinct_colors() {
        let image = RgbImage::from_fn(16, 16, |x, y| Rgb([(x * 16) as u8, (y * 16) as u8, 77]));
        let mut handle = ImageHandle::new(DynamicImage::ImageRgb8(image));
        quantize(&mut handle, 4);
        let mut seen: Vec<[u8; 3]> = Vec::new();
        for pixel in handle.image.to_rgb8().pixels() {
            if !seen.contains(&pixel.0) {
                seen.push(pixel.0);
            }
        }
        assert!(seen.len() <= 4, "got {} colors", seen.len());
        assert_eq!(handle.image.color(), image::ColorType::Rgb8);
    }

    #[test]
    fn quantize_preserves_alpha_mode() {
        let image = RgbaImage::from_pixel(4, 4, Rgba([10, 20, 30, 128]));
        let mut handle = ImageHandle::new(DynamicImage::ImageRgba8(image));
        quantize(&mut handle, 2);
        assert!(handle.image.color().has_alpha());
    }

    #[test]
    fn hue_full_turn_is_near_identity() {
        let mut handle = rgb_handle(1, 1, [200, 60, 20]);
        hue(&mut handle, 360.0);
        let [r, g, b] = handle.image.to_rgb8().get_pixel(0, 0).0;
        assert!(i32::from(r).abs_diff(200) <= 1);
        assert!(i32::from(g).abs_diff(60) <= 1);
        assert!(i32::from(b).abs_diff(20) <= 1);
    }

    #[test]
    fn hue_half_turn_moves_red_toward_cyan() {
        let mut handle = rgb_handle(1, 1, [255, 0, 0]);
        hue(&mut handle, 180.0);
        let [r, g, b] = handle.image.to_rgb8().get_pixel(0, 0).0;
        assert!(r < 10);
        assert!(g > 245 && b > 245);
    }

    #[test]
    fn hsv_round_trip() {
        for (r, g, b) in [(0.2, 0.4, 0.9), (1.0, 0.0, 0.0), (0.5, 0.5, 0.5)] {
            let (h, s, v) = rgb_to_hsv(r, g, b);
            let (r2, g2, b2) = hsv_to_rgb(h, s, v);
            assert!((r - r2).abs() < 1e-9);
            assert!((g - g2).abs() < 1e-9);
            assert!((b - b2).abs() < 1e-9);
        }
    }
}
