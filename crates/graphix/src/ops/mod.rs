//! The image operation library.
//!
//! Each operation takes the resolved image (or its handle) plus parameters
//! and replaces the raster atomically on success. Identifier resolution,
//! diagnostics, and operation counting live in the interpreter; the
//! functions here are pure pixel/format work over the backend types.

pub mod encode;
pub mod enhance;
pub mod filters;
pub mod geometry;
pub mod metadata;
pub mod rename;
pub mod watermark;

use image::{ColorType, DynamicImage};

/// Converts a raster back to the color layout recorded before a re-encode
/// cycle or an RGBA working copy. Alpha regained this way is fully opaque.
pub(crate) fn restore_mode(image: DynamicImage, original: ColorType) -> DynamicImage {
    match original {
        ColorType::L8 => DynamicImage::ImageLuma8(image.to_luma8()),
        ColorType::La8 => DynamicImage::ImageLumaA8(image.to_luma_alpha8()),
        ColorType::Rgb8 => DynamicImage::ImageRgb8(image.to_rgb8()),
        ColorType::Rgba8 => DynamicImage::ImageRgba8(image.to_rgba8()),
        _ => image,
    }
}

/// Rounds and clamps a float channel into `u8` range.
pub(crate) fn channel(value: f64) -> u8 {
    value.round().clamp(0.0, 255.0) as u8
}
