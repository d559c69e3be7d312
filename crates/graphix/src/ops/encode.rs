//! Re-encode cycles: Compress, WebOptimize, and the filename-only Convert.

use std::path::Path;

use image::{DynamicImage, RgbImage};

use crate::{
    ast::{ImageFormat, WebOptimizeMode},
    backend::{EncodeParams, ImageCodec, ImageHandle},
    error::RunResult,
    ops::{channel, restore_mode},
    value::ImageValue,
};

/// Encodes through JPEG at `quality` and decodes back, restoring the
/// original color mode. A formerly transparent image comes back with opaque
/// alpha — the alpha data does not survive the JPEG round trip.
pub fn compress<C: ImageCodec>(handle: &mut ImageHandle, quality: u8, codec: &C) -> RunResult<()> {
    let original = handle.image.color();
    let bytes = codec.encode(
        handle,
        ImageFormat::Jpg,
        EncodeParams {
            quality: Some(quality),
            ..EncodeParams::default()
        },
    )?;
    let decoded = codec.decode(&bytes)?;
    *handle = ImageHandle {
        image: restore_mode(decoded.image, original),
        format: decoded.format,
        exif: None,
    };
    Ok(())
}

/// Re-encodes for web delivery: lossless goes through PNG at maximum
/// compression, lossy flattens alpha onto white and goes through JPEG at
/// `quality`.
pub fn web_optimize<C: ImageCodec>(
    handle: &mut ImageHandle,
    mode: WebOptimizeMode,
    quality: u8,
    codec: &C,
) -> RunResult<()> {
    let bytes = match mode {
        WebOptimizeMode::Lossless => codec.encode(
            handle,
            ImageFormat::Png,
            EncodeParams {
                max_compression: true,
                ..EncodeParams::default()
            },
        )?,
        WebOptimizeMode::Lossy => {
            let flattened = ImageHandle::new(flatten_onto_white(&handle.image));
            codec.encode(
                &flattened,
                ImageFormat::Jpg,
                EncodeParams {
                    quality: Some(quality),
                    ..EncodeParams::default()
                },
            )?
        }
    };
    *handle = codec.decode(&bytes)?;
    Ok(())
}

/// Swaps the logical filename's extension; the pixel buffer is untouched
/// and the actual encoding happens at export.
pub fn convert(image: &mut ImageValue, format: ImageFormat) {
    let current = image.filename.clone().unwrap_or_else(|| "image.png".to_owned());
    let stem = Path::new(&current)
        .file_stem()
        .map_or_else(|| "image".to_owned(), |stem| stem.to_string_lossy().into_owned());
    image.filename = Some(format!("{stem}.{}", format.extension()));
}

fn flatten_onto_white(image: &DynamicImage) -> DynamicImage {
    if !image.color().has_alpha() {
        return DynamicImage::ImageRgb8(image.to_rgb8());
    }
    let rgba = image.to_rgba8();
    let mut rgb = RgbImage::new(rgba.width(), rgba.height());
    for (source, target) in rgba.pixels().zip(rgb.pixels_mut()) {
        let alpha = f64::from(source.0[3]) / 255.0;
        for index in 0..3 {
            target.0[index] = channel(f64::from(source.0[index]) * alpha + 255.0 * (1.0 - alpha));
        }
    }
    DynamicImage::ImageRgb8(rgb)
}
