//! Text and image watermarking.

use ab_glyph::{FontArc, PxScale};
use image::{DynamicImage, Rgb, Rgba, RgbaImage, imageops};
use imageproc::drawing::draw_text_mut;

use crate::{
    backend::ImageHandle,
    error::{ErrorKind, RunResult},
    ops::restore_mode,
};

/// Parses a watermark color literal.
///
/// Hex form is `RRGGBB`; RGB form is `rrr,ggg,bbb` or a 9-digit
/// `rrrgggbbb` block. Both may arrive wrapped in the producer's `~H`/`~R`
/// sigils, which are stripped from the ends before parsing.
pub fn parse_color(raw: &str, is_hex: bool) -> RunResult<Rgb<u8>> {
    let malformed = || ErrorKind::EvaluationError.msg(format!("malformed color value: {raw}"));
    if is_hex {
        let text = raw.trim_matches(['~', 'H']);
        if text.len() < 6 || !text.is_char_boundary(6) {
            return Err(malformed());
        }
        let r = u8::from_str_radix(&text[0..2], 16).map_err(|_| malformed())?;
        let g = u8::from_str_radix(&text[2..4], 16).map_err(|_| malformed())?;
        let b = u8::from_str_radix(&text[4..6], 16).map_err(|_| malformed())?;
        return Ok(Rgb([r, g, b]));
    }
    let text = raw.trim_matches(['~', 'R']);
    if text.contains(',') {
        let parts: Vec<&str> = text.split(',').collect();
        let [r, g, b] = parts.as_slice() else {
            return Err(malformed());
        };
        let r: u8 = r.trim().parse().map_err(|_| malformed())?;
        let g: u8 = g.trim().parse().map_err(|_| malformed())?;
        let b: u8 = b.trim().parse().map_err(|_| malformed())?;
        return Ok(Rgb([r, g, b]));
    }
    if text.len() < 9 || !text.is_ascii() {
        return Err(malformed());
    }
    let r: u8 = text[0..3].parse().map_err(|_| malformed())?;
    let g: u8 = text[3..6].parse().map_err(|_| malformed())?;
    let b: u8 = text[6..9].parse().map_err(|_| malformed())?;
    Ok(Rgb([r, g, b]))
}

/// Loads the first usable TrueType font from the platform's usual spots.
pub fn find_system_font() -> RunResult<FontArc> {
    let candidates: &[&str] = if cfg!(target_os = "windows") {
        &[
            "C:\\Windows\\Fonts\\arial.ttf",
            "C:\\Windows\\Fonts\\segoeui.ttf",
            "C:\\Windows\\Fonts\\tahoma.ttf",
        ]
    } else if cfg!(target_os = "macos") {
        &[
            "/Library/Fonts/Arial.ttf",
            "/System/Library/Fonts/Supplemental/Arial.ttf",
            "/System/Library/Fonts/SFNSText.ttf",
        ]
    } else {
        &[
            "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
            "/usr/share/fonts/TTF/DejaVuSans.ttf",
            "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
            "/usr/share/fonts/liberation/LiberationSans-Regular.ttf",
        ]
    };
    for path in candidates {
        if let Ok(data) = std::fs::read(path)
            && let Ok(font) = FontArc::try_from_vec(data)
        {
            return Ok(font);
        }
    }
    ErrorKind::BackendError.err("no usable system font found for text watermarking")
}

/// Draws `text` centered over the image: a black drop shadow offset by
/// (+2, +2) at half alpha, then the foreground color at full alpha,
/// composited onto an RGBA copy. The original color mode is restored
/// afterwards. Font size is `min(w, h) / 20`.
pub fn draw_text(handle: &mut ImageHandle, text: &str, color: Rgb<u8>, font: &FontArc) {
    let (width, height) = (handle.width(), handle.height());
    let size = (width.min(height) / 20).max(1) as f32;
    let scale = PxScale::from(size);
    // estimated extent; exact glyph metrics are not worth a layout pass here
    let text_w = (size * text.chars().count() as f32 * 0.6) as i32;
    let text_h = (size * 1.2) as i32;
    let x = (width as i32 - text_w) / 2;
    let y = (height as i32 - text_h) / 2;

    let mut layer = RgbaImage::new(width, height);
    draw_text_mut(&mut layer, Rgba([0, 0, 0, 128]), x + 2, y + 2, scale, font, text);
    let Rgb([r, g, b]) = color;
    draw_text_mut(&mut layer, Rgba([r, g, b, 255]), x, y, scale, font, text);

    let original = handle.image.color();
    let mut base = handle.image.to_rgba8();
    imageops::overlay(&mut base, &layer, 0, 0);
    handle.image = restore_mode(DynamicImage::ImageRgba8(base), original);
}

/// Pastes `watermark` into the bottom-right corner with a 10px margin,
/// downscaled to at most a quarter of the base width (ratio preserved) and
/// with its alpha clamped to `transparency`.
pub fn overlay_image(handle: &mut ImageHandle, watermark: &DynamicImage, transparency: u8) {
    let (base_w, base_h) = (handle.width(), handle.height());
    let (wm_w, wm_h) = (watermark.width(), watermark.height());
    if wm_w == 0 || wm_h == 0 {
        return;
    }
    let new_w = (base_w / 4).min(wm_w).max(1);
    let new_h = ((u64::from(wm_h) * u64::from(new_w)) / u64::from(wm_w)).max(1) as u32;
    let mut scaled = watermark
        .resize_exact(new_w, new_h, imageops::FilterType::Lanczos3)
        .to_rgba8();
    for pixel in scaled.pixels_mut() {
        pixel.0[3] = pixel.0[3].min(transparency);
    }
    let x = i64::from(base_w) - i64::from(new_w) - 10;
    let y = i64::from(base_h) - i64::from(new_h) - 10;

    let original = handle.image.color();
    let mut base = handle.image.to_rgba8();
    imageops::overlay(&mut base, &scaled, x, y);
    handle.image = restore_mode(DynamicImage::ImageRgba8(base), original);
}
