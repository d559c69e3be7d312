//! Geometric operations: rotation, centered crop, resize, orientation.

use image::imageops::FilterType as Resample;

use crate::{
    ast::{OrientationKind, RotateDirection},
    backend::ImageHandle,
    error::{ErrorKind, RunResult},
};

pub fn rotate(handle: &mut ImageHandle, direction: RotateDirection) {
    handle.image = match direction {
        RotateDirection::Left => handle.image.rotate270(),
        RotateDirection::Right => handle.image.rotate90(),
    };
}

/// Centered crop. Requested dimensions are capped at the current ones.
/// Returns the dimensions actually applied.
pub fn crop(handle: &mut ImageHandle, width: i64, height: i64) -> (u32, u32) {
    let (current_w, current_h) = (i64::from(handle.width()), i64::from(handle.height()));
    let w = width.min(current_w).max(1) as u32;
    let h = height.min(current_h).max(1) as u32;
    let x = if width < current_w { ((current_w - width) / 2).max(0) as u32 } else { 0 };
    let y = if height < current_h { ((current_h - height) / 2).max(0) as u32 } else { 0 };
    handle.image = handle.image.crop_imm(x, y, w, h);
    (w, h)
}

/// Parses an `a:b` aspect-ratio string into positive integers.
pub fn parse_aspect_ratio(raw: &str) -> RunResult<(u32, u32)> {
    let parts: Vec<&str> = raw.split(':').collect();
    let [a, b] = parts.as_slice() else {
        return ErrorKind::EvaluationError.err(format!("bad aspect ratio string: {raw}"));
    };
    let a: u32 = a.trim().parse().unwrap_or(0);
    let b: u32 = b.trim().parse().unwrap_or(0);
    if a == 0 || b == 0 {
        return ErrorKind::EvaluationError.err(format!("bad aspect ratio string: {raw}"));
    }
    Ok((a, b))
}

/// Resizes to the given `a:b` ratio: width is kept and height derived; if
/// the derived height exceeds the current one, width is derived from the
/// current height instead. Returns the new dimensions.
pub fn resize_to_ratio(handle: &mut ImageHandle, ratio_w: u32, ratio_h: u32) -> (u32, u32) {
    let (current_w, current_h) = (handle.width(), handle.height());
    let mut new_w = current_w;
    let mut new_h = (u64::from(current_w) * u64::from(ratio_h) / u64::from(ratio_w)) as u32;
    if new_h > current_h {
        new_h = current_h;
        new_w = (u64::from(current_h) * u64::from(ratio_w) / u64::from(ratio_h)) as u32;
    }
    let (new_w, new_h) = (new_w.max(1), new_h.max(1));
    handle.image = handle.image.resize_exact(new_w, new_h, Resample::Lanczos3);
    (new_w, new_h)
}

/// Resizes to explicit dimensions. With `maintain_ratio`, both axes scale by
/// the smaller of the two ratios so the result fits the request. Returns the
/// new dimensions.
pub fn resize_to_dims(handle: &mut ImageHandle, width: i64, height: i64, maintain_ratio: bool) -> (u32, u32) {
    let (current_w, current_h) = (handle.width(), handle.height());
    let (mut new_w, mut new_h) = (width.max(1) as u32, height.max(1) as u32);
    if maintain_ratio {
        let ratio = (f64::from(new_w) / f64::from(current_w)).min(f64::from(new_h) / f64::from(current_h));
        new_w = ((f64::from(current_w) * ratio) as u32).max(1);
        new_h = ((f64::from(current_h) * ratio) as u32).max(1);
    }
    handle.image = handle.image.resize_exact(new_w, new_h, Resample::Lanczos3);
    (new_w, new_h)
}

/// Rotates at most once toward the requested orientation. Square images and
/// already-matching ones are left alone. Returns whether a rotation
/// happened.
pub fn orient(handle: &mut ImageHandle, orientation: OrientationKind) -> bool {
    let (width, height) = (handle.width(), handle.height());
    match orientation {
        OrientationKind::Landscape if height > width => {
            handle.image = handle.image.rotate270();
            true
        }
        OrientationKind::Portrait if width > height => {
            handle.image = handle.image.rotate90();
            true
        }
        _ => false,
    }
}
