//! `SetFilter` implementations: sepia, black-and-white, negative, sharpen.

use image::DynamicImage;

use crate::{ast::FilterType, backend::ImageHandle, ops::channel};

/// 3×3 sharpening kernel, normalized from `(-2 … 32 … -2) / 16`.
const SHARPEN_KERNEL: [f32; 9] = [
    -0.125, -0.125, -0.125, -0.125, 2.0, -0.125, -0.125, -0.125, -0.125,
];

pub fn apply(handle: &mut ImageHandle, filter: FilterType) {
    handle.image = match filter {
        FilterType::Sepia => sepia(&handle.image),
        FilterType::Bw => {
            let luma = handle.image.to_luma8();
            DynamicImage::ImageRgb8(DynamicImage::ImageLuma8(luma).to_rgb8())
        }
        FilterType::Negative => {
            let mut rgb = DynamicImage::ImageRgb8(handle.image.to_rgb8());
            rgb.invert();
            rgb
        }
        FilterType::Sharpen => handle.image.filter3x3(&SHARPEN_KERNEL),
    };
}

fn sepia(image: &DynamicImage) -> DynamicImage {
    let mut rgb = image.to_rgb8();
    for pixel in rgb.pixels_mut() {
        let [r, g, b] = pixel.0;
        let (r, g, b) = (f64::from(r), f64::from(g), f64::from(b));
        pixel.0 = [
            channel(0.393 * r + 0.769 * g + 0.189 * b),
            channel(0.349 * r + 0.686 * g + 0.168 * b),
            channel(0.272 * r + 0.534 * g + 0.131 * b),
        ];
    }
    DynamicImage::ImageRgb8(rgb)
}
