//! `StripMetadata` and `AddMetadata`.
//!
//! With a field-capable backend these edit the EXIF dictionary carried on
//! the image handle. Without one (the degraded capability), stripping falls
//! back to a plain re-encode without EXIF and adding only records the edit,
//! after a one-time warning. Every edit lands in the image's metadata log
//! either way.

use crate::{
    ast::{ImageFormat, MetadataField, StripCategory},
    backend::{EncodeParams, ExifDict, ExifIfd, ExifValue, ImageCodec, ImageHandle, MetadataBackend, tags},
    error::RunResult,
    io::DiagnosticWriter,
    value::ImageValue,
};

/// Removes metadata, wholesale or by category.
pub fn strip<C: ImageCodec, M: MetadataBackend>(
    image: &mut ImageValue,
    strip_all: bool,
    categories: &[StripCategory],
    codec: &C,
    meta: &M,
    diag: &mut impl DiagnosticWriter,
    meta_warned: &mut bool,
) -> RunResult<()> {
    let degraded = !meta.supports_fields();
    if degraded {
        warn_degraded(diag, meta_warned);
    }
    if !strip_all && !degraded && image.handle.exif.is_some() {
        strip_selective(image, categories, meta, diag)?;
    } else {
        // full strip: re-encode the raster without the EXIF payload
        let format = image.handle.format.unwrap_or(ImageFormat::Jpeg);
        let bytes = codec.encode(&image.handle, format, EncodeParams::default())?;
        let decoded = codec.decode(&bytes)?;
        image.handle = ImageHandle { exif: None, ..decoded };
    }
    if strip_all {
        image.metadata_log.insert("stripped_all".to_owned(), "true".to_owned());
    } else {
        for category in categories {
            image
                .metadata_log
                .insert(format!("stripped_{}", category_key(*category)), "true".to_owned());
        }
    }
    Ok(())
}

fn strip_selective<M: MetadataBackend>(
    image: &mut ImageValue,
    categories: &[StripCategory],
    meta: &M,
    diag: &mut impl DiagnosticWriter,
) -> RunResult<()> {
    let blob = image.handle.exif.clone().expect("checked by caller");
    let mut dict = match meta.load(&blob) {
        Ok(dict) => dict,
        Err(err) => {
            diag.line(&format!("Warning: error while stripping metadata: {err}"));
            return Ok(());
        }
    };
    let mut modified = false;
    for category in categories {
        modified |= match category {
            StripCategory::Gps => dict.remove_gps(),
            StripCategory::Camera => dict.remove_camera(),
        };
    }
    if modified {
        image.handle.exif = if dict.is_empty() {
            None
        } else {
            match meta.dump(&dict) {
                Ok(blob) => Some(blob),
                Err(err) => {
                    diag.line(&format!("Warning: error while stripping metadata: {err}"));
                    return Ok(());
                }
            }
        };
    }
    Ok(())
}

/// Writes one EXIF field and commits it by re-serializing and reloading the
/// image, so the raster and its payload agree.
pub fn add<C: ImageCodec, M: MetadataBackend>(
    image: &mut ImageValue,
    field: MetadataField,
    value: &str,
    codec: &C,
    meta: &M,
    diag: &mut impl DiagnosticWriter,
    meta_warned: &mut bool,
) -> RunResult<()> {
    if meta.supports_fields() {
        // a corrupt existing payload starts a fresh dictionary
        let mut dict = match image.handle.exif.as_deref() {
            Some(blob) => meta.load(blob).unwrap_or_default(),
            None => ExifDict::new(),
        };
        match field {
            MetadataField::Tags => dict.set(ExifIfd::Tiff, tags::XP_KEYWORDS, ExifValue::Byte(utf16le(value))),
            MetadataField::Title => dict.set(ExifIfd::Tiff, tags::XP_TITLE, ExifValue::Byte(utf16le(value))),
            MetadataField::Description => dict.set(ExifIfd::Tiff, tags::XP_COMMENT, ExifValue::Byte(utf16le(value))),
            MetadataField::Copyright => dict.set(ExifIfd::Tiff, tags::COPYRIGHT, ExifValue::ascii(value)),
        }
        match meta.dump(&dict) {
            Ok(blob) => {
                image.handle.exif = Some(blob.clone());
                let format = image.handle.format.unwrap_or(ImageFormat::Jpeg);
                let bytes = codec.encode(&image.handle, format, EncodeParams::saving())?;
                let mut decoded = codec.decode(&bytes)?;
                if decoded.exif.is_none() {
                    // containers without EXIF embedding keep the payload on
                    // the handle for the eventual export
                    decoded.exif = Some(blob);
                }
                image.handle = decoded;
            }
            Err(err) => diag.line(&format!("Warning: error while adding metadata: {err}")),
        }
    } else {
        warn_degraded(diag, meta_warned);
    }
    image.metadata_log.insert(field_key(field).to_owned(), value.to_owned());
    Ok(())
}

fn warn_degraded(diag: &mut impl DiagnosticWriter, meta_warned: &mut bool) {
    if !*meta_warned {
        diag.line("Warning: metadata backend unavailable; metadata operations have limited functionality");
        *meta_warned = true;
    }
}

fn category_key(category: StripCategory) -> &'static str {
    match category {
        StripCategory::Gps => "GPS",
        StripCategory::Camera => "CAMERA",
    }
}

fn field_key(field: MetadataField) -> &'static str {
    match field {
        MetadataField::Tags => "TAGS",
        MetadataField::Title => "TITLE",
        MetadataField::Copyright => "COPYRIGHT",
        MetadataField::Description => "DESCRIPTION",
    }
}

/// UTF-16LE bytes for the Windows XP tag family.
fn utf16le(text: &str) -> Vec<u8> {
    text.encode_utf16().flat_map(u16::to_le_bytes).collect()
}

#[cfg(test)]
mod tests {
    use ahash::AHashMap;
    use image::{DynamicImage, Rgb, RgbImage};

    use super::*;
    use crate::{
        backend::{DynamicCodec, ExifMetadataBackend, NoMetadataBackend},
        io::CollectDiag,
    };

    fn image_value() -> ImageValue {
        let image = RgbImage::from_pixel(6, 6, Rgb([1, 2, 3]));
        let mut handle = ImageHandle::new(DynamicImage::ImageRgb8(image));
        handle.format = Some(ImageFormat::Jpg);
        ImageValue {
            handle,
            source_path: None,
            filename: Some("m.jpg".to_owned()),
            metadata_log: AHashMap::new(),
        }
    }

    #[test]
    fn utf16le_encodes_little_endian() {
        assert_eq!(utf16le("AB"), vec![0x41, 0x00, 0x42, 0x00]);
    }

    #[test]
    fn add_then_reload_round_trips_the_field() {
        let backend = ExifMetadataBackend;
        let mut value = image_value();
        let mut diag = CollectDiag::new();
        let mut warned = false;
        add(
            &mut value,
            MetadataField::Title,
            "Holiday",
            &DynamicCodec,
            &backend,
            &mut diag,
            &mut warned,
        )
        .unwrap();
        let blob = value.handle.exif.as_deref().expect("payload committed");
        let dict = backend.load(blob).unwrap();
        assert_eq!(
            dict.get(ExifIfd::Tiff, tags::XP_TITLE),
            Some(&ExifValue::Byte(utf16le("Holiday")))
        );
        assert_eq!(value.metadata_log.get("TITLE").map(String::as_str), Some("Holiday"));
    }

    #[test]
    fn strip_all_clears_payload_and_logs() {
        let backend = ExifMetadataBackend;
        let mut value = image_value();
        let mut diag = CollectDiag::new();
        let mut warned = false;
        add(
            &mut value,
            MetadataField::Copyright,
            "me",
            &DynamicCodec,
            &backend,
            &mut diag,
            &mut warned,
        )
        .unwrap();
        assert!(value.handle.exif.is_some());
        strip(&mut value, true, &[], &DynamicCodec, &backend, &mut diag, &mut warned).unwrap();
        assert_eq!(value.handle.exif, None);
        assert_eq!(value.metadata_log.get("stripped_all").map(String::as_str), Some("true"));
    }

    #[test]
    fn selective_strip_removes_only_requested_category() {
        let backend = ExifMetadataBackend;
        let mut dict = ExifDict::new();
        dict.set(ExifIfd::Tiff, tags::MAKE, ExifValue::ascii("Cam"));
        dict.set(ExifIfd::Gps, 0x0001, ExifValue::ascii("N"));
        dict.set(ExifIfd::Tiff, tags::COPYRIGHT, ExifValue::ascii("c"));
        let mut value = image_value();
        value.handle.exif = Some(backend.dump(&dict).unwrap());

        let mut diag = CollectDiag::new();
        let mut warned = false;
        strip(
            &mut value,
            false,
            &[StripCategory::Gps],
            &DynamicCodec,
            &backend,
            &mut diag,
            &mut warned,
        )
        .unwrap();
        let remaining = backend.load(value.handle.exif.as_deref().unwrap()).unwrap();
        assert!(remaining.get(ExifIfd::Gps, 0x0001).is_none());
        assert!(remaining.get(ExifIfd::Tiff, tags::MAKE).is_some());
        assert_eq!(
            value.metadata_log.get("stripped_GPS").map(String::as_str),
            Some("true")
        );

        strip(
            &mut value,
            false,
            &[StripCategory::Camera],
            &DynamicCodec,
            &backend,
            &mut diag,
            &mut warned,
        )
        .unwrap();
        let remaining = backend.load(value.handle.exif.as_deref().unwrap()).unwrap();
        assert!(remaining.get(ExifIfd::Tiff, tags::MAKE).is_none());
        assert!(remaining.get(ExifIfd::Tiff, tags::COPYRIGHT).is_some());
    }

    #[test]
    fn degraded_backend_warns_once_and_still_logs() {
        let mut value = image_value();
        let mut diag = CollectDiag::new();
        let mut warned = false;
        add(
            &mut value,
            MetadataField::Tags,
            "a,b",
            &DynamicCodec,
            &NoMetadataBackend,
            &mut diag,
            &mut warned,
        )
        .unwrap();
        strip(
            &mut value,
            true,
            &[],
            &DynamicCodec,
            &NoMetadataBackend,
            &mut diag,
            &mut warned,
        )
        .unwrap();
        let warnings = diag
            .lines()
            .iter()
            .filter(|line| line.contains("metadata backend unavailable"))
            .count();
        assert_eq!(warnings, 1);
        assert_eq!(value.metadata_log.get("TAGS").map(String::as_str), Some("a,b"));
        assert_eq!(value.handle.exif, None);
    }
}
