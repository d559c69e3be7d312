//! The image-crate backed [`ImageCodec`].
//!
//! Decoding captures the container format and any EXIF payload alongside the
//! raster. Encoding goes through memory in all cases so that EXIF embedding
//! is one code path for both `save` and the in-memory re-encode cycles
//! (Compress, WebOptimize, metadata commits).

use std::{
    fs,
    io::{BufRead, Cursor, Seek},
    path::Path,
};

use image::{
    DynamicImage, ImageDecoder, ImageReader,
    codecs::{
        jpeg::JpegEncoder,
        png::{CompressionType, FilterType as PngFilterType, PngEncoder},
    },
};

use crate::{
    ast::ImageFormat,
    backend::{EncodeParams, ImageCodec, ImageHandle},
    error::{RunError, RunResult},
};

/// `ImageCodec` over the image crate's decoders and encoders.
#[derive(Debug, Default, Clone, Copy)]
pub struct DynamicCodec;

impl ImageCodec for DynamicCodec {
    fn open(&self, path: &Path) -> RunResult<ImageHandle> {
        let reader =
            ImageReader::open(path).map_err(|err| RunError::backend(&format!("opening {}", path.display()), err))?;
        decode_reader(reader)
    }

    fn save(&self, handle: &ImageHandle, path: &Path, format: ImageFormat) -> RunResult<()> {
        let bytes = self.encode(handle, format, EncodeParams::saving())?;
        fs::write(path, bytes).map_err(|err| RunError::backend(&format!("writing {}", path.display()), err))
    }

    fn encode(&self, handle: &ImageHandle, format: ImageFormat, params: EncodeParams) -> RunResult<Vec<u8>> {
        let mut bytes = Vec::new();
        let mut cursor = Cursor::new(&mut bytes);
        match format {
            ImageFormat::Jpg | ImageFormat::Jpeg => {
                // JPEG has no alpha; encode from an RGB view
                let rgb = handle.image.to_rgb8();
                let quality = params.quality.unwrap_or(75).clamp(1, 100);
                let mut encoder = JpegEncoder::new_with_quality(&mut cursor, quality);
                encoder
                    .encode_image(&rgb)
                    .map_err(|err| RunError::backend("encoding JPEG", err))?;
            }
            ImageFormat::Png if params.max_compression => {
                let encoder = PngEncoder::new_with_quality(&mut cursor, CompressionType::Best, PngFilterType::Adaptive);
                handle
                    .image
                    .write_with_encoder(encoder)
                    .map_err(|err| RunError::backend("encoding PNG", err))?;
            }
            ImageFormat::Webp => {
                // the lossless WebP encoder only accepts RGB8/RGBA8
                let rgba = DynamicImage::ImageRgba8(handle.image.to_rgba8());
                rgba.write_to(&mut cursor, image::ImageFormat::WebP)
                    .map_err(|err| RunError::backend("encoding WebP", err))?;
            }
            other => {
                handle
                    .image
                    .write_to(&mut cursor, to_image_format(other))
                    .map_err(|err| RunError::backend(&format!("encoding {other}"), err))?;
            }
        }
        if params.keep_exif
            && let Some(blob) = handle.exif.as_deref()
        {
            bytes = embed_exif(bytes, format, blob);
        }
        Ok(bytes)
    }

    fn decode(&self, bytes: &[u8]) -> RunResult<ImageHandle> {
        decode_reader(ImageReader::new(Cursor::new(bytes)))
    }
}

fn decode_reader<R: BufRead + Seek>(reader: ImageReader<R>) -> RunResult<ImageHandle> {
    let reader = reader
        .with_guessed_format()
        .map_err(|err| RunError::backend("probing image format", err))?;
    let format = reader.format().and_then(from_image_format);
    let mut decoder = reader
        .into_decoder()
        .map_err(|err| RunError::backend("decoding image", err))?;
    let exif = decoder.exif_metadata().unwrap_or(None);
    let image = DynamicImage::from_decoder(decoder).map_err(|err| RunError::backend("decoding image", err))?;
    Ok(ImageHandle { image, format, exif })
}

fn to_image_format(format: ImageFormat) -> image::ImageFormat {
    match format {
        ImageFormat::Png => image::ImageFormat::Png,
        ImageFormat::Jpg | ImageFormat::Jpeg => image::ImageFormat::Jpeg,
        ImageFormat::Webp => image::ImageFormat::WebP,
        ImageFormat::Tiff => image::ImageFormat::Tiff,
        ImageFormat::Bmp => image::ImageFormat::Bmp,
    }
}

fn from_image_format(format: image::ImageFormat) -> Option<ImageFormat> {
    match format {
        image::ImageFormat::Png => Some(ImageFormat::Png),
        image::ImageFormat::Jpeg => Some(ImageFormat::Jpg),
        image::ImageFormat::WebP => Some(ImageFormat::Webp),
        image::ImageFormat::Tiff => Some(ImageFormat::Tiff),
        image::ImageFormat::Bmp => Some(ImageFormat::Bmp),
        _ => None,
    }
}

/// Splices a raw EXIF payload into an encoded container.
///
/// JPEG gets an APP1 segment after SOI, PNG an `eXIf` chunk after IHDR.
/// Containers without a supported embedding (WebP, TIFF, BMP here) pass
/// through unchanged, dropping the payload.
fn embed_exif(bytes: Vec<u8>, format: ImageFormat, blob: &[u8]) -> Vec<u8> {
    match format {
        ImageFormat::Jpg | ImageFormat::Jpeg => embed_exif_jpeg(bytes, blob),
        ImageFormat::Png => embed_exif_png(bytes, blob),
        _ => bytes,
    }
}

fn embed_exif_jpeg(bytes: Vec<u8>, blob: &[u8]) -> Vec<u8> {
    // segment length counts itself plus the "Exif\0\0" header and payload
    let segment_len = blob.len() + 8;
    if !bytes.starts_with(&[0xFF, 0xD8]) || segment_len > usize::from(u16::MAX) {
        return bytes;
    }
    let mut out = Vec::with_capacity(bytes.len() + segment_len + 2);
    out.extend_from_slice(&bytes[..2]);
    out.extend_from_slice(&[0xFF, 0xE1]);
    out.extend_from_slice(&(segment_len as u16).to_be_bytes());
    out.extend_from_slice(b"Exif\0\0");
    out.extend_from_slice(blob);
    out.extend_from_slice(&bytes[2..]);
    out
}

fn embed_exif_png(bytes: Vec<u8>, blob: &[u8]) -> Vec<u8> {
    const SIGNATURE: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];
    if !bytes.starts_with(&SIGNATURE) || bytes.len() < 16 || blob.len() > u32::MAX as usize {
        return bytes;
    }
    // first chunk is always IHDR; insert right after it
    let ihdr_len = u32::from_be_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]) as usize;
    let insert_at = 8 + 4 + 4 + ihdr_len + 4;
    if bytes.len() < insert_at {
        return bytes;
    }
    let mut chunk = Vec::with_capacity(blob.len() + 12);
    chunk.extend_from_slice(&(blob.len() as u32).to_be_bytes());
    chunk.extend_from_slice(b"eXIf");
    chunk.extend_from_slice(blob);
    let mut crc = flate2::Crc::new();
    crc.update(b"eXIf");
    crc.update(blob);
    chunk.extend_from_slice(&crc.sum().to_be_bytes());
    let mut out = Vec::with_capacity(bytes.len() + chunk.len());
    out.extend_from_slice(&bytes[..insert_at]);
    out.extend_from_slice(&chunk);
    out.extend_from_slice(&bytes[insert_at..]);
    out
}
