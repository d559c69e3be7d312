//! Host-boundary capabilities the interpreter consumes.
//!
//! The interpreter never touches a codec, the EXIF wire format, or the
//! filesystem directly — it goes through the three traits defined here. The
//! default implementations ([`DynamicCodec`], [`ExifMetadataBackend`],
//! [`OsFileSystem`]) cover normal use; tests and embedders can substitute
//! their own. [`NoMetadataBackend`] is the degraded metadata capability:
//! present, but only able to support full-strip re-encode semantics.

pub mod codec;
pub mod fs;
pub mod metadata;

use std::path::{Path, PathBuf};

use image::DynamicImage;

pub use codec::DynamicCodec;
pub use fs::OsFileSystem;
pub use metadata::{ExifDict, ExifEntry, ExifIfd, ExifMetadataBackend, ExifValue, NoMetadataBackend, tags};

use crate::{ast::ImageFormat, error::RunResult};

/// An opaque owning reference to an in-memory raster.
///
/// Operations replace the `image` atomically on success. The format tag
/// remembers the container the raster came from (export falls back to it
/// when the destination has no usable extension), and `exif` carries the raw
/// EXIF payload across re-encodes so export can pass it to the encoder.
#[derive(Debug, Clone)]
pub struct ImageHandle {
    pub image: DynamicImage,
    /// Container format the raster was decoded from, when known.
    pub format: Option<ImageFormat>,
    /// Raw EXIF (TIFF structure) payload, when the source carried one.
    pub exif: Option<Vec<u8>>,
}

impl ImageHandle {
    /// Wraps a raster with no container provenance (in-memory derived).
    #[must_use]
    pub fn new(image: DynamicImage) -> Self {
        Self {
            image,
            format: None,
            exif: None,
        }
    }

    #[must_use]
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    #[must_use]
    pub fn height(&self) -> u32 {
        self.image.height()
    }
}

/// Options for [`ImageCodec::encode`].
#[derive(Debug, Clone, Copy, Default)]
pub struct EncodeParams {
    /// JPEG quality 1–100; `None` uses the encoder default.
    pub quality: Option<u8>,
    /// Use the slowest, smallest PNG compression settings.
    pub max_compression: bool,
    /// Embed the handle's EXIF payload when the container supports it
    /// (JPEG and PNG here; other containers drop it).
    pub keep_exif: bool,
}

impl EncodeParams {
    /// Parameters used by export and save paths: default encoder settings,
    /// EXIF passed through.
    #[must_use]
    pub fn saving() -> Self {
        Self {
            keep_exif: true,
            ..Self::default()
        }
    }
}

/// Decode/encode capability over the supported containers.
pub trait ImageCodec {
    /// Decodes an image file, capturing its container format and EXIF payload.
    fn open(&self, path: &Path) -> RunResult<ImageHandle>;

    /// Encodes and writes the handle to `path` in the given format,
    /// passing embedded EXIF through to the container.
    fn save(&self, handle: &ImageHandle, path: &Path, format: ImageFormat) -> RunResult<()>;

    /// Encodes the handle to memory.
    fn encode(&self, handle: &ImageHandle, format: ImageFormat, params: EncodeParams) -> RunResult<Vec<u8>>;

    /// Decodes an in-memory container produced by [`Self::encode`].
    fn decode(&self, bytes: &[u8]) -> RunResult<ImageHandle>;
}

/// EXIF field capability.
///
/// `load`/`dump` convert between the raw payload carried on an
/// [`ImageHandle`] and the structured [`ExifDict`] the metadata operations
/// edit. A backend reporting `supports_fields() == false` degrades
/// `StripMetadata`/`AddMetadata` to re-encode-without-EXIF semantics.
pub trait MetadataBackend {
    /// Whether field-level load/dump are available.
    fn supports_fields(&self) -> bool;

    fn load(&self, blob: &[u8]) -> RunResult<ExifDict>;

    fn dump(&self, dict: &ExifDict) -> RunResult<Vec<u8>>;
}

/// Filesystem primitives the interpreter needs.
///
/// Kept narrow on purpose: path normalization, existence/size queries, image
/// enumeration for `foreach`, directory creation for export targets, and
/// original-file disposal.
pub trait FileSystem {
    /// Lexical platform-canonicalization of separators and redundant
    /// components. Never touches the disk.
    fn normalize(&self, raw: &str) -> PathBuf;

    fn exists(&self, path: &Path) -> bool;

    fn is_file(&self, path: &Path) -> bool;

    fn is_dir(&self, path: &Path) -> bool;

    /// File size in bytes; 0 when the path does not exist.
    fn size(&self, path: &Path) -> u64;

    /// Files directly under `dir` whose extension is a recognized image
    /// format, sorted by file name so enumeration is stable within a run.
    fn list_images(&self, dir: &Path) -> RunResult<Vec<PathBuf>>;

    fn create_dir_all(&self, path: &Path) -> RunResult<()>;

    fn remove_file(&self, path: &Path) -> RunResult<()>;
}
