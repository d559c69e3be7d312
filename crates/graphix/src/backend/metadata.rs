//! EXIF field model and the kamadak-exif backed [`MetadataBackend`].
//!
//! The interpreter edits metadata through a structured dictionary of
//! `(IFD, tag, value)` entries. [`ExifMetadataBackend`] converts between the
//! dictionary and the raw TIFF-structure payload carried on an image handle;
//! [`NoMetadataBackend`] is the degraded capability for hosts without EXIF
//! support, where only full-strip re-encode semantics remain.

use std::io::Cursor;

use exif::experimental::Writer;
use exif::{Context, Field, In, Reader, Tag};

use crate::{
    backend::MetadataBackend,
    error::{ErrorKind, RunError, RunResult},
};

/// Well-known tag numbers used by the metadata operations.
pub mod tags {
    /// Camera manufacturer (0th IFD).
    pub const MAKE: u16 = 0x010F;
    /// Camera model (0th IFD).
    pub const MODEL: u16 = 0x0110;
    /// Copyright holder, ASCII.
    pub const COPYRIGHT: u16 = 0x8298;
    /// Windows XP title, UTF-16LE bytes.
    pub const XP_TITLE: u16 = 0x9C9B;
    /// Windows XP comment, UTF-16LE bytes.
    pub const XP_COMMENT: u16 = 0x9C9C;
    /// Windows XP keywords, UTF-16LE bytes.
    pub const XP_KEYWORDS: u16 = 0x9C9E;
}

/// The IFD an entry lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExifIfd {
    /// 0th IFD (TIFF attributes: Make, Model, XP tags, Copyright, …).
    Tiff,
    /// Exif-private IFD.
    Exif,
    /// GPS IFD.
    Gps,
    /// Interoperability IFD.
    Interop,
}

/// A typed EXIF value, mirroring the TIFF field types.
#[derive(Debug, Clone, PartialEq)]
pub enum ExifValue {
    Byte(Vec<u8>),
    /// One or more ASCII components.
    Ascii(Vec<Vec<u8>>),
    Short(Vec<u16>),
    Long(Vec<u32>),
    /// `(numerator, denominator)` pairs.
    Rational(Vec<(u32, u32)>),
    SByte(Vec<i8>),
    Undefined(Vec<u8>),
    SShort(Vec<i16>),
    SLong(Vec<i32>),
    SRational(Vec<(i32, i32)>),
    Float(Vec<f32>),
    Double(Vec<f64>),
}

impl ExifValue {
    /// Convenience constructor for a single ASCII component.
    #[must_use]
    pub fn ascii(text: &str) -> Self {
        Self::Ascii(vec![text.as_bytes().to_vec()])
    }
}

/// One metadata field.
#[derive(Debug, Clone, PartialEq)]
pub struct ExifEntry {
    pub ifd: ExifIfd,
    pub tag: u16,
    pub value: ExifValue,
}

/// An ordered collection of EXIF fields.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExifDict {
    entries: Vec<ExifEntry>,
}

impl ExifDict {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn entries(&self) -> &[ExifEntry] {
        &self.entries
    }

    #[must_use]
    pub fn get(&self, ifd: ExifIfd, tag: u16) -> Option<&ExifValue> {
        self.entries
            .iter()
            .find(|entry| entry.ifd == ifd && entry.tag == tag)
            .map(|entry| &entry.value)
    }

    /// Sets a field, replacing any existing entry with the same IFD and tag.
    pub fn set(&mut self, ifd: ExifIfd, tag: u16, value: ExifValue) {
        if let Some(entry) = self.entries.iter_mut().find(|e| e.ifd == ifd && e.tag == tag) {
            entry.value = value;
        } else {
            self.entries.push(ExifEntry { ifd, tag, value });
        }
    }

    /// Drops the entire GPS IFD. Returns `true` if anything was removed.
    pub fn remove_gps(&mut self) -> bool {
        let before = self.entries.len();
        self.entries.retain(|entry| entry.ifd != ExifIfd::Gps);
        self.entries.len() != before
    }

    /// Drops the Make and Model tags. Returns `true` if anything was removed.
    pub fn remove_camera(&mut self) -> bool {
        let before = self.entries.len();
        self.entries
            .retain(|entry| !(entry.ifd == ExifIfd::Tiff && matches!(entry.tag, tags::MAKE | tags::MODEL)));
        self.entries.len() != before
    }
}

/// Field-level metadata backend built on kamadak-exif.
#[derive(Debug, Default, Clone, Copy)]
pub struct ExifMetadataBackend;

impl MetadataBackend for ExifMetadataBackend {
    fn supports_fields(&self) -> bool {
        true
    }

    fn load(&self, blob: &[u8]) -> RunResult<ExifDict> {
        let parsed = Reader::new()
            .read_raw(blob.to_vec())
            .map_err(|err| RunError::backend("parsing EXIF payload", err))?;
        let mut dict = ExifDict::new();
        for field in parsed.fields() {
            // thumbnail-IFD copies are regenerated by encoders, not edited
            if field.ifd_num != In::PRIMARY {
                continue;
            }
            let Some(ifd) = ifd_from_context(field.tag.context()) else {
                continue;
            };
            let Some(value) = value_from_backend(&field.value) else {
                continue;
            };
            dict.entries.push(ExifEntry {
                ifd,
                tag: field.tag.number(),
                value,
            });
        }
        Ok(dict)
    }

    fn dump(&self, dict: &ExifDict) -> RunResult<Vec<u8>> {
        let fields: Vec<Field> = dict
            .entries
            .iter()
            .map(|entry| Field {
                tag: Tag(context_from_ifd(entry.ifd), entry.tag),
                ifd_num: In::PRIMARY,
                value: value_to_backend(&entry.value),
            })
            .collect();
        let mut writer = Writer::new();
        for field in &fields {
            writer.push_field(field);
        }
        let mut cursor = Cursor::new(Vec::new());
        writer
            .write(&mut cursor, false)
            .map_err(|err| RunError::backend("serializing EXIF payload", err))?;
        Ok(cursor.into_inner())
    }
}

/// Degraded metadata capability: field-level operations are unavailable and
/// callers fall back to re-encoding without EXIF.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoMetadataBackend;

impl MetadataBackend for NoMetadataBackend {
    fn supports_fields(&self) -> bool {
        false
    }

    fn load(&self, _blob: &[u8]) -> RunResult<ExifDict> {
        ErrorKind::BackendError.err("metadata backend does not support field access")
    }

    fn dump(&self, _dict: &ExifDict) -> RunResult<Vec<u8>> {
        ErrorKind::BackendError.err("metadata backend does not support field access")
    }
}

fn ifd_from_context(context: Context) -> Option<ExifIfd> {
    match context {
        Context::Tiff => Some(ExifIfd::Tiff),
        Context::Exif => Some(ExifIfd::Exif),
        Context::Gps => Some(ExifIfd::Gps),
        Context::Interop => Some(ExifIfd::Interop),
        _ => None,
    }
}

fn context_from_ifd(ifd: ExifIfd) -> Context {
    match ifd {
        ExifIfd::Tiff => Context::Tiff,
        ExifIfd::Exif => Context::Exif,
        ExifIfd::Gps => Context::Gps,
        ExifIfd::Interop => Context::Interop,
    }
}

fn value_from_backend(value: &exif::Value) -> Option<ExifValue> {
    Some(match value {
        exif::Value::Byte(v) => ExifValue::Byte(v.clone()),
        exif::Value::Ascii(v) => ExifValue::Ascii(v.clone()),
        exif::Value::Short(v) => ExifValue::Short(v.clone()),
        exif::Value::Long(v) => ExifValue::Long(v.clone()),
        exif::Value::Rational(v) => ExifValue::Rational(v.iter().map(|r| (r.num, r.denom)).collect()),
        exif::Value::SByte(v) => ExifValue::SByte(v.clone()),
        exif::Value::Undefined(v, _) => ExifValue::Undefined(v.clone()),
        exif::Value::SShort(v) => ExifValue::SShort(v.clone()),
        exif::Value::SLong(v) => ExifValue::SLong(v.clone()),
        exif::Value::SRational(v) => ExifValue::SRational(v.iter().map(|r| (r.num, r.denom)).collect()),
        exif::Value::Float(v) => ExifValue::Float(v.clone()),
        exif::Value::Double(v) => ExifValue::Double(v.clone()),
        _ => return None,
    })
}

fn value_to_backend(value: &ExifValue) -> exif::Value {
    match value {
        ExifValue::Byte(v) => exif::Value::Byte(v.clone()),
        ExifValue::Ascii(v) => exif::Value::Ascii(v.clone()),
        ExifValue::Short(v) => exif::Value::Short(v.clone()),
        ExifValue::Long(v) => exif::Value::Long(v.clone()),
        ExifValue::Rational(v) => exif::Value::Rational(
            v.iter()
                .map(|&(num, denom)| exif::Rational { num, denom })
                .collect(),
        ),
        ExifValue::SByte(v) => exif::Value::SByte(v.clone()),
        ExifValue::Undefined(v) => exif::Value::Undefined(v.clone(), 0),
        ExifValue::SShort(v) => exif::Value::SShort(v.clone()),
        ExifValue::SLong(v) => exif::Value::SLong(v.clone()),
        ExifValue::SRational(v) => exif::Value::SRational(
            v.iter()
                .map(|&(num, denom)| exif::SRational { num, denom })
                .collect(),
        ),
        ExifValue::Float(v) => exif::Value::Float(v.clone()),
        ExifValue::Double(v) => exif::Value::Double(v.clone()),
    }
}
