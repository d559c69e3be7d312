//! Runtime values and bindings.
//!
//! GraphixLang is dynamically typed at runtime: declared type tags are
//! advisory, and operations pattern-match on the value kind they need,
//! failing with `TypeMismatch` otherwise.

use std::path::PathBuf;

use ahash::AHashMap;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString, IntoStaticStr};

use crate::backend::ImageHandle;

/// DSL-level type tag recorded on a binding.
///
/// `Inferred` marks bindings created by assignment to a previously unknown
/// name. The tag is never enforced against the stored value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, IntoStaticStr, Serialize, Deserialize)]
#[strum(ascii_case_insensitive)]
pub enum DeclaredType {
    #[strum(serialize = "TYPE_INT")]
    Int,
    #[strum(serialize = "TYPE_DBL")]
    Double,
    #[strum(serialize = "TYPE_STR")]
    Str,
    #[strum(serialize = "TYPE_BOOL")]
    Bool,
    #[strum(serialize = "TYPE_IMG")]
    Image,
    #[strum(serialize = "TYPE_BATCH")]
    Batch,
    /// Reserved pixel-buffer type; no current operation produces one.
    #[strum(serialize = "TYPE_PXLS")]
    Pixels,
    Inferred,
}

/// A bound image: the owned raster plus the bookkeeping that survives
/// operations and governs export.
#[derive(Debug, Clone)]
pub struct ImageValue {
    /// Owning reference to the decoded raster. Operations replace it
    /// atomically on success.
    pub handle: ImageHandle,
    /// Set only for images loaded from disk; in-memory-derived images are
    /// never candidates for original-file deletion.
    pub source_path: Option<PathBuf>,
    /// The logical output filename. Rename and Convert change it; export
    /// uses it unless the destination path is itself a file.
    pub filename: Option<String>,
    /// Record of metadata edits applied to this image.
    pub metadata_log: AHashMap<String, String>,
}

impl ImageValue {
    /// Wraps a freshly loaded handle with its on-disk origin.
    #[must_use]
    pub fn loaded(handle: ImageHandle, source_path: PathBuf) -> Self {
        let filename = source_path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned());
        Self {
            handle,
            source_path: Some(source_path),
            filename,
            metadata_log: AHashMap::new(),
        }
    }
}

/// Primary value type representing GraphixLang data at runtime.
#[derive(Debug, Clone)]
pub enum Value {
    Int(i64),
    Double(f64),
    Str(String),
    Bool(bool),
    Image(ImageValue),
    /// Ordered list of directory or file paths; duplicates allowed, order is
    /// declaration order, paths normalized at declaration time.
    Batch(Vec<PathBuf>),
}

impl Value {
    /// Short name for error messages.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Int(_) => "int",
            Self::Double(_) => "double",
            Self::Str(_) => "string",
            Self::Bool(_) => "bool",
            Self::Image(_) => "image",
            Self::Batch(_) => "batch",
        }
    }

    #[must_use]
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// Numeric view, widening ints to doubles.
    #[must_use]
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Int(v) => Some(*v as f64),
            Self::Double(v) => Some(*v),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(v) => Some(v),
            _ => None,
        }
    }

    /// Truthiness, matching the host conventions the DSL inherited:
    /// zero numbers, empty strings, and empty batches are false; images are
    /// always true.
    #[must_use]
    pub fn is_truthy(&self) -> bool {
        match self {
            Self::Int(v) => *v != 0,
            Self::Double(v) => *v != 0.0,
            Self::Str(v) => !v.is_empty(),
            Self::Bool(v) => *v,
            Self::Image(_) => true,
            Self::Batch(paths) => !paths.is_empty(),
        }
    }

    /// Stringification used by rename terms and string concatenation.
    #[must_use]
    pub fn to_display_string(&self) -> String {
        match self {
            Self::Int(v) => v.to_string(),
            Self::Double(v) => v.to_string(),
            Self::Str(v) => v.clone(),
            Self::Bool(v) => v.to_string(),
            Self::Image(image) => format!("<image {}>", image.filename.as_deref().unwrap_or("?")),
            Self::Batch(paths) => format!("<batch of {}>", paths.len()),
        }
    }
}
