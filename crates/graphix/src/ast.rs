//! The GraphixLang abstract syntax tree.
//!
//! The external parser emits a JSON document; [`crate::parse`] lowers it into
//! the closed [`Node`] sum type defined here. Every node kind the language
//! knows is an explicit variant — dispatch in the interpreter is a single
//! `match`, and kinds the decoder does not recognize survive as
//! [`Node::Unknown`] so they can be diagnosed (non-fatally) when visited.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString, IntoStaticStr};

use crate::value::DeclaredType;

/// Binary operators accepted by `BinaryExpression` nodes.
///
/// The wire format spells these as upper-case tokens (`PLUS`, `NOT_EQUAL`, …);
/// strum's case-insensitive `FromStr` plus explicit serializations for the
/// underscore forms cover both.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, IntoStaticStr, Serialize, Deserialize)]
#[strum(ascii_case_insensitive)]
pub enum Operator {
    Plus,
    Minus,
    Multiply,
    Divide,
    Equal,
    #[strum(serialize = "NOT_EQUAL", serialize = "NotEqual")]
    NotEqual,
    Greater,
    #[strum(serialize = "GREATER_EQUAL", serialize = "GreaterEqual")]
    GreaterEqual,
    Smaller,
    #[strum(serialize = "SMALLER_EQUAL", serialize = "SmallerEqual")]
    SmallerEqual,
}

impl Operator {
    /// Returns `true` for the comparison subset of operators.
    #[must_use]
    pub fn is_comparison(self) -> bool {
        !matches!(self, Self::Plus | Self::Minus | Self::Multiply | Self::Divide)
    }
}

/// Declared kind of a literal node (`valueType` on the wire).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, IntoStaticStr, Serialize, Deserialize)]
#[strum(ascii_case_insensitive)]
pub enum LiteralKind {
    #[strum(serialize = "INT_VALUE")]
    Int,
    #[strum(serialize = "DBL_VALUE")]
    Double,
    #[strum(serialize = "STR_VALUE")]
    Str,
    #[strum(serialize = "BOOL_VALUE")]
    Bool,
}

/// Metadata accessors on a bound image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, IntoStaticStr, Serialize, Deserialize)]
#[strum(ascii_case_insensitive)]
pub enum MetadataKind {
    /// Pixel width of the in-memory image.
    #[strum(serialize = "FWIDTH")]
    Width,
    /// Pixel height of the in-memory image.
    #[strum(serialize = "FHEIGHT")]
    Height,
    /// The image's current logical output filename.
    #[strum(serialize = "FNAME")]
    Name,
    /// Size in bytes of the source file, 0 when it no longer exists.
    #[strum(serialize = "FSIZE")]
    Size,
}

/// Pixel filters applied by `SetFilter`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, IntoStaticStr, Serialize, Deserialize)]
#[strum(ascii_case_insensitive)]
pub enum FilterType {
    Sepia,
    /// Luminance conversion, re-expanded to RGB.
    Bw,
    Negative,
    Sharpen,
}

/// Quarter-turn directions for `Rotate`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, IntoStaticStr, Serialize, Deserialize)]
#[strum(ascii_case_insensitive)]
pub enum RotateDirection {
    /// 90 degrees counter-clockwise.
    Left,
    /// 90 degrees clockwise.
    Right,
}

/// Target orientations for the `Orientation` op.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, IntoStaticStr, Serialize, Deserialize)]
#[strum(ascii_case_insensitive)]
pub enum OrientationKind {
    Landscape,
    Portrait,
}

/// Image container formats recognized on input and output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, IntoStaticStr, Serialize, Deserialize)]
#[strum(ascii_case_insensitive)]
pub enum ImageFormat {
    Png,
    Jpg,
    Jpeg,
    Webp,
    Tiff,
    Bmp,
}

impl ImageFormat {
    /// Lower-case filename extension for this format.
    ///
    /// `Jpg` and `Jpeg` stay distinct so `Convert JPG` and `Convert JPEG`
    /// produce different filenames, as the source language promises.
    #[must_use]
    pub fn extension(self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Jpg => "jpg",
            Self::Jpeg => "jpeg",
            Self::Webp => "webp",
            Self::Tiff => "tiff",
            Self::Bmp => "bmp",
        }
    }

    /// Maps a filename extension (without the dot) to a format.
    #[must_use]
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "png" => Some(Self::Png),
            "jpg" => Some(Self::Jpg),
            "jpeg" => Some(Self::Jpeg),
            "webp" => Some(Self::Webp),
            "tif" | "tiff" => Some(Self::Tiff),
            "bmp" => Some(Self::Bmp),
            _ => None,
        }
    }

    /// Returns `true` when the format encodes through the JPEG codec.
    #[must_use]
    pub fn is_jpeg(self) -> bool {
        matches!(self, Self::Jpg | Self::Jpeg)
    }
}

/// Re-encode modes for `WebOptimize`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, IntoStaticStr, Serialize, Deserialize)]
#[strum(ascii_case_insensitive)]
pub enum WebOptimizeMode {
    /// PNG re-encode with maximum compression.
    Lossless,
    /// JPEG re-encode at the requested quality; alpha is flattened onto white.
    Lossy,
}

/// EXIF fields writable through `AddMetadata`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, IntoStaticStr, Serialize, Deserialize)]
#[strum(ascii_case_insensitive)]
pub enum MetadataField {
    /// XPKeywords, UTF-16LE.
    Tags,
    /// XPTitle, UTF-16LE.
    Title,
    /// Copyright, UTF-8 ASCII field.
    Copyright,
    /// XPComment, UTF-16LE.
    Description,
}

/// Categories removable through a selective `StripMetadata`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, IntoStaticStr, Serialize, Deserialize)]
#[strum(ascii_case_insensitive)]
pub enum StripCategory {
    /// The entire GPS IFD.
    Gps,
    /// Make and Model tags.
    Camera,
}

/// One term of a `Rename` operation, evaluated left to right.
#[derive(Debug, Clone, PartialEq)]
pub enum RenameTerm {
    /// A string literal, appended verbatim (quotes already stripped).
    Literal(String),
    /// The global counter value, appended in decimal and then incremented.
    Counter,
    /// A nested metadata accessor, stringified and appended.
    Metadata {
        image: String,
        kind: Option<MetadataKind>,
    },
}

/// An `elif` arm of an `If` statement.
#[derive(Debug, Clone, PartialEq)]
pub struct ElifBranch {
    pub condition: Node,
    pub body: Option<Node>,
}

/// A GraphixLang AST node.
///
/// Statements and expressions share one type: the language is small enough
/// that a split buys nothing, and the original dispatcher treats them
/// uniformly. Image operations name their target by identifier rather than
/// carrying an expression — the environment is the only place images live.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    /// The whole program: statements executed in order.
    Program { statements: Vec<Node> },
    /// A braced statement block.
    Block { statements: Vec<Node> },
    VariableDeclaration {
        declared_type: DeclaredType,
        identifier: String,
        initializer: Option<Box<Node>>,
    },
    Assignment {
        identifier: String,
        value: Box<Node>,
    },
    /// Loads an image from disk and binds it.
    ImageDeclaration { identifier: String, path: String },
    /// Binds an ordered list of normalized paths.
    BatchDeclaration {
        identifier: String,
        expression: Box<Node>,
    },
    /// Path-list composition: `PLUS` under a batch declaration never
    /// arithmetic-adds. The decoder rewrites those `BinaryExpression`s into
    /// this variant, with operands flattened left to right.
    BatchExpression { parts: Vec<Node> },
    /// A literal value, converted according to `kind` when evaluated.
    ///
    /// `kind` is `None` for unrecognized value types; those pass the raw
    /// JSON value through unconverted.
    Literal {
        kind: Option<LiteralKind>,
        raw: serde_json::Value,
    },
    VariableReference { identifier: String },
    /// `operator` is `None` for tokens outside the supported set; those
    /// expressions are diagnosed when evaluated and yield no value.
    BinaryExpression {
        left: Box<Node>,
        operator: Option<Operator>,
        right: Box<Node>,
    },
    /// Metadata accessor; `kind` is `None` for unknown metadata types,
    /// which evaluate to no value.
    Metadata {
        image: String,
        kind: Option<MetadataKind>,
    },
    If {
        condition: Box<Node>,
        then_branch: Option<Box<Node>>,
        elif_branches: Vec<ElifBranch>,
        else_branch: Option<Box<Node>>,
    },
    ForEach {
        var: String,
        batch: String,
        export_path: String,
        body: Option<Box<Node>>,
        keep_original: bool,
    },

    // --- image operations ---
    SetFilter { image: String, filter: FilterType },
    Brightness { image: String, value: f64 },
    Contrast { image: String, value: f64 },
    Opacity { image: String, value: f64 },
    Noise { image: String, value: f64 },
    Blur { image: String, value: f64 },
    Pixelate { image: String, value: f64 },
    Quantize { image: String, colors: u32 },
    Rotate {
        image: String,
        direction: RotateDirection,
    },
    Crop {
        image: String,
        width: Box<Node>,
        height: Box<Node>,
    },
    Resize {
        image: String,
        width: Option<Box<Node>>,
        height: Option<Box<Node>>,
        aspect_ratio: Option<String>,
        ignore_aspect_ratio: bool,
    },
    Orientation {
        image: String,
        orientation: OrientationKind,
    },
    Hue { image: String, degrees: f64 },
    Compress { image: String, quality: u8 },
    Convert { image: String, format: ImageFormat },
    WebOptimize {
        image: String,
        mode: WebOptimizeMode,
        quality: u8,
    },
    Watermark {
        image: String,
        text: String,
        color: String,
        is_hex_color: bool,
    },
    ImageWatermark {
        image: String,
        watermark: String,
        transparency: u8,
    },
    StripMetadata {
        image: String,
        strip_all: bool,
        categories: Vec<StripCategory>,
    },
    AddMetadata {
        image: String,
        field: MetadataField,
        value: String,
    },
    Rename {
        image: String,
        terms: Vec<RenameTerm>,
    },
    Export {
        image: String,
        destination: String,
        keep_original: bool,
    },

    /// A node kind the decoder did not recognize. Diagnosed when visited;
    /// never fatal and never counted as an operation.
    Unknown { kind: String },
}

impl Node {
    /// Dispatch key for diagnostics, matching the lower-cased wire
    /// discriminator.
    #[must_use]
    pub fn kind_name(&self) -> &str {
        match self {
            Self::Program { .. } => "programnode",
            Self::Block { .. } => "block",
            Self::VariableDeclaration { .. } => "variabledeclaration",
            Self::Assignment { .. } => "assignment",
            Self::ImageDeclaration { .. } => "imagedeclaration",
            Self::BatchDeclaration { .. } => "batchdeclaration",
            Self::BatchExpression { .. } => "batchexpression",
            Self::Literal { .. } => "literal",
            Self::VariableReference { .. } => "variablereference",
            Self::BinaryExpression { .. } => "binaryexpression",
            Self::Metadata { .. } => "metadata",
            Self::If { .. } => "if",
            Self::ForEach { .. } => "foreach",
            Self::SetFilter { .. } => "setfilter",
            Self::Brightness { .. } => "brightness",
            Self::Contrast { .. } => "contrast",
            Self::Opacity { .. } => "opacity",
            Self::Noise { .. } => "noise",
            Self::Blur { .. } => "blur",
            Self::Pixelate { .. } => "pixelate",
            Self::Quantize { .. } => "quantize",
            Self::Rotate { .. } => "rotate",
            Self::Crop { .. } => "crop",
            Self::Resize { .. } => "resize",
            Self::Orientation { .. } => "orientation",
            Self::Hue { .. } => "hue",
            Self::Compress { .. } => "compress",
            Self::Convert { .. } => "convert",
            Self::WebOptimize { .. } => "weboptimize",
            Self::Watermark { .. } => "watermark",
            Self::ImageWatermark { .. } => "imagewatermark",
            Self::StripMetadata { .. } => "stripmetadata",
            Self::AddMetadata { .. } => "addmetadata",
            Self::Rename { .. } => "rename",
            Self::Export { .. } => "export",
            Self::Unknown { kind } => kind,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::*;

    #[test]
    fn operators_parse_wire_tokens() {
        assert_eq!(Operator::from_str("PLUS").unwrap(), Operator::Plus);
        assert_eq!(Operator::from_str("NOT_EQUAL").unwrap(), Operator::NotEqual);
        assert_eq!(Operator::from_str("GREATER_EQUAL").unwrap(), Operator::GreaterEqual);
        assert_eq!(Operator::from_str("SMALLER_EQUAL").unwrap(), Operator::SmallerEqual);
        assert!(Operator::from_str("XOR").is_err());
    }

    #[test]
    fn comparison_split() {
        assert!(Operator::Greater.is_comparison());
        assert!(Operator::Equal.is_comparison());
        assert!(!Operator::Plus.is_comparison());
    }

    #[test]
    fn literal_kinds_parse_wire_tokens() {
        assert_eq!(LiteralKind::from_str("INT_VALUE").unwrap(), LiteralKind::Int);
        assert_eq!(LiteralKind::from_str("DBL_VALUE").unwrap(), LiteralKind::Double);
        assert_eq!(LiteralKind::from_str("BOOL_VALUE").unwrap(), LiteralKind::Bool);
    }

    #[test]
    fn metadata_kinds_parse_wire_tokens() {
        assert_eq!(MetadataKind::from_str("FWIDTH").unwrap(), MetadataKind::Width);
        assert_eq!(MetadataKind::from_str("fname").unwrap(), MetadataKind::Name);
    }

    #[test]
    fn formats_map_extensions_both_ways() {
        assert_eq!(ImageFormat::from_extension("JPG"), Some(ImageFormat::Jpg));
        assert_eq!(ImageFormat::from_extension("tif"), Some(ImageFormat::Tiff));
        assert_eq!(ImageFormat::from_extension("gif"), None);
        assert_eq!(ImageFormat::Jpeg.extension(), "jpeg");
        assert!(ImageFormat::Jpg.is_jpeg());
        assert!(!ImageFormat::Png.is_jpeg());
    }

    #[test]
    fn filters_parse_case_insensitively() {
        assert_eq!(FilterType::from_str("SEPIA").unwrap(), FilterType::Sepia);
        assert_eq!(FilterType::from_str("bw").unwrap(), FilterType::Bw);
    }
}
