//! Schema-tolerant lowering of the JSON wire format into [`Node`]s.
//!
//! The external parser has emitted two field-naming conventions over its
//! life: a newer lowercase style (`type`, `valueType`) and a legacy
//! PascalCase style (`Type`, `Value`, `Left`, …). Both are accepted here,
//! with the lowercase spelling winning when a node carries both. The node
//! discriminator is read case-insensitively and lower-cased into the
//! dispatch key, so `BatchDeclaration` and `batchdeclaration` are the same
//! kind.
//!
//! Unrecognized node kinds are preserved as [`Node::Unknown`] rather than
//! rejected — the interpreter diagnoses them when (and only when) they are
//! visited.

use std::str::FromStr;

use serde_json::{Map, Value as Json};

use crate::{
    ast::{ElifBranch, LiteralKind, MetadataKind, Node, Operator, RenameTerm, StripCategory},
    error::{ErrorKind, RunResult},
    value::DeclaredType,
};

/// Decodes a whole AST document into the program's statement list.
///
/// Program-shape dispatch, in order: an object with a `ProgramNode`
/// discriminator or a `Statements` list; an object with `Blocks` (each
/// block's statements are walked in order); a bare node; a list of nodes.
/// Anything else is a fatal `EvaluationError`.
pub fn decode_document(doc: &Json) -> RunResult<Vec<Node>> {
    if let Some(obj) = doc.as_object() {
        let kind = node_kind(obj);
        if kind.as_deref() == Some("programnode") || field(obj, "Statements").is_some() {
            return decode_statements(field(obj, "Statements"));
        }
        if let Some(blocks) = field(obj, "Blocks").and_then(Json::as_array) {
            let mut statements = Vec::new();
            for block in blocks {
                if let Some(block_obj) = block.as_object() {
                    statements.extend(decode_statements(field(block_obj, "Statements"))?);
                }
            }
            return Ok(statements);
        }
        if kind.is_some() {
            return Ok(vec![decode_node(doc)?]);
        }
    } else if let Some(items) = doc.as_array() {
        let mut statements = Vec::new();
        for item in items {
            if item.is_object() {
                statements.push(decode_node(item)?);
            }
        }
        return Ok(statements);
    }
    ErrorKind::EvaluationError.err("invalid AST structure: could not determine how to process it")
}

/// Decodes a single node.
pub fn decode_node(node: &Json) -> RunResult<Node> {
    let Some(obj) = node.as_object() else {
        return ErrorKind::EvaluationError.err("expected an object-shaped AST node");
    };
    let kind = node_kind(obj).unwrap_or_default();
    let decoded = match kind.as_str() {
        "programnode" => Node::Program {
            statements: decode_statements(field(obj, "Statements"))?,
        },
        "block" => Node::Block {
            statements: decode_statements(field(obj, "Statements"))?,
        },
        "variabledeclaration" => Node::VariableDeclaration {
            // the legacy schema reuses `Type` for the declared type while the
            // discriminator sits in lowercase `type`; an unparsable tag means
            // the node only carried the discriminator
            declared_type: obj
                .get("Type")
                .and_then(Json::as_str)
                .and_then(|raw| DeclaredType::from_str(raw).ok())
                .unwrap_or(DeclaredType::Inferred),
            identifier: str_field(obj, "Identifier")?,
            initializer: opt_node_field(obj, "Initializer")?.map(Box::new),
        },
        "assignment" => Node::Assignment {
            identifier: str_field(obj, "Identifier")?,
            value: Box::new(node_field(obj, "Value")?),
        },
        "imagedeclaration" => Node::ImageDeclaration {
            identifier: str_field(obj, "Identifier")?,
            path: str_field(obj, "Path")?,
        },
        "batchdeclaration" => Node::BatchDeclaration {
            identifier: str_field(obj, "Identifier")?,
            expression: Box::new(decode_batch_operand(require(obj, "Expression")?)?),
        },
        "literal" => Node::Literal {
            kind: field(obj, "ValueType")
                .or_else(|| obj.get("Type"))
                .and_then(Json::as_str)
                .and_then(|raw| LiteralKind::from_str(raw).ok()),
            raw: field(obj, "Value").cloned().unwrap_or(Json::Null),
        },
        "variablereference" => Node::VariableReference {
            identifier: str_field(obj, "Identifier")?,
        },
        "binaryexpression" => Node::BinaryExpression {
            left: Box::new(node_field(obj, "Left")?),
            operator: opt_str_field(obj, "Operator").and_then(|raw| Operator::from_str(&raw).ok()),
            right: Box::new(node_field(obj, "Right")?),
        },
        "metadata" => Node::Metadata {
            image: str_field(obj, "ImageIdentifier")?,
            kind: opt_str_field(obj, "MetadataType").and_then(|raw| MetadataKind::from_str(&raw).ok()),
        },
        "if" => Node::If {
            condition: Box::new(node_field(obj, "Condition")?),
            then_branch: opt_node_field(obj, "ThenBranch")?.map(Box::new),
            elif_branches: decode_elif_branches(field(obj, "ElifBranches"))?,
            else_branch: opt_node_field(obj, "ElseBranch")?.map(Box::new),
        },
        "foreach" => Node::ForEach {
            var: str_field(obj, "VarIdentifier")?,
            batch: str_field(obj, "BatchIdentifier")?,
            export_path: str_field(obj, "ExportPath")?,
            body: opt_node_field(obj, "Body")?.map(Box::new),
            keep_original: bool_field(obj, "KeepOriginal", true),
        },
        "setfilter" => Node::SetFilter {
            image: str_field(obj, "ImageIdentifier")?,
            filter: enum_field(obj, "FilterType")?,
        },
        "brightness" => Node::Brightness {
            image: str_field(obj, "ImageIdentifier")?,
            value: num_field(obj, "Value")?,
        },
        "contrast" => Node::Contrast {
            image: str_field(obj, "ImageIdentifier")?,
            value: num_field(obj, "Value")?,
        },
        "opacity" => Node::Opacity {
            image: str_field(obj, "ImageIdentifier")?,
            value: num_field(obj, "Value")?,
        },
        "noise" => Node::Noise {
            image: str_field(obj, "ImageIdentifier")?,
            value: num_field(obj, "Value")?,
        },
        "blur" => Node::Blur {
            image: str_field(obj, "ImageIdentifier")?,
            value: num_field(obj, "Value")?,
        },
        "pixelate" => Node::Pixelate {
            image: str_field(obj, "ImageIdentifier")?,
            value: num_field(obj, "Value")?,
        },
        "quantize" => Node::Quantize {
            image: str_field(obj, "ImageIdentifier")?,
            colors: num_field(obj, "Colors")?.max(1.0) as u32,
        },
        "rotate" => Node::Rotate {
            image: str_field(obj, "ImageIdentifier")?,
            direction: enum_field(obj, "Direction")?,
        },
        "crop" => Node::Crop {
            image: str_field(obj, "ImageIdentifier")?,
            width: Box::new(node_field(obj, "Width")?),
            height: Box::new(node_field(obj, "Height")?),
        },
        "resize" => Node::Resize {
            image: str_field(obj, "ImageIdentifier")?,
            width: opt_node_field(obj, "Width")?.map(Box::new),
            height: opt_node_field(obj, "Height")?.map(Box::new),
            aspect_ratio: opt_str_field(obj, "AspectRatio"),
            ignore_aspect_ratio: bool_field(obj, "IgnoreAspectRatio", false),
        },
        "orientation" => Node::Orientation {
            image: str_field(obj, "ImageIdentifier")?,
            orientation: enum_field(obj, "OrientationType")?,
        },
        "hue" => Node::Hue {
            image: str_field(obj, "ImageIdentifier")?,
            degrees: num_field(obj, "HueValue")?,
        },
        "compress" => Node::Compress {
            image: str_field(obj, "ImageIdentifier")?,
            quality: num_field(obj, "Quality")?.clamp(1.0, 100.0) as u8,
        },
        "convert" => Node::Convert {
            image: str_field(obj, "ImageIdentifier")?,
            format: enum_field(obj, "TargetFormat")?,
        },
        "weboptimize" => Node::WebOptimize {
            image: str_field(obj, "ImageIdentifier")?,
            mode: decode_weboptimize_mode(obj)?,
            quality: num_field_or(obj, "Quality", 85.0).clamp(1.0, 100.0) as u8,
        },
        "watermark" => Node::Watermark {
            image: str_field(obj, "ImageIdentifier")?,
            text: str_field(obj, "Text")?,
            color: str_field(obj, "ColorValue")?,
            is_hex_color: bool_field(obj, "IsHexColor", false),
        },
        "imagewatermark" => Node::ImageWatermark {
            image: str_field(obj, "ImageIdentifier")?,
            watermark: str_field(obj, "WatermarkImageIdentifier")?,
            transparency: num_field_or(obj, "Transparency", 128.0).clamp(0.0, 255.0) as u8,
        },
        "stripmetadata" => Node::StripMetadata {
            image: str_field(obj, "ImageIdentifier")?,
            strip_all: bool_field(obj, "StripAll", false),
            categories: decode_strip_categories(field(obj, "MetadataTypes")),
        },
        "addmetadata" => Node::AddMetadata {
            image: str_field(obj, "ImageIdentifier")?,
            field: enum_field(obj, "MetadataType")?,
            value: str_field(obj, "Value")?,
        },
        "rename" => Node::Rename {
            image: str_field(obj, "ImageIdentifier")?,
            terms: decode_rename_terms(field(obj, "Terms"))?,
        },
        "export" => Node::Export {
            image: str_field(obj, "ImageIdentifier")?,
            destination: str_field(obj, "DestinationPath")?,
            keep_original: bool_field(obj, "KeepOriginal", true),
        },
        other => Node::Unknown {
            kind: if other.is_empty() { "undefined".to_owned() } else { other.to_owned() },
        },
    };
    Ok(decoded)
}

/// Rewrites `PLUS` under a batch declaration into [`Node::BatchExpression`],
/// flattening nested pluses left to right. Any other expression decodes
/// normally (a reference to another batch, a single literal path, or even
/// arithmetic that will fail later).
fn decode_batch_operand(node: &Json) -> RunResult<Node> {
    if is_batch_plus(node) {
        let mut parts = Vec::new();
        flatten_batch_parts(node, &mut parts)?;
        return Ok(Node::BatchExpression { parts });
    }
    decode_node(node)
}

fn is_batch_plus(node: &Json) -> bool {
    node.as_object().is_some_and(|obj| {
        let kind = node_kind(obj).unwrap_or_default();
        let plus = opt_str_field(obj, "Operator")
            .is_some_and(|raw| Operator::from_str(&raw).is_ok_and(|op| op == Operator::Plus));
        kind == "batchexpression" || (kind == "binaryexpression" && plus)
    })
}

fn flatten_batch_parts(node: &Json, parts: &mut Vec<Node>) -> RunResult<()> {
    let obj = node.as_object().expect("checked by is_batch_plus");
    for side in ["Left", "Right"] {
        let operand = require(obj, side)?;
        if is_batch_plus(operand) {
            flatten_batch_parts(operand, parts)?;
        } else {
            parts.push(decode_node(operand)?);
        }
    }
    Ok(())
}

fn decode_statements(list: Option<&Json>) -> RunResult<Vec<Node>> {
    let Some(items) = list.and_then(Json::as_array) else {
        return Ok(Vec::new());
    };
    let mut statements = Vec::new();
    for item in items {
        if item.is_object() {
            statements.push(decode_node(item)?);
        }
    }
    Ok(statements)
}

fn decode_elif_branches(list: Option<&Json>) -> RunResult<Vec<ElifBranch>> {
    let Some(items) = list.and_then(Json::as_array) else {
        return Ok(Vec::new());
    };
    let mut branches = Vec::new();
    for item in items {
        let Some(obj) = item.as_object() else { continue };
        branches.push(ElifBranch {
            condition: node_field(obj, "Condition")?,
            body: opt_node_field(obj, "Body")?,
        });
    }
    Ok(branches)
}

fn decode_weboptimize_mode(obj: &Map<String, Json>) -> RunResult<crate::ast::WebOptimizeMode> {
    use crate::ast::WebOptimizeMode;
    if let Some(raw) = field(obj, "Mode") {
        // a non-string Mode falls back to the default rather than failing
        if let Some(text) = raw.as_str() {
            return WebOptimizeMode::from_str(text)
                .map_err(|_| ErrorKind::EvaluationError.msg(format!("unknown web optimization mode: {text}")));
        }
        return Ok(WebOptimizeMode::Lossless);
    }
    if let Some(raw) = field(obj, "IsLossless") {
        let lossless = raw.as_bool().unwrap_or(true);
        return Ok(if lossless {
            WebOptimizeMode::Lossless
        } else {
            WebOptimizeMode::Lossy
        });
    }
    Ok(crate::ast::WebOptimizeMode::Lossless)
}

fn decode_strip_categories(list: Option<&Json>) -> Vec<StripCategory> {
    let Some(items) = list.and_then(Json::as_array) else {
        return Vec::new();
    };
    items
        .iter()
        .filter_map(Json::as_str)
        // unrecognized categories are ignored, matching the producer's set
        .filter_map(|raw| StripCategory::from_str(raw).ok())
        .collect()
}

fn decode_rename_terms(list: Option<&Json>) -> RunResult<Vec<RenameTerm>> {
    let Some(items) = list.and_then(Json::as_array) else {
        return Ok(Vec::new());
    };
    let mut terms = Vec::new();
    for item in items {
        let Some(obj) = item.as_object() else { continue };
        terms.push(decode_rename_term(obj));
    }
    Ok(terms)
}

fn decode_rename_term(obj: &Map<String, Json>) -> RenameTerm {
    let explicit = opt_str_field(obj, "Type").map(|raw| raw.to_ascii_uppercase());
    match explicit.as_deref() {
        Some("STRING") => return string_term(obj),
        Some("COUNTER") => return RenameTerm::Counter,
        Some("METADATA") => return metadata_term(obj),
        _ => {}
    }
    // no usable kind tag: infer from the fields, metadata winning when a
    // term carries both a string and a metadata payload
    if field(obj, "MetadataValue").is_some() {
        metadata_term(obj)
    } else if field(obj, "StringValue").is_some() {
        string_term(obj)
    } else {
        RenameTerm::Counter
    }
}

fn string_term(obj: &Map<String, Json>) -> RenameTerm {
    let raw = opt_str_field(obj, "StringValue").unwrap_or_default();
    RenameTerm::Literal(raw.trim_matches('"').to_owned())
}

fn metadata_term(obj: &Map<String, Json>) -> RenameTerm {
    let Some(value) = field(obj, "MetadataValue").and_then(Json::as_object) else {
        // a metadata term without its payload contributes nothing
        return RenameTerm::Literal(String::new());
    };
    match opt_str_field(value, "ImageIdentifier") {
        Some(image) => RenameTerm::Metadata {
            image,
            kind: opt_str_field(value, "MetadataType").and_then(|raw| MetadataKind::from_str(&raw).ok()),
        },
        None => RenameTerm::Literal(String::new()),
    }
}

// --- field access helpers ---

/// Looks up a field under both schemas: the lowercase spelling wins, then
/// the canonical (legacy) spelling, then a case-insensitive scan.
fn field<'a>(obj: &'a Map<String, Json>, key: &str) -> Option<&'a Json> {
    let lower = lowercase_first(key);
    if let Some(value) = obj.get(&lower) {
        return Some(value);
    }
    if let Some(value) = obj.get(key) {
        return Some(value);
    }
    obj.iter()
        .find(|(name, _)| name.eq_ignore_ascii_case(key))
        .map(|(_, value)| value)
}

fn require<'a>(obj: &'a Map<String, Json>, key: &str) -> RunResult<&'a Json> {
    field(obj, key).ok_or_else(|| ErrorKind::EvaluationError.msg(format!("node is missing the {key} field")))
}

fn lowercase_first(key: &str) -> String {
    let mut chars = key.chars();
    match chars.next() {
        Some(first) => first.to_ascii_lowercase().to_string() + chars.as_str(),
        None => String::new(),
    }
}

/// Reads the node discriminator, lower-cased into the dispatch key.
fn node_kind(obj: &Map<String, Json>) -> Option<String> {
    field(obj, "Type")
        .and_then(Json::as_str)
        .map(str::to_ascii_lowercase)
}

fn str_field(obj: &Map<String, Json>, key: &str) -> RunResult<String> {
    match require(obj, key)? {
        Json::String(text) => Ok(text.clone()),
        Json::Number(number) => Ok(number.to_string()),
        other => ErrorKind::EvaluationError.err(format!("field {key} is not a string: {other}")),
    }
}

fn opt_str_field(obj: &Map<String, Json>, key: &str) -> Option<String> {
    field(obj, key).and_then(Json::as_str).map(str::to_owned)
}

fn num_field(obj: &Map<String, Json>, key: &str) -> RunResult<f64> {
    let raw = require(obj, key)?;
    json_number(raw).ok_or_else(|| ErrorKind::EvaluationError.msg(format!("field {key} is not a number: {raw}")))
}

fn num_field_or(obj: &Map<String, Json>, key: &str, default: f64) -> f64 {
    field(obj, key).and_then(json_number).unwrap_or(default)
}

fn json_number(raw: &Json) -> Option<f64> {
    match raw {
        Json::Number(number) => number.as_f64(),
        Json::String(text) => text.trim().parse().ok(),
        _ => None,
    }
}

fn bool_field(obj: &Map<String, Json>, key: &str, default: bool) -> bool {
    match field(obj, key) {
        Some(Json::Bool(value)) => *value,
        Some(Json::String(text)) => text.eq_ignore_ascii_case("true"),
        _ => default,
    }
}

fn node_field(obj: &Map<String, Json>, key: &str) -> RunResult<Node> {
    decode_node(require(obj, key)?)
}

fn opt_node_field(obj: &Map<String, Json>, key: &str) -> RunResult<Option<Node>> {
    match field(obj, key) {
        Some(Json::Null) | None => Ok(None),
        Some(raw) => decode_node(raw).map(Some),
    }
}

fn enum_field<T: FromStr>(obj: &Map<String, Json>, key: &str) -> RunResult<T> {
    let raw = str_field(obj, key)?;
    T::from_str(&raw).map_err(|_| ErrorKind::EvaluationError.msg(format!("unknown {key} value: {raw}")))
}
