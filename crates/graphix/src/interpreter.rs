//! The tree-walking interpreter.
//!
//! [`Interpreter::interpret`] classifies the document root, then walks
//! statements in order, dispatching on the node kind. Expressions are pure
//! except for batch composition; statements mutate the environment or
//! produce side effects through the backends. One interpreter instance owns
//! one environment, one rename counter, and one operation counter —
//! everything is per-instance, nothing is process-global.
//!
//! Execution is strictly sequential: statements run in source order, and
//! `foreach` processes files one at a time with per-file error recovery.

use std::path::{Path, PathBuf};

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde_json::Value as Json;

use crate::{
    ast::{ImageFormat, LiteralKind, MetadataKind, Node, Operator},
    backend::{DynamicCodec, ExifMetadataBackend, FileSystem, ImageCodec, MetadataBackend, OsFileSystem},
    environment::Environment,
    error::{ErrorKind, RunResult},
    io::{DiagnosticWriter, StdDiag},
    ops,
    parse::decode_document,
    value::{DeclaredType, ImageValue, Value},
};

/// What a completed interpretation produced: the non-null per-statement
/// results in program order, and the number of successfully executed
/// operations.
#[derive(Debug)]
pub struct InterpretOutcome {
    pub results: Vec<Value>,
    pub operations: u64,
}

/// Primary interface for running GraphixLang programs.
///
/// The interpreter is generic over its host capabilities — codec, metadata
/// backend, filesystem, and diagnostic writer — with [`Interpreter::standard`]
/// wiring up the defaults.
///
/// # Example
/// ```
/// use graphix::{Interpreter, io::CollectDiag};
/// use graphix::backend::{DynamicCodec, ExifMetadataBackend, OsFileSystem};
///
/// let mut interp = Interpreter::new(DynamicCodec, ExifMetadataBackend, OsFileSystem, CollectDiag::new());
/// let doc = serde_json::json!({"Type": "ProgramNode", "Statements": []});
/// let outcome = interp.interpret(&doc).unwrap();
/// assert_eq!(outcome.operations, 0);
/// ```
#[derive(Debug)]
pub struct Interpreter<C = DynamicCodec, M = ExifMetadataBackend, F = OsFileSystem, D = StdDiag> {
    env: Environment,
    codec: C,
    meta: M,
    fs: F,
    diag: D,
    /// Rename counter: consumed by counter terms, never reset by `foreach`.
    rename_counter: u64,
    /// Successful non-arithmetic dispatches.
    operations: u64,
    rng: ChaCha8Rng,
    meta_warned: bool,
}

impl Interpreter {
    /// An interpreter over the default backends, printing diagnostics to
    /// stdout.
    #[must_use]
    pub fn standard() -> Self {
        Self::new(DynamicCodec, ExifMetadataBackend, OsFileSystem, StdDiag)
    }
}

impl<C, M, F, D> Interpreter<C, M, F, D>
where
    C: ImageCodec,
    M: MetadataBackend,
    F: FileSystem,
    D: DiagnosticWriter,
{
    pub fn new(codec: C, meta: M, fs: F, diag: D) -> Self {
        Self {
            env: Environment::new(),
            codec,
            meta,
            fs,
            diag,
            rename_counter: 0,
            operations: 0,
            rng: ChaCha8Rng::from_entropy(),
            meta_warned: false,
        }
    }

    /// Replaces the noise RNG with a deterministic one. Test hook.
    pub fn seed_noise(&mut self, seed: u64) {
        self.rng = ChaCha8Rng::seed_from_u64(seed);
    }

    #[must_use]
    pub fn env(&self) -> &Environment {
        &self.env
    }

    #[must_use]
    pub fn operations(&self) -> u64 {
        self.operations
    }

    #[must_use]
    pub fn diagnostics(&self) -> &D {
        &self.diag
    }

    /// Runs a JSON AST document to completion.
    ///
    /// Fatal errors abort with a diagnostic; per-file errors inside a
    /// `foreach` are caught there and do not surface here.
    pub fn interpret(&mut self, doc: &Json) -> RunResult<InterpretOutcome> {
        let statements = decode_document(doc)?;
        self.diag
            .line(&format!("Interpreting program with {} statement(s)", statements.len()));
        let mut results = Vec::new();
        for statement in &statements {
            if let Some(value) = self.exec(statement)? {
                results.push(value);
            }
        }
        Ok(InterpretOutcome {
            results,
            operations: self.operations,
        })
    }

    /// Convenience wrapper: parses `text` as JSON and interprets it.
    pub fn interpret_str(&mut self, text: &str) -> RunResult<InterpretOutcome> {
        let doc: Json = serde_json::from_str(text)
            .map_err(|err| ErrorKind::EvaluationError.msg(format!("AST document is not valid JSON: {err}")))?;
        self.interpret(&doc)
    }

    /// Visits one node. Every successful dispatch except binary/batch
    /// expressions and unknown kinds increments the operation counter.
    fn exec(&mut self, node: &Node) -> RunResult<Option<Value>> {
        let result = self.dispatch(node)?;
        if !matches!(
            node,
            Node::BinaryExpression { .. } | Node::BatchExpression { .. } | Node::Unknown { .. }
        ) {
            self.operations += 1;
        }
        Ok(result)
    }

    fn dispatch(&mut self, node: &Node) -> RunResult<Option<Value>> {
        match node {
            Node::Program { statements } | Node::Block { statements } => self.exec_statements(statements),
            Node::VariableDeclaration {
                declared_type,
                identifier,
                initializer,
            } => {
                let value = match initializer {
                    Some(node) => self.exec(node)?,
                    None => None,
                };
                self.env.declare(identifier, *declared_type, value);
                Ok(Some(Value::Str(identifier.clone())))
            }
            Node::Assignment { identifier, value } => {
                let evaluated = self.exec(value)?;
                self.env.assign(identifier, evaluated.clone());
                Ok(evaluated)
            }
            Node::ImageDeclaration { identifier, path } => {
                let path = self.fs.normalize(path);
                if !self.fs.is_file(&path) {
                    return ErrorKind::FileNotFound.err(format!("image file not found: {}", path.display()));
                }
                let handle = self.codec.open(&path)?;
                self.diag
                    .line(&format!("Loaded image '{identifier}' from {}", path.display()));
                self.env.declare(
                    identifier,
                    DeclaredType::Image,
                    Some(Value::Image(ImageValue::loaded(handle, path))),
                );
                Ok(Some(Value::Str(identifier.clone())))
            }
            Node::BatchDeclaration { identifier, expression } => {
                let raw = self.eval_batch_paths(expression)?;
                let normalized: Vec<PathBuf> = raw.iter().map(|path| self.fs.normalize(path)).collect();
                self.diag
                    .line(&format!("Declared batch '{identifier}' with paths: {normalized:?}"));
                self.env
                    .declare(identifier, DeclaredType::Batch, Some(Value::Batch(normalized)));
                Ok(Some(Value::Str(identifier.clone())))
            }
            Node::BatchExpression { .. } => {
                // reached only when a producer emits one outside a batch
                // declaration; compose it the same way
                let paths = self.eval_batch_paths(node)?;
                Ok(Some(Value::Batch(paths.iter().map(PathBuf::from).collect())))
            }
            Node::Literal { kind, raw } => eval_literal(*kind, raw),
            Node::VariableReference { identifier } => match self.env.get(identifier) {
                Some(binding) => Ok(binding.value.clone()),
                None => {
                    self.diag
                        .line(&format!("Warning: Variable {identifier} not found in environment"));
                    Ok(None)
                }
            },
            Node::BinaryExpression { left, operator, right } => {
                let Some(operator) = operator else {
                    self.diag.line("Unsupported operator in binary expression");
                    return Ok(None);
                };
                let lhs = self.exec(left)?;
                let rhs = self.exec(right)?;
                eval_binary(*operator, lhs, rhs).map(Some)
            }
            Node::Metadata { image, kind } => match kind {
                Some(kind) => metadata_value(&self.env, &self.fs, image, *kind).map(Some),
                None => Ok(None),
            },
            Node::If {
                condition,
                then_branch,
                elif_branches,
                else_branch,
            } => {
                if self.truthy(condition)? {
                    return self.exec_branch(then_branch.as_deref());
                }
                for branch in elif_branches {
                    if self.truthy(&branch.condition)? {
                        return self.exec_branch(branch.body.as_ref());
                    }
                }
                self.exec_branch(else_branch.as_deref())
            }
            Node::ForEach {
                var,
                batch,
                export_path,
                body,
                keep_original,
            } => self.exec_foreach(var, batch, export_path, body.as_deref(), *keep_original),

            Node::SetFilter { image, filter } => {
                let img = self.env.image_mut(image)?;
                ops::filters::apply(&mut img.handle, *filter);
                let label = <&str>::from(*filter).to_uppercase();
                self.diag.line(&format!("Applied {label} filter to {image}"));
                Ok(Some(Value::Str(image.clone())))
            }
            Node::Brightness { image, value } => {
                let img = self.env.image_mut(image)?;
                ops::enhance::brightness(&mut img.handle, *value);
                self.diag.line(&format!("Adjusted brightness of {image} to {value}"));
                Ok(Some(Value::Str(image.clone())))
            }
            Node::Contrast { image, value } => {
                let img = self.env.image_mut(image)?;
                ops::enhance::contrast(&mut img.handle, *value);
                self.diag.line(&format!("Adjusted contrast of {image} to {value}"));
                Ok(Some(Value::Str(image.clone())))
            }
            Node::Opacity { image, value } => {
                let img = self.env.image_mut(image)?;
                ops::enhance::opacity(&mut img.handle, *value);
                self.diag.line(&format!("Adjusted opacity of {image} to {value}"));
                Ok(Some(Value::Str(image.clone())))
            }
            Node::Noise { image, value } => {
                let Self { env, rng, .. } = self;
                let img = env.image_mut(image)?;
                ops::enhance::noise(&mut img.handle, *value, rng);
                self.diag.line(&format!("Added noise to {image} with level {value}"));
                Ok(Some(Value::Str(image.clone())))
            }
            Node::Blur { image, value } => {
                let img = self.env.image_mut(image)?;
                ops::enhance::blur(&mut img.handle, *value);
                self.diag
                    .line(&format!("Applied blur to {image} with radius {}", value / 10.0));
                Ok(Some(Value::Str(image.clone())))
            }
            Node::Pixelate { image, value } => {
                let img = self.env.image_mut(image)?;
                let block = ops::enhance::pixelate(&mut img.handle, *value);
                self.diag
                    .line(&format!("Applied pixelate effect to {image} with size {block}"));
                Ok(Some(Value::Str(image.clone())))
            }
            Node::Quantize { image, colors } => {
                let img = self.env.image_mut(image)?;
                ops::enhance::quantize(&mut img.handle, *colors);
                self.diag.line(&format!("Reduced {image} to {colors} colors"));
                Ok(Some(Value::Str(image.clone())))
            }
            Node::Rotate { image, direction } => {
                let img = self.env.image_mut(image)?;
                ops::geometry::rotate(&mut img.handle, *direction);
                let description = match direction {
                    crate::ast::RotateDirection::Left => "LEFT (90° counter-clockwise)",
                    crate::ast::RotateDirection::Right => "RIGHT (90° clockwise)",
                };
                self.diag.line(&format!("Rotated {image} {description}"));
                Ok(Some(Value::Str(image.clone())))
            }
            Node::Crop { image, width, height } => {
                self.env.image(image)?;
                let width = self.eval_int(width)?;
                let height = self.eval_int(height)?;
                let img = self.env.image_mut(image)?;
                let (w, h) = ops::geometry::crop(&mut img.handle, width, height);
                self.diag.line(&format!("Cropped {image} to {w}x{h}"));
                Ok(Some(Value::Str(image.clone())))
            }
            Node::Resize {
                image,
                width,
                height,
                aspect_ratio,
                ignore_aspect_ratio,
            } => {
                self.env.image(image)?;
                if let Some(ratio) = aspect_ratio {
                    let (a, b) = ops::geometry::parse_aspect_ratio(ratio)?;
                    let img = self.env.image_mut(image)?;
                    let (w, h) = ops::geometry::resize_to_ratio(&mut img.handle, a, b);
                    self.diag
                        .line(&format!("Resized {image} to aspect ratio {ratio} ({w}x{h})"));
                } else if let (Some(width), Some(height)) = (width, height) {
                    let width = self.eval_int(width)?;
                    let height = self.eval_int(height)?;
                    let maintain = !*ignore_aspect_ratio;
                    let img = self.env.image_mut(image)?;
                    let (w, h) = ops::geometry::resize_to_dims(&mut img.handle, width, height, maintain);
                    let how = if maintain {
                        "maintaining aspect ratio"
                    } else {
                        "ignoring aspect ratio"
                    };
                    self.diag.line(&format!("Resized {image} to {w}x{h} ({how})"));
                } else {
                    return ErrorKind::EvaluationError.err(format!("insufficient resize parameters for {image}"));
                }
                Ok(Some(Value::Str(image.clone())))
            }
            Node::Orientation { image, orientation } => {
                let img = self.env.image_mut(image)?;
                let rotated = ops::geometry::orient(&mut img.handle, *orientation);
                let label = <&str>::from(*orientation).to_uppercase();
                if rotated {
                    self.diag.line(&format!("Rotated {image} to {label} orientation"));
                } else {
                    self.diag.line(&format!("Image {image} already in {label} orientation"));
                }
                Ok(Some(Value::Str(image.clone())))
            }
            Node::Hue { image, degrees } => {
                let img = self.env.image_mut(image)?;
                ops::enhance::hue(&mut img.handle, *degrees);
                self.diag
                    .line(&format!("Applied HUE adjustment to {image} with value {degrees}"));
                Ok(Some(Value::Str(image.clone())))
            }
            Node::Compress { image, quality } => {
                let Self { env, codec, .. } = self;
                let img = env.image_mut(image)?;
                ops::encode::compress(&mut img.handle, *quality, codec)?;
                self.diag.line(&format!("Compressed {image} with quality {quality}"));
                Ok(Some(Value::Str(image.clone())))
            }
            Node::Convert { image, format } => {
                let img = self.env.image_mut(image)?;
                ops::encode::convert(img, *format);
                let label = <&str>::from(*format).to_uppercase();
                self.diag.line(&format!("Converted {image} format to {label}"));
                Ok(Some(Value::Str(image.clone())))
            }
            Node::WebOptimize { image, mode, quality } => {
                let Self { env, codec, .. } = self;
                let img = env.image_mut(image)?;
                ops::encode::web_optimize(&mut img.handle, *mode, *quality, codec)?;
                match mode {
                    crate::ast::WebOptimizeMode::Lossless => {
                        self.diag
                            .line(&format!("Applied lossless web optimization to {image}"));
                    }
                    crate::ast::WebOptimizeMode::Lossy => {
                        self.diag
                            .line(&format!("Applied lossy web optimization to {image} with quality {quality}"));
                    }
                }
                Ok(Some(Value::Str(image.clone())))
            }
            Node::Watermark {
                image,
                text,
                color,
                is_hex_color,
            } => {
                self.env.image(image)?;
                let color = ops::watermark::parse_color(color, *is_hex_color)?;
                let font = ops::watermark::find_system_font()?;
                let img = self.env.image_mut(image)?;
                ops::watermark::draw_text(&mut img.handle, text, color, &font);
                self.diag.line(&format!("Applied text watermark to {image}"));
                Ok(Some(Value::Str(image.clone())))
            }
            Node::ImageWatermark {
                image,
                watermark,
                transparency,
            } => {
                self.env.image(image)?;
                let mark = self.env.image(watermark)?.handle.image.clone();
                let img = self.env.image_mut(image)?;
                ops::watermark::overlay_image(&mut img.handle, &mark, *transparency);
                self.diag.line(&format!("Applied image watermark to {image}"));
                Ok(Some(Value::Str(image.clone())))
            }
            Node::StripMetadata {
                image,
                strip_all,
                categories,
            } => {
                let Self {
                    env,
                    codec,
                    meta,
                    diag,
                    meta_warned,
                    ..
                } = self;
                let img = env.image_mut(image)?;
                ops::metadata::strip(img, *strip_all, categories, codec, meta, diag, meta_warned)?;
                if *strip_all {
                    diag.line(&format!("Stripped ALL metadata from {image}"));
                } else {
                    let listed: Vec<String> = categories.iter().map(|c| <&str>::from(*c).to_uppercase()).collect();
                    diag.line(&format!(
                        "Stripped specific metadata from {image}: {}",
                        listed.join(", ")
                    ));
                }
                Ok(Some(Value::Str(image.clone())))
            }
            Node::AddMetadata { image, field, value } => {
                let Self {
                    env,
                    codec,
                    meta,
                    diag,
                    meta_warned,
                    ..
                } = self;
                let img = env.image_mut(image)?;
                ops::metadata::add(img, *field, value, codec, meta, diag, meta_warned)?;
                let label = <&str>::from(*field).to_uppercase();
                diag.line(&format!("Added {label} metadata to {image}: {value}"));
                Ok(Some(Value::Str(image.clone())))
            }
            Node::Rename { image, terms } => {
                let current = self.env.image(image)?.filename.clone();
                let Self {
                    env, fs, rename_counter, ..
                } = self;
                let name = ops::rename::build_filename(terms, current.as_deref(), rename_counter, |id, kind| {
                    metadata_value(env, fs, id, kind).map(|value| Some(value.to_display_string()))
                })?;
                self.env.image_mut(image)?.filename = Some(name.clone());
                self.diag.line(&format!("Renamed {image} to: {name}"));
                Ok(Some(Value::Str(image.clone())))
            }
            Node::Export {
                image,
                destination,
                keep_original,
            } => self.export_image(image, destination, *keep_original).map(Some),

            Node::Unknown { kind } => {
                self.diag.line(&format!("Unknown node type: {kind}"));
                Ok(None)
            }
        }
    }

    fn exec_statements(&mut self, statements: &[Node]) -> RunResult<Option<Value>> {
        let mut last = None;
        for statement in statements {
            if let Some(value) = self.exec(statement)? {
                last = Some(value);
            }
        }
        Ok(last)
    }

    /// Runs an if/elif/else branch. The block node itself is not a counted
    /// dispatch; its statements are.
    fn exec_branch(&mut self, node: Option<&Node>) -> RunResult<Option<Value>> {
        match node {
            None => Ok(None),
            Some(Node::Block { statements } | Node::Program { statements }) => self.exec_statements(statements),
            Some(other) => self.exec(other),
        }
    }

    fn truthy(&mut self, condition: &Node) -> RunResult<bool> {
        Ok(self.exec(condition)?.is_some_and(|value| value.is_truthy()))
    }

    fn eval_int(&mut self, node: &Node) -> RunResult<i64> {
        match self.exec(node)? {
            Some(Value::Int(value)) => Ok(value),
            Some(Value::Double(value)) => Ok(value as i64),
            Some(other) => ErrorKind::TypeMismatch.err(format!("expected a number, got a {}", other.type_name())),
            None => ErrorKind::TypeMismatch.err("expected a number, got no value"),
        }
    }

    /// Flattens a batch expression tree into its path list, left to right.
    /// A reference to another batch splices its paths in.
    fn eval_batch_paths(&mut self, node: &Node) -> RunResult<Vec<String>> {
        match node {
            Node::BatchExpression { parts } => {
                let mut paths = Vec::new();
                for part in parts {
                    paths.extend(self.eval_batch_paths(part)?);
                }
                Ok(paths)
            }
            other => match self.exec(other)? {
                Some(Value::Str(path)) => Ok(vec![path]),
                Some(Value::Batch(paths)) => Ok(paths.iter().map(|p| p.display().to_string()).collect()),
                Some(other) => {
                    ErrorKind::TypeMismatch.err(format!("batch paths must be strings, got a {}", other.type_name()))
                }
                None => ErrorKind::TypeMismatch.err("batch paths must be strings, got no value"),
            },
        }
    }

    fn exec_foreach(
        &mut self,
        var: &str,
        batch: &str,
        export_path: &str,
        body: Option<&Node>,
        keep_original: bool,
    ) -> RunResult<Option<Value>> {
        let batch_paths: Vec<PathBuf> = self.env.batch(batch)?.to_vec();
        let export_dir = self.fs.normalize(export_path);
        self.fs.create_dir_all(&export_dir)?;

        let mut files = Vec::new();
        for path in &batch_paths {
            if !self.fs.is_dir(path) {
                continue;
            }
            match self.fs.list_images(path) {
                Ok(found) => files.extend(found),
                Err(err) => self.diag.line(&format!("Warning: {err}")),
            }
        }
        self.diag
            .line(&format!("Processing {} images from batch {batch}", files.len()));

        let mut last_export = None;
        for file in files {
            match self.foreach_iteration(var, &file, &export_dir, body, keep_original) {
                Ok(exported) => last_export = Some(exported),
                // per-file failures are logged and iteration continues
                Err(err) => self.diag.line(&format!("Error processing {}: {err}", file.display())),
            }
        }
        Ok(last_export)
    }

    /// One `foreach` iteration: load, rebind the loop variable, run the
    /// body, then synthesize an export against the loop's destination.
    fn foreach_iteration(
        &mut self,
        var: &str,
        file: &Path,
        export_dir: &Path,
        body: Option<&Node>,
        keep_original: bool,
    ) -> RunResult<Value> {
        let handle = self.codec.open(file)?;
        self.env.declare(
            var,
            DeclaredType::Image,
            Some(Value::Image(ImageValue::loaded(handle, file.to_path_buf()))),
        );
        if let Some(Node::Block { statements }) = body {
            for statement in statements {
                self.exec(statement)?;
            }
        }
        self.export_image(var, &export_dir.display().to_string(), keep_original)
    }

    /// Encodes and writes an image to its destination, then optionally
    /// disposes of the source file. Returns the full destination path.
    fn export_image(&mut self, image_id: &str, destination: &str, keep_original: bool) -> RunResult<Value> {
        let image = self.env.image(image_id)?;
        let filename = image
            .filename
            .clone()
            .or_else(|| {
                image
                    .source_path
                    .as_deref()
                    .and_then(Path::file_name)
                    .map(|name| name.to_string_lossy().into_owned())
            })
            .unwrap_or_else(|| "image.png".to_owned());
        let source_path = image.source_path.clone();

        let dest = self.fs.normalize(destination);
        let treat_as_dir = self.fs.is_dir(&dest) || destination.ends_with('/') || destination.ends_with('\\');
        let full = if treat_as_dir {
            self.fs.create_dir_all(&dest)?;
            dest.join(&filename)
        } else {
            if let Some(parent) = dest.parent()
                && !parent.as_os_str().is_empty()
            {
                self.fs.create_dir_all(parent)?;
            }
            dest
        };

        let format = full
            .extension()
            .and_then(|ext| ext.to_str())
            .and_then(ImageFormat::from_extension)
            .or(image.handle.format)
            .unwrap_or(ImageFormat::Png);
        self.codec.save(&image.handle, &full, format)?;
        self.diag.line(&format!("Exported {image_id} to {}", full.display()));

        if !keep_original
            && let Some(source) = source_path
            && self.fs.exists(&source)
        {
            // disposal failures are reported but never fatal
            match self.fs.remove_file(&source) {
                Ok(()) => self.diag.line(&format!("Deleted original file: {}", source.display())),
                Err(err) => self
                    .diag
                    .line(&format!("Warning: could not delete {}: {err}", source.display())),
            }
        }
        Ok(Value::Str(full.display().to_string()))
    }
}

/// Reads one metadata attribute of a bound image.
fn metadata_value<F: FileSystem>(env: &Environment, fs: &F, image_id: &str, kind: MetadataKind) -> RunResult<Value> {
    let image = env.image(image_id)?;
    Ok(match kind {
        MetadataKind::Width => Value::Int(i64::from(image.handle.width())),
        MetadataKind::Height => Value::Int(i64::from(image.handle.height())),
        MetadataKind::Name => Value::Str(image.filename.clone().unwrap_or_default()),
        MetadataKind::Size => match image.source_path.as_deref() {
            Some(path) if fs.exists(path) => Value::Int(fs.size(path) as i64),
            _ => Value::Int(0),
        },
    })
}

/// Converts a literal's raw JSON value according to its declared kind.
/// Unknown kinds pass the raw value through as-is.
fn eval_literal(kind: Option<LiteralKind>, raw: &Json) -> RunResult<Option<Value>> {
    let bad = |what: &str| ErrorKind::EvaluationError.msg(format!("cannot convert literal {raw} to {what}"));
    match kind {
        Some(LiteralKind::Int) => match raw {
            Json::Number(number) => number
                .as_i64()
                .or_else(|| number.as_f64().map(|f| f as i64))
                .map(|v| Some(Value::Int(v)))
                .ok_or_else(|| bad("an integer")),
            Json::String(text) => text
                .trim()
                .parse::<i64>()
                .map(|v| Some(Value::Int(v)))
                .map_err(|_| bad("an integer")),
            _ => Err(bad("an integer")),
        },
        Some(LiteralKind::Double) => match raw {
            Json::Number(number) => number
                .as_f64()
                .map(|v| Some(Value::Double(v)))
                .ok_or_else(|| bad("a double")),
            Json::String(text) => text
                .trim()
                .parse::<f64>()
                .map(|v| Some(Value::Double(v)))
                .map_err(|_| bad("a double")),
            _ => Err(bad("a double")),
        },
        Some(LiteralKind::Str) => Ok(Some(Value::Str(match raw {
            Json::String(text) => text.clone(),
            other => other.to_string(),
        }))),
        Some(LiteralKind::Bool) => match raw {
            Json::Bool(value) => Ok(Some(Value::Bool(*value))),
            Json::String(text) => Ok(Some(Value::Bool(text.eq_ignore_ascii_case("true")))),
            _ => Err(bad("a bool")),
        },
        None => match raw {
            Json::Null => Ok(None),
            Json::Bool(value) => Ok(Some(Value::Bool(*value))),
            Json::Number(number) => Ok(Some(match number.as_i64() {
                Some(int) => Value::Int(int),
                None => Value::Double(number.as_f64().unwrap_or(f64::NAN)),
            })),
            Json::String(text) => Ok(Some(Value::Str(text.clone()))),
            _ => Err(bad("a value")),
        },
    }
}

/// Applies a binary operator. Arithmetic widens to the wider numeric type,
/// `PLUS` concatenates strings, comparisons order numbers and strings.
fn eval_binary(op: Operator, lhs: Option<Value>, rhs: Option<Value>) -> RunResult<Value> {
    let (Some(lhs), Some(rhs)) = (lhs, rhs) else {
        return ErrorKind::TypeMismatch.err(format!("cannot apply {op} to a missing value"));
    };
    match op {
        Operator::Plus => match (&lhs, &rhs) {
            (Value::Str(a), Value::Str(b)) => Ok(Value::Str(format!("{a}{b}"))),
            (Value::Int(a), Value::Int(b)) => checked_int(a.checked_add(*b)),
            _ => arith(&lhs, &rhs, op, |a, b| a + b),
        },
        Operator::Minus => match (&lhs, &rhs) {
            (Value::Int(a), Value::Int(b)) => checked_int(a.checked_sub(*b)),
            _ => arith(&lhs, &rhs, op, |a, b| a - b),
        },
        Operator::Multiply => match (&lhs, &rhs) {
            (Value::Int(a), Value::Int(b)) => checked_int(a.checked_mul(*b)),
            _ => arith(&lhs, &rhs, op, |a, b| a * b),
        },
        Operator::Divide => {
            let (a, b) = numeric_pair(&lhs, &rhs, op)?;
            if b == 0.0 {
                return ErrorKind::EvaluationError.err("division by zero");
            }
            Ok(Value::Double(a / b))
        }
        Operator::Equal => Ok(Value::Bool(values_equal(&lhs, &rhs))),
        Operator::NotEqual => Ok(Value::Bool(!values_equal(&lhs, &rhs))),
        Operator::Greater | Operator::GreaterEqual | Operator::Smaller | Operator::SmallerEqual => {
            compare(op, &lhs, &rhs).map(Value::Bool)
        }
    }
}

fn checked_int(result: Option<i64>) -> RunResult<Value> {
    result
        .map(Value::Int)
        .ok_or_else(|| ErrorKind::EvaluationError.msg("integer overflow"))
}

fn arith(lhs: &Value, rhs: &Value, op: Operator, apply: impl Fn(f64, f64) -> f64) -> RunResult<Value> {
    let (a, b) = numeric_pair(lhs, rhs, op)?;
    Ok(Value::Double(apply(a, b)))
}

fn numeric_pair(lhs: &Value, rhs: &Value, op: Operator) -> RunResult<(f64, f64)> {
    match (lhs.as_number(), rhs.as_number()) {
        (Some(a), Some(b)) => Ok((a, b)),
        _ => ErrorKind::TypeMismatch.err(format!(
            "cannot apply {op} to {} and {}",
            lhs.type_name(),
            rhs.type_name()
        )),
    }
}

fn values_equal(lhs: &Value, rhs: &Value) -> bool {
    match (lhs, rhs) {
        (Value::Str(a), Value::Str(b)) => a == b,
        (Value::Bool(a), Value::Bool(b)) => a == b,
        _ => match (lhs.as_number(), rhs.as_number()) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        },
    }
}

fn compare(op: Operator, lhs: &Value, rhs: &Value) -> RunResult<bool> {
    if let (Some(a), Some(b)) = (lhs.as_number(), rhs.as_number()) {
        return Ok(apply_ordering(op, a.partial_cmp(&b)));
    }
    if let (Value::Str(a), Value::Str(b)) = (lhs, rhs) {
        return Ok(apply_ordering(op, Some(a.cmp(b))));
    }
    ErrorKind::TypeMismatch.err(format!(
        "cannot order {} and {}",
        lhs.type_name(),
        rhs.type_name()
    ))
}

fn apply_ordering(op: Operator, ordering: Option<std::cmp::Ordering>) -> bool {
    use std::cmp::Ordering::{Equal, Greater, Less};
    let Some(ordering) = ordering else {
        // NaN compares false under every ordering operator
        return false;
    };
    match op {
        Operator::Greater => ordering == Greater,
        Operator::GreaterEqual => ordering != Less,
        Operator::Smaller => ordering == Less,
        Operator::SmallerEqual => ordering != Greater,
        _ => unreachable!("comparison dispatch only"),
    }
}
