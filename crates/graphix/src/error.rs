use std::fmt::{self, Display};

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString, IntoStaticStr};

/// Result type alias for operations that can produce a runtime error.
pub type RunResult<T> = Result<T, RunError>;

/// Error categories raised while executing a GraphixLang program.
///
/// Uses strum derives for automatic `Display`, `FromStr`, and `Into<&'static str>`
/// implementations. The string representation matches the variant name exactly
/// (e.g., `FileNotFound` -> "FileNotFound").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, IntoStaticStr, Serialize, Deserialize)]
pub enum ErrorKind {
    /// An image path named by a declaration does not exist on disk.
    FileNotFound,
    /// An operation referenced an identifier with no live binding.
    ///
    /// Pure reads (plain variable references) never raise this; they warn
    /// through the diagnostic writer and yield no value instead.
    UnknownIdentifier,
    /// A binding exists but holds a value of the wrong kind for the operation
    /// (e.g., an image op applied to a batch).
    TypeMismatch,
    /// Arithmetic or parameter evaluation failed: division by zero, a
    /// malformed color literal, a bad aspect-ratio string, or an AST shape
    /// that cannot be interpreted.
    EvaluationError,
    /// A binary expression carried an operator outside the supported set.
    UnsupportedOperator,
    /// A node kind the dispatcher does not recognize.
    ///
    /// Only used for reporting; unknown nodes are diagnosed and skipped
    /// rather than raised.
    UnknownNodeKind,
    /// A codec, metadata, or filesystem backend failure.
    BackendError,
}

impl ErrorKind {
    /// Builds a [`RunError`] of this kind with the given message.
    pub fn msg(self, message: impl Into<String>) -> RunError {
        RunError::new(self, message)
    }

    /// Shorthand for an `Err` carrying this kind, saving a `map_err` chain
    /// at call sites that construct the message inline.
    pub fn err<T>(self, message: impl Into<String>) -> RunResult<T> {
        Err(self.msg(message))
    }
}

/// A runtime error: an [`ErrorKind`] plus a human-readable message.
///
/// Fatal errors abort interpretation; inside a `foreach` body they are caught
/// per file, logged, and iteration continues.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunError {
    kind: ErrorKind,
    message: String,
}

impl RunError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Wraps a backend failure, keeping the causing error's text.
    pub fn backend(context: &str, cause: impl Display) -> Self {
        Self::new(ErrorKind::BackendError, format!("{context}: {cause}"))
    }

    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for RunError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

impl std::error::Error for RunError {}
