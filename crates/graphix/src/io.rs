use std::io::{self, Write as _};

/// Trait for handling diagnostic output from the interpreter.
///
/// Everything the interpreter reports while running a program — progress
/// lines for applied operations, warnings for unbound reads, per-file
/// failures inside a `foreach` — goes through this trait. The default
/// implementation [`StdDiag`] writes to stdout.
pub trait DiagnosticWriter {
    /// Called once per diagnostic line, without a trailing newline.
    fn line(&mut self, message: &str);
}

/// Default `DiagnosticWriter` that writes each line to stdout.
#[derive(Debug, Default)]
pub struct StdDiag;

impl DiagnosticWriter for StdDiag {
    fn line(&mut self, message: &str) {
        let mut stdout = io::stdout().lock();
        let _ = writeln!(stdout, "{message}");
    }
}

/// A `DiagnosticWriter` that collects all lines into a vector.
///
/// Useful for testing or capturing interpreter output programmatically.
#[derive(Debug, Default)]
pub struct CollectDiag(Vec<String>);

impl CollectDiag {
    #[must_use]
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// Returns the collected lines.
    #[must_use]
    pub fn lines(&self) -> &[String] {
        &self.0
    }

    /// Returns `true` if any collected line contains `needle`.
    #[must_use]
    pub fn contains(&self, needle: &str) -> bool {
        self.0.iter().any(|line| line.contains(needle))
    }

    /// Consumes the writer and returns the collected lines.
    #[must_use]
    pub fn into_lines(self) -> Vec<String> {
        self.0
    }
}

impl DiagnosticWriter for CollectDiag {
    fn line(&mut self, message: &str) {
        self.0.push(message.to_owned());
    }
}

/// `DiagnosticWriter` that ignores all output.
///
/// Useful for suppressing interpreter chatter during benchmarking.
#[derive(Debug, Default)]
pub struct NoDiag;

impl DiagnosticWriter for NoDiag {
    fn line(&mut self, _message: &str) {}
}
