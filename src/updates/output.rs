//! # Continuous output accumulated between refresh polls.
//!
//! A [`ContinuousOutput`] is an ordered list of [`OutputChunk`]s. Each chunk records
//! which stream produced it and when, so callers can interleave stdout, stderr
//! and dispatcher diagnostics faithfully.

use std::fmt;
use std::time::SystemTime;

/// Stream a chunk of output came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OutputKind {
    /// Standard output of the command.
    Stdout,
    /// Standard error of the command.
    Stderr,
    /// Diagnostics produced by the runner or dispatcher (e.g. encoded errors).
    Debug,
}

impl OutputKind {
    /// Stable lowercase name.
    pub fn as_str(&self) -> &'static str {
        match self {
            OutputKind::Stdout => "stdout",
            OutputKind::Stderr => "stderr",
            OutputKind::Debug => "debug",
        }
    }
}

impl fmt::Display for OutputKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One piece of output.
#[derive(Debug, Clone, PartialEq)]
pub struct OutputChunk {
    /// Stream the text came from.
    pub kind: OutputKind,
    /// The text itself.
    pub text: String,
    /// When the chunk was recorded.
    pub timestamp: SystemTime,
}

/// Ordered output chunks.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContinuousOutput {
    chunks: Vec<OutputChunk>,
}

impl ContinuousOutput {
    /// Creates an empty output.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a chunk stamped with the current time.
    pub fn add_output(&mut self, text: impl Into<String>, kind: OutputKind) {
        self.chunks.push(OutputChunk {
            kind,
            text: text.into(),
            timestamp: SystemTime::now(),
        });
    }

    /// Appends a `Debug` chunk describing an error: `"<context>: <error>"`.
    pub fn add_exception(&mut self, context: &str, error: &dyn std::error::Error) {
        self.add_output(format!("{context}: {error}"), OutputKind::Debug);
    }

    /// Moves all chunks of `other` to the end of `self`.
    pub fn extend(&mut self, other: ContinuousOutput) {
        self.chunks.extend(other.chunks);
    }

    /// Returns the chunks in recording order.
    pub fn chunks(&self) -> &[OutputChunk] {
        &self.chunks
    }

    /// Returns an iterator over chunks of one kind.
    pub fn of_kind(&self, kind: OutputKind) -> impl Iterator<Item = &OutputChunk> {
        self.chunks.iter().filter(move |c| c.kind == kind)
    }

    /// Concatenates the text of all chunks of one kind, newline separated.
    pub fn text_of(&self, kind: OutputKind) -> String {
        self.of_kind(kind)
            .map(|c| c.text.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// True if no chunk was recorded.
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Number of chunks.
    pub fn len(&self) -> usize {
        self.chunks.len()
    }
}
