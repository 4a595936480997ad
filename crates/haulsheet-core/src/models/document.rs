//! Raw settlement document input.

/// A settlement document as an ordered sequence of text lines.
///
/// The line-level text conversion (PDF or otherwise) happens upstream;
/// the engine only ever sees text. The document is immutable once built.
#[derive(Debug, Clone)]
pub struct RawDocument {
    lines: Vec<String>,
    source_file: String,
}

impl RawDocument {
    /// Build a document from pre-split lines.
    pub fn from_lines(source_file: impl Into<String>, lines: Vec<String>) -> Self {
        Self {
            lines,
            source_file: source_file.into(),
        }
    }

    /// Build a document by splitting a text blob on newlines.
    pub fn from_text(source_file: impl Into<String>, text: &str) -> Self {
        Self {
            lines: text.lines().map(|l| l.to_string()).collect(),
            source_file: source_file.into(),
        }
    }

    /// The ordered text lines.
    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    /// Original filename, carried into the output for traceability.
    pub fn source_file(&self) -> &str {
        &self.source_file
    }

    /// Full text with lines rejoined by `\n`.
    pub fn full_text(&self) -> String {
        self.lines.join("\n")
    }

    /// True when the document carries no text at all.
    pub fn is_empty(&self) -> bool {
        self.lines.iter().all(|l| l.trim().is_empty())
    }
}
