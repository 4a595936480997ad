//! Error types for the haulsheet-core library.

use thiserror::Error;

/// Main error type for the haulsheet library.
#[derive(Error, Debug)]
pub enum HaulsheetError {
    /// Settlement extraction error.
    #[error("extraction error: {0}")]
    Extraction(#[from] ExtractionError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}

/// Errors related to settlement extraction.
#[derive(Error, Debug)]
pub enum ExtractionError {
    /// No settlement could be extracted from the document. This is the
    /// engine's only terminal failure: an empty result is never reported
    /// as success.
    #[error("no settlements extracted from {source_file}")]
    NoSettlements { source_file: String },

    /// Failed to parse a value.
    #[error("failed to parse {field}: {value}")]
    Parse { field: String, value: String },
}

/// Result type for the haulsheet library.
pub type Result<T> = std::result::Result<T, HaulsheetError>;
