//! Error types for stream_scraper.
//!
//! A selector that matches nothing is not an error; extractors return empty
//! strings for it.

/// Error type for retrieval and extraction operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The source document could not be obtained.
    #[error("{0}")]
    Retrieval(String),

    /// An operation named an unknown extractor or was missing a required field.
    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    /// The dispatcher rejected a selector.
    #[error("Invalid selector {selector:?}: {reason}")]
    Selector { selector: String, reason: String },

    /// The tokenizer aborted a pass.
    #[error("HTML rewriting failed: {0}")]
    Rewrite(String),

    /// A batched pass panicked or was cancelled before completing.
    #[error("Extraction task failed: {0}")]
    Task(String),

    /// The async runtime backing a blocking entry point could not start.
    #[error("Runtime error: {0}")]
    Runtime(#[from] std::io::Error),

    /// Request or response JSON could not be (de)serialized.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    pub(crate) fn fetch_failed(detail: impl std::fmt::Display) -> Self {
        Self::Retrieval(format!("Failed to fetch URL: {detail}"))
    }
}

/// Result type alias for stream_scraper operations.
pub type Result<T> = std::result::Result<T, Error>;
