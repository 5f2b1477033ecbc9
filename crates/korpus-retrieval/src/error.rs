//! Retrieval error types.

use thiserror::Error;

/// Errors surfaced by the retrieval pipeline.
#[derive(Debug, Error)]
pub enum RetrievalError {
    /// Store-level failure (including unsupported-filter rejections).
    #[error(transparent)]
    Store(#[from] korpus_store::StoreError),

    /// Vector index format, dimension, or configuration problem.
    #[error("vector index error: {0}")]
    Index(String),

    /// The embedder returned malformed output.
    #[error("embedding error: {0}")]
    Embedding(String),

    /// JSON (de)serialization failure for index sidecar files.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for retrieval operations.
pub type RetrievalResult<T> = Result<T, RetrievalError>;
