//! Store error types.

use thiserror::Error;

/// Errors surfaced by the relational store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A requested row (document, run) does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// A filter field is reserved but not implemented. Callers get an
    /// explicit rejection, never a silently ignored filter.
    #[error("{filter} filter not supported")]
    UnsupportedFilter { filter: &'static str },

    /// Canonicalization of a JSON column failed.
    #[error("canonicalization error: {0}")]
    Encoding(#[from] korpus_core::EncodingError),

    /// Underlying SQLite failure.
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Filesystem failure while opening the store.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
