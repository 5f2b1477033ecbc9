//! Pack-specific error types.
//!
//! Structured errors for pack operations. Every error carries the
//! offending path or digest so CLI output and update-state records can
//! name exactly what failed.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur during pack operations.
#[derive(Debug, Error)]
pub enum PackError {
    /// Ed25519 verification of a manifest failed.
    #[error("signature verification failed for {artifact}")]
    Signature { artifact: String },

    /// Content does not match the manifest (size, sha256, missing file,
    /// or unexpected file set).
    #[error("integrity error at {path}: {detail}")]
    Integrity { path: String, detail: String },

    /// A required file or directory was not found.
    #[error("not found: {path}")]
    NotFound { path: PathBuf },

    /// A manifest is structurally invalid.
    #[error("invalid manifest: {0}")]
    InvalidManifest(String),

    /// The active pointer is missing or names a missing install.
    #[error("active pack state error: {0}")]
    ActiveState(String),

    /// Canonicalization failed (delegated from korpus-core).
    #[error("canonicalization error: {0}")]
    Encoding(#[from] korpus_core::EncodingError),

    /// Key or signature material problem (delegated from korpus-crypto).
    #[error(transparent)]
    Crypto(#[from] korpus_crypto::SignatureError),

    /// JSON parse error (not integrity: the file could not be read as
    /// JSON at all).
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<korpus_core::fsio::CanonicalWriteError> for PackError {
    fn from(e: korpus_core::fsio::CanonicalWriteError) -> Self {
        match e {
            korpus_core::fsio::CanonicalWriteError::Encoding(e) => Self::Encoding(e),
            korpus_core::fsio::CanonicalWriteError::Io(e) => Self::Io(e),
        }
    }
}

/// Result type alias for pack operations.
pub type PackResult<T> = Result<T, PackError>;
