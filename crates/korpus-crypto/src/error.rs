//! Crypto error types.

use korpus_core::EncodingError;
use thiserror::Error;

/// Error in signing and verification operations.
#[derive(Error, Debug)]
pub enum SignatureError {
    /// Signature verification failed.
    #[error("signature verification failed: {0}")]
    VerificationFailed(String),

    /// Key material could not be parsed or constructed.
    #[error("key error: {0}")]
    Key(String),

    /// Signature material could not be parsed.
    #[error("signature error: {0}")]
    Malformed(String),

    /// The value to sign or verify had no canonical form.
    #[error("canonicalization error: {0}")]
    Encoding(#[from] EncodingError),
}
