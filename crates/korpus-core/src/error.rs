//! Core error types.
//!
//! Only the canonicalization error lives here; every other crate defines
//! its own structured error enum and converts from this one where needed.

use thiserror::Error;

/// Error during canonical serialization.
///
/// Canonicalization is total over the value domain it accepts: null,
/// bool, finite number, UTF-8 string, array, and object with string keys.
/// The failure conditions below are the only ways out.
#[derive(Error, Debug)]
pub enum EncodingError {
    /// NaN and ±∞ have no canonical decimal form.
    #[error("non-finite number cannot be canonicalized: {0}")]
    NonFiniteNumber(f64),

    /// The value could not be represented as canonical JSON
    /// (non-string mapping key, serializer failure).
    #[error("canonical serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}
