//! # Content Digests
//!
//! SHA-256 digest computation over canonical bytes. [`ContentDigest`] can
//! only be computed via [`sha256_digest()`], which accepts only
//! `&CanonicalBytes`. There is no public constructor from raw bytes
//! outside of [`ContentDigest::from_hex`] (used to reconstruct digests
//! received at trust boundaries, e.g. channel manifests).
//!
//! All structured-data SHA-256 in the workspace flows through this module;
//! file-content hashing (raw byte streams) lives with the hash catalog in
//! `korpus-pack`.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::canonical::CanonicalBytes;
use crate::error::EncodingError;

/// A SHA-256 content digest.
///
/// Serializes as a lowercase 64-character hex string.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ContentDigest([u8; 32]);

impl ContentDigest {
    /// Access the raw 32-byte digest value.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Return the digest as a lowercase hex string.
    pub fn to_hex(&self) -> String {
        self.0.iter().map(|b| format!("{b:02x}")).collect()
    }

    /// Reconstruct a digest from a 64-character hex string.
    ///
    /// This does not compute a digest; it parses one previously computed
    /// (e.g. `to_manifest_sha256` arriving in a channel manifest).
    pub fn from_hex(hex: &str) -> Result<Self, String> {
        let hex = hex.trim();
        if hex.len() != 64 {
            return Err(format!(
                "expected 64 hex chars for SHA-256 digest, got {}",
                hex.len()
            ));
        }
        let mut bytes = [0u8; 32];
        for i in 0..32 {
            bytes[i] = u8::from_str_radix(&hex[i * 2..i * 2 + 2], 16)
                .map_err(|_| format!("invalid hex at position {}", i * 2))?;
        }
        Ok(Self(bytes))
    }
}

impl std::fmt::Display for ContentDigest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl Serialize for ContentDigest {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for ContentDigest {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let hex = String::deserialize(deserializer)?;
        Self::from_hex(&hex).map_err(serde::de::Error::custom)
    }
}

/// Compute a SHA-256 digest from canonical bytes.
///
/// The type signature `&CanonicalBytes` (not `&[u8]`) guarantees the input
/// has passed through `CanonicalBytes::new()`, so every digest in the
/// system was produced from the unique canonical form.
pub fn sha256_digest(canonical: &CanonicalBytes) -> ContentDigest {
    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    ContentDigest(hasher.finalize().into())
}

/// Compute a SHA-256 hex string from canonical bytes.
pub fn sha256_hex(canonical: &CanonicalBytes) -> String {
    sha256_digest(canonical).to_hex()
}

/// Canonicalize a manifest-like value and return its SHA-256 hex digest.
///
/// This is the definition of `manifest_sha256` used by snapshot and delta
/// manifests, channel plan selection, and the update state machine.
pub fn manifest_sha256(value: &impl Serialize) -> Result<String, EncodingError> {
    let canonical = CanonicalBytes::new(value)?;
    Ok(sha256_hex(&canonical))
}
