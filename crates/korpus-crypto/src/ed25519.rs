//! # Ed25519 Signing and Verification
//!
//! Provides Ed25519 key generation, signing, and verification for pack
//! manifests.
//!
//! ## Security Invariant
//!
//! - Signing input MUST be `&CanonicalBytes`; you cannot sign raw bytes.
//!   All signed data has been canonicalized through the RFC 8785 pipeline,
//!   so signer and verifier can never disagree about the byte form.
//! - Private keys are never serialized implicitly. `Ed25519KeyPair` does
//!   not implement `Serialize`; seed export is an explicit call used only
//!   by key generation tooling.
//!
//! ## Transport
//!
//! Keys are raw 32-byte values and signatures raw 64-byte values, carried
//! as standard base64 strings.

use base64::prelude::{Engine as _, BASE64_STANDARD};
use ed25519_dalek::{Signer, Verifier};
use korpus_core::CanonicalBytes;
use serde::Serialize;

use crate::error::SignatureError;

/// An Ed25519 public key (32 bytes) for signature verification.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Ed25519PublicKey(pub [u8; 32]);

/// An Ed25519 signature (64 bytes).
#[derive(Clone, PartialEq, Eq)]
pub struct Ed25519Signature(pub [u8; 64]);

/// An Ed25519 key pair for signing operations.
///
/// Does not implement `Serialize`: private keys must not leak into
/// logs, responses, or artifacts.
pub struct Ed25519KeyPair {
    signing_key: ed25519_dalek::SigningKey,
}

// ---------------------------------------------------------------------------
// Ed25519PublicKey impls
// ---------------------------------------------------------------------------

impl Ed25519PublicKey {
    /// Create a public key from raw 32 bytes.
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Return the raw 32-byte public key.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Render the public key as standard base64.
    pub fn to_base64(&self) -> String {
        BASE64_STANDARD.encode(self.0)
    }

    /// Parse a public key from a base64 string decoding to exactly 32 bytes.
    pub fn from_base64(b64: &str) -> Result<Self, SignatureError> {
        let raw = BASE64_STANDARD
            .decode(b64.trim())
            .map_err(|e| SignatureError::Key(format!("invalid base64 public key: {e}")))?;
        let arr: [u8; 32] = raw.try_into().map_err(|v: Vec<u8>| {
            SignatureError::Key(format!(
                "public key must decode to exactly 32 bytes, got {}",
                v.len()
            ))
        })?;
        Ok(Self(arr))
    }

    fn to_verifying_key(&self) -> Result<ed25519_dalek::VerifyingKey, SignatureError> {
        ed25519_dalek::VerifyingKey::from_bytes(&self.0)
            .map_err(|e| SignatureError::Key(format!("invalid public key: {e}")))
    }
}

impl std::fmt::Debug for Ed25519PublicKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Ed25519PublicKey({}…)", base64_prefix(&self.0))
    }
}

impl std::fmt::Display for Ed25519PublicKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_base64())
    }
}

// ---------------------------------------------------------------------------
// Ed25519Signature impls
// ---------------------------------------------------------------------------

impl Ed25519Signature {
    /// Create a signature from raw 64 bytes.
    pub fn from_bytes(bytes: [u8; 64]) -> Self {
        Self(bytes)
    }

    /// Return the raw 64-byte signature.
    pub fn as_bytes(&self) -> &[u8; 64] {
        &self.0
    }

    /// Render the signature as standard base64.
    pub fn to_base64(&self) -> String {
        BASE64_STANDARD.encode(self.0)
    }

    /// Parse a signature from a base64 string decoding to exactly 64 bytes.
    pub fn from_base64(b64: &str) -> Result<Self, SignatureError> {
        let raw = BASE64_STANDARD
            .decode(b64.trim())
            .map_err(|e| SignatureError::Malformed(format!("invalid base64 signature: {e}")))?;
        let arr: [u8; 64] = raw.try_into().map_err(|v: Vec<u8>| {
            SignatureError::Malformed(format!(
                "signature must decode to exactly 64 bytes, got {}",
                v.len()
            ))
        })?;
        Ok(Self(arr))
    }
}

impl std::fmt::Debug for Ed25519Signature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Ed25519Signature({}…)", base64_prefix(&self.0))
    }
}

impl std::fmt::Display for Ed25519Signature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_base64())
    }
}

// ---------------------------------------------------------------------------
// Ed25519KeyPair impls
// ---------------------------------------------------------------------------

impl Ed25519KeyPair {
    /// Generate a new random Ed25519 key pair.
    pub fn generate() -> Self {
        let mut csprng = rand::rngs::OsRng;
        Self {
            signing_key: ed25519_dalek::SigningKey::generate(&mut csprng),
        }
    }

    /// Create a key pair from a raw 32-byte private seed.
    pub fn from_seed(seed: &[u8; 32]) -> Self {
        Self {
            signing_key: ed25519_dalek::SigningKey::from_bytes(seed),
        }
    }

    /// Create a key pair from a base64 seed decoding to exactly 32 bytes.
    pub fn from_base64(b64: &str) -> Result<Self, SignatureError> {
        let raw = BASE64_STANDARD
            .decode(b64.trim())
            .map_err(|e| SignatureError::Key(format!("invalid base64 private key: {e}")))?;
        let arr: [u8; 32] = raw.try_into().map_err(|v: Vec<u8>| {
            SignatureError::Key(format!(
                "private key must decode to exactly 32 bytes, got {}",
                v.len()
            ))
        })?;
        Ok(Self::from_seed(&arr))
    }

    /// Export the raw seed as base64.
    ///
    /// Used only by key generation tooling; never called on a hot path
    /// and never logged by this crate.
    pub fn seed_base64(&self) -> String {
        BASE64_STANDARD.encode(self.signing_key.to_bytes())
    }

    /// Get the public key from this key pair.
    pub fn public_key(&self) -> Ed25519PublicKey {
        Ed25519PublicKey(self.signing_key.verifying_key().to_bytes())
    }

    /// Sign canonical bytes.
    ///
    /// The signing input MUST be `&CanonicalBytes`; you cannot sign raw
    /// `&[u8]`, which guarantees signer and verifier agree on the exact
    /// byte form of the signed value.
    pub fn sign(&self, data: &CanonicalBytes) -> Ed25519Signature {
        Ed25519Signature(self.signing_key.sign(data.as_bytes()).to_bytes())
    }
}

impl std::fmt::Debug for Ed25519KeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Ed25519KeyPair(<private>)")
    }
}

// ---------------------------------------------------------------------------
// Verification
// ---------------------------------------------------------------------------

/// Verify an Ed25519 signature over canonical bytes.
///
/// Returns `Ok(())` if valid, `Err(SignatureError::VerificationFailed)`
/// otherwise.
pub fn verify(
    data: &CanonicalBytes,
    signature: &Ed25519Signature,
    public_key: &Ed25519PublicKey,
) -> Result<(), SignatureError> {
    let vk = public_key.to_verifying_key()?;
    let sig = ed25519_dalek::Signature::from_bytes(&signature.0);
    vk.verify(data.as_bytes(), &sig)
        .map_err(|e| SignatureError::VerificationFailed(format!("Ed25519 verification failed: {e}")))
}

/// Sign a serializable value: canonicalize, then sign the canonical bytes.
///
/// Callers pass the value, never pre-serialized bytes. This is the only
/// public signing entry point for structured data.
pub fn sign_value(
    keypair: &Ed25519KeyPair,
    value: &impl Serialize,
) -> Result<Ed25519Signature, SignatureError> {
    let canonical = CanonicalBytes::new(value)?;
    Ok(keypair.sign(&canonical))
}

/// Verify a signature over a serializable value.
///
/// Returns `Ok(true)` iff the signature matches the canonical bytes of
/// `value`; `Ok(false)` on a well-formed but non-matching signature;
/// `Err` only when the key or value itself is unusable.
pub fn verify_value(
    public_key: &Ed25519PublicKey,
    value: &impl Serialize,
    signature: &Ed25519Signature,
) -> Result<bool, SignatureError> {
    let canonical = CanonicalBytes::new(value)?;
    match verify(&canonical, signature, public_key) {
        Ok(()) => Ok(true),
        Err(SignatureError::VerificationFailed(_)) => Ok(false),
        Err(e) => Err(e),
    }
}

fn base64_prefix(bytes: &[u8]) -> String {
    let b64 = BASE64_STANDARD.encode(&bytes[..bytes.len().min(6)]);
    b64.chars().take(8).collect()
}
