//! # korpus-crypto — Signing Primitives for the Korpus Platform
//!
//! Ed25519 signing and verification for pack manifests. The signing input
//! is always `&CanonicalBytes`; you cannot sign raw bytes, which rules
//! out any ambiguity about which serialization of a manifest was signed.
//!
//! Keys are raw 32-byte Ed25519 seeds and public keys, transported as
//! base64; signatures are raw 64 bytes, transported as base64 (with a
//! trailing newline in `.sig` files, written by `korpus-pack`).

pub mod ed25519;
pub mod error;

pub use ed25519::{
    sign_value, verify_value, Ed25519KeyPair, Ed25519PublicKey, Ed25519Signature,
};
pub use error::SignatureError;
