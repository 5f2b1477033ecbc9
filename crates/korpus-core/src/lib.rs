//! # korpus-core — Foundational Types for the Korpus Platform
//!
//! This crate is the bedrock of the Korpus workspace. It defines the
//! primitives every other crate builds on; it depends on nothing internal.
//!
//! ## Key Design Principles
//!
//! 1. **`CanonicalBytes` newtype.** ALL digest and signature computation
//!    flows through `CanonicalBytes::new()`. No raw `serde_json::to_vec()`
//!    for hashing. Ever. Two structurally equal values always produce
//!    byte-identical canonical output.
//!
//! 2. **UTC-only timestamps.** The `Timestamp` type enforces UTC with a
//!    `Z` suffix and seconds precision in its canonical string form.
//!
//! 3. **Atomic file writes.** Every on-disk record that survives a crash
//!    (`state.json`, the `ACTIVE` pointer, manifests) is written through
//!    the tmp-then-rename helpers in [`fsio`].
//!
//! ## Crate Policy
//!
//! - No dependencies on other `korpus-*` crates.
//! - No `unsafe` code.
//! - No `panic!()` or `.unwrap()` outside tests.

pub mod canonical;
pub mod digest;
pub mod error;
pub mod fsio;
pub mod temporal;

// Re-export primary types for ergonomic imports.
pub use canonical::{canonical_number, CanonicalBytes};
pub use digest::{manifest_sha256, sha256_digest, sha256_hex, ContentDigest};
pub use error::EncodingError;
pub use temporal::Timestamp;
