//! # korpus-cli — Command Line Surface
//!
//! Subcommand argument types and handlers for the `korpus` binary. Exit
//! codes follow the pack contract: 0 on success, non-zero on any
//! integrity or I/O error, with the offending path or digest on stderr.

pub mod delta;
pub mod keygen;
pub mod snapshot;
pub mod update;

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use korpus_crypto::{Ed25519KeyPair, Ed25519PublicKey};

/// Load a signing key from an inline base64 seed or a file holding one.
pub fn load_keypair(inline: Option<&str>, file: Option<&PathBuf>) -> Result<Ed25519KeyPair> {
    match (inline, file) {
        (Some(b64), _) => Ok(Ed25519KeyPair::from_base64(b64)?),
        (None, Some(path)) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("cannot read key file {}", path.display()))?;
            Ok(Ed25519KeyPair::from_base64(text.trim())?)
        }
        (None, None) => bail!("provide --key <base64> or --key-file <path>"),
    }
}

/// Load a verification key from an inline base64 value or a file.
pub fn load_public_key(inline: Option<&str>, file: Option<&PathBuf>) -> Result<Ed25519PublicKey> {
    match (inline, file) {
        (Some(b64), _) => Ok(Ed25519PublicKey::from_base64(b64)?),
        (None, Some(path)) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("cannot read public key file {}", path.display()))?;
            Ok(Ed25519PublicKey::from_base64(text.trim())?)
        }
        (None, None) => bail!("provide --pubkey <base64> or --pubkey-file <path>"),
    }
}
