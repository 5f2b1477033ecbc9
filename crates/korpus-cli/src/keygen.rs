//! Ed25519 key pair generation.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use korpus_crypto::Ed25519KeyPair;

/// Generate a signing key pair (base64).
#[derive(Args, Debug)]
pub struct KeygenArgs {
    /// Write the private seed here (0600 would be wise); stdout if omitted.
    #[arg(long)]
    pub key_out: Option<PathBuf>,
    /// Write the public key here; stdout if omitted.
    #[arg(long)]
    pub pubkey_out: Option<PathBuf>,
}

pub fn run(args: &KeygenArgs) -> Result<()> {
    let keypair = Ed25519KeyPair::generate();
    let seed = keypair.seed_base64();
    let public = keypair.public_key().to_base64();

    match &args.key_out {
        Some(path) => std::fs::write(path, format!("{seed}\n"))
            .with_context(|| format!("cannot write {}", path.display()))?,
        None => println!("private_key_b64: {seed}"),
    }
    match &args.pubkey_out {
        Some(path) => std::fs::write(path, format!("{public}\n"))
            .with_context(|| format!("cannot write {}", path.display()))?,
        None => println!("public_key_b64: {public}"),
    }
    Ok(())
}
