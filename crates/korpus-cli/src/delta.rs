//! Delta build / verify / apply subcommands.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, Subcommand};

use crate::{load_keypair, load_public_key};

/// Delta operations.
#[derive(Args, Debug)]
pub struct DeltaArgs {
    #[command(subcommand)]
    pub command: DeltaCommand,
}

#[derive(Subcommand, Debug)]
pub enum DeltaCommand {
    /// Diff two snapshots into a signed delta directory.
    Build {
        from_snapshot_dir: PathBuf,
        to_snapshot_dir: PathBuf,
        delta_dir: PathBuf,
        #[arg(long, default_value = "stable")]
        channel: String,
        #[arg(long)]
        key: Option<String>,
        #[arg(long)]
        key_file: Option<PathBuf>,
    },
    /// Verify signature and payload of a delta directory.
    Verify {
        delta_dir: PathBuf,
        #[arg(long)]
        pubkey: Option<String>,
        #[arg(long)]
        pubkey_file: Option<PathBuf>,
    },
    /// Apply a delta to the active pack of a data directory.
    Apply {
        delta_dir: PathBuf,
        data_dir: PathBuf,
        /// Target snapshot for strict post-apply verification.
        #[arg(long)]
        to_snapshot: Option<PathBuf>,
        #[arg(long)]
        pubkey: Option<String>,
        #[arg(long)]
        pubkey_file: Option<PathBuf>,
    },
}

pub fn run(args: &DeltaArgs) -> Result<()> {
    match &args.command {
        DeltaCommand::Build {
            from_snapshot_dir,
            to_snapshot_dir,
            delta_dir,
            channel,
            key,
            key_file,
        } => {
            let keypair = load_keypair(key.as_deref(), key_file.as_ref())?;
            korpus_pack::build_delta(from_snapshot_dir, to_snapshot_dir, delta_dir, &keypair, channel)?;
            println!("built delta at {}", delta_dir.display());
        }
        DeltaCommand::Verify {
            delta_dir,
            pubkey,
            pubkey_file,
        } => {
            let public_key = load_public_key(pubkey.as_deref(), pubkey_file.as_ref())?;
            let manifest = korpus_pack::verify_delta(delta_dir, &public_key)?;
            println!(
                "OK: {} -> {} (+{} -{})",
                manifest.from.version,
                manifest.to.version,
                manifest.ops.add_or_replace.len(),
                manifest.ops.delete.len()
            );
        }
        DeltaCommand::Apply {
            delta_dir,
            data_dir,
            to_snapshot,
            pubkey,
            pubkey_file,
        } => {
            let public_key = load_public_key(pubkey.as_deref(), pubkey_file.as_ref())?;
            let name =
                korpus_pack::apply_delta(delta_dir, data_dir, &public_key, to_snapshot.as_deref())?;
            println!("applied, active is now {name}");
        }
    }
    Ok(())
}
