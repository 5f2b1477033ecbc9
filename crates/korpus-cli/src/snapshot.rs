//! Snapshot build / verify / install subcommands.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, Subcommand};

use crate::{load_keypair, load_public_key};

/// Snapshot operations.
#[derive(Args, Debug)]
pub struct SnapshotArgs {
    #[command(subcommand)]
    pub command: SnapshotCommand,
}

#[derive(Subcommand, Debug)]
pub enum SnapshotCommand {
    /// Build manifest.json and manifest.sig for a payload tree.
    Build {
        /// Snapshot directory containing payload/.
        snapshot_dir: PathBuf,
        pack_id: String,
        version: String,
        #[arg(long, default_value = "stable")]
        channel: String,
        /// Base64 Ed25519 private seed.
        #[arg(long)]
        key: Option<String>,
        #[arg(long)]
        key_file: Option<PathBuf>,
    },
    /// Verify signature and content of a snapshot directory.
    Verify {
        snapshot_dir: PathBuf,
        #[arg(long)]
        pubkey: Option<String>,
        #[arg(long)]
        pubkey_file: Option<PathBuf>,
    },
    /// Verify then install a snapshot into a data directory.
    Install {
        snapshot_dir: PathBuf,
        data_dir: PathBuf,
        #[arg(long)]
        pubkey: Option<String>,
        #[arg(long)]
        pubkey_file: Option<PathBuf>,
    },
}

pub fn run(args: &SnapshotArgs) -> Result<()> {
    match &args.command {
        SnapshotCommand::Build {
            snapshot_dir,
            pack_id,
            version,
            channel,
            key,
            key_file,
        } => {
            let keypair = load_keypair(key.as_deref(), key_file.as_ref())?;
            korpus_pack::build_snapshot(snapshot_dir, pack_id, channel, version, &keypair)?;
            println!("built snapshot {pack_id} {version} at {}", snapshot_dir.display());
        }
        SnapshotCommand::Verify {
            snapshot_dir,
            pubkey,
            pubkey_file,
        } => {
            let public_key = load_public_key(pubkey.as_deref(), pubkey_file.as_ref())?;
            let manifest = korpus_pack::verify_snapshot(snapshot_dir, &public_key)?;
            println!(
                "OK: {} {} ({} files)",
                manifest.pack_id,
                manifest.version,
                manifest.files.len()
            );
        }
        SnapshotCommand::Install {
            snapshot_dir,
            data_dir,
            pubkey,
            pubkey_file,
        } => {
            let public_key = load_public_key(pubkey.as_deref(), pubkey_file.as_ref())?;
            let name = korpus_pack::install_snapshot(snapshot_dir, data_dir, &public_key)?;
            println!("installed as {name}");
        }
    }
    Ok(())
}
