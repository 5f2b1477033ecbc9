//! Update engine subcommands.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, Subcommand};

use korpus_update::{OfflineUpdater, RunOutcome};

use crate::load_public_key;

/// Offline update operations.
#[derive(Args, Debug)]
pub struct UpdateArgs {
    #[command(subcommand)]
    pub command: UpdateCommand,
}

#[derive(Subcommand, Debug)]
pub enum UpdateCommand {
    /// Check the channel and apply one update if available.
    RunOnce {
        data_dir: PathBuf,
        remote_dir: PathBuf,
        #[arg(long, default_value = "stable")]
        channel: String,
        #[arg(long)]
        pubkey: Option<String>,
        #[arg(long)]
        pubkey_file: Option<PathBuf>,
    },
    /// Restore invariants after a crash and return the machine to IDLE.
    Recover {
        data_dir: PathBuf,
        remote_dir: PathBuf,
        #[arg(long)]
        pubkey: Option<String>,
        #[arg(long)]
        pubkey_file: Option<PathBuf>,
    },
    /// Print the persisted update state.
    Status { data_dir: PathBuf },
}

pub fn run(args: &UpdateArgs) -> Result<()> {
    match &args.command {
        UpdateCommand::RunOnce {
            data_dir,
            remote_dir,
            channel,
            pubkey,
            pubkey_file,
        } => {
            let public_key = load_public_key(pubkey.as_deref(), pubkey_file.as_ref())?;
            let updater = OfflineUpdater::new(data_dir, remote_dir, public_key)?;
            match updater.run_once(channel)? {
                RunOutcome::UpToDate => println!("up to date"),
                RunOutcome::Applied(plan) => println!("applied {plan} update"),
            }
        }
        UpdateCommand::Recover {
            data_dir,
            remote_dir,
            pubkey,
            pubkey_file,
        } => {
            let public_key = load_public_key(pubkey.as_deref(), pubkey_file.as_ref())?;
            let updater = OfflineUpdater::new(data_dir, remote_dir, public_key)?;
            updater.recover_on_startup()?;
            println!("recovered, state is IDLE");
        }
        UpdateCommand::Status { data_dir } => {
            let state_path = data_dir.join("packs").join("state.json");
            let state = korpus_update::UpdateState::load(&state_path);
            println!("{}", serde_json::to_string_pretty(&state)?);
        }
    }
    Ok(())
}
