//! # korpus CLI Entry Point
//!
//! Assembles subcommands and dispatches to handler modules.

use clap::Parser;

/// Korpus offline knowledge platform toolchain.
///
/// Builds and signs content pack snapshots and deltas, verifies and
/// installs them, and runs the crash-safe offline updater.
#[derive(Parser, Debug)]
#[command(name = "korpus", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Generate an Ed25519 signing key pair.
    Keygen(korpus_cli::keygen::KeygenArgs),
    /// Snapshot build, verification, and installation.
    Snapshot(korpus_cli::snapshot::SnapshotArgs),
    /// Delta build, verification, and application.
    Delta(korpus_cli::delta::DeltaArgs),
    /// Offline update runs, recovery, and status.
    Update(korpus_cli::update::UpdateArgs),
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Keygen(args) => korpus_cli::keygen::run(&args),
        Commands::Snapshot(args) => korpus_cli::snapshot::run(&args),
        Commands::Delta(args) => korpus_cli::delta::run(&args),
        Commands::Update(args) => korpus_cli::update::run(&args),
    }
}
