//! Update engine error types and the hard/retryable failure taxonomy.

use std::path::PathBuf;

use korpus_pack::PackError;
use thiserror::Error;

/// Errors surfaced by the update engine.
#[derive(Debug, Error)]
pub enum UpdateError {
    /// The per-data-directory update lock is already held.
    #[error("updater lock already held")]
    Busy,

    /// Persisted or on-disk state is not what the machine expects
    /// (missing active pointer, unreadable state record).
    #[error("state error: {0}")]
    State(String),

    /// A remote artifact named by the channel manifest is absent.
    #[error("remote artifact missing: {path}")]
    MissingRemote { path: PathBuf },

    /// The downloaded artifact does not match the channel manifest's
    /// expected digest.
    #[error("artifact does not match expected manifest sha256: expected={expected}, got={got}")]
    ManifestShaMismatch { expected: String, got: String },

    /// Injected crash from the fault-injection test hook.
    #[error("injected crash mid-copy ({0})")]
    InjectedCrash(&'static str),

    /// Delegated pack operation failure (signature, integrity, manifest).
    #[error(transparent)]
    Pack(#[from] PackError),

    /// I/O error outside pack operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl UpdateError {
    /// Failure taxonomy: integrity-class failures are hard (the artifact
    /// itself is wrong and retrying cannot help); everything else is
    /// retryable (I/O, partial copies, absent remotes, injected crashes).
    pub fn is_hard(&self) -> bool {
        match self {
            UpdateError::Pack(e) => !matches!(e, PackError::Io(_)),
            UpdateError::ManifestShaMismatch { .. } | UpdateError::State(_) => true,
            UpdateError::Busy
            | UpdateError::MissingRemote { .. }
            | UpdateError::InjectedCrash(_)
            | UpdateError::Io(_) => false,
        }
    }
}

/// Result type alias for update operations.
pub type UpdateResult<T> = Result<T, UpdateError>;
