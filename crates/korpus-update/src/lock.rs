//! # Single-Writer Lock
//!
//! An exclusive-create lock file gates one update operation per data
//! directory. This is the only cross-process coordination primitive in
//! the platform.

use std::fs::OpenOptions;
use std::path::PathBuf;

use tracing::warn;

use crate::error::{UpdateError, UpdateResult};

/// RAII guard for the updater lock file. The file is removed on drop.
#[derive(Debug)]
pub struct UpdateLock {
    path: PathBuf,
}

impl UpdateLock {
    /// Acquire the lock by exclusive creation. Fails fast with
    /// [`UpdateError::Busy`] if another updater holds it.
    pub fn acquire(path: PathBuf) -> UpdateResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(_) => Ok(Self { path }),
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => Err(UpdateError::Busy),
            Err(e) => Err(UpdateError::Io(e)),
        }
    }
}

impl Drop for UpdateLock {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!(path = %self.path.display(), error = %e, "failed to release updater lock");
            }
        }
    }
}
