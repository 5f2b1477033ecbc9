//! # Active Pointer
//!
//! `packs/ACTIVE` is a UTF-8 text file holding the name of exactly one
//! sibling install directory, followed by a single newline. Readers
//! resolve it on every access, never caching across update cycles, and
//! the switch protocol (write `ACTIVE.tmp`, rename over `ACTIVE`) makes
//! the pointer flip the atomic commit point of every install and update.
//! The previous value is preserved in `ACTIVE.prev` before each switch.

use std::fs;
use std::path::{Path, PathBuf};

use korpus_core::fsio;

use crate::error::{PackError, PackResult};

const ACTIVE: &str = "ACTIVE";
const ACTIVE_PREV: &str = "ACTIVE.prev";

/// Read the name of the currently active install.
pub fn read_active_name(packs_dir: &Path) -> PackResult<String> {
    let pointer = packs_dir.join(ACTIVE);
    let text = fs::read_to_string(&pointer).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => {
            PackError::ActiveState("no active pack; install a snapshot first".into())
        }
        _ => PackError::Io(e),
    })?;
    let name = text.trim();
    if name.is_empty() {
        return Err(PackError::ActiveState("ACTIVE pointer is empty".into()));
    }
    Ok(name.to_string())
}

/// Resolve the currently active install directory, checking it exists.
pub fn active_pack_dir(packs_dir: &Path) -> PackResult<PathBuf> {
    let name = read_active_name(packs_dir)?;
    let dir = packs_dir.join(&name);
    if !dir.is_dir() {
        return Err(PackError::ActiveState(format!(
            "ACTIVE points to missing install {name:?}"
        )));
    }
    Ok(dir)
}

/// Atomically switch the active pointer to `new_name`.
///
/// The previous pointer value (if any) is written to `ACTIVE.prev` first;
/// the switch itself is a tmp-write plus same-directory rename.
pub fn set_active_name(packs_dir: &Path, new_name: &str) -> PackResult<()> {
    let pointer = packs_dir.join(ACTIVE);
    if let Ok(previous) = fs::read_to_string(&pointer) {
        fsio::atomic_write_text(&packs_dir.join(ACTIVE_PREV), &previous)?;
    }
    fsio::atomic_write_text(&pointer, &format!("{new_name}\n"))?;
    Ok(())
}
