//! # Atomic Filesystem Primitives
//!
//! Tmp-then-rename writes and recursive tree copies used by the pack
//! lifecycle. A same-filesystem rename is the single atomic commit
//! primitive the whole update engine relies on: readers observe either
//! the old contents or the new, never a partial write.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::canonical::CanonicalBytes;
use crate::error::EncodingError;

/// Write `bytes` to `path` atomically: write `<path>.tmp`, then rename
/// over `path`. Parent directories are created as needed.
pub fn atomic_write(path: &Path, bytes: &[u8]) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let tmp = tmp_sibling(path);
    fs::write(&tmp, bytes)?;
    fs::rename(&tmp, path)?;
    Ok(())
}

/// Write a UTF-8 string atomically.
pub fn atomic_write_text(path: &Path, text: &str) -> io::Result<()> {
    atomic_write(path, text.as_bytes())
}

/// Canonicalize `value` and write its canonical bytes atomically.
///
/// Used for every persisted JSON record that participates in hashing or
/// crash recovery (`state.json`, manifests).
pub fn atomic_write_canonical_json(
    path: &Path,
    value: &impl Serialize,
) -> Result<(), CanonicalWriteError> {
    let canonical = CanonicalBytes::new(value)?;
    atomic_write(path, canonical.as_bytes())?;
    Ok(())
}

/// Failure of a canonical JSON write: either the value had no canonical
/// form or the filesystem rejected the write.
#[derive(Debug, thiserror::Error)]
pub enum CanonicalWriteError {
    #[error(transparent)]
    Encoding(#[from] EncodingError),
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Recursively copy every file and directory under `src` into `dst`,
/// preserving relative paths.
pub fn copy_tree(src: &Path, dst: &Path) -> io::Result<()> {
    fs::create_dir_all(dst)?;
    for entry in walk(src)? {
        let rel = entry
            .strip_prefix(src)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        let out = dst.join(rel);
        if entry.is_dir() {
            fs::create_dir_all(&out)?;
        } else {
            if let Some(parent) = out.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::copy(&entry, &out)?;
        }
    }
    Ok(())
}

/// Copy a single file, creating parent directories of the destination.
pub fn copy_file_with_parents(src: &Path, dst: &Path) -> io::Result<()> {
    if let Some(parent) = dst.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::copy(src, dst)?;
    Ok(())
}

/// Depth-first listing of everything under `root` (directories and files,
/// root excluded), in deterministic sorted order.
pub fn walk(root: &Path) -> io::Result<Vec<PathBuf>> {
    let mut out = Vec::new();
    let mut stack = vec![root.to_path_buf()];
    while let Some(dir) = stack.pop() {
        let mut entries: Vec<PathBuf> = fs::read_dir(&dir)?
            .map(|e| e.map(|e| e.path()))
            .collect::<io::Result<_>>()?;
        entries.sort();
        for entry in entries {
            if entry.is_dir() {
                stack.push(entry.clone());
            }
            out.push(entry);
        }
    }
    out.sort();
    Ok(out)
}

/// Remove a directory tree if it exists; errors are reported, absence is not.
pub fn remove_dir_all_if_exists(path: &Path) -> io::Result<()> {
    match fs::remove_dir_all(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}

fn tmp_sibling(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}
