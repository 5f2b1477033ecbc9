//! # Hash Catalog
//!
//! File-content hashing and stable file listing for manifest
//! construction. Structured-data hashing lives in `korpus-core`; this is
//! the raw-byte-stream tier for payload files.

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};

use crate::error::{PackError, PackResult};
use crate::manifest::FileEntry;

/// Compute the lowercase hex SHA-256 of a file, reading in 1 MiB chunks.
pub fn file_sha256(path: &Path) -> PackResult<String> {
    let mut file = File::open(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => PackError::NotFound {
            path: path.to_path_buf(),
        },
        _ => PackError::Io(e),
    })?;
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; 1024 * 1024];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hasher
        .finalize()
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect())
}

/// Recursively list regular files under `root` in stable order, sorted by
/// their POSIX relative path. Returns absolute paths.
pub fn list_files(root: &Path) -> PackResult<Vec<PathBuf>> {
    let mut files: Vec<PathBuf> = korpus_core::fsio::walk(root)?
        .into_iter()
        .filter(|p| p.is_file())
        .collect();
    files.sort_by_key(|p| rel_posix(root, p));
    Ok(files)
}

/// Build a manifest file entry for `file_path`, with `path` relative to
/// `root` in POSIX form.
pub fn file_entry(root: &Path, file_path: &Path) -> PackResult<FileEntry> {
    let path = rel_posix(root, file_path);
    let size = std::fs::metadata(file_path)?.len();
    let sha256 = file_sha256(file_path)?;
    Ok(FileEntry { path, size, sha256 })
}

/// POSIX-form relative path of `path` under `root`.
pub fn rel_posix(root: &Path, path: &Path) -> String {
    let rel = path.strip_prefix(root).unwrap_or(path);
    rel.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}
