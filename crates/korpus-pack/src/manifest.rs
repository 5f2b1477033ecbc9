//! # Snapshot and Delta Manifests
//!
//! Typed manifest records and their validation. Manifests cross the trust
//! boundary as dynamic JSON (`serde_json::Value`): hashing and signing
//! operate on the loaded value, while the typed structs here are parsed
//! and validated from it before any domain logic runs. Hashing the loaded
//! value (not a struct round-trip) keeps `manifest_sha256` stable even if
//! a future manifest revision adds fields this version does not model.

use std::collections::BTreeMap;
use std::path::{Component, Path};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{PackError, PackResult};

/// One payload file in a manifest: POSIX-relative path, exact byte size,
/// lowercase hex SHA-256.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEntry {
    pub path: String,
    pub size: u64,
    pub sha256: String,
}

impl FileEntry {
    /// Validate the path and digest constraints a manifest entry must hold.
    pub fn validate(&self) -> PackResult<()> {
        validate_manifest_path(&self.path)?;
        if !is_valid_sha256(&self.sha256) {
            return Err(PackError::InvalidManifest(format!(
                "invalid sha256 for {}: {:?}",
                self.path, self.sha256
            )));
        }
        Ok(())
    }
}

/// A self-contained pack version: every payload file listed exactly once,
/// sorted by path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotManifest {
    pub format: String,
    pub pack_id: String,
    pub channel: String,
    pub version: String,
    pub created_at_utc: String,
    pub files: Vec<FileEntry>,
}

impl SnapshotManifest {
    /// Parse and validate a snapshot manifest from a loaded JSON value.
    ///
    /// Unknown fields are tolerated (they still participate in the
    /// manifest hash via the original value); known fields are checked.
    pub fn from_value(value: &Value) -> PackResult<Self> {
        let manifest: Self = serde_json::from_value(value.clone())
            .map_err(|e| PackError::InvalidManifest(format!("snapshot manifest: {e}")))?;
        if manifest.format != "snapshot" {
            return Err(PackError::InvalidManifest(format!(
                "expected format \"snapshot\", got {:?}",
                manifest.format
            )));
        }
        for entry in &manifest.files {
            entry.validate()?;
        }
        Ok(manifest)
    }

    /// Map of path → (sha256, size) for delta computation.
    pub fn files_map(&self) -> BTreeMap<&str, (&str, u64)> {
        self.files
            .iter()
            .map(|e| (e.path.as_str(), (e.sha256.as_str(), e.size)))
            .collect()
    }
}

/// The `from`/`to` endpoint of a delta manifest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestRef {
    pub pack_id: String,
    pub version: String,
    pub manifest_sha256: String,
}

/// Delta operations: files whose content or presence changed, and files
/// removed between the two snapshots.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeltaOps {
    pub add_or_replace: Vec<FileEntry>,
    pub delete: Vec<DeleteEntry>,
}

/// A path deleted by a delta.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteEntry {
    pub path: String,
}

/// A patch from one snapshot to another.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeltaManifest {
    pub format: String,
    pub channel: String,
    pub created_at_utc: String,
    pub from: ManifestRef,
    pub to: ManifestRef,
    pub ops: DeltaOps,
}

impl DeltaManifest {
    /// Parse and validate a delta manifest from a loaded JSON value.
    pub fn from_value(value: &Value) -> PackResult<Self> {
        let manifest: Self = serde_json::from_value(value.clone())
            .map_err(|e| PackError::InvalidManifest(format!("delta manifest: {e}")))?;
        if manifest.format != "delta" {
            return Err(PackError::InvalidManifest(format!(
                "expected format \"delta\", got {:?}",
                manifest.format
            )));
        }
        if !is_valid_sha256(&manifest.from.manifest_sha256) {
            return Err(PackError::InvalidManifest(
                "from.manifest_sha256 is not a sha256 hex digest".into(),
            ));
        }
        if !is_valid_sha256(&manifest.to.manifest_sha256) {
            return Err(PackError::InvalidManifest(
                "to.manifest_sha256 is not a sha256 hex digest".into(),
            ));
        }
        for entry in &manifest.ops.add_or_replace {
            entry.validate()?;
        }
        for entry in &manifest.ops.delete {
            validate_manifest_path(&entry.path)?;
        }
        Ok(manifest)
    }
}

/// Load a JSON file as a dynamic value (tolerant, non-canonical input).
pub fn load_json_value(path: &Path) -> PackResult<Value> {
    let text = std::fs::read_to_string(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => PackError::NotFound {
            path: path.to_path_buf(),
        },
        _ => PackError::Io(e),
    })?;
    Ok(serde_json::from_str(&text)?)
}

/// Check a 64-character lowercase hex SHA-256 digest string.
pub fn is_valid_sha256(digest: &str) -> bool {
    digest.len() == 64
        && digest
            .chars()
            .all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c))
}

/// Validate a manifest path: relative, forward-slash separated, no `..`,
/// no empty segments.
pub fn validate_manifest_path(path: &str) -> PackResult<()> {
    let invalid = |detail: &str| {
        Err(PackError::InvalidManifest(format!(
            "invalid manifest path {path:?}: {detail}"
        )))
    };
    if path.is_empty() {
        return invalid("empty");
    }
    if path.contains('\\') {
        return invalid("backslash separator");
    }
    let p = Path::new(path);
    for component in p.components() {
        match component {
            Component::Normal(_) => {}
            Component::ParentDir => return invalid("contains '..'"),
            Component::CurDir => return invalid("contains '.'"),
            Component::RootDir | Component::Prefix(_) => return invalid("absolute"),
        }
    }
    if path.starts_with('/') || path.ends_with('/') || path.contains("//") {
        return invalid("empty segment");
    }
    Ok(())
}

/// Strip the `payload/` prefix a snapshot manifest path carries; installed
/// packs store payload contents at the pack root.
pub fn pack_rel_from_manifest_path(path: &str) -> &str {
    path.strip_prefix("payload/").unwrap_or(path)
}
