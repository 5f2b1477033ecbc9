//! # Snapshot Build, Verification, and Installation
//!
//! A snapshot directory holds `payload/…`, `manifest.json` (canonical
//! bytes), and `manifest.sig` (base64 Ed25519 over those bytes plus a
//! trailing newline). Verification checks the signature first, then every
//! listed file's existence, size, and SHA-256.

use std::fs;
use std::path::Path;

use korpus_core::{fsio, CanonicalBytes, Timestamp};
use korpus_crypto::{Ed25519KeyPair, Ed25519PublicKey, Ed25519Signature};
use tracing::info;

use crate::active;
use crate::catalog;
use crate::error::{PackError, PackResult};
use crate::manifest::{load_json_value, pack_rel_from_manifest_path, SnapshotManifest};

pub const MANIFEST_JSON: &str = "manifest.json";
pub const MANIFEST_SIG: &str = "manifest.sig";
pub const PAYLOAD_DIR: &str = "payload";

/// Build `manifest.json` and `manifest.sig` for the payload tree under
/// `snapshot_dir/payload/`.
///
/// File entries are sorted by path; the manifest is written in canonical
/// bytes so its SHA-256 is reproducible from the file alone.
pub fn build_snapshot(
    snapshot_dir: &Path,
    pack_id: &str,
    channel: &str,
    version: &str,
    keypair: &Ed25519KeyPair,
) -> PackResult<()> {
    let payload_dir = snapshot_dir.join(PAYLOAD_DIR);
    if !payload_dir.is_dir() {
        return Err(PackError::NotFound { path: payload_dir });
    }

    let mut files = Vec::new();
    for file in catalog::list_files(&payload_dir)? {
        files.push(catalog::file_entry(snapshot_dir, &file)?);
    }

    let manifest = SnapshotManifest {
        format: "snapshot".into(),
        pack_id: pack_id.into(),
        channel: channel.into(),
        version: version.into(),
        created_at_utc: Timestamp::now().to_canonical_string(),
        files,
    };

    write_signed_manifest(snapshot_dir, MANIFEST_JSON, MANIFEST_SIG, &manifest, keypair)?;
    info!(pack_id, version, "built snapshot manifest");
    Ok(())
}

/// Write a canonical manifest and its detached base64 signature file.
pub(crate) fn write_signed_manifest(
    dir: &Path,
    manifest_name: &str,
    sig_name: &str,
    manifest: &impl serde::Serialize,
    keypair: &Ed25519KeyPair,
) -> PackResult<()> {
    let canonical = CanonicalBytes::new(manifest)?;
    fsio::atomic_write(&dir.join(manifest_name), canonical.as_bytes())?;
    let signature = keypair.sign(&canonical);
    fsio::atomic_write_text(&dir.join(sig_name), &format!("{}\n", signature.to_base64()))?;
    Ok(())
}

/// Read a detached base64 signature file.
pub(crate) fn read_signature(path: &Path) -> PackResult<Ed25519Signature> {
    let text = fs::read_to_string(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => PackError::NotFound {
            path: path.to_path_buf(),
        },
        _ => PackError::Io(e),
    })?;
    Ok(Ed25519Signature::from_base64(text.trim())?)
}

/// Verify a snapshot directory: Ed25519 signature over the manifest's
/// canonical bytes, then existence, size, and SHA-256 of every listed
/// file. Returns the parsed manifest on success.
pub fn verify_snapshot(
    snapshot_dir: &Path,
    public_key: &Ed25519PublicKey,
) -> PackResult<SnapshotManifest> {
    let manifest_value = load_json_value(&snapshot_dir.join(MANIFEST_JSON))?;
    let signature = read_signature(&snapshot_dir.join(MANIFEST_SIG))?;

    if !korpus_crypto::verify_value(public_key, &manifest_value, &signature)? {
        return Err(PackError::Signature {
            artifact: snapshot_dir.join(MANIFEST_JSON).display().to_string(),
        });
    }

    let manifest = SnapshotManifest::from_value(&manifest_value)?;
    for entry in &manifest.files {
        verify_file_entry(snapshot_dir, &entry.path, entry.size, &entry.sha256)?;
    }
    Ok(manifest)
}

/// Check one manifest entry against the file on disk under `root/rel`.
pub(crate) fn verify_file_entry(
    root: &Path,
    rel: &str,
    size: u64,
    sha256: &str,
) -> PackResult<()> {
    let path = root.join(rel);
    if !path.is_file() {
        return Err(PackError::Integrity {
            path: rel.into(),
            detail: "missing file".into(),
        });
    }
    let actual_size = fs::metadata(&path)?.len();
    if actual_size != size {
        return Err(PackError::Integrity {
            path: rel.into(),
            detail: format!("size mismatch: expected={size}, got={actual_size}"),
        });
    }
    let actual_sha = catalog::file_sha256(&path)?;
    if actual_sha != sha256 {
        return Err(PackError::Integrity {
            path: rel.into(),
            detail: format!("sha256 mismatch: expected={sha256}, got={actual_sha}"),
        });
    }
    Ok(())
}

/// Verify then install a snapshot into `data_dir`.
///
/// Creates `packs/staging_<ts>/`, copies the payload to the install root
/// (no `payload/` prefix) plus the manifest pair, then atomically flips
/// `ACTIVE`. Returns the new install name.
pub fn install_snapshot(
    snapshot_dir: &Path,
    data_dir: &Path,
    public_key: &Ed25519PublicKey,
) -> PackResult<String> {
    let manifest = verify_snapshot(snapshot_dir, public_key)?;

    let payload_dir = snapshot_dir.join(PAYLOAD_DIR);
    if !payload_dir.is_dir() {
        return Err(PackError::NotFound { path: payload_dir });
    }

    let packs_dir = data_dir.join("packs");
    fs::create_dir_all(&packs_dir)?;

    let staging_name = format!("staging_{}", Timestamp::now().to_compact_string());
    let staging_dir = packs_dir.join(&staging_name);
    fs::create_dir(&staging_dir)?;

    for entry in &manifest.files {
        let src = snapshot_dir.join(&entry.path);
        let dst = staging_dir.join(pack_rel_from_manifest_path(&entry.path));
        fsio::copy_file_with_parents(&src, &dst)?;
    }
    fsio::copy_file_with_parents(
        &snapshot_dir.join(MANIFEST_JSON),
        &staging_dir.join(MANIFEST_JSON),
    )?;
    fsio::copy_file_with_parents(
        &snapshot_dir.join(MANIFEST_SIG),
        &staging_dir.join(MANIFEST_SIG),
    )?;

    active::set_active_name(&packs_dir, &staging_name)?;
    info!(install = %staging_name, version = %manifest.version, "installed snapshot");
    Ok(staging_name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use korpus_core::manifest_sha256;

    fn make_snapshot(dir: &Path) -> Ed25519KeyPair {
        fs::create_dir_all(dir.join("payload/sub")).unwrap();
        fs::write(dir.join("payload/a.txt"), b"hello v1\n").unwrap();
        fs::write(dir.join("payload/sub/b.bin"), [0xff, 0x01]).unwrap();
        let kp = Ed25519KeyPair::generate();
        build_snapshot(dir, "demo", "stable", "1.0.0", &kp).unwrap();
        kp
    }

    #[test]
    fn build_emits_sorted_canonical_manifest() {
        let dir = tempfile::tempdir().unwrap();
        let _kp = make_snapshot(dir.path());

        let value = load_json_value(&dir.path().join(MANIFEST_JSON)).unwrap();
        let manifest = SnapshotManifest::from_value(&value).unwrap();
        let paths: Vec<&str> = manifest.files.iter().map(|f| f.path.as_str()).collect();
        assert_eq!(paths, vec!["payload/a.txt", "payload/sub/b.bin"]);

        // File bytes are the canonical form: re-canonicalizing is identity.
        let raw = fs::read(dir.path().join(MANIFEST_JSON)).unwrap();
        let recanonical = CanonicalBytes::new(&value).unwrap();
        assert_eq!(raw, recanonical.as_bytes());
        assert_eq!(manifest_sha256(&value).unwrap().len(), 64);
    }

    #[test]
    fn verify_accepts_fresh_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let kp = make_snapshot(dir.path());
        verify_snapshot(dir.path(), &kp.public_key()).unwrap();
    }

    #[test]
    fn verify_rejects_wrong_key() {
        let dir = tempfile::tempdir().unwrap();
        let _kp = make_snapshot(dir.path());
        let other = Ed25519KeyPair::generate();
        assert!(matches!(
            verify_snapshot(dir.path(), &other.public_key()),
            Err(PackError::Signature { .. })
        ));
    }

    #[test]
    fn verify_names_tampered_file() {
        let dir = tempfile::tempdir().unwrap();
        let kp = make_snapshot(dir.path());
        fs::write(dir.path().join("payload/a.txt"), b"hello v2\n").unwrap();
        match verify_snapshot(dir.path(), &kp.public_key()) {
            Err(PackError::Integrity { path, .. }) => assert_eq!(path, "payload/a.txt"),
            other => panic!("expected Integrity error, got {other:?}"),
        }
    }

    #[test]
    fn verify_names_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let kp = make_snapshot(dir.path());
        fs::remove_file(dir.path().join("payload/sub/b.bin")).unwrap();
        match verify_snapshot(dir.path(), &kp.public_key()) {
            Err(PackError::Integrity { path, detail }) => {
                assert_eq!(path, "payload/sub/b.bin");
                assert!(detail.contains("missing"));
            }
            other => panic!("expected Integrity error, got {other:?}"),
        }
    }

    #[test]
    fn install_lays_out_payload_at_root_and_flips_active() {
        let snapshot = tempfile::tempdir().unwrap();
        let data = tempfile::tempdir().unwrap();
        let kp = make_snapshot(snapshot.path());

        let name = install_snapshot(snapshot.path(), data.path(), &kp.public_key()).unwrap();
        let packs = data.path().join("packs");
        assert_eq!(active::read_active_name(&packs).unwrap(), name);

        let install = packs.join(&name);
        assert_eq!(
            fs::read_to_string(install.join("a.txt")).unwrap(),
            "hello v1\n"
        );
        assert_eq!(fs::read(install.join("sub/b.bin")).unwrap(), [0xff, 0x01]);
        assert!(install.join(MANIFEST_JSON).is_file());
        assert!(install.join(MANIFEST_SIG).is_file());
    }
}
