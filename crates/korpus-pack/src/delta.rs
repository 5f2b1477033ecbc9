//! # Delta Build, Verification, and Application
//!
//! A delta carries every file whose content or presence differs between
//! two snapshots (`add_or_replace`, copied verbatim at their manifest
//! paths) and every removed path (`delete`), plus a signed
//! `delta_manifest.json` binding the patch to its endpoints by the
//! SHA-256 of each snapshot manifest's canonical bytes.
//!
//! Application stages a full copy of the active pack, patches the staged
//! tree, optionally verifies it byte-for-byte against the target
//! snapshot, and only then flips `ACTIVE`.

use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

use korpus_core::{fsio, manifest_sha256, Timestamp};
use korpus_crypto::{Ed25519KeyPair, Ed25519PublicKey};
use tracing::info;

use crate::active;
use crate::error::{PackError, PackResult};
use crate::manifest::{
    load_json_value, pack_rel_from_manifest_path, DeleteEntry, DeltaManifest, DeltaOps, FileEntry,
    ManifestRef, SnapshotManifest,
};
use crate::snapshot::{
    read_signature, verify_file_entry, verify_snapshot, write_signed_manifest, MANIFEST_JSON,
    MANIFEST_SIG,
};

pub const DELTA_MANIFEST_JSON: &str = "delta_manifest.json";
pub const DELTA_MANIFEST_SIG: &str = "delta_manifest.sig";

/// Build a delta directory patching `from_snapshot_dir` into
/// `to_snapshot_dir`.
///
/// For each path in the target manifest that is new or whose sha256
/// differs, the file is copied from the target snapshot into the delta
/// directory at its manifest path and listed in `add_or_replace`; each
/// source path absent from the target is listed in `delete`.
pub fn build_delta(
    from_snapshot_dir: &Path,
    to_snapshot_dir: &Path,
    delta_dir: &Path,
    keypair: &Ed25519KeyPair,
    channel: &str,
) -> PackResult<()> {
    let from_value = load_json_value(&from_snapshot_dir.join(MANIFEST_JSON))?;
    let to_value = load_json_value(&to_snapshot_dir.join(MANIFEST_JSON))?;

    let from_sha = manifest_sha256(&from_value)?;
    let to_sha = manifest_sha256(&to_value)?;

    let from_manifest = SnapshotManifest::from_value(&from_value)?;
    let to_manifest = SnapshotManifest::from_value(&to_value)?;
    let from_map = from_manifest.files_map();
    let to_map = to_manifest.files_map();

    let mut add_or_replace = Vec::new();
    for (path, (sha256, size)) in &to_map {
        let changed = match from_map.get(path) {
            Some((from_sha256, _)) => from_sha256 != sha256,
            None => true,
        };
        if changed {
            add_or_replace.push(FileEntry {
                path: (*path).to_string(),
                size: *size,
                sha256: (*sha256).to_string(),
            });
        }
    }

    let mut delete = Vec::new();
    for path in from_map.keys() {
        if !to_map.contains_key(path) {
            delete.push(DeleteEntry {
                path: (*path).to_string(),
            });
        }
    }

    for entry in &add_or_replace {
        fsio::copy_file_with_parents(
            &to_snapshot_dir.join(&entry.path),
            &delta_dir.join(&entry.path),
        )?;
    }

    let delta_manifest = DeltaManifest {
        format: "delta".into(),
        channel: channel.into(),
        created_at_utc: Timestamp::now().to_canonical_string(),
        from: ManifestRef {
            pack_id: from_manifest.pack_id,
            version: from_manifest.version,
            manifest_sha256: from_sha,
        },
        to: ManifestRef {
            pack_id: to_manifest.pack_id,
            version: to_manifest.version,
            manifest_sha256: to_sha,
        },
        ops: DeltaOps {
            add_or_replace,
            delete,
        },
    };

    write_signed_manifest(
        delta_dir,
        DELTA_MANIFEST_JSON,
        DELTA_MANIFEST_SIG,
        &delta_manifest,
        keypair,
    )?;
    info!(
        from = %delta_manifest.from.version,
        to = %delta_manifest.to.version,
        adds = delta_manifest.ops.add_or_replace.len(),
        deletes = delta_manifest.ops.delete.len(),
        "built delta"
    );
    Ok(())
}

/// Verify a delta directory: signature over the delta manifest, then
/// existence, size, and SHA-256 of every `add_or_replace` payload file.
/// Returns the parsed manifest on success.
pub fn verify_delta(delta_dir: &Path, public_key: &Ed25519PublicKey) -> PackResult<DeltaManifest> {
    let manifest_value = load_json_value(&delta_dir.join(DELTA_MANIFEST_JSON))?;
    let signature = read_signature(&delta_dir.join(DELTA_MANIFEST_SIG))?;

    if !korpus_crypto::verify_value(public_key, &manifest_value, &signature)? {
        return Err(PackError::Signature {
            artifact: delta_dir.join(DELTA_MANIFEST_JSON).display().to_string(),
        });
    }

    let manifest = DeltaManifest::from_value(&manifest_value)?;
    for entry in &manifest.ops.add_or_replace {
        verify_file_entry(delta_dir, &entry.path, entry.size, &entry.sha256)?;
    }
    Ok(manifest)
}

/// Payload file set of an installed pack (everything except the manifest
/// pair), as POSIX relative paths.
pub fn list_pack_payload_files(pack_root: &Path) -> PackResult<BTreeSet<String>> {
    let mut out = BTreeSet::new();
    for file in crate::catalog::list_files(pack_root)? {
        let rel = crate::catalog::rel_posix(pack_root, &file);
        if rel == MANIFEST_JSON || rel == MANIFEST_SIG {
            continue;
        }
        out.insert(rel);
    }
    Ok(out)
}

/// Verify, stage, and apply a delta to the active pack of `data_dir`,
/// then atomically switch `ACTIVE`. Returns the new install name.
///
/// When `to_snapshot_dir` is provided, the staged tree is verified
/// against the target snapshot before the switch: file-set equality,
/// per-file size and SHA-256, and the delta's `to.manifest_sha256`
/// binding; the target's manifest pair is installed into the new pack.
pub fn apply_delta(
    delta_dir: &Path,
    data_dir: &Path,
    public_key: &Ed25519PublicKey,
    to_snapshot_dir: Option<&Path>,
) -> PackResult<String> {
    let delta_manifest = verify_delta(delta_dir, public_key)?;

    let packs_dir = data_dir.join("packs");
    let active_pack = active::active_pack_dir(&packs_dir)?;

    // The active install must be the delta's `from` endpoint.
    let active_value = load_json_value(&active_pack.join(MANIFEST_JSON))?;
    let active_sha = manifest_sha256(&active_value)?;
    if active_sha != delta_manifest.from.manifest_sha256 {
        return Err(PackError::Integrity {
            path: active_pack.join(MANIFEST_JSON).display().to_string(),
            detail: format!(
                "active pack does not match delta 'from' manifest: active={active_sha}, expected={}",
                delta_manifest.from.manifest_sha256
            ),
        });
    }

    let staging_name = format!("staging_{}", Timestamp::now().to_compact_string());
    let staging_dir = packs_dir.join(&staging_name);
    fs::create_dir(&staging_dir)?;

    fsio::copy_tree(&active_pack, &staging_dir)?;
    apply_ops_to_staging(delta_dir, &staging_dir, &delta_manifest)?;

    if let Some(to_dir) = to_snapshot_dir {
        verify_staging_against_target(&staging_dir, to_dir, &delta_manifest, public_key)?;
        fsio::copy_file_with_parents(
            &to_dir.join(MANIFEST_JSON),
            &staging_dir.join(MANIFEST_JSON),
        )?;
        fsio::copy_file_with_parents(&to_dir.join(MANIFEST_SIG), &staging_dir.join(MANIFEST_SIG))?;
    }

    active::set_active_name(&packs_dir, &staging_name)?;
    info!(install = %staging_name, to = %delta_manifest.to.version, "applied delta");
    Ok(staging_name)
}

/// Apply delete then add_or_replace operations to a staged pack tree.
/// Deletes of already-absent paths are silently ignored.
pub fn apply_ops_to_staging(
    delta_dir: &Path,
    staging_dir: &Path,
    manifest: &DeltaManifest,
) -> PackResult<()> {
    for entry in &manifest.ops.delete {
        let target = staging_dir.join(pack_rel_from_manifest_path(&entry.path));
        match fs::remove_file(&target) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(PackError::Io(e)),
        }
    }
    for entry in &manifest.ops.add_or_replace {
        let src = delta_dir.join(&entry.path);
        let dst = staging_dir.join(pack_rel_from_manifest_path(&entry.path));
        fsio::copy_file_with_parents(&src, &dst)?;
    }
    Ok(())
}

/// Full post-condition verification of a staged tree against the target
/// snapshot: the snapshot itself verifies, its manifest sha matches the
/// delta's `to` binding, and the staged payload file set, sizes, and
/// hashes equal the target's.
pub fn verify_staging_against_target(
    staging_dir: &Path,
    to_snapshot_dir: &Path,
    delta_manifest: &DeltaManifest,
    public_key: &Ed25519PublicKey,
) -> PackResult<()> {
    verify_snapshot(to_snapshot_dir, public_key)?;
    let to_value = load_json_value(&to_snapshot_dir.join(MANIFEST_JSON))?;
    let to_sha = manifest_sha256(&to_value)?;
    if to_sha != delta_manifest.to.manifest_sha256 {
        return Err(PackError::Integrity {
            path: to_snapshot_dir.join(MANIFEST_JSON).display().to_string(),
            detail: "target snapshot does not match delta 'to' manifest".into(),
        });
    }

    let to_manifest = SnapshotManifest::from_value(&to_value)?;
    let expected: BTreeSet<String> = to_manifest
        .files
        .iter()
        .map(|e| pack_rel_from_manifest_path(&e.path).to_string())
        .collect();
    let got = list_pack_payload_files(staging_dir)?;
    if got != expected {
        let extra: Vec<_> = got.difference(&expected).cloned().collect();
        let missing: Vec<_> = expected.difference(&got).cloned().collect();
        return Err(PackError::Integrity {
            path: staging_dir.display().to_string(),
            detail: format!("payload file set mismatch: extra={extra:?}, missing={missing:?}"),
        });
    }

    for entry in &to_manifest.files {
        verify_file_entry(
            staging_dir,
            pack_rel_from_manifest_path(&entry.path),
            entry.size,
            &entry.sha256,
        )?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::{build_snapshot, install_snapshot};

    fn write_snapshot(dir: &Path, files: &[(&str, &[u8])], version: &str, kp: &Ed25519KeyPair) {
        for (rel, content) in files {
            let p = dir.join("payload").join(rel);
            fs::create_dir_all(p.parent().unwrap()).unwrap();
            fs::write(&p, content).unwrap();
        }
        build_snapshot(dir, "demo", "stable", version, kp).unwrap();
    }

    #[test]
    fn delta_ops_cover_changed_new_and_deleted() {
        let root = tempfile::tempdir().unwrap();
        let kp = Ed25519KeyPair::generate();
        let a = root.path().join("a");
        let b = root.path().join("b");
        let d = root.path().join("d");
        fs::create_dir_all(&a).unwrap();
        fs::create_dir_all(&b).unwrap();
        write_snapshot(&a, &[("a.txt", b"v1"), ("old.txt", b"x")], "1.0.0", &kp);
        write_snapshot(&b, &[("a.txt", b"v2"), ("new.txt", b"y")], "1.1.0", &kp);

        build_delta(&a, &b, &d, &kp, "stable").unwrap();
        let manifest = verify_delta(&d, &kp.public_key()).unwrap();

        let mut adds: Vec<&str> = manifest
            .ops
            .add_or_replace
            .iter()
            .map(|e| e.path.as_str())
            .collect();
        adds.sort();
        assert_eq!(adds, vec!["payload/a.txt", "payload/new.txt"]);
        let deletes: Vec<&str> = manifest.ops.delete.iter().map(|e| e.path.as_str()).collect();
        assert_eq!(deletes, vec!["payload/old.txt"]);

        // Changed files are present in the delta dir at their manifest path.
        assert_eq!(fs::read(d.join("payload/a.txt")).unwrap(), b"v2");
        assert_eq!(fs::read(d.join("payload/new.txt")).unwrap(), b"y");
    }

    #[test]
    fn verify_delta_rejects_tampered_payload() {
        let root = tempfile::tempdir().unwrap();
        let kp = Ed25519KeyPair::generate();
        let a = root.path().join("a");
        let b = root.path().join("b");
        let d = root.path().join("d");
        fs::create_dir_all(&a).unwrap();
        fs::create_dir_all(&b).unwrap();
        write_snapshot(&a, &[("a.txt", b"v1")], "1.0.0", &kp);
        write_snapshot(&b, &[("a.txt", b"v2")], "1.1.0", &kp);
        build_delta(&a, &b, &d, &kp, "stable").unwrap();

        fs::write(d.join("payload/a.txt"), b"evil").unwrap();
        assert!(matches!(
            verify_delta(&d, &kp.public_key()),
            Err(PackError::Integrity { .. })
        ));
    }

    #[test]
    fn apply_from_a_equals_installing_b_directly() {
        let root = tempfile::tempdir().unwrap();
        let kp = Ed25519KeyPair::generate();
        let a = root.path().join("a");
        let b = root.path().join("b");
        let d = root.path().join("d");
        let data = root.path().join("data");
        fs::create_dir_all(&a).unwrap();
        fs::create_dir_all(&b).unwrap();
        write_snapshot(&a, &[("a.txt", b"v1"), ("old.txt", b"x")], "1.0.0", &kp);
        write_snapshot(&b, &[("a.txt", b"v2"), ("new.txt", b"y")], "1.1.0", &kp);
        build_delta(&a, &b, &d, &kp, "stable").unwrap();

        install_snapshot(&a, &data, &kp.public_key()).unwrap();
        let name = apply_delta(&d, &data, &kp.public_key(), Some(&b)).unwrap();

        let packs = data.join("packs");
        assert_eq!(active::read_active_name(&packs).unwrap(), name);
        let install = packs.join(&name);
        let files = list_pack_payload_files(&install).unwrap();
        let expected: BTreeSet<String> = ["a.txt", "new.txt"].iter().map(|s| s.to_string()).collect();
        assert_eq!(files, expected);
        assert_eq!(fs::read(install.join("a.txt")).unwrap(), b"v2");
        assert_eq!(fs::read(install.join("new.txt")).unwrap(), b"y");
    }

    #[test]
    fn apply_rejects_mismatched_from_pack() {
        let root = tempfile::tempdir().unwrap();
        let kp = Ed25519KeyPair::generate();
        let a = root.path().join("a");
        let b = root.path().join("b");
        let c = root.path().join("c");
        let d = root.path().join("d");
        let data = root.path().join("data");
        for dir in [&a, &b, &c] {
            fs::create_dir_all(dir).unwrap();
        }
        write_snapshot(&a, &[("a.txt", b"v1")], "1.0.0", &kp);
        write_snapshot(&b, &[("a.txt", b"v2")], "1.1.0", &kp);
        write_snapshot(&c, &[("a.txt", b"other")], "2.0.0", &kp);
        build_delta(&a, &b, &d, &kp, "stable").unwrap();

        // Active install is C, delta is A→B.
        install_snapshot(&c, &data, &kp.public_key()).unwrap();
        assert!(matches!(
            apply_delta(&d, &data, &kp.public_key(), Some(&b)),
            Err(PackError::Integrity { .. })
        ));
    }
}
