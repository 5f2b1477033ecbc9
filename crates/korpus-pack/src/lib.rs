//! # korpus-pack — Content Pack Lifecycle
//!
//! Builds, verifies, installs, and patches signed content packs.
//!
//! A **snapshot** is a self-contained pack version: a `payload/` tree, a
//! canonical-JSON `manifest.json` listing every payload file with size and
//! SHA-256, and an Ed25519 `manifest.sig` over the manifest's canonical
//! bytes. A **delta** patches one snapshot into another via
//! `add_or_replace` and `delete` operations.
//!
//! Installed packs live under `<data_dir>/packs/<install>/` with the
//! payload at the pack root plus a copy of the manifest pair. Exactly one
//! install is active at a time, named by the sibling `ACTIVE` pointer
//! file; switching is a single atomic rename, which is the commit point
//! of every update.

pub mod active;
pub mod catalog;
pub mod delta;
pub mod error;
pub mod manifest;
pub mod snapshot;

pub use active::{active_pack_dir, read_active_name, set_active_name};
pub use catalog::{file_entry, file_sha256, list_files};
pub use delta::{apply_delta, build_delta, verify_delta};
pub use error::{PackError, PackResult};
pub use manifest::{DeltaManifest, DeltaOps, FileEntry, ManifestRef, SnapshotManifest};
pub use snapshot::{build_snapshot, install_snapshot, verify_snapshot};
