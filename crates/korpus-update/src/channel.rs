//! # Channel Manifest and Plan Selection
//!
//! A channel publishes `<remote>/<channel>/latest.json` describing the
//! newest pack version, the snapshot artifact path, and optionally a
//! delta from one specific predecessor. Plan selection compares the
//! active install's manifest sha against the channel's target: equal
//! means up-to-date; a delta whose `from_manifest_sha256` matches the
//! active sha is preferred; otherwise a full snapshot is planned.
//!
//! Channel manifests arrive as non-canonical JSON and are parsed
//! tolerantly, ignoring unknown fields.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{UpdateError, UpdateResult};

/// The delta offer inside a channel manifest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelDelta {
    pub from_manifest_sha256: String,
    pub path: String,
    pub from_version: Option<String>,
}

/// Parsed `latest.json` for one channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelManifest {
    pub pack_id: String,
    pub latest_version: String,
    pub snapshot_path: String,
    pub to_manifest_sha256: String,
    #[serde(default)]
    pub delta: Option<ChannelDelta>,
}

impl ChannelManifest {
    /// Load `<remote>/<channel>/latest.json`.
    pub fn load(remote_dir: &Path, channel: &str) -> UpdateResult<Self> {
        let path = remote_dir.join(channel).join("latest.json");
        let text = std::fs::read_to_string(&path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => UpdateError::MissingRemote { path: path.clone() },
            _ => UpdateError::Io(e),
        })?;
        serde_json::from_str(&text)
            .map_err(|e| UpdateError::State(format!("invalid channel manifest {}: {e}", path.display())))
    }
}

/// Whether an update applies a delta or a full snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlanType {
    #[serde(rename = "snapshot")]
    Snapshot,
    #[serde(rename = "delta")]
    Delta,
}

impl std::fmt::Display for PlanType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Snapshot => f.write_str("snapshot"),
            Self::Delta => f.write_str("delta"),
        }
    }
}

/// A selected update: what to fetch and which manifest shas bind it.
#[derive(Debug, Clone)]
pub struct UpdatePlan {
    pub plan_type: PlanType,
    pub channel: String,
    pub pack_id: String,
    pub from_version: Option<String>,
    pub to_version: String,
    /// Artifact path relative to `<remote>/<channel>/`.
    pub artifact_ref: String,
    pub from_manifest_sha256: Option<String>,
    pub to_manifest_sha256: String,
}

/// Select an update plan given the active install's manifest sha.
///
/// Returns `None` when the channel's target equals the active sha.
pub fn select_plan(
    manifest: &ChannelManifest,
    channel: &str,
    active_manifest_sha: &str,
) -> Option<UpdatePlan> {
    if active_manifest_sha == manifest.to_manifest_sha256 {
        return None;
    }

    if let Some(delta) = &manifest.delta {
        if delta.from_manifest_sha256 == active_manifest_sha {
            return Some(UpdatePlan {
                plan_type: PlanType::Delta,
                channel: channel.to_string(),
                pack_id: manifest.pack_id.clone(),
                from_version: delta.from_version.clone(),
                to_version: manifest.latest_version.clone(),
                artifact_ref: delta.path.clone(),
                from_manifest_sha256: Some(delta.from_manifest_sha256.clone()),
                to_manifest_sha256: manifest.to_manifest_sha256.clone(),
            });
        }
    }

    Some(UpdatePlan {
        plan_type: PlanType::Snapshot,
        channel: channel.to_string(),
        pack_id: manifest.pack_id.clone(),
        from_version: None,
        to_version: manifest.latest_version.clone(),
        artifact_ref: manifest.snapshot_path.clone(),
        from_manifest_sha256: None,
        to_manifest_sha256: manifest.to_manifest_sha256.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manifest(delta: Option<ChannelDelta>) -> ChannelManifest {
        ChannelManifest {
            pack_id: "demo".into(),
            latest_version: "1.1.0".into(),
            snapshot_path: "snapshots/1.1.0".into(),
            to_manifest_sha256: "b".repeat(64),
            delta,
        }
    }

    #[test]
    fn up_to_date_selects_nothing() {
        let m = manifest(None);
        assert!(select_plan(&m, "stable", &"b".repeat(64)).is_none());
    }

    #[test]
    fn matching_delta_is_preferred() {
        let m = manifest(Some(ChannelDelta {
            from_manifest_sha256: "a".repeat(64),
            path: "deltas/1.0.0__1.1.0".into(),
            from_version: Some("1.0.0".into()),
        }));
        let plan = select_plan(&m, "stable", &"a".repeat(64)).unwrap();
        assert_eq!(plan.plan_type, PlanType::Delta);
        assert_eq!(plan.artifact_ref, "deltas/1.0.0__1.1.0");
        assert_eq!(plan.from_manifest_sha256.as_deref(), Some("a".repeat(64).as_str()));
    }

    #[test]
    fn non_matching_delta_falls_back_to_snapshot() {
        let m = manifest(Some(ChannelDelta {
            from_manifest_sha256: "c".repeat(64),
            path: "deltas/x__y".into(),
            from_version: None,
        }));
        let plan = select_plan(&m, "stable", &"a".repeat(64)).unwrap();
        assert_eq!(plan.plan_type, PlanType::Snapshot);
        assert_eq!(plan.artifact_ref, "snapshots/1.1.0");
        assert!(plan.from_manifest_sha256.is_none());
    }

    #[test]
    fn channel_manifest_parses_tolerantly() {
        let dir = tempfile::tempdir().unwrap();
        let ch = dir.path().join("stable");
        std::fs::create_dir_all(&ch).unwrap();
        std::fs::write(
            ch.join("latest.json"),
            r#"{
              "pack_id": "demo", "channel": "stable",
              "latest_version": "2.0.0",
              "snapshot_path": "snapshots/2.0.0",
              "to_manifest_sha256": "abc",
              "future_field": {"ignored": true}
            }"#,
        )
        .unwrap();
        let m = ChannelManifest::load(dir.path(), "stable").unwrap();
        assert_eq!(m.latest_version, "2.0.0");
        assert!(m.delta.is_none());
    }

    #[test]
    fn missing_channel_manifest_is_missing_remote() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            ChannelManifest::load(dir.path(), "stable"),
            Err(UpdateError::MissingRemote { .. })
        ));
    }
}
