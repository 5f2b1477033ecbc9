//! # Persisted Update State
//!
//! The state record survives crashes in `packs/state.json`, written as
//! canonical bytes via tmp+rename at every transition. Recovery reads it
//! on startup to learn which staging and cache directories to discard and
//! which install was active before the interrupted cycle.

use std::path::Path;

use korpus_core::fsio;
use serde::{Deserialize, Serialize};

use crate::error::UpdateResult;

/// Phase of the update state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UpdatePhase {
    #[serde(rename = "IDLE")]
    Idle,
    #[serde(rename = "CHECKING")]
    Checking,
    #[serde(rename = "DOWNLOADING")]
    Downloading,
    #[serde(rename = "STAGING")]
    Staging,
    #[serde(rename = "VERIFYING")]
    Verifying,
    #[serde(rename = "APPLYING")]
    Applying,
    #[serde(rename = "CLEANUP")]
    Cleanup,
    #[serde(rename = "ROLLBACK")]
    Rollback,
    #[serde(rename = "FAILED_RETRYABLE")]
    FailedRetryable,
    #[serde(rename = "FAILED_HARD")]
    FailedHard,
}

impl UpdatePhase {
    /// Whether this phase requires no recovery action on startup.
    pub fn is_idle(&self) -> bool {
        matches!(self, Self::Idle)
    }
}

impl std::fmt::Display for UpdatePhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Idle => "IDLE",
            Self::Checking => "CHECKING",
            Self::Downloading => "DOWNLOADING",
            Self::Staging => "STAGING",
            Self::Verifying => "VERIFYING",
            Self::Applying => "APPLYING",
            Self::Cleanup => "CLEANUP",
            Self::Rollback => "ROLLBACK",
            Self::FailedRetryable => "FAILED_RETRYABLE",
            Self::FailedHard => "FAILED_HARD",
        };
        f.write_str(s)
    }
}

/// Error detail recorded alongside a failed state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateErrorInfo {
    pub kind: String,
    pub message: String,
}

/// The persistent update record.
///
/// All fields except `state` are cycle-scoped and reset when a new
/// `run_once` begins.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateState {
    pub state: UpdatePhase,
    pub channel: Option<String>,
    pub plan_type: Option<String>,
    pub from_manifest_sha256: Option<String>,
    pub to_manifest_sha256: Option<String>,
    pub active_before: Option<String>,
    pub staging_dir: Option<String>,
    pub cache_path: Option<String>,
    pub error: Option<StateErrorInfo>,
    pub started_at_utc: Option<String>,
}

impl UpdateState {
    /// A fresh idle record with no cycle context.
    pub fn idle() -> Self {
        Self {
            state: UpdatePhase::Idle,
            channel: None,
            plan_type: None,
            from_manifest_sha256: None,
            to_manifest_sha256: None,
            active_before: None,
            staging_dir: None,
            cache_path: None,
            error: None,
            started_at_utc: None,
        }
    }

    /// Load the persisted state.
    ///
    /// A missing file is IDLE (first run). An unreadable file is treated
    /// as FAILED_RETRYABLE with a parse-error note so recovery still runs.
    pub fn load(path: &Path) -> Self {
        let text = match std::fs::read_to_string(path) {
            Ok(t) => t,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Self::idle(),
            Err(e) => return Self::parse_failure(format!("unreadable state.json: {e}")),
        };
        match serde_json::from_str(&text) {
            Ok(state) => state,
            Err(e) => Self::parse_failure(format!("invalid state.json: {e}")),
        }
    }

    fn parse_failure(message: String) -> Self {
        let mut state = Self::idle();
        state.state = UpdatePhase::FailedRetryable;
        state.error = Some(StateErrorInfo {
            kind: "state_parse".into(),
            message,
        });
        state
    }

    /// Persist atomically as canonical bytes.
    pub fn save(&self, path: &Path) -> UpdateResult<()> {
        fsio::atomic_write_canonical_json(path, self)
            .map_err(|e| korpus_pack::PackError::from(e).into())
    }
}
