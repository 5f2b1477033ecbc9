//! # Offline Updater
//!
//! Drives one update cycle per `run_once` call under the single-writer
//! lock, persisting state at every transition. The `ACTIVE` rename is the
//! commit point; every failure before it leaves the previous install
//! untouched and is classified hard or retryable for the state record.
//!
//! Fault injection is a pure test hook: when `crash_mid_copy` is set the
//! apply step aborts after roughly half of the staged copy, simulating a
//! power loss. Recovery never consults the hook.

use std::fs;
use std::path::{Path, PathBuf};

use korpus_core::{manifest_sha256, Timestamp};
use korpus_crypto::Ed25519PublicKey;
use korpus_pack::manifest::load_json_value;
use korpus_pack::snapshot::{MANIFEST_JSON, MANIFEST_SIG, PAYLOAD_DIR};
use korpus_pack::{active, catalog};
use tracing::{info, warn};

use crate::channel::{select_plan, ChannelManifest, PlanType, UpdatePlan};
use crate::error::{UpdateError, UpdateResult};
use crate::lock::UpdateLock;
use crate::state::{StateErrorInfo, UpdatePhase, UpdateState};

/// Test hook: abort apply-phase copies midway to exercise crash recovery.
#[derive(Debug, Clone, Copy, Default)]
pub struct FaultInjection {
    pub crash_mid_copy: bool,
}

/// Outcome of a successful `run_once`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// The active pack already matches the channel target.
    UpToDate,
    /// An update was applied and `ACTIVE` now names the new install.
    Applied(PlanType),
}

/// Single-node update engine over a directory-shaped remote.
#[derive(Debug)]
pub struct OfflineUpdater {
    data_dir: PathBuf,
    remote_dir: PathBuf,
    public_key: Ed25519PublicKey,
    packs_dir: PathBuf,
    cache_dir: PathBuf,
    lock_path: PathBuf,
    state_path: PathBuf,
    fault: FaultInjection,
}

impl OfflineUpdater {
    /// Create an updater rooted at `data_dir`, reading artifacts from
    /// `remote_dir` and trusting `public_key` for every manifest.
    pub fn new(
        data_dir: impl Into<PathBuf>,
        remote_dir: impl Into<PathBuf>,
        public_key: Ed25519PublicKey,
    ) -> UpdateResult<Self> {
        let data_dir = data_dir.into();
        let packs_dir = data_dir.join("packs");
        let cache_dir = packs_dir.join("cache");
        fs::create_dir_all(&cache_dir)?;
        Ok(Self {
            remote_dir: remote_dir.into(),
            lock_path: packs_dir.join("lock"),
            state_path: packs_dir.join("state.json"),
            packs_dir,
            cache_dir,
            data_dir,
            public_key,
            fault: FaultInjection::default(),
        })
    }

    /// Install the fault-injection test hook.
    pub fn with_fault_injection(mut self, fault: FaultInjection) -> Self {
        self.fault = fault;
        self
    }

    /// Manifest sha of the currently active install.
    fn active_manifest_sha(&self) -> UpdateResult<String> {
        let active_dir = active::active_pack_dir(&self.packs_dir)?;
        let value = load_json_value(&active_dir.join(MANIFEST_JSON))?;
        Ok(manifest_sha256(&value).map_err(korpus_pack::PackError::from)?)
    }

    /// Read the channel manifest and select a plan against the active
    /// install. `None` means up-to-date.
    pub fn check_updates(&self, channel: &str) -> UpdateResult<Option<UpdatePlan>> {
        let active_sha = self.active_manifest_sha()?;
        let manifest = ChannelManifest::load(&self.remote_dir, channel)?;
        Ok(select_plan(&manifest, channel, &active_sha))
    }

    /// Restore invariants after a crash: put `ACTIVE` back to
    /// `active_before` if an interrupted cycle moved it, discard recorded
    /// staging and cache directories, and return the machine to IDLE.
    ///
    /// The switch is the commit point, so recovery is always safe: either
    /// the interrupted cycle never switched (nothing to undo) or it
    /// completed the switch and CLEANUP alone was lost.
    pub fn recover_on_startup(&self) -> UpdateResult<()> {
        let mut state = UpdateState::load(&self.state_path);
        if state.state.is_idle() {
            return Ok(());
        }

        if let Some(active_before) = state.active_before.clone().filter(|s| !s.is_empty()) {
            match active::read_active_name(&self.packs_dir) {
                Ok(current) if current != active_before => {
                    warn!(from = %current, to = %active_before, "recovery: restoring ACTIVE");
                    active::set_active_name(&self.packs_dir, &active_before)?;
                }
                _ => {}
            }
        }

        for recorded in [state.staging_dir.clone(), state.cache_path.clone()]
            .into_iter()
            .flatten()
            .filter(|s| !s.is_empty())
        {
            let dir = self.packs_dir.join(&recorded);
            if let Err(e) = korpus_core::fsio::remove_dir_all_if_exists(&dir) {
                warn!(path = %dir.display(), error = %e, "recovery: cleanup failed");
            }
        }

        state.state = UpdatePhase::Idle;
        state.save(&self.state_path)?;
        info!("recovery complete, state is IDLE");
        Ok(())
    }

    /// Run one full update cycle for `channel` under the updater lock.
    ///
    /// On failure the state record ends in FAILED_HARD or
    /// FAILED_RETRYABLE with the error message, and `ACTIVE` is
    /// unchanged; the error is returned to the caller as well.
    pub fn run_once(&self, channel: &str) -> UpdateResult<RunOutcome> {
        let _lock = UpdateLock::acquire(self.lock_path.clone())?;
        match self.run_cycle(channel) {
            Ok(outcome) => Ok(outcome),
            Err(e) => {
                let mut state = UpdateState::load(&self.state_path);
                let (phase, kind) = if e.is_hard() {
                    (UpdatePhase::FailedHard, "hard")
                } else {
                    (UpdatePhase::FailedRetryable, "retryable")
                };
                state.state = phase;
                state.error = Some(StateErrorInfo {
                    kind: kind.into(),
                    message: e.to_string(),
                });
                if let Err(save_err) = state.save(&self.state_path) {
                    warn!(error = %save_err, "failed to persist failure state");
                }
                Err(e)
            }
        }
    }

    fn run_cycle(&self, channel: &str) -> UpdateResult<RunOutcome> {
        self.recover_on_startup()?;

        let mut state = UpdateState::idle();
        state.state = UpdatePhase::Checking;
        state.channel = Some(channel.to_string());
        state.started_at_utc = Some(Timestamp::now().to_canonical_string());
        state.save(&self.state_path)?;

        let Some(plan) = self.check_updates(channel)? else {
            UpdateState::idle().save(&self.state_path)?;
            info!(channel, "up to date");
            return Ok(RunOutcome::UpToDate);
        };

        state.plan_type = Some(plan.plan_type.to_string());
        state.from_manifest_sha256 = plan.from_manifest_sha256.clone();
        state.to_manifest_sha256 = Some(plan.to_manifest_sha256.clone());
        state.active_before = Some(active::read_active_name(&self.packs_dir)?);
        state.save(&self.state_path)?;

        state.state = UpdatePhase::Downloading;
        state.save(&self.state_path)?;
        let cache_path = self.download(&plan)?;
        state.cache_path = Some(catalog::rel_posix(&self.packs_dir, &cache_path));
        state.save(&self.state_path)?;

        // Directory artifacts need no unpacking: the cached copy is the
        // staged artifact.
        state.state = UpdatePhase::Staging;
        state.save(&self.state_path)?;
        let staged_artifact = cache_path.clone();

        state.state = UpdatePhase::Verifying;
        state.save(&self.state_path)?;
        self.verify(&plan, &staged_artifact)?;

        state.state = UpdatePhase::Applying;
        state.save(&self.state_path)?;
        self.apply(&plan, &staged_artifact, &mut state)?;

        state.state = UpdatePhase::Cleanup;
        state.save(&self.state_path)?;
        korpus_core::fsio::remove_dir_all_if_exists(&cache_path)?;

        UpdateState::idle().save(&self.state_path)?;
        info!(channel, to = %plan.to_version, plan = %plan.plan_type, "update applied");
        Ok(RunOutcome::Applied(plan.plan_type))
    }

    // ------------------------
    // Steps
    // ------------------------

    fn download(&self, plan: &UpdatePlan) -> UpdateResult<PathBuf> {
        let src = self.remote_dir.join(&plan.channel).join(&plan.artifact_ref);
        if !src.is_dir() {
            return Err(UpdateError::MissingRemote { path: src });
        }
        let dst = self.cache_dir.join(format!(
            "cache_{}_{}",
            plan.plan_type,
            Timestamp::now().to_compact_string()
        ));
        korpus_core::fsio::remove_dir_all_if_exists(&dst)?;
        korpus_core::fsio::copy_tree(&src, &dst)?;
        Ok(dst)
    }

    fn verify(&self, plan: &UpdatePlan, staged_artifact: &Path) -> UpdateResult<()> {
        match plan.plan_type {
            PlanType::Snapshot => {
                korpus_pack::verify_snapshot(staged_artifact, &self.public_key)?;
                let value = load_json_value(&staged_artifact.join(MANIFEST_JSON))?;
                let got = manifest_sha256(&value).map_err(korpus_pack::PackError::from)?;
                if got != plan.to_manifest_sha256 {
                    return Err(UpdateError::ManifestShaMismatch {
                        expected: plan.to_manifest_sha256.clone(),
                        got,
                    });
                }
            }
            PlanType::Delta => {
                let manifest = korpus_pack::verify_delta(staged_artifact, &self.public_key)?;
                if manifest.to.manifest_sha256 != plan.to_manifest_sha256 {
                    return Err(UpdateError::ManifestShaMismatch {
                        expected: plan.to_manifest_sha256.clone(),
                        got: manifest.to.manifest_sha256,
                    });
                }
            }
        }
        Ok(())
    }

    fn apply(
        &self,
        plan: &UpdatePlan,
        staged_artifact: &Path,
        state: &mut UpdateState,
    ) -> UpdateResult<()> {
        match plan.plan_type {
            PlanType::Snapshot => self.apply_snapshot_staged(staged_artifact, state),
            PlanType::Delta => {
                if self.fault.crash_mid_copy {
                    return self.apply_delta_injected(staged_artifact, state);
                }
                let to_snapshot_dir = self
                    .remote_dir
                    .join(&plan.channel)
                    .join("snapshots")
                    .join(&plan.to_version);
                korpus_pack::apply_delta(
                    staged_artifact,
                    &self.data_dir,
                    &self.public_key,
                    Some(&to_snapshot_dir),
                )?;
                Ok(())
            }
        }
    }

    /// Stage and switch to a verified snapshot, with the injection
    /// checkpoint inside the copy loop.
    fn apply_snapshot_staged(
        &self,
        snapshot_dir: &Path,
        state: &mut UpdateState,
    ) -> UpdateResult<()> {
        let payload_dir = snapshot_dir.join(PAYLOAD_DIR);
        if !payload_dir.is_dir() {
            return Err(korpus_pack::PackError::NotFound { path: payload_dir }.into());
        }

        let staging_name = format!("staging_{}", Timestamp::now().to_compact_string());
        let staging_dir = self.packs_dir.join(&staging_name);
        fs::create_dir(&staging_dir)?;

        state.staging_dir = Some(staging_name.clone());
        state.save(&self.state_path)?;

        let files = catalog::list_files(&payload_dir)?;
        let crash_after = self
            .fault
            .crash_mid_copy
            .then(|| (files.len() / 2).max(1));
        for (copied, file) in files.iter().enumerate() {
            let rel = catalog::rel_posix(&payload_dir, file);
            korpus_core::fsio::copy_file_with_parents(file, &staging_dir.join(&rel))?;
            if let Some(limit) = crash_after {
                if copied + 1 >= limit {
                    return Err(UpdateError::InjectedCrash("snapshot"));
                }
            }
        }

        korpus_core::fsio::copy_file_with_parents(
            &snapshot_dir.join(MANIFEST_JSON),
            &staging_dir.join(MANIFEST_JSON),
        )?;
        korpus_core::fsio::copy_file_with_parents(
            &snapshot_dir.join(MANIFEST_SIG),
            &staging_dir.join(MANIFEST_SIG),
        )?;

        active::set_active_name(&self.packs_dir, &staging_name)?;
        Ok(())
    }

    /// Injected variant of the delta apply: crash midway through copying
    /// the active pack into staging, before any operation is applied and
    /// long before the switch. Reached only from the test hook.
    fn apply_delta_injected(
        &self,
        delta_dir: &Path,
        state: &mut UpdateState,
    ) -> UpdateResult<()> {
        let delta_manifest = korpus_pack::verify_delta(delta_dir, &self.public_key)?;
        let active_pack = active::active_pack_dir(&self.packs_dir)?;

        let active_value = load_json_value(&active_pack.join(MANIFEST_JSON))?;
        let active_sha = manifest_sha256(&active_value).map_err(korpus_pack::PackError::from)?;
        if active_sha != delta_manifest.from.manifest_sha256 {
            return Err(korpus_pack::PackError::Integrity {
                path: active_pack.join(MANIFEST_JSON).display().to_string(),
                detail: "active pack does not match delta 'from' manifest".into(),
            }
            .into());
        }

        let staging_name = format!("staging_{}", Timestamp::now().to_compact_string());
        let staging_dir = self.packs_dir.join(&staging_name);
        fs::create_dir(&staging_dir)?;

        state.staging_dir = Some(staging_name);
        state.save(&self.state_path)?;

        let files = catalog::list_files(&active_pack)?;
        let crash_after = (files.len() / 2).max(1);
        for (copied, file) in files.iter().enumerate() {
            let rel = catalog::rel_posix(&active_pack, file);
            korpus_core::fsio::copy_file_with_parents(file, &staging_dir.join(&rel))?;
            if copied + 1 >= crash_after {
                return Err(UpdateError::InjectedCrash("delta"));
            }
        }
        Err(UpdateError::InjectedCrash("delta"))
    }

    /// Current persisted state, for status reporting.
    pub fn state(&self) -> UpdateState {
        UpdateState::load(&self.state_path)
    }

    /// The packs directory this updater manages.
    pub fn packs_dir(&self) -> &Path {
        &self.packs_dir
    }
}
