//! # korpus-update — Crash-Safe Update Engine
//!
//! Orchestrates pack updates as a persisted state machine:
//!
//! ```text
//! IDLE → CHECKING → DOWNLOADING → STAGING → VERIFYING → APPLYING → CLEANUP → IDLE
//! ```
//!
//! State is written to `packs/state.json` (canonical bytes, tmp+rename)
//! at every transition, so a crash anywhere re-enters recovery cleanly.
//! The `ACTIVE` pointer rename inside APPLYING is the single commit
//! point: any failure before it leaves the previous active pack
//! untouched, and recovery restores `active_before` and returns the
//! machine to IDLE.
//!
//! One update operation per data directory, enforced by an
//! exclusive-create lock file; a concurrent updater fails fast with
//! [`UpdateError::Busy`].

pub mod channel;
pub mod error;
pub mod lock;
pub mod state;
pub mod updater;

pub use channel::{ChannelManifest, PlanType, UpdatePlan};
pub use error::{UpdateError, UpdateResult};
pub use lock::UpdateLock;
pub use state::{UpdatePhase, UpdateState};
pub use updater::{FaultInjection, OfflineUpdater, RunOutcome};
