//! # Temporal Types
//!
//! UTC-only timestamp type. All persisted timestamps are UTC with
//! second-level precision and a `Z` suffix; local time is a presentation
//! concern that never reaches disk.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A UTC timestamp.
///
/// The canonical string form is ISO 8601 with `Z` suffix truncated to
/// seconds (e.g. `2026-01-15T12:00:00Z`); the compact form feeds unique
/// staging and cache directory names and keeps microseconds to avoid
/// collisions between back-to-back update cycles.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    /// Create a timestamp representing the current UTC time.
    pub fn now() -> Self {
        Self(Utc::now())
    }

    /// Create a timestamp from a `chrono::DateTime<Utc>`.
    pub fn from_datetime(dt: DateTime<Utc>) -> Self {
        Self(dt)
    }

    /// Access the underlying `chrono::DateTime<Utc>`.
    pub fn as_datetime(&self) -> &DateTime<Utc> {
        &self.0
    }

    /// ISO 8601 string with Z suffix, truncated to seconds.
    pub fn to_canonical_string(&self) -> String {
        self.0.format("%Y-%m-%dT%H:%M:%SZ").to_string()
    }

    /// Compact filesystem-safe form with microseconds,
    /// e.g. `20260115T120000123456Z`.
    pub fn to_compact_string(&self) -> String {
        self.0.format("%Y%m%dT%H%M%S%6fZ").to_string()
    }
}

impl std::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_canonical_string())
    }
}

impl From<DateTime<Utc>> for Timestamp {
    fn from(dt: DateTime<Utc>) -> Self {
        Self(dt)
    }
}
