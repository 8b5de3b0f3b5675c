//! Advisory locking for state stores.
//!
//! A lock guards a stored snapshot against concurrent writers in different
//! processes. Locks expire so that a crashed holder never blocks forever.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::error::StateError;

/// Lock expiry duration in seconds.
pub const LOCK_EXPIRY_SECS: i64 = 300;

/// A lock held on a stored state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockInfo {
    /// Unique lock identifier, needed to release the lock.
    pub lock_id: String,
    /// Who holds the lock.
    pub holder: String,
    /// What the holder is doing, e.g. `apply`.
    #[serde(default)]
    pub operation: String,
    /// When the lock was acquired.
    pub acquired_at: DateTime<Utc>,
    /// When the lock expires unless refreshed.
    pub expires_at: DateTime<Utc>,
}

impl LockInfo {
    /// Creates a lock for `holder` performing `operation`.
    #[must_use]
    pub fn new(holder: impl Into<String>, operation: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            lock_id: Uuid::new_v4().to_string(),
            holder: holder.into(),
            operation: operation.into(),
            acquired_at: now,
            expires_at: now + Duration::seconds(LOCK_EXPIRY_SECS),
        }
    }

    /// Returns true once the lock may be taken over.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        Utc::now() > self.expires_at
    }

    /// Extends the lock by another expiry period.
    pub fn refresh(&mut self) {
        self.expires_at = Utc::now() + Duration::seconds(LOCK_EXPIRY_SECS);
    }

    /// Returns the seconds left before the lock expires.
    #[must_use]
    pub fn remaining_secs(&self) -> i64 {
        (self.expires_at - Utc::now()).num_seconds().max(0)
    }

    /// Returns the error reported to a writer that finds this lock held.
    #[must_use]
    pub fn conflict(&self) -> StateError {
        StateError::LockedByOther {
            holder: self.to_string(),
            since: self.acquired_at.to_rfc3339(),
        }
    }
}

impl fmt::Display for LockInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.operation.is_empty() {
            f.write_str(&self.holder)
        } else {
            write!(f, "{} during {}", self.holder, self.operation)
        }
    }
}

/// Generates a holder identifier for the current process:
/// `<hostname>-<pid>-<8 hex digits>`.
#[must_use]
pub fn generate_holder_id() -> String {
    let hostname = hostname::get().map_or_else(|_| String::from("unknown"), |h| h.to_string_lossy().to_string());
    let suffix = Uuid::new_v4().simple().to_string();

    format!("{hostname}-{}-{}", std::process::id(), &suffix[..8])
}
