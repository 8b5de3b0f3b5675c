//! State store trait definition.
//!
//! A store persists whole [`StateSnapshot`]s and coordinates writers through
//! an advisory lock. The engine itself works on an in-memory
//! [`SyncState`](super::SyncState) loaded from and persisted to a store.

use async_trait::async_trait;

use super::lock::LockInfo;
use super::types::StateSnapshot;
use crate::error::Result;

/// Persistence backend for state snapshots.
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Loads the latest snapshot, or `None` if nothing was saved yet.
    async fn load(&self) -> Result<Option<StateSnapshot>>;

    /// Saves a snapshot, replacing the previous one.
    async fn save(&self, snapshot: &StateSnapshot) -> Result<()>;

    /// Deletes the stored snapshot and any lock.
    async fn delete(&self) -> Result<()>;

    /// Checks if a snapshot exists.
    async fn exists(&self) -> Result<bool>;

    /// Takes the lock for `operation`. An empty `holder` is replaced by a
    /// generated holder id.
    ///
    /// Fails with [`StateError::LockedByOther`](crate::error::StateError::LockedByOther)
    /// while another holder's lock is live.
    async fn acquire_lock(&self, holder: &str, operation: &str) -> Result<LockInfo>;

    /// Releases the lock with the given id. Releasing a lock that is no
    /// longer held is not an error.
    async fn release_lock(&self, lock_id: &str) -> Result<()>;

    /// Returns the current lock, live or expired.
    async fn lock_info(&self) -> Result<Option<LockInfo>>;

    /// Checks if a live lock is held.
    async fn is_locked(&self) -> Result<bool> {
        Ok(self.lock_info().await?.is_some_and(|lock| !lock.is_expired()))
    }
}

#[async_trait]
impl StateStore for Box<dyn StateStore> {
    async fn load(&self) -> Result<Option<StateSnapshot>> {
        (**self).load().await
    }

    async fn save(&self, snapshot: &StateSnapshot) -> Result<()> {
        (**self).save(snapshot).await
    }

    async fn delete(&self) -> Result<()> {
        (**self).delete().await
    }

    async fn exists(&self) -> Result<bool> {
        (**self).exists().await
    }

    async fn acquire_lock(&self, holder: &str, operation: &str) -> Result<LockInfo> {
        (**self).acquire_lock(holder, operation).await
    }

    async fn release_lock(&self, lock_id: &str) -> Result<()> {
        (**self).release_lock(lock_id).await
    }

    async fn lock_info(&self) -> Result<Option<LockInfo>> {
        (**self).lock_info().await
    }
}
