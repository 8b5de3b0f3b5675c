//! Local file-based state storage backend.
//!
//! Snapshots are written as pretty JSON next to a lock file. Every save seals
//! the snapshot with a checksum of its instances, and every load verifies it.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use crate::error::{LifecycleError, Result, StateError};

use super::checksum::StateHasher;
use super::lock::{generate_holder_id, LockInfo, LOCK_EXPIRY_SECS};
use super::store::StateStore;
use super::types::{StateSnapshot, STATE_VERSION};

/// Default state directory name.
const STATE_DIR: &str = ".lifecycle";

/// State file name.
const STATE_FILE: &str = "state.json";

/// Lock file name.
const LOCK_FILE: &str = "state.lock";

/// Local file-based state store.
#[derive(Debug)]
pub struct LocalStateStore {
    /// Base directory for state files.
    base_dir: PathBuf,
    /// Path to the state file.
    state_path: PathBuf,
    /// Path to the lock file.
    lock_path: PathBuf,
}

impl LocalStateStore {
    /// Creates a new local state store under the current directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the current directory cannot be determined.
    pub fn new() -> Result<Self> {
        let base_dir = std::env::current_dir()
            .map_err(|e| LifecycleError::internal(format!("Cannot determine current directory: {e}")))?
            .join(STATE_DIR);

        Ok(Self::with_base_dir(base_dir))
    }

    /// Creates a new local state store with a custom base directory.
    #[must_use]
    pub fn with_base_dir(base_dir: impl Into<PathBuf>) -> Self {
        let base_dir = base_dir.into();
        let state_path = base_dir.join(STATE_FILE);
        let lock_path = base_dir.join(LOCK_FILE);

        Self {
            base_dir,
            state_path,
            lock_path,
        }
    }

    /// Creates a new local state store from a custom state file path.
    #[must_use]
    pub fn with_state_path(state_path: impl Into<PathBuf>) -> Self {
        let state_path = state_path.into();
        let base_dir = state_path
            .parent()
            .map_or_else(|| PathBuf::from("."), Path::to_path_buf);
        let lock_path = base_dir.join(LOCK_FILE);

        Self {
            base_dir,
            state_path,
            lock_path,
        }
    }

    /// Returns the path of the state file.
    #[must_use]
    pub fn state_path(&self) -> &Path {
        &self.state_path
    }

    /// Ensures the state directory exists.
    async fn ensure_dir(&self) -> Result<()> {
        if !self.base_dir.exists() {
            debug!("Creating state directory: {}", self.base_dir.display());
            fs::create_dir_all(&self.base_dir)
                .await
                .map_err(|e| StateError::storage(format!("Failed to create state directory: {e}")))?;
        }
        Ok(())
    }

    /// Reads the lock file if it exists.
    async fn read_lock_file(&self) -> Result<Option<LockInfo>> {
        if !self.lock_path.exists() {
            return Ok(None);
        }

        let content = fs::read_to_string(&self.lock_path)
            .await
            .map_err(|e| StateError::LockFailed {
                message: format!("Failed to read lock file: {e}"),
            })?;
        let lock = serde_json::from_str(&content).map_err(|e| StateError::LockFailed {
            message: format!("Failed to parse lock file {}: {e}", self.lock_path.display()),
        })?;

        Ok(Some(lock))
    }

    /// Deletes the lock file.
    async fn delete_lock_file(&self) -> Result<()> {
        if self.lock_path.exists() {
            fs::remove_file(&self.lock_path).await.map_err(|e| StateError::LockFailed {
                message: format!("Failed to delete lock file: {e}"),
            })?;
        }
        Ok(())
    }
}

/// Writes `content` to a sibling temp file, syncs it, then renames it over
/// `path`, so readers never see a partial file.
async fn write_atomically(path: &Path, content: &[u8]) -> std::io::Result<()> {
    let mut temp_path = path.as_os_str().to_owned();
    temp_path.push(".tmp");
    let temp_path = PathBuf::from(temp_path);
    let mut file = fs::File::create(&temp_path).await?;
    file.write_all(content).await?;
    file.sync_all().await?;
    fs::rename(&temp_path, path).await
}

#[async_trait]
impl StateStore for LocalStateStore {
    async fn load(&self) -> Result<Option<StateSnapshot>> {
        if !self.state_path.exists() {
            debug!("State file does not exist: {}", self.state_path.display());
            return Ok(None);
        }

        info!("Loading state from: {}", self.state_path.display());

        let content = fs::read_to_string(&self.state_path).await.map_err(|e| StateError::Corrupted {
            message: format!("Failed to read state file: {e}"),
        })?;

        let snapshot: StateSnapshot = serde_json::from_str(&content).map_err(|e| StateError::Corrupted {
            message: format!("Failed to parse state file: {e}"),
        })?;

        if snapshot.version != STATE_VERSION {
            return Err(StateError::VersionMismatch {
                expected: STATE_VERSION.to_string(),
                found: snapshot.version,
            }
            .into());
        }

        let hasher = StateHasher::new();
        let actual = hasher.hash_snapshot(&snapshot)?;
        if !StateHasher::hashes_match(&actual, &snapshot.checksum) {
            warn!(
                "State checksum mismatch: recorded {}, computed {}",
                hasher.short_hash(&snapshot.checksum),
                hasher.short_hash(&actual)
            );
            return Err(StateError::Corrupted {
                message: String::from("checksum does not match the stored instances"),
            }
            .into());
        }

        Ok(Some(snapshot))
    }

    async fn save(&self, snapshot: &StateSnapshot) -> Result<()> {
        self.ensure_dir().await?;

        info!("Saving state to: {}", self.state_path.display());

        let mut sealed = snapshot.clone();
        sealed.checksum = StateHasher::new().hash_snapshot(&sealed)?;

        let content = serde_json::to_string_pretty(&sealed)
            .map_err(|e| StateError::serialization(format!("Failed to serialize state: {e}")))?;
        write_atomically(&self.state_path, content.as_bytes())
            .await
            .map_err(|e| StateError::storage(format!("Failed to write state file: {e}")))?;

        debug!("State saved successfully (serial {})", sealed.serial);
        Ok(())
    }

    async fn delete(&self) -> Result<()> {
        if self.state_path.exists() {
            info!("Deleting state file: {}", self.state_path.display());
            fs::remove_file(&self.state_path)
                .await
                .map_err(|e| StateError::storage(format!("Failed to delete state file: {e}")))?;
        }

        self.delete_lock_file().await
    }

    async fn exists(&self) -> Result<bool> {
        Ok(self.state_path.exists())
    }

    async fn acquire_lock(&self, holder: &str, operation: &str) -> Result<LockInfo> {
        if let Some(existing) = self.read_lock_file().await? {
            if !existing.is_expired() {
                return Err(existing.conflict().into());
            }
            warn!("Taking over expired state lock held by {existing}");
        }

        let holder = if holder.is_empty() {
            generate_holder_id()
        } else {
            holder.to_string()
        };
        let lock = LockInfo::new(holder, operation);

        self.ensure_dir().await?;
        let content = serde_json::to_string_pretty(&lock)
            .map_err(|e| StateError::serialization(format!("Failed to serialize lock: {e}")))?;
        write_atomically(&self.lock_path, content.as_bytes())
            .await
            .map_err(|e| StateError::LockFailed {
                message: format!("Failed to write lock file: {e}"),
            })?;

        info!("Acquired state lock {} for {lock} (expires in {LOCK_EXPIRY_SECS}s)", lock.lock_id);
        Ok(lock)
    }

    async fn release_lock(&self, lock_id: &str) -> Result<()> {
        match self.read_lock_file().await? {
            Some(existing) if existing.lock_id == lock_id => {
                self.delete_lock_file().await?;
                info!("Released state lock {lock_id}");
            }
            Some(existing) => debug!("Not releasing state lock {}: it is not {lock_id}", existing.lock_id),
            None => debug!("State lock {lock_id} was already released"),
        }
        Ok(())
    }

    async fn lock_info(&self) -> Result<Option<LockInfo>> {
        self.read_lock_file().await
    }
}
