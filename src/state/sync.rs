//! Synchronized in-memory state.
//!
//! [`SyncState`] is the state handle the lifecycle engine reads and writes.
//! Each instance address owns its own slot lock, so writes to different
//! addresses never contend beyond a brief read of the outer map.

use chrono::Utc;
use parking_lot::{Mutex, RwLock};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info};

use crate::addrs::{DeposedKey, Generation, ResourceInstanceAddr};
use crate::error::{Result, StateError};

use super::checksum::StateHasher;
use super::store::StateStore;
use super::types::{InstanceSlot, ResourceInstanceObjectSrc, StateSnapshot, STATE_VERSION};

/// Thread-safe state keyed by resource instance address.
#[derive(Debug)]
pub struct SyncState {
    instances: RwLock<BTreeMap<ResourceInstanceAddr, Arc<Mutex<InstanceSlot>>>>,
    lineage: String,
    serial: Mutex<u64>,
}

impl SyncState {
    /// Creates an empty state.
    #[must_use]
    pub fn new() -> Self {
        Self::from_snapshot(StateSnapshot::new())
    }

    /// Creates a state holding the contents of a snapshot.
    #[must_use]
    pub fn from_snapshot(snapshot: StateSnapshot) -> Self {
        let instances = snapshot
            .instances
            .into_iter()
            .map(|(addr, slot)| (addr, Arc::new(Mutex::new(slot))))
            .collect();
        Self {
            instances: RwLock::new(instances),
            lineage: snapshot.lineage,
            serial: Mutex::new(snapshot.serial),
        }
    }

    fn slot(&self, addr: &ResourceInstanceAddr) -> Arc<Mutex<InstanceSlot>> {
        if let Some(slot) = self.instances.read().get(addr) {
            return Arc::clone(slot);
        }
        let mut instances = self.instances.write();
        Arc::clone(instances.entry(addr.clone()).or_default())
    }

    fn existing_slot(&self, addr: &ResourceInstanceAddr) -> Option<Arc<Mutex<InstanceSlot>>> {
        self.instances.read().get(addr).map(Arc::clone)
    }

    /// Returns the encoded object of the given generation, if any.
    #[must_use]
    pub fn resource_instance_object(
        &self,
        addr: &ResourceInstanceAddr,
        generation: &Generation,
    ) -> Option<ResourceInstanceObjectSrc> {
        let slot = self.existing_slot(addr)?;
        let slot = slot.lock();
        match generation {
            Generation::Current => slot.current.clone(),
            Generation::Deposed(key) => slot.deposed.get(key).cloned(),
        }
    }

    /// Sets or, with `None`, removes the current object of an instance.
    pub fn set_resource_instance_current(
        &self,
        addr: &ResourceInstanceAddr,
        object: Option<ResourceInstanceObjectSrc>,
        provider: &str,
    ) {
        if object.is_none() && self.existing_slot(addr).is_none() {
            return;
        }
        let slot = self.slot(addr);
        let mut slot = slot.lock();
        slot.provider = provider.to_string();
        slot.current = object;
    }

    /// Sets or, with `None`, removes a deposed object of an instance.
    pub fn set_resource_instance_deposed(
        &self,
        addr: &ResourceInstanceAddr,
        key: &DeposedKey,
        object: Option<ResourceInstanceObjectSrc>,
        provider: &str,
    ) {
        if object.is_none() && self.existing_slot(addr).is_none() {
            return;
        }
        let slot = self.slot(addr);
        let mut slot = slot.lock();
        slot.provider = provider.to_string();
        match object {
            Some(object) => {
                slot.deposed.insert(key.clone(), object);
            }
            None => {
                slot.deposed.remove(key);
            }
        }
    }

    /// Moves the current object of an instance into a new deposed slot.
    ///
    /// Returns the new deposed key, or `None` if there was no current object.
    pub fn depose_current(&self, addr: &ResourceInstanceAddr) -> Option<DeposedKey> {
        let slot = self.existing_slot(addr)?;
        let mut slot = slot.lock();
        let current = slot.current.take()?;
        let mut key = DeposedKey::generate();
        while slot.deposed.contains_key(&key) {
            key = DeposedKey::generate();
        }
        debug!("deposing current object of {addr} as {key}");
        slot.deposed.insert(key.clone(), current);
        Some(key)
    }

    /// Returns the deposed keys of an instance.
    #[must_use]
    pub fn deposed_keys(&self, addr: &ResourceInstanceAddr) -> Vec<DeposedKey> {
        self.existing_slot(addr)
            .map(|slot| slot.lock().deposed.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Returns the addresses of instances holding at least one object.
    #[must_use]
    pub fn instance_addrs(&self) -> Vec<ResourceInstanceAddr> {
        self.instances
            .read()
            .iter()
            .filter(|(_, slot)| !slot.lock().is_empty())
            .map(|(addr, _)| addr.clone())
            .collect()
    }

    /// Returns the number of instances holding at least one object.
    #[must_use]
    pub fn len(&self) -> usize {
        self.instance_addrs().len()
    }

    /// Returns true if no instance holds an object.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Takes a consistent copy of every non-empty slot.
    ///
    /// # Errors
    ///
    /// Returns an error if the checksum cannot be computed.
    pub fn snapshot(&self) -> std::result::Result<StateSnapshot, StateError> {
        let instances = self.instances.read();
        let mut snapshot = StateSnapshot {
            version: STATE_VERSION.to_string(),
            lineage: self.lineage.clone(),
            serial: *self.serial.lock(),
            last_updated: Utc::now(),
            checksum: String::new(),
            instances: instances
                .iter()
                .map(|(addr, slot)| (addr.clone(), slot.lock().clone()))
                .filter(|(_, slot)| !slot.is_empty())
                .collect(),
        };
        snapshot.checksum = StateHasher::new().hash_snapshot(&snapshot)?;
        Ok(snapshot)
    }

    /// Loads a state from a store, or returns an empty state if none exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the stored snapshot cannot be read.
    pub async fn load<S: StateStore + ?Sized>(store: &S) -> Result<Self> {
        match store.load().await? {
            Some(snapshot) => {
                info!(
                    "Loaded state with {} instances (serial {})",
                    snapshot.instance_count(),
                    snapshot.serial
                );
                Ok(Self::from_snapshot(snapshot))
            }
            None => Ok(Self::new()),
        }
    }

    /// Saves a snapshot of this state to a store, bumping the serial.
    ///
    /// # Errors
    ///
    /// Returns an error if the snapshot cannot be taken or written.
    pub async fn persist<S: StateStore + ?Sized>(&self, store: &S) -> Result<()> {
        *self.serial.lock() += 1;
        let snapshot = self.snapshot()?;
        store.save(&snapshot).await
    }

    /// Persists under the store's lock, releasing it afterwards.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock is held elsewhere or the snapshot
    /// cannot be written.
    pub async fn persist_locked<S: StateStore + ?Sized>(&self, store: &S, holder: &str, operation: &str) -> Result<()> {
        let lock = store.acquire_lock(holder, operation).await?;
        let saved = self.persist(store).await;
        let released = store.release_lock(&lock.lock_id).await;
        saved.and(released)
    }
}

impl Default for SyncState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::types::ObjectStatus;

    fn addr(name: &str) -> ResourceInstanceAddr {
        ResourceInstanceAddr::new("test_thing", name)
    }

    fn object(id: &str) -> ResourceInstanceObjectSrc {
        ResourceInstanceObjectSrc {
            schema_version: 0,
            attributes: serde_json::json!({ "id": id }),
            sensitive_paths: vec![],
            status: ObjectStatus::Ready,
            private: None,
            dependencies: vec![],
            create_before_destroy: false,
        }
    }

    #[test]
    fn test_set_and_remove_current() {
        let state = SyncState::new();
        state.set_resource_instance_current(&addr("a"), Some(object("i-1")), "registry/test");
        assert_eq!(
            state.resource_instance_object(&addr("a"), &Generation::Current),
            Some(object("i-1"))
        );
        assert_eq!(state.len(), 1);

        state.set_resource_instance_current(&addr("a"), None, "registry/test");
        assert!(state.resource_instance_object(&addr("a"), &Generation::Current).is_none());
        assert!(state.is_empty());
    }

    #[test]
    fn test_depose_current() {
        let state = SyncState::new();
        assert!(state.depose_current(&addr("a")).is_none());

        state.set_resource_instance_current(&addr("a"), Some(object("i-1")), "registry/test");
        let key = state.depose_current(&addr("a")).expect("deposed");
        assert_eq!(key.as_str().len(), 8);
        assert!(state.resource_instance_object(&addr("a"), &Generation::Current).is_none());
        assert_eq!(
            state.resource_instance_object(&addr("a"), &Generation::Deposed(key.clone())),
            Some(object("i-1"))
        );
        assert_eq!(state.deposed_keys(&addr("a")), vec![key.clone()]);

        state.set_resource_instance_deposed(&addr("a"), &key, None, "registry/test");
        assert!(state.is_empty());
    }

    #[test]
    fn test_snapshot_round_trip() {
        let state = SyncState::new();
        state.set_resource_instance_current(&addr("a"), Some(object("i-1")), "registry/test");
        state.set_resource_instance_current(&addr("b"), Some(object("i-2")), "registry/test");
        state.set_resource_instance_current(&addr("b"), None, "registry/test");

        let snapshot = state.snapshot().expect("snapshot");
        assert_eq!(snapshot.instances.len(), 1);
        assert!(!snapshot.checksum.is_empty());

        let restored = SyncState::from_snapshot(snapshot);
        assert_eq!(restored.instance_addrs(), vec![addr("a")]);
    }

    #[test]
    fn test_concurrent_writes_to_different_addresses() {
        let state = Arc::new(SyncState::new());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let state = Arc::clone(&state);
                std::thread::spawn(move || {
                    let name = format!("n{i}");
                    for _ in 0..50 {
                        state.set_resource_instance_current(&addr(&name), Some(object(&name)), "registry/test");
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().expect("thread panicked");
        }
        assert_eq!(state.len(), 8);
    }
}
