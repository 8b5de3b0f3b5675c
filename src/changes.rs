//! Change set.
//!
//! Records the encoded planned change for each (address, generation) pair,
//! so that an apply phase can retrieve exactly what an earlier plan computed.

use parking_lot::Mutex;
use std::collections::BTreeMap;
use tracing::trace;

use crate::addrs::{Generation, ResourceInstanceAddr};
use crate::planner::ResourceInstanceChangeSrc;

type ChangeKey = (ResourceInstanceAddr, Generation);

/// Thread-safe set of recorded changes.
#[derive(Debug, Default)]
pub struct ChangeSet {
    changes: Mutex<BTreeMap<ChangeKey, ResourceInstanceChangeSrc>>,
}

impl ChangeSet {
    /// Creates an empty change set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a change, replacing any change already recorded for its
    /// address and generation.
    pub fn append(&self, change: ResourceInstanceChangeSrc) {
        let key = (change.addr.clone(), change.generation());
        trace!("recording {} change for {} {}", change.action, key.0, key.1);
        self.changes.lock().insert(key, change);
    }

    /// Returns the change recorded for an address and generation.
    #[must_use]
    pub fn get(&self, addr: &ResourceInstanceAddr, generation: &Generation) -> Option<ResourceInstanceChangeSrc> {
        self.changes
            .lock()
            .get(&(addr.clone(), generation.clone()))
            .cloned()
    }

    /// Removes the change recorded for an address and generation, returning it.
    pub fn remove(&self, addr: &ResourceInstanceAddr, generation: &Generation) -> Option<ResourceInstanceChangeSrc> {
        self.changes.lock().remove(&(addr.clone(), generation.clone()))
    }

    /// Returns every recorded change in address order.
    #[must_use]
    pub fn changes(&self) -> Vec<ResourceInstanceChangeSrc> {
        self.changes.lock().values().cloned().collect()
    }

    /// Returns the number of recorded changes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.changes.lock().len()
    }

    /// Returns true if no change is recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.changes.lock().is_empty()
    }
}
