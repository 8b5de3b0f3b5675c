//! Snapshot checksums for corruption detection.
//!
//! The checksum covers the instance slots only, so that metadata such as the
//! serial and timestamp can be updated without re-hashing.

use sha2::{Digest, Sha256};

use crate::error::StateError;

use super::types::{InstanceSlot, StateSnapshot};

/// Hasher for computing snapshot checksums.
#[derive(Debug, Default)]
pub struct StateHasher;

impl StateHasher {
    /// Creates a new snapshot hasher.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Computes the checksum of a snapshot's instances.
    ///
    /// Instances are visited in address order, so the result is
    /// deterministic.
    ///
    /// # Errors
    ///
    /// Returns an error if a slot cannot be serialized.
    pub fn hash_snapshot(&self, snapshot: &StateSnapshot) -> Result<String, StateError> {
        let mut hasher = Sha256::new();
        for (addr, slot) in &snapshot.instances {
            if slot.is_empty() {
                continue;
            }
            hasher.update(addr.to_string().as_bytes());
            hasher.update(self.hash_slot(slot)?.as_bytes());
        }
        Ok(hex::encode(hasher.finalize()))
    }

    /// Computes the checksum of a single instance slot.
    ///
    /// # Errors
    ///
    /// Returns an error if the slot cannot be serialized.
    pub fn hash_slot(&self, slot: &InstanceSlot) -> Result<String, StateError> {
        let bytes = serde_json::to_vec(slot)
            .map_err(|e| StateError::serialization(format!("Failed to serialize instance: {e}")))?;
        Ok(hex::encode(Sha256::digest(&bytes)))
    }

    /// Computes a short hash (first 8 characters) for display purposes.
    #[must_use]
    pub fn short_hash(&self, hash: &str) -> String {
        hash.chars().take(8).collect()
    }

    /// Compares two hashes in constant time.
    #[must_use]
    pub fn hashes_match(hash1: &str, hash2: &str) -> bool {
        if hash1.len() != hash2.len() {
            return false;
        }

        hash1
            .bytes()
            .zip(hash2.bytes())
            .fold(0u8, |acc, (a, b)| acc | (a ^ b))
            == 0
    }
}
