//! Resource instance state.
//!
//! This module holds the in-memory record of every remote object the engine
//! manages, its encoded storage form, and the file-based persistence backend.
//! Two independent [`SyncState`] instances are used during planning: the
//! working state and the refresh-only state.

mod checksum;
mod local;
mod lock;
mod store;
mod sync;
mod types;

pub use checksum::StateHasher;
pub use local::LocalStateStore;
pub use lock::{generate_holder_id, LockInfo, LOCK_EXPIRY_SECS};
pub use store::StateStore;
pub use sync::SyncState;
pub use types::{
    InstanceSlot, ObjectStatus, ResourceInstanceObject, ResourceInstanceObjectSrc, StateSnapshot, STATE_VERSION,
};
