//! State types for resource instance objects.
//!
//! A [`ResourceInstanceObject`] is the in-memory record of one remote object,
//! with its marks attached. It is stored in encoded form as a
//! [`ResourceInstanceObjectSrc`]: schema-conformant JSON attributes, with
//! marks split out into a list of sensitive paths.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::addrs::{DeposedKey, ResourceAddr, ResourceInstanceAddr};
use crate::error::StateError;
use crate::planner::sensitive_paths;
use crate::value::{MarkedValue, Path, Type, Value, ValueMarks};

/// Current version of the snapshot format.
pub const STATE_VERSION: &str = "1.0";

/// Status of a resource instance object.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ObjectStatus {
    /// The object is fully created and usable.
    Ready,
    /// The object is known to be bad and must be replaced.
    Tainted,
    /// The object's value is only a plan; read the planned change instead.
    Planned,
    /// The object is retained pending deletion after a replacement.
    Deposed,
}

/// A remote object bound to a resource instance.
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceInstanceObject {
    /// Attribute values, with marks.
    pub value: MarkedValue,
    /// Object status.
    pub status: ObjectStatus,
    /// Opaque provider-private data.
    pub private: Option<Vec<u8>>,
    /// Resources this object depends on.
    pub dependencies: Vec<ResourceAddr>,
    /// Whether replacements create the new object before destroying this one.
    pub create_before_destroy: bool,
}

/// Encoded form of a [`ResourceInstanceObject`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceInstanceObjectSrc {
    /// Version of the schema the attributes were written with.
    pub schema_version: u64,
    /// Attribute values as plain JSON.
    pub attributes: serde_json::Value,
    /// Paths marked sensitive.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sensitive_paths: Vec<Path>,
    /// Object status.
    pub status: ObjectStatus,
    /// Hex-encoded provider-private data.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub private: Option<String>,
    /// Resources this object depends on.
    #[serde(default)]
    pub dependencies: Vec<ResourceAddr>,
    /// Whether replacements create before destroying.
    #[serde(default)]
    pub create_before_destroy: bool,
}

/// Every object recorded for one resource instance.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceSlot {
    /// Address of the provider that manages the instance.
    #[serde(default)]
    pub provider: String,
    /// The current object.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current: Option<ResourceInstanceObjectSrc>,
    /// Deposed objects pending deletion.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub deposed: BTreeMap<DeposedKey, ResourceInstanceObjectSrc>,
}

/// A point-in-time copy of a whole state, as persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateSnapshot {
    /// Snapshot format version.
    pub version: String,
    /// Identifies a chain of snapshots of the same state.
    pub lineage: String,
    /// Incremented on every save.
    pub serial: u64,
    /// When the snapshot was taken.
    pub last_updated: DateTime<Utc>,
    /// Checksum of `instances`, set when saved.
    #[serde(default)]
    pub checksum: String,
    /// Instance slots by address.
    #[serde(default)]
    pub instances: BTreeMap<ResourceInstanceAddr, InstanceSlot>,
}

impl ResourceInstanceObject {
    /// Creates a ready object with no private data or dependencies.
    #[must_use]
    pub fn new(value: impl Into<MarkedValue>) -> Self {
        Self {
            value: value.into(),
            status: ObjectStatus::Ready,
            private: None,
            dependencies: Vec::new(),
            create_before_destroy: false,
        }
    }

    /// Returns a copy with the given status.
    #[must_use]
    pub fn with_status(mut self, status: ObjectStatus) -> Self {
        self.status = status;
        self
    }

    /// Returns true if the object's value is null.
    #[must_use]
    pub const fn is_null(&self) -> bool {
        self.value.is_null()
    }

    /// Encodes the object for storage.
    ///
    /// Unknown values cannot be stored and are written as null.
    ///
    /// # Errors
    ///
    /// Returns [`StateError::Encode`] if the value does not conform to `ty`.
    pub fn encode(
        &self,
        addr: &ResourceInstanceAddr,
        ty: &Type,
        schema_version: u64,
    ) -> Result<ResourceInstanceObjectSrc, StateError> {
        let errs = self.value.value.conformance_errors(ty);
        if !errs.is_empty() {
            return Err(StateError::Encode {
                address: addr.to_string(),
                message: errs.join("; "),
            });
        }

        Ok(ResourceInstanceObjectSrc {
            schema_version,
            attributes: self.value.value.unknown_as_null().to_json(),
            sensitive_paths: sensitive_paths(&self.value.marks),
            status: self.status,
            private: self.private.as_deref().map(hex::encode),
            dependencies: self.dependencies.clone(),
            create_before_destroy: self.create_before_destroy,
        })
    }
}

impl ResourceInstanceObjectSrc {
    /// Decodes the object using the resource type's implied type.
    ///
    /// # Errors
    ///
    /// Returns [`StateError::Decode`] if the attributes do not match `ty` or
    /// the private data is not valid hex.
    pub fn decode(&self, addr: &ResourceInstanceAddr, ty: &Type) -> Result<ResourceInstanceObject, StateError> {
        let decode_err = |message: String| StateError::Decode {
            address: addr.to_string(),
            message,
        };
        let value = Value::from_json(&self.attributes, ty).map_err(decode_err)?;
        let private = self
            .private
            .as_deref()
            .map(hex::decode)
            .transpose()
            .map_err(|e| decode_err(format!("private: {e}")))?;

        Ok(ResourceInstanceObject {
            value: value.mark_with_paths(&ValueMarks::sensitive(&self.sensitive_paths)),
            status: self.status,
            private,
            dependencies: self.dependencies.clone(),
            create_before_destroy: self.create_before_destroy,
        })
    }
}

impl InstanceSlot {
    /// Returns true if the slot holds no objects.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.current.is_none() && self.deposed.is_empty()
    }
}

impl StateSnapshot {
    /// Creates an empty snapshot with a fresh lineage.
    #[must_use]
    pub fn new() -> Self {
        Self {
            version: STATE_VERSION.to_string(),
            lineage: Uuid::new_v4().to_string(),
            serial: 0,
            last_updated: Utc::now(),
            checksum: String::new(),
            instances: BTreeMap::new(),
        }
    }

    /// Returns the number of instances with at least one object.
    #[must_use]
    pub fn instance_count(&self) -> usize {
        self.instances.values().filter(|slot| !slot.is_empty()).count()
    }
}

impl Default for StateSnapshot {
    fn default() -> Self {
        Self::new()
    }
}
