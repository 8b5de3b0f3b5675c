//! Planned change types and their encoded form.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::addrs::{DeposedKey, Generation, ResourceInstanceAddr};
use crate::error::{PlanError, StateError};
use crate::value::{Mark, MarkedValue, Path, PathSet, Type, Value, ValueMarks};

/// The kind of change planned for a resource instance object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    /// Nothing to do.
    NoOp,
    /// Create a new object.
    Create,
    /// Update the object in place.
    Update,
    /// Delete the object.
    Delete,
    /// Create a replacement, then delete the old object.
    CreateThenDelete,
    /// Delete the old object, then create a replacement.
    DeleteThenCreate,
}

impl Action {
    /// Returns true for both replacement orderings.
    #[must_use]
    pub const fn is_replace(self) -> bool {
        matches!(self, Self::CreateThenDelete | Self::DeleteThenCreate)
    }

    /// Returns the replacement action for the given ordering.
    #[must_use]
    pub const fn replace(create_before_destroy: bool) -> Self {
        if create_before_destroy {
            Self::CreateThenDelete
        } else {
            Self::DeleteThenCreate
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::NoOp => "NoOp",
            Self::Create => "Create",
            Self::Update => "Update",
            Self::Delete => "Delete",
            Self::CreateThenDelete => "CreateThenDelete",
            Self::DeleteThenCreate => "DeleteThenCreate",
        };
        f.write_str(name)
    }
}

/// A planned change for one resource instance object.
///
/// `before` and `after` keep their marks while the change is in memory;
/// marks are split out when the change is encoded.
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceInstanceChange {
    /// Instance address.
    pub addr: ResourceInstanceAddr,
    /// Deposed object the change applies to, if not the current one.
    pub deposed_key: Option<DeposedKey>,
    /// Address of the provider that planned the change.
    pub provider_addr: String,
    /// What will happen.
    pub action: Action,
    /// Value before the change; null for Create.
    pub before: MarkedValue,
    /// Value after the change; null for Delete. May contain unknowns.
    pub after: MarkedValue,
    /// Provider-private data to pass to apply.
    pub private: Option<Vec<u8>>,
    /// Paths whose change forced replacement.
    pub required_replace: PathSet,
}

/// Encoded form of a [`ResourceInstanceChange`], as recorded in a change set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceInstanceChangeSrc {
    /// Instance address.
    pub addr: ResourceInstanceAddr,
    /// Deposed object the change applies to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deposed_key: Option<DeposedKey>,
    /// Provider address.
    pub provider_addr: String,
    /// Planned action.
    pub action: Action,
    /// Unmarked before value, unknowns preserved.
    pub before: serde_json::Value,
    /// Unmarked after value, unknowns preserved.
    pub after: serde_json::Value,
    /// Sensitive paths of the before value.
    #[serde(default)]
    pub before_sensitive_paths: Vec<Path>,
    /// Sensitive paths of the after value.
    #[serde(default)]
    pub after_sensitive_paths: Vec<Path>,
    /// Hex-encoded provider-private data.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub private: Option<String>,
    /// Paths that forced replacement.
    #[serde(default)]
    pub required_replace: PathSet,
}

impl ResourceInstanceChange {
    /// Returns the generation this change applies to.
    #[must_use]
    pub fn generation(&self) -> Generation {
        Generation::from_deposed(self.deposed_key.clone())
    }

    /// Checks that the before/after nullness agrees with the action.
    ///
    /// # Errors
    ///
    /// Returns [`PlanError::InconsistentChange`] describing the mismatch.
    pub fn validate(&self) -> Result<(), PlanError> {
        let before_null = self.before.is_null();
        let after_null = self.after.is_null();
        let reason = match self.action {
            Action::Create if !before_null => Some("before value must be null"),
            Action::Delete if !after_null => Some("after value must be null"),
            Action::Create => None,
            _ if before_null => Some("before value must not be null"),
            Action::Delete => None,
            _ if after_null => Some("after value must not be null"),
            _ => None,
        };
        match reason {
            Some(reason) => Err(PlanError::InconsistentChange {
                address: self.addr.to_string(),
                action: self.action.to_string(),
                reason: reason.to_string(),
            }),
            None => Ok(()),
        }
    }

    /// Encodes the change for recording, checking both values against `ty`.
    ///
    /// # Errors
    ///
    /// Returns [`StateError::Encode`] if either value does not conform.
    pub fn encode(&self, ty: &Type) -> Result<ResourceInstanceChangeSrc, StateError> {
        let encode_err = |message: String| StateError::Encode {
            address: self.addr.to_string(),
            message,
        };
        let before = encode_value(&self.before.value, ty).map_err(|e| encode_err(format!("before: {e}")))?;
        let after = encode_value(&self.after.value, ty).map_err(|e| encode_err(format!("after: {e}")))?;

        Ok(ResourceInstanceChangeSrc {
            addr: self.addr.clone(),
            deposed_key: self.deposed_key.clone(),
            provider_addr: self.provider_addr.clone(),
            action: self.action,
            before,
            after,
            before_sensitive_paths: sensitive_paths(&self.before.marks),
            after_sensitive_paths: sensitive_paths(&self.after.marks),
            private: self.private.as_deref().map(hex::encode),
            required_replace: self.required_replace.clone(),
        })
    }
}

impl ResourceInstanceChangeSrc {
    /// Returns the generation this change applies to.
    #[must_use]
    pub fn generation(&self) -> Generation {
        Generation::from_deposed(self.deposed_key.clone())
    }

    /// Decodes the recorded change, checking both values against `ty`.
    ///
    /// # Errors
    ///
    /// Returns [`StateError::Decode`] if a value is malformed or does not
    /// conform, or if the private data is not valid hex.
    pub fn decode(&self, ty: &Type) -> Result<ResourceInstanceChange, StateError> {
        let decode_err = |message: String| StateError::Decode {
            address: self.addr.to_string(),
            message,
        };
        let before = decode_value(&self.before, ty).map_err(|e| decode_err(format!("before: {e}")))?;
        let after = decode_value(&self.after, ty).map_err(|e| decode_err(format!("after: {e}")))?;
        let private = self
            .private
            .as_deref()
            .map(hex::decode)
            .transpose()
            .map_err(|e| decode_err(format!("private: {e}")))?;

        Ok(ResourceInstanceChange {
            addr: self.addr.clone(),
            deposed_key: self.deposed_key.clone(),
            provider_addr: self.provider_addr.clone(),
            action: self.action,
            before: before.mark_with_paths(&ValueMarks::sensitive(&self.before_sensitive_paths)),
            after: after.mark_with_paths(&ValueMarks::sensitive(&self.after_sensitive_paths)),
            private,
            required_replace: self.required_replace.clone(),
        })
    }
}

fn encode_value(value: &Value, ty: &Type) -> Result<serde_json::Value, String> {
    let errs = value.conformance_errors(ty);
    if !errs.is_empty() {
        return Err(errs.join("; "));
    }
    serde_json::to_value(value).map_err(|e| e.to_string())
}

fn decode_value(json: &serde_json::Value, ty: &Type) -> Result<Value, String> {
    let value: Value = serde_json::from_value(json.clone()).map_err(|e| e.to_string())?;
    let errs = value.conformance_errors(ty);
    if errs.is_empty() {
        Ok(value)
    } else {
        Err(errs.join("; "))
    }
}

pub(crate) fn sensitive_paths(marks: &ValueMarks) -> Vec<Path> {
    marks
        .iter()
        .filter(|(_, set)| set.contains(&Mark::Sensitive))
        .map(|(path, _)| path.clone())
        .collect()
}
