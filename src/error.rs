//! Error types for the resource lifecycle engine.
//!
//! The hierarchy separates evaluation and configuration errors, provider
//! contract violations (defects in a provider), diagnostics deliberately
//! returned by a provider, policy violations, and state storage failures.
//! Tolerated provider inconsistencies are never errors: they are logged and
//! accumulated as warnings on the operation's outcome instead.

use std::path::PathBuf;
use thiserror::Error;

use crate::provider::Diagnostics;

/// The main error type for the lifecycle engine.
#[derive(Debug, Error)]
pub enum LifecycleError {
    /// Configuration and evaluation errors.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// State storage errors.
    #[error("State error: {0}")]
    State(#[from] StateError),

    /// Provider contract violations and provider-reported errors.
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    /// Planning invariant violations.
    #[error("Planning error: {0}")]
    Plan(#[from] PlanError),

    /// Lifecycle policy violations.
    #[error("Policy violation: {0}")]
    Policy(#[from] PolicyError),

    /// A hook halted the operation.
    #[error("Hook error: {0}")]
    Hook(#[from] HookError),

    /// IO errors.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Configuration-related errors, including configuration evaluation.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file was not found.
    #[error("Configuration file not found: {path}")]
    FileNotFound {
        /// Path to the missing file.
        path: PathBuf,
    },

    /// The configuration file could not be parsed.
    #[error("Failed to parse configuration: {message}")]
    ParseError {
        /// Description of the parse error.
        message: String,
        /// Optional source location.
        location: Option<String>,
    },

    /// Validation failed.
    #[error("Configuration validation failed: {message}")]
    ValidationError {
        /// Description of the validation error.
        message: String,
        /// Field that failed validation.
        field: Option<String>,
    },

    /// Duplicate resource definition.
    #[error("Duplicate resource address: {address}")]
    DuplicateResource {
        /// The duplicated address.
        address: String,
    },

    /// A resource address could not be parsed.
    #[error("Invalid resource address '{address}': {reason}")]
    InvalidAddress {
        /// The offending address text.
        address: String,
        /// Why it is invalid.
        reason: String,
    },

    /// An attribute path could not be parsed or does not exist.
    #[error("Invalid attribute path '{path}': {reason}")]
    InvalidPath {
        /// The offending path text.
        path: String,
        /// Why it is invalid.
        reason: String,
    },

    /// The configuration could not be evaluated to a value.
    #[error("Failed to evaluate configuration for {address}: {message}")]
    Evaluation {
        /// Address of the resource instance being evaluated.
        address: String,
        /// Description of the evaluation failure.
        message: String,
    },
}

/// State storage errors.
#[derive(Debug, Error)]
pub enum StateError {
    /// State snapshot is corrupted.
    #[error("State is corrupted: {message}")]
    Corrupted {
        /// Description of the corruption.
        message: String,
    },

    /// State lock acquisition failed.
    #[error("Failed to acquire state lock: {message}")]
    LockFailed {
        /// Description of the lock failure.
        message: String,
    },

    /// State lock is held by another process.
    #[error("State is locked by another process (lock holder: {holder}, since: {since})")]
    LockedByOther {
        /// Identifier of the lock holder.
        holder: String,
        /// When the lock was acquired.
        since: String,
    },

    /// Reading or writing the snapshot file failed.
    #[error("State storage error: {message}")]
    Storage {
        /// Description of the storage failure.
        message: String,
    },

    /// Serialization error.
    #[error("State serialization error: {message}")]
    SerializationError {
        /// Description of the serialization error.
        message: String,
    },

    /// State version mismatch.
    #[error("State version mismatch: expected {expected}, found {found}")]
    VersionMismatch {
        /// Expected state version.
        expected: String,
        /// Found state version.
        found: String,
    },

    /// An object could not be encoded for storage.
    #[error("Failed to encode {address} in state: {message}")]
    Encode {
        /// Instance address.
        address: String,
        /// Description of the failure.
        message: String,
    },

    /// A stored object or change could not be decoded.
    #[error("Failed to decode {address}: {message}")]
    Decode {
        /// Instance address.
        address: String,
        /// Description of the failure.
        message: String,
    },
}

/// Provider contract violations and provider-reported errors.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The provider has no schema for the resource type.
    #[error("Provider {provider:?} does not support resource type {resource_type:?}")]
    UnsupportedResourceType {
        /// Provider address.
        provider: String,
        /// Requested resource type.
        resource_type: String,
    },

    /// The resource declares provider metadata that the provider cannot accept.
    #[error(
        "Provider {provider} doesn't support provider_meta: the resource {address} belongs to a provider that doesn't support provider_meta blocks"
    )]
    ProviderMetaUnsupported {
        /// Provider address.
        provider: String,
        /// Resource instance address.
        address: String,
    },

    /// The provider returned an object that does not conform to the schema.
    #[error(
        "Provider {provider:?} produced an invalid object for {address} during {operation}: {}.\n\nThis is a bug in the provider, which should be reported in the provider's own issue tracker.",
        .problems.join("; ")
    )]
    InvalidObject {
        /// Provider address.
        provider: String,
        /// Resource instance address.
        address: String,
        /// Operation that produced the object.
        operation: String,
        /// Individual problems found.
        problems: Vec<String>,
    },

    /// The provider planned a value that violates the planning contract.
    #[error(
        "Provider {provider:?} planned an invalid value for {address}: {}.\n\nThis is a bug in the provider, which should be reported in the provider's own issue tracker.",
        .problems.join("; ")
    )]
    InvalidPlan {
        /// Provider address.
        provider: String,
        /// Resource instance address.
        address: String,
        /// Individual problems found.
        problems: Vec<String>,
    },

    /// The provider returned no value where one is required.
    #[error(
        "Provider {provider:?} returned no value from {operation} for {address}.\n\nThis is a bug in the provider, which should be reported in the provider's own issue tracker."
    )]
    NilResponse {
        /// Provider address.
        provider: String,
        /// Resource instance address.
        address: String,
        /// RPC that returned no value.
        operation: String,
    },

    /// Requires-replace paths that exist in neither the prior nor the planned value.
    #[error(
        "Provider {provider:?} has indicated \"requires replacement\" on {address} for non-existent attribute paths: {}.\n\nThis is a bug in the provider, which should be reported in the provider's own issue tracker.",
        .paths.join(", ")
    )]
    InvalidReplacePath {
        /// Provider address.
        provider: String,
        /// Resource instance address.
        address: String,
        /// The unresolvable paths.
        paths: Vec<String>,
    },

    /// The applied object disagrees with the planned object.
    #[error(
        "Provider {provider:?} produced an unexpected new value for {address}: {}.\n\nThis is a bug in the provider, which should be reported in the provider's own issue tracker.",
        .problems.join("; ")
    )]
    InconsistentResult {
        /// Provider address.
        provider: String,
        /// Resource instance address.
        address: String,
        /// Individual problems found.
        problems: Vec<String>,
    },

    /// Errors deliberately reported by the provider.
    #[error("{address}: {diagnostics}")]
    Diagnostics {
        /// Resource instance address the diagnostics are attributed to.
        address: String,
        /// The provider's diagnostics, verbatim.
        diagnostics: Diagnostics,
    },
}

/// Planning invariant violations.
#[derive(Debug, Error)]
pub enum PlanError {
    /// A change's Before/After values disagree with its action.
    #[error("Inconsistent {action} change for {address}: {reason}")]
    InconsistentChange {
        /// Resource instance address.
        address: String,
        /// The change's action.
        action: String,
        /// What is inconsistent.
        reason: String,
    },

    /// A change was written under a different address or generation.
    #[error("Inconsistent address and/or deposed key in change: expected {expected}, found {found}")]
    AddressMismatch {
        /// Expected address and generation.
        expected: String,
        /// Address and generation found on the change.
        found: String,
    },

    /// A change was required but none is recorded.
    #[error("No planned change recorded for {address}")]
    MissingChange {
        /// Resource instance address.
        address: String,
    },
}

/// Lifecycle policy violations.
#[derive(Debug, Error)]
pub enum PolicyError {
    /// The plan would destroy an instance that forbids destruction.
    #[error(
        "Instance cannot be destroyed: resource {address} has lifecycle.prevent_destroy set, but the plan calls for this resource to be destroyed. To avoid this error and continue with the plan, either disable lifecycle.prevent_destroy or reduce the scope of the plan to exclude this resource."
    )]
    PreventDestroy {
        /// Resource instance address.
        address: String,
    },
}

/// Errors raised by hooks.
#[derive(Debug, Error)]
pub enum HookError {
    /// A hook asked for the operation to stop.
    #[error("Operation on {address} halted by hook during {stage}")]
    Halted {
        /// Resource instance address.
        address: String,
        /// Hook stage that halted.
        stage: String,
    },
}

/// Result type alias for lifecycle operations.
pub type Result<T> = std::result::Result<T, LifecycleError>;

impl LifecycleError {
    /// Creates a new internal error with the given message.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Returns true if retrying the whole operation may succeed.
    ///
    /// Nothing in this crate retries on its own.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::State(StateError::LockFailed { .. } | StateError::LockedByOther { .. })
        )
    }

    /// Returns true if the error indicates a defect in a provider.
    #[must_use]
    pub const fn is_provider_bug(&self) -> bool {
        match self {
            Self::Provider(err) => err.is_provider_bug(),
            _ => false,
        }
    }
}

impl ConfigError {
    /// Creates a validation error for a specific field.
    #[must_use]
    pub fn validation(message: impl Into<String>, field: impl Into<String>) -> Self {
        Self::ValidationError {
            message: message.into(),
            field: Some(field.into()),
        }
    }

    /// Creates a validation error without a specific field.
    #[must_use]
    pub fn validation_general(message: impl Into<String>) -> Self {
        Self::ValidationError {
            message: message.into(),
            field: None,
        }
    }

    /// Creates an evaluation error for the given instance.
    #[must_use]
    pub fn evaluation(address: impl ToString, message: impl Into<String>) -> Self {
        Self::Evaluation {
            address: address.to_string(),
            message: message.into(),
        }
    }
}

impl StateError {
    /// Creates a storage error with the given message.
    #[must_use]
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
        }
    }

    /// Creates a serialization error with the given message.
    #[must_use]
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::SerializationError {
            message: message.into(),
        }
    }
}

impl ProviderError {
    /// Returns true if this error is a contract violation rather than a
    /// deliberate provider or configuration error.
    #[must_use]
    pub const fn is_provider_bug(&self) -> bool {
        matches!(
            self,
            Self::InvalidObject { .. }
                | Self::InvalidPlan { .. }
                | Self::NilResponse { .. }
                | Self::InvalidReplacePath { .. }
                | Self::InconsistentResult { .. }
        )
    }

    /// Wraps provider diagnostics attributed to an instance.
    #[must_use]
    pub fn diagnostics(address: impl ToString, diagnostics: Diagnostics) -> Self {
        Self::Diagnostics {
            address: address.to_string(),
            diagnostics,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::Diagnostic;

    #[test]
    fn test_provider_bug_classification() {
        let bug = LifecycleError::from(ProviderError::NilResponse {
            provider: String::from("test"),
            address: String::from("a.b"),
            operation: String::from("PlanResourceChange"),
        });
        assert!(bug.is_provider_bug());

        let mut diags = Diagnostics::new();
        diags.push(Diagnostic::error("quota exceeded", "too many instances"));
        let deliberate = LifecycleError::from(ProviderError::diagnostics("a.b", diags));
        assert!(!deliberate.is_provider_bug());
        assert!(deliberate.to_string().contains("quota exceeded"));
    }

    #[test]
    fn test_invalid_plan_message_lists_problems() {
        let err = ProviderError::InvalidPlan {
            provider: String::from("registry/test"),
            address: String::from("a.b"),
            problems: vec![String::from(".name: planned value does not match config")],
        };
        let msg = err.to_string();
        assert!(msg.contains(".name: planned value does not match config"));
        assert!(msg.contains("bug in the provider"));
    }

    #[test]
    fn test_retryable() {
        let err = LifecycleError::from(StateError::LockFailed {
            message: String::from("busy"),
        });
        assert!(err.is_retryable());
        assert!(!LifecycleError::internal("x").is_retryable());
    }
}
