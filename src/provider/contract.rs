//! The provider contract consumed by the lifecycle engine.
//!
//! Values crossing this boundary are always unmarked: callers strip marks
//! before building a request and re-apply them to the response.

use async_trait::async_trait;

use super::diagnostics::Diagnostics;
use crate::value::{PathSet, Value};

/// Request to validate a resource configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidateResourceConfigRequest {
    /// Resource type name.
    pub type_name: String,
    /// Unmarked configuration value.
    pub config: Value,
}

/// Request to read the live value of a resource.
#[derive(Debug, Clone, PartialEq)]
pub struct ReadResourceRequest {
    /// Resource type name.
    pub type_name: String,
    /// Unmarked prior value.
    pub prior_state: Value,
    /// Provider-private data from the prior object.
    pub private: Option<Vec<u8>>,
    /// Evaluated `provider_meta`, or null.
    pub provider_meta: Value,
}

/// Response to [`ReadResourceRequest`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReadResourceResponse {
    /// The refreshed value. `None` is a contract violation; a null value
    /// means the remote object no longer exists.
    pub new_state: Option<Value>,
    /// Updated provider-private data.
    pub private: Option<Vec<u8>>,
    /// Diagnostics.
    pub diagnostics: Diagnostics,
}

/// Request to plan a change.
#[derive(Debug, Clone, PartialEq)]
pub struct PlanResourceChangeRequest {
    /// Resource type name.
    pub type_name: String,
    /// Unmarked configuration value.
    pub config: Value,
    /// Unmarked prior value, null when creating.
    pub prior_state: Value,
    /// Merge of prior and configuration.
    pub proposed_new_state: Value,
    /// Provider-private data from the prior object.
    pub prior_private: Option<Vec<u8>>,
    /// Evaluated `provider_meta`, or null.
    pub provider_meta: Value,
}

/// Response to [`PlanResourceChangeRequest`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlanResourceChangeResponse {
    /// The planned value. `None` is a contract violation.
    pub planned_state: Option<Value>,
    /// Provider-private data to carry into apply.
    pub planned_private: Option<Vec<u8>>,
    /// Paths whose change forces replacement.
    pub requires_replace: PathSet,
    /// Set by providers built on the legacy type system.
    pub legacy_type_system: bool,
    /// Diagnostics.
    pub diagnostics: Diagnostics,
}

/// Request to apply a planned change.
#[derive(Debug, Clone, PartialEq)]
pub struct ApplyResourceChangeRequest {
    /// Resource type name.
    pub type_name: String,
    /// Unmarked prior value, null when creating.
    pub prior_state: Value,
    /// Unmarked planned value, null when deleting.
    pub planned_state: Value,
    /// Unmarked configuration value, null when deleting.
    pub config: Value,
    /// Provider-private data from planning.
    pub planned_private: Option<Vec<u8>>,
    /// Evaluated `provider_meta`, or null.
    pub provider_meta: Value,
}

/// Response to [`ApplyResourceChangeRequest`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ApplyResourceChangeResponse {
    /// The resulting value, null after a delete. `None` is a contract
    /// violation.
    pub new_state: Option<Value>,
    /// Provider-private data to store.
    pub private: Option<Vec<u8>>,
    /// Set by providers built on the legacy type system.
    pub legacy_type_system: bool,
    /// Diagnostics.
    pub diagnostics: Diagnostics,
}

/// A provider owning one or more resource types.
///
/// Every call is a single request/response round-trip. Implementations
/// report failures as error diagnostics rather than through `Result`.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Provider: Send + Sync {
    /// Validates a resource configuration.
    async fn validate_resource_config(&self, request: ValidateResourceConfigRequest) -> Diagnostics;

    /// Reads the live value of a resource.
    async fn read_resource(&self, request: ReadResourceRequest) -> ReadResourceResponse;

    /// Plans a change to a resource.
    async fn plan_resource_change(&self, request: PlanResourceChangeRequest) -> PlanResourceChangeResponse;

    /// Applies a planned change.
    async fn apply_resource_change(&self, request: ApplyResourceChangeRequest) -> ApplyResourceChangeResponse;
}
