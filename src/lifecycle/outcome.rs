//! Results of lifecycle operations.

use crate::error::{LifecycleError, Result};
use crate::planner::ResourceInstanceChange;
use crate::provider::Diagnostics;
use crate::state::ResourceInstanceObject;

/// Which state a write targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PhaseState {
    /// The working state that plan and apply read and write.
    #[default]
    Working,
    /// The separate state holding refresh-only results.
    Refresh,
}

/// Result of refreshing an instance.
#[derive(Debug, Clone, PartialEq)]
pub struct RefreshOutcome {
    /// The refreshed object, or `None` if there was nothing to refresh.
    pub object: Option<ResourceInstanceObject>,
    /// Provider warnings and tolerated drift.
    pub warnings: Diagnostics,
}

/// Result of planning an instance.
#[derive(Debug, Clone, PartialEq)]
pub struct PlanOutcome {
    /// The planned change.
    pub change: ResourceInstanceChange,
    /// Provisional object with status `Planned`. Readers must consult
    /// `change` instead of its value.
    pub planned: ResourceInstanceObject,
    /// Provider warnings and tolerated inconsistencies.
    pub warnings: Diagnostics,
}

/// Result of applying a change.
///
/// A provider may fail part-way through and still return the object it
/// created, so `object` is meaningful even when `error` is set and should
/// be written to state before the error is reported.
#[derive(Debug)]
pub struct ApplyOutcome {
    /// The resulting object, or `None` once deleted.
    pub object: Option<ResourceInstanceObject>,
    /// Provider warnings and tolerated inconsistencies.
    pub warnings: Diagnostics,
    /// Errors reported by the provider.
    pub error: Option<LifecycleError>,
}

impl RefreshOutcome {
    pub(crate) fn unchanged(object: Option<&ResourceInstanceObject>) -> Self {
        Self {
            object: object.cloned(),
            warnings: Diagnostics::new(),
        }
    }
}

impl ApplyOutcome {
    /// Returns true if the provider reported an error.
    #[must_use]
    pub const fn is_err(&self) -> bool {
        self.error.is_some()
    }

    /// Converts into the resulting object, or the provider's error.
    ///
    /// # Errors
    ///
    /// Returns the provider's error if it reported one.
    pub fn into_result(self) -> Result<Option<ResourceInstanceObject>> {
        match self.error {
            Some(err) => Err(err),
            None => Ok(self.object),
        }
    }
}
