//! Lifecycle hooks.
//!
//! Hooks observe each step of refresh, plan and apply for an instance and
//! may halt the operation. Every callback defaults to continuing.

use std::fmt;

use crate::addrs::{Generation, ResourceInstanceAddr};
use crate::planner::Action;
use crate::value::{MarkedValue, Value};

/// What a hook wants the engine to do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HookAction {
    /// Carry on with the operation.
    #[default]
    Continue,
    /// Abort the operation with a hook error.
    Halt,
}

/// The point in the lifecycle at which a hook runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookStage {
    /// Before reading the live object.
    PreRefresh,
    /// After reading the live object.
    PostRefresh,
    /// Before asking the provider for a plan.
    PreDiff,
    /// After deciding the planned action.
    PostDiff,
    /// Before applying a change.
    PreApply,
    /// After applying a change.
    PostApply,
}

/// Observer of per-instance lifecycle events.
#[allow(unused_variables)]
pub trait Hook: Send + Sync {
    /// Called before the provider reads the object.
    fn pre_refresh(&self, addr: &ResourceInstanceAddr, generation: &Generation, prior: &MarkedValue) -> HookAction {
        HookAction::Continue
    }

    /// Called with the unmarked prior and refreshed values.
    fn post_refresh(
        &self,
        addr: &ResourceInstanceAddr,
        generation: &Generation,
        prior: &Value,
        new: &Value,
    ) -> HookAction {
        HookAction::Continue
    }

    /// Called with the prior value and the proposed new value.
    fn pre_diff(
        &self,
        addr: &ResourceInstanceAddr,
        generation: &Generation,
        prior: &MarkedValue,
        proposed: &Value,
    ) -> HookAction {
        HookAction::Continue
    }

    /// Called once the action is decided.
    fn post_diff(
        &self,
        addr: &ResourceInstanceAddr,
        generation: &Generation,
        action: Action,
        prior: &MarkedValue,
        planned: &MarkedValue,
    ) -> HookAction {
        HookAction::Continue
    }

    /// Called before the provider applies a change.
    fn pre_apply(
        &self,
        addr: &ResourceInstanceAddr,
        generation: &Generation,
        action: Action,
        prior: &MarkedValue,
        planned: &MarkedValue,
    ) -> HookAction {
        HookAction::Continue
    }

    /// Called with the applied value, or null after a delete, and the
    /// provider's error if there was one.
    fn post_apply(
        &self,
        addr: &ResourceInstanceAddr,
        generation: &Generation,
        new: &MarkedValue,
        error: Option<&str>,
    ) -> HookAction {
        HookAction::Continue
    }
}

impl fmt::Display for HookStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::PreRefresh => "pre-refresh",
            Self::PostRefresh => "post-refresh",
            Self::PreDiff => "pre-diff",
            Self::PostDiff => "post-diff",
            Self::PreApply => "pre-apply",
            Self::PostApply => "post-apply",
        };
        f.write_str(name)
    }
}
