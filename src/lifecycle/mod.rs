//! Resource instance lifecycle engine.
//!
//! This module drives one resource instance at a time through refresh,
//! plan and apply:
//! - Reading the live object and carrying marks across the provider call
//! - Planning the change that reconciles the object with configuration
//! - Applying planned changes and destroy plans
//! - Committing objects and changes to the state and change set

mod context;
mod hooks;
mod instance;
mod outcome;

pub use context::EvalContext;
pub use hooks::{Hook, HookAction, HookStage};
pub use instance::ResourceInstanceNode;
pub use outcome::{ApplyOutcome, PhaseState, PlanOutcome, RefreshOutcome};
