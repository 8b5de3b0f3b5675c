//! Provider contract.
//!
//! The lifecycle engine drives remote objects exclusively through the
//! [`Provider`] trait: validate, read, plan and apply. Transport is the
//! implementor's concern.

mod contract;
mod diagnostics;

#[cfg(test)]
pub use contract::MockProvider;
pub use contract::{
    ApplyResourceChangeRequest, ApplyResourceChangeResponse, PlanResourceChangeRequest,
    PlanResourceChangeResponse, Provider, ReadResourceRequest, ReadResourceResponse,
    ValidateResourceConfigRequest,
};
pub use diagnostics::{Diagnostic, Diagnostics, Severity};
