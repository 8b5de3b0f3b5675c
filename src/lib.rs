// ============================================================================
// Strict linting - Dangerous or non-idiomatic practices are forbidden
// ============================================================================

#![deny(warnings)]                    // All warnings are treated as errors
#![deny(unsafe_code)]                 // Unsafe code is forbidden
#![deny(missing_docs)]                // All public items must be documented
#![deny(dead_code)]                   // Unused code is forbidden
#![deny(non_camel_case_types)]        // Types must follow CamelCase convention

// Additional strictness - Leave nothing unchecked
#![deny(unused_imports)]              // Unused imports are forbidden
#![deny(unused_variables)]            // Unused variables are forbidden
#![deny(unused_must_use)]             // Must handle Result and Option explicitly
#![deny(non_snake_case)]              // Variables and functions must be snake_case
#![deny(non_upper_case_globals)]      // Constants must be UPPER_CASE
#![deny(nonstandard_style)]           // Non-standard code style is forbidden
#![forbid(unsafe_op_in_unsafe_fn)]    // Unsafe ops in unsafe fns are forbidden

// Clippy lints (warnings only)
#![warn(clippy::all)]                 // All standard Clippy lints
#![warn(clippy::pedantic)]            // Very strict Clippy lints
#![warn(clippy::nursery)]             // Experimental lints
#![warn(clippy::unwrap_used)]         // unwrap() warning
#![warn(clippy::expect_used)]         // expect() warning
#![warn(clippy::panic)]               // panic!() warning
#![warn(clippy::print_stdout)]        // println!() warning
#![warn(clippy::todo)]                // TODO warning
#![warn(clippy::unimplemented)]       // unimplemented!() warning
#![warn(clippy::missing_const_for_fn)] // Force const when possible
#![warn(clippy::unwrap_in_result)]    // unwrap() in Result warning
#![warn(clippy::module_inception)]    // Module with same name as crate warning
#![warn(clippy::redundant_clone)]     // Useless clones warning
#![warn(clippy::shadow_unrelated)]    // Shadowing unrelated variables warning
#![warn(clippy::too_many_arguments)]  // Limit function arguments
#![warn(clippy::cognitive_complexity)] // Limit cognitive complexity

// Safety and robustness lints
#![deny(overflowing_literals)]        // Overflowing literals are forbidden
#![deny(arithmetic_overflow)]         // Arithmetic overflow is forbidden

// ============================================================================
// Crate Documentation
// ============================================================================

//! # Resource Lifecycle
//!
//! The change-planning and lifecycle state machine of a declarative
//! infrastructure provisioning engine, for one resource instance at a time.
//!
//! ## Overview
//!
//! Given a resource's configuration, its previously recorded object and a
//! provider that owns the remote resource type, the engine:
//!
//! - Refreshes the recorded object from the provider
//! - Plans the minimal change (create, update, replace, delete or no-op)
//! - Honors `ignore_changes` on individual attribute paths
//! - Carries sensitivity marks across every provider call
//! - Applies planned changes and commits objects and changes
//!
//! ## Architecture
//!
//! An external scheduler walks the dependency graph and invokes the engine
//! per instance:
//!
//! 1. **Refresh**: `ReadResource` against the recorded object
//! 2. **Plan**: evaluate configuration, merge with the prior object, ask the
//!    provider to plan, decide the action
//! 3. **Apply**: `ApplyResourceChange` for the recorded change
//!
//! Results are written back through [`lifecycle::ResourceInstanceNode`]'s
//! write helpers into a [`state::SyncState`] and a [`changes::ChangeSet`].
//!
//! ## Modules
//!
//! - [`addrs`]: Resource, instance and deposed-object addresses
//! - [`value`]: Typed values, attribute paths and marks
//! - [`schema`]: Resource type schemas
//! - [`provider`]: The provider contract
//! - [`planner`]: Planned changes and the planning algorithms
//! - [`lifecycle`]: Refresh, plan, apply and write-back
//! - [`state`]: State objects, the synchronized store and persistence
//! - [`changes`]: The change set
//! - [`config`]: Configuration parsing, validation and evaluation
//! - [`logging`]: Subscriber setup
//!
//! ## Example
//!
//! ```yaml
//! state:
//!   path: .lifecycle/state.json
//!
//! resources:
//!   - type: test_instance
//!     name: web
//!     provider: registry/test
//!     attributes:
//!       ami: ami-123456
//!       tags:
//!         Name: web
//!     sensitive:
//!       - tags["Name"]
//!     lifecycle:
//!       create_before_destroy: true
//!       ignore_changes:
//!         - tags["Owner"]
//! ```

// ============================================================================
// Modules
// ============================================================================

pub mod addrs;
pub mod changes;
pub mod config;
pub mod error;
pub mod lifecycle;
pub mod logging;
pub mod planner;
pub mod provider;
pub mod schema;
pub mod state;
pub mod value;

// ============================================================================
// Re-exports
// ============================================================================

pub use addrs::{DeposedKey, Generation, ResourceAddr, ResourceInstanceAddr};
pub use changes::ChangeSet;
pub use config::{ConfigEvaluator, ConfigParser, ConfigValidator, EngineConfig, ResourceConfig};
pub use error::{LifecycleError, Result};
pub use lifecycle::{EvalContext, Hook, PhaseState, ResourceInstanceNode};
pub use planner::{Action, ResourceInstanceChange};
pub use provider::{Diagnostics, Provider};
pub use schema::{ProviderSchema, Schema};
pub use state::{LocalStateStore, ResourceInstanceObject, StateStore, SyncState};
pub use value::{MarkedValue, Path, Value};
