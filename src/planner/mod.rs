//! Planning building blocks.
//!
//! This module holds the planned change types and the pure algorithms the
//! lifecycle engine composes while planning: the proposed-object merge, the
//! ignore-changes transformer, the replacement detector and the consistency
//! checks applied to provider responses.

mod change;
mod consistency;
mod ignore;
mod proposed;
mod replace;

pub use change::{Action, ResourceInstanceChange, ResourceInstanceChangeSrc};
pub(crate) use change::sensitive_paths;
pub use consistency::{assert_object_compatible, assert_plan_valid, test_conformance};
pub use ignore::{process_ignore_changes, IgnoreChanges};
pub use proposed::proposed_new_object;
pub use replace::changed_replace_paths;
