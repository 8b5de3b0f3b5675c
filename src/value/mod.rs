//! Attribute-path value model.
//!
//! This module provides the typed, tree-shaped [`Value`] with null and
//! unknown support, the [`Path`] addressing scheme, and the [`ValueMarks`]
//! side table used to carry sensitivity across the provider boundary.

mod marks;
mod model;
mod path;
mod types;

pub use marks::{Mark, MarkedValue, ValueMarks};
pub use model::Value;
pub use path::{Path, PathError, PathSet, PathStep};
pub use types::Type;
