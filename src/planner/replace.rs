//! Replacement detection.
//!
//! A provider declares which attribute paths force replacement when they
//! change. Only the paths whose value actually differs between the prior
//! and planned objects are kept.

use tracing::debug;

use crate::value::{Path, PathSet, Value};

/// Filters `requires_replace` down to the paths that actually changed.
///
/// Both values must be unmarked, so a sensitivity-only difference never
/// forces replacement. A path that resolves on only one side is compared
/// against null on the other. When there is no prior object nothing can be
/// replaced and the result is empty.
///
/// # Errors
///
/// Returns the paths that resolve on neither side.
pub fn changed_replace_paths(
    prior: &Value,
    planned: &Value,
    requires_replace: &PathSet,
) -> Result<PathSet, Vec<Path>> {
    let mut changed = PathSet::new();
    let mut invalid = Vec::new();

    if prior.is_null() {
        return Ok(changed);
    }

    for path in requires_replace {
        let (prior_v, planned_v) = match (path.apply(prior), path.apply(planned)) {
            (Err(_), Err(_)) => {
                invalid.push(path.clone());
                continue;
            }
            (Ok(p), Ok(n)) => (p, n),
            (Err(err), Ok(n)) => {
                debug!("requires-replace path {path} does not resolve in prior value: {err}");
                (Value::Null, n)
            }
            (Ok(p), Err(err)) => {
                debug!("requires-replace path {path} does not resolve in planned value: {err}");
                (p, Value::Null)
            }
        };

        if planned_v.equals(&prior_v) != Some(true) {
            changed.insert(path.clone());
        }
    }

    if invalid.is_empty() {
        Ok(changed)
    } else {
        Err(invalid)
    }
}
