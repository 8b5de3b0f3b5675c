//! Ignore-changes transformer.
//!
//! Rewrites a configuration value so that attributes the user asked to
//! ignore keep their prior values. A path ending in a map key ignores only
//! that key; the rest of the map stays as configured.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::trace;

use crate::value::{Path, Value};

/// Which changes to ignore for a resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawIgnoreChanges", into = "RawIgnoreChanges")]
pub enum IgnoreChanges {
    /// Ignore every change: the prior value always wins.
    All,
    /// Ignore changes at the given attribute paths.
    Paths(Vec<Path>),
}

/// On-disk form: the keyword `all` or a list of paths.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum RawIgnoreChanges {
    Keyword(String),
    Paths(Vec<Path>),
}

impl Default for IgnoreChanges {
    fn default() -> Self {
        Self::Paths(Vec::new())
    }
}

impl IgnoreChanges {
    /// Returns true if nothing is ignored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Paths(paths) if paths.is_empty())
    }
}

impl TryFrom<RawIgnoreChanges> for IgnoreChanges {
    type Error = String;

    fn try_from(raw: RawIgnoreChanges) -> Result<Self, Self::Error> {
        match raw {
            RawIgnoreChanges::Keyword(k) if k == "all" => Ok(Self::All),
            RawIgnoreChanges::Keyword(k) => Err(format!(
                "invalid ignore_changes keyword {k:?}: expected \"all\" or a list of attribute paths"
            )),
            RawIgnoreChanges::Paths(paths) => Ok(Self::Paths(paths)),
        }
    }
}

impl From<IgnoreChanges> for RawIgnoreChanges {
    fn from(value: IgnoreChanges) -> Self {
        match value {
            IgnoreChanges::All => Self::Keyword(String::from("all")),
            IgnoreChanges::Paths(paths) => Self::Paths(paths),
        }
    }
}

/// A recorded substitution: keep `value` at `path`, or only its `key`
/// element when the ignored path ended in a map key.
struct IgnoredValue {
    path: Path,
    value: Value,
    key: Option<String>,
}

/// Applies ignore-changes policy to an unmarked configuration value.
///
/// Returns the configuration unchanged when there is no prior object, since
/// nothing can be ignored before the object exists.
#[must_use]
pub fn process_ignore_changes(prior: &Value, config: &Value, ignore: &IgnoreChanges) -> Value {
    if prior.is_null() {
        return config.clone();
    }
    match ignore {
        IgnoreChanges::All => prior.clone(),
        IgnoreChanges::Paths(paths) if paths.is_empty() || config.is_null() => config.clone(),
        IgnoreChanges::Paths(paths) => process_ignore_changes_individual(prior, config, paths),
    }
}

fn process_ignore_changes_individual(prior: &Value, config: &Value, paths: &[Path]) -> Value {
    let mut ignored = Vec::new();

    for path in paths {
        let (path, key) = path.split_trailing_key();

        // Intermediate steps that do not resolve cannot be substituted.
        let Ok(p) = path.apply(prior) else {
            continue;
        };
        let Ok(c) = path.apply(config) else {
            continue;
        };

        // Maps are compared whole; an unchanged key is rewritten to itself.
        if p.equals(&c) == Some(false) {
            trace!("ignoring changes at {path}");
            ignored.push(IgnoredValue { path, value: p, key });
        }
    }

    if ignored.is_empty() {
        return config.clone();
    }

    config.clone().transform(&mut |path: &Path, v: Value| {
        let matching: Vec<&IgnoredValue> = ignored.iter().filter(|i| &i.path == path).collect();
        if matching.is_empty() {
            return v;
        }

        let is_map = matches!(v, Value::Map(_))
            || (v.is_null() && matching.iter().any(|i| i.key.is_some()));
        if !is_map {
            return matching[0].value.clone();
        }

        let mut config_map = match v {
            Value::Map(entries) => entries,
            _ => BTreeMap::new(),
        };

        for entry in matching {
            let Some(key) = &entry.key else {
                return entry.value.clone();
            };
            match &entry.value {
                Value::Map(prior_map) if prior_map.contains_key(key) => {
                    config_map.insert(key.clone(), prior_map[key].clone());
                }
                _ => {
                    config_map.remove(key);
                }
            }
        }

        Value::Map(config_map)
    })
}
