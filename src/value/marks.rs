//! Out-of-band value marks.
//!
//! Marks such as sensitivity live in a side table keyed by [`Path`] rather
//! than inside the value tree. They must be stripped before a value crosses
//! the provider boundary and re-applied at the same paths afterwards; they
//! never take part in value equality.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use super::model::Value;
use super::path::{Path, PathSet};

/// An annotation attached to a value at a path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mark {
    /// The value must not be displayed.
    Sensitive,
}

/// Side table of marks, keyed by path.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ValueMarks(BTreeMap<Path, BTreeSet<Mark>>);

/// A value together with its marks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarkedValue {
    /// The unmarked value.
    pub value: Value,
    /// Marks applying to paths within `value`.
    #[serde(default, skip_serializing_if = "ValueMarks::is_empty")]
    pub marks: ValueMarks,
}

impl ValueMarks {
    /// Creates an empty table.
    #[must_use]
    pub const fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Creates a table marking every given path sensitive.
    #[must_use]
    pub fn sensitive<'a, I: IntoIterator<Item = &'a Path>>(paths: I) -> Self {
        let mut marks = Self::new();
        for path in paths {
            marks.mark(path.clone(), Mark::Sensitive);
        }
        marks
    }

    /// Adds a mark at a path.
    pub fn mark(&mut self, path: Path, mark: Mark) {
        self.0.entry(path).or_default().insert(mark);
    }

    /// Adds every mark of `other`.
    pub fn merge(&mut self, other: &Self) {
        for (path, marks) in &other.0 {
            self.0.entry(path.clone()).or_default().extend(marks.iter().copied());
        }
    }

    /// Returns true if no path is marked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns the number of marked paths.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns the marks at exactly `path`.
    #[must_use]
    pub fn get(&self, path: &Path) -> Option<&BTreeSet<Mark>> {
        self.0.get(path)
    }

    /// Returns true if `path` carries `mark`.
    #[must_use]
    pub fn has(&self, path: &Path, mark: Mark) -> bool {
        self.0.get(path).is_some_and(|m| m.contains(&mark))
    }

    /// Returns the marked paths.
    #[must_use]
    pub fn paths(&self) -> PathSet {
        self.0.keys().cloned().collect()
    }

    /// Iterates over `(path, marks)` pairs in path order.
    pub fn iter(&self) -> impl Iterator<Item = (&Path, &BTreeSet<Mark>)> {
        self.0.iter()
    }
}

impl MarkedValue {
    /// Wraps a value with no marks.
    #[must_use]
    pub fn new(value: Value) -> Self {
        Self {
            value,
            marks: ValueMarks::new(),
        }
    }

    /// Wraps a null value with no marks.
    #[must_use]
    pub fn null() -> Self {
        Self::new(Value::Null)
    }

    /// Returns true if the value is null.
    #[must_use]
    pub const fn is_null(&self) -> bool {
        self.value.is_null()
    }

    /// Returns true if any path is marked.
    #[must_use]
    pub fn is_marked(&self) -> bool {
        !self.marks.is_empty()
    }

    /// Separates the value from its marks, copying both.
    #[must_use]
    pub fn unmark_deep_with_paths(&self) -> (Value, ValueMarks) {
        (self.value.clone(), self.marks.clone())
    }

    /// Separates the value from its marks.
    #[must_use]
    pub fn into_parts(self) -> (Value, ValueMarks) {
        (self.value, self.marks)
    }
}

impl Value {
    /// Attaches marks to this value.
    ///
    /// Only marks whose path still resolves within the value are kept.
    #[must_use]
    pub fn mark_with_paths(self, marks: &ValueMarks) -> MarkedValue {
        let mut kept = ValueMarks::new();
        for (path, set) in marks.iter() {
            if path.apply(&self).is_ok() {
                for mark in set {
                    kept.mark(path.clone(), *mark);
                }
            }
        }
        MarkedValue {
            value: self,
            marks: kept,
        }
    }
}

impl From<Value> for MarkedValue {
    fn from(value: Value) -> Self {
        Self::new(value)
    }
}

impl fmt::Display for Mark {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sensitive => f.write_str("sensitive"),
        }
    }
}
