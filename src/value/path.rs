//! Attribute paths into values.
//!
//! A [`Path`] is a sequence of steps: an attribute name, a list index, or a
//! map key. Paths are written in traversal syntax, e.g. `tags["Name"]`,
//! `network[0].address` or the legacy dotted form `network.0.address`.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ConfigError;

use super::Value;

/// One step of a [`Path`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PathStep {
    /// Object attribute by name.
    Attr(String),
    /// List element by position.
    Index(usize),
    /// Map element by key.
    Key(String),
}

/// A path addressing a nested value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Path(Vec<PathStep>);

/// Error produced when a path cannot be applied to a value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathError {
    /// The path prefix at which resolution failed.
    pub path: Path,
    /// Why resolution failed.
    pub message: String,
}

/// Ordered collection of distinct paths.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PathSet(Vec<Path>);

impl Path {
    /// Returns the empty path, addressing the whole value.
    #[must_use]
    pub const fn root() -> Self {
        Self(Vec::new())
    }

    /// Creates a path from steps.
    #[must_use]
    pub const fn from_steps(steps: Vec<PathStep>) -> Self {
        Self(steps)
    }

    /// Creates a single-attribute path.
    #[must_use]
    pub fn attr(name: impl Into<String>) -> Self {
        Self(vec![PathStep::Attr(name.into())])
    }

    /// Returns a copy of this path extended with an attribute step.
    #[must_use]
    pub fn get_attr(&self, name: impl Into<String>) -> Self {
        self.child(PathStep::Attr(name.into()))
    }

    /// Returns a copy of this path extended with a list index step.
    #[must_use]
    pub fn index(&self, index: usize) -> Self {
        self.child(PathStep::Index(index))
    }

    /// Returns a copy of this path extended with a map key step.
    #[must_use]
    pub fn key(&self, key: impl Into<String>) -> Self {
        self.child(PathStep::Key(key.into()))
    }

    /// Returns a copy of this path extended with `step`.
    #[must_use]
    pub fn child(&self, step: PathStep) -> Self {
        let mut steps = Vec::with_capacity(self.0.len() + 1);
        steps.extend_from_slice(&self.0);
        steps.push(step);
        Self(steps)
    }

    /// Returns the steps of this path.
    #[must_use]
    pub fn steps(&self) -> &[PathStep] {
        &self.0
    }

    /// Returns true for the root path.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns the number of steps.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Splits off a trailing map-key step, if there is one.
    #[must_use]
    pub fn split_trailing_key(&self) -> (Self, Option<String>) {
        match self.0.split_last() {
            Some((PathStep::Key(key), parent)) => (Self(parent.to_vec()), Some(key.clone())),
            _ => (self.clone(), None),
        }
    }

    /// Resolves this path against `value`.
    ///
    /// Steps through an unknown value resolve to unknown. Steps through null,
    /// into missing attributes, or of the wrong kind are errors.
    ///
    /// # Errors
    ///
    /// Returns a [`PathError`] naming the prefix at which resolution failed.
    pub fn apply(&self, value: &Value) -> Result<Value, PathError> {
        let mut current = value;
        for (depth, step) in self.0.iter().enumerate() {
            if current.is_unknown() {
                return Ok(Value::Unknown);
            }
            let fail = |message: String| PathError {
                path: Self(self.0[..=depth].to_vec()),
                message,
            };
            current = match (step, current) {
                (_, Value::Null) => {
                    return Err(fail(String::from("cannot traverse a null value")));
                }
                (PathStep::Attr(name), Value::Object(attrs)) => attrs
                    .get(name)
                    .ok_or_else(|| fail(format!("unsupported attribute {name:?}")))?,
                (PathStep::Index(i), Value::List(items)) => items
                    .get(*i)
                    .ok_or_else(|| fail(format!("index {i} out of range")))?,
                (PathStep::Key(key), Value::Map(entries)) => entries
                    .get(key)
                    .ok_or_else(|| fail(format!("map has no element for key {key:?}")))?,
                (step, other) => {
                    return Err(fail(format!(
                        "cannot apply {} to a {} value",
                        step.describe(),
                        other.kind()
                    )));
                }
            };
        }
        Ok(current.clone())
    }
}

impl PathStep {
    const fn describe(&self) -> &'static str {
        match self {
            Self::Attr(_) => "an attribute step",
            Self::Index(_) => "an index step",
            Self::Key(_) => "a key step",
        }
    }
}

impl PathSet {
    /// Creates an empty set.
    #[must_use]
    pub const fn new() -> Self {
        Self(Vec::new())
    }

    /// Adds a path if it is not already present. Returns true if added.
    pub fn insert(&mut self, path: Path) -> bool {
        if self.0.contains(&path) {
            return false;
        }
        self.0.push(path);
        true
    }

    /// Returns true if the set contains `path`.
    #[must_use]
    pub fn contains(&self, path: &Path) -> bool {
        self.0.contains(path)
    }

    /// Returns true if the set is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns the number of paths.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Iterates over the paths in insertion order.
    pub fn iter(&self) -> std::slice::Iter<'_, Path> {
        self.0.iter()
    }
}

impl FromIterator<Path> for PathSet {
    fn from_iter<I: IntoIterator<Item = Path>>(iter: I) -> Self {
        let mut set = Self::new();
        for path in iter {
            set.insert(path);
        }
        set
    }
}

impl<'a> IntoIterator for &'a PathSet {
    type Item = &'a Path;
    type IntoIter = std::slice::Iter<'a, Path>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, step) in self.0.iter().enumerate() {
            match step {
                PathStep::Attr(name) if i == 0 => f.write_str(name)?,
                PathStep::Attr(name) => write!(f, ".{name}")?,
                PathStep::Index(idx) => write!(f, "[{idx}]")?,
                PathStep::Key(key) => {
                    let quoted = serde_json::to_string(key).map_err(|_| fmt::Error)?;
                    write!(f, "[{quoted}]")?;
                }
            }
        }
        Ok(())
    }
}

impl fmt::Display for PathError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.path.is_empty() {
            f.write_str(&self.message)
        } else {
            write!(f, "{}: {}", self.path, self.message)
        }
    }
}

impl std::error::Error for PathError {}

fn invalid_path(input: &str, reason: &str) -> ConfigError {
    ConfigError::InvalidPath {
        path: input.to_string(),
        reason: reason.to_string(),
    }
}

/// Splits a JSON string literal off the front of `rest`, honouring
/// backslash escapes, and returns the decoded key with the remainder.
fn take_quoted_key(rest: &str) -> Option<(String, &str)> {
    let mut escaped = false;
    for (i, c) in rest.char_indices().skip(1) {
        match c {
            _ if escaped => escaped = false,
            '\\' => escaped = true,
            '"' => {
                let key = serde_json::from_str(&rest[..=i]).ok()?;
                return Some((key, &rest[i + 1..]));
            }
            _ => {}
        }
    }
    None
}

fn take_identifier(rest: &str) -> (&str, &str) {
    let end = rest
        .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_' || c == '-'))
        .unwrap_or(rest.len());
    rest.split_at(end)
}

impl FromStr for Path {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().is_empty() {
            return Ok(Self::root());
        }
        let (root, mut rest) = take_identifier(s.trim());
        if root.is_empty() || root.starts_with(|c: char| c.is_ascii_digit()) {
            return Err(invalid_path(s, "a path must start with an attribute name"));
        }
        let mut steps = vec![PathStep::Attr(root.to_string())];

        while !rest.is_empty() {
            if let Some(after_dot) = rest.strip_prefix('.') {
                let (segment, remainder) = take_identifier(after_dot);
                if segment.is_empty() {
                    return Err(invalid_path(s, "empty attribute name"));
                }
                match segment.parse::<usize>() {
                    Ok(index) => steps.push(PathStep::Index(index)),
                    Err(_) => steps.push(PathStep::Attr(segment.to_string())),
                }
                rest = remainder;
            } else if let Some(after_bracket) = rest.strip_prefix('[') {
                let after_bracket = after_bracket.trim_start();
                if after_bracket.starts_with('"') {
                    let (key, remainder) =
                        take_quoted_key(after_bracket).ok_or_else(|| invalid_path(s, "malformed quoted key"))?;
                    rest = remainder
                        .trim_start()
                        .strip_prefix(']')
                        .ok_or_else(|| invalid_path(s, "unterminated index"))?;
                    steps.push(PathStep::Key(key));
                    continue;
                }
                let close = after_bracket
                    .find(']')
                    .ok_or_else(|| invalid_path(s, "unterminated index"))?;
                let index = after_bracket[..close]
                    .trim()
                    .parse::<usize>()
                    .map_err(|_| invalid_path(s, "index must be a number or a quoted key"))?;
                steps.push(PathStep::Index(index));
                rest = &after_bracket[close + 1..];
            } else {
                return Err(invalid_path(s, "unexpected character"));
            }
        }

        Ok(Self(steps))
    }
}

impl TryFrom<String> for Path {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Path> for String {
    fn from(value: Path) -> Self {
        value.to_string()
    }
}
