//! Structural types for attribute values.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// The structural type of a [`super::Value`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Type {
    /// Boolean.
    Bool,
    /// Number.
    Number,
    /// String.
    String,
    /// Ordered sequence of elements of one type.
    List(Box<Type>),
    /// Unordered collection of distinct elements of one type.
    Set(Box<Type>),
    /// String-keyed collection of elements of one type.
    Map(Box<Type>),
    /// Fixed set of named attributes, each with its own type.
    Object(BTreeMap<String, Type>),
    /// Any type; decided by the value at runtime.
    Dynamic,
}

impl Type {
    /// Creates a list type.
    #[must_use]
    pub fn list(element: Self) -> Self {
        Self::List(Box::new(element))
    }

    /// Creates a set type.
    #[must_use]
    pub fn set(element: Self) -> Self {
        Self::Set(Box::new(element))
    }

    /// Creates a map type.
    #[must_use]
    pub fn map(element: Self) -> Self {
        Self::Map(Box::new(element))
    }

    /// Creates an object type from `(name, type)` pairs.
    #[must_use]
    pub fn object<I, S>(attrs: I) -> Self
    where
        I: IntoIterator<Item = (S, Self)>,
        S: Into<String>,
    {
        Self::Object(attrs.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    /// Returns true for map types.
    #[must_use]
    pub const fn is_map(&self) -> bool {
        matches!(self, Self::Map(_))
    }

    /// Returns the element type of a collection type.
    #[must_use]
    pub fn element_type(&self) -> Option<&Self> {
        match self {
            Self::List(e) | Self::Set(e) | Self::Map(e) => Some(e),
            _ => None,
        }
    }

    /// Returns the type of a named attribute of an object type.
    #[must_use]
    pub fn attribute_type(&self, name: &str) -> Option<&Self> {
        match self {
            Self::Object(attrs) => attrs.get(name),
            _ => None,
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool => f.write_str("bool"),
            Self::Number => f.write_str("number"),
            Self::String => f.write_str("string"),
            Self::List(e) => write!(f, "list of {e}"),
            Self::Set(e) => write!(f, "set of {e}"),
            Self::Map(e) => write!(f, "map of {e}"),
            Self::Object(_) => f.write_str("object"),
            Self::Dynamic => f.write_str("dynamic"),
        }
    }
}
