//! Dynamically-typed attribute values with null and unknown support.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use super::path::Path;
use super::types::Type;

/// A tree-shaped attribute value.
///
/// `Null` is the absence of a value; `Unknown` is a value that will only be
/// known after apply. Both conform to every type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Value {
    /// Absent value.
    Null,
    /// Value not yet known.
    Unknown,
    /// Boolean.
    Bool(bool),
    /// Number.
    Number(f64),
    /// String.
    String(String),
    /// Ordered sequence.
    List(Vec<Value>),
    /// Unordered collection of distinct elements.
    Set(Vec<Value>),
    /// String-keyed collection.
    Map(BTreeMap<String, Value>),
    /// Named attributes.
    Object(BTreeMap<String, Value>),
}

impl Value {
    /// Creates a string value.
    #[must_use]
    pub fn string(s: impl Into<String>) -> Self {
        Self::String(s.into())
    }

    /// Creates a number value.
    #[must_use]
    pub const fn number(n: f64) -> Self {
        Self::Number(n)
    }

    /// Creates a list value.
    #[must_use]
    pub fn list<I: IntoIterator<Item = Self>>(items: I) -> Self {
        Self::List(items.into_iter().collect())
    }

    /// Creates a set value, dropping duplicate elements.
    #[must_use]
    pub fn set<I: IntoIterator<Item = Self>>(items: I) -> Self {
        let mut out: Vec<Self> = Vec::new();
        for item in items {
            if !out.contains(&item) {
                out.push(item);
            }
        }
        Self::Set(out)
    }

    /// Creates a map value from `(key, value)` pairs.
    #[must_use]
    pub fn map<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = (S, Self)>,
        S: Into<String>,
    {
        Self::Map(entries.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    /// Creates an object value from `(name, value)` pairs.
    #[must_use]
    pub fn object<I, S>(attrs: I) -> Self
    where
        I: IntoIterator<Item = (S, Self)>,
        S: Into<String>,
    {
        Self::Object(attrs.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    /// Returns true for null.
    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Returns true if this value itself is unknown.
    #[must_use]
    pub const fn is_unknown(&self) -> bool {
        matches!(self, Self::Unknown)
    }

    /// Returns true if neither this value nor anything nested in it is unknown.
    #[must_use]
    pub fn is_wholly_known(&self) -> bool {
        match self {
            Self::Unknown => false,
            Self::List(items) | Self::Set(items) => items.iter().all(Self::is_wholly_known),
            Self::Map(entries) | Self::Object(entries) => entries.values().all(Self::is_wholly_known),
            _ => true,
        }
    }

    /// Returns a short name for the kind of value, for messages.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Unknown => "unknown",
            Self::Bool(_) => "bool",
            Self::Number(_) => "number",
            Self::String(_) => "string",
            Self::List(_) => "list",
            Self::Set(_) => "set",
            Self::Map(_) => "map",
            Self::Object(_) => "object",
        }
    }

    /// Returns a named attribute of an object value.
    #[must_use]
    pub fn get_attr(&self, name: &str) -> Option<&Self> {
        match self {
            Self::Object(attrs) => attrs.get(name),
            _ => None,
        }
    }

    /// Compares two values.
    ///
    /// Returns `None` when the result depends on an unknown value and no
    /// known part already differs.
    #[must_use]
    pub fn equals(&self, other: &Self) -> Option<bool> {
        match (self, other) {
            (Self::Unknown, _) | (_, Self::Unknown) => None,
            (Self::Null, Self::Null) => Some(true),
            (Self::Bool(a), Self::Bool(b)) => Some(a == b),
            #[allow(clippy::float_cmp)]
            (Self::Number(a), Self::Number(b)) => Some(a == b),
            (Self::String(a), Self::String(b)) => Some(a == b),
            (Self::List(a), Self::List(b)) => {
                if a.len() != b.len() {
                    return Some(false);
                }
                combine(a.iter().zip(b).map(|(x, y)| x.equals(y)))
            }
            (Self::Set(a), Self::Set(b)) => {
                if !a.iter().chain(b).all(Self::is_wholly_known) {
                    return if a.len() == b.len() { None } else { Some(false) };
                }
                Some(
                    a.len() == b.len()
                        && a.iter().all(|x| b.iter().any(|y| x.equals(y) == Some(true))),
                )
            }
            (Self::Map(a), Self::Map(b)) | (Self::Object(a), Self::Object(b)) => {
                if a.len() != b.len() || a.keys().any(|k| !b.contains_key(k)) {
                    return Some(false);
                }
                combine(a.iter().map(|(k, v)| v.equals(&b[k])))
            }
            _ => Some(false),
        }
    }

    /// Returns true only if the values are known to be equal.
    #[must_use]
    pub fn known_equal(&self, other: &Self) -> bool {
        self.equals(other) == Some(true)
    }

    /// Checks that this value conforms to `ty`, returning one message per
    /// problem found.
    #[must_use]
    pub fn conformance_errors(&self, ty: &Type) -> Vec<String> {
        let mut errs = Vec::new();
        self.check_conformance(ty, &Path::root(), &mut errs);
        errs
    }

    fn check_conformance(&self, ty: &Type, path: &Path, errs: &mut Vec<String>) {
        let mismatch = |errs: &mut Vec<String>, value: &Self| {
            errs.push(prefixed(path, &format!("{ty} required, but have {}", value.kind())));
        };
        match (ty, self) {
            (Type::Dynamic, _) | (_, Self::Null | Self::Unknown) => {}
            (Type::Bool, Self::Bool(_))
            | (Type::Number, Self::Number(_))
            | (Type::String, Self::String(_)) => {}
            (Type::List(elem), Self::List(items)) => {
                for (i, item) in items.iter().enumerate() {
                    item.check_conformance(elem, &path.index(i), errs);
                }
            }
            (Type::Set(elem), Self::Set(items)) => {
                for item in items {
                    item.check_conformance(elem, path, errs);
                }
            }
            (Type::Map(elem), Self::Map(entries)) => {
                for (k, v) in entries {
                    v.check_conformance(elem, &path.key(k.clone()), errs);
                }
            }
            (Type::Object(attr_types), Self::Object(attrs)) => {
                for (name, attr_ty) in attr_types {
                    match attrs.get(name) {
                        Some(v) => v.check_conformance(attr_ty, &path.get_attr(name.clone()), errs),
                        None => errs.push(prefixed(path, &format!("attribute {name:?} is required"))),
                    }
                }
                for name in attrs.keys().filter(|n| !attr_types.contains_key(*n)) {
                    errs.push(prefixed(path, &format!("unsupported attribute {name:?}")));
                }
            }
            (_, value) => mismatch(errs, value),
        }
    }

    /// Returns a copy with every unknown replaced by null.
    #[must_use]
    pub fn unknown_as_null(&self) -> Self {
        match self {
            Self::Unknown => Self::Null,
            Self::List(items) => Self::List(items.iter().map(Self::unknown_as_null).collect()),
            Self::Set(items) => Self::Set(items.iter().map(Self::unknown_as_null).collect()),
            Self::Map(entries) => {
                Self::Map(entries.iter().map(|(k, v)| (k.clone(), v.unknown_as_null())).collect())
            }
            Self::Object(attrs) => {
                Self::Object(attrs.iter().map(|(k, v)| (k.clone(), v.unknown_as_null())).collect())
            }
            other => other.clone(),
        }
    }

    /// Rebuilds this value bottom-up, calling `f` on every nested value
    /// after its children have been rebuilt.
    ///
    /// Set elements are visited with positional index steps.
    #[must_use]
    pub fn transform<F>(self, f: &mut F) -> Self
    where
        F: FnMut(&Path, Self) -> Self,
    {
        self.transform_at(&Path::root(), f)
    }

    fn transform_at<F>(self, path: &Path, f: &mut F) -> Self
    where
        F: FnMut(&Path, Self) -> Self,
    {
        let rebuilt = match self {
            Self::List(items) => Self::List(
                items
                    .into_iter()
                    .enumerate()
                    .map(|(i, v)| v.transform_at(&path.index(i), f))
                    .collect(),
            ),
            Self::Set(items) => Self::Set(
                items
                    .into_iter()
                    .enumerate()
                    .map(|(i, v)| v.transform_at(&path.index(i), f))
                    .collect(),
            ),
            Self::Map(entries) => Self::Map(
                entries
                    .into_iter()
                    .map(|(k, v)| {
                        let child = v.transform_at(&path.key(k.clone()), f);
                        (k, child)
                    })
                    .collect(),
            ),
            Self::Object(attrs) => Self::Object(
                attrs
                    .into_iter()
                    .map(|(k, v)| {
                        let child = v.transform_at(&path.get_attr(k.clone()), f);
                        (k, child)
                    })
                    .collect(),
            ),
            other => other,
        };
        f(path, rebuilt)
    }

    /// Converts to plain JSON. Unknown values become null.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        use serde_json::Value as Json;
        match self {
            Self::Null | Self::Unknown => Json::Null,
            Self::Bool(b) => Json::Bool(*b),
            Self::Number(n) => serde_json::Number::from_f64(*n).map_or(Json::Null, Json::Number),
            Self::String(s) => Json::String(s.clone()),
            Self::List(items) | Self::Set(items) => Json::Array(items.iter().map(Self::to_json).collect()),
            Self::Map(entries) | Self::Object(entries) => {
                Json::Object(entries.iter().map(|(k, v)| (k.clone(), v.to_json())).collect())
            }
        }
    }

    /// Decodes plain JSON according to `ty`.
    ///
    /// Object attributes missing from the JSON decode as null.
    ///
    /// # Errors
    ///
    /// Returns a message describing the first mismatch between the JSON and
    /// the type.
    pub fn from_json(json: &serde_json::Value, ty: &Type) -> Result<Self, String> {
        Self::from_json_at(json, ty, &Path::root())
    }

    fn from_json_at(json: &serde_json::Value, ty: &Type, path: &Path) -> Result<Self, String> {
        use serde_json::Value as Json;
        let mismatch = || prefixed(path, &format!("{ty} required, but have {}", json_kind(json)));
        match (ty, json) {
            (_, Json::Null) => Ok(Self::Null),
            (Type::Bool, Json::Bool(b)) => Ok(Self::Bool(*b)),
            (Type::Number, Json::Number(n)) => n.as_f64().map(Self::Number).ok_or_else(mismatch),
            (Type::String, Json::String(s)) => Ok(Self::String(s.clone())),
            (Type::List(elem), Json::Array(items)) => items
                .iter()
                .enumerate()
                .map(|(i, item)| Self::from_json_at(item, elem, &path.index(i)))
                .collect::<Result<Vec<_>, _>>()
                .map(Self::List),
            (Type::Set(elem), Json::Array(items)) => items
                .iter()
                .map(|item| Self::from_json_at(item, elem, path))
                .collect::<Result<Vec<_>, _>>()
                .map(Self::set),
            (Type::Map(elem), Json::Object(entries)) => entries
                .iter()
                .map(|(k, v)| Ok((k.clone(), Self::from_json_at(v, elem, &path.key(k.clone()))?)))
                .collect::<Result<BTreeMap<_, _>, String>>()
                .map(Self::Map),
            (Type::Object(attr_types), Json::Object(entries)) => {
                if let Some(extra) = entries.keys().find(|k| !attr_types.contains_key(*k)) {
                    return Err(prefixed(path, &format!("unsupported attribute {extra:?}")));
                }
                attr_types
                    .iter()
                    .map(|(name, attr_ty)| {
                        let attr_path = path.get_attr(name.clone());
                        let v = match entries.get(name) {
                            Some(j) => Self::from_json_at(j, attr_ty, &attr_path)?,
                            None => Self::Null,
                        };
                        Ok((name.clone(), v))
                    })
                    .collect::<Result<BTreeMap<_, _>, String>>()
                    .map(Self::Object)
            }
            (Type::Dynamic, other) => Ok(Self::from_json_dynamic(other)),
            _ => Err(mismatch()),
        }
    }

    fn from_json_dynamic(json: &serde_json::Value) -> Self {
        use serde_json::Value as Json;
        match json {
            Json::Null => Self::Null,
            Json::Bool(b) => Self::Bool(*b),
            Json::Number(n) => n.as_f64().map_or(Self::Null, Self::Number),
            Json::String(s) => Self::String(s.clone()),
            Json::Array(items) => Self::List(items.iter().map(Self::from_json_dynamic).collect()),
            Json::Object(entries) => Self::Object(
                entries
                    .iter()
                    .map(|(k, v)| (k.clone(), Self::from_json_dynamic(v)))
                    .collect(),
            ),
        }
    }
}

fn combine<I: Iterator<Item = Option<bool>>>(results: I) -> Option<bool> {
    let mut unknown = false;
    for r in results {
        match r {
            Some(false) => return Some(false),
            None => unknown = true,
            Some(true) => {}
        }
    }
    if unknown { None } else { Some(true) }
}

fn prefixed(path: &Path, message: &str) -> String {
    if path.is_empty() {
        message.to_string()
    } else {
        format!("{path}: {message}")
    }
}

const fn json_kind(json: &serde_json::Value) -> &'static str {
    match json {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "bool",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("null"),
            Self::Unknown => f.write_str("(known after apply)"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Number(n) => write!(f, "{n}"),
            Self::String(s) => write!(f, "{s:?}"),
            Self::List(items) | Self::Set(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
            Self::Map(entries) | Self::Object(entries) => {
                f.write_str("{")?;
                for (i, (k, v)) in entries.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{k} = {v}")?;
                }
                f.write_str("}")
            }
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}
