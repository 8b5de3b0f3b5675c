//! Addressing for resources, resource instances and deposed objects.
//!
//! Addresses are rendered and parsed in the familiar `type.name[key]` form,
//! e.g. `compute_instance.web`, `compute_instance.web[0]` or
//! `compute_instance.web["blue"]`.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::ConfigError;

/// Address of a resource in configuration, without an instance key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ResourceAddr {
    /// Resource type, as understood by the owning provider.
    pub resource_type: String,
    /// Resource name, unique per type.
    pub name: String,
}

/// Instance key distinguishing multiple instances of one resource.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstanceKey {
    /// Index produced by a `count`-style repetition.
    Int(i64),
    /// Key produced by a `for_each`-style repetition.
    Str(String),
}

/// Absolute address of one resource instance.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ResourceInstanceAddr {
    /// Containing resource.
    pub resource: ResourceAddr,
    /// Instance key, if the resource is repeated.
    pub key: Option<InstanceKey>,
}

/// Identifier of a deposed object retained during create-before-destroy.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeposedKey(String);

/// Which object of an instance a record refers to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Generation {
    /// The current object.
    Current,
    /// A specific deposed object.
    Deposed(DeposedKey),
}

impl ResourceAddr {
    /// Creates a resource address.
    #[must_use]
    pub fn new(resource_type: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            resource_type: resource_type.into(),
            name: name.into(),
        }
    }

    /// Returns the address of the instance with the given key.
    #[must_use]
    pub fn instance(&self, key: Option<InstanceKey>) -> ResourceInstanceAddr {
        ResourceInstanceAddr {
            resource: self.clone(),
            key,
        }
    }
}

impl ResourceInstanceAddr {
    /// Creates the address of a resource's single, unkeyed instance.
    #[must_use]
    pub fn new(resource_type: impl Into<String>, name: impl Into<String>) -> Self {
        ResourceAddr::new(resource_type, name).instance(None)
    }

    /// Returns a copy of this address with the given instance key.
    #[must_use]
    pub fn with_key(mut self, key: InstanceKey) -> Self {
        self.key = Some(key);
        self
    }

    /// Returns the resource type.
    #[must_use]
    pub fn resource_type(&self) -> &str {
        &self.resource.resource_type
    }
}

impl DeposedKey {
    /// Generates a fresh, random deposed key of eight hex digits.
    #[must_use]
    pub fn generate() -> Self {
        let id = Uuid::new_v4().simple().to_string();
        Self(id[..8].to_string())
    }

    /// Returns the key as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for DeposedKey {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl Generation {
    /// Returns the generation for an optional deposed key.
    #[must_use]
    pub fn from_deposed(key: Option<DeposedKey>) -> Self {
        match key {
            Some(key) => Self::Deposed(key),
            None => Self::Current,
        }
    }
}

impl fmt::Display for ResourceAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.resource_type, self.name)
    }
}

impl fmt::Display for InstanceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(i) => write!(f, "[{i}]"),
            Self::Str(s) => write!(f, "[{s:?}]"),
        }
    }
}

impl fmt::Display for ResourceInstanceAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.resource)?;
        if let Some(key) = &self.key {
            write!(f, "{key}")?;
        }
        Ok(())
    }
}

impl fmt::Display for DeposedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for Generation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Current => f.write_str("current"),
            Self::Deposed(key) => write!(f, "deposed object {key}"),
        }
    }
}

fn is_valid_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

fn invalid_address(input: &str, reason: &str) -> ConfigError {
    ConfigError::InvalidAddress {
        address: input.to_string(),
        reason: reason.to_string(),
    }
}

impl FromStr for ResourceAddr {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (resource_type, name) = s
            .split_once('.')
            .ok_or_else(|| invalid_address(s, "expected <type>.<name>"))?;

        if !is_valid_identifier(resource_type) {
            return Err(invalid_address(s, "invalid resource type"));
        }
        if !is_valid_identifier(name) {
            return Err(invalid_address(s, "invalid resource name"));
        }

        Ok(Self::new(resource_type, name))
    }
}

impl FromStr for ResourceInstanceAddr {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let Some(open) = s.find('[') else {
            return Ok(s.parse::<ResourceAddr>()?.instance(None));
        };

        let resource: ResourceAddr = s[..open].parse()?;
        let inner = s[open..]
            .strip_prefix('[')
            .and_then(|rest| rest.strip_suffix(']'))
            .ok_or_else(|| invalid_address(s, "unterminated instance key"))?;

        let key = if let Some(quoted) = inner.strip_prefix('"').and_then(|r| r.strip_suffix('"')) {
            InstanceKey::Str(quoted.to_string())
        } else {
            let index = inner
                .parse::<i64>()
                .map_err(|_| invalid_address(s, "instance key must be an integer or a quoted string"))?;
            InstanceKey::Int(index)
        };

        Ok(resource.instance(Some(key)))
    }
}

impl TryFrom<String> for ResourceAddr {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ResourceAddr> for String {
    fn from(value: ResourceAddr) -> Self {
        value.to_string()
    }
}

impl TryFrom<String> for ResourceInstanceAddr {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ResourceInstanceAddr> for String {
    fn from(value: ResourceInstanceAddr) -> Self {
        value.to_string()
    }
}
