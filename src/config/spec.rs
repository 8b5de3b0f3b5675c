//! Engine and resource configuration types.
//!
//! This module defines the structs that map to the engine's YAML
//! configuration file: where state lives, how logging is set up, and the
//! declared resources with their lifecycle policy.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::addrs::{ResourceAddr, ResourceInstanceAddr};
use crate::planner::IgnoreChanges;
use crate::value::Path;

/// The root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct EngineConfig {
    /// State storage configuration.
    #[serde(default)]
    pub state: StateConfig,
    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Declared resources.
    #[serde(default)]
    pub resources: Vec<ResourceConfig>,
}

/// State storage configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct StateConfig {
    /// Local state file path. Defaults to `.lifecycle/state.json`.
    #[serde(default)]
    pub path: Option<String>,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LoggingConfig {
    /// Default filter directive, overridden by `RUST_LOG`.
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Emit JSON lines instead of human-readable output.
    #[serde(default)]
    pub json: bool,
}

/// Configuration of one resource.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResourceConfig {
    /// Resource type, e.g. `test_instance`.
    #[serde(rename = "type")]
    pub resource_type: String,
    /// Resource name, unique per type.
    pub name: String,
    /// Address of the provider that manages this resource.
    pub provider: String,
    /// Literal attribute values.
    #[serde(default)]
    pub attributes: BTreeMap<String, serde_json::Value>,
    /// Provider metadata passed along with every provider call.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_meta: Option<BTreeMap<String, serde_json::Value>>,
    /// Attribute paths to treat as sensitive in addition to the schema's.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sensitive: Vec<Path>,
    /// Lifecycle policy.
    #[serde(default)]
    pub lifecycle: Lifecycle,
}

/// Lifecycle policy of a resource.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Lifecycle {
    /// Create a replacement before destroying the old object.
    #[serde(default)]
    pub create_before_destroy: bool,
    /// Refuse any plan that destroys the object.
    #[serde(default)]
    pub prevent_destroy: bool,
    /// Attributes whose configuration changes are ignored.
    #[serde(default, skip_serializing_if = "IgnoreChanges::is_empty")]
    pub ignore_changes: IgnoreChanges,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

impl ResourceConfig {
    /// Creates a resource configuration with no attributes.
    #[must_use]
    pub fn new(resource_type: impl Into<String>, name: impl Into<String>, provider: impl Into<String>) -> Self {
        Self {
            resource_type: resource_type.into(),
            name: name.into(),
            provider: provider.into(),
            attributes: BTreeMap::new(),
            provider_meta: None,
            sensitive: Vec::new(),
            lifecycle: Lifecycle::default(),
        }
    }

    /// Sets a literal attribute value.
    #[must_use]
    pub fn with_attribute(mut self, name: impl Into<String>, value: serde_json::Value) -> Self {
        self.attributes.insert(name.into(), value);
        self
    }

    /// Marks an attribute path sensitive.
    #[must_use]
    pub fn with_sensitive(mut self, path: Path) -> Self {
        self.sensitive.push(path);
        self
    }

    /// Replaces the lifecycle policy.
    #[must_use]
    pub fn with_lifecycle(mut self, lifecycle: Lifecycle) -> Self {
        self.lifecycle = lifecycle;
        self
    }

    /// Returns the resource address.
    #[must_use]
    pub fn addr(&self) -> ResourceAddr {
        ResourceAddr::new(self.resource_type.clone(), self.name.clone())
    }

    /// Returns the address of the resource's single, unkeyed instance.
    #[must_use]
    pub fn instance_addr(&self) -> ResourceInstanceAddr {
        self.addr().instance(None)
    }

    /// Returns the configured body as a JSON object.
    #[must_use]
    pub fn body(&self) -> serde_json::Value {
        serde_json::Value::Object(self.attributes.clone().into_iter().collect())
    }
}

fn default_log_level() -> String {
    String::from("info")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resource_defaults() {
        let yaml = r"
type: test_instance
name: web
provider: registry/test
";
        let resource: ResourceConfig = serde_yaml::from_str(yaml).expect("valid resource");
        assert_eq!(resource.instance_addr().to_string(), "test_instance.web");
        assert!(resource.attributes.is_empty());
        assert!(!resource.lifecycle.create_before_destroy);
        assert!(resource.lifecycle.ignore_changes.is_empty());
        assert_eq!(resource.body(), serde_json::json!({}));
    }

    #[test]
    fn test_lifecycle_block() {
        let yaml = r#"
type: test_instance
name: web
provider: registry/test
attributes:
  ami: ami-123
  tags:
    Name: web
sensitive:
  - password
lifecycle:
  create_before_destroy: true
  prevent_destroy: true
  ignore_changes:
    - ami
    - tags["Name"]
"#;
        let resource: ResourceConfig = serde_yaml::from_str(yaml).expect("valid resource");
        assert!(resource.lifecycle.create_before_destroy);
        assert!(resource.lifecycle.prevent_destroy);
        assert_eq!(
            resource.lifecycle.ignore_changes,
            IgnoreChanges::Paths(vec![Path::attr("ami"), Path::attr("tags").key("Name")])
        );
        assert_eq!(resource.sensitive, vec![Path::attr("password")]);
        assert_eq!(resource.body()["tags"]["Name"], serde_json::json!("web"));
    }

    #[test]
    fn test_ignore_all_changes() {
        let yaml = r"
type: test_instance
name: web
provider: registry/test
lifecycle:
  ignore_changes: all
";
        let resource: ResourceConfig = serde_yaml::from_str(yaml).expect("valid resource");
        assert_eq!(resource.lifecycle.ignore_changes, IgnoreChanges::All);
    }
}
