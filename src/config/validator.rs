//! Configuration validation.
//!
//! Checks declared resources for consistency before any planning happens:
//! unique addresses, a provider for every resource, and, when provider
//! schemas are known, lifecycle and sensitivity paths that address real
//! attributes.

use crate::addrs::ResourceAddr;
use crate::error::{ConfigError, Result};
use crate::planner::IgnoreChanges;
use crate::schema::ProviderSchema;
use std::collections::{BTreeMap, HashSet};
use tracing::debug;

use super::spec::{EngineConfig, ResourceConfig};

/// Validator for engine configurations.
#[derive(Debug, Default)]
pub struct ConfigValidator {
    /// Provider schemas by provider address.
    schemas: BTreeMap<String, ProviderSchema>,
}

/// Validation result containing all errors found.
#[derive(Debug, Default)]
pub struct ValidationResult {
    /// List of validation errors.
    pub errors: Vec<ValidationError>,
    /// List of warnings (non-fatal issues).
    pub warnings: Vec<String>,
}

/// A single validation error.
#[derive(Debug)]
pub struct ValidationError {
    /// The field path that failed validation.
    pub field: String,
    /// The error message.
    pub message: String,
}

impl ConfigValidator {
    /// Creates a validator without provider schemas.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the schema of a provider, enabling attribute path checks
    /// for its resources.
    #[must_use]
    pub fn with_provider_schema(mut self, provider: impl Into<String>, schema: ProviderSchema) -> Self {
        self.schemas.insert(provider.into(), schema);
        self
    }

    /// Validates an engine configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::DuplicateResource`] for a repeated address, or
    /// the first validation error found.
    pub fn validate(&self, config: &EngineConfig) -> Result<ValidationResult> {
        let mut result = ValidationResult::default();

        if config.resources.is_empty() {
            result.warnings.push(String::from("No resources defined in configuration"));
        }

        let mut seen = HashSet::new();
        for (i, resource) in config.resources.iter().enumerate() {
            let prefix = format!("resources[{i}]");
            let addr = resource.addr();
            if !seen.insert(addr.clone()) {
                return Err(ConfigError::DuplicateResource {
                    address: addr.to_string(),
                }
                .into());
            }
            self.validate_resource(resource, &prefix, &mut result);
        }

        if let Some(first_error) = result.errors.first() {
            return Err(ConfigError::validation(first_error.message.clone(), first_error.field.clone()).into());
        }

        debug!(
            "Configuration validation passed with {} warnings",
            result.warnings.len()
        );
        Ok(result)
    }

    /// Validates one resource.
    fn validate_resource(&self, resource: &ResourceConfig, prefix: &str, result: &mut ValidationResult) {
        let text = format!("{}.{}", resource.resource_type, resource.name);
        if let Err(e) = text.parse::<ResourceAddr>() {
            result.errors.push(ValidationError {
                field: format!("{prefix}.name"),
                message: e.to_string(),
            });
        }

        if resource.provider.trim().is_empty() {
            result.errors.push(ValidationError {
                field: format!("{prefix}.provider"),
                message: format!("Resource {text} has no provider"),
            });
        }

        if let IgnoreChanges::Paths(paths) = &resource.lifecycle.ignore_changes {
            for (j, path) in paths.iter().enumerate() {
                if path.is_empty() {
                    result.errors.push(ValidationError {
                        field: format!("{prefix}.lifecycle.ignore_changes[{j}]"),
                        message: String::from("An ignore_changes path cannot be empty; use `all` to ignore every change"),
                    });
                }
            }
        }

        self.validate_against_schema(resource, prefix, result);
    }

    /// Checks a resource's paths against its provider schema, if registered.
    fn validate_against_schema(&self, resource: &ResourceConfig, prefix: &str, result: &mut ValidationResult) {
        let Some(provider_schema) = self.schemas.get(&resource.provider) else {
            return;
        };
        let Some((schema, _)) = provider_schema.schema_for(&resource.resource_type) else {
            result.errors.push(ValidationError {
                field: format!("{prefix}.type"),
                message: format!(
                    "Provider {} does not support resource type {:?}",
                    resource.provider, resource.resource_type
                ),
            });
            return;
        };

        for name in resource.attributes.keys() {
            if !schema.attributes.contains_key(name) && !schema.block_types.contains_key(name) {
                result.errors.push(ValidationError {
                    field: format!("{prefix}.attributes.{name}"),
                    message: format!("An argument named {name:?} is not expected here"),
                });
            }
        }

        if let IgnoreChanges::Paths(paths) = &resource.lifecycle.ignore_changes {
            for (j, path) in paths.iter().enumerate().filter(|(_, p)| !p.is_empty()) {
                let field = format!("{prefix}.lifecycle.ignore_changes[{j}]");
                if !schema.has_path(path) {
                    result.errors.push(ValidationError {
                        field,
                        message: format!("{path} does not address an attribute of {}", resource.resource_type),
                    });
                } else if schema
                    .attribute_at(path)
                    .is_some_and(|attr| attr.computed && !attr.optional && !attr.required)
                {
                    result.warnings.push(format!(
                        "{field}: {path} is computed by the provider, so ignoring changes to it has no effect"
                    ));
                }
            }
        }

        for (j, path) in resource.sensitive.iter().enumerate() {
            if !schema.has_path(path) {
                result.errors.push(ValidationError {
                    field: format!("{prefix}.sensitive[{j}]"),
                    message: format!("{path} does not address an attribute of {}", resource.resource_type),
                });
            }
        }

        if resource.provider_meta.is_some() && provider_schema.provider_meta.is_none() {
            result.warnings.push(format!(
                "{prefix}.provider_meta: provider {} does not accept provider_meta",
                resource.provider
            ));
        }
    }
}

impl ValidationResult {
    /// Returns true if validation passed (no errors).
    #[must_use]
    pub const fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// Returns the number of errors.
    #[must_use]
    pub const fn error_count(&self) -> usize {
        self.errors.len()
    }

    /// Returns the number of warnings.
    #[must_use]
    pub const fn warning_count(&self) -> usize {
        self.warnings.len()
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}
