//! Configuration evaluation.
//!
//! The lifecycle engine never reads configuration bodies directly. It asks a
//! [`ConfigEvaluator`] for the value of a resource's body and of its
//! `provider_meta`, shaped to the schema's implied type and carrying marks.

use tracing::trace;

use crate::addrs::ResourceInstanceAddr;
use crate::error::ConfigError;
use crate::schema::Schema;
use crate::value::{MarkedValue, Path, Value, ValueMarks};

use super::spec::ResourceConfig;

/// Evaluates resource configuration into values.
#[cfg_attr(test, mockall::automock)]
pub trait ConfigEvaluator: Send + Sync {
    /// Evaluates a resource body against its schema.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Evaluation`] if the body cannot be evaluated.
    fn evaluate_resource(
        &self,
        addr: &ResourceInstanceAddr,
        config: &ResourceConfig,
        schema: &Schema,
    ) -> Result<MarkedValue, ConfigError>;

    /// Evaluates a resource's `provider_meta` body against the provider's
    /// meta schema.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Evaluation`] if the body cannot be evaluated.
    fn evaluate_provider_meta(
        &self,
        addr: &ResourceInstanceAddr,
        config: &ResourceConfig,
        schema: &Schema,
    ) -> Result<Value, ConfigError>;
}

/// Evaluator for literal configuration bodies.
///
/// Attributes absent from the body evaluate as null. Configured sensitive
/// paths and the schema's sensitive attributes become marks.
#[derive(Debug, Default, Clone, Copy)]
pub struct LiteralEvaluator;

impl LiteralEvaluator {
    /// Creates a literal evaluator.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl ConfigEvaluator for LiteralEvaluator {
    fn evaluate_resource(
        &self,
        addr: &ResourceInstanceAddr,
        config: &ResourceConfig,
        schema: &Schema,
    ) -> Result<MarkedValue, ConfigError> {
        let value = Value::from_json(&config.body(), &schema.implied_type())
            .map_err(|e| ConfigError::evaluation(addr, e))?;

        for (name, attr) in &schema.attributes {
            let configured = value.get_attr(name).is_some_and(|v| !v.is_null());
            if attr.required && !configured {
                return Err(ConfigError::evaluation(
                    addr,
                    format!("the argument {name:?} is required, but no definition was found"),
                ));
            }
            if configured && attr.computed && !attr.optional && !attr.required {
                return Err(ConfigError::evaluation(
                    addr,
                    format!("{name:?} is computed by the provider and cannot be set in configuration"),
                ));
            }
        }

        let mut marks = ValueMarks::sensitive(&config.sensitive);
        marks.merge(&ValueMarks::sensitive(&schema.sensitive_paths(&value, &Path::root())));
        let marked = value.mark_with_paths(&marks);
        trace!("evaluated {addr} with {} marked paths", marked.marks.len());
        Ok(marked)
    }

    fn evaluate_provider_meta(
        &self,
        addr: &ResourceInstanceAddr,
        config: &ResourceConfig,
        schema: &Schema,
    ) -> Result<Value, ConfigError> {
        let Some(meta) = &config.provider_meta else {
            return Ok(Value::Null);
        };
        let body = serde_json::Value::Object(meta.clone().into_iter().collect());
        Value::from_json(&body, &schema.implied_type())
            .map_err(|e| ConfigError::evaluation(addr, format!("provider_meta: {e}")))
    }
}
