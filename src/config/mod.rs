//! Configuration module.
//!
//! This module handles all configuration-related functionality:
//! - Parsing and deserializing the engine's YAML configuration
//! - Validation of declared resources and their lifecycle policy
//! - Evaluating resource bodies into schema-shaped, marked values

mod evaluator;
mod parser;
mod spec;
mod validator;

#[cfg(test)]
pub use evaluator::MockConfigEvaluator;
pub use evaluator::{ConfigEvaluator, LiteralEvaluator};
pub use parser::{find_config_file, ConfigParser, DEFAULT_CONFIG_FILES};
pub use spec::{EngineConfig, Lifecycle, LoggingConfig, ResourceConfig, StateConfig};
pub use validator::{ConfigValidator, ValidationError, ValidationResult};
