//! Evaluation context shared by lifecycle operations.
//!
//! The context bundles the collaborators one provider's instances need: the
//! provider itself and its schema, the working and refresh states, the
//! change set, the configuration evaluator and the registered hooks. Store
//! handles are shared `Arc`s, so a scheduler can hand the same stores to
//! many contexts running concurrently.

use std::sync::Arc;

use crate::addrs::ResourceInstanceAddr;
use crate::changes::ChangeSet;
use crate::config::{ConfigEvaluator, LiteralEvaluator};
use crate::error::{HookError, ProviderError};
use crate::provider::Provider;
use crate::schema::{ProviderSchema, Schema};
use crate::state::SyncState;

use super::hooks::{Hook, HookAction, HookStage};

/// Collaborators for lifecycle operations on one provider's instances.
pub struct EvalContext {
    provider_addr: String,
    provider: Arc<dyn Provider>,
    schema: Arc<ProviderSchema>,
    state: Arc<SyncState>,
    refresh_state: Arc<SyncState>,
    changes: Arc<ChangeSet>,
    evaluator: Arc<dyn ConfigEvaluator>,
    hooks: Vec<Arc<dyn Hook>>,
}

impl EvalContext {
    /// Creates a context with empty stores and the literal evaluator.
    #[must_use]
    pub fn new(provider_addr: impl Into<String>, provider: Arc<dyn Provider>, schema: ProviderSchema) -> Self {
        Self {
            provider_addr: provider_addr.into(),
            provider,
            schema: Arc::new(schema),
            state: Arc::new(SyncState::new()),
            refresh_state: Arc::new(SyncState::new()),
            changes: Arc::new(ChangeSet::new()),
            evaluator: Arc::new(LiteralEvaluator::new()),
            hooks: Vec::new(),
        }
    }

    /// Uses the given working state.
    #[must_use]
    pub fn with_state(mut self, state: Arc<SyncState>) -> Self {
        self.state = state;
        self
    }

    /// Uses the given refresh-only state.
    #[must_use]
    pub fn with_refresh_state(mut self, state: Arc<SyncState>) -> Self {
        self.refresh_state = state;
        self
    }

    /// Uses the given change set.
    #[must_use]
    pub fn with_changes(mut self, changes: Arc<ChangeSet>) -> Self {
        self.changes = changes;
        self
    }

    /// Uses the given configuration evaluator.
    #[must_use]
    pub fn with_evaluator(mut self, evaluator: Arc<dyn ConfigEvaluator>) -> Self {
        self.evaluator = evaluator;
        self
    }

    /// Registers a hook. Hooks run in registration order.
    #[must_use]
    pub fn with_hook(mut self, hook: Arc<dyn Hook>) -> Self {
        self.hooks.push(hook);
        self
    }

    /// Returns the provider address.
    #[must_use]
    pub fn provider_addr(&self) -> &str {
        &self.provider_addr
    }

    /// Returns the provider.
    #[must_use]
    pub fn provider(&self) -> &dyn Provider {
        self.provider.as_ref()
    }

    /// Returns the provider schema.
    #[must_use]
    pub fn provider_schema(&self) -> &ProviderSchema {
        &self.schema
    }

    /// Returns the working state.
    #[must_use]
    pub fn state(&self) -> &Arc<SyncState> {
        &self.state
    }

    /// Returns the refresh-only state.
    #[must_use]
    pub fn refresh_state(&self) -> &Arc<SyncState> {
        &self.refresh_state
    }

    /// Returns the change set.
    #[must_use]
    pub fn changes(&self) -> &Arc<ChangeSet> {
        &self.changes
    }

    /// Returns the configuration evaluator.
    #[must_use]
    pub fn evaluator(&self) -> &dyn ConfigEvaluator {
        self.evaluator.as_ref()
    }

    /// Looks up the schema and schema version of a resource type.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::UnsupportedResourceType`] if the provider has
    /// no schema for the type.
    pub fn schema_for(&self, resource_type: &str) -> Result<(&Schema, u64), ProviderError> {
        self.schema
            .schema_for(resource_type)
            .ok_or_else(|| ProviderError::UnsupportedResourceType {
                provider: self.provider_addr.clone(),
                resource_type: resource_type.to_string(),
            })
    }

    /// Runs every hook, stopping at the first that halts.
    ///
    /// # Errors
    ///
    /// Returns [`HookError::Halted`] if a hook halts.
    pub fn run_hooks<F>(&self, addr: &ResourceInstanceAddr, stage: HookStage, f: F) -> Result<(), HookError>
    where
        F: Fn(&dyn Hook) -> HookAction,
    {
        for hook in &self.hooks {
            if f(hook.as_ref()) == HookAction::Halt {
                return Err(HookError::Halted {
                    address: addr.to_string(),
                    stage: stage.to_string(),
                });
            }
        }
        Ok(())
    }
}
