//! Per-instance lifecycle operations.
//!
//! A [`ResourceInstanceNode`] is what the scheduler holds for one resource
//! instance. Each operation reads what it needs from the [`EvalContext`],
//! talks to the provider at most a couple of times and returns its result
//! without writing it; the scheduler commits results through
//! [`ResourceInstanceNode::write_resource_instance_state`] and
//! [`ResourceInstanceNode::write_change`].

use tracing::{debug, trace, warn};

use crate::addrs::{DeposedKey, Generation, ResourceAddr, ResourceInstanceAddr};
use crate::config::ResourceConfig;
use crate::error::{ConfigError, LifecycleError, PlanError, PolicyError, ProviderError, Result};
use crate::planner::{
    assert_object_compatible, assert_plan_valid, changed_replace_paths, process_ignore_changes,
    proposed_new_object, test_conformance, Action, ResourceInstanceChange,
};
use crate::provider::{
    ApplyResourceChangeRequest, ApplyResourceChangeResponse, Diagnostic, Diagnostics,
    PlanResourceChangeRequest, PlanResourceChangeResponse, ReadResourceRequest,
    ValidateResourceConfigRequest,
};
use crate::schema::Schema;
use crate::state::{ObjectStatus, ResourceInstanceObject};
use crate::value::{MarkedValue, PathSet, Value};

use super::context::EvalContext;
use super::hooks::HookStage;
use super::outcome::{ApplyOutcome, PhaseState, PlanOutcome, RefreshOutcome};

/// One resource instance and its configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceInstanceNode {
    addr: ResourceInstanceAddr,
    config: Option<ResourceConfig>,
}

impl ResourceInstanceNode {
    /// Creates a node for a configured instance.
    #[must_use]
    pub const fn new(addr: ResourceInstanceAddr, config: ResourceConfig) -> Self {
        Self {
            addr,
            config: Some(config),
        }
    }

    /// Creates a node for an instance that is no longer configured.
    ///
    /// Orphans can be refreshed and destroyed but not planned.
    #[must_use]
    pub const fn orphan(addr: ResourceInstanceAddr) -> Self {
        Self { addr, config: None }
    }

    /// Returns the instance address.
    #[must_use]
    pub const fn addr(&self) -> &ResourceInstanceAddr {
        &self.addr
    }

    /// Returns the instance configuration, if any.
    #[must_use]
    pub const fn config(&self) -> Option<&ResourceConfig> {
        self.config.as_ref()
    }

    fn type_name(&self) -> String {
        self.addr.resource_type().to_string()
    }

    fn require_config(&self) -> std::result::Result<&ResourceConfig, ConfigError> {
        self.config
            .as_ref()
            .ok_or_else(|| ConfigError::evaluation(&self.addr, "resource instance has no configuration"))
    }

    /// Evaluates the instance's `provider_meta`, or null if it declares none.
    fn provider_meta(&self, ctx: &EvalContext) -> Result<Value> {
        let Some(config) = self.config.as_ref().filter(|c| c.provider_meta.is_some()) else {
            return Ok(Value::Null);
        };
        let Some(meta_schema) = &ctx.provider_schema().provider_meta else {
            return Err(ProviderError::ProviderMetaUnsupported {
                provider: ctx.provider_addr().to_string(),
                address: self.addr.to_string(),
            }
            .into());
        };
        Ok(ctx.evaluator().evaluate_provider_meta(&self.addr, config, meta_schema)?)
    }

    /// Reads the live value of the current object.
    ///
    /// Marks on the prior value are reapplied to the refreshed value, and
    /// the prior object's dependencies and create-before-destroy flag are
    /// kept. Drift from the prior value is logged and returned as warnings.
    ///
    /// # Errors
    ///
    /// Returns the provider's diagnostics if it reports errors, or a
    /// contract violation if its response is missing or non-conforming.
    pub async fn refresh(
        &self,
        ctx: &EvalContext,
        state: Option<&ResourceInstanceObject>,
    ) -> Result<RefreshOutcome> {
        let Some(state) = state else {
            debug!("refresh: {}: no state, so not refreshing", self.addr);
            return Ok(RefreshOutcome::unchanged(None));
        };

        let (schema, _) = ctx.schema_for(self.addr.resource_type())?;
        let provider_meta = self.provider_meta(ctx)?;

        ctx.run_hooks(&self.addr, HookStage::PreRefresh, |h| {
            h.pre_refresh(&self.addr, &Generation::Current, &state.value)
        })?;

        let (prior, prior_marks) = state.value.unmark_deep_with_paths();
        let resp = ctx
            .provider()
            .read_resource(ReadResourceRequest {
                type_name: self.type_name(),
                prior_state: prior.clone(),
                private: state.private.clone(),
                provider_meta,
            })
            .await;
        if resp.diagnostics.has_errors() {
            return Err(ProviderError::diagnostics(&self.addr, resp.diagnostics).into());
        }
        let mut warnings = resp.diagnostics;

        let Some(new_value) = resp.new_state else {
            return Err(self.nil_response(ctx, "ReadResource"));
        };
        let problems = test_conformance(schema, &new_value);
        if !problems.is_empty() {
            return Err(self.invalid_object(ctx, "refresh", problems));
        }

        let drift = assert_object_compatible(schema, &prior, &new_value);
        if !drift.is_empty() {
            warn!(
                "Provider {:?} produced an unexpected new value for {} during refresh: {}",
                ctx.provider_addr(),
                self.addr,
                drift.join("; ")
            );
            for problem in drift {
                warnings.push(Diagnostic::warning("Object changed outside of this engine", problem));
            }
        }

        ctx.run_hooks(&self.addr, HookStage::PostRefresh, |h| {
            h.post_refresh(&self.addr, &Generation::Current, &prior, &new_value)
        })?;

        let object = ResourceInstanceObject {
            value: new_value.mark_with_paths(&prior_marks),
            status: state.status,
            private: resp.private,
            dependencies: state.dependencies.clone(),
            create_before_destroy: state.create_before_destroy,
        };
        Ok(RefreshOutcome {
            object: Some(object),
            warnings,
        })
    }

    /// Plans the change that brings the current object in line with
    /// configuration.
    ///
    /// `planned_change` is the change recorded by an earlier plan when the
    /// instance is re-planned during apply. `create_before_destroy` is
    /// combined with the configured lifecycle flag, unless an earlier
    /// change already fixed the replacement order.
    ///
    /// # Errors
    ///
    /// Returns evaluation errors, provider diagnostics, contract violations
    /// and hook halts. Returns [`PolicyError::PreventDestroy`] when the
    /// planned change would destroy a protected instance. Nothing is
    /// recorded on failure.
    pub async fn plan(
        &self,
        ctx: &EvalContext,
        planned_change: Option<&ResourceInstanceChange>,
        current: Option<&ResourceInstanceObject>,
        create_before_destroy: bool,
    ) -> Result<PlanOutcome> {
        let config = self.require_config()?;
        let generation = Generation::Current;
        let create_before_destroy = planned_change.map_or(
            create_before_destroy || config.lifecycle.create_before_destroy,
            |change| change.action == Action::CreateThenDelete,
        );

        let (schema, _) = ctx.schema_for(self.addr.resource_type())?;
        let config_val = ctx.evaluator().evaluate_resource(&self.addr, config, schema)?;
        let provider_meta = self.provider_meta(ctx)?;

        let (prior_marked, prior_tainted) = match current {
            Some(obj) if obj.status == ObjectStatus::Tainted => (MarkedValue::null(), Some(obj.value.clone())),
            Some(obj) => (obj.value.clone(), None),
            None => (MarkedValue::null(), None),
        };
        let prior_private = current.and_then(|obj| obj.private.clone());

        let (config_unmarked, config_marks) = config_val.into_parts();
        let (prior, prior_marks) = prior_marked.unmark_deep_with_paths();

        let mut warnings = ctx
            .provider()
            .validate_resource_config(ValidateResourceConfigRequest {
                type_name: self.type_name(),
                config: config_unmarked.clone(),
            })
            .await;
        if warnings.has_errors() {
            return Err(ProviderError::diagnostics(&self.addr, warnings).into());
        }

        let ignore_changes = &config.lifecycle.ignore_changes;
        let config_ignored = process_ignore_changes(&prior, &config_unmarked, ignore_changes);
        let proposed = proposed_new_object(schema, &prior, &config_ignored);

        ctx.run_hooks(&self.addr, HookStage::PreDiff, |h| {
            h.pre_diff(&self.addr, &generation, &prior_marked, &proposed)
        })?;

        let PlanResourceChangeResponse {
            planned_state,
            planned_private,
            requires_replace,
            legacy_type_system,
            diagnostics,
        } = ctx
            .provider()
            .plan_resource_change(PlanResourceChangeRequest {
                type_name: self.type_name(),
                config: config_ignored.clone(),
                prior_state: prior.clone(),
                proposed_new_state: proposed,
                prior_private,
                provider_meta: provider_meta.clone(),
            })
            .await;
        if diagnostics.has_errors() {
            return Err(ProviderError::diagnostics(&self.addr, diagnostics).into());
        }
        warnings.extend(diagnostics);

        let Some(mut planned) = planned_state else {
            return Err(self.nil_response(ctx, "PlanResourceChange"));
        };
        let mut planned_private = planned_private;
        self.check_planned_conformance(ctx, schema, &planned)?;

        let problems = assert_plan_valid(schema, &prior, &config_ignored, &planned);
        if !problems.is_empty() {
            if !legacy_type_system {
                return Err(self.invalid_plan(ctx, problems));
            }
            warn!(
                "Provider {:?} produced an invalid plan for {}, but we are tolerating it because it is using the legacy type system: {}",
                ctx.provider_addr(),
                self.addr,
                problems.join("; ")
            );
            for problem in problems {
                warnings.push(Diagnostic::warning("Provider produced an invalid plan", problem));
            }
        }

        if legacy_type_system {
            planned = process_ignore_changes(&prior, &planned, ignore_changes);
        }

        let required_replace = changed_replace_paths(&prior, &planned, &requires_replace).map_err(|paths| {
            ProviderError::InvalidReplacePath {
                provider: ctx.provider_addr().to_string(),
                address: self.addr.to_string(),
                paths: paths.iter().map(ToString::to_string).collect(),
            }
        })?;

        let mut action = if prior.is_null() {
            Action::Create
        } else if planned.equals(&prior) == Some(true) {
            Action::NoOp
        } else if !required_replace.is_empty() {
            Action::replace(create_before_destroy)
        } else {
            Action::Update
        };

        if action.is_replace() {
            // Plan the replacement as if creating from scratch, so the
            // change shows the new object rather than a merge with the old.
            let resp = ctx
                .provider()
                .plan_resource_change(PlanResourceChangeRequest {
                    type_name: self.type_name(),
                    config: config_unmarked.clone(),
                    prior_state: Value::Null,
                    proposed_new_state: proposed_new_object(schema, &Value::Null, &config_unmarked),
                    prior_private: planned_private,
                    provider_meta,
                })
                .await;
            if resp.diagnostics.has_errors() {
                return Err(ProviderError::diagnostics(&self.addr, resp.diagnostics).into());
            }
            let Some(replacement) = resp.planned_state else {
                return Err(self.nil_response(ctx, "PlanResourceChange"));
            };
            self.check_planned_conformance(ctx, schema, &replacement)?;
            planned = replacement;
            planned_private = resp.planned_private;
        }

        let planned_marked = planned.mark_with_paths(&config_marks);
        let mut before = prior_marked;

        if action == Action::Create
            && let Some(tainted) = prior_tainted
        {
            action = Action::replace(create_before_destroy);
            before = tainted;
        }

        if action == Action::NoOp && planned_marked.marks != prior_marks {
            action = Action::Update;
        }

        if let Some(prev) = planned_change
            && prev.action.is_replace()
            && action == Action::Create
        {
            trace!(
                "{} treating Create change as {} change to match with earlier plan",
                self.addr,
                prev.action
            );
            action = prev.action;
            before = prev.before.clone();
        }

        let change = ResourceInstanceChange {
            addr: self.addr.clone(),
            deposed_key: None,
            provider_addr: ctx.provider_addr().to_string(),
            action,
            before,
            after: planned_marked.clone(),
            private: planned_private.clone(),
            required_replace,
        };
        self.check_prevent_destroy(Some(&change))?;

        ctx.run_hooks(&self.addr, HookStage::PostDiff, |h| {
            h.post_diff(&self.addr, &generation, action, &change.before, &change.after)
        })?;

        debug!("planned {action} change for {}", self.addr);
        let mut planned_obj = ResourceInstanceObject::new(planned_marked).with_status(ObjectStatus::Planned);
        planned_obj.private = planned_private;

        Ok(PlanOutcome {
            change,
            planned: planned_obj,
            warnings,
        })
    }

    /// Plans the deletion of an object, current or deposed.
    ///
    /// Returns `None` when there is nothing to delete. The provider is not
    /// consulted.
    ///
    /// # Errors
    ///
    /// Returns a hook error if a hook halts.
    pub fn plan_destroy(
        &self,
        ctx: &EvalContext,
        state: Option<&ResourceInstanceObject>,
        deposed_key: Option<&DeposedKey>,
    ) -> Result<Option<ResourceInstanceChange>> {
        let Some(state) = state.filter(|s| !s.is_null()) else {
            trace!("plan_destroy: {}: no state, so nothing to destroy", self.addr);
            return Ok(None);
        };
        let generation = Generation::from_deposed(deposed_key.cloned());
        let after = MarkedValue::null();

        ctx.run_hooks(&self.addr, HookStage::PreDiff, |h| {
            h.pre_diff(&self.addr, &generation, &state.value, &Value::Null)
        })?;

        let change = ResourceInstanceChange {
            addr: self.addr.clone(),
            deposed_key: deposed_key.cloned(),
            provider_addr: ctx.provider_addr().to_string(),
            action: Action::Delete,
            before: state.value.clone(),
            after,
            private: state.private.clone(),
            required_replace: PathSet::new(),
        };

        ctx.run_hooks(&self.addr, HookStage::PostDiff, |h| {
            h.post_diff(&self.addr, &generation, Action::Delete, &change.before, &change.after)
        })?;

        Ok(Some(change))
    }

    /// Applies a planned change.
    ///
    /// Provider errors do not fail the call: they are returned on the
    /// outcome together with whatever object the provider left behind, so
    /// the caller can record it. An object created with errors is tainted.
    ///
    /// # Errors
    ///
    /// Returns a policy error before calling the provider if the change
    /// would destroy a protected instance, and contract violations if the
    /// provider's response is missing, non-conforming or inconsistent with
    /// the plan.
    pub async fn apply(
        &self,
        ctx: &EvalContext,
        change: &ResourceInstanceChange,
        current: Option<&ResourceInstanceObject>,
    ) -> Result<ApplyOutcome> {
        self.check_prevent_destroy(Some(change))?;

        if change.action == Action::NoOp {
            debug!("apply: {}: no-op change, so not applying", self.addr);
            return Ok(ApplyOutcome {
                object: current.cloned(),
                warnings: Diagnostics::new(),
                error: None,
            });
        }

        let generation = change.generation();
        let (schema, _) = ctx.schema_for(self.addr.resource_type())?;
        let config_val = if change.action == Action::Delete {
            Value::Null
        } else {
            let config = self.require_config()?;
            ctx.evaluator().evaluate_resource(&self.addr, config, schema)?.value
        };
        let provider_meta = self.provider_meta(ctx)?;

        ctx.run_hooks(&self.addr, HookStage::PreApply, |h| {
            h.pre_apply(&self.addr, &generation, change.action, &change.before, &change.after)
        })?;

        let (before, _) = change.before.unmark_deep_with_paths();
        let (after, after_marks) = change.after.unmark_deep_with_paths();
        let ApplyResourceChangeResponse {
            new_state,
            private,
            legacy_type_system,
            diagnostics,
        } = ctx
            .provider()
            .apply_resource_change(ApplyResourceChangeRequest {
                type_name: self.type_name(),
                prior_state: before.clone(),
                planned_state: after.clone(),
                config: config_val,
                planned_private: change.private.clone(),
                provider_meta,
            })
            .await;
        let has_errors = diagnostics.has_errors();
        let mut warnings = diagnostics.warnings();

        let new_value = match new_state {
            Some(value) => value,
            None if has_errors && after.is_null() => Value::Null,
            None if has_errors => before,
            None => return Err(self.nil_response(ctx, "ApplyResourceChange")),
        };
        let problems = test_conformance(schema, &new_value);
        if !problems.is_empty() {
            return Err(self.invalid_object(ctx, "apply", problems));
        }

        if !has_errors {
            let problems = assert_object_compatible(schema, &after, &new_value);
            if !problems.is_empty() {
                if !legacy_type_system {
                    return Err(ProviderError::InconsistentResult {
                        provider: ctx.provider_addr().to_string(),
                        address: self.addr.to_string(),
                        problems,
                    }
                    .into());
                }
                warn!(
                    "Provider {:?} produced an unexpected new value for {}, but we are tolerating it because it is using the legacy type system: {}",
                    ctx.provider_addr(),
                    self.addr,
                    problems.join("; ")
                );
                for problem in problems {
                    warnings.push(Diagnostic::warning("Provider produced inconsistent result after apply", problem));
                }
            }
        }

        let new_marked = new_value.mark_with_paths(&after_marks);
        let error: Option<LifecycleError> =
            has_errors.then(|| ProviderError::diagnostics(&self.addr, diagnostics).into());

        let object = if new_marked.is_null() {
            None
        } else {
            let tainted = has_errors && (change.action == Action::Create || change.action.is_replace());
            if tainted {
                debug!("apply: {}: marking object tainted after a failed create", self.addr);
            }
            Some(ResourceInstanceObject {
                value: new_marked.clone(),
                status: if tainted {
                    ObjectStatus::Tainted
                } else {
                    ObjectStatus::Ready
                },
                private,
                dependencies: current.map(|obj| obj.dependencies.clone()).unwrap_or_default(),
                create_before_destroy: change.action == Action::CreateThenDelete
                    || self
                        .config
                        .as_ref()
                        .is_some_and(|c| c.lifecycle.create_before_destroy),
            })
        };

        let error_text = error.as_ref().map(ToString::to_string);
        ctx.run_hooks(&self.addr, HookStage::PostApply, |h| {
            h.post_apply(&self.addr, &generation, &new_marked, error_text.as_deref())
        })?;

        Ok(ApplyOutcome {
            object,
            warnings,
            error,
        })
    }

    /// Reads the current object from the working or refresh state.
    ///
    /// # Errors
    ///
    /// Returns an error if the resource type is unknown or the stored
    /// object cannot be decoded.
    pub fn read_resource_instance_state(
        &self,
        ctx: &EvalContext,
        phase: PhaseState,
    ) -> Result<Option<ResourceInstanceObject>> {
        let state = match phase {
            PhaseState::Working => ctx.state(),
            PhaseState::Refresh => ctx.refresh_state(),
        };
        let Some(src) = state.resource_instance_object(&self.addr, &Generation::Current) else {
            return Ok(None);
        };
        let (schema, _) = ctx.schema_for(self.addr.resource_type())?;
        Ok(Some(src.decode(&self.addr, &schema.implied_type())?))
    }

    /// Reads a deposed object from the working state.
    ///
    /// # Errors
    ///
    /// Returns an error if the resource type is unknown or the stored
    /// object cannot be decoded.
    pub fn read_resource_instance_deposed(
        &self,
        ctx: &EvalContext,
        key: &DeposedKey,
    ) -> Result<Option<ResourceInstanceObject>> {
        let generation = Generation::Deposed(key.clone());
        let Some(src) = ctx.state().resource_instance_object(&self.addr, &generation) else {
            return Ok(None);
        };
        let (schema, _) = ctx.schema_for(self.addr.resource_type())?;
        Ok(Some(src.decode(&self.addr, &schema.implied_type())?))
    }

    /// Writes the current object to the working or refresh state.
    ///
    /// A missing or null object removes the record. `dependencies`
    /// replaces the object's dependencies when given and keeps them when
    /// `None`.
    ///
    /// # Errors
    ///
    /// Returns an error if the resource type is unknown or the object does
    /// not conform to its schema.
    pub fn write_resource_instance_state(
        &self,
        ctx: &EvalContext,
        object: Option<&ResourceInstanceObject>,
        dependencies: Option<&[ResourceAddr]>,
        phase: PhaseState,
    ) -> Result<()> {
        let state = match phase {
            PhaseState::Working => ctx.state(),
            PhaseState::Refresh => {
                trace!("write_resource_instance_state: {} targets the refresh state", self.addr);
                ctx.refresh_state()
            }
        };

        let Some(object) = object.filter(|o| !o.is_null()) else {
            trace!("write_resource_instance_state: removing state object for {}", self.addr);
            state.set_resource_instance_current(&self.addr, None, ctx.provider_addr());
            return Ok(());
        };

        let (schema, version) = ctx.schema_for(self.addr.resource_type())?;
        let mut object = object.clone();
        if let Some(deps) = dependencies {
            object.dependencies = deps.to_vec();
        }
        let src = object.encode(&self.addr, &schema.implied_type(), version)?;
        trace!("write_resource_instance_state: writing current state object for {}", self.addr);
        state.set_resource_instance_current(&self.addr, Some(src), ctx.provider_addr());
        Ok(())
    }

    /// Writes a deposed object to the working state, or removes it when
    /// the object is missing or null.
    ///
    /// # Errors
    ///
    /// Returns an error if the resource type is unknown or the object does
    /// not conform to its schema.
    pub fn write_resource_instance_deposed(
        &self,
        ctx: &EvalContext,
        key: &DeposedKey,
        object: Option<&ResourceInstanceObject>,
    ) -> Result<()> {
        let Some(object) = object.filter(|o| !o.is_null()) else {
            trace!("removing deposed object {key} of {}", self.addr);
            ctx.state()
                .set_resource_instance_deposed(&self.addr, key, None, ctx.provider_addr());
            return Ok(());
        };
        let (schema, version) = ctx.schema_for(self.addr.resource_type())?;
        let src = object.encode(&self.addr, &schema.implied_type(), version)?;
        ctx.state()
            .set_resource_instance_deposed(&self.addr, key, Some(src), ctx.provider_addr());
        Ok(())
    }

    /// Records a planned change, or with `None` removes the change recorded
    /// for this instance and generation.
    ///
    /// # Errors
    ///
    /// Returns [`PlanError::AddressMismatch`] if the change belongs to a
    /// different address or generation, [`PlanError::InconsistentChange`]
    /// if its values disagree with its action, and an encode error if they
    /// do not conform to the schema. A change that would destroy a
    /// protected instance is refused with [`PolicyError::PreventDestroy`]
    /// and not recorded.
    pub fn write_change(
        &self,
        ctx: &EvalContext,
        change: Option<&ResourceInstanceChange>,
        deposed_key: Option<&DeposedKey>,
    ) -> Result<()> {
        let generation = Generation::from_deposed(deposed_key.cloned());
        let Some(change) = change else {
            if ctx.changes().remove(&self.addr, &generation).is_some() {
                trace!("removed recorded change for {} {generation}", self.addr);
            }
            return Ok(());
        };

        if change.addr != self.addr || change.deposed_key.as_ref() != deposed_key {
            return Err(PlanError::AddressMismatch {
                expected: format!("{} {generation}", self.addr),
                found: format!("{} {}", change.addr, change.generation()),
            }
            .into());
        }

        self.check_prevent_destroy(Some(change))?;
        let (schema, _) = ctx.schema_for(self.addr.resource_type())?;
        change.validate()?;
        let src = change.encode(&schema.implied_type())?;
        ctx.changes().append(src);

        match deposed_key {
            Some(key) => trace!("recorded {} change for {} deposed object {key}", change.action, self.addr),
            None => trace!("recorded {} change for {}", change.action, self.addr),
        }
        Ok(())
    }

    /// Reads the change recorded for the current object.
    ///
    /// # Errors
    ///
    /// Returns an error if the resource type is unknown or the recorded
    /// change cannot be decoded.
    pub fn read_diff(&self, ctx: &EvalContext) -> Result<Option<ResourceInstanceChange>> {
        let (schema, _) = ctx.schema_for(self.addr.resource_type())?;
        let Some(src) = ctx.changes().get(&self.addr, &Generation::Current) else {
            trace!("read_diff: no planned change recorded for {}", self.addr);
            return Ok(None);
        };
        let change = src.decode(&schema.implied_type())?;
        trace!("read_diff: read {} change from previous plan for {}", change.action, self.addr);
        Ok(Some(change))
    }

    /// Refuses a change that would destroy an instance whose lifecycle
    /// sets `prevent_destroy`.
    ///
    /// # Errors
    ///
    /// Returns [`PolicyError::PreventDestroy`] for Delete and replace
    /// changes on protected instances.
    pub fn check_prevent_destroy(&self, change: Option<&ResourceInstanceChange>) -> std::result::Result<(), PolicyError> {
        let (Some(change), Some(config)) = (change, &self.config) else {
            return Ok(());
        };
        if config.lifecycle.prevent_destroy && (change.action == Action::Delete || change.action.is_replace()) {
            return Err(PolicyError::PreventDestroy {
                address: self.addr.to_string(),
            });
        }
        Ok(())
    }

    fn check_planned_conformance(&self, ctx: &EvalContext, schema: &Schema, planned: &Value) -> Result<()> {
        let problems = test_conformance(schema, planned);
        if problems.is_empty() {
            Ok(())
        } else {
            Err(self.invalid_plan(ctx, problems))
        }
    }

    fn invalid_plan(&self, ctx: &EvalContext, problems: Vec<String>) -> LifecycleError {
        ProviderError::InvalidPlan {
            provider: ctx.provider_addr().to_string(),
            address: self.addr.to_string(),
            problems,
        }
        .into()
    }

    fn invalid_object(&self, ctx: &EvalContext, operation: &str, problems: Vec<String>) -> LifecycleError {
        ProviderError::InvalidObject {
            provider: ctx.provider_addr().to_string(),
            address: self.addr.to_string(),
            operation: operation.to_string(),
            problems,
        }
        .into()
    }

    fn nil_response(&self, ctx: &EvalContext, operation: &str) -> LifecycleError {
        ProviderError::NilResponse {
            provider: ctx.provider_addr().to_string(),
            address: self.addr.to_string(),
            operation: operation.to_string(),
        }
        .into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::config::{Lifecycle, MockConfigEvaluator};
    use crate::lifecycle::hooks::{Hook, HookAction};
    use crate::planner::IgnoreChanges;
    use crate::provider::{MockProvider, ReadResourceResponse};
    use crate::schema::{Attribute, ProviderSchema};
    use crate::value::{Mark, Path, Type, ValueMarks};

    const PROVIDER: &str = "registry/test";

    fn schema() -> Schema {
        Schema::new()
            .with_attribute("id", Attribute::computed(Type::String))
            .with_attribute("ami", Attribute::required(Type::String))
            .with_attribute("size", Attribute::optional(Type::Number))
            .with_attribute("tags", Attribute::optional(Type::map(Type::String)))
    }

    fn provider_schema() -> ProviderSchema {
        ProviderSchema::new().with_resource_type("test_instance", schema(), 1)
    }

    fn config(ami: &str) -> ResourceConfig {
        ResourceConfig::new("test_instance", "web", PROVIDER).with_attribute("ami", serde_json::json!(ami))
    }

    fn node(config: ResourceConfig) -> ResourceInstanceNode {
        ResourceInstanceNode::new(config.instance_addr(), config)
    }

    fn object(id: &str, ami: &str) -> Value {
        Value::object([
            ("id", Value::string(id)),
            ("ami", Value::string(ami)),
            ("size", Value::Null),
            ("tags", Value::Null),
        ])
    }

    fn context(provider: MockProvider) -> EvalContext {
        EvalContext::new(PROVIDER, Arc::new(provider), provider_schema())
    }

    /// A provider that validates cleanly and plans exactly what it is
    /// proposed, filling unknown ids for creates.
    fn echo_planner(provider: &mut MockProvider) {
        provider.expect_validate_resource_config().returning(|_| Diagnostics::new());
        provider.expect_plan_resource_change().returning(|req| PlanResourceChangeResponse {
            planned_state: Some(req.proposed_new_state),
            planned_private: req.prior_private,
            ..Default::default()
        });
    }

    #[tokio::test]
    async fn test_refresh_without_state_is_noop() {
        let mut provider = MockProvider::new();
        provider.expect_read_resource().never();
        let ctx = context(provider);

        let outcome = node(config("ami-1"))
            .refresh(&ctx, None)
            .await
            .expect("refresh succeeds");
        assert!(outcome.object.is_none());
        assert!(outcome.warnings.is_empty());
    }

    #[tokio::test]
    async fn test_refresh_keeps_marks_and_dependencies() {
        let mut provider = MockProvider::new();
        provider.expect_read_resource().returning(|req| {
            assert!(req.prior_state.get_attr("ami").is_some());
            ReadResourceResponse {
                new_state: Some(req.prior_state),
                private: Some(b"fresh".to_vec()),
                diagnostics: Diagnostics::new(),
            }
        });
        let ctx = context(provider);

        let mut state = ResourceInstanceObject::new(
            object("i-1", "ami-1").mark_with_paths(&ValueMarks::sensitive([&Path::attr("ami")])),
        );
        state.dependencies = vec![ResourceAddr::new("test_network", "main")];
        state.create_before_destroy = true;

        let outcome = node(config("ami-1"))
            .refresh(&ctx, Some(&state))
            .await
            .expect("refresh succeeds");
        let refreshed = outcome.object.expect("object refreshed");
        assert!(refreshed.value.marks.has(&Path::attr("ami"), Mark::Sensitive));
        assert_eq!(refreshed.dependencies, state.dependencies);
        assert!(refreshed.create_before_destroy);
        assert_eq!(refreshed.private.as_deref(), Some(b"fresh".as_slice()));
        assert!(outcome.warnings.is_empty());
    }

    #[tokio::test]
    async fn test_refresh_error_leaves_object() {
        let mut provider = MockProvider::new();
        provider.expect_read_resource().returning(|_| ReadResourceResponse {
            new_state: Some(Value::Null),
            private: None,
            diagnostics: Diagnostic::error("read failed", "").into(),
        });
        let ctx = context(provider);
        let state = ResourceInstanceObject::new(object("i-1", "ami-1"));

        let err = node(config("ami-1"))
            .refresh(&ctx, Some(&state))
            .await
            .expect_err("read failed");
        assert!(matches!(err, LifecycleError::Provider(ProviderError::Diagnostics { .. })));
        assert!(!err.is_provider_bug());
    }

    #[tokio::test]
    async fn test_refresh_drift_is_a_warning() {
        let mut provider = MockProvider::new();
        provider.expect_read_resource().returning(|_| ReadResourceResponse {
            new_state: Some(object("i-1", "ami-changed")),
            ..Default::default()
        });
        let ctx = context(provider);
        let state = ResourceInstanceObject::new(object("i-1", "ami-1"));

        let outcome = node(config("ami-1"))
            .refresh(&ctx, Some(&state))
            .await
            .expect("drift is tolerated");
        assert_eq!(outcome.warnings.len(), 1);
    }

    #[tokio::test]
    async fn test_refresh_nil_response() {
        let mut provider = MockProvider::new();
        provider
            .expect_read_resource()
            .returning(|_| ReadResourceResponse::default());
        let ctx = context(provider);
        let state = ResourceInstanceObject::new(object("i-1", "ami-1"));

        let err = node(config("ami-1"))
            .refresh(&ctx, Some(&state))
            .await
            .expect_err("nil response");
        assert!(err.is_provider_bug());
    }

    #[tokio::test]
    async fn test_refresh_rejects_provider_meta_without_schema() {
        let provider = MockProvider::new();
        let ctx = context(provider);
        let mut cfg = config("ami-1");
        cfg.provider_meta = Some([(String::from("module_path"), serde_json::json!("app"))].into());
        let state = ResourceInstanceObject::new(object("i-1", "ami-1"));

        let err = node(cfg).refresh(&ctx, Some(&state)).await.expect_err("no meta schema");
        assert!(matches!(
            err,
            LifecycleError::Provider(ProviderError::ProviderMetaUnsupported { .. })
        ));
    }

    #[tokio::test]
    async fn test_plan_create() {
        let mut provider = MockProvider::new();
        echo_planner(&mut provider);
        let ctx = context(provider);

        let outcome = node(config("ami-1"))
            .plan(&ctx, None, None, false)
            .await
            .expect("plan succeeds");
        assert_eq!(outcome.change.action, Action::Create);
        assert!(outcome.change.before.is_null());
        assert_eq!(outcome.change.after.value.get_attr("id"), Some(&Value::Unknown));
        assert_eq!(outcome.planned.status, ObjectStatus::Planned);
    }

    #[tokio::test]
    async fn test_plan_noop_and_update() {
        let mut provider = MockProvider::new();
        echo_planner(&mut provider);
        let ctx = context(provider);
        let current = ResourceInstanceObject::new(object("i-1", "ami-1"));

        let noop = node(config("ami-1"))
            .plan(&ctx, None, Some(&current), false)
            .await
            .expect("plan succeeds");
        assert_eq!(noop.change.action, Action::NoOp);

        let update = node(config("ami-2"))
            .plan(&ctx, None, Some(&current), false)
            .await
            .expect("plan succeeds");
        assert_eq!(update.change.action, Action::Update);
        assert_eq!(update.change.after.value.get_attr("id"), Some(&Value::string("i-1")));
    }

    #[tokio::test]
    async fn test_plan_replace_replans_from_scratch() {
        let mut provider = MockProvider::new();
        provider.expect_validate_resource_config().returning(|_| Diagnostics::new());
        provider
            .expect_plan_resource_change()
            .withf(|req| !req.prior_state.is_null())
            .times(1)
            .returning(|req| PlanResourceChangeResponse {
                planned_state: Some(req.proposed_new_state),
                requires_replace: [Path::attr("ami")].into_iter().collect(),
                ..Default::default()
            });
        provider
            .expect_plan_resource_change()
            .withf(|req| req.prior_state.is_null())
            .times(1)
            .returning(|req| PlanResourceChangeResponse {
                planned_state: Some(req.proposed_new_state),
                ..Default::default()
            });
        let ctx = context(provider);
        let current = ResourceInstanceObject::new(object("i-1", "ami-1"));

        let outcome = node(config("ami-2"))
            .plan(&ctx, None, Some(&current), true)
            .await
            .expect("plan succeeds");
        assert_eq!(outcome.change.action, Action::CreateThenDelete);
        assert!(outcome.change.required_replace.contains(&Path::attr("ami")));
        assert_eq!(outcome.change.after.value.get_attr("id"), Some(&Value::Unknown));
        assert_eq!(outcome.change.before.value, object("i-1", "ami-1"));
    }

    #[tokio::test]
    async fn test_plan_invalid_replace_path() {
        let mut provider = MockProvider::new();
        provider.expect_validate_resource_config().returning(|_| Diagnostics::new());
        provider.expect_plan_resource_change().returning(|req| PlanResourceChangeResponse {
            planned_state: Some(req.proposed_new_state),
            requires_replace: [Path::attr("nope")].into_iter().collect(),
            ..Default::default()
        });
        let ctx = context(provider);
        let current = ResourceInstanceObject::new(object("i-1", "ami-1"));

        let err = node(config("ami-2"))
            .plan(&ctx, None, Some(&current), false)
            .await
            .expect_err("path resolves nowhere");
        assert!(matches!(
            err,
            LifecycleError::Provider(ProviderError::InvalidReplacePath { .. })
        ));
    }

    #[tokio::test]
    async fn test_plan_validation_errors_abort() {
        let mut provider = MockProvider::new();
        provider
            .expect_validate_resource_config()
            .returning(|_| Diagnostic::error("bad ami", "").into());
        provider.expect_plan_resource_change().never();
        let ctx = context(provider);

        let err = node(config("ami-1"))
            .plan(&ctx, None, None, false)
            .await
            .expect_err("validation fails");
        assert!(err.to_string().contains("bad ami"));
    }

    #[tokio::test]
    async fn test_plan_invalid_plan_unless_legacy() {
        let respond = |legacy: bool| {
            move |req: PlanResourceChangeRequest| {
                let mut planned = req.proposed_new_state;
                if let Value::Object(attrs) = &mut planned {
                    attrs.insert(String::from("ami"), Value::string("rewritten"));
                }
                PlanResourceChangeResponse {
                    planned_state: Some(planned),
                    legacy_type_system: legacy,
                    ..Default::default()
                }
            }
        };

        let mut strict = MockProvider::new();
        strict.expect_validate_resource_config().returning(|_| Diagnostics::new());
        strict.expect_plan_resource_change().returning(respond(false));
        let err = node(config("ami-1"))
            .plan(&context(strict), None, None, false)
            .await
            .expect_err("invalid plan");
        assert!(matches!(err, LifecycleError::Provider(ProviderError::InvalidPlan { .. })));

        let mut legacy = MockProvider::new();
        legacy.expect_validate_resource_config().returning(|_| Diagnostics::new());
        legacy.expect_plan_resource_change().returning(respond(true));
        let outcome = node(config("ami-1"))
            .plan(&context(legacy), None, None, false)
            .await
            .expect("legacy providers are tolerated");
        assert_eq!(outcome.warnings.len(), 1);
    }

    #[tokio::test]
    async fn test_plan_legacy_reapplies_ignore_changes() {
        let mut provider = MockProvider::new();
        provider.expect_validate_resource_config().returning(|_| Diagnostics::new());
        provider.expect_plan_resource_change().returning(|req| {
            let mut planned = req.proposed_new_state;
            if let Value::Object(attrs) = &mut planned {
                attrs.insert(String::from("ami"), Value::string("hashed"));
            }
            PlanResourceChangeResponse {
                planned_state: Some(planned),
                legacy_type_system: true,
                ..Default::default()
            }
        });
        let ctx = context(provider);
        let current = ResourceInstanceObject::new(object("i-1", "ami-1"));
        let cfg = config("ami-2").with_lifecycle(Lifecycle {
            ignore_changes: IgnoreChanges::Paths(vec![Path::attr("ami")]),
            ..Lifecycle::default()
        });

        let outcome = node(cfg)
            .plan(&ctx, None, Some(&current), false)
            .await
            .expect("plan succeeds");
        assert_eq!(outcome.change.action, Action::NoOp);
    }

    #[tokio::test]
    async fn test_plan_keeps_earlier_replace() {
        let mut provider = MockProvider::new();
        echo_planner(&mut provider);
        let ctx = context(provider);
        let earlier = ResourceInstanceChange {
            addr: config("ami-2").instance_addr(),
            deposed_key: None,
            provider_addr: PROVIDER.to_string(),
            action: Action::DeleteThenCreate,
            before: MarkedValue::new(object("i-1", "ami-1")),
            after: MarkedValue::new(object("i-2", "ami-2")),
            private: None,
            required_replace: PathSet::new(),
        };

        let outcome = node(config("ami-2"))
            .plan(&ctx, Some(&earlier), None, false)
            .await
            .expect("plan succeeds");
        assert_eq!(outcome.change.action, Action::DeleteThenCreate);
        assert_eq!(outcome.change.before, earlier.before);
    }

    #[tokio::test]
    async fn test_plan_evaluation_error() {
        let mut evaluator = MockConfigEvaluator::new();
        evaluator
            .expect_evaluate_resource()
            .returning(|addr, _, _| Err(ConfigError::evaluation(addr, "unknown variable")));
        let mut provider = MockProvider::new();
        provider.expect_validate_resource_config().never();
        let ctx = context(provider).with_evaluator(Arc::new(evaluator));

        let err = node(config("ami-1"))
            .plan(&ctx, None, None, false)
            .await
            .expect_err("evaluation fails");
        assert!(matches!(err, LifecycleError::Config(ConfigError::Evaluation { .. })));
    }

    #[tokio::test]
    async fn test_plan_orphan_fails() {
        let ctx = context(MockProvider::new());
        let err = ResourceInstanceNode::orphan(ResourceInstanceAddr::new("test_instance", "gone"))
            .plan(&ctx, None, None, false)
            .await
            .expect_err("orphans have no configuration");
        assert!(matches!(err, LifecycleError::Config(_)));
    }

    struct HaltOnDiff;

    impl Hook for HaltOnDiff {
        fn pre_diff(&self, _: &ResourceInstanceAddr, _: &Generation, _: &MarkedValue, _: &Value) -> HookAction {
            HookAction::Halt
        }
    }

    #[tokio::test]
    async fn test_hook_halts_plan() {
        let mut provider = MockProvider::new();
        provider.expect_validate_resource_config().returning(|_| Diagnostics::new());
        provider.expect_plan_resource_change().never();
        let ctx = context(provider).with_hook(Arc::new(HaltOnDiff));

        let err = node(config("ami-1"))
            .plan(&ctx, None, None, false)
            .await
            .expect_err("hook halts");
        assert!(matches!(err, LifecycleError::Hook(_)));
    }

    #[test]
    fn test_plan_destroy() {
        let ctx = context(MockProvider::new());
        let n = node(config("ami-1"));
        assert!(n.plan_destroy(&ctx, None, None).expect("no state").is_none());

        let mut state = ResourceInstanceObject::new(object("i-1", "ami-1"));
        state.private = Some(vec![1, 2]);
        let key = DeposedKey::from("00000001");
        let change = n
            .plan_destroy(&ctx, Some(&state), Some(&key))
            .expect("plans")
            .expect("delete change");
        assert_eq!(change.action, Action::Delete);
        assert!(change.after.is_null());
        assert_eq!(change.private, Some(vec![1, 2]));
        assert_eq!(change.deposed_key, Some(key));
    }

    #[tokio::test]
    async fn test_apply_create_and_delete() {
        let mut provider = MockProvider::new();
        echo_planner(&mut provider);
        provider.expect_apply_resource_change().returning(|req| {
            let new_state = match req.planned_state {
                Value::Null => Value::Null,
                _ => object("i-1", "ami-1"),
            };
            ApplyResourceChangeResponse {
                new_state: Some(new_state),
                private: Some(b"p".to_vec()),
                ..Default::default()
            }
        });
        let ctx = context(provider);
        let n = node(config("ami-1"));

        let plan = n.plan(&ctx, None, None, false).await.expect("plan succeeds");
        let created = n
            .apply(&ctx, &plan.change, None)
            .await
            .expect("apply succeeds")
            .into_result()
            .expect("no provider error")
            .expect("object created");
        assert_eq!(created.status, ObjectStatus::Ready);
        assert_eq!(created.value.value.get_attr("id"), Some(&Value::string("i-1")));

        let destroy = n
            .plan_destroy(&ctx, Some(&created), None)
            .expect("plans")
            .expect("delete change");
        let outcome = n.apply(&ctx, &destroy, Some(&created)).await.expect("apply succeeds");
        assert!(outcome.object.is_none());
        assert!(!outcome.is_err());
    }

    #[tokio::test]
    async fn test_apply_failed_create_is_tainted() {
        let mut provider = MockProvider::new();
        echo_planner(&mut provider);
        provider.expect_apply_resource_change().returning(|_| ApplyResourceChangeResponse {
            new_state: Some(object("i-1", "ami-1")),
            diagnostics: Diagnostic::error("boot failed", "").into(),
            ..Default::default()
        });
        let ctx = context(provider);
        let n = node(config("ami-1"));

        let plan = n.plan(&ctx, None, None, false).await.expect("plan succeeds");
        let outcome = n.apply(&ctx, &plan.change, None).await.expect("apply returns");
        assert!(outcome.is_err());
        let object = outcome.object.as_ref().expect("partial object kept");
        assert_eq!(object.status, ObjectStatus::Tainted);
        assert!(outcome.into_result().is_err());
    }

    #[tokio::test]
    async fn test_apply_inconsistent_result() {
        let mut provider = MockProvider::new();
        echo_planner(&mut provider);
        provider.expect_apply_resource_change().returning(|_| ApplyResourceChangeResponse {
            new_state: Some(object("i-1", "ami-other")),
            ..Default::default()
        });
        let ctx = context(provider);
        let n = node(config("ami-1"));

        let plan = n.plan(&ctx, None, None, false).await.expect("plan succeeds");
        let err = n.apply(&ctx, &plan.change, None).await.expect_err("inconsistent");
        assert!(matches!(
            err,
            LifecycleError::Provider(ProviderError::InconsistentResult { .. })
        ));
    }

    #[tokio::test]
    async fn test_apply_prevent_destroy() {
        let mut provider = MockProvider::new();
        provider.expect_apply_resource_change().never();
        let ctx = context(provider);
        let n = node(config("ami-1").with_lifecycle(Lifecycle {
            prevent_destroy: true,
            ..Lifecycle::default()
        }));
        let state = ResourceInstanceObject::new(object("i-1", "ami-1"));
        let destroy = n
            .plan_destroy(&ctx, Some(&state), None)
            .expect("plans")
            .expect("delete change");

        let err = n.apply(&ctx, &destroy, Some(&state)).await.expect_err("protected");
        assert!(matches!(err, LifecycleError::Policy(PolicyError::PreventDestroy { .. })));
        assert!(n.check_prevent_destroy(None).is_ok());

        let err = n.write_change(&ctx, Some(&destroy), None).expect_err("protected");
        assert!(matches!(err, LifecycleError::Policy(PolicyError::PreventDestroy { .. })));
        assert!(ctx.changes().is_empty());
    }

    #[tokio::test]
    async fn test_plan_refuses_to_replace_protected_instance() {
        let mut provider = MockProvider::new();
        provider.expect_validate_resource_config().returning(|_| Diagnostics::new());
        provider.expect_plan_resource_change().returning(|req| PlanResourceChangeResponse {
            planned_state: Some(req.proposed_new_state),
            requires_replace: [Path::attr("ami")].into_iter().collect(),
            ..Default::default()
        });
        let ctx = context(provider);
        let n = node(config("ami-2").with_lifecycle(Lifecycle {
            prevent_destroy: true,
            ..Lifecycle::default()
        }));
        let current = ResourceInstanceObject::new(object("i-1", "ami-1"));

        let err = n
            .plan(&ctx, None, Some(&current), false)
            .await
            .expect_err("protected");
        assert!(matches!(err, LifecycleError::Policy(PolicyError::PreventDestroy { .. })));
        assert!(ctx.changes().is_empty());

        let update = node(config("ami-1").with_lifecycle(Lifecycle {
            prevent_destroy: true,
            ..Lifecycle::default()
        }))
        .plan(&ctx, None, Some(&current), false)
        .await
        .expect("in-place changes are allowed");
        assert_eq!(update.change.action, Action::NoOp);
    }

    #[test]
    fn test_write_state_and_remove() {
        let ctx = context(MockProvider::new());
        let n = node(config("ami-1"));
        let mut obj = ResourceInstanceObject::new(object("i-1", "ami-1"));
        obj.dependencies = vec![ResourceAddr::new("test_network", "old")];

        n.write_resource_instance_state(&ctx, Some(&obj), None, PhaseState::Working)
            .expect("writes");
        let stored = n
            .read_resource_instance_state(&ctx, PhaseState::Working)
            .expect("reads")
            .expect("stored");
        assert_eq!(stored.dependencies, obj.dependencies);

        let deps = [ResourceAddr::new("test_network", "new")];
        n.write_resource_instance_state(&ctx, Some(&obj), Some(&deps), PhaseState::Working)
            .expect("writes");
        let stored = n
            .read_resource_instance_state(&ctx, PhaseState::Working)
            .expect("reads")
            .expect("stored");
        assert_eq!(stored.dependencies, deps.to_vec());
        assert!(n
            .read_resource_instance_state(&ctx, PhaseState::Refresh)
            .expect("reads")
            .is_none());

        n.write_resource_instance_state(&ctx, None, None, PhaseState::Working)
            .expect("removes");
        assert!(n
            .read_resource_instance_state(&ctx, PhaseState::Working)
            .expect("reads")
            .is_none());
    }

    #[test]
    fn test_write_deposed() {
        let ctx = context(MockProvider::new());
        let n = node(config("ami-1"));
        let key = DeposedKey::from("0000abcd");
        let obj = ResourceInstanceObject::new(object("i-1", "ami-1")).with_status(ObjectStatus::Deposed);

        n.write_resource_instance_deposed(&ctx, &key, Some(&obj)).expect("writes");
        assert_eq!(
            n.read_resource_instance_deposed(&ctx, &key).expect("reads"),
            Some(obj)
        );
        n.write_resource_instance_deposed(&ctx, &key, None).expect("removes");
        assert!(n.read_resource_instance_deposed(&ctx, &key).expect("reads").is_none());
    }

    #[tokio::test]
    async fn test_write_change_and_read_diff() {
        let mut provider = MockProvider::new();
        echo_planner(&mut provider);
        let ctx = context(provider);
        let n = node(config("ami-1"));

        let plan = n.plan(&ctx, None, None, false).await.expect("plan succeeds");
        n.write_change(&ctx, Some(&plan.change), None).expect("records");
        let read = n.read_diff(&ctx).expect("reads").expect("recorded");
        assert_eq!(read.action, Action::Create);
        assert_eq!(read.after.value.get_attr("id"), Some(&Value::Unknown));

        let key = DeposedKey::from("00000001");
        let err = n
            .write_change(&ctx, Some(&plan.change), Some(&key))
            .expect_err("generation mismatch");
        assert!(matches!(err, LifecycleError::Plan(PlanError::AddressMismatch { .. })));

        n.write_change(&ctx, None, None).expect("removes");
        assert!(n.read_diff(&ctx).expect("reads").is_none());
    }
}
