//! End-to-end lifecycle tests against a scripted provider.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use resource_lifecycle::config::Lifecycle;
use resource_lifecycle::error::{LifecycleError, PolicyError};
use resource_lifecycle::lifecycle::PlanOutcome;
use resource_lifecycle::planner::{process_ignore_changes, IgnoreChanges};
use resource_lifecycle::provider::{
    ApplyResourceChangeRequest, ApplyResourceChangeResponse, PlanResourceChangeRequest,
    PlanResourceChangeResponse, ReadResourceRequest, ReadResourceResponse, ValidateResourceConfigRequest,
};
use resource_lifecycle::schema::Attribute;
use resource_lifecycle::state::ObjectStatus;
use resource_lifecycle::value::{Mark, PathSet, Type, ValueMarks};
use resource_lifecycle::{
    Action, Diagnostics, EvalContext, LocalStateStore, PhaseState, Path, Provider, ProviderSchema,
    ResourceConfig, ResourceInstanceNode, ResourceInstanceObject, Schema, SyncState, Value,
};

const PROVIDER: &str = "registry/test";

/// Plans exactly what it is proposed, assigns ids on apply and echoes the
/// prior value on read.
#[derive(Default)]
struct ScriptedProvider {
    requires_replace: PathSet,
    plans: AtomicUsize,
    applies: AtomicUsize,
}

impl ScriptedProvider {
    fn replacing(path: Path) -> Self {
        Self {
            requires_replace: [path].into_iter().collect(),
            ..Self::default()
        }
    }
}

#[async_trait]
impl Provider for ScriptedProvider {
    async fn validate_resource_config(&self, _request: ValidateResourceConfigRequest) -> Diagnostics {
        Diagnostics::new()
    }

    async fn read_resource(&self, request: ReadResourceRequest) -> ReadResourceResponse {
        ReadResourceResponse {
            new_state: Some(request.prior_state),
            private: request.private,
            diagnostics: Diagnostics::new(),
        }
    }

    async fn plan_resource_change(&self, request: PlanResourceChangeRequest) -> PlanResourceChangeResponse {
        self.plans.fetch_add(1, Ordering::SeqCst);
        PlanResourceChangeResponse {
            planned_state: Some(request.proposed_new_state),
            planned_private: request.prior_private,
            requires_replace: self.requires_replace.clone(),
            legacy_type_system: false,
            diagnostics: Diagnostics::new(),
        }
    }

    async fn apply_resource_change(&self, request: ApplyResourceChangeRequest) -> ApplyResourceChangeResponse {
        let n = self.applies.fetch_add(1, Ordering::SeqCst) + 1;
        let new_state = request.planned_state.transform(&mut |_, v| {
            if v.is_unknown() {
                Value::string(format!("i-{n}"))
            } else {
                v
            }
        });
        ApplyResourceChangeResponse {
            new_state: Some(new_state),
            private: Some(b"applied".to_vec()),
            legacy_type_system: false,
            diagnostics: Diagnostics::new(),
        }
    }
}

fn schema() -> Schema {
    Schema::new()
        .with_attribute("id", Attribute::computed(Type::String))
        .with_attribute("x", Attribute::optional(Type::Number))
        .with_attribute("a", Attribute::optional(Type::String))
        .with_attribute("tags", Attribute::optional(Type::map(Type::String)))
}

fn context(provider: ScriptedProvider) -> (EvalContext, Arc<ScriptedProvider>) {
    let provider = Arc::new(provider);
    let schema = ProviderSchema::new().with_resource_type("test_instance", schema(), 0);
    (EvalContext::new(PROVIDER, provider.clone(), schema), provider)
}

fn resource() -> ResourceConfig {
    ResourceConfig::new("test_instance", "web", PROVIDER)
}

fn node(config: ResourceConfig) -> ResourceInstanceNode {
    ResourceInstanceNode::new(config.instance_addr(), config)
}

fn recorded(x: f64, a: &str, tags: Value) -> ResourceInstanceObject {
    ResourceInstanceObject::new(Value::object([
        ("id", Value::string("i-1")),
        ("x", Value::number(x)),
        ("a", Value::string(a)),
        ("tags", tags),
    ]))
}

async fn plan(ctx: &EvalContext, node: &ResourceInstanceNode, current: Option<&ResourceInstanceObject>) -> PlanOutcome {
    node.plan(ctx, None, current, false).await.expect("plan succeeds")
}

#[tokio::test]
async fn test_noop_is_idempotent() {
    let (ctx, _) = context(ScriptedProvider::default());
    let n = node(resource().with_attribute("x", serde_json::json!(1)));

    let create = plan(&ctx, &n, None).await;
    assert_eq!(create.change.action, Action::Create);
    let created = n
        .apply(&ctx, &create.change, None)
        .await
        .expect("apply succeeds")
        .into_result()
        .expect("no provider error");
    n.write_resource_instance_state(&ctx, created.as_ref(), Some(&[]), PhaseState::Working)
        .expect("writes state");

    for _ in 0..2 {
        let current = n
            .read_resource_instance_state(&ctx, PhaseState::Working)
            .expect("reads state");
        let outcome = plan(&ctx, &n, current.as_ref()).await;
        assert_eq!(outcome.change.action, Action::NoOp);
        let applied = n
            .apply(&ctx, &outcome.change, current.as_ref())
            .await
            .expect("apply succeeds")
            .into_result()
            .expect("no provider error");
        n.write_resource_instance_state(&ctx, applied.as_ref(), None, PhaseState::Working)
            .expect("writes state");
    }
}

#[tokio::test]
async fn test_create_and_delete_nullness() {
    let (ctx, _) = context(ScriptedProvider::default());
    let n = node(resource().with_attribute("a", serde_json::json!("one")));

    let create = plan(&ctx, &n, None).await;
    assert_eq!(create.change.action, Action::Create);
    assert!(create.change.before.is_null());
    assert!(!create.change.after.is_null());
    n.write_change(&ctx, Some(&create.change), None).expect("records create");

    let current = recorded(1.0, "one", Value::Null);
    let delete = n
        .plan_destroy(&ctx, Some(&current), None)
        .expect("plans destroy")
        .expect("delete change");
    assert_eq!(delete.action, Action::Delete);
    assert!(delete.after.is_null());
    assert!(!delete.before.is_null());

    let mut broken = delete.clone();
    broken.action = Action::Create;
    assert!(n.write_change(&ctx, Some(&broken), None).is_err());
}

#[tokio::test]
async fn test_sensitivity_forces_update() {
    let (ctx, _) = context(ScriptedProvider::default());
    let current = recorded(1.0, "same", Value::Null);
    let n = node(
        resource()
            .with_attribute("x", serde_json::json!(1))
            .with_attribute("a", serde_json::json!("same"))
            .with_sensitive(Path::attr("x")),
    );

    let outcome = plan(&ctx, &n, Some(&current)).await;
    assert_eq!(outcome.change.action, Action::Update);
    assert!(outcome.change.after.marks.has(&Path::attr("x"), Mark::Sensitive));
    assert_eq!(outcome.change.after.value, current.value.value);
}

#[tokio::test]
async fn test_ignore_changes_on_scalar() {
    let prior = Value::object([("a", Value::string("old"))]);
    let config = Value::object([("a", Value::string("new"))]);
    let ignored = process_ignore_changes(&prior, &config, &IgnoreChanges::Paths(vec![Path::attr("a")]));
    assert_eq!(ignored, prior);

    let (ctx, _) = context(ScriptedProvider::default());
    let current = recorded(1.0, "old", Value::Null);
    let n = node(
        resource()
            .with_attribute("x", serde_json::json!(1))
            .with_attribute("a", serde_json::json!("new"))
            .with_lifecycle(Lifecycle {
                ignore_changes: IgnoreChanges::Paths(vec![Path::attr("a")]),
                ..Lifecycle::default()
            }),
    );
    let outcome = plan(&ctx, &n, Some(&current)).await;
    assert_eq!(outcome.change.action, Action::NoOp);
}

#[tokio::test]
async fn test_ignore_changes_on_map_key() {
    let (ctx, _) = context(ScriptedProvider::default());
    let current = recorded(1.0, "same", Value::map([("k1", Value::string("v1"))]));
    let n = node(
        resource()
            .with_attribute("x", serde_json::json!(1))
            .with_attribute("a", serde_json::json!("same"))
            .with_attribute("tags", serde_json::json!({ "k1": "v2", "k2": "v3" }))
            .with_lifecycle(Lifecycle {
                ignore_changes: IgnoreChanges::Paths(vec![Path::attr("tags").key("k1")]),
                ..Lifecycle::default()
            }),
    );

    let outcome = plan(&ctx, &n, Some(&current)).await;
    assert_eq!(outcome.change.action, Action::Update);
    assert_eq!(
        outcome.change.after.value.get_attr("tags"),
        Some(&Value::map([("k1", Value::string("v1")), ("k2", Value::string("v3"))]))
    );
}

#[tokio::test]
async fn test_unchanged_replace_path_is_update() {
    let (ctx, provider) = context(ScriptedProvider::replacing(Path::attr("x")));
    let current = recorded(5.0, "before", Value::Null);
    let n = node(
        resource()
            .with_attribute("x", serde_json::json!(5))
            .with_attribute("a", serde_json::json!("after")),
    );

    let outcome = plan(&ctx, &n, Some(&current)).await;
    assert_eq!(outcome.change.action, Action::Update);
    assert!(outcome.change.required_replace.is_empty());
    assert_eq!(provider.plans.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_changed_replace_path_replans() {
    let (ctx, provider) = context(ScriptedProvider::replacing(Path::attr("x")));
    let current = recorded(5.0, "same", Value::Null);
    let n = node(
        resource()
            .with_attribute("x", serde_json::json!(6))
            .with_attribute("a", serde_json::json!("same")),
    );

    let outcome = plan(&ctx, &n, Some(&current)).await;
    assert_eq!(outcome.change.action, Action::DeleteThenCreate);
    assert!(outcome.change.required_replace.contains(&Path::attr("x")));
    assert_eq!(outcome.change.after.value.get_attr("id"), Some(&Value::Unknown));
    assert_eq!(provider.plans.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_tainted_forces_replace() {
    let (ctx, _) = context(ScriptedProvider::default());
    let current = recorded(1.0, "same", Value::Null).with_status(ObjectStatus::Tainted);
    let config = resource()
        .with_attribute("x", serde_json::json!(1))
        .with_attribute("a", serde_json::json!("same"));

    let outcome = plan(&ctx, &node(config.clone()), Some(&current)).await;
    assert_eq!(outcome.change.action, Action::DeleteThenCreate);
    assert_eq!(outcome.change.before, current.value);

    let cbd = config.with_lifecycle(Lifecycle {
        create_before_destroy: true,
        ..Lifecycle::default()
    });
    let outcome = plan(&ctx, &node(cbd), Some(&current)).await;
    assert_eq!(outcome.change.action, Action::CreateThenDelete);
}

#[tokio::test]
async fn test_marks_survive_provider_echo() {
    let (ctx, _) = context(ScriptedProvider::default());
    let paths = [Path::attr("a"), Path::attr("tags").key("k1")];
    let mut current = recorded(1.0, "secret", Value::map([("k1", Value::string("v1"))]));
    current.value = current.value.value.mark_with_paths(&ValueMarks::sensitive(&paths));

    let n = node(resource());
    let refreshed = n
        .refresh(&ctx, Some(&current))
        .await
        .expect("refresh succeeds")
        .object
        .expect("object refreshed");
    assert_eq!(refreshed.value.marks, current.value.marks);
    assert_eq!(refreshed.value.marks.len(), paths.len());

    n.write_resource_instance_state(&ctx, Some(&refreshed), None, PhaseState::Refresh)
        .expect("writes refresh state");
    let stored = n
        .read_resource_instance_state(&ctx, PhaseState::Refresh)
        .expect("reads refresh state")
        .expect("stored");
    assert_eq!(stored.value, current.value);
}

#[tokio::test]
async fn test_null_writes_remove_records() {
    let (ctx, _) = context(ScriptedProvider::default());
    let n = node(resource().with_attribute("x", serde_json::json!(1)));
    let current = recorded(1.0, "a", Value::Null);

    n.write_resource_instance_state(&ctx, Some(&current), None, PhaseState::Working)
        .expect("writes state");
    assert!(n
        .read_resource_instance_state(&ctx, PhaseState::Working)
        .expect("reads")
        .is_some());
    n.write_resource_instance_state(&ctx, None, None, PhaseState::Working)
        .expect("removes state");
    assert!(n
        .read_resource_instance_state(&ctx, PhaseState::Working)
        .expect("reads")
        .is_none());

    let null_object = ResourceInstanceObject::new(Value::Null);
    n.write_resource_instance_state(&ctx, Some(&current), None, PhaseState::Working)
        .expect("writes state");
    n.write_resource_instance_state(&ctx, Some(&null_object), None, PhaseState::Working)
        .expect("removes state");
    assert!(n
        .read_resource_instance_state(&ctx, PhaseState::Working)
        .expect("reads")
        .is_none());

    let outcome = plan(&ctx, &n, None).await;
    n.write_change(&ctx, Some(&outcome.change), None).expect("records change");
    assert_eq!(ctx.changes().len(), 1);
    n.write_change(&ctx, None, None).expect("removes change");
    assert!(ctx.changes().is_empty());
    assert!(n.read_diff(&ctx).expect("reads diff").is_none());
}

#[tokio::test]
async fn test_state_persists_across_runs() {
    let dir = tempfile::tempdir().expect("temp dir");
    let store = LocalStateStore::with_state_path(dir.path().join("state.json"));
    let (ctx, _) = context(ScriptedProvider::default());
    let n = node(resource().with_attribute("a", serde_json::json!("one")).with_sensitive(Path::attr("a")));

    let create = plan(&ctx, &n, None).await;
    let created = n
        .apply(&ctx, &create.change, None)
        .await
        .expect("apply succeeds")
        .into_result()
        .expect("no provider error");
    n.write_resource_instance_state(&ctx, created.as_ref(), Some(&[]), PhaseState::Working)
        .expect("writes state");
    ctx.state().persist(&store).await.expect("persists");

    let reloaded = Arc::new(SyncState::load(&store).await.expect("loads"));
    let (ctx, _) = context(ScriptedProvider::default());
    let ctx = ctx.with_state(reloaded);
    let current = n
        .read_resource_instance_state(&ctx, PhaseState::Working)
        .expect("reads state")
        .expect("object persisted");
    assert_eq!(current.status, ObjectStatus::Ready);
    assert!(current.value.marks.has(&Path::attr("a"), Mark::Sensitive));
    assert_eq!(current.private.as_deref(), Some(b"applied".as_slice()));

    let outcome = plan(&ctx, &n, Some(&current)).await;
    assert_eq!(outcome.change.action, Action::NoOp);
}

#[tokio::test]
async fn test_prevent_destroy_blocks_plan_and_record() {
    let (ctx, provider) = context(ScriptedProvider::replacing(Path::attr("x")));
    let current = recorded(1.0, "same", Value::Null);
    let n = node(
        resource()
            .with_attribute("x", serde_json::json!(2))
            .with_attribute("a", serde_json::json!("same"))
            .with_lifecycle(Lifecycle {
                prevent_destroy: true,
                ..Lifecycle::default()
            }),
    );

    let err = n
        .plan(&ctx, None, Some(&current), false)
        .await
        .expect_err("replacing a protected instance");
    assert!(matches!(err, LifecycleError::Policy(PolicyError::PreventDestroy { .. })));
    assert!(provider.plans.load(Ordering::SeqCst) >= 1);
    assert!(ctx.changes().is_empty());

    let delete = n
        .plan_destroy(&ctx, Some(&current), None)
        .expect("plans destroy")
        .expect("delete change");
    let err = n
        .write_change(&ctx, Some(&delete), None)
        .expect_err("recording a protected delete");
    assert!(matches!(err, LifecycleError::Policy(PolicyError::PreventDestroy { .. })));
    assert!(ctx.changes().is_empty());
    assert!(n.read_diff(&ctx).expect("reads diff").is_none());
}

#[tokio::test]
async fn test_map_key_marks_persist_across_runs() {
    let dir = tempfile::tempdir().expect("temp dir");
    let store = LocalStateStore::with_state_path(dir.path().join("state.json"));
    let (ctx, _) = context(ScriptedProvider::default());
    let n = node(resource());

    let keys = ["quote\"d", "br]acket", "line\nbreak", "back\\slash", "ünïcødé"];
    let tags = Value::map(keys.iter().map(|k| (*k, Value::string("secret"))));
    let paths: Vec<Path> = keys.iter().map(|k| Path::attr("tags").key(*k)).collect();
    let mut current = recorded(1.0, "a", tags);
    current.value = current.value.value.mark_with_paths(&ValueMarks::sensitive(&paths));
    assert_eq!(current.value.marks.len(), keys.len());

    n.write_resource_instance_state(&ctx, Some(&current), None, PhaseState::Working)
        .expect("writes state");
    ctx.state().persist(&store).await.expect("persists");

    let reloaded = Arc::new(SyncState::load(&store).await.expect("loads"));
    let (ctx, _) = context(ScriptedProvider::default());
    let ctx = ctx.with_state(reloaded);
    let stored = n
        .read_resource_instance_state(&ctx, PhaseState::Working)
        .expect("reads state")
        .expect("object persisted");
    for path in &paths {
        assert!(stored.value.marks.has(path, Mark::Sensitive), "lost mark at {path}");
    }
    assert_eq!(stored.value, current.value);
}
