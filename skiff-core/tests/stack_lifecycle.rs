//! Integration tests for stack lifecycle operations.
//!
//! Exercises the full path: manifest -> dependency resolution -> lifecycle
//! controller -> runtime seam, using the in-memory stub runtime and an
//! in-memory state database.

use skiff_core::lifecycle::{LifecycleController, UpOptions};
use skiff_core::manifest::ManifestLoader;
use skiff_core::runtime::StubRuntime;
use skiff_core::types::{RunState, StackSpec};
use skiff_core::{Config, SkiffError, StateManager};
use std::collections::HashMap;
use std::sync::Arc;
use tempfile::TempDir;

struct Harness {
    controller: LifecycleController,
    runtime: Arc<StubRuntime>,
    state: Arc<StateManager>,
    _temp: TempDir,
}

async fn harness() -> Harness {
    let temp = TempDir::new().expect("temp dir");
    let state = Arc::new(StateManager::new_in_memory().await.expect("state manager"));
    let runtime = Arc::new(StubRuntime::new());

    let config = Config {
        readiness_timeout_secs: 1,
        readiness_interval_ms: 10,
        stop_timeout_secs: 1,
        ..Default::default()
    };

    let controller = LifecycleController::with_volume_root(
        Arc::clone(&state),
        Arc::clone(&runtime) as Arc<dyn skiff_core::ContainerRuntime>,
        &config,
        temp.path().join("volumes"),
    );

    Harness { controller, runtime, state, _temp: temp }
}

fn load(manifest: &str, env: &[(&str, &str)]) -> skiff_core::Result<StackSpec> {
    let env: HashMap<String, String> =
        env.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
    ManifestLoader::parse(manifest, &env, "demo")
}

const TWO_TIER: &str = r#"
services:
  backend:
    image: backend:latest
    depends_on:
      - db
  db:
    image: postgres:16
    volumes:
      - db-data:/var/lib/postgresql/data
volumes:
  db-data: {}
"#;

#[tokio::test]
async fn test_up_starts_dependencies_first() {
    let h = harness().await;
    let spec = load(TWO_TIER, &[]).unwrap();

    let record = h.controller.up(&spec, &UpOptions::default()).await.unwrap();

    assert_eq!(h.runtime.launched(), vec!["demo_db".to_string(), "demo_backend".to_string()]);
    assert!(h.runtime.is_running("demo_db"));
    assert!(h.runtime.is_running("demo_backend"));

    assert_eq!(record.services.len(), 2);
    assert_eq!(record.services[0].name, "db");
    assert_eq!(record.services[0].start_order, 0);
    assert_eq!(record.services[1].name, "backend");

    assert_eq!(h.controller.service_state("db").await, Some(RunState::Running));
    assert_eq!(h.controller.service_state("backend").await, Some(RunState::Running));
}

#[tokio::test]
async fn test_start_failure_leaves_dependents_pending() {
    let h = harness().await;
    let spec = load(TWO_TIER, &[]).unwrap();

    h.runtime.fail_run("demo_db");

    let err = h.controller.up(&spec, &UpOptions::default()).await.unwrap_err();
    match err {
        SkiffError::Start { service, .. } => assert_eq!(service, "db"),
        other => panic!("expected Start for db, got {:?}", other),
    }

    // The dependent never left Pending and was never handed to the runtime.
    assert_eq!(h.controller.service_state("backend").await, Some(RunState::Pending));
    assert_eq!(h.controller.service_state("db").await, Some(RunState::Failed));
    assert!(!h.runtime.exists("demo_backend"));

    // Nothing was persisted for the failed deployment.
    assert!(matches!(
        h.state.get_stack("demo").await.unwrap_err(),
        SkiffError::StackNotFound { .. }
    ));
}

#[tokio::test]
async fn test_readiness_timeout_rolls_back_started_services() {
    let h = harness().await;
    let spec = load(TWO_TIER, &[]).unwrap();

    h.runtime.hold_ready("demo_db");

    let err = h.controller.up(&spec, &UpOptions::default()).await.unwrap_err();
    match err {
        SkiffError::ReadinessTimeout { service, .. } => assert_eq!(service, "db"),
        other => panic!("expected ReadinessTimeout for db, got {:?}", other),
    }

    // The never-ready container was cleaned up; the dependent stayed put.
    assert!(!h.runtime.exists("demo_db"));
    assert!(!h.runtime.exists("demo_backend"));
    assert_eq!(h.controller.service_state("backend").await, Some(RunState::Pending));
}

#[tokio::test]
async fn test_cycle_yields_error_and_no_partial_start() {
    let h = harness().await;
    let manifest = r#"
services:
  a:
    image: a:latest
    depends_on: [b]
  b:
    image: b:latest
    depends_on: [a]
"#;
    let spec = load(manifest, &[]).unwrap();

    let err = h.controller.up(&spec, &UpOptions::default()).await.unwrap_err();
    match err {
        SkiffError::Cycle { members } => {
            assert!(members.contains(&"a".to_string()));
            assert!(members.contains(&"b".to_string()));
        }
        other => panic!("expected Cycle, got {:?}", other),
    }

    // Validation aborted before any side effect.
    assert!(h.runtime.launched().is_empty());
    assert!(h.state.list_volumes().await.unwrap().is_empty());
    assert!(h.state.list_networks().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_missing_dependency_aborts_before_side_effects() {
    let h = harness().await;
    let manifest = r#"
services:
  web:
    image: web:latest
    depends_on: [ghost]
"#;
    let spec = load(manifest, &[]).unwrap();

    let err = h.controller.up(&spec, &UpOptions::default()).await.unwrap_err();
    assert!(matches!(err, SkiffError::MissingDependency { .. }));
    assert!(h.runtime.launched().is_empty());
}

#[tokio::test]
async fn test_volume_data_persists_across_cycles() {
    let h = harness().await;
    let spec = load(TWO_TIER, &[]).unwrap();

    // Cycle 1: deploy, write data through the stub store, tear down.
    h.controller.up(&spec, &UpOptions::default()).await.unwrap();
    h.runtime.write_volume("db-data", "row1");
    h.controller.down("demo", false).await.unwrap();

    assert!(!h.runtime.exists("demo_db"));
    let volume = h.state.get_volume("db-data").await.unwrap();
    assert!(volume.is_some(), "persistent volume must survive down");

    // Cycle 2: data written in cycle 1 is still there.
    h.controller.up(&spec, &UpOptions::default()).await.unwrap();
    assert_eq!(h.runtime.read_volume("db-data"), vec!["row1".to_string()]);
    h.runtime.write_volume("db-data", "row2");
    h.controller.down("demo", false).await.unwrap();

    assert_eq!(
        h.runtime.read_volume("db-data"),
        vec!["row1".to_string(), "row2".to_string()]
    );

    // Explicit removal is the only destroy path.
    h.controller.up(&spec, &UpOptions::default()).await.unwrap();
    h.controller.down("demo", true).await.unwrap();
    assert!(h.state.get_volume("db-data").await.unwrap().is_none());
}

#[tokio::test]
async fn test_scratch_volume_removed_on_down() {
    let h = harness().await;
    let manifest = r#"
services:
  worker:
    image: worker:latest
    volumes:
      - cache:/tmp/cache
volumes:
  cache:
    persistent: false
"#;
    let spec = load(manifest, &[]).unwrap();

    h.controller.up(&spec, &UpOptions::default()).await.unwrap();
    assert!(h.state.get_volume("cache").await.unwrap().is_some());

    h.controller.down("demo", false).await.unwrap();
    assert!(h.state.get_volume("cache").await.unwrap().is_none());
}

#[tokio::test]
async fn test_down_on_never_started_stack_is_noop() {
    let h = harness().await;
    assert!(h.controller.down("ghost", false).await.is_ok());
    assert!(h.controller.down("ghost", true).await.is_ok());
}

#[tokio::test]
async fn test_down_is_idempotent() {
    let h = harness().await;
    let spec = load(TWO_TIER, &[]).unwrap();

    h.controller.up(&spec, &UpOptions::default()).await.unwrap();
    h.controller.down("demo", false).await.unwrap();
    // Second down finds no stack record and succeeds quietly.
    h.controller.down("demo", false).await.unwrap();
}

#[tokio::test]
async fn test_undefined_variable_fails_before_any_start() {
    let h = harness().await;
    let manifest = r#"
services:
  db:
    image: postgres:16
    environment:
      POSTGRES_USER: ${POSTES_USER}
"#;
    // Loader rejects the manifest; the controller never sees a spec.
    let err = load(manifest, &[("POSTGRES_USER", "admin")]).unwrap_err();
    match err {
        SkiffError::UndefinedVariable { var, .. } => assert_eq!(var, "POSTES_USER"),
        other => panic!("expected UndefinedVariable, got {:?}", other),
    }
    assert!(h.runtime.launched().is_empty());
}

#[tokio::test]
async fn test_up_twice_without_down_is_rejected() {
    let h = harness().await;
    let spec = load(TWO_TIER, &[]).unwrap();

    h.controller.up(&spec, &UpOptions::default()).await.unwrap();
    let err = h.controller.up(&spec, &UpOptions::default()).await.unwrap_err();
    assert!(matches!(err, SkiffError::StackAlreadyDeployed { .. }));
}

#[tokio::test]
async fn test_build_sources_are_built_before_run() {
    let h = harness().await;
    let manifest = r#"
services:
  api:
    build: ./api
"#;
    let spec = load(manifest, &[]).unwrap();

    h.controller.up(&spec, &UpOptions { build: true }).await.unwrap();
    assert_eq!(h.runtime.built_images(), vec!["skiff/api:latest".to_string()]);
    assert!(h.runtime.is_running("demo_api"));
}

#[tokio::test]
async fn test_networks_exist_before_services_and_survive_down() {
    let h = harness().await;
    let spec = load(TWO_TIER, &[]).unwrap();

    h.controller.up(&spec, &UpOptions::default()).await.unwrap();
    let networks = h.state.list_networks().await.unwrap();
    assert_eq!(networks.len(), 1);
    assert_eq!(networks[0].name, "demo_default");

    // Networks are destroyed only by explicit removal.
    h.controller.down("demo", false).await.unwrap();
    assert!(h.state.get_network("demo_default").await.unwrap().is_some());

    h.controller.up(&spec, &UpOptions::default()).await.unwrap();
    h.controller.down("demo", true).await.unwrap();
    assert!(h.state.get_network("demo_default").await.unwrap().is_none());
}

#[tokio::test]
async fn test_wave_parallelism_respects_edges() {
    let h = harness().await;
    let manifest = r#"
services:
  web:
    image: web:latest
    depends_on: [api, cache]
  api:
    image: api:latest
    depends_on: [db]
  cache:
    image: cache:latest
  db:
    image: db:latest
"#;
    let spec = load(manifest, &[]).unwrap();

    h.controller.up(&spec, &UpOptions::default()).await.unwrap();

    let launched = h.runtime.launched();
    let idx = |name: &str| launched.iter().position(|s| s == name).unwrap();
    assert!(idx("demo_db") < idx("demo_api"));
    assert!(idx("demo_api") < idx("demo_web"));
    assert!(idx("demo_cache") < idx("demo_web"));
}

#[tokio::test]
async fn test_events_report_lifecycle_progress() {
    let h = harness().await;
    let spec = load(TWO_TIER, &[]).unwrap();

    let mut subscriber = h.controller.events().subscribe(vec!["stack.*".to_string()]);

    h.controller.up(&spec, &UpOptions::default()).await.unwrap();
    let event = subscriber.recv().await.unwrap();
    assert_eq!(event.event_type, "stack.up");
    assert_eq!(event.resource_id, "demo");

    h.controller.down("demo", false).await.unwrap();
    let event = subscriber.recv().await.unwrap();
    assert_eq!(event.event_type, "stack.down");
}
