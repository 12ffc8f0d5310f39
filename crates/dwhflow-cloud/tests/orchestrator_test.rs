//! Pipeline tests against the in-memory cloud

use dwhflow_cloud::fake::FakeCloud;
use dwhflow_cloud::{
    ActionType, CloudError, CreateContext, Orchestrator, PollPolicy, ResourceKind, fields,
};
use dwhflow_config::{ConfigError, ConfigStore, StateLock, Template, section};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

const PASSWORD: &str = "Passw0rd!";

fn setup() -> (TempDir, PathBuf, Arc<FakeCloud>, Orchestrator) {
    let temp_dir = tempfile::tempdir().unwrap();
    let path = temp_dir.path().join("dwh.cfg");
    let fake = Arc::new(FakeCloud::new());
    let orchestrator = Orchestrator::new(
        &path,
        Template::standard("admin"),
        fake.provisioners(PollPolicy::default()),
    );
    (temp_dir, path, fake, orchestrator)
}

fn load(path: &Path) -> ConfigStore {
    ConfigStore::load(path).unwrap()
}

#[tokio::test(start_paused = true)]
async fn test_build_twice_is_idempotent() {
    let (_dir, path, fake, orchestrator) = setup();

    let first = orchestrator.build_all("admin", PASSWORD).await.unwrap();
    assert_eq!(first.changed(), 3);
    assert!(!fake.calls().is_empty());
    let after_first = fs::read(&path).unwrap();

    fake.clear_calls();
    let second = orchestrator.build_all("admin", PASSWORD).await.unwrap();

    assert_eq!(second.changed(), 0);
    assert!(second.steps.iter().all(|s| s.action == ActionType::NoOp));
    assert!(fake.calls().is_empty());
    assert_eq!(fs::read(&path).unwrap(), after_first);
}

#[tokio::test(start_paused = true)]
async fn test_teardown_restores_template_keys() {
    let (_dir, path, _fake, orchestrator) = setup();
    let template_keys = ConfigStore::from_template(&Template::standard("admin")).qualified_keys();

    orchestrator.build_all("admin", PASSWORD).await.unwrap();
    assert_ne!(load(&path).qualified_keys(), template_keys);

    let report = orchestrator.teardown_all().await.unwrap();
    assert_eq!(report.changed(), 3);
    assert_eq!(
        report.steps.iter().map(|s| s.kind).collect::<Vec<_>>(),
        ResourceKind::TEARDOWN_ORDER.to_vec()
    );
    assert_eq!(load(&path).qualified_keys(), template_keys);
}

#[tokio::test(start_paused = true)]
async fn test_scenario_resolves_port_and_vpc_id() {
    let (_dir, path, _fake, orchestrator) = setup();

    orchestrator.build_all("admin", PASSWORD).await.unwrap();

    let store = load(&path);
    assert_eq!(store.get(section::CLUSTER, "db_port").unwrap(), "5439");
    assert_eq!(store.get(section::VPC, "id").unwrap(), "vpc-0001");
    assert_eq!(store.get(section::CLUSTER, "db_user").unwrap(), "admin");
    assert_eq!(
        store.get(section::CLUSTER, "db_host").unwrap(),
        "dwh-cluster.fake.redshift.amazonaws.com"
    );
}

#[tokio::test(start_paused = true)]
async fn test_failure_stops_pipeline_and_resumes() {
    let (_dir, path, fake, orchestrator) = setup();
    fake.fail_on("attach_role_policy");

    let result = orchestrator.build_all("admin", PASSWORD).await;
    assert!(matches!(result, Err(CloudError::Api { .. })));

    let store = load(&path);
    assert!(ResourceKind::Network.is_provisioned(&store));
    assert!(fields::ROLE_ARN.is_set(&store));
    assert!(!fields::ROLE_ATTACHED_POLICY.is_set(&store));
    assert!(ResourceKind::Cluster.is_absent(&store));
    assert_eq!(fake.count("create_cluster"), 0);

    fake.clear_failure();
    fake.clear_calls();
    let report = orchestrator.build_all("admin", PASSWORD).await.unwrap();

    assert_eq!(report.steps[0].action, ActionType::NoOp);
    assert_eq!(fake.count("create_role"), 0);
    assert_eq!(fake.count("attach_role_policy"), 1);
    assert_eq!(fake.count("create_cluster"), 1);
}

#[tokio::test(start_paused = true)]
async fn test_teardown_after_partial_build() {
    let (_dir, path, fake, orchestrator) = setup();
    fake.fail_on("create_subnet");
    assert!(orchestrator.build_all("admin", PASSWORD).await.is_err());
    fake.clear_failure();
    fake.clear_calls();

    let report = orchestrator.teardown_all().await.unwrap();

    assert_eq!(report.steps[0].action, ActionType::NoOp);
    assert_eq!(report.steps[1].action, ActionType::NoOp);
    assert_eq!(report.steps[2].action, ActionType::Delete);
    assert_eq!(fake.count("delete_subnet"), 0);
    assert_eq!(fake.count("disassociate_route_table"), 0);
    assert_eq!(fake.count("delete_vpc"), 1);
    assert!(ResourceKind::Network.is_absent(&load(&path)));
}

#[tokio::test]
async fn test_single_steps_require_existing_file() {
    let (_dir, _path, fake, orchestrator) = setup();

    let result = orchestrator
        .create(ResourceKind::Network, &CreateContext::default())
        .await;

    assert!(matches!(
        result,
        Err(CloudError::Config(ConfigError::NotFound { .. }))
    ));
    assert!(fake.calls().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_single_steps_in_order() {
    let (_dir, path, fake, orchestrator) = setup();
    ConfigStore::init_from_template(&path, &Template::standard("admin")).unwrap();

    // Cluster before its prerequisites
    let result = orchestrator
        .create(ResourceKind::Cluster, &CreateContext::with_password(PASSWORD))
        .await;
    assert!(matches!(result, Err(CloudError::Precondition(_))));
    assert!(fake.calls().is_empty());

    for kind in ResourceKind::BUILD_ORDER {
        let outcome = orchestrator
            .create(kind, &CreateContext::with_password(PASSWORD))
            .await
            .unwrap();
        assert_eq!(outcome.action, ActionType::Create);
    }
    let again = orchestrator
        .create(ResourceKind::IamRole, &CreateContext::default())
        .await
        .unwrap();
    assert_eq!(again.action, ActionType::NoOp);

    let outcome = orchestrator.delete(ResourceKind::Cluster).await.unwrap();
    assert_eq!(outcome.action, ActionType::Delete);
    let outcome = orchestrator.delete(ResourceKind::Cluster).await.unwrap();
    assert_eq!(outcome.action, ActionType::NoOp);
}

#[tokio::test]
async fn test_build_refuses_while_locked() {
    let (_dir, path, fake, orchestrator) = setup();
    let _held = StateLock::acquire(&path).unwrap();

    let result = orchestrator.build_all("admin", PASSWORD).await;

    assert!(matches!(
        result,
        Err(CloudError::Config(ConfigError::Locked { .. }))
    ));
    assert!(fake.calls().is_empty());
    assert!(!path.exists());
}

#[tokio::test(start_paused = true)]
async fn test_plans_follow_recorded_state() {
    let (_dir, _path, _fake, orchestrator) = setup();

    let plan = orchestrator.plan_build().unwrap();
    assert_eq!(plan.summary().to_string(), "3 to create, 0 to delete, 0 unchanged");
    assert!(orchestrator.plan_teardown().is_err());

    orchestrator.build_all("admin", PASSWORD).await.unwrap();

    let plan = orchestrator.plan_build().unwrap();
    assert!(!plan.has_changes);
    let plan = orchestrator.plan_teardown().unwrap();
    assert_eq!(plan.summary().to_string(), "0 to create, 3 to delete, 0 unchanged");
}

#[tokio::test(start_paused = true)]
async fn test_bounded_poll_times_out() {
    let temp_dir = tempfile::tempdir().unwrap();
    let path = temp_dir.path().join("dwh.cfg");
    let fake = Arc::new(
        FakeCloud::new()
            .with_status_script(std::iter::repeat_n(dwhflow_cloud::ClusterStatus::Creating, 50)),
    );
    let orchestrator = Orchestrator::new(
        &path,
        Template::standard("admin"),
        fake.provisioners(PollPolicy::bounded(std::time::Duration::from_secs(60))),
    );

    let result = orchestrator.build_all("admin", PASSWORD).await;

    assert!(matches!(result, Err(CloudError::Timeout { .. })));
    let store = load(&path);
    assert!(fields::CLUSTER_ID.is_set(&store));
    assert!(!fields::CLUSTER_DB_HOST.is_set(&store));
}
