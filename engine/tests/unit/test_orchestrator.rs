//! Orchestrator tests against in-memory collaborators

use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{Duration, TimeZone, Utc};

use stackrail::clock::{FixedClock, SharedClock};
use stackrail::config::options::OrchestratorOptions;
use stackrail::domain::{DeploymentStatus, ProductDeploymentStatus, StackDeploymentConfig, StackDeploymentStatus};
use stackrail::errors::EngineError;
use stackrail::ids::{EnvironmentId, UserId};
use stackrail::orchestrator::product::{Collaborators, ProductDeployRequest, ProductOrchestrator};
use stackrail::ports::{
    ProductDeploymentRepository, ServiceRuntimeInfo, StackDefinition, StackDeployRequest, StackRuntime,
};
use stackrail::store::catalog::InMemoryCatalog;
use stackrail::store::deployments::{InMemoryDeploymentRepository, InMemoryProductDeploymentRepository};
use stackrail::store::publisher::RecordingPublisher;

/// Runtime whose failures are decided up front, per project name
#[derive(Default)]
struct ScriptedRuntime {
    failing_deploys: Mutex<HashSet<String>>,
    failing_removals: Mutex<HashSet<String>>,
    deployed: Mutex<Vec<String>>,
    removed: Mutex<Vec<String>>,
}

impl ScriptedRuntime {
    fn fail_deploy(self, project_name: &str) -> Self {
        self.failing_deploys.lock().unwrap().insert(project_name.to_string());
        self
    }

    fn fail_removal(self, project_name: &str) -> Self {
        self.failing_removals.lock().unwrap().insert(project_name.to_string());
        self
    }

    /// Let every later deploy and removal succeed
    fn recover(&self) {
        self.failing_deploys.lock().unwrap().clear();
        self.failing_removals.lock().unwrap().clear();
    }

    fn deployed(&self) -> Vec<String> {
        self.deployed.lock().unwrap().clone()
    }

    fn removed(&self) -> Vec<String> {
        self.removed.lock().unwrap().clone()
    }
}

#[async_trait]
impl StackRuntime for ScriptedRuntime {
    async fn deploy_stack(
        &self,
        request: &StackDeployRequest,
    ) -> Result<Vec<ServiceRuntimeInfo>, EngineError> {
        self.deployed.lock().unwrap().push(request.project_name.clone());
        if self.failing_deploys.lock().unwrap().contains(&request.project_name) {
            return Err(EngineError::RuntimeError(format!(
                "{}: container exited with code 1",
                request.project_name
            )));
        }
        Ok(vec![ServiceRuntimeInfo {
            service_name: "app".to_string(),
            image: Some(format!("{}:{}", request.stack_name, request.version)),
            container_id: format!("{}-app", request.project_name),
            container_name: format!("{}-app-1", request.project_name),
            status: "running".to_string(),
        }])
    }

    async fn remove_stack(
        &self,
        _environment_id: EnvironmentId,
        project_name: &str,
    ) -> Result<(), EngineError> {
        self.removed.lock().unwrap().push(project_name.to_string());
        if self.failing_removals.lock().unwrap().contains(project_name) {
            return Err(EngineError::RuntimeError(format!("{}: network in use", project_name)));
        }
        Ok(())
    }
}

struct Harness {
    orchestrator: ProductOrchestrator,
    deployments: Arc<InMemoryDeploymentRepository>,
    products: Arc<InMemoryProductDeploymentRepository>,
    runtime: Arc<ScriptedRuntime>,
    publisher: Arc<RecordingPublisher>,
    clock: Arc<FixedClock>,
    environment_id: EnvironmentId,
}

fn harness(runtime: ScriptedRuntime) -> Harness {
    let (shared, clock) = SharedClock::fixed(Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap());
    let deployments = Arc::new(InMemoryDeploymentRepository::new());
    let products = Arc::new(InMemoryProductDeploymentRepository::new());
    let runtime = Arc::new(runtime);
    let publisher = Arc::new(RecordingPublisher::new());
    let catalog = Arc::new(InMemoryCatalog::new());
    catalog.insert(StackDefinition {
        stack_id: "local:shop:db".to_string(),
        stack_name: "db".to_string(),
        stack_display_name: "Database".to_string(),
        product_name: "shop".to_string(),
        product_display_name: "Web Shop".to_string(),
        version: None,
        services: vec!["app".to_string()],
    });

    let deps = Collaborators {
        deployments: deployments.clone(),
        products: products.clone(),
        catalog,
        runtime: runtime.clone(),
        publisher: publisher.clone(),
    };
    Harness {
        orchestrator: ProductOrchestrator::new(deps, shared, OrchestratorOptions::default()),
        deployments,
        products,
        runtime,
        publisher,
        clock,
        environment_id: EnvironmentId::new(),
    }
}

fn request(h: &Harness, version: &str, stacks: &[&str]) -> ProductDeployRequest {
    ProductDeployRequest {
        environment_id: h.environment_id,
        product_group_id: "local:shop".to_string(),
        product_id: format!("local:shop:{}", version),
        product_name: "shop".to_string(),
        product_display_name: String::new(),
        product_version: version.to_string(),
        deployed_by: UserId::new(),
        stacks: stacks
            .iter()
            .map(|name| StackDeploymentConfig::new(format!("local:shop:{}", name), *name))
            .collect(),
        shared_variables: BTreeMap::from([("DOMAIN".to_string(), "shop.local".to_string())]),
        continue_on_error: None,
    }
}

#[test]
fn test_deploy_product_happy_path() {
    let h = harness(ScriptedRuntime::default());
    let product = tokio_test::block_on(
        h.orchestrator
            .deploy_product(request(&h, "1.0.0", &["db", "api", "web"])),
    )
    .unwrap();

    assert_eq!(product.status(), ProductDeploymentStatus::Running);
    assert_eq!(product.completed_stacks(), 3);
    assert_eq!(h.runtime.deployed(), vec!["shop-db", "shop-api", "shop-web"]);

    // Names resolved through the catalog
    assert_eq!(product.product_display_name(), "Web Shop");
    assert_eq!(product.stack("db").unwrap().stack_display_name(), "Database");

    let deployments = tokio_test::block_on(h.deployments.all());
    assert_eq!(deployments.len(), 3);
    for deployment in &deployments {
        assert_eq!(deployment.status(), DeploymentStatus::Running);
        assert_eq!(deployment.stack_version(), Some("1.0.0"));
        assert_eq!(deployment.variables()["DOMAIN"], "shop.local");
        assert!(deployment.are_all_services_healthy());
    }

    let types = h.publisher.event_types();
    assert_eq!(types.first().map(String::as_str), Some("ProductDeploymentInitiated"));
    assert_eq!(types.last().map(String::as_str), Some("ProductDeploymentCompleted"));
    assert_eq!(h.publisher.count("DeploymentStarted"), 3);
    assert_eq!(h.publisher.count("ProductStackDeploymentCompleted"), 3);
    assert_eq!(h.publisher.count("ProductDeploymentCompleted"), 1);
}

#[test]
fn test_failed_stack_leaves_product_partially_running() {
    let h = harness(ScriptedRuntime::default().fail_deploy("shop-api"));
    let product = tokio_test::block_on(
        h.orchestrator
            .deploy_product(request(&h, "1.0.0", &["db", "api", "web"])),
    )
    .unwrap();

    assert_eq!(product.status(), ProductDeploymentStatus::PartiallyRunning);
    assert_eq!(product.completed_stacks(), 2);
    assert_eq!(product.failed_stacks(), 1);
    assert!(product.error_message().unwrap().contains("api"));
    assert_eq!(h.runtime.deployed().len(), 3);

    let api = product.stack("api").unwrap();
    assert_eq!(api.status(), StackDeploymentStatus::Failed);
    assert!(api.error_message().unwrap().contains("exited"));

    let deployment = tokio_test::block_on(h.deployments.all())
        .into_iter()
        .find(|d| d.project_name() == "shop-api")
        .unwrap();
    assert_eq!(deployment.status(), DeploymentStatus::Failed);
    assert_eq!(h.publisher.count("ProductDeploymentPartiallyCompleted"), 1);
}

#[test]
fn test_abort_on_first_failure() {
    let h = harness(ScriptedRuntime::default().fail_deploy("shop-db"));
    let mut req = request(&h, "1.0.0", &["db", "api", "web"]);
    req.continue_on_error = Some(false);
    let product = tokio_test::block_on(h.orchestrator.deploy_product(req)).unwrap();

    assert_eq!(product.status(), ProductDeploymentStatus::Failed);
    assert_eq!(h.runtime.deployed(), vec!["shop-db"]);
    assert_eq!(product.pending_stacks(), 2);
    assert!(product.error_message().unwrap().contains("aborted"));
    assert_eq!(h.publisher.count("ProductDeploymentFailed"), 1);
}

#[test]
fn test_all_stacks_failing_fails_product() {
    let h = harness(
        ScriptedRuntime::default()
            .fail_deploy("shop-db")
            .fail_deploy("shop-web"),
    );
    let product = tokio_test::block_on(
        h.orchestrator.deploy_product(request(&h, "1.0.0", &["db", "web"])),
    )
    .unwrap();

    assert_eq!(product.status(), ProductDeploymentStatus::Failed);
    assert_eq!(product.failed_stacks(), 2);
    assert!(product.can_remove());
}

#[test]
fn test_remove_product_in_reverse_order() {
    let h = harness(ScriptedRuntime::default());
    let product = tokio_test::block_on(
        h.orchestrator
            .deploy_product(request(&h, "1.0.0", &["db", "api", "web"])),
    )
    .unwrap();

    let removed = tokio_test::block_on(h.orchestrator.remove_product(product.id())).unwrap();
    assert_eq!(removed.status(), ProductDeploymentStatus::Removed);
    assert_eq!(h.runtime.removed(), vec!["shop-web", "shop-api", "shop-db"]);
    assert!(tokio_test::block_on(h.deployments.all())
        .iter()
        .all(|d| d.status() == DeploymentStatus::Removed));
    assert_eq!(h.publisher.count("ProductStackRemoved"), 3);
    assert_eq!(h.publisher.count("ProductDeploymentRemoved"), 1);

    let stored = tokio_test::block_on(h.products.get(product.id())).unwrap().unwrap();
    assert!(stored.is_terminal());
}

#[test]
fn test_remove_product_with_stuck_stack() {
    let h = harness(ScriptedRuntime::default().fail_removal("shop-api"));
    let product = tokio_test::block_on(
        h.orchestrator
            .deploy_product(request(&h, "1.0.0", &["db", "api", "web"])),
    )
    .unwrap();

    let removing = tokio_test::block_on(h.orchestrator.remove_product(product.id())).unwrap();
    assert_eq!(removing.status(), ProductDeploymentStatus::Removing);
    assert_eq!(removing.failed_stacks(), 1);
    assert_eq!(removing.stack("db").unwrap().status(), StackDeploymentStatus::Removed);
    assert_eq!(h.runtime.removed(), vec!["shop-web", "shop-api", "shop-db"]);
}

#[test]
fn test_remove_unknown_product_is_not_found() {
    let h = harness(ScriptedRuntime::default());
    let err = tokio_test::block_on(
        h.orchestrator
            .remove_product(stackrail::ids::ProductDeploymentId::new()),
    )
    .unwrap_err();
    assert!(matches!(err, EngineError::NotFound(_)));
}

#[test]
fn test_upgrade_product() {
    let h = harness(ScriptedRuntime::default());
    let installed = tokio_test::block_on(
        h.orchestrator
            .deploy_product(request(&h, "1.0.0", &["db", "web", "legacy"])),
    )
    .unwrap();
    let db_before = tokio_test::block_on(h.deployments.all())
        .into_iter()
        .find(|d| d.project_name() == "shop-db")
        .unwrap();

    h.clock.advance(Duration::hours(1));
    let upgraded = tokio_test::block_on(h.orchestrator.upgrade_product(
        installed.id(),
        request(&h, "2.0.0", &["db", "web", "search"]),
    ))
    .unwrap();

    assert_ne!(upgraded.id(), installed.id());
    assert_eq!(upgraded.status(), ProductDeploymentStatus::Running);
    assert_eq!(upgraded.previous_version(), Some("1.0.0"));
    assert!(upgraded.stack("search").unwrap().is_new_in_upgrade());
    assert!(!upgraded.stack("db").unwrap().is_new_in_upgrade());

    // Existing stacks are upgraded in place, new ones installed
    let deployments = tokio_test::block_on(h.deployments.all());
    let db = deployments.iter().find(|d| d.project_name() == "shop-db").unwrap();
    assert_eq!(db.id(), db_before.id());
    assert_eq!(db.stack_version(), Some("2.0.0"));
    assert_eq!(db.previous_version(), Some("1.0.0"));
    assert_eq!(db.upgrade_count(), 1);
    let search = deployments.iter().find(|d| d.project_name() == "shop-search").unwrap();
    assert_eq!(search.stack_version(), Some("2.0.0"));
    assert_eq!(search.upgrade_count(), 0);

    // The dropped stack is retired
    assert_eq!(h.runtime.removed(), vec!["shop-legacy"]);
    let legacy = deployments.iter().find(|d| d.project_name() == "shop-legacy").unwrap();
    assert_eq!(legacy.status(), DeploymentStatus::Removed);

    assert_eq!(h.publisher.count("ProductUpgradeInitiated"), 1);
    assert_eq!(h.publisher.count("DeploymentUpgraded"), 2);

    let active = tokio_test::block_on(
        h.products.get_active_for_product(h.environment_id, "local:shop"),
    )
    .unwrap()
    .unwrap();
    assert_eq!(active.id(), upgraded.id());
}

#[test]
fn test_upgrade_requires_operational_product() {
    let h = harness(ScriptedRuntime::default().fail_deploy("shop-db"));
    let installed = tokio_test::block_on(
        h.orchestrator.deploy_product(request(&h, "1.0.0", &["db"])),
    )
    .unwrap();
    assert_eq!(installed.status(), ProductDeploymentStatus::Failed);

    let err = tokio_test::block_on(
        h.orchestrator
            .upgrade_product(installed.id(), request(&h, "2.0.0", &["db"])),
    )
    .unwrap_err();
    assert!(matches!(err, EngineError::Domain(ref e) if e.is_illegal_transition()));
}

#[test]
fn test_remove_product_resumes_after_stuck_stack() {
    let h = harness(ScriptedRuntime::default().fail_removal("shop-api"));
    let product = tokio_test::block_on(
        h.orchestrator
            .deploy_product(request(&h, "1.0.0", &["db", "api", "web"])),
    )
    .unwrap();

    let removing = tokio_test::block_on(h.orchestrator.remove_product(product.id())).unwrap();
    assert_eq!(removing.status(), ProductDeploymentStatus::Removing);

    // Still stuck: the stack stays failed and nothing else is touched
    let removing = tokio_test::block_on(h.orchestrator.remove_product(product.id())).unwrap();
    assert_eq!(removing.status(), ProductDeploymentStatus::Removing);
    assert_eq!(removing.failed_stacks(), 1);
    assert_eq!(removing.removed_stacks(), 2);

    h.runtime.recover();
    let removed = tokio_test::block_on(h.orchestrator.remove_product(product.id())).unwrap();
    assert_eq!(removed.status(), ProductDeploymentStatus::Removed);
    assert_eq!(
        h.runtime.removed(),
        vec!["shop-web", "shop-api", "shop-db", "shop-api", "shop-api"]
    );
    assert!(tokio_test::block_on(h.deployments.all())
        .iter()
        .all(|d| d.status() == DeploymentStatus::Removed));
    assert_eq!(h.publisher.count("ProductRemovalInitiated"), 1);
    assert_eq!(h.publisher.count("ProductStackRemoved"), 3);
    assert_eq!(h.publisher.count("ProductDeploymentRemoved"), 1);
}

#[test]
fn test_superseded_record_is_rejected() {
    let h = harness(ScriptedRuntime::default());
    let installed = tokio_test::block_on(
        h.orchestrator.deploy_product(request(&h, "1.0.0", &["db", "web"])),
    )
    .unwrap();
    h.clock.advance(Duration::minutes(30));
    let upgraded = tokio_test::block_on(h.orchestrator.upgrade_product(
        installed.id(),
        request(&h, "2.0.0", &["db", "web"]),
    ))
    .unwrap();

    let err = tokio_test::block_on(h.orchestrator.remove_product(installed.id())).unwrap_err();
    assert!(matches!(err, EngineError::Domain(ref e) if e.is_illegal_transition()));
    let err = tokio_test::block_on(h.orchestrator.upgrade_product(
        installed.id(),
        request(&h, "3.0.0", &["db", "web"]),
    ))
    .unwrap_err();
    assert!(matches!(err, EngineError::Domain(ref e) if e.is_illegal_transition()));

    // The live product and its containers are untouched
    assert!(h.runtime.removed().is_empty());
    assert!(tokio_test::block_on(h.deployments.all())
        .iter()
        .all(|d| d.status() == DeploymentStatus::Running));
    let live = tokio_test::block_on(h.products.get(upgraded.id())).unwrap().unwrap();
    assert_eq!(live.status(), ProductDeploymentStatus::Running);

    let removed = tokio_test::block_on(h.orchestrator.remove_product(upgraded.id())).unwrap();
    assert_eq!(removed.status(), ProductDeploymentStatus::Removed);
    assert_eq!(h.runtime.removed(), vec!["shop-web", "shop-db"]);
}

#[test]
fn test_upgrade_retries_stack_that_never_ran() {
    let h = harness(ScriptedRuntime::default().fail_deploy("shop-web"));
    let installed = tokio_test::block_on(
        h.orchestrator.deploy_product(request(&h, "1.0.0", &["db", "web"])),
    )
    .unwrap();
    assert_eq!(installed.status(), ProductDeploymentStatus::PartiallyRunning);

    h.runtime.recover();
    h.clock.advance(Duration::minutes(5));
    let upgraded = tokio_test::block_on(h.orchestrator.upgrade_product(
        installed.id(),
        request(&h, "2.0.0", &["db", "web"]),
    ))
    .unwrap();
    assert_eq!(upgraded.status(), ProductDeploymentStatus::Running);

    let web = tokio_test::block_on(h.deployments.all())
        .into_iter()
        .find(|d| d.project_name() == "shop-web")
        .unwrap();
    assert_eq!(web.status(), DeploymentStatus::Running);
    assert_eq!(web.stack_version(), Some("2.0.0"));
    let messages: Vec<&str> = web.phase_history().iter().map(|r| r.message.as_str()).collect();
    assert!(messages.contains(&"Retry of 2.0.0 started"));
    assert!(!messages.iter().any(|m| m.starts_with("Rollback")));
}
