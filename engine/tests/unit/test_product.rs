//! Product deployment aggregate tests

use std::collections::BTreeMap;

use stackrail::clock::SharedClock;
use stackrail::domain::{
    NewProductDeployment, ProductDeployment, ProductDeploymentEvent, ProductDeploymentStatus,
    ProductUpgrade, StackDeploymentConfig, StackDeploymentStatus,
};
use stackrail::ids::{DeploymentId, EnvironmentId, ProductDeploymentId, UserId};

fn configs(names: &[&str]) -> Vec<StackDeploymentConfig> {
    names
        .iter()
        .map(|name| StackDeploymentConfig::new(format!("local:shop:{}", name), *name))
        .collect()
}

fn request(names: &[&str]) -> NewProductDeployment {
    NewProductDeployment {
        id: ProductDeploymentId::new(),
        environment_id: EnvironmentId::new(),
        product_group_id: "local:shop".to_string(),
        product_id: "local:shop:1.0.0".to_string(),
        product_name: "shop".to_string(),
        product_display_name: "Shop".to_string(),
        product_version: "1.0.0".to_string(),
        deployed_by: UserId::new(),
        stack_configs: configs(names),
        shared_variables: BTreeMap::new(),
        continue_on_error: true,
    }
}

fn product(names: &[&str]) -> ProductDeployment {
    let (product, _) = ProductDeployment::initiate_deployment(request(names), SharedClock::system()).unwrap();
    product
}

fn upgrade_for(existing: &ProductDeployment, version: &str, names: &[&str]) -> ProductUpgrade {
    ProductUpgrade {
        id: ProductDeploymentId::new(),
        environment_id: existing.environment_id(),
        product_group_id: existing.product_group_id().to_string(),
        product_id: format!("local:shop:{}", version),
        product_name: existing.product_name().to_string(),
        product_display_name: existing.product_display_name().to_string(),
        product_version: version.to_string(),
        deployed_by: existing.deployed_by(),
        target_configs: configs(names),
        shared_variables: BTreeMap::new(),
    }
}

fn deploy(product: &mut ProductDeployment, name: &str) -> Vec<ProductDeploymentEvent> {
    product
        .start_stack(name, DeploymentId::new(), &format!("shop-{}", name))
        .unwrap();
    product.complete_stack(name).unwrap()
}

fn is_completed(event: &ProductDeploymentEvent) -> bool {
    matches!(event, ProductDeploymentEvent::ProductDeploymentCompleted { .. })
}

#[test]
fn test_initiate_deployment_orders_stacks() {
    let (product, events) =
        ProductDeployment::initiate_deployment(request(&["stack-0", "stack-1", "stack-2"]), SharedClock::system())
            .unwrap();

    assert_eq!(product.status(), ProductDeploymentStatus::Deploying);
    for (i, stack) in product.stacks().iter().enumerate() {
        assert_eq!(stack.order(), i);
        assert_eq!(stack.status(), StackDeploymentStatus::Pending);
    }
    assert_eq!(events.len(), 1);
    assert!(matches!(
        events[0],
        ProductDeploymentEvent::ProductDeploymentInitiated { total_stacks: 3, .. }
    ));
}

#[test]
fn test_initiate_deployment_validation() {
    let err = ProductDeployment::initiate_deployment(request(&[]), SharedClock::system()).unwrap_err();
    assert!(err.is_validation());

    let err = ProductDeployment::initiate_deployment(request(&["db", "DB"]), SharedClock::system()).unwrap_err();
    assert!(err.is_validation());

    let mut blank = request(&["db"]);
    blank.product_version = " ".to_string();
    let err = ProductDeployment::initiate_deployment(blank, SharedClock::system()).unwrap_err();
    assert!(err.is_validation());
}

#[test]
fn test_all_stacks_running_completes_once() {
    let mut product = product(&["stack-0", "stack-1"]);
    let first = deploy(&mut product, "stack-0");
    assert!(!first.iter().any(is_completed));
    assert_eq!(product.status(), ProductDeploymentStatus::Deploying);

    let second = deploy(&mut product, "stack-1");
    assert_eq!(second.iter().filter(|e| is_completed(e)).count(), 1);
    assert_eq!(product.status(), ProductDeploymentStatus::Running);
    assert_eq!(product.completed_stacks(), 2);
    assert_eq!(product.progress_percentage(), 100);

    // Nothing left to complete
    assert!(product.complete_stack("stack-1").unwrap_err().is_illegal_transition());
}

#[test]
fn test_partially_running() {
    let mut product = product(&["stack-0", "stack-1"]);
    deploy(&mut product, "stack-0");
    product
        .start_stack("stack-1", DeploymentId::new(), "shop-stack-1")
        .unwrap();
    let events = product.fail_stack("stack-1", "port already allocated").unwrap();
    assert!(matches!(
        events[0],
        ProductDeploymentEvent::ProductStackDeploymentFailed { .. }
    ));
    assert_eq!(product.status(), ProductDeploymentStatus::Deploying);

    let events = product.mark_as_partially_running("stack-1 failed").unwrap();
    assert_eq!(product.status(), ProductDeploymentStatus::PartiallyRunning);
    assert!(product.is_operational());
    assert!(product.error_message().unwrap().contains("stack-1"));
    assert!(matches!(
        events[0],
        ProductDeploymentEvent::ProductDeploymentPartiallyCompleted {
            running_count: 1,
            failed_count: 1,
            ..
        }
    ));
}

#[test]
fn test_partially_running_needs_a_running_stack() {
    let mut product = product(&["stack-0"]);
    product.fail_stack("stack-0", "boom").unwrap();
    let err = product.mark_as_partially_running("nothing up").unwrap_err();
    assert!(err.is_illegal_transition());

    product.mark_as_failed("all stacks failed").unwrap();
    assert_eq!(product.status(), ProductDeploymentStatus::Failed);
    assert!(product.completed_at().is_some());
}

#[test]
fn test_complete_unstarted_stack_is_illegal() {
    let mut product = product(&["stack-0"]);
    let err = product.complete_stack("stack-0").unwrap_err();
    assert!(err.is_illegal_transition());
    let err = product.complete_stack("nope").unwrap_err();
    assert!(err.is_illegal_transition());
}

#[test]
fn test_deploy_and_remove_order() {
    let mut product = product(&["db", "cache", "api", "web"]);
    let deploy_order: Vec<&str> = product
        .stacks_in_deploy_order()
        .iter()
        .map(|s| s.stack_name())
        .collect();
    assert_eq!(deploy_order, vec!["db", "cache", "api", "web"]);

    let mut remove_order: Vec<&str> = product
        .stacks_in_remove_order()
        .iter()
        .map(|s| s.stack_name())
        .collect();
    remove_order.reverse();
    assert_eq!(remove_order, deploy_order);

    assert_eq!(product.next_pending_stack().unwrap().stack_name(), "db");
    deploy(&mut product, "db");
    assert_eq!(product.next_pending_stack().unwrap().stack_name(), "cache");
}

#[test]
fn test_completion_and_count_invariants() {
    let names = ["a", "b", "c"];
    let mut product = product(&names);
    for name in names {
        product.start_stack(name, DeploymentId::new(), name).unwrap();
        assert!(product.completed_stacks() + product.failed_stacks() <= product.total_stacks());
        product.complete_stack(name).unwrap();

        let all_running = product
            .stacks()
            .iter()
            .all(|s| s.status() == StackDeploymentStatus::Running);
        assert_eq!(product.status() == ProductDeploymentStatus::Running, all_running);
    }
}

#[test]
fn test_retry_stack() {
    let mut product = product(&["db"]);
    let first = DeploymentId::new();
    product.start_stack("db", first, "shop-db").unwrap();
    product.fail_stack("db", "timeout").unwrap();

    product.retry_stack("db").unwrap();
    let stack = product.stack("db").unwrap();
    assert_eq!(stack.status(), StackDeploymentStatus::Pending);
    assert!(stack.error_message().is_none());
    assert_eq!(stack.deployment_id(), Some(first));

    deploy(&mut product, "db");
    assert_eq!(product.status(), ProductDeploymentStatus::Running);
    assert!(product.retry_stack("db").unwrap_err().is_illegal_transition());
}

#[test]
fn test_effective_variables() {
    let mut request = request(&["web"]);
    request.shared_variables.insert("DOMAIN".to_string(), "shop.local".to_string());
    request.shared_variables.insert("PORT".to_string(), "80".to_string());
    request.stack_configs[0]
        .variables
        .insert("PORT".to_string(), "8080".to_string());
    let (product, _) = ProductDeployment::initiate_deployment(request, SharedClock::system()).unwrap();

    let vars = product.effective_variables("web").unwrap();
    assert_eq!(vars["DOMAIN"], "shop.local");
    assert_eq!(vars["PORT"], "8080");
    assert!(product.effective_variables("db").is_none());
}

#[test]
fn test_upgrade_flags_new_stacks() {
    let mut existing = product(&["db", "web"]);
    deploy(&mut existing, "db");
    deploy(&mut existing, "web");

    let upgrade = upgrade_for(&existing, "2.0.0", &["db", "web", "search"]);
    let (upgraded, events) =
        ProductDeployment::initiate_upgrade(upgrade, &existing, SharedClock::system()).unwrap();

    assert_eq!(upgraded.status(), ProductDeploymentStatus::Upgrading);
    assert_eq!(upgraded.previous_version(), Some("1.0.0"));
    assert_eq!(upgraded.upgrade_count(), 1);
    assert!(!upgraded.stack("db").unwrap().is_new_in_upgrade());
    assert!(upgraded.stack("search").unwrap().is_new_in_upgrade());
    assert!(matches!(
        events[0],
        ProductDeploymentEvent::ProductUpgradeInitiated { new_stacks: 1, .. }
    ));

    // The existing record is not touched
    assert_eq!(existing.status(), ProductDeploymentStatus::Running);
}

#[test]
fn test_upgrade_requires_operational_product() {
    let existing = product(&["db"]);
    let upgrade = upgrade_for(&existing, "2.0.0", &["db"]);
    let err = ProductDeployment::initiate_upgrade(upgrade, &existing, SharedClock::system()).unwrap_err();
    assert!(err.is_illegal_transition());
}

#[test]
fn test_upgrade_must_stay_in_environment() {
    let mut existing = product(&["db"]);
    deploy(&mut existing, "db");
    let mut upgrade = upgrade_for(&existing, "2.0.0", &["db"]);
    upgrade.environment_id = EnvironmentId::new();
    let err = ProductDeployment::initiate_upgrade(upgrade, &existing, SharedClock::system()).unwrap_err();
    assert!(err.is_validation());
}

#[test]
fn test_rollback_after_failed_upgrade() {
    let mut existing = product(&["db"]);
    deploy(&mut existing, "db");
    let (mut upgraded, _) = ProductDeployment::initiate_upgrade(
        upgrade_for(&existing, "2.0.0", &["db"]),
        &existing,
        SharedClock::system(),
    )
    .unwrap();
    upgraded.fail_stack("db", "migration failed").unwrap();
    upgraded.mark_as_failed("migration failed").unwrap();
    assert!(upgraded.can_rollback());

    let wrong = upgrade_for(&upgraded, "3.0.0", &["db"]);
    let err = ProductDeployment::initiate_rollback(wrong, &upgraded, SharedClock::system()).unwrap_err();
    assert!(err.is_validation());

    let back = upgrade_for(&upgraded, "1.0.0", &["db"]);
    let (rollback, _) =
        ProductDeployment::initiate_rollback(back, &upgraded, SharedClock::system()).unwrap();
    assert_eq!(rollback.status(), ProductDeploymentStatus::Upgrading);
    assert_eq!(rollback.previous_version(), Some("2.0.0"));
}

#[test]
fn test_removal() {
    let mut product = product(&["db", "web"]);
    deploy(&mut product, "db");
    deploy(&mut product, "web");

    let events = product.start_removal().unwrap();
    assert_eq!(product.status(), ProductDeploymentStatus::Removing);
    assert_eq!(product.pending_stacks(), 2);
    assert!(matches!(
        events[0],
        ProductDeploymentEvent::ProductRemovalInitiated { total_stacks: 2, .. }
    ));

    let events = product.mark_stack_removed("web").unwrap();
    assert_eq!(events.len(), 1);
    assert!(product.mark_stack_removed("web").unwrap_err().is_illegal_transition());

    let events = product.mark_stack_removed("db").unwrap();
    assert_eq!(events.len(), 2);
    assert!(matches!(
        events[1],
        ProductDeploymentEvent::ProductDeploymentRemoved { .. }
    ));
    assert_eq!(product.status(), ProductDeploymentStatus::Removed);
    assert!(product.is_terminal());
}

#[test]
fn test_removed_rejects_everything() {
    let mut product = product(&["db"]);
    deploy(&mut product, "db");
    product.start_removal().unwrap();
    product.mark_stack_removed("db").unwrap();

    assert!(product.start_removal().unwrap_err().is_illegal_transition());
    assert!(product
        .start_stack("db", DeploymentId::new(), "shop-db")
        .unwrap_err()
        .is_illegal_transition());
    assert!(product.complete_stack("db").unwrap_err().is_illegal_transition());
    assert!(product.fail_stack("db", "x").unwrap_err().is_illegal_transition());
    assert!(product.retry_stack("db").unwrap_err().is_illegal_transition());
    assert!(product.mark_as_failed("x").unwrap_err().is_illegal_transition());
    assert!(product.mark_as_partially_running("x").unwrap_err().is_illegal_transition());
    assert!(product.mark_stack_removed("db").unwrap_err().is_illegal_transition());

    let upgrade = upgrade_for(&product, "2.0.0", &["db"]);
    let err = ProductDeployment::initiate_upgrade(upgrade, &product, SharedClock::system()).unwrap_err();
    assert!(err.is_illegal_transition());
}

#[test]
fn test_transition_table() {
    let legal = ProductDeploymentStatus::ALL
        .iter()
        .flat_map(|from| ProductDeploymentStatus::ALL.iter().map(move |to| (*from, *to)))
        .filter(|(from, to)| from.can_transition_to(*to))
        .count();
    assert_eq!(legal, 13);
    assert!(!ProductDeploymentStatus::Deploying.can_transition_to(ProductDeploymentStatus::Removing));
    assert!(!ProductDeploymentStatus::Removed.can_transition_to(ProductDeploymentStatus::Removing));

    // Deploying -> Removing is rejected by the mutator too
    let mut product = product(&["db"]);
    assert!(product.start_removal().unwrap_err().is_illegal_transition());
    assert_eq!(product.status(), ProductDeploymentStatus::Deploying);
}

#[test]
fn test_phase_history_is_recorded() {
    let mut product = product(&["db"]);
    deploy(&mut product, "db");
    let phases: Vec<&str> = product
        .phase_history()
        .iter()
        .map(|r| r.phase.as_str())
        .collect();
    assert_eq!(phases.last(), Some(&"completed"));
    assert!(phases.contains(&"stack_started"));
}
