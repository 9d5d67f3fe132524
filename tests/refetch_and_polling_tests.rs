//! Stale-order recovery and long-poll primitive tests.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{resource, test_config, TestHarness};
use provisor_core::config::ProvisorConfig;
use provisor_core::deployment::DeployResult;
use provisor_core::models::{OrderStatus, ServiceDeploymentState, ServiceOrderType};
use provisor_core::storage::{ServiceDeploymentStore, ServiceOrderStore};

/// Set up a service stuck DEPLOYING with an IN_PROGRESS deploy order,
/// simulating a lost callback.
async fn stuck_deploying(harness: &TestHarness) -> (uuid::Uuid, uuid::Uuid) {
    let task = harness.deploy_task();
    let mut entity = provisor_core::models::ServiceDeployment::new(
        task.service_id,
        harness.template.template_id,
        harness.template.csp,
        task.request.clone(),
    );
    harness
        .deployment_store
        .store_and_flush(entity.clone())
        .await
        .unwrap();
    let order = harness
        .order_manager
        .store_new_order(&task, &entity)
        .await
        .unwrap();
    harness
        .order_manager
        .start_order_progress(order.order_id)
        .await
        .unwrap();
    (task.service_id, order.order_id)
}

#[tokio::test]
async fn stale_in_flight_order_is_recovered_on_read() {
    // Timeout of zero: any started order is immediately stale.
    let config = ProvisorConfig {
        max_order_processing_duration_secs: 0,
        ..test_config()
    };
    let harness = TestHarness::with_config(config).await;
    let (service_id, order_id) = stuck_deploying(&harness).await;

    let mut recovered = DeployResult::successful(order_id, service_id);
    recovered.resources = vec![resource("vm-1", "app")];
    harness.deployer.stash_retrievable_result(order_id, recovered);

    let details = harness
        .views
        .get_service_details(service_id, None, true)
        .await
        .unwrap();
    assert_eq!(
        details.service_deployment_state,
        ServiceDeploymentState::DeploySuccess
    );
    assert_eq!(details.resources.len(), 1);

    let order = harness.order_store.find_by_id(order_id).await.unwrap().unwrap();
    assert_eq!(order.order_status, OrderStatus::Successful);
}

#[tokio::test]
async fn orders_within_their_processing_window_are_left_alone() {
    let harness = TestHarness::new().await;
    let (service_id, order_id) = stuck_deploying(&harness).await;
    harness
        .deployer
        .stash_retrievable_result(order_id, DeployResult::successful(order_id, service_id));

    let details = harness
        .views
        .get_service_details(service_id, None, true)
        .await
        .unwrap();
    // Default timeout is an hour; the order stays in progress.
    assert_eq!(
        details.service_deployment_state,
        ServiceDeploymentState::Deploying
    );
}

#[tokio::test]
async fn refetch_is_a_noop_when_the_deployer_has_no_result_either() {
    let config = ProvisorConfig {
        max_order_processing_duration_secs: 0,
        ..test_config()
    };
    let harness = TestHarness::with_config(config).await;
    let (service_id, _order_id) = stuck_deploying(&harness).await;

    let details = harness
        .views
        .get_service_details(service_id, None, true)
        .await
        .unwrap();
    assert_eq!(
        details.service_deployment_state,
        ServiceDeploymentState::Deploying
    );
}

#[tokio::test]
async fn listing_services_recovers_stale_orders_in_batch() {
    let config = ProvisorConfig {
        max_order_processing_duration_secs: 0,
        ..test_config()
    };
    let harness = TestHarness::with_config(config).await;
    let (service_id, order_id) = stuck_deploying(&harness).await;
    harness
        .deployer
        .stash_retrievable_result(order_id, DeployResult::successful(order_id, service_id));

    let services = harness
        .views
        .list_services(&Default::default())
        .await
        .unwrap();
    let recovered = services.iter().find(|s| s.id == service_id).unwrap();
    assert_eq!(
        recovered.service_deployment_state,
        ServiceDeploymentState::DeploySuccess
    );
}

#[tokio::test]
async fn permission_is_checked_before_details_are_returned() {
    let harness = TestHarness::new().await;
    let mut task = harness.deploy_task();
    task.user_id = Some("alice".to_string());
    let entity = harness.orchestrator.deploy(task).await.unwrap();

    let err = harness
        .views
        .get_service_details(entity.id, Some("bob"), false)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        provisor_core::error::ProvisorError::PermissionDenied(_)
    ));
    assert!(harness
        .views
        .get_service_details(entity.id, Some("alice"), false)
        .await
        .is_ok());
}

#[tokio::test]
async fn long_poll_resolves_when_the_state_transitions() {
    let harness = Arc::new(TestHarness::new().await);
    let (service_id, order_id) = stuck_deploying(&harness).await;

    let poller_harness = harness.clone();
    let waiter = tokio::spawn(async move {
        poller_harness
            .poller
            .wait_for_service_state_change(
                service_id,
                Some(ServiceDeploymentState::Deploying),
                Some(Duration::from_secs(2)),
            )
            .await
    });

    tokio::time::sleep(Duration::from_millis(50)).await;
    let result = DeployResult::successful(order_id, service_id);
    harness
        .reconciler
        .update_service_with_deploy_result(&result)
        .await
        .unwrap();

    let observed = waiter.await.unwrap().unwrap().expect("transition expected");
    assert_eq!(
        observed.service_deployment_state,
        ServiceDeploymentState::DeploySuccess
    );
}

#[tokio::test]
async fn long_poll_times_out_without_a_transition() {
    let harness = TestHarness::new().await;
    let (service_id, _order_id) = stuck_deploying(&harness).await;

    let observed = harness
        .poller
        .wait_for_service_state_change(
            service_id,
            Some(ServiceDeploymentState::Deploying),
            Some(Duration::from_millis(100)),
        )
        .await
        .unwrap();
    assert!(observed.is_none());
}

#[tokio::test]
async fn order_long_poll_returns_terminal_status() {
    let harness = Arc::new(TestHarness::new().await);
    let (service_id, order_id) = stuck_deploying(&harness).await;

    let poller_harness = harness.clone();
    let waiter = tokio::spawn(async move {
        poller_harness
            .poller
            .wait_for_order_status_change(
                order_id,
                Some(OrderStatus::InProgress),
                Some(Duration::from_secs(2)),
            )
            .await
    });

    tokio::time::sleep(Duration::from_millis(50)).await;
    let mut result = DeployResult::successful(order_id, service_id);
    result.is_successful = Some(false);
    result.message = Some("provider error".to_string());
    harness
        .reconciler
        .update_service_with_deploy_result(&result)
        .await
        .unwrap();

    let observed = waiter.await.unwrap().unwrap().expect("completion expected");
    assert_eq!(observed.order_status, OrderStatus::Failed);
    assert_eq!(observed.task_type, ServiceOrderType::Deploy);
}
