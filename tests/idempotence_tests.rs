//! Property test: reconciliation overwrites rather than appends, so
//! applying a result twice leaves the same state as applying it once.

mod common;

use common::{resource, TestHarness};
use proptest::prelude::*;
use provisor_core::deployment::{DeployResult, STATE_FILE_KEY};
use provisor_core::models::ServiceDeploymentState;
use provisor_core::storage::ServiceDeploymentStore;

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn reconciling_a_result_twice_equals_once(
        names in prop::collection::vec("[a-z]{1,8}", 0..4),
        outputs in prop::collection::hash_map("[a-z_]{1,10}", "[a-zA-Z0-9:.]{0,16}", 0..4),
        with_state_file in any::<bool>(),
    ) {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        rt.block_on(async move {
            let harness = TestHarness::new().await;
            let task = harness.deploy_task();
            let service_id = task.service_id;

            let mut entity = provisor_core::models::ServiceDeployment::new(
                service_id,
                harness.template.template_id,
                harness.template.csp,
                task.request.clone(),
            );
            entity = harness.deployment_store.store_and_flush(entity).await.unwrap();
            let order = harness.order_manager.store_new_order(&task, &entity).await.unwrap();
            harness.order_manager.start_order_progress(order.order_id).await.unwrap();

            let mut result = DeployResult::successful(order.order_id, service_id);
            result.resources = names.iter().map(|n| resource(n, "app")).collect();
            result.output_properties = outputs.clone();
            if with_state_file {
                result
                    .generated_files
                    .insert(STATE_FILE_KEY.to_string(), "{\"serial\":1}".to_string());
            }

            harness
                .reconciler
                .update_service_with_deploy_result(&result)
                .await
                .unwrap();
            let once = harness
                .deployment_store
                .find_by_id(service_id)
                .await
                .unwrap()
                .unwrap();

            harness
                .reconciler
                .update_service_with_deploy_result(&result)
                .await
                .unwrap();
            let twice = harness
                .deployment_store
                .find_by_id(service_id)
                .await
                .unwrap()
                .unwrap();

            prop_assert_eq!(
                once.service_deployment_state,
                ServiceDeploymentState::DeploySuccess
            );
            prop_assert_eq!(&once.resources, &twice.resources);
            prop_assert_eq!(&once.output_properties, &twice.output_properties);
            prop_assert_eq!(&once.generated_files, &twice.generated_files);
            prop_assert_eq!(once.service_deployment_state, twice.service_deployment_state);
            Ok(())
        })?;
    }
}
