//! Out-of-band deployment result intake.
//!
//! Deployer microservices that execute asynchronously report back through
//! this entry point. No caller is waiting, so the path is a terminal
//! sink: reconciliation errors are logged and swallowed, with the
//! stale-order re-fetcher as the backstop for anything lost here.

use std::sync::Arc;

use tracing::error;
use uuid::Uuid;

use super::deploy_result::DeployResult;
use super::reconciler::DeployResultReconciler;

pub struct DeploymentResultCallbackManager {
    reconciler: Arc<DeployResultReconciler>,
}

impl DeploymentResultCallbackManager {
    pub fn new(reconciler: Arc<DeployResultReconciler>) -> Self {
        Self { reconciler }
    }

    /// Accept a callback-delivered result for the given order.
    pub async fn on_deployment_result(&self, order_id: Uuid, mut result: DeployResult) {
        result.order_id = Some(order_id);
        if let Err(e) = self
            .reconciler
            .update_service_with_deploy_result(&result)
            .await
        {
            error!(
                order_id = %order_id,
                error = %e,
                "Failed to reconcile callback result; re-fetcher will recover the order"
            );
        }
    }
}
