//! # Deployment Orchestrator
//!
//! Drives the deploy / redeploy / modify / destroy / purge use cases:
//! validates preconditions, creates the order, dispatches the deployer,
//! and hands the outcome to the result reconciler.
//!
//! Validation failures are rejected before any order is created. Deployer
//! failures are always reconciled first and then re-raised, so
//! synchronous callers observe the failure while the persisted state
//! stays consistent.

use std::sync::Arc;

use tokio::sync::Semaphore;
use tracing::{error, info, warn, Instrument};
use uuid::Uuid;

use crate::context::OrderContext;
use crate::error::{ProvisorError, Result};
use crate::models::{
    ServiceDeployment, ServiceDeploymentState, ServiceOrderType,
};
use crate::storage::ServiceDeploymentStore;

use super::deploy_result::{DeployResult, STATE_FILE_KEY};
use super::deploy_task::DeployTask;
use super::order_manager::ServiceOrderManager;
use super::policy::PolicyValidator;
use super::reconciler::DeployResultReconciler;
use super::registry::DeployerRegistry;

pub struct DeployOrchestrator {
    deployment_store: Arc<dyn ServiceDeploymentStore>,
    order_manager: Arc<ServiceOrderManager>,
    deployer_registry: Arc<DeployerRegistry>,
    policy_validator: Arc<dyn PolicyValidator>,
    reconciler: Arc<DeployResultReconciler>,
    worker_permits: Arc<Semaphore>,
}

impl DeployOrchestrator {
    pub fn new(
        deployment_store: Arc<dyn ServiceDeploymentStore>,
        order_manager: Arc<ServiceOrderManager>,
        deployer_registry: Arc<DeployerRegistry>,
        policy_validator: Arc<dyn PolicyValidator>,
        reconciler: Arc<DeployResultReconciler>,
        max_concurrent_orders: usize,
    ) -> Self {
        Self {
            deployment_store,
            order_manager,
            deployer_registry,
            policy_validator,
            reconciler,
            worker_permits: Arc::new(Semaphore::new(max_concurrent_orders)),
        }
    }

    /// Deploy a new service instance.
    ///
    /// Creates the service record in DEPLOYING state and the deploy
    /// order, then blocks on the deployer. Failures are reconciled (which
    /// may spawn an automatic rollback) before being re-raised.
    pub async fn deploy(&self, task: DeployTask) -> Result<ServiceDeployment> {
        self.validate_deploy_variables(&task)?;
        self.policy_validator.validate(&task).await?;

        let mut entity = ServiceDeployment::new(
            task.service_id,
            task.template.template_id,
            task.template.csp,
            task.request.clone(),
        );
        entity.user_id = task.user_id.clone();
        let entity = self.deployment_store.store_and_flush(entity).await?;
        self.order_manager.store_new_order(&task, &entity).await?;

        self.execute_and_reconcile(&task).await?;
        self.get_deployment(task.service_id).await
    }

    /// Re-run the deployment of an existing failed service record.
    pub async fn redeploy(&self, task: DeployTask) -> Result<ServiceDeployment> {
        let entity = self.get_deployment(task.service_id).await?;
        if !entity.service_deployment_state.allows_redeploy() {
            return Err(ProvisorError::InvalidServiceState {
                service_id: entity.id,
                current_state: entity.service_deployment_state,
                expected_states: vec![
                    ServiceDeploymentState::DeployFailed,
                    ServiceDeploymentState::RollbackFailed,
                ],
            });
        }
        self.validate_deploy_variables(&task)?;
        self.policy_validator.validate(&task).await?;

        self.order_manager.store_new_order(&task, &entity).await?;
        let mut updated = entity.clone();
        updated.service_deployment_state = ServiceDeploymentState::Deploying;
        updated.deploy_request = task.request.clone();
        updated.input_properties = task.request.service_request_properties.clone();
        self.deployment_store.store_and_flush(updated).await?;

        self.execute_and_reconcile(&task).await?;
        self.get_deployment(task.service_id).await
    }

    /// Modify a deployed service (flavor change, variable change).
    pub async fn modify(&self, task: DeployTask) -> Result<ServiceDeployment> {
        let entity = self.get_deployment(task.service_id).await?;
        if entity.lock_config.modify_locked {
            return Err(ProvisorError::ServiceLocked {
                service_id: entity.id,
                operation: "modify".to_string(),
            });
        }
        if !entity.service_deployment_state.allows_modify() {
            return Err(ProvisorError::InvalidServiceState {
                service_id: entity.id,
                current_state: entity.service_deployment_state,
                expected_states: vec![
                    ServiceDeploymentState::DeploySuccess,
                    ServiceDeploymentState::ModificationFailed,
                    ServiceDeploymentState::ModificationSuccessful,
                ],
            });
        }
        Self::validate_flavor_downgrade(&task, &entity)?;
        self.validate_deploy_variables(&task)?;
        self.policy_validator.validate(&task).await?;

        // Snapshot the pre-modify state onto the order before the record
        // is transitioned.
        self.order_manager.store_new_order(&task, &entity).await?;
        let mut updated = entity.clone();
        updated.service_deployment_state = ServiceDeploymentState::Modifying;
        updated.deploy_request = task.request.clone();
        updated.input_properties = task.request.service_request_properties.clone();
        self.deployment_store.store_and_flush(updated).await?;

        self.execute_and_reconcile(&task).await?;
        self.get_deployment(task.service_id).await
    }

    /// Destroy the resources of a deployed service.
    pub async fn destroy(&self, mut task: DeployTask) -> Result<ServiceDeployment> {
        let entity = self.get_deployment(task.service_id).await?;
        if entity.lock_config.destroy_locked {
            return Err(ProvisorError::ServiceLocked {
                service_id: entity.id,
                operation: "destroy".to_string(),
            });
        }
        if entity.service_deployment_state.has_order_in_progress() {
            return Err(ProvisorError::ServiceOrderInProgress {
                service_id: entity.id,
                current_state: entity.service_deployment_state,
            });
        }
        task.state_file = entity.generated_files.get(STATE_FILE_KEY).cloned();

        self.order_manager.store_new_order(&task, &entity).await?;
        let mut updated = entity.clone();
        updated.service_deployment_state = ServiceDeploymentState::Destroying;
        self.deployment_store.store_and_flush(updated).await?;

        self.execute_and_reconcile(&task).await?;
        self.clear_workspace(&task).await;
        self.get_deployment(task.service_id).await
    }

    /// Permanently remove a service record that is in a terminal failure
    /// or destroyed state.
    ///
    /// With no tracked resources the purge completes immediately without
    /// a deployer invocation and the record is deleted; otherwise the
    /// remaining resources are destroyed first.
    pub async fn purge(&self, mut task: DeployTask) -> Result<()> {
        let entity = self.get_deployment(task.service_id).await?;
        if !entity.service_deployment_state.allows_purge() {
            return Err(ProvisorError::InvalidServiceState {
                service_id: entity.id,
                current_state: entity.service_deployment_state,
                expected_states: vec![
                    ServiceDeploymentState::DeployFailed,
                    ServiceDeploymentState::DestroySuccess,
                    ServiceDeploymentState::DestroyFailed,
                    ServiceDeploymentState::RollbackFailed,
                    ServiceDeploymentState::ManualCleanupRequired,
                ],
            });
        }
        task.state_file = entity.generated_files.get(STATE_FILE_KEY).cloned();
        self.order_manager.store_new_order(&task, &entity).await?;

        if entity.resources.is_empty() {
            info!(
                service_id = %entity.id,
                order_id = %task.order_id,
                "Service has no resources, purge completes without deployer invocation"
            );
            let result = DeployResult::successful(task.order_id, task.service_id);
            return self
                .reconciler
                .update_service_with_deploy_result(&result)
                .await;
        }

        self.execute_and_reconcile(&task).await?;
        self.clear_workspace(&task).await;
        Ok(())
    }

    /// Render the deployer's execution plan without applying it.
    pub async fn deployment_plan(&self, task: &DeployTask) -> Result<String> {
        let deployer = self.deployer_registry.get(task.template.deployer_kind)?;
        deployer.get_deployment_plan_as_json(task).await
    }

    /// Run a task on the bounded worker pool and return immediately.
    ///
    /// The asynchronous path is a terminal sink: failures are reconciled
    /// and logged, never propagated.
    pub async fn dispatch(self: Arc<Self>, task: DeployTask) -> Result<()> {
        let permit = self
            .worker_permits
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| ProvisorError::Configuration("Worker pool is shut down".to_string()))?;
        let orchestrator = self;
        let ctx = OrderContext::new(task.order_id, task.service_id);
        let work = async move {
            let _permit = permit;
            let outcome = match task.task_type {
                ServiceOrderType::Deploy => orchestrator.deploy(task).await.map(|_| ()),
                ServiceOrderType::Retry | ServiceOrderType::Redeploy => {
                    orchestrator.redeploy(task).await.map(|_| ())
                }
                ServiceOrderType::Modify => orchestrator.modify(task).await.map(|_| ()),
                ServiceOrderType::Destroy => orchestrator.destroy(task).await.map(|_| ()),
                ServiceOrderType::Purge => orchestrator.purge(task).await,
                other => Err(ProvisorError::Configuration(format!(
                    "Task type {other} cannot be dispatched to a deployer"
                ))),
            };
            if let Err(e) = outcome {
                error!(error = %e, "Asynchronously dispatched order failed");
            }
        };
        tokio::spawn(work.instrument(ctx.span("dispatch")));
        Ok(())
    }

    /// Invoke the deployer and reconcile whatever came out of it.
    ///
    /// Reconciliation and error signaling are two distinct steps and both
    /// always run: a deployer failure is first folded into persisted
    /// state, then re-raised as a deployment error.
    async fn execute_and_reconcile(&self, task: &DeployTask) -> Result<()> {
        self.order_manager.start_order_progress(task.order_id).await?;
        let deployer = self.deployer_registry.get(task.template.deployer_kind)?;

        let invocation = match task.task_type {
            ServiceOrderType::Modify => deployer.modify(task).await,
            ServiceOrderType::Destroy | ServiceOrderType::Rollback | ServiceOrderType::Purge => {
                deployer.destroy(task).await
            }
            _ => deployer.deploy(task).await,
        };
        let (result, invocation_error) = match invocation {
            Ok(result) => (result, None),
            Err(e) => {
                error!(
                    order_id = %task.order_id,
                    service_id = %task.service_id,
                    task_type = %task.task_type,
                    error = %e,
                    "Deployer invocation failed"
                );
                (DeployResult::failed(task, &e.to_string()), Some(e))
            }
        };

        let reconcile_outcome = self
            .reconciler
            .update_service_with_deploy_result(&result)
            .await;

        if !result.is_successful.unwrap_or(false) {
            if let Err(e) = &reconcile_outcome {
                error!(
                    order_id = %task.order_id,
                    error = %e,
                    "Reconciliation of a failed result reported an error"
                );
            }
            let message = invocation_error
                .map(|e| e.to_string())
                .or_else(|| result.message.clone())
                .unwrap_or_else(|| "Deployer reported failure".to_string());
            return Err(ProvisorError::DeploymentFailed {
                order_id: task.order_id,
                service_id: task.service_id,
                task_type: task.task_type.to_string(),
                message,
            });
        }
        reconcile_outcome
    }

    async fn clear_workspace(&self, task: &DeployTask) {
        match self.deployer_registry.get(task.template.deployer_kind) {
            Ok(deployer) => {
                if let Err(e) = deployer.delete_task_workspace(task.service_id).await {
                    warn!(
                        service_id = %task.service_id,
                        error = %e,
                        "Failed to clear deployer workspace"
                    );
                }
            }
            Err(e) => warn!(service_id = %task.service_id, error = %e, "No deployer for cleanup"),
        }
    }

    async fn get_deployment(&self, service_id: Uuid) -> Result<ServiceDeployment> {
        self.deployment_store
            .find_by_id(service_id)
            .await?
            .ok_or(ProvisorError::ServiceDeploymentNotFound(service_id))
    }

    fn validate_deploy_variables(&self, task: &DeployTask) -> Result<()> {
        for variable in &task.template.deploy_variables {
            if variable.mandatory
                && !task
                    .request
                    .service_request_properties
                    .contains_key(&variable.name)
            {
                return Err(ProvisorError::InvalidVariables(format!(
                    "Mandatory variable {} is missing",
                    variable.name
                )));
            }
        }
        Ok(())
    }

    /// Reject a modify that moves to a lower-priority flavor unless the
    /// template allows downgrades. Lower priority value means a larger
    /// flavor.
    fn validate_flavor_downgrade(task: &DeployTask, entity: &ServiceDeployment) -> Result<()> {
        if task.request.flavor == entity.flavor {
            return Ok(());
        }
        let current = task
            .template
            .flavor(&entity.flavor)
            .ok_or_else(|| ProvisorError::FlavorNotFound(entity.flavor.clone()))?;
        let requested = task
            .template
            .flavor(&task.request.flavor)
            .ok_or_else(|| ProvisorError::FlavorNotFound(task.request.flavor.clone()))?;
        if requested.priority > current.priority && !task.template.is_downgrade_allowed {
            return Err(ProvisorError::FlavorDowngradeNotAllowed {
                current_flavor: entity.flavor.clone(),
                new_flavor: task.request.flavor.clone(),
            });
        }
        Ok(())
    }
}
