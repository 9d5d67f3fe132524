//! # Deployment Result Reconciliation
//!
//! Applies raw deployer results to the service deployment and order
//! records consistently, under partial-failure conditions: automatic
//! rollback of half-provisioned deploys, parent-order chains for
//! composite operations, and best-effort workflow signaling.
//!
//! Reconciliations for the same service are serialized through a
//! per-service mutex so a late or duplicate result cannot clobber a more
//! recent state. Results for different services proceed in parallel.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use chrono::Utc;
use dashmap::DashMap;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::context::OrderContext;
use crate::error::{ProvisorError, Result};
use crate::models::{
    OrderStatus, ServiceConfigurationRecord, ServiceDeployment, ServiceDeploymentState,
    ServiceOrder, ServiceOrderType, ServiceState, ServiceTemplate,
};
use crate::storage::{
    ServiceChangeStore, ServiceDeploymentStore, ServiceOrderStore, ServiceTemplateStore,
};

use super::deploy_result::{DeployResult, STATE_FILE_KEY};
use super::deploy_task::DeployTask;
use super::order_manager::ServiceOrderManager;
use super::registry::{DeployerRegistry, ResourceHandlerRegistry};
use super::sensitive::SensitiveDataMasker;
use super::workflow::{receive_task_activity_id, WorkflowEngine};

/// New deployment state produced by a completed order, per the
/// (task type × success) transition table. `None` means the task type
/// never changes the deployment state.
pub fn deployment_state_for(
    task_type: ServiceOrderType,
    is_successful: bool,
) -> Option<ServiceDeploymentState> {
    match task_type {
        t if t.is_deploy_like() => Some(if is_successful {
            ServiceDeploymentState::DeploySuccess
        } else {
            ServiceDeploymentState::DeployFailed
        }),
        ServiceOrderType::Destroy => Some(if is_successful {
            ServiceDeploymentState::DestroySuccess
        } else {
            ServiceDeploymentState::DestroyFailed
        }),
        ServiceOrderType::Modify => Some(if is_successful {
            ServiceDeploymentState::ModificationSuccessful
        } else {
            ServiceDeploymentState::ModificationFailed
        }),
        // A successful rollback restores the original failure for
        // inspection rather than introducing a distinct rolled-back state.
        ServiceOrderType::Rollback => Some(if is_successful {
            ServiceDeploymentState::DeployFailed
        } else {
            ServiceDeploymentState::RollbackFailed
        }),
        ServiceOrderType::Purge => Some(if is_successful {
            ServiceDeploymentState::DestroySuccess
        } else {
            ServiceDeploymentState::ManualCleanupRequired
        }),
        _ => None,
    }
}

/// Folds deployer results into persisted service and order state.
pub struct DeployResultReconciler {
    deployment_store: Arc<dyn ServiceDeploymentStore>,
    order_store: Arc<dyn ServiceOrderStore>,
    template_store: Arc<dyn ServiceTemplateStore>,
    change_store: Arc<dyn ServiceChangeStore>,
    order_manager: Arc<ServiceOrderManager>,
    deployer_registry: Arc<DeployerRegistry>,
    resource_handlers: Arc<ResourceHandlerRegistry>,
    workflow_engine: Arc<dyn WorkflowEngine>,
    masker: SensitiveDataMasker,
    service_locks: DashMap<Uuid, Arc<Mutex<()>>>,
}

impl DeployResultReconciler {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        deployment_store: Arc<dyn ServiceDeploymentStore>,
        order_store: Arc<dyn ServiceOrderStore>,
        template_store: Arc<dyn ServiceTemplateStore>,
        change_store: Arc<dyn ServiceChangeStore>,
        order_manager: Arc<ServiceOrderManager>,
        deployer_registry: Arc<DeployerRegistry>,
        resource_handlers: Arc<ResourceHandlerRegistry>,
        workflow_engine: Arc<dyn WorkflowEngine>,
        masker: SensitiveDataMasker,
    ) -> Self {
        Self {
            deployment_store,
            order_store,
            template_store,
            change_store,
            order_manager,
            deployer_registry,
            resource_handlers,
            workflow_engine,
            masker,
            service_locks: DashMap::new(),
        }
    }

    /// Apply one deployer result to the owning service and order.
    ///
    /// Malformed results (missing order id or success flag) are logged
    /// and discarded without touching any state. Applying the same result
    /// twice is a no-op: the order is already terminal by then.
    pub async fn update_service_with_deploy_result(&self, result: &DeployResult) -> Result<()> {
        let (Some(order_id), Some(_)) = (result.order_id, result.is_successful) else {
            warn!("Discarding deploy result without order id or success flag");
            return Ok(());
        };
        let order = self.order_manager.get_order(order_id).await?;
        let ctx = OrderContext::new(order_id, order.service_id);

        let lock = self.service_lock(order.service_id);
        let guard = lock.lock().await;

        if order.order_status.is_terminal() && order.completed_at.is_some() {
            debug!(
                order_id = %ctx.order_id,
                service_id = %ctx.service_id,
                "Ignoring result for an already completed order"
            );
            return Ok(());
        }

        let entity = self
            .deployment_store
            .find_by_id(order.service_id)
            .await?
            .ok_or(ProvisorError::ServiceDeploymentNotFound(order.service_id))?;
        let template = self
            .template_store
            .find_by_id(entity.service_template_id)
            .await?
            .ok_or(ProvisorError::ServiceTemplateNotFound(
                entity.service_template_id,
            ))?;

        // Normalize provider state into resources/properties before the
        // entity update; handler failures flip the result, never propagate.
        let mut effective = result.clone();
        if effective.state_file().is_some() {
            self.apply_resource_handler(&mut effective, &entity, &template)
                .await;
        }
        let is_successful = effective.is_successful.unwrap_or(false);
        if let Some(state) = effective.state {
            if state.is_successful() != is_successful {
                warn!(
                    order_id = %ctx.order_id,
                    deployer_state = %state,
                    is_successful = is_successful,
                    "Deployer state disagrees with the success flag; trusting the flag"
                );
            }
        }
        let task_type = order.task_type;
        let rollback_required =
            !is_successful && task_type.is_deploy_like() && effective.state_file().is_some();

        info!(
            order_id = %ctx.order_id,
            service_id = %ctx.service_id,
            task_type = %task_type,
            is_successful = is_successful,
            "Reconciling deploy result"
        );

        let mut updated = entity.clone();
        self.apply_result_to_entity(
            &mut updated,
            &effective,
            task_type,
            is_successful,
            rollback_required,
            &template,
        );
        let updated = self.deployment_store.store_and_flush(updated).await?;

        if rollback_required {
            // The deploy order is failed now, but its completion timestamp
            // and the service's terminal state belong to the rollback.
            self.order_manager
                .mark_failed_awaiting_rollback(order_id, effective.message.clone())
                .await?;
            drop(guard);
            let rollback_task = self.rollback_task_for(&updated, &template, &order);
            self.rollback_on_deployment_failure(rollback_task, &updated)
                .await?;
            return Ok(());
        }

        let status = if is_successful {
            OrderStatus::Successful
        } else {
            OrderStatus::Failed
        };
        let error_message = if is_successful {
            None
        } else {
            effective.message.clone()
        };
        let completed = self
            .order_manager
            .complete_order(order_id, status, error_message)
            .await?;

        if task_type == ServiceOrderType::Purge && is_successful {
            self.remove_purged_service(&updated, completed).await?;
        }

        if let Some(parent_id) = order.parent_order_id {
            self.propagate_to_parent(parent_id, &order, is_successful)
                .await?;
        }
        Ok(())
    }

    /// Destroy partially provisioned resources after a failed deploy.
    ///
    /// A service with no tracked resources rolls back as an immediate
    /// success without invoking the deployer. The rollback result is
    /// reconciled before any destroy error is re-raised, so both steps
    /// always run.
    pub fn rollback_on_deployment_failure<'a>(
        &'a self,
        task: DeployTask,
        entity: &'a ServiceDeployment,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>> {
        // Returns a boxed future so the mutually recursive cycle with
        // `update_service_with_deploy_result` has a concrete `Send` type to
        // anchor on, rather than two opaque `async fn` types whose Send-ness
        // the compiler cannot infer through each other.
        Box::pin(async move {
            info!(
                service_id = %task.service_id,
                order_id = %task.order_id,
                "Performing rollback of already provisioned resources"
            );
            let order = self.order_manager.store_new_order(&task, entity).await?;

            let mut destroy_error = None;
            let rollback_result = if entity.resources.is_empty() {
                info!(service_id = %task.service_id, "No resources to destroy, rollback succeeds");
                DeployResult::successful(task.order_id, task.service_id)
            } else {
                self.order_manager
                    .start_order_progress(order.order_id)
                    .await?;
                let deployer = self.deployer_registry.get(task.template.deployer_kind)?;
                match deployer.destroy(&task).await {
                    Ok(result) => result,
                    Err(e) => {
                        let failed = DeployResult::failed(&task, &e.to_string());
                        destroy_error = Some(e);
                        failed
                    }
                }
            };

            // The rollback's reconciliation re-enters this module.
            self.update_service_with_deploy_result(&rollback_result)
                .await?;

            match destroy_error {
                Some(e) => Err(e),
                None => Ok(()),
            }
        })
    }

    fn service_lock(&self, service_id: Uuid) -> Arc<Mutex<()>> {
        self.service_locks
            .entry(service_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    async fn apply_resource_handler(
        &self,
        result: &mut DeployResult,
        entity: &ServiceDeployment,
        template: &ServiceTemplate,
    ) {
        match self
            .resource_handlers
            .get(entity.csp, template.deployer_kind)
        {
            Ok(handler) => {
                if let Err(e) = handler.handle(result).await {
                    error!(
                        service_id = %entity.id,
                        error = %e,
                        "Resource handler failed to normalize deployer state"
                    );
                    result.is_successful = Some(false);
                    result.message = Some(format!("Resource handler failed: {e}"));
                }
            }
            Err(e) => {
                error!(service_id = %entity.id, error = %e, "No resource handler available");
                result.is_successful = Some(false);
                result.message = Some(e.to_string());
            }
        }
    }

    fn apply_result_to_entity(
        &self,
        updated: &mut ServiceDeployment,
        result: &DeployResult,
        task_type: ServiceOrderType,
        is_successful: bool,
        defer_terminal_state: bool,
        template: &ServiceTemplate,
    ) {
        let new_state = if defer_terminal_state {
            None
        } else {
            deployment_state_for(task_type, is_successful)
        };
        if let Some(state) = new_state {
            updated.service_deployment_state = state;
        }

        match &result.message {
            Some(message) if !message.trim().is_empty() => {
                updated.result_message = Some(message.clone());
            }
            _ => {
                // A successful rollback keeps the original deploy error
                // visible on the record.
                if is_successful && task_type != ServiceOrderType::Rollback {
                    updated.result_message = None;
                }
            }
        }

        if new_state == Some(ServiceDeploymentState::ModificationSuccessful) {
            updated.flavor = updated.deploy_request.flavor.clone();
            updated.customer_service_name = updated.deploy_request.customer_service_name.clone();
        }

        Self::update_service_configuration(new_state, updated, template);
        Self::update_operational_state(new_state, updated);

        // Overwrite, never append: empty collections on a successful
        // result clear the stored counterpart, on a failed result they
        // leave it untouched.
        if result.output_properties.is_empty() {
            if is_successful {
                updated.output_properties.clear();
            }
        } else {
            updated.output_properties = result.output_properties.clone();
        }
        if result.generated_files.is_empty() {
            if is_successful {
                updated.generated_files.clear();
            }
        } else {
            updated.generated_files = result.generated_files.clone();
        }
        if result.resources.is_empty() {
            if is_successful {
                updated.resources.clear();
            }
        } else {
            updated.resources = result.resources.clone();
        }

        self.masker.mask_sensitive_fields(updated, template);
    }

    fn update_service_configuration(
        new_state: Option<ServiceDeploymentState>,
        updated: &mut ServiceDeployment,
        template: &ServiceTemplate,
    ) {
        if new_state == Some(ServiceDeploymentState::DeploySuccess) {
            if let Some(manage) = &template.configuration_manage {
                let now = Utc::now();
                updated.service_config = Some(ServiceConfigurationRecord {
                    properties: manage.default_properties.clone(),
                    created_at: now,
                    updated_at: now,
                });
            }
        }
        if new_state == Some(ServiceDeploymentState::DestroySuccess) {
            updated.service_config = None;
        }
    }

    fn update_operational_state(
        new_state: Option<ServiceDeploymentState>,
        updated: &mut ServiceDeployment,
    ) {
        match new_state {
            Some(
                ServiceDeploymentState::DeploySuccess
                | ServiceDeploymentState::ModificationSuccessful,
            ) => {
                updated.service_state = ServiceState::Running;
                updated.last_started_at = Some(Utc::now());
            }
            Some(
                ServiceDeploymentState::DeployFailed | ServiceDeploymentState::DestroySuccess,
            ) => {
                updated.service_state = ServiceState::NotRunning;
            }
            _ => {}
        }
    }

    fn rollback_task_for(
        &self,
        entity: &ServiceDeployment,
        template: &ServiceTemplate,
        failed_order: &ServiceOrder,
    ) -> DeployTask {
        let mut task = DeployTask::new(
            entity.id,
            ServiceOrderType::Rollback,
            entity.deploy_request.clone(),
            template.clone(),
        );
        task.user_id = failed_order.user_id.clone();
        task.state_file = entity.generated_files.get(STATE_FILE_KEY).cloned();
        task.parent_order_id = Some(failed_order.order_id);
        task
    }

    /// Purge cleanup: the service record and its queued change requests
    /// go away; the completed purge order itself stays observable, the
    /// rest of the order history is removed with the service.
    async fn remove_purged_service(
        &self,
        entity: &ServiceDeployment,
        purge_order: ServiceOrder,
    ) -> Result<()> {
        self.change_store.delete_by_service(entity.id).await?;
        self.order_store.delete_by_service(entity.id).await?;
        self.order_store.store_and_flush(purge_order).await?;
        self.deployment_store.delete(entity.id).await?;
        info!(service_id = %entity.id, "Purged service record deleted");
        Ok(())
    }

    async fn propagate_to_parent(
        &self,
        parent_id: Uuid,
        child_order: &ServiceOrder,
        child_successful: bool,
    ) -> Result<()> {
        let parent = match self.order_manager.get_order(parent_id).await {
            Ok(parent) => parent,
            Err(e) => {
                error!(parent_order_id = %parent_id, error = %e, "Parent order not found");
                return Ok(());
            }
        };

        if !parent.task_type.is_composite_parent() {
            // Rollback completing the failed deploy order it was spawned
            // for: the terminal status is already recorded, only the
            // completion timestamp is still owed.
            self.order_manager.stamp_completed(parent_id).await?;
            return Ok(());
        }

        if !child_successful {
            self.order_manager
                .complete_order(
                    parent_id,
                    OrderStatus::Failed,
                    child_order.error_message.clone(),
                )
                .await?;
            return Ok(());
        }

        self.notify_workflow(&parent, child_order.task_type).await;

        let siblings = self.order_store.list_by_parent(parent_id).await?;
        let deploy_done = siblings
            .iter()
            .any(|o| o.task_type.is_deploy_like() && o.order_status == OrderStatus::Successful);
        let destroy_done = siblings
            .iter()
            .any(|o| o.task_type == ServiceOrderType::Destroy
                && o.order_status == OrderStatus::Successful);
        if deploy_done && destroy_done {
            self.order_manager
                .complete_order(parent_id, OrderStatus::Successful, None)
                .await?;
        } else {
            debug!(
                parent_order_id = %parent_id,
                "Composite order still awaiting its sibling step"
            );
        }
        Ok(())
    }

    /// Workflow signaling is best-effort: errors are logged and swallowed
    /// so they can never fail the underlying order completion.
    async fn notify_workflow(&self, parent: &ServiceOrder, child_type: ServiceOrderType) {
        let Some(workflow_id) = &parent.workflow_id else {
            return;
        };
        let Some(activity_id) = receive_task_activity_id(parent.task_type, child_type) else {
            return;
        };
        if let Err(e) = self
            .workflow_engine
            .complete_receive_task(workflow_id, activity_id)
            .await
        {
            error!(
                workflow_id = %workflow_id,
                activity_id = activity_id,
                error = %e,
                "Workflow notification failed; order completion unaffected"
            );
        }
    }
}
