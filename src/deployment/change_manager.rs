//! # Service Change Management
//!
//! Configuration, action, and object changes are not dispatched to a
//! deployer: they are fanned out as change requests that external
//! execution agents claim and run. This module owns the fan-out, the
//! claim protocol, and the result fan-in that completes the owning order.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::error::{ProvisorError, Result};
use crate::models::{
    OrderStatus, ResourceKind, ServiceChangeRequest, ServiceChangeResult, ServiceChangeScript,
    ServiceChangeStatus, ServiceDeployment, ServiceOrderType,
};
use crate::storage::{
    ServiceChangeQuery, ServiceChangeStore, ServiceDeploymentStore, ServiceOrderStore,
};

use super::order_manager::ServiceOrderManager;

pub struct ServiceChangeManager {
    change_store: Arc<dyn ServiceChangeStore>,
    order_store: Arc<dyn ServiceOrderStore>,
    deployment_store: Arc<dyn ServiceDeploymentStore>,
    order_manager: Arc<ServiceOrderManager>,
}

impl ServiceChangeManager {
    pub fn new(
        change_store: Arc<dyn ServiceChangeStore>,
        order_store: Arc<dyn ServiceOrderStore>,
        deployment_store: Arc<dyn ServiceDeploymentStore>,
        order_manager: Arc<ServiceOrderManager>,
    ) -> Self {
        Self {
            change_store,
            order_store,
            deployment_store,
            order_manager,
        }
    }

    /// Create a change order and fan its work out as change requests.
    ///
    /// For every script matching a resource group of the service, one
    /// request is queued per resource, or a single group-wide request
    /// when the script runs only once. An order whose fan-out produces
    /// nothing is completed FAILED immediately.
    pub async fn create_change_order(
        &self,
        service: &ServiceDeployment,
        task_type: ServiceOrderType,
        scripts: &[ServiceChangeScript],
        original_properties: HashMap<String, serde_json::Value>,
        final_properties: HashMap<String, serde_json::Value>,
    ) -> Result<Uuid> {
        let order = self
            .order_manager
            .store_new_change_order(service.id, task_type)
            .await?;

        let mut resources_by_group: HashMap<&str, Vec<&str>> = HashMap::new();
        for resource in &service.resources {
            resources_by_group
                .entry(resource.group_name.as_str())
                .or_default()
                .push(resource.resource_name.as_str());
        }

        let mut requests = Vec::new();
        for script in scripts {
            let Some(resource_names) = resources_by_group.get(script.change_handler.as_str())
            else {
                continue;
            };
            if resource_names.is_empty() {
                continue;
            }
            if script.run_only_once {
                // Group-wide request: bound to a concrete resource by
                // whichever agent of the group claims it first.
                requests.push(ServiceChangeRequest::new(
                    order.order_id,
                    service.id,
                    &script.change_handler,
                    final_properties.clone(),
                    original_properties.clone(),
                ));
            } else {
                for name in resource_names {
                    let mut request = ServiceChangeRequest::new(
                        order.order_id,
                        service.id,
                        &script.change_handler,
                        final_properties.clone(),
                        original_properties.clone(),
                    );
                    request.resource_name = Some(name.to_string());
                    requests.push(request);
                }
            }
        }

        if requests.is_empty() {
            warn!(
                order_id = %order.order_id,
                service_id = %service.id,
                "No change requests produced for the requested change"
            );
            self.order_manager
                .complete_order(
                    order.order_id,
                    OrderStatus::Failed,
                    Some("No change requests created for the requested change properties".into()),
                )
                .await?;
            return Ok(order.order_id);
        }

        info!(
            order_id = %order.order_id,
            service_id = %service.id,
            request_count = requests.len(),
            "Queued change requests"
        );
        self.change_store.save_all(requests).await?;
        Ok(order.order_id)
    }

    /// Claim the oldest pending change request for one resource of the
    /// service.
    ///
    /// Eligible requests are either group-wide (no resource bound yet) or
    /// already bound to the caller's resource, ordered by their owning
    /// order's start time. Claiming is atomic; losing a race moves on to
    /// the next candidate. Storage lock-timeouts are treated as "nothing
    /// pending right now" so agents simply poll again.
    pub async fn get_pending_change_request(
        &self,
        service_id: Uuid,
        resource_name: &str,
    ) -> Result<Option<ServiceChangeRequest>> {
        match self.claim_oldest_pending(service_id, resource_name).await {
            Ok(claimed) => Ok(claimed),
            Err(ProvisorError::StorageLockTimeout(message)) => {
                warn!(
                    service_id = %service_id,
                    reason = %message,
                    "Lock timeout while claiming change request, returning no content"
                );
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    async fn claim_oldest_pending(
        &self,
        service_id: Uuid,
        resource_name: &str,
    ) -> Result<Option<ServiceChangeRequest>> {
        let started_times: HashMap<Uuid, chrono::DateTime<Utc>> = self
            .order_store
            .list_by_service(service_id)
            .await?
            .into_iter()
            .filter_map(|order| order.started_at.map(|at| (order.order_id, at)))
            .collect();

        loop {
            let pending = self
                .change_store
                .list(&ServiceChangeQuery {
                    service_id: Some(service_id),
                    status: Some(ServiceChangeStatus::Pending),
                    ..Default::default()
                })
                .await?;

            // Oldest first by owning-order start time; requests already
            // bound to the caller win ties over group-wide ones.
            let oldest = pending
                .into_iter()
                .filter(|request| {
                    request.resource_name.is_none()
                        || request.resource_name.as_deref() == Some(resource_name)
                })
                .filter(|request| started_times.contains_key(&request.order_id))
                .min_by_key(|request| {
                    (started_times[&request.order_id], request.resource_name.is_none())
                });

            let Some(candidate) = oldest else {
                return Ok(None);
            };

            if candidate.resource_name.is_none() {
                self.validate_change_handler(service_id, &candidate, resource_name)
                    .await?;
            }
            self.order_manager
                .start_order_progress(candidate.order_id)
                .await?;

            match self.change_store.claim(candidate.id, resource_name).await? {
                Some(claimed) => {
                    debug!(
                        change_id = %claimed.id,
                        resource_name = resource_name,
                        "Claimed change request"
                    );
                    return Ok(Some(claimed));
                }
                // Lost the race; the next iteration no longer sees this
                // request as pending.
                None => continue,
            }
        }
    }

    /// Record the result an execution agent reports for a claimed
    /// request. Only PROCESSING requests are accepted, so a request
    /// cannot be completed twice.
    ///
    /// Once every sibling under the same order is terminal, the order is
    /// completed (SUCCESSFUL only if all succeeded) and, for
    /// configuration changes, the service's persisted configuration is
    /// updated from the originally requested properties.
    pub async fn update_service_change_result(
        &self,
        change_id: Uuid,
        result: &ServiceChangeResult,
    ) -> Result<()> {
        let mut request = self
            .change_store
            .find_by_id(change_id)
            .await?
            .filter(|r| r.status == ServiceChangeStatus::Processing)
            .ok_or(ProvisorError::ServiceChangeRequestNotFound(change_id))?;

        if result.is_successful {
            request.status = ServiceChangeStatus::Successful;
        } else {
            request.status = ServiceChangeStatus::Error;
            request.result_message = result.error.clone();
        }
        let request = self.change_store.store_and_flush(request).await?;

        self.complete_order_when_done(&request).await
    }

    async fn complete_order_when_done(&self, request: &ServiceChangeRequest) -> Result<()> {
        let siblings = self
            .change_store
            .list(&ServiceChangeQuery {
                order_id: Some(request.order_id),
                ..Default::default()
            })
            .await?;
        if !siblings.iter().all(|r| r.status.is_terminal()) {
            return Ok(());
        }

        let all_successful = siblings
            .iter()
            .all(|r| r.status == ServiceChangeStatus::Successful);
        let order = self.order_manager.get_order(request.order_id).await?;
        if all_successful {
            self.order_manager
                .complete_order(order.order_id, OrderStatus::Successful, None)
                .await?;
            if order.task_type == ServiceOrderType::ConfigChange {
                self.update_service_configuration(request).await?;
            }
        } else {
            let first_error = siblings
                .iter()
                .find_map(|r| r.result_message.clone());
            self.order_manager
                .complete_order(order.order_id, OrderStatus::Failed, first_error)
                .await?;
        }
        Ok(())
    }

    async fn update_service_configuration(&self, request: &ServiceChangeRequest) -> Result<()> {
        let Some(mut service) = self.deployment_store.find_by_id(request.service_id).await? else {
            error!(
                service_id = %request.service_id,
                "Service of completed configuration change not found"
            );
            return Ok(());
        };
        let Some(config) = service.service_config.as_mut() else {
            error!(
                service_id = %request.service_id,
                "Service has no configuration record to update"
            );
            return Ok(());
        };
        for (name, value) in &request.original_request_properties {
            config.properties.insert(name.clone(), value.clone());
        }
        config.updated_at = Utc::now();
        self.deployment_store.store_and_flush(service).await?;
        Ok(())
    }

    /// A group-wide request may only be claimed by a resource that exists
    /// in the service and belongs to the request's handler group.
    async fn validate_change_handler(
        &self,
        service_id: Uuid,
        request: &ServiceChangeRequest,
        resource_name: &str,
    ) -> Result<()> {
        let service = self
            .deployment_store
            .find_by_id(service_id)
            .await?
            .ok_or(ProvisorError::ServiceDeploymentNotFound(service_id))?;
        let resource = service
            .resources
            .iter()
            .filter(|r| r.resource_kind == ResourceKind::Vm)
            .find(|r| r.resource_name == resource_name)
            .ok_or_else(|| {
                ProvisorError::InvalidChangeRequest(format!(
                    "Service {service_id} has no resource named {resource_name}"
                ))
            })?;
        if resource.group_name != request.change_handler {
            return Err(ProvisorError::InvalidChangeRequest(format!(
                "Resource {resource_name} does not belong to group {}",
                request.change_handler
            )));
        }
        Ok(())
    }
}
