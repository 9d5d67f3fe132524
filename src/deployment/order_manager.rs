//! Order lifecycle bookkeeping.
//!
//! All order mutations funnel through this manager so the terminality
//! invariant holds: an order's status reaches SUCCESSFUL or FAILED
//! exactly once, and `started_at` is stamped exactly once.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::{ProvisorError, Result};
use crate::models::{OrderStatus, ServiceDeployment, ServiceOrder};
use crate::storage::ServiceOrderStore;

use super::deploy_task::DeployTask;

pub struct ServiceOrderManager {
    order_store: Arc<dyn ServiceOrderStore>,
}

impl ServiceOrderManager {
    pub fn new(order_store: Arc<dyn ServiceOrderStore>) -> Self {
        Self { order_store }
    }

    /// Create and persist the order for an accepted task, snapshotting
    /// the service's pre-order request, resources, and properties.
    pub async fn store_new_order(
        &self,
        task: &DeployTask,
        entity: &ServiceDeployment,
    ) -> Result<ServiceOrder> {
        let mut order = ServiceOrder::new(task.order_id, task.service_id, task.task_type);
        order.parent_order_id = task.parent_order_id;
        order.workflow_id = task.workflow_id.clone();
        order.user_id = task.user_id.clone();
        order.new_deploy_request = Some(task.request.clone());
        order.previous_deploy_request = Some(entity.deploy_request.clone());
        order.previous_deployed_resources = entity.resources.clone();
        order.previous_deployed_properties = entity.output_properties.clone();
        Ok(self.order_store.store_and_flush(order).await?)
    }

    /// Create the order owning a batch of change requests. Change orders
    /// are queued for execution agents immediately, so `started_at` is
    /// stamped at creation; the claim protocol sorts by it.
    pub async fn store_new_change_order(
        &self,
        service_id: Uuid,
        task_type: crate::models::ServiceOrderType,
    ) -> Result<ServiceOrder> {
        let mut order = ServiceOrder::new(Uuid::new_v4(), service_id, task_type);
        order.started_at = Some(Utc::now());
        Ok(self.order_store.store_and_flush(order).await?)
    }

    pub async fn get_order(&self, order_id: Uuid) -> Result<ServiceOrder> {
        self.order_store
            .find_by_id(order_id)
            .await?
            .ok_or(ProvisorError::ServiceOrderNotFound(order_id))
    }

    /// Move an order to IN_PROGRESS, stamping `started_at` on the first
    /// call only.
    pub async fn start_order_progress(&self, order_id: Uuid) -> Result<ServiceOrder> {
        let mut order = self.get_order(order_id).await?;
        order.order_status = OrderStatus::InProgress;
        if order.started_at.is_none() {
            order.started_at = Some(Utc::now());
        }
        Ok(self.order_store.store_and_flush(order).await?)
    }

    /// Complete an order with a terminal status and completion timestamp.
    ///
    /// A second completion attempt is ignored: the stored order is
    /// returned unchanged so duplicate results cannot flip a terminal
    /// status.
    pub async fn complete_order(
        &self,
        order_id: Uuid,
        status: OrderStatus,
        error_message: Option<String>,
    ) -> Result<ServiceOrder> {
        let mut order = self.get_order(order_id).await?;
        if order.order_status.is_terminal() && order.completed_at.is_some() {
            warn!(
                order_id = %order_id,
                status = %order.order_status,
                "Ignoring completion of an already terminal order"
            );
            return Ok(order);
        }
        order.order_status = status;
        order.completed_at = Some(Utc::now());
        if error_message.is_some() {
            order.error_message = error_message;
        }
        debug!(order_id = %order_id, status = %status, "Order completed");
        Ok(self.order_store.store_and_flush(order).await?)
    }

    /// Mark a failed deploy order FAILED without a completion timestamp;
    /// the chained rollback stamps completion when it finishes.
    pub async fn mark_failed_awaiting_rollback(
        &self,
        order_id: Uuid,
        error_message: Option<String>,
    ) -> Result<ServiceOrder> {
        let mut order = self.get_order(order_id).await?;
        if order.order_status.is_terminal() {
            return Ok(order);
        }
        order.order_status = OrderStatus::Failed;
        if error_message.is_some() {
            order.error_message = error_message;
        }
        Ok(self.order_store.store_and_flush(order).await?)
    }

    /// Stamp the completion timestamp of an order whose terminal status
    /// was already recorded (rollback completing its parent deploy order).
    pub async fn stamp_completed(&self, order_id: Uuid) -> Result<ServiceOrder> {
        let mut order = self.get_order(order_id).await?;
        if order.completed_at.is_none() {
            order.completed_at = Some(Utc::now());
            order = self.order_store.store_and_flush(order).await?;
        }
        Ok(order)
    }

    pub async fn delete_orders_of_service(&self, service_id: Uuid) -> Result<()> {
        Ok(self.order_store.delete_by_service(service_id).await?)
    }
}
