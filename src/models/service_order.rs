//! # Service Order Model
//!
//! Durable record of every requested lifecycle operation against a
//! service deployment. An order's status reaches a terminal value exactly
//! once, and its `started_at` timestamp is set exactly once when work
//! begins.

use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::deploy_request::DeployRequest;
use super::service_resource::ServiceResource;

/// Kind of work an order tracks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceOrderType {
    Deploy,
    Retry,
    Redeploy,
    Modify,
    Destroy,
    Rollback,
    Purge,
    ServiceAction,
    ObjectCreate,
    ObjectModify,
    ObjectDelete,
    ConfigChange,
    Port,
    Recreate,
}

impl ServiceOrderType {
    /// Deploy-shaped work: a failure with provisioned resources triggers
    /// an automatic rollback.
    pub fn is_deploy_like(&self) -> bool {
        matches!(self, Self::Deploy | Self::Retry | Self::Redeploy)
    }

    /// Composite parents spawn a deploy/destroy pair and complete only
    /// after both children have reported.
    pub fn is_composite_parent(&self) -> bool {
        matches!(self, Self::Port | Self::Recreate)
    }

    /// Orders whose work is fanned out as change requests to execution
    /// agents rather than dispatched to a deployer.
    pub fn is_change_order(&self) -> bool {
        matches!(
            self,
            Self::ServiceAction
                | Self::ObjectCreate
                | Self::ObjectModify
                | Self::ObjectDelete
                | Self::ConfigChange
        )
    }
}

impl fmt::Display for ServiceOrderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Deploy => "deploy",
            Self::Retry => "retry",
            Self::Redeploy => "redeploy",
            Self::Modify => "modify",
            Self::Destroy => "destroy",
            Self::Rollback => "rollback",
            Self::Purge => "purge",
            Self::ServiceAction => "service_action",
            Self::ObjectCreate => "object_create",
            Self::ObjectModify => "object_modify",
            Self::ObjectDelete => "object_delete",
            Self::ConfigChange => "config_change",
            Self::Port => "port",
            Self::Recreate => "recreate",
        };
        write!(f, "{s}")
    }
}

/// Processing status of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Created,
    InProgress,
    Successful,
    Failed,
}

impl OrderStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Successful | Self::Failed)
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Created => "created",
            Self::InProgress => "in_progress",
            Self::Successful => "successful",
            Self::Failed => "failed",
        };
        write!(f, "{s}")
    }
}

/// One tracked request to perform a lifecycle operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceOrder {
    pub order_id: Uuid,
    pub service_id: Uuid,
    pub task_type: ServiceOrderType,
    pub order_status: OrderStatus,
    /// Composite operations (port, recreate) link their deploy/destroy
    /// children back to the parent order.
    pub parent_order_id: Option<Uuid>,
    /// External workflow-engine process instance driving this order.
    pub workflow_id: Option<String>,
    pub user_id: Option<String>,
    /// Request payload the order was created with.
    pub new_deploy_request: Option<DeployRequest>,
    /// Snapshots captured at order creation for audit and rollback
    /// comparison.
    pub previous_deploy_request: Option<DeployRequest>,
    pub previous_deployed_resources: Vec<ServiceResource>,
    pub previous_deployed_properties: HashMap<String, String>,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl ServiceOrder {
    pub fn new(order_id: Uuid, service_id: Uuid, task_type: ServiceOrderType) -> Self {
        Self {
            order_id,
            service_id,
            task_type,
            order_status: OrderStatus::Created,
            parent_order_id: None,
            workflow_id: None,
            user_id: None,
            new_deploy_request: None,
            previous_deploy_request: None,
            previous_deployed_resources: Vec::new(),
            previous_deployed_properties: HashMap::new(),
            error_message: None,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
        }
    }
}
