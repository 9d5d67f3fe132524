//! # Service Change Request Model
//!
//! Units of configuration/action/object-change work claimed and executed
//! by external agents. Requests are created in batches under one order;
//! the claim protocol guarantees a request is processed by exactly one
//! agent.

use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Processing status of one change request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceChangeStatus {
    Pending,
    Processing,
    Successful,
    Error,
}

impl ServiceChangeStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Successful | Self::Error)
    }
}

impl fmt::Display for ServiceChangeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Successful => "successful",
            Self::Error => "error",
        };
        write!(f, "{s}")
    }
}

/// One change-request work item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceChangeRequest {
    pub id: Uuid,
    pub order_id: Uuid,
    pub service_id: Uuid,
    /// Resource group the change applies to.
    pub change_handler: String,
    /// Target resource. None means the request applies once across the
    /// group and is bound to a resource when claimed.
    pub resource_name: Option<String>,
    /// Effective properties the agent applies.
    pub properties: HashMap<String, serde_json::Value>,
    /// Properties exactly as the user requested them; written back to the
    /// service configuration when a config-change order succeeds.
    pub original_request_properties: HashMap<String, serde_json::Value>,
    pub status: ServiceChangeStatus,
    pub result_message: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl ServiceChangeRequest {
    pub fn new(
        order_id: Uuid,
        service_id: Uuid,
        change_handler: impl Into<String>,
        properties: HashMap<String, serde_json::Value>,
        original_request_properties: HashMap<String, serde_json::Value>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            order_id,
            service_id,
            change_handler: change_handler.into(),
            resource_name: None,
            properties,
            original_request_properties,
            status: ServiceChangeStatus::Pending,
            result_message: None,
            created_at: Utc::now(),
        }
    }
}

/// Result an execution agent reports for a claimed change request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceChangeResult {
    pub is_successful: bool,
    pub error: Option<String>,
}
