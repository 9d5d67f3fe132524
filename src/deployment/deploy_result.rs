//! Transient carrier for deployer execution results.
//!
//! A `DeployResult` is never persisted directly; the reconciler folds it
//! into the service deployment and order records.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::ServiceResource;

use super::deploy_task::DeployTask;

/// Well-known generated-files key holding the infra-state blob. The blob
/// must round-trip byte-for-byte; it is re-submitted to the deployer on
/// destroy.
pub const STATE_FILE_KEY: &str = "stateFile";

/// Execution status reported by a deployer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeployerTaskStatus {
    DeploySuccess,
    DeployFailed,
    DestroySuccess,
    DestroyFailed,
    ModificationSuccessful,
    ModificationFailed,
    RollbackSuccess,
    RollbackFailed,
}

impl DeployerTaskStatus {
    pub fn is_successful(&self) -> bool {
        matches!(
            self,
            Self::DeploySuccess
                | Self::DestroySuccess
                | Self::ModificationSuccessful
                | Self::RollbackSuccess
        )
    }
}

impl fmt::Display for DeployerTaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::DeploySuccess => "deploy_success",
            Self::DeployFailed => "deploy_failed",
            Self::DestroySuccess => "destroy_success",
            Self::DestroyFailed => "destroy_failed",
            Self::ModificationSuccessful => "modification_successful",
            Self::ModificationFailed => "modification_failed",
            Self::RollbackSuccess => "rollback_success",
            Self::RollbackFailed => "rollback_failed",
        };
        write!(f, "{s}")
    }
}

/// Raw outcome of one deployer invocation, before reconciliation.
///
/// `order_id` and `is_successful` are optional because results can arrive
/// from out-of-band callbacks; a result missing either is rejected by the
/// reconciler without touching any state.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeployResult {
    pub order_id: Option<Uuid>,
    pub service_id: Option<Uuid>,
    pub is_successful: Option<bool>,
    pub state: Option<DeployerTaskStatus>,
    pub message: Option<String>,
    pub resources: Vec<ServiceResource>,
    pub output_properties: HashMap<String, String>,
    /// Deployer-generated files keyed by filename, including the
    /// infra-state blob under [`STATE_FILE_KEY`].
    pub generated_files: HashMap<String, String>,
    /// Provider-specific payload handed to the resource handler.
    pub raw_state: Option<serde_json::Value>,
}

impl DeployResult {
    /// A successful result carrying no payload, for operations that were
    /// short-circuited (e.g. purge with no resources, rollback with
    /// nothing to destroy).
    pub fn successful(order_id: Uuid, service_id: Uuid) -> Self {
        Self {
            order_id: Some(order_id),
            service_id: Some(service_id),
            is_successful: Some(true),
            ..Self::default()
        }
    }

    /// The failed result for a task whose deployer invocation raised an
    /// error.
    pub fn failed(task: &DeployTask, error_message: &str) -> Self {
        let message = format!(
            "Order task {} to {} the service {} failed: {}",
            task.order_id, task.task_type, task.service_id, error_message
        );
        Self {
            order_id: Some(task.order_id),
            service_id: Some(task.service_id),
            is_successful: Some(false),
            message: Some(message),
            ..Self::default()
        }
    }

    /// Contents of the captured infra-state blob, when present and
    /// non-empty.
    pub fn state_file(&self) -> Option<&str> {
        self.generated_files
            .get(STATE_FILE_KEY)
            .map(String::as_str)
            .filter(|content| !content.trim().is_empty())
    }
}
