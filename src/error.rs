//! Error types for the provisor orchestration core.

use thiserror::Error;
use uuid::Uuid;

use crate::models::service_deployment::{ServiceDeploymentState, ServiceState};
use crate::storage::StorageError;

/// Crate-wide error type covering validation, dispatch, and reconciliation failures.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ProvisorError {
    #[error("Service deployment {0} not found")]
    ServiceDeploymentNotFound(Uuid),

    #[error("Service order {0} not found")]
    ServiceOrderNotFound(Uuid),

    #[error("Service change request {0} with status PROCESSING not found")]
    ServiceChangeRequestNotFound(Uuid),

    #[error("Service template {0} not found")]
    ServiceTemplateNotFound(Uuid),

    #[error(
        "Service {service_id} is in state {current_state}, expected one of {expected_states:?}"
    )]
    InvalidServiceState {
        service_id: Uuid,
        current_state: ServiceDeploymentState,
        expected_states: Vec<ServiceDeploymentState>,
    },

    #[error("Service {service_id} has an order in progress, current state {current_state}")]
    ServiceOrderInProgress {
        service_id: Uuid,
        current_state: ServiceDeploymentState,
    },

    #[error("Service {service_id} is {current_state}, cannot {operation}")]
    InvalidServiceRunState {
        service_id: Uuid,
        current_state: ServiceState,
        operation: String,
    },

    #[error("Downgrade from flavor {current_flavor} to {new_flavor} is not allowed by the service template")]
    FlavorDowngradeNotAllowed {
        current_flavor: String,
        new_flavor: String,
    },

    #[error("Flavor {0} is not defined in the service template")]
    FlavorNotFound(String),

    #[error("Policy validation failed: {0}")]
    PolicyViolation(String),

    #[error("Variable validation failed: {0}")]
    InvalidVariables(String),

    #[error("No deployer registered for kind {0}")]
    DeployerNotFound(String),

    #[error("No resource handler registered for csp {csp} and deployer kind {kind}")]
    ResourceHandlerNotFound { csp: String, kind: String },

    #[error("Order task {order_id} to {task_type} the service {service_id} failed: {message}")]
    DeploymentFailed {
        order_id: Uuid,
        service_id: Uuid,
        task_type: String,
        message: String,
    },

    #[error("Service {service_id} is locked against {operation}")]
    ServiceLocked {
        service_id: Uuid,
        operation: String,
    },

    #[error("Invalid service change request: {0}")]
    InvalidChangeRequest(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Storage lock timeout: {0}")]
    StorageLockTimeout(String),

    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl From<StorageError> for ProvisorError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::LockTimeout(message) => ProvisorError::StorageLockTimeout(message),
            other => ProvisorError::Storage(other.to_string()),
        }
    }
}

pub type Result<T> = anyhow::Result<T, ProvisorError>;
