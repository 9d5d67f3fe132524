//! # Service Deployment Model
//!
//! The persisted record of one deployed service instance: its lifecycle
//! state, operational state, resources, properties, and configuration.
//!
//! Both state axes are mutated only through the result reconciler and the
//! service state manager. The resource list is owned exclusively by this
//! record and replaced wholesale on every successful reconciliation.

use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::deploy_request::DeployRequest;
use super::service_resource::ServiceResource;
use super::service_template::Csp;

/// Lifecycle state of a service deployment, driven by order completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceDeploymentState {
    Deploying,
    DeploySuccess,
    DeployFailed,
    Destroying,
    DestroySuccess,
    DestroyFailed,
    Modifying,
    ModificationSuccessful,
    ModificationFailed,
    RollbackFailed,
    ManualCleanupRequired,
}

impl ServiceDeploymentState {
    /// True while an order against the service is still running.
    pub fn has_order_in_progress(&self) -> bool {
        matches!(self, Self::Deploying | Self::Destroying | Self::Modifying)
    }

    /// States from which a modify order may be accepted.
    pub fn allows_modify(&self) -> bool {
        matches!(
            self,
            Self::DeploySuccess | Self::ModificationFailed | Self::ModificationSuccessful
        )
    }

    /// States from which a purge order may be accepted.
    pub fn allows_purge(&self) -> bool {
        matches!(
            self,
            Self::DeployFailed
                | Self::DestroySuccess
                | Self::DestroyFailed
                | Self::RollbackFailed
                | Self::ManualCleanupRequired
        )
    }

    /// States from which a redeploy (retry) order may be accepted.
    pub fn allows_redeploy(&self) -> bool {
        matches!(self, Self::DeployFailed | Self::RollbackFailed)
    }
}

impl fmt::Display for ServiceDeploymentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Deploying => "deploying",
            Self::DeploySuccess => "deploy_success",
            Self::DeployFailed => "deploy_failed",
            Self::Destroying => "destroying",
            Self::DestroySuccess => "destroy_success",
            Self::DestroyFailed => "destroy_failed",
            Self::Modifying => "modifying",
            Self::ModificationSuccessful => "modification_successful",
            Self::ModificationFailed => "modification_failed",
            Self::RollbackFailed => "rollback_failed",
            Self::ManualCleanupRequired => "manual_cleanup_required",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for ServiceDeploymentState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "deploying" => Ok(Self::Deploying),
            "deploy_success" => Ok(Self::DeploySuccess),
            "deploy_failed" => Ok(Self::DeployFailed),
            "destroying" => Ok(Self::Destroying),
            "destroy_success" => Ok(Self::DestroySuccess),
            "destroy_failed" => Ok(Self::DestroyFailed),
            "modifying" => Ok(Self::Modifying),
            "modification_successful" => Ok(Self::ModificationSuccessful),
            "modification_failed" => Ok(Self::ModificationFailed),
            "rollback_failed" => Ok(Self::RollbackFailed),
            "manual_cleanup_required" => Ok(Self::ManualCleanupRequired),
            _ => Err(format!("Unknown service deployment state: {s}")),
        }
    }
}

/// Operational state of the running service, independent of the lifecycle axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceState {
    Running,
    NotRunning,
    Starting,
    Stopping,
    Restarting,
    Stopped,
}

impl ServiceState {
    /// True while a state-management task is still running.
    pub fn is_transitional(&self) -> bool {
        matches!(self, Self::Starting | Self::Stopping | Self::Restarting)
    }
}

impl fmt::Display for ServiceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Running => "running",
            Self::NotRunning => "not_running",
            Self::Starting => "starting",
            Self::Stopping => "stopping",
            Self::Restarting => "restarting",
            Self::Stopped => "stopped",
        };
        write!(f, "{s}")
    }
}

/// Lock flags preventing destructive or modifying orders.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceLockConfig {
    pub destroy_locked: bool,
    pub modify_locked: bool,
}

/// Configuration record attached to a deployed service when the template
/// defines configuration management. Created on the first successful
/// deploy, removed when the service is destroyed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceConfigurationRecord {
    pub properties: HashMap<String, serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One deployed service instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceDeployment {
    pub id: Uuid,
    pub service_template_id: Uuid,
    pub customer_service_name: String,
    /// Owner of the service; permission checks compare against this.
    pub user_id: Option<String>,
    pub csp: Csp,
    pub flavor: String,
    pub region: String,
    pub availability_zones: HashMap<String, String>,
    pub service_deployment_state: ServiceDeploymentState,
    pub service_state: ServiceState,
    /// The deploy request the current state was produced from. Replaced by
    /// modify orders before dispatch.
    pub deploy_request: DeployRequest,
    /// User-supplied deployment variables; sensitive entries are masked
    /// before this record is persisted.
    pub input_properties: HashMap<String, serde_json::Value>,
    pub output_properties: HashMap<String, String>,
    /// Files produced by the deployer, keyed by filename. Holds the
    /// infra-state blob, which must round-trip byte-for-byte.
    pub generated_files: HashMap<String, String>,
    pub resources: Vec<ServiceResource>,
    pub lock_config: ServiceLockConfig,
    pub service_config: Option<ServiceConfigurationRecord>,
    pub result_message: Option<String>,
    pub last_started_at: Option<DateTime<Utc>>,
    pub last_stopped_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ServiceDeployment {
    /// Create the record for a freshly accepted deploy task.
    pub fn new(
        service_id: Uuid,
        template_id: Uuid,
        csp: Csp,
        request: DeployRequest,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: service_id,
            service_template_id: template_id,
            customer_service_name: request.customer_service_name.clone(),
            user_id: None,
            csp,
            flavor: request.flavor.clone(),
            region: request.region.clone(),
            availability_zones: request.availability_zones.clone(),
            service_deployment_state: ServiceDeploymentState::Deploying,
            service_state: ServiceState::NotRunning,
            input_properties: request.service_request_properties.clone(),
            deploy_request: request,
            output_properties: HashMap::new(),
            generated_files: HashMap::new(),
            resources: Vec::new(),
            lock_config: ServiceLockConfig::default(),
            service_config: None,
            result_message: None,
            last_started_at: None,
            last_stopped_at: None,
            created_at: now,
            updated_at: now,
        }
    }
}
