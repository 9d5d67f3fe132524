//! The pluggable deployer seam.
//!
//! One implementation exists per Infrastructure-as-Code engine; the
//! registry resolves the implementation for a template's
//! [`DeployerKind`](crate::models::DeployerKind) at dispatch time.

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::Result;
use crate::models::DeployerKind;

use super::deploy_result::DeployResult;
use super::deploy_task::DeployTask;

/// Executes provisioning work through an external IaC engine.
///
/// Implementations may complete synchronously (result returned here) or
/// asynchronously (result delivered later through the callback path); in
/// both cases the returned or delivered `DeployResult` flows through the
/// result reconciler.
#[async_trait]
pub trait Deployer: Send + Sync {
    fn kind(&self) -> DeployerKind;

    async fn deploy(&self, task: &DeployTask) -> Result<DeployResult>;

    async fn modify(&self, task: &DeployTask) -> Result<DeployResult>;

    /// Destroy the resources recorded in the task's state blob.
    async fn destroy(&self, task: &DeployTask) -> Result<DeployResult>;

    /// Render the execution plan without applying it.
    async fn get_deployment_plan_as_json(&self, task: &DeployTask) -> Result<String>;

    /// Drop any engine-side workspace kept for the service.
    async fn delete_task_workspace(&self, service_id: Uuid) -> Result<()>;

    /// Query the engine's result-retrieval endpoint for an order whose
    /// callback never arrived. `None` when the engine has no record or no
    /// retrieval endpoint.
    async fn retrieve_result(&self, order_id: Uuid) -> Result<Option<DeployResult>>;
}
