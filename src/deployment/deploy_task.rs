//! The unit of work handed to a deployer.

use uuid::Uuid;

use crate::models::{DeployRequest, ServiceOrderType, ServiceTemplate};

/// Fully resolved deployment task: the order identity, the request
/// payload, and the catalog template the deployer executes against.
#[derive(Debug, Clone, PartialEq)]
pub struct DeployTask {
    pub order_id: Uuid,
    pub service_id: Uuid,
    pub task_type: ServiceOrderType,
    pub user_id: Option<String>,
    pub request: DeployRequest,
    pub template: ServiceTemplate,
    /// Infra-state blob re-submitted to the deployer on destroy-shaped
    /// tasks; absent for fresh deploys.
    pub state_file: Option<String>,
    pub parent_order_id: Option<Uuid>,
    pub workflow_id: Option<String>,
}

impl DeployTask {
    pub fn new(
        service_id: Uuid,
        task_type: ServiceOrderType,
        request: DeployRequest,
        template: ServiceTemplate,
    ) -> Self {
        Self {
            order_id: Uuid::new_v4(),
            service_id,
            task_type,
            user_id: None,
            request,
            template,
            state_file: None,
            parent_order_id: None,
            workflow_id: None,
        }
    }
}
