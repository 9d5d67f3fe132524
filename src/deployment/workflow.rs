//! External workflow-engine seam.
//!
//! Composite operations (port, recreate) are driven by a BPMN-style
//! engine that blocks on receive tasks; the reconciler signals the
//! matching activity when a child order completes. Signaling is
//! best-effort and never fails the underlying order completion.

use async_trait::async_trait;

use crate::error::Result;
use crate::models::ServiceOrderType;

pub const PORT_DEPLOY_RECEIVE_TASK_ACTIVITY_ID: &str = "portDeployReceiveTask";
pub const PORT_DESTROY_RECEIVE_TASK_ACTIVITY_ID: &str = "portDestroyReceiveTask";
pub const RECREATE_DEPLOY_RECEIVE_TASK_ACTIVITY_ID: &str = "recreateDeployReceiveTask";
pub const RECREATE_DESTROY_RECEIVE_TASK_ACTIVITY_ID: &str = "recreateDestroyReceiveTask";

/// Signals process instances of the external workflow engine.
#[async_trait]
pub trait WorkflowEngine: Send + Sync {
    /// Mark the named receive-task activity of a process instance as
    /// completed.
    async fn complete_receive_task(
        &self,
        process_instance_id: &str,
        activity_id: &str,
    ) -> Result<()>;
}

/// The receive-task activity a (parent order type, child order type)
/// combination unblocks, if any.
pub fn receive_task_activity_id(
    parent_type: ServiceOrderType,
    child_type: ServiceOrderType,
) -> Option<&'static str> {
    match (parent_type, child_type) {
        (ServiceOrderType::Port, t) if t.is_deploy_like() => {
            Some(PORT_DEPLOY_RECEIVE_TASK_ACTIVITY_ID)
        }
        (ServiceOrderType::Port, ServiceOrderType::Destroy) => {
            Some(PORT_DESTROY_RECEIVE_TASK_ACTIVITY_ID)
        }
        (ServiceOrderType::Recreate, t) if t.is_deploy_like() => {
            Some(RECREATE_DEPLOY_RECEIVE_TASK_ACTIVITY_ID)
        }
        (ServiceOrderType::Recreate, ServiceOrderType::Destroy) => {
            Some(RECREATE_DESTROY_RECEIVE_TASK_ACTIVITY_ID)
        }
        _ => None,
    }
}
