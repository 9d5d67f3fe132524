//! Deployer and resource-handler registries.
//!
//! Both registries are explicit registration tables populated during
//! process initialization; lookups at dispatch time never mutate them.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::info;

use crate::error::{ProvisorError, Result};
use crate::models::{Csp, DeployerKind};

use super::deployer::Deployer;
use super::resource_handler::ResourceHandler;

/// Maps a deployer kind to its implementation.
#[derive(Default)]
pub struct DeployerRegistry {
    deployers: RwLock<HashMap<DeployerKind, Arc<dyn Deployer>>>,
}

impl DeployerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, deployer: Arc<dyn Deployer>) {
        let kind = deployer.kind();
        info!(deployer_kind = %kind, "Registered deployer");
        self.deployers.write().insert(kind, deployer);
    }

    pub fn get(&self, kind: DeployerKind) -> Result<Arc<dyn Deployer>> {
        self.deployers
            .read()
            .get(&kind)
            .cloned()
            .ok_or_else(|| ProvisorError::DeployerNotFound(kind.to_string()))
    }

    pub fn registered_kinds(&self) -> Vec<DeployerKind> {
        self.deployers.read().keys().copied().collect()
    }
}

/// Maps `(csp, deployer kind)` to the provider-specific result handler.
#[derive(Default)]
pub struct ResourceHandlerRegistry {
    handlers: RwLock<HashMap<(Csp, DeployerKind), Arc<dyn ResourceHandler>>>,
}

impl ResourceHandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, csp: Csp, kind: DeployerKind, handler: Arc<dyn ResourceHandler>) {
        info!(csp = %csp, deployer_kind = %kind, "Registered resource handler");
        self.handlers.write().insert((csp, kind), handler);
    }

    pub fn get(&self, csp: Csp, kind: DeployerKind) -> Result<Arc<dyn ResourceHandler>> {
        self.handlers
            .read()
            .get(&(csp, kind))
            .cloned()
            .ok_or_else(|| ProvisorError::ResourceHandlerNotFound {
                csp: csp.to_string(),
                kind: kind.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::deployment::deploy_result::DeployResult;
    use crate::deployment::deploy_task::DeployTask;
    use async_trait::async_trait;
    use uuid::Uuid;

    struct NoopDeployer(DeployerKind);

    #[async_trait]
    impl Deployer for NoopDeployer {
        fn kind(&self) -> DeployerKind {
            self.0
        }

        async fn deploy(&self, task: &DeployTask) -> crate::error::Result<DeployResult> {
            Ok(DeployResult::successful(task.order_id, task.service_id))
        }

        async fn modify(&self, task: &DeployTask) -> crate::error::Result<DeployResult> {
            Ok(DeployResult::successful(task.order_id, task.service_id))
        }

        async fn destroy(&self, task: &DeployTask) -> crate::error::Result<DeployResult> {
            Ok(DeployResult::successful(task.order_id, task.service_id))
        }

        async fn get_deployment_plan_as_json(
            &self,
            _task: &DeployTask,
        ) -> crate::error::Result<String> {
            Ok("{}".to_string())
        }

        async fn delete_task_workspace(&self, _service_id: Uuid) -> crate::error::Result<()> {
            Ok(())
        }

        async fn retrieve_result(
            &self,
            _order_id: Uuid,
        ) -> crate::error::Result<Option<DeployResult>> {
            Ok(None)
        }
    }

    #[test]
    fn lookup_of_unregistered_kind_fails() {
        let registry = DeployerRegistry::new();
        registry.register(Arc::new(NoopDeployer(DeployerKind::Terraform)));

        assert!(registry.get(DeployerKind::Terraform).is_ok());
        assert_eq!(registry.registered_kinds(), vec![DeployerKind::Terraform]);
        assert!(matches!(
            registry.get(DeployerKind::OpenTofu),
            Err(ProvisorError::DeployerNotFound(_))
        ));
    }
}
