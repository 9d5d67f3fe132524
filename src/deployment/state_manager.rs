//! # Service State Management
//!
//! Start/stop/restart operations on the operational state axis. This
//! manager is the only writer of `service_state`, `last_started_at`, and
//! `last_stopped_at` outside the reconciler's deploy-time side effects.
//!
//! Operations are two-phase: a request moves the service into a
//! transitional state, and [`ServiceStateManager::complete_state_task`]
//! resolves it once the underlying management task reports back.

use std::sync::Arc;

use chrono::Utc;
use tracing::info;
use uuid::Uuid;

use crate::error::{ProvisorError, Result};
use crate::models::{ServiceDeployment, ServiceDeploymentState, ServiceState};
use crate::storage::ServiceDeploymentStore;

pub struct ServiceStateManager {
    deployment_store: Arc<dyn ServiceDeploymentStore>,
}

impl ServiceStateManager {
    pub fn new(deployment_store: Arc<dyn ServiceDeploymentStore>) -> Self {
        Self { deployment_store }
    }

    /// Begin starting a stopped service.
    pub async fn start_service(&self, service_id: Uuid) -> Result<ServiceDeployment> {
        self.begin(service_id, "start", ServiceState::Starting, |state| {
            matches!(state, ServiceState::NotRunning | ServiceState::Stopped)
        })
        .await
    }

    /// Begin stopping a running service.
    pub async fn stop_service(&self, service_id: Uuid) -> Result<ServiceDeployment> {
        self.begin(service_id, "stop", ServiceState::Stopping, |state| {
            matches!(state, ServiceState::Running)
        })
        .await
    }

    /// Begin restarting a running service.
    pub async fn restart_service(&self, service_id: Uuid) -> Result<ServiceDeployment> {
        self.begin(service_id, "restart", ServiceState::Restarting, |state| {
            matches!(state, ServiceState::Running)
        })
        .await
    }

    /// Resolve a transitional state once the management task finished.
    pub async fn complete_state_task(
        &self,
        service_id: Uuid,
        is_successful: bool,
    ) -> Result<ServiceDeployment> {
        let mut entity = self.get_deployment(service_id).await?;
        let target = match (entity.service_state, is_successful) {
            (ServiceState::Starting | ServiceState::Restarting, true) => ServiceState::Running,
            (ServiceState::Starting | ServiceState::Restarting, false) => ServiceState::NotRunning,
            (ServiceState::Stopping, true) => ServiceState::Stopped,
            (ServiceState::Stopping, false) => ServiceState::Running,
            (current, _) => {
                return Err(ProvisorError::InvalidServiceRunState {
                    service_id,
                    current_state: current,
                    operation: "complete a state task".to_string(),
                })
            }
        };
        match target {
            ServiceState::Running => entity.last_started_at = Some(Utc::now()),
            ServiceState::Stopped => entity.last_stopped_at = Some(Utc::now()),
            _ => {}
        }
        info!(
            service_id = %service_id,
            from = %entity.service_state,
            to = %target,
            "Service state task completed"
        );
        entity.service_state = target;
        Ok(self.deployment_store.store_and_flush(entity).await?)
    }

    async fn begin(
        &self,
        service_id: Uuid,
        operation: &str,
        transitional: ServiceState,
        allowed: impl Fn(ServiceState) -> bool,
    ) -> Result<ServiceDeployment> {
        let mut entity = self.get_deployment(service_id).await?;
        if !matches!(
            entity.service_deployment_state,
            ServiceDeploymentState::DeploySuccess
                | ServiceDeploymentState::ModificationSuccessful
        ) {
            return Err(ProvisorError::InvalidServiceState {
                service_id,
                current_state: entity.service_deployment_state,
                expected_states: vec![
                    ServiceDeploymentState::DeploySuccess,
                    ServiceDeploymentState::ModificationSuccessful,
                ],
            });
        }
        if !allowed(entity.service_state) {
            return Err(ProvisorError::InvalidServiceRunState {
                service_id,
                current_state: entity.service_state,
                operation: operation.to_string(),
            });
        }
        info!(service_id = %service_id, operation = operation, "Service state task accepted");
        entity.service_state = transitional;
        Ok(self.deployment_store.store_and_flush(entity).await?)
    }

    async fn get_deployment(&self, service_id: Uuid) -> Result<ServiceDeployment> {
        self.deployment_store
            .find_by_id(service_id)
            .await?
            .ok_or(ProvisorError::ServiceDeploymentNotFound(service_id))
    }
}
