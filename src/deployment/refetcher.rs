//! # Stale-Order Re-Fetch
//!
//! Callback delivery from the deployer services can fail, leaving an
//! order IN_PROGRESS forever. Detection is pull-on-read: whenever a
//! service's details are viewed or listed while the service is in a
//! transitional state, the in-flight order is checked against a timeout
//! and, once exceeded, the deployer's result-retrieval endpoint is
//! queried. A recovered result flows through the normal reconciler path.

use std::sync::Arc;

use chrono::{Duration, Utc};
use futures::future::join_all;
use tracing::{debug, error, info};

use crate::config::ProvisorConfig;
use crate::error::Result;
use crate::models::{
    OrderStatus, ServiceDeployment, ServiceDeploymentState, ServiceOrder, ServiceOrderType,
};
use crate::storage::{ServiceOrderStore, ServiceTemplateStore};

use super::reconciler::DeployResultReconciler;
use super::registry::DeployerRegistry;

pub struct StaleOrderReFetcher {
    order_store: Arc<dyn ServiceOrderStore>,
    template_store: Arc<dyn ServiceTemplateStore>,
    deployer_registry: Arc<DeployerRegistry>,
    reconciler: Arc<DeployResultReconciler>,
    max_processing_duration: Duration,
}

impl StaleOrderReFetcher {
    pub fn new(
        order_store: Arc<dyn ServiceOrderStore>,
        template_store: Arc<dyn ServiceTemplateStore>,
        deployer_registry: Arc<DeployerRegistry>,
        reconciler: Arc<DeployResultReconciler>,
        config: &ProvisorConfig,
    ) -> Self {
        Self {
            order_store,
            template_store,
            deployer_registry,
            reconciler,
            max_processing_duration: Duration::seconds(
                config.max_order_processing_duration_secs as i64,
            ),
        }
    }

    /// Re-query the deployer for a service stuck in a transitional state
    /// whose in-flight order exceeded the processing timeout.
    pub async fn refetch_result_for_service(&self, service: &ServiceDeployment) -> Result<()> {
        let Some(order) = self.in_flight_order(service).await? else {
            return Ok(());
        };
        let Some(started_at) = order.started_at else {
            return Ok(());
        };
        if Utc::now() - started_at <= self.max_processing_duration {
            debug!(
                order_id = %order.order_id,
                "In-flight order still within its processing window"
            );
            return Ok(());
        }

        let template = match self
            .template_store
            .find_by_id(service.service_template_id)
            .await?
        {
            Some(template) => template,
            None => {
                error!(
                    service_id = %service.id,
                    template_id = %service.service_template_id,
                    "Template of stale service not found"
                );
                return Ok(());
            }
        };
        let deployer = self.deployer_registry.get(template.deployer_kind)?;

        info!(
            order_id = %order.order_id,
            service_id = %service.id,
            "Re-fetching lost result from deployer"
        );
        if let Some(result) = deployer.retrieve_result(order.order_id).await? {
            self.reconciler
                .update_service_with_deploy_result(&result)
                .await?;
        }
        Ok(())
    }

    /// Batch form used by service listings. Services are independent, so
    /// their re-fetches run concurrently.
    pub async fn refetch_results_for_services(&self, services: &[ServiceDeployment]) {
        let checks = services.iter().map(|service| async move {
            if let Err(e) = self.refetch_result_for_service(service).await {
                error!(service_id = %service.id, error = %e, "Stale order re-fetch failed");
            }
        });
        join_all(checks).await;
    }

    /// The IN_PROGRESS order matching the service's transitional state,
    /// if any.
    async fn in_flight_order(
        &self,
        service: &ServiceDeployment,
    ) -> Result<Option<ServiceOrder>> {
        let matches_state = |task_type: ServiceOrderType| match service.service_deployment_state {
            ServiceDeploymentState::Deploying => task_type.is_deploy_like(),
            ServiceDeploymentState::Destroying => matches!(
                task_type,
                ServiceOrderType::Destroy | ServiceOrderType::Rollback | ServiceOrderType::Purge
            ),
            ServiceDeploymentState::Modifying => task_type == ServiceOrderType::Modify,
            _ => false,
        };
        if !service.service_deployment_state.has_order_in_progress() {
            return Ok(None);
        }
        let orders = self.order_store.list_by_service(service.id).await?;
        Ok(orders.into_iter().find(|order| {
            order.order_status == OrderStatus::InProgress && matches_state(order.task_type)
        }))
    }
}
