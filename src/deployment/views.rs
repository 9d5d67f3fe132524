//! Service detail and listing views.
//!
//! Lookups run the stale-order re-fetcher before returning, so a service
//! stuck in a transitional state recovers its lost result the moment
//! someone looks at it.

use std::sync::Arc;

use tracing::error;
use uuid::Uuid;

use crate::error::{ProvisorError, Result};
use crate::models::ServiceDeployment;
use crate::storage::{ServiceDeploymentQuery, ServiceDeploymentStore};

use super::refetcher::StaleOrderReFetcher;

pub struct ServiceDetailsViewManager {
    deployment_store: Arc<dyn ServiceDeploymentStore>,
    refetcher: Arc<StaleOrderReFetcher>,
}

impl ServiceDetailsViewManager {
    pub fn new(
        deployment_store: Arc<dyn ServiceDeploymentStore>,
        refetcher: Arc<StaleOrderReFetcher>,
    ) -> Self {
        Self {
            deployment_store,
            refetcher,
        }
    }

    /// Details of one service, visible to its owner or an admin.
    pub async fn get_service_details(
        &self,
        service_id: Uuid,
        user_id: Option<&str>,
        is_admin: bool,
    ) -> Result<ServiceDeployment> {
        let entity = self
            .deployment_store
            .find_by_id(service_id)
            .await?
            .ok_or(ProvisorError::ServiceDeploymentNotFound(service_id))?;
        ensure_can_access(&entity, user_id, is_admin)?;

        if let Err(e) = self.refetcher.refetch_result_for_service(&entity).await {
            error!(service_id = %service_id, error = %e, "Stale order re-fetch failed");
        }
        // Re-read: the re-fetch may have reconciled a recovered result.
        self.deployment_store
            .find_by_id(service_id)
            .await?
            .ok_or(ProvisorError::ServiceDeploymentNotFound(service_id))
    }

    /// List services matching the query, after recovering any stale
    /// in-flight orders among them.
    pub async fn list_services(
        &self,
        query: &ServiceDeploymentQuery,
    ) -> Result<Vec<ServiceDeployment>> {
        let services = self.deployment_store.list(query).await?;
        self.refetcher.refetch_results_for_services(&services).await;
        Ok(self.deployment_store.list(query).await?)
    }
}

/// A user may act on a service they own; admins may act on any service.
pub fn ensure_can_access(
    entity: &ServiceDeployment,
    user_id: Option<&str>,
    is_admin: bool,
) -> Result<()> {
    if is_admin {
        return Ok(());
    }
    match (&entity.user_id, user_id) {
        (Some(owner), Some(caller)) if owner == caller => Ok(()),
        (None, _) => Ok(()),
        _ => Err(ProvisorError::PermissionDenied(format!(
            "Service {} belongs to another user",
            entity.id
        ))),
    }
}
