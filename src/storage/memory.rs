//! In-memory store implementations.
//!
//! Reference backend used by tests and single-process embedders. DashMap
//! entries give the per-record exclusive access the claim protocol needs.

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use uuid::Uuid;

use crate::models::{
    ServiceChangeRequest, ServiceChangeStatus, ServiceDeployment, ServiceOrder, ServiceTemplate,
};

use super::{
    ServiceChangeQuery, ServiceChangeStore, ServiceDeploymentQuery, ServiceDeploymentStore,
    ServiceOrderStore, ServiceTemplateStore, StorageResult,
};

/// DashMap-backed service deployment store.
#[derive(Debug, Default)]
pub struct InMemoryDeploymentStore {
    records: DashMap<Uuid, ServiceDeployment>,
}

impl InMemoryDeploymentStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ServiceDeploymentStore for InMemoryDeploymentStore {
    async fn store_and_flush(
        &self,
        mut entity: ServiceDeployment,
    ) -> StorageResult<ServiceDeployment> {
        entity.updated_at = Utc::now();
        self.records.insert(entity.id, entity.clone());
        Ok(entity)
    }

    async fn find_by_id(&self, id: Uuid) -> StorageResult<Option<ServiceDeployment>> {
        Ok(self.records.get(&id).map(|r| r.clone()))
    }

    async fn list(
        &self,
        query: &ServiceDeploymentQuery,
    ) -> StorageResult<Vec<ServiceDeployment>> {
        let mut services: Vec<ServiceDeployment> = self
            .records
            .iter()
            .filter(|r| query.csp.is_none_or(|csp| r.csp == csp))
            .filter(|r| {
                query
                    .state
                    .is_none_or(|state| r.service_deployment_state == state)
            })
            .map(|r| r.clone())
            .collect();
        services.sort_by_key(|s| s.created_at);
        Ok(services)
    }

    async fn delete(&self, id: Uuid) -> StorageResult<()> {
        self.records.remove(&id);
        Ok(())
    }
}

/// DashMap-backed order store.
#[derive(Debug, Default)]
pub struct InMemoryOrderStore {
    records: DashMap<Uuid, ServiceOrder>,
}

impl InMemoryOrderStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ServiceOrderStore for InMemoryOrderStore {
    async fn store_and_flush(&self, order: ServiceOrder) -> StorageResult<ServiceOrder> {
        self.records.insert(order.order_id, order.clone());
        Ok(order)
    }

    async fn find_by_id(&self, order_id: Uuid) -> StorageResult<Option<ServiceOrder>> {
        Ok(self.records.get(&order_id).map(|r| r.clone()))
    }

    async fn list_by_service(&self, service_id: Uuid) -> StorageResult<Vec<ServiceOrder>> {
        let mut orders: Vec<ServiceOrder> = self
            .records
            .iter()
            .filter(|r| r.service_id == service_id)
            .map(|r| r.clone())
            .collect();
        orders.sort_by_key(|o| o.created_at);
        Ok(orders)
    }

    async fn list_by_parent(&self, parent_order_id: Uuid) -> StorageResult<Vec<ServiceOrder>> {
        let mut orders: Vec<ServiceOrder> = self
            .records
            .iter()
            .filter(|r| r.parent_order_id == Some(parent_order_id))
            .map(|r| r.clone())
            .collect();
        orders.sort_by_key(|o| o.created_at);
        Ok(orders)
    }

    async fn delete_by_service(&self, service_id: Uuid) -> StorageResult<()> {
        self.records.retain(|_, order| order.service_id != service_id);
        Ok(())
    }
}

/// DashMap-backed template store.
#[derive(Debug, Default)]
pub struct InMemoryTemplateStore {
    records: DashMap<Uuid, ServiceTemplate>,
}

impl InMemoryTemplateStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ServiceTemplateStore for InMemoryTemplateStore {
    async fn store(&self, template: ServiceTemplate) -> StorageResult<ServiceTemplate> {
        self.records.insert(template.template_id, template.clone());
        Ok(template)
    }

    async fn find_by_id(&self, template_id: Uuid) -> StorageResult<Option<ServiceTemplate>> {
        Ok(self.records.get(&template_id).map(|r| r.clone()))
    }
}

/// DashMap-backed change-request store.
#[derive(Debug, Default)]
pub struct InMemoryChangeStore {
    records: DashMap<Uuid, ServiceChangeRequest>,
}

impl InMemoryChangeStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ServiceChangeStore for InMemoryChangeStore {
    async fn save_all(&self, requests: Vec<ServiceChangeRequest>) -> StorageResult<()> {
        for request in requests {
            self.records.insert(request.id, request);
        }
        Ok(())
    }

    async fn store_and_flush(
        &self,
        request: ServiceChangeRequest,
    ) -> StorageResult<ServiceChangeRequest> {
        self.records.insert(request.id, request.clone());
        Ok(request)
    }

    async fn find_by_id(&self, id: Uuid) -> StorageResult<Option<ServiceChangeRequest>> {
        Ok(self.records.get(&id).map(|r| r.clone()))
    }

    async fn list(
        &self,
        query: &ServiceChangeQuery,
    ) -> StorageResult<Vec<ServiceChangeRequest>> {
        let mut requests: Vec<ServiceChangeRequest> = self
            .records
            .iter()
            .filter(|r| query.order_id.is_none_or(|id| r.order_id == id))
            .filter(|r| query.service_id.is_none_or(|id| r.service_id == id))
            .filter(|r| {
                query
                    .resource_name
                    .as_deref()
                    .is_none_or(|name| r.resource_name.as_deref() == Some(name))
            })
            .filter(|r| {
                query
                    .change_handler
                    .as_deref()
                    .is_none_or(|handler| r.change_handler == handler)
            })
            .filter(|r| query.status.is_none_or(|status| r.status == status))
            .map(|r| r.clone())
            .collect();
        requests.sort_by_key(|r| r.created_at);
        Ok(requests)
    }

    async fn claim(
        &self,
        id: Uuid,
        resource_name: &str,
    ) -> StorageResult<Option<ServiceChangeRequest>> {
        // The entry ref holds the shard lock, making check-and-set atomic.
        match self.records.get_mut(&id) {
            Some(mut entry) => {
                if entry.status != ServiceChangeStatus::Pending {
                    return Ok(None);
                }
                if entry.resource_name.is_none() {
                    entry.resource_name = Some(resource_name.to_string());
                }
                entry.status = ServiceChangeStatus::Processing;
                Ok(Some(entry.clone()))
            }
            None => Ok(None),
        }
    }

    async fn delete_by_service(&self, service_id: Uuid) -> StorageResult<()> {
        self.records
            .retain(|_, request| request.service_id != service_id);
        Ok(())
    }
}
