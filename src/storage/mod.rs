//! Storage trait seams for the orchestration core.
//!
//! Persistence technology is intentionally abstract: the orchestrator,
//! reconciler, and change manager only require transactional single-row
//! read-modify-write semantics from their backing stores. The bundled
//! [`memory`] implementation backs tests and embedders without a database.

pub mod memory;

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{
    Csp, ServiceChangeRequest, ServiceChangeStatus, ServiceDeployment, ServiceDeploymentState,
    ServiceOrder, ServiceTemplate,
};

/// Errors surfaced by storage backends.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StorageError {
    #[error("Record {0} not found")]
    NotFound(Uuid),
    #[error("Lock acquisition timed out: {0}")]
    LockTimeout(String),
    #[error("Storage backend error: {0}")]
    Backend(String),
}

pub type StorageResult<T> = std::result::Result<T, StorageError>;

/// Filter for service deployment listings.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ServiceDeploymentQuery {
    pub csp: Option<Csp>,
    pub state: Option<ServiceDeploymentState>,
}

/// Filter for change-request listings.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ServiceChangeQuery {
    pub order_id: Option<Uuid>,
    pub service_id: Option<Uuid>,
    pub resource_name: Option<String>,
    pub change_handler: Option<String>,
    pub status: Option<ServiceChangeStatus>,
}

/// Store of deployed service instance records.
#[async_trait]
pub trait ServiceDeploymentStore: Send + Sync {
    async fn store_and_flush(
        &self,
        entity: ServiceDeployment,
    ) -> StorageResult<ServiceDeployment>;

    async fn find_by_id(&self, id: Uuid) -> StorageResult<Option<ServiceDeployment>>;

    async fn list(&self, query: &ServiceDeploymentQuery)
        -> StorageResult<Vec<ServiceDeployment>>;

    async fn delete(&self, id: Uuid) -> StorageResult<()>;
}

/// Store of order task records.
#[async_trait]
pub trait ServiceOrderStore: Send + Sync {
    async fn store_and_flush(&self, order: ServiceOrder) -> StorageResult<ServiceOrder>;

    async fn find_by_id(&self, order_id: Uuid) -> StorageResult<Option<ServiceOrder>>;

    async fn list_by_service(&self, service_id: Uuid) -> StorageResult<Vec<ServiceOrder>>;

    /// Child orders spawned by a composite parent.
    async fn list_by_parent(&self, parent_order_id: Uuid) -> StorageResult<Vec<ServiceOrder>>;

    /// Remove every order of a purged service.
    async fn delete_by_service(&self, service_id: Uuid) -> StorageResult<()>;
}

/// Read access to the service catalog.
#[async_trait]
pub trait ServiceTemplateStore: Send + Sync {
    async fn store(&self, template: ServiceTemplate) -> StorageResult<ServiceTemplate>;

    async fn find_by_id(&self, template_id: Uuid) -> StorageResult<Option<ServiceTemplate>>;
}

/// Store of change-request work items.
#[async_trait]
pub trait ServiceChangeStore: Send + Sync {
    async fn save_all(&self, requests: Vec<ServiceChangeRequest>) -> StorageResult<()>;

    async fn store_and_flush(
        &self,
        request: ServiceChangeRequest,
    ) -> StorageResult<ServiceChangeRequest>;

    async fn find_by_id(&self, id: Uuid) -> StorageResult<Option<ServiceChangeRequest>>;

    async fn list(&self, query: &ServiceChangeQuery)
        -> StorageResult<Vec<ServiceChangeRequest>>;

    /// Atomically claim a PENDING request: bind `resource_name` when the
    /// request is group-wide and move it to PROCESSING. Returns `None`
    /// when the request was concurrently claimed or completed.
    async fn claim(
        &self,
        id: Uuid,
        resource_name: &str,
    ) -> StorageResult<Option<ServiceChangeRequest>>;

    /// Remove every change request of a purged service.
    async fn delete_by_service(&self, service_id: Uuid) -> StorageResult<()>;
}
