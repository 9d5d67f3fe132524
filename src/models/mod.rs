//! Persisted entity types for the service catalog orchestration core.
//!
//! These structs are storage-agnostic: the `storage` module defines the
//! trait seams through which they are read and written. State enums carry
//! serde derives plus `Display`/`FromStr` so they round-trip through logs,
//! APIs, and persisted records unchanged.

pub mod deploy_request;
pub mod service_change;
pub mod service_deployment;
pub mod service_order;
pub mod service_resource;
pub mod service_template;

pub use deploy_request::DeployRequest;
pub use service_change::{ServiceChangeRequest, ServiceChangeResult, ServiceChangeStatus};
pub use service_deployment::{
    ServiceConfigurationRecord, ServiceDeployment, ServiceDeploymentState, ServiceLockConfig,
    ServiceState,
};
pub use service_order::{OrderStatus, ServiceOrder, ServiceOrderType};
pub use service_resource::{ResourceKind, ServiceResource};
pub use service_template::{
    ConfigurationManage, Csp, DeployVariable, DeployerKind, ServiceChangeScript, ServiceFlavor,
    ServiceTemplate,
};
