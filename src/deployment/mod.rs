//! # Deployment Orchestration
//!
//! The order/deployment-result core: accepts lifecycle tasks against
//! deployed services, dispatches them to pluggable IaC deployers, and
//! reconciles the asynchronous results back into persisted state.
//!
//! ## Core Components
//!
//! - **DeployOrchestrator**: drives the deploy/redeploy/modify/destroy/
//!   purge use cases and owns precondition validation
//! - **DeployResultReconciler**: folds deployer results into the service
//!   and order records, including automatic rollback and parent-order
//!   propagation
//! - **StaleOrderReFetcher**: pull-on-read recovery of results whose
//!   callback delivery was lost
//! - **ServiceChangeManager**: fan-out, claim protocol, and fan-in for
//!   configuration/action/object change requests
//! - **ServiceStateManager**: start/stop/restart transitions on the
//!   operational state axis
//! - **DeployerRegistry / ResourceHandlerRegistry**: explicit
//!   registration tables resolved per task at dispatch time

pub mod callback;
pub mod change_manager;
pub mod deploy_result;
pub mod deploy_task;
pub mod deployer;
pub mod order_manager;
pub mod orchestrator;
pub mod policy;
pub mod reconciler;
pub mod refetcher;
pub mod registry;
pub mod resource_handler;
pub mod sensitive;
pub mod state_manager;
pub mod views;
pub mod workflow;

pub use callback::DeploymentResultCallbackManager;
pub use change_manager::ServiceChangeManager;
pub use deploy_result::{DeployResult, DeployerTaskStatus, STATE_FILE_KEY};
pub use deploy_task::DeployTask;
pub use deployer::Deployer;
pub use order_manager::ServiceOrderManager;
pub use orchestrator::DeployOrchestrator;
pub use policy::{AcceptAllPolicyValidator, PolicyValidator};
pub use reconciler::{deployment_state_for, DeployResultReconciler};
pub use refetcher::StaleOrderReFetcher;
pub use registry::{DeployerRegistry, ResourceHandlerRegistry};
pub use resource_handler::ResourceHandler;
pub use sensitive::SensitiveDataMasker;
pub use state_manager::ServiceStateManager;
pub use views::{ensure_can_access, ServiceDetailsViewManager};
pub use workflow::{receive_task_activity_id, WorkflowEngine};
