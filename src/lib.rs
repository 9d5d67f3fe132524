#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # Provisor Core
//!
//! Rust core for service-catalog orchestration: accepts lifecycle orders
//! against catalog templates, delegates provisioning to pluggable
//! Infrastructure-as-Code deployers, and reconciles their asynchronous
//! results into durable service and order state.
//!
//! ## Architecture
//!
//! The crate is the state-machine heart of a larger system. The REST
//! surface, the Terraform/OpenTofu wire clients, and the persistence
//! technology all live behind trait seams:
//!
//! - [`deployment`] - orchestrator, result reconciler, rollback, change
//!   requests, registries, and the deployer/workflow/policy seams
//! - [`models`] - service deployment, order, template, and change-request
//!   entities with their state enums
//! - [`storage`] - store traits plus an in-memory reference backend
//! - [`polling`] - long-poll primitives over the stores
//! - [`config`] - environment-driven runtime configuration
//! - [`error`] - structured error handling
//! - [`logging`] - structured logging bootstrap
//! - [`context`] - explicit correlation-id propagation
//!
//! ## Consistency Model
//!
//! All mutation of a service record and its orders funnels through the
//! [`deployment::DeployResultReconciler`]; reconciliations for the same
//! service are serialized, orders for different services run in
//! parallel. An order reaches a terminal status exactly once, and a
//! failed deploy always leaves the service in an inspectable terminal
//! state, with the stale-order re-fetcher as the backstop for lost
//! deployer callbacks.

pub mod config;
pub mod context;
pub mod deployment;
pub mod error;
pub mod logging;
pub mod models;
pub mod polling;
pub mod storage;

pub use config::ProvisorConfig;
pub use context::OrderContext;
pub use deployment::{
    DeployOrchestrator, DeployResult, DeployResultReconciler, DeployTask, Deployer,
    DeployerRegistry, ResourceHandler, ResourceHandlerRegistry, ServiceChangeManager,
    ServiceOrderManager, ServiceStateManager, StaleOrderReFetcher, WorkflowEngine,
};
pub use error::{ProvisorError, Result};
pub use models::{
    OrderStatus, ServiceDeployment, ServiceDeploymentState, ServiceOrder, ServiceOrderType,
    ServiceState, ServiceTemplate,
};
pub use polling::ServiceStatusPoller;
