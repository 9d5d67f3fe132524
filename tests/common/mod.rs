//! Shared builders and mock collaborators for integration tests.
#![allow(dead_code)] // Not every test target uses every helper

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use uuid::Uuid;

use provisor_core::config::ProvisorConfig;
use provisor_core::deployment::{
    AcceptAllPolicyValidator, DeployOrchestrator, DeployResult, DeployResultReconciler,
    DeployTask, Deployer, DeployerRegistry, DeployerTaskStatus, PolicyValidator,
    ResourceHandler, ResourceHandlerRegistry, SensitiveDataMasker, ServiceChangeManager,
    ServiceOrderManager, ServiceStateManager, StaleOrderReFetcher, WorkflowEngine,
    STATE_FILE_KEY,
};
use provisor_core::deployment::views::ServiceDetailsViewManager;
use provisor_core::error::{ProvisorError, Result};
use provisor_core::models::{
    ConfigurationManage, Csp, DeployRequest, DeployVariable, DeployerKind, ResourceKind,
    ServiceChangeScript, ServiceDeployment, ServiceFlavor, ServiceOrderType, ServiceResource,
    ServiceTemplate,
};
use provisor_core::polling::ServiceStatusPoller;
use provisor_core::storage::memory::{
    InMemoryChangeStore, InMemoryDeploymentStore, InMemoryOrderStore, InMemoryTemplateStore,
};
use provisor_core::storage::ServiceTemplateStore;

/// One scripted deployer invocation outcome.
#[derive(Debug, Clone)]
pub enum ScriptedOutcome {
    /// Deployer returns a successful result.
    Success {
        resources: Vec<ServiceResource>,
        outputs: HashMap<String, String>,
        state_file: Option<String>,
    },
    /// Deployer returns a failed result (the engine ran and reported
    /// failure in-band).
    Failure {
        message: String,
        state_file: Option<String>,
    },
    /// Deployer invocation itself errors out.
    Error { message: String },
}

impl ScriptedOutcome {
    pub fn success_with(resources: Vec<ServiceResource>, state_file: &str) -> Self {
        Self::Success {
            resources,
            outputs: HashMap::new(),
            state_file: Some(state_file.to_string()),
        }
    }

    fn into_result(self, task: &DeployTask) -> Result<DeployResult> {
        match self {
            Self::Success {
                resources,
                outputs,
                state_file,
            } => {
                let mut result = DeployResult::successful(task.order_id, task.service_id);
                result.state = Some(deployer_state(task.task_type, true));
                result.resources = resources;
                result.output_properties = outputs;
                if let Some(content) = state_file {
                    result
                        .generated_files
                        .insert(STATE_FILE_KEY.to_string(), content);
                }
                Ok(result)
            }
            Self::Failure {
                message,
                state_file,
            } => {
                let mut result = DeployResult::failed(task, &message);
                result.state = Some(deployer_state(task.task_type, false));
                if let Some(content) = state_file {
                    result
                        .generated_files
                        .insert(STATE_FILE_KEY.to_string(), content);
                }
                Ok(result)
            }
            Self::Error { message } => Err(ProvisorError::DeploymentFailed {
                order_id: task.order_id,
                service_id: task.service_id,
                task_type: task.task_type.to_string(),
                message,
            }),
        }
    }
}

/// Scripted deployer that records every invocation.
pub struct MockDeployer {
    kind: DeployerKind,
    deploy_script: Mutex<VecDeque<ScriptedOutcome>>,
    modify_script: Mutex<VecDeque<ScriptedOutcome>>,
    destroy_script: Mutex<VecDeque<ScriptedOutcome>>,
    retrievable_results: Mutex<HashMap<Uuid, DeployResult>>,
    pub invocations: Mutex<Vec<(ServiceOrderType, Uuid)>>,
    pub cleared_workspaces: Mutex<Vec<Uuid>>,
}

impl MockDeployer {
    pub fn new(kind: DeployerKind) -> Self {
        Self {
            kind,
            deploy_script: Mutex::new(VecDeque::new()),
            modify_script: Mutex::new(VecDeque::new()),
            destroy_script: Mutex::new(VecDeque::new()),
            retrievable_results: Mutex::new(HashMap::new()),
            invocations: Mutex::new(Vec::new()),
            cleared_workspaces: Mutex::new(Vec::new()),
        }
    }

    pub fn script_deploy(&self, outcome: ScriptedOutcome) {
        self.deploy_script.lock().push_back(outcome);
    }

    pub fn script_modify(&self, outcome: ScriptedOutcome) {
        self.modify_script.lock().push_back(outcome);
    }

    pub fn script_destroy(&self, outcome: ScriptedOutcome) {
        self.destroy_script.lock().push_back(outcome);
    }

    pub fn stash_retrievable_result(&self, order_id: Uuid, result: DeployResult) {
        self.retrievable_results.lock().insert(order_id, result);
    }

    pub fn invocation_count(&self) -> usize {
        self.invocations.lock().len()
    }

    pub fn destroy_count(&self) -> usize {
        self.invocations
            .lock()
            .iter()
            .filter(|(t, _)| {
                matches!(
                    t,
                    ServiceOrderType::Destroy
                        | ServiceOrderType::Rollback
                        | ServiceOrderType::Purge
                )
            })
            .count()
    }

    fn next(&self, script: &Mutex<VecDeque<ScriptedOutcome>>, task: &DeployTask) -> Result<DeployResult> {
        self.invocations
            .lock()
            .push((task.task_type, task.order_id));
        let outcome = script.lock().pop_front().unwrap_or(ScriptedOutcome::Success {
            resources: Vec::new(),
            outputs: HashMap::new(),
            state_file: None,
        });
        outcome.into_result(task)
    }
}

#[async_trait]
impl Deployer for MockDeployer {
    fn kind(&self) -> DeployerKind {
        self.kind
    }

    async fn deploy(&self, task: &DeployTask) -> Result<DeployResult> {
        self.next(&self.deploy_script, task)
    }

    async fn modify(&self, task: &DeployTask) -> Result<DeployResult> {
        self.next(&self.modify_script, task)
    }

    async fn destroy(&self, task: &DeployTask) -> Result<DeployResult> {
        self.next(&self.destroy_script, task)
    }

    async fn get_deployment_plan_as_json(&self, _task: &DeployTask) -> Result<String> {
        Ok("{\"planned_changes\":[]}".to_string())
    }

    async fn delete_task_workspace(&self, service_id: Uuid) -> Result<()> {
        self.cleared_workspaces.lock().push(service_id);
        Ok(())
    }

    async fn retrieve_result(&self, order_id: Uuid) -> Result<Option<DeployResult>> {
        Ok(self.retrievable_results.lock().get(&order_id).cloned())
    }
}

/// Resource handler that injects configured resources when a state blob
/// is normalized.
#[derive(Default)]
pub struct StubResourceHandler {
    inject: Mutex<Option<Vec<ServiceResource>>>,
    pub handled: Mutex<usize>,
}

impl StubResourceHandler {
    pub fn inject_resources(&self, resources: Vec<ServiceResource>) {
        *self.inject.lock() = Some(resources);
    }
}

#[async_trait]
impl ResourceHandler for StubResourceHandler {
    async fn handle(&self, result: &mut DeployResult) -> Result<()> {
        *self.handled.lock() += 1;
        if let Some(resources) = self.inject.lock().clone() {
            result.resources = resources;
        }
        Ok(())
    }
}

/// Workflow engine recording every signaled activity.
#[derive(Default)]
pub struct RecordingWorkflowEngine {
    pub completed: Mutex<Vec<(String, String)>>,
}

#[async_trait]
impl WorkflowEngine for RecordingWorkflowEngine {
    async fn complete_receive_task(
        &self,
        process_instance_id: &str,
        activity_id: &str,
    ) -> Result<()> {
        self.completed
            .lock()
            .push((process_instance_id.to_string(), activity_id.to_string()));
        Ok(())
    }
}

/// Policy validator rejecting everything, for validation-path tests.
pub struct RejectingPolicyValidator;

#[async_trait]
impl PolicyValidator for RejectingPolicyValidator {
    async fn validate(&self, _task: &DeployTask) -> Result<()> {
        Err(ProvisorError::PolicyViolation(
            "flavor not allowed by policy".to_string(),
        ))
    }
}

fn deployer_state(task_type: ServiceOrderType, ok: bool) -> DeployerTaskStatus {
    match task_type {
        ServiceOrderType::Modify => {
            if ok {
                DeployerTaskStatus::ModificationSuccessful
            } else {
                DeployerTaskStatus::ModificationFailed
            }
        }
        ServiceOrderType::Destroy | ServiceOrderType::Purge => {
            if ok {
                DeployerTaskStatus::DestroySuccess
            } else {
                DeployerTaskStatus::DestroyFailed
            }
        }
        ServiceOrderType::Rollback => {
            if ok {
                DeployerTaskStatus::RollbackSuccess
            } else {
                DeployerTaskStatus::RollbackFailed
            }
        }
        _ => {
            if ok {
                DeployerTaskStatus::DeploySuccess
            } else {
                DeployerTaskStatus::DeployFailed
            }
        }
    }
}

pub fn resource(name: &str, group: &str) -> ServiceResource {
    ServiceResource {
        resource_id: format!("id-{name}"),
        resource_name: name.to_string(),
        resource_kind: ResourceKind::Vm,
        group_name: group.to_string(),
        group_type: "vm".to_string(),
        properties: HashMap::from([("ip".to_string(), "10.0.0.1".to_string())]),
    }
}

pub fn default_template() -> ServiceTemplate {
    ServiceTemplate {
        template_id: Uuid::new_v4(),
        name: "mysql".to_string(),
        version: "1.0.0".to_string(),
        csp: Csp::Openstack,
        deployer_kind: DeployerKind::Terraform,
        flavors: vec![
            ServiceFlavor {
                name: "large".to_string(),
                priority: 1,
                properties: HashMap::new(),
            },
            ServiceFlavor {
                name: "small".to_string(),
                priority: 3,
                properties: HashMap::new(),
            },
        ],
        is_downgrade_allowed: false,
        deploy_variables: vec![DeployVariable {
            name: "admin_password".to_string(),
            mandatory: true,
            sensitive: true,
        }],
        configuration_manage: Some(ConfigurationManage {
            change_scripts: vec![
                ServiceChangeScript {
                    change_handler: "app".to_string(),
                    run_only_once: false,
                },
                ServiceChangeScript {
                    change_handler: "db".to_string(),
                    run_only_once: true,
                },
            ],
            default_properties: HashMap::from([(
                "max_connections".to_string(),
                serde_json::json!(100),
            )]),
        }),
    }
}

pub fn deploy_request(flavor: &str) -> DeployRequest {
    DeployRequest {
        customer_service_name: "my-mysql".to_string(),
        flavor: flavor.to_string(),
        region: "eu-central-1".to_string(),
        availability_zones: HashMap::new(),
        service_request_properties: HashMap::from([(
            "admin_password".to_string(),
            serde_json::json!("hunter2"),
        )]),
    }
}

/// Fully wired orchestration core over in-memory stores.
pub struct TestHarness {
    pub deployment_store: Arc<InMemoryDeploymentStore>,
    pub order_store: Arc<InMemoryOrderStore>,
    pub template_store: Arc<InMemoryTemplateStore>,
    pub change_store: Arc<InMemoryChangeStore>,
    pub order_manager: Arc<ServiceOrderManager>,
    pub deployer: Arc<MockDeployer>,
    pub resource_handler: Arc<StubResourceHandler>,
    pub workflow: Arc<RecordingWorkflowEngine>,
    pub reconciler: Arc<DeployResultReconciler>,
    pub orchestrator: Arc<DeployOrchestrator>,
    pub change_manager: ServiceChangeManager,
    pub state_manager: ServiceStateManager,
    pub refetcher: Arc<StaleOrderReFetcher>,
    pub views: ServiceDetailsViewManager,
    pub poller: ServiceStatusPoller,
    pub template: ServiceTemplate,
    pub config: ProvisorConfig,
}

impl TestHarness {
    pub async fn new() -> Self {
        Self::with_config(test_config()).await
    }

    pub async fn with_config(config: ProvisorConfig) -> Self {
        let deployment_store = Arc::new(InMemoryDeploymentStore::new());
        let order_store = Arc::new(InMemoryOrderStore::new());
        let template_store = Arc::new(InMemoryTemplateStore::new());
        let change_store = Arc::new(InMemoryChangeStore::new());

        let template = default_template();
        template_store.store(template.clone()).await.unwrap();

        let deployer = Arc::new(MockDeployer::new(DeployerKind::Terraform));
        let deployer_registry = Arc::new(DeployerRegistry::new());
        deployer_registry.register(deployer.clone());

        let resource_handler = Arc::new(StubResourceHandler::default());
        let handler_registry = Arc::new(ResourceHandlerRegistry::new());
        handler_registry.register(
            template.csp,
            template.deployer_kind,
            resource_handler.clone(),
        );

        let workflow = Arc::new(RecordingWorkflowEngine::default());
        let order_manager = Arc::new(ServiceOrderManager::new(order_store.clone()));
        let masker = SensitiveDataMasker::new(config.sensitive_value_placeholder.clone());

        let reconciler = Arc::new(DeployResultReconciler::new(
            deployment_store.clone(),
            order_store.clone(),
            template_store.clone(),
            change_store.clone(),
            order_manager.clone(),
            deployer_registry.clone(),
            handler_registry,
            workflow.clone(),
            masker,
        ));
        let orchestrator = Arc::new(DeployOrchestrator::new(
            deployment_store.clone(),
            order_manager.clone(),
            deployer_registry.clone(),
            Arc::new(AcceptAllPolicyValidator),
            reconciler.clone(),
            config.max_concurrent_orders,
        ));
        let change_manager = ServiceChangeManager::new(
            change_store.clone(),
            order_store.clone(),
            deployment_store.clone(),
            order_manager.clone(),
        );
        let state_manager = ServiceStateManager::new(deployment_store.clone());
        let refetcher = Arc::new(StaleOrderReFetcher::new(
            order_store.clone(),
            template_store.clone(),
            deployer_registry.clone(),
            reconciler.clone(),
            &config,
        ));
        let views =
            ServiceDetailsViewManager::new(deployment_store.clone(), refetcher.clone());
        let poller =
            ServiceStatusPoller::new(deployment_store.clone(), order_store.clone(), &config);

        Self {
            deployment_store,
            order_store,
            template_store,
            change_store,
            order_manager,
            deployer,
            resource_handler,
            workflow,
            reconciler,
            orchestrator,
            change_manager,
            state_manager,
            refetcher,
            views,
            poller,
            template,
            config,
        }
    }

    /// An orchestrator sharing this harness's state but using the given
    /// policy validator.
    pub fn orchestrator_with_policy(
        &self,
        validator: Arc<dyn PolicyValidator>,
    ) -> DeployOrchestrator {
        let deployer_registry = Arc::new(DeployerRegistry::new());
        deployer_registry.register(self.deployer.clone());
        DeployOrchestrator::new(
            self.deployment_store.clone(),
            self.order_manager.clone(),
            deployer_registry,
            validator,
            self.reconciler.clone(),
            self.config.max_concurrent_orders,
        )
    }

    pub fn deploy_task(&self) -> DeployTask {
        DeployTask::new(
            Uuid::new_v4(),
            ServiceOrderType::Deploy,
            deploy_request("large"),
            self.template.clone(),
        )
    }

    pub fn task_for(&self, service_id: Uuid, task_type: ServiceOrderType) -> DeployTask {
        DeployTask::new(
            service_id,
            task_type,
            deploy_request("large"),
            self.template.clone(),
        )
    }

    /// Deploy a service successfully with the given resources.
    pub async fn deployed_service(
        &self,
        resources: Vec<ServiceResource>,
    ) -> ServiceDeployment {
        self.deployer.script_deploy(ScriptedOutcome::Success {
            resources,
            outputs: HashMap::from([("endpoint".to_string(), "10.0.0.1:3306".to_string())]),
            state_file: Some("{\"serial\":1}".to_string()),
        });
        self.orchestrator
            .deploy(self.deploy_task())
            .await
            .expect("test deployment should succeed")
    }
}

pub fn test_config() -> ProvisorConfig {
    ProvisorConfig {
        poll_interval_ms: 10,
        long_poll_timeout_secs: 2,
        ..ProvisorConfig::default()
    }
}
