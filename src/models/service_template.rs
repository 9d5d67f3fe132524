//! # Service Template Model
//!
//! Catalog templates a service deployment is ordered against: flavors and
//! their relative priority, deployment variables, deployer kind, and the
//! optional configuration-management definition.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Cloud service provider a template targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Csp {
    Aws,
    Azure,
    GoogleCloud,
    Openstack,
}

impl fmt::Display for Csp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Aws => "aws",
            Self::Azure => "azure",
            Self::GoogleCloud => "google_cloud",
            Self::Openstack => "openstack",
        };
        write!(f, "{s}")
    }
}

/// Infrastructure-as-Code engine a template is deployed with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeployerKind {
    Terraform,
    OpenTofu,
}

impl fmt::Display for DeployerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Terraform => "terraform",
            Self::OpenTofu => "open_tofu",
        };
        write!(f, "{s}")
    }
}

/// A sizing option for the service. Lower `priority` means a larger or
/// preferred flavor; moving to a higher value is a downgrade.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceFlavor {
    pub name: String,
    pub priority: i32,
    pub properties: HashMap<String, String>,
}

/// One deployment variable declared by the template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeployVariable {
    pub name: String,
    pub mandatory: bool,
    pub sensitive: bool,
}

/// A script an execution agent runs against one resource group when a
/// change request is claimed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceChangeScript {
    /// Resource group this script handles.
    pub change_handler: String,
    /// Run once for the whole group rather than once per resource.
    pub run_only_once: bool,
}

/// Configuration-management definition of a template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigurationManage {
    pub change_scripts: Vec<ServiceChangeScript>,
    pub default_properties: HashMap<String, serde_json::Value>,
}

/// One entry of the service catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceTemplate {
    pub template_id: Uuid,
    pub name: String,
    pub version: String,
    pub csp: Csp,
    pub deployer_kind: DeployerKind,
    pub flavors: Vec<ServiceFlavor>,
    /// Whether a modify order may move to a lower-priority flavor.
    pub is_downgrade_allowed: bool,
    pub deploy_variables: Vec<DeployVariable>,
    pub configuration_manage: Option<ConfigurationManage>,
}

impl ServiceTemplate {
    pub fn flavor(&self, name: &str) -> Option<&ServiceFlavor> {
        self.flavors.iter().find(|f| f.name == name)
    }

    /// Names of variables that must never be persisted or displayed in
    /// clear text.
    pub fn sensitive_variable_names(&self) -> Vec<&str> {
        self.deploy_variables
            .iter()
            .filter(|v| v.sensitive)
            .map(|v| v.name.as_str())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn template_with_flavors() -> ServiceTemplate {
        ServiceTemplate {
            template_id: Uuid::new_v4(),
            name: "mysql".into(),
            version: "1.0.0".into(),
            csp: Csp::Openstack,
            deployer_kind: DeployerKind::Terraform,
            flavors: vec![
                ServiceFlavor {
                    name: "large".into(),
                    priority: 1,
                    properties: HashMap::new(),
                },
                ServiceFlavor {
                    name: "small".into(),
                    priority: 3,
                    properties: HashMap::new(),
                },
            ],
            is_downgrade_allowed: false,
            deploy_variables: vec![
                DeployVariable {
                    name: "admin_password".into(),
                    mandatory: true,
                    sensitive: true,
                },
                DeployVariable {
                    name: "port".into(),
                    mandatory: false,
                    sensitive: false,
                },
            ],
            configuration_manage: None,
        }
    }

    #[test]
    fn flavor_lookup_by_name() {
        let template = template_with_flavors();
        assert_eq!(template.flavor("large").unwrap().priority, 1);
        assert!(template.flavor("missing").is_none());
    }

    #[test]
    fn sensitive_variables_are_filtered() {
        let template = template_with_flavors();
        assert_eq!(template.sensitive_variable_names(), vec!["admin_password"]);
    }
}
