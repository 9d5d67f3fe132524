//! Normalized infrastructure resources tracked per service deployment.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Kind of a provisioned infrastructure resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    Vm,
    Container,
    PublicIp,
    Vpc,
    Subnet,
    SecurityGroup,
    SecurityGroupRule,
    Volume,
    Keypair,
    Unknown,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Vm => "vm",
            Self::Container => "container",
            Self::PublicIp => "public_ip",
            Self::Vpc => "vpc",
            Self::Subnet => "subnet",
            Self::SecurityGroup => "security_group",
            Self::SecurityGroupRule => "security_group_rule",
            Self::Volume => "volume",
            Self::Keypair => "keypair",
            Self::Unknown => "unknown",
        };
        write!(f, "{s}")
    }
}

/// One resource produced by the deployer, after handler normalization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceResource {
    /// Provider-assigned resource identifier.
    pub resource_id: String,
    pub resource_name: String,
    pub resource_kind: ResourceKind,
    /// Resource group the template assigned this resource to; change
    /// requests are routed by this name.
    pub group_name: String,
    pub group_type: String,
    pub properties: HashMap<String, String>,
}
