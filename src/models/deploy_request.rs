//! The user-facing deployment request payload.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Parameters a deploy or modify order was requested with. Snapshotted
/// onto orders for audit and rollback comparison.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeployRequest {
    pub customer_service_name: String,
    pub flavor: String,
    pub region: String,
    pub availability_zones: HashMap<String, String>,
    pub service_request_properties: HashMap<String, serde_json::Value>,
}
