//! Masking of sensitive deployment variables.

use std::collections::HashMap;

use tracing::debug;

use crate::models::{ServiceDeployment, ServiceTemplate};

/// Replaces values of template variables flagged sensitive before a
/// service record is persisted or displayed.
#[derive(Debug, Clone)]
pub struct SensitiveDataMasker {
    placeholder: String,
}

impl SensitiveDataMasker {
    pub fn new(placeholder: impl Into<String>) -> Self {
        Self {
            placeholder: placeholder.into(),
        }
    }

    /// Mask the sensitive input properties of a service record in place.
    pub fn mask_sensitive_fields(&self, entity: &mut ServiceDeployment, template: &ServiceTemplate) {
        let sensitive = template.sensitive_variable_names();
        if sensitive.is_empty() {
            return;
        }
        let masked = self.mask_properties(&entity.input_properties, &sensitive);
        entity.input_properties = masked;
        entity.deploy_request.service_request_properties = self.mask_properties(
            &entity.deploy_request.service_request_properties,
            &sensitive,
        );
    }

    fn mask_properties(
        &self,
        properties: &HashMap<String, serde_json::Value>,
        sensitive: &[&str],
    ) -> HashMap<String, serde_json::Value> {
        properties
            .iter()
            .map(|(name, value)| {
                if sensitive.contains(&name.as_str()) {
                    debug!(variable = %name, "Masking sensitive variable");
                    (
                        name.clone(),
                        serde_json::Value::String(self.placeholder.clone()),
                    )
                } else {
                    (name.clone(), value.clone())
                }
            })
            .collect()
    }
}

impl Default for SensitiveDataMasker {
    fn default() -> Self {
        Self::new("**********")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Csp, DeployRequest, DeployVariable, DeployerKind};
    use uuid::Uuid;

    fn template_with_sensitive_var() -> ServiceTemplate {
        ServiceTemplate {
            template_id: Uuid::new_v4(),
            name: "db".into(),
            version: "1.0".into(),
            csp: Csp::Aws,
            deployer_kind: DeployerKind::Terraform,
            flavors: Vec::new(),
            is_downgrade_allowed: true,
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
    fn masks_only_sensitive_properties() {
        let template = template_with_sensitive_var();
        let mut request = DeployRequest::default();
        request
            .service_request_properties
            .insert("admin_password".into(), serde_json::json!("hunter2"));
        request
            .service_request_properties
            .insert("port".into(), serde_json::json!(3306));
        let mut entity =
            ServiceDeployment::new(Uuid::new_v4(), template.template_id, Csp::Aws, request);

        SensitiveDataMasker::default().mask_sensitive_fields(&mut entity, &template);

        assert_eq!(
            entity.input_properties["admin_password"],
            serde_json::json!("**********")
        );
        assert_eq!(entity.input_properties["port"], serde_json::json!(3306));
        assert_eq!(
            entity.deploy_request.service_request_properties["admin_password"],
            serde_json::json!("**********")
        );
    }
}
