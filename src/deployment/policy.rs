//! Policy validation seam.

use async_trait::async_trait;

use crate::error::Result;

use super::deploy_task::DeployTask;

/// Black-box policy engine consulted before every deploy/modify dispatch.
///
/// A violation aborts the request before any order is created.
#[async_trait]
pub trait PolicyValidator: Send + Sync {
    async fn validate(&self, task: &DeployTask) -> Result<()>;
}

/// Validator that accepts every task; the default when no policy engine
/// is wired in.
#[derive(Debug, Default)]
pub struct AcceptAllPolicyValidator;

#[async_trait]
impl PolicyValidator for AcceptAllPolicyValidator {
    async fn validate(&self, _task: &DeployTask) -> Result<()> {
        Ok(())
    }
}
