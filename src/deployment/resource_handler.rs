//! Provider-specific result post-processing.

use async_trait::async_trait;

use crate::error::Result;

use super::deploy_result::DeployResult;

/// Turns raw infrastructure state (e.g. a Terraform state blob) into the
/// normalized resource list and output properties, in place.
///
/// Keyed by `(Csp, DeployerKind)` in the
/// [`ResourceHandlerRegistry`](super::registry::ResourceHandlerRegistry):
/// each cloud provider reads a given engine's state format differently.
#[async_trait]
pub trait ResourceHandler: Send + Sync {
    async fn handle(&self, result: &mut DeployResult) -> Result<()>;
}
