//! Repository contracts

use async_trait::async_trait;

use crate::domain::{Deployment, ProductDeployment};
use crate::errors::EngineError;
use crate::ids::{DeploymentId, EnvironmentId, ProductDeploymentId};

/// Storage for single-stack deployments
#[async_trait]
pub trait DeploymentRepository: Send + Sync {
    async fn get(&self, id: DeploymentId) -> Result<Option<Deployment>, EngineError>;

    async fn add(&self, deployment: &Deployment) -> Result<(), EngineError>;

    async fn update(&self, deployment: &Deployment) -> Result<(), EngineError>;

    fn next_identity(&self) -> DeploymentId {
        DeploymentId::new()
    }

    /// Latest non-removed deployment of a stack in an environment
    async fn get_by_stack_name(
        &self,
        environment_id: EnvironmentId,
        stack_name: &str,
    ) -> Result<Option<Deployment>, EngineError>;
}

/// Storage for product deployments
#[async_trait]
pub trait ProductDeploymentRepository: Send + Sync {
    async fn get(&self, id: ProductDeploymentId) -> Result<Option<ProductDeployment>, EngineError>;

    async fn add(&self, product: &ProductDeployment) -> Result<(), EngineError>;

    async fn update(&self, product: &ProductDeployment) -> Result<(), EngineError>;

    fn next_identity(&self) -> ProductDeploymentId {
        ProductDeploymentId::new()
    }

    /// Most recent non-removed deployment of a product group in an environment
    async fn get_active_for_product(
        &self,
        environment_id: EnvironmentId,
        product_group_id: &str,
    ) -> Result<Option<ProductDeployment>, EngineError>;
}
