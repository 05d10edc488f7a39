//! In-memory deployment repositories

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use crate::domain::{Deployment, ProductDeployment};
use crate::errors::EngineError;
use crate::ids::{DeploymentId, EnvironmentId, ProductDeploymentId};
use crate::ports::{DeploymentRepository, ProductDeploymentRepository};

/// Deployment repository backed by a map
#[derive(Default)]
pub struct InMemoryDeploymentRepository {
    entries: RwLock<HashMap<DeploymentId, Deployment>>,
}

impl InMemoryDeploymentRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Snapshot of every stored deployment
    pub async fn all(&self) -> Vec<Deployment> {
        self.entries.read().await.values().cloned().collect()
    }
}

#[async_trait]
impl DeploymentRepository for InMemoryDeploymentRepository {
    async fn get(&self, id: DeploymentId) -> Result<Option<Deployment>, EngineError> {
        Ok(self.entries.read().await.get(&id).cloned())
    }

    async fn add(&self, deployment: &Deployment) -> Result<(), EngineError> {
        let mut entries = self.entries.write().await;
        if entries.contains_key(&deployment.id()) {
            return Err(EngineError::Internal(format!(
                "deployment {} already exists",
                deployment.id()
            )));
        }
        debug!("Adding deployment {} ({})", deployment.id(), deployment.stack_name());
        entries.insert(deployment.id(), deployment.clone());
        Ok(())
    }

    async fn update(&self, deployment: &Deployment) -> Result<(), EngineError> {
        let mut entries = self.entries.write().await;
        match entries.get_mut(&deployment.id()) {
            Some(existing) => {
                *existing = deployment.clone();
                Ok(())
            }
            None => Err(EngineError::NotFound(format!("deployment {}", deployment.id()))),
        }
    }

    async fn get_by_stack_name(
        &self,
        environment_id: EnvironmentId,
        stack_name: &str,
    ) -> Result<Option<Deployment>, EngineError> {
        let entries = self.entries.read().await;
        Ok(entries
            .values()
            .filter(|d| {
                d.environment_id() == environment_id
                    && !d.is_terminal()
                    && d.stack_name().eq_ignore_ascii_case(stack_name)
            })
            .max_by_key(|d| d.created_at())
            .cloned())
    }
}

/// Product deployment repository backed by a map
#[derive(Default)]
pub struct InMemoryProductDeploymentRepository {
    entries: RwLock<HashMap<ProductDeploymentId, ProductDeployment>>,
}

impl InMemoryProductDeploymentRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl ProductDeploymentRepository for InMemoryProductDeploymentRepository {
    async fn get(&self, id: ProductDeploymentId) -> Result<Option<ProductDeployment>, EngineError> {
        Ok(self.entries.read().await.get(&id).cloned())
    }

    async fn add(&self, product: &ProductDeployment) -> Result<(), EngineError> {
        let mut entries = self.entries.write().await;
        if entries.contains_key(&product.id()) {
            return Err(EngineError::Internal(format!(
                "product deployment {} already exists",
                product.id()
            )));
        }
        debug!("Adding product deployment {} ({})", product.id(), product.product_name());
        entries.insert(product.id(), product.clone());
        Ok(())
    }

    async fn update(&self, product: &ProductDeployment) -> Result<(), EngineError> {
        let mut entries = self.entries.write().await;
        match entries.get_mut(&product.id()) {
            Some(existing) => {
                *existing = product.clone();
                Ok(())
            }
            None => Err(EngineError::NotFound(format!(
                "product deployment {}",
                product.id()
            ))),
        }
    }

    async fn get_active_for_product(
        &self,
        environment_id: EnvironmentId,
        product_group_id: &str,
    ) -> Result<Option<ProductDeployment>, EngineError> {
        let entries = self.entries.read().await;
        Ok(entries
            .values()
            .filter(|p| {
                p.environment_id() == environment_id
                    && !p.is_terminal()
                    && p.product_group_id() == product_group_id
            })
            .max_by_key(|p| (p.created_at(), p.upgrade_count()))
            .cloned())
    }
}
