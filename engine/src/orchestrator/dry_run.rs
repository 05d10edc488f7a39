//! Runtime that pretends every stack came up

use std::collections::BTreeMap;
use std::sync::RwLock;

use async_trait::async_trait;
use tracing::info;

use crate::domain::service::STATUS_RUNNING;
use crate::errors::EngineError;
use crate::ids::EnvironmentId;
use crate::ports::{ServiceRuntimeInfo, StackDeployRequest, StackRuntime};

/// `StackRuntime` that reports services as running without touching a
/// container engine
#[derive(Default)]
pub struct DryRunRuntime {
    /// Service names per stack id; stacks without an entry get one service
    /// named after the stack
    services: RwLock<BTreeMap<String, Vec<String>>>,
}

impl DryRunRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_services(self, stack_id: impl Into<String>, services: Vec<String>) -> Self {
        self.services
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(stack_id.into(), services);
        self
    }
}

#[async_trait]
impl StackRuntime for DryRunRuntime {
    async fn deploy_stack(
        &self,
        request: &StackDeployRequest,
    ) -> Result<Vec<ServiceRuntimeInfo>, EngineError> {
        let names = self
            .services
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(&request.stack_id)
            .cloned()
            .unwrap_or_else(|| vec![request.stack_name.clone()]);

        info!(
            "[dry-run] deploying {} ({} services, {} variables)",
            request.project_name,
            names.len(),
            request.variables.len()
        );

        Ok(names
            .into_iter()
            .enumerate()
            .map(|(i, name)| ServiceRuntimeInfo {
                container_id: format!("dry-{}-{}", request.deployment_id, i),
                container_name: format!("{}-{}-1", request.project_name, name),
                service_name: name,
                image: None,
                status: STATUS_RUNNING.to_string(),
            })
            .collect())
    }

    async fn remove_stack(
        &self,
        _environment_id: EnvironmentId,
        project_name: &str,
    ) -> Result<(), EngineError> {
        info!("[dry-run] removing {}", project_name);
        Ok(())
    }
}
