//! Container runtime adapter contract

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::errors::EngineError;
use crate::ids::{DeploymentId, EnvironmentId};

/// Everything the runtime needs to bring one stack up
#[derive(Debug, Clone)]
pub struct StackDeployRequest {
    pub deployment_id: DeploymentId,
    pub environment_id: EnvironmentId,
    pub stack_id: String,
    pub stack_name: String,
    pub project_name: String,
    pub version: String,
    pub variables: BTreeMap<String, String>,
}

/// What the runtime reports back for one container
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceRuntimeInfo {
    pub service_name: String,
    pub image: Option<String>,
    pub container_id: String,
    pub container_name: String,
    pub status: String,
}

/// Container runtime (e.g. a Docker engine) for one environment
#[async_trait]
pub trait StackRuntime: Send + Sync {
    async fn deploy_stack(
        &self,
        request: &StackDeployRequest,
    ) -> Result<Vec<ServiceRuntimeInfo>, EngineError>;

    async fn remove_stack(
        &self,
        environment_id: EnvironmentId,
        project_name: &str,
    ) -> Result<(), EngineError>;
}
