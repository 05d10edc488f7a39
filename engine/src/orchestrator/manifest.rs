//! Product manifest file format

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::domain::StackDeploymentConfig;
use crate::errors::EngineError;
use crate::ids::{EnvironmentId, UserId};
use crate::orchestrator::product::ProductDeployRequest;

/// A product as described on disk
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductManifest {
    pub product_group_id: String,
    pub product_id: String,
    pub product_name: String,
    #[serde(default)]
    pub product_display_name: String,
    pub product_version: String,
    /// Stacks in install order
    pub stacks: Vec<StackDeploymentConfig>,
    #[serde(default)]
    pub shared_variables: BTreeMap<String, String>,
    #[serde(default)]
    pub continue_on_error: Option<bool>,
}

impl ProductManifest {
    pub async fn load(path: &Path) -> Result<Self, EngineError> {
        let raw = tokio::fs::read_to_string(path).await?;
        Ok(serde_json::from_str(&raw)?)
    }

    pub fn into_request(self, environment_id: EnvironmentId, deployed_by: UserId) -> ProductDeployRequest {
        ProductDeployRequest {
            environment_id,
            product_group_id: self.product_group_id,
            product_id: self.product_id,
            product_name: self.product_name,
            product_display_name: self.product_display_name,
            product_version: self.product_version,
            deployed_by,
            stacks: self.stacks,
            shared_variables: self.shared_variables,
            continue_on_error: self.continue_on_error,
        }
    }
}
