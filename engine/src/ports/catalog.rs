//! Product/stack catalog contract

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Presentation data for one catalog stack
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StackDefinition {
    /// Composite id, e.g. "source:product:stack"
    pub stack_id: String,
    pub stack_name: String,
    #[serde(default)]
    pub stack_display_name: String,
    pub product_name: String,
    pub product_display_name: String,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub services: Vec<String>,
}

#[async_trait]
pub trait StackCatalog: Send + Sync {
    async fn get_stack(&self, composite_stack_id: &str) -> Option<StackDefinition>;
}
