//! Per-stack entries of a product deployment

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::{require_non_empty, DomainError};
use crate::ids::DeploymentId;

/// Status of one stack within a product
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StackDeploymentStatus {
    Pending,
    Deploying,
    Running,
    Failed,
    Removed,
}

impl StackDeploymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            StackDeploymentStatus::Pending => "pending",
            StackDeploymentStatus::Deploying => "deploying",
            StackDeploymentStatus::Running => "running",
            StackDeploymentStatus::Failed => "failed",
            StackDeploymentStatus::Removed => "removed",
        }
    }
}

impl std::fmt::Display for StackDeploymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Catalog input describing one stack of a product
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StackDeploymentConfig {
    /// Composite catalog id, e.g. "source:product:stack"
    pub stack_id: String,

    pub stack_name: String,

    #[serde(default)]
    pub stack_display_name: String,

    #[serde(default)]
    pub service_count: u32,

    #[serde(default)]
    pub variables: BTreeMap<String, String>,
}

impl StackDeploymentConfig {
    pub fn new(stack_id: impl Into<String>, stack_name: impl Into<String>) -> Self {
        let stack_name = stack_name.into();
        Self {
            stack_id: stack_id.into(),
            stack_display_name: stack_name.clone(),
            stack_name,
            service_count: 0,
            variables: BTreeMap::new(),
        }
    }

    pub(crate) fn validate(&self) -> Result<(), DomainError> {
        require_non_empty(&self.stack_id, "stack id")?;
        require_non_empty(&self.stack_name, "stack name")?;
        Ok(())
    }
}

/// State of exactly one stack inside a `ProductDeployment`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StackDeployment {
    stack_name: String,
    stack_display_name: String,
    stack_id: String,
    order: usize,
    service_count: u32,
    variables: BTreeMap<String, String>,
    status: StackDeploymentStatus,
    deployment_id: Option<DeploymentId>,
    deployment_stack_name: Option<String>,
    started_at: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
    error_message: Option<String>,
    is_new_in_upgrade: bool,
}

impl StackDeployment {
    pub fn new(config: StackDeploymentConfig, order: usize, is_new_in_upgrade: bool) -> Self {
        let stack_display_name = if config.stack_display_name.trim().is_empty() {
            config.stack_name.clone()
        } else {
            config.stack_display_name
        };
        Self {
            stack_name: config.stack_name,
            stack_display_name,
            stack_id: config.stack_id,
            order,
            service_count: config.service_count,
            variables: config.variables,
            status: StackDeploymentStatus::Pending,
            deployment_id: None,
            deployment_stack_name: None,
            started_at: None,
            completed_at: None,
            error_message: None,
            is_new_in_upgrade,
        }
    }

    pub fn stack_name(&self) -> &str {
        &self.stack_name
    }

    pub fn stack_display_name(&self) -> &str {
        &self.stack_display_name
    }

    pub fn stack_id(&self) -> &str {
        &self.stack_id
    }

    pub fn order(&self) -> usize {
        self.order
    }

    pub fn service_count(&self) -> u32 {
        self.service_count
    }

    pub fn variables(&self) -> &BTreeMap<String, String> {
        &self.variables
    }

    pub fn status(&self) -> StackDeploymentStatus {
        self.status
    }

    /// The single-stack `Deployment` driving this entry, if started
    pub fn deployment_id(&self) -> Option<DeploymentId> {
        self.deployment_id
    }

    pub fn deployment_stack_name(&self) -> Option<&str> {
        self.deployment_stack_name.as_deref()
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.completed_at
    }

    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }

    pub fn is_new_in_upgrade(&self) -> bool {
        self.is_new_in_upgrade
    }

    pub fn matches_name(&self, name: &str) -> bool {
        self.stack_name.eq_ignore_ascii_case(name)
    }

    pub fn start(
        &mut self,
        deployment_id: DeploymentId,
        deployment_stack_name: &str,
        now: DateTime<Utc>,
    ) -> Result<(), DomainError> {
        if self.status != StackDeploymentStatus::Pending {
            return Err(self.illegal("start"));
        }
        require_non_empty(deployment_stack_name, "deployment stack name")?;

        self.status = StackDeploymentStatus::Deploying;
        self.deployment_id = Some(deployment_id);
        self.deployment_stack_name = Some(deployment_stack_name.to_string());
        self.started_at = Some(now);
        self.completed_at = None;
        self.error_message = None;
        Ok(())
    }

    pub fn complete(&mut self, now: DateTime<Utc>) -> Result<(), DomainError> {
        if self.status != StackDeploymentStatus::Deploying {
            return Err(self.illegal("complete"));
        }
        self.status = StackDeploymentStatus::Running;
        self.completed_at = Some(now);
        Ok(())
    }

    pub fn fail(&mut self, message: &str, now: DateTime<Utc>) -> Result<(), DomainError> {
        if !matches!(
            self.status,
            StackDeploymentStatus::Pending | StackDeploymentStatus::Deploying
        ) {
            return Err(self.illegal("fail"));
        }
        require_non_empty(message, "error message")?;

        self.status = StackDeploymentStatus::Failed;
        self.completed_at = Some(now);
        self.error_message = Some(message.to_string());
        Ok(())
    }

    /// Allowed from any status
    pub fn mark_removed(&mut self, now: DateTime<Utc>) {
        self.status = StackDeploymentStatus::Removed;
        self.completed_at = Some(now);
    }

    /// Back to `Pending`, forgetting timestamps and errors. Unconditional.
    pub fn reset_to_pending(&mut self) {
        self.status = StackDeploymentStatus::Pending;
        self.started_at = None;
        self.completed_at = None;
        self.error_message = None;
    }

    /// `None` until started; runs to completion or to `now`
    pub fn duration(&self, now: DateTime<Utc>) -> Option<Duration> {
        self.started_at
            .map(|started| self.completed_at.unwrap_or(now) - started)
    }

    fn illegal(&self, operation: &str) -> DomainError {
        DomainError::illegal(format!(
            "cannot {} stack '{}' in status {}",
            operation, self.stack_name, self.status
        ))
    }
}
