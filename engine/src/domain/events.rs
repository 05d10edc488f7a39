//! Domain events emitted by the aggregates
//!
//! Aggregates never buffer events; every mutating operation hands back the
//! events it produced, in the order the state changes happened.

use serde::{Deserialize, Serialize};
use stackrail_notifications::{AggregateType, EventEnvelope};

use crate::domain::deployment::{DeploymentStatus, OperationMode};
use crate::domain::phase::DeploymentPhase;
use crate::domain::product::ProductDeploymentStatus;
use crate::ids::{DeploymentId, EnvironmentId, ProductDeploymentId};

/// Events raised by a single-stack `Deployment`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum DeploymentEvent {
    DeploymentStarted {
        deployment_id: DeploymentId,
        environment_id: EnvironmentId,
        stack_name: String,
        status: DeploymentStatus,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        target_version: Option<String>,
    },
    DeploymentCompleted {
        deployment_id: DeploymentId,
        status: DeploymentStatus,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },
    DeploymentRemoved {
        deployment_id: DeploymentId,
        stack_name: String,
    },
    DeploymentProgressUpdated {
        deployment_id: DeploymentId,
        phase: DeploymentPhase,
        percentage: u8,
        message: String,
    },
    DeploymentCancellationRequested {
        deployment_id: DeploymentId,
        reason: String,
    },
    OperationModeChanged {
        deployment_id: DeploymentId,
        previous_mode: OperationMode,
        new_mode: OperationMode,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
    },
    DeploymentUpgraded {
        deployment_id: DeploymentId,
        previous_version: String,
        new_version: String,
        upgrade_count: u32,
    },
    ServiceStatusChanged {
        deployment_id: DeploymentId,
        service_name: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        previous_status: Option<String>,
        new_status: String,
    },
}

impl DeploymentEvent {
    pub fn deployment_id(&self) -> DeploymentId {
        match self {
            DeploymentEvent::DeploymentStarted { deployment_id, .. }
            | DeploymentEvent::DeploymentCompleted { deployment_id, .. }
            | DeploymentEvent::DeploymentRemoved { deployment_id, .. }
            | DeploymentEvent::DeploymentProgressUpdated { deployment_id, .. }
            | DeploymentEvent::DeploymentCancellationRequested { deployment_id, .. }
            | DeploymentEvent::OperationModeChanged { deployment_id, .. }
            | DeploymentEvent::DeploymentUpgraded { deployment_id, .. }
            | DeploymentEvent::ServiceStatusChanged { deployment_id, .. } => *deployment_id,
        }
    }

    pub fn event_type(&self) -> &'static str {
        match self {
            DeploymentEvent::DeploymentStarted { .. } => "DeploymentStarted",
            DeploymentEvent::DeploymentCompleted { .. } => "DeploymentCompleted",
            DeploymentEvent::DeploymentRemoved { .. } => "DeploymentRemoved",
            DeploymentEvent::DeploymentProgressUpdated { .. } => "DeploymentProgressUpdated",
            DeploymentEvent::DeploymentCancellationRequested { .. } => {
                "DeploymentCancellationRequested"
            }
            DeploymentEvent::OperationModeChanged { .. } => "OperationModeChanged",
            DeploymentEvent::DeploymentUpgraded { .. } => "DeploymentUpgraded",
            DeploymentEvent::ServiceStatusChanged { .. } => "ServiceStatusChanged",
        }
    }
}

/// Events raised by a `ProductDeployment`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ProductDeploymentEvent {
    ProductDeploymentInitiated {
        product_deployment_id: ProductDeploymentId,
        environment_id: EnvironmentId,
        product_name: String,
        product_version: String,
        total_stacks: usize,
    },
    ProductUpgradeInitiated {
        product_deployment_id: ProductDeploymentId,
        environment_id: EnvironmentId,
        product_name: String,
        previous_version: String,
        new_version: String,
        total_stacks: usize,
        new_stacks: usize,
    },
    ProductStackDeploymentStarted {
        product_deployment_id: ProductDeploymentId,
        stack_name: String,
        deployment_id: DeploymentId,
        stack_index: usize,
        total_stacks: usize,
    },
    ProductStackDeploymentCompleted {
        product_deployment_id: ProductDeploymentId,
        stack_name: String,
        completed_stacks: usize,
        total_stacks: usize,
    },
    ProductStackDeploymentFailed {
        product_deployment_id: ProductDeploymentId,
        stack_name: String,
        error_message: String,
    },
    ProductDeploymentCompleted {
        product_deployment_id: ProductDeploymentId,
        product_name: String,
        product_version: String,
        total_stacks: usize,
    },
    ProductDeploymentPartiallyCompleted {
        product_deployment_id: ProductDeploymentId,
        running_count: usize,
        failed_count: usize,
        reason: String,
    },
    ProductDeploymentFailed {
        product_deployment_id: ProductDeploymentId,
        completed_count: usize,
        failed_count: usize,
        error_message: String,
    },
    ProductRemovalInitiated {
        product_deployment_id: ProductDeploymentId,
        total_stacks: usize,
    },
    ProductStackRemoved {
        product_deployment_id: ProductDeploymentId,
        stack_name: String,
        remaining_stacks: usize,
    },
    ProductDeploymentRemoved {
        product_deployment_id: ProductDeploymentId,
        product_name: String,
    },
}

impl ProductDeploymentEvent {
    pub fn product_deployment_id(&self) -> ProductDeploymentId {
        match self {
            ProductDeploymentEvent::ProductDeploymentInitiated { product_deployment_id, .. }
            | ProductDeploymentEvent::ProductUpgradeInitiated { product_deployment_id, .. }
            | ProductDeploymentEvent::ProductStackDeploymentStarted { product_deployment_id, .. }
            | ProductDeploymentEvent::ProductStackDeploymentCompleted { product_deployment_id, .. }
            | ProductDeploymentEvent::ProductStackDeploymentFailed { product_deployment_id, .. }
            | ProductDeploymentEvent::ProductDeploymentCompleted { product_deployment_id, .. }
            | ProductDeploymentEvent::ProductDeploymentPartiallyCompleted {
                product_deployment_id,
                ..
            }
            | ProductDeploymentEvent::ProductDeploymentFailed { product_deployment_id, .. }
            | ProductDeploymentEvent::ProductRemovalInitiated { product_deployment_id, .. }
            | ProductDeploymentEvent::ProductStackRemoved { product_deployment_id, .. }
            | ProductDeploymentEvent::ProductDeploymentRemoved { product_deployment_id, .. } => {
                *product_deployment_id
            }
        }
    }

    pub fn event_type(&self) -> &'static str {
        match self {
            ProductDeploymentEvent::ProductDeploymentInitiated { .. } => {
                "ProductDeploymentInitiated"
            }
            ProductDeploymentEvent::ProductUpgradeInitiated { .. } => "ProductUpgradeInitiated",
            ProductDeploymentEvent::ProductStackDeploymentStarted { .. } => {
                "ProductStackDeploymentStarted"
            }
            ProductDeploymentEvent::ProductStackDeploymentCompleted { .. } => {
                "ProductStackDeploymentCompleted"
            }
            ProductDeploymentEvent::ProductStackDeploymentFailed { .. } => {
                "ProductStackDeploymentFailed"
            }
            ProductDeploymentEvent::ProductDeploymentCompleted { .. } => {
                "ProductDeploymentCompleted"
            }
            ProductDeploymentEvent::ProductDeploymentPartiallyCompleted { .. } => {
                "ProductDeploymentPartiallyCompleted"
            }
            ProductDeploymentEvent::ProductDeploymentFailed { .. } => "ProductDeploymentFailed",
            ProductDeploymentEvent::ProductRemovalInitiated { .. } => "ProductRemovalInitiated",
            ProductDeploymentEvent::ProductStackRemoved { .. } => "ProductStackRemoved",
            ProductDeploymentEvent::ProductDeploymentRemoved { .. } => "ProductDeploymentRemoved",
        }
    }

    /// Final status the product reached, for events that close a run
    pub fn resulting_status(&self) -> Option<ProductDeploymentStatus> {
        match self {
            ProductDeploymentEvent::ProductDeploymentCompleted { .. } => {
                Some(ProductDeploymentStatus::Running)
            }
            ProductDeploymentEvent::ProductDeploymentPartiallyCompleted { .. } => {
                Some(ProductDeploymentStatus::PartiallyRunning)
            }
            ProductDeploymentEvent::ProductDeploymentFailed { .. } => {
                Some(ProductDeploymentStatus::Failed)
            }
            ProductDeploymentEvent::ProductDeploymentRemoved { .. } => {
                Some(ProductDeploymentStatus::Removed)
            }
            _ => None,
        }
    }
}

/// Any event produced by the engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DomainEvent {
    Deployment(DeploymentEvent),
    Product(ProductDeploymentEvent),
}

impl DomainEvent {
    pub fn aggregate_type(&self) -> AggregateType {
        match self {
            DomainEvent::Deployment(_) => AggregateType::Deployment,
            DomainEvent::Product(_) => AggregateType::ProductDeployment,
        }
    }

    pub fn aggregate_id(&self) -> String {
        match self {
            DomainEvent::Deployment(e) => e.deployment_id().to_string(),
            DomainEvent::Product(e) => e.product_deployment_id().to_string(),
        }
    }

    pub fn event_type(&self) -> &'static str {
        match self {
            DomainEvent::Deployment(e) => e.event_type(),
            DomainEvent::Product(e) => e.event_type(),
        }
    }

    /// Wrap the event for the notification collaborator
    pub fn to_envelope(
        &self,
        occurred_at: chrono::DateTime<chrono::Utc>,
    ) -> Result<EventEnvelope, serde_json::Error> {
        Ok(EventEnvelope::new(
            self.aggregate_type(),
            self.aggregate_id(),
            self.event_type(),
            occurred_at,
            serde_json::to_value(self)?,
        ))
    }
}

impl From<DeploymentEvent> for DomainEvent {
    fn from(event: DeploymentEvent) -> Self {
        DomainEvent::Deployment(event)
    }
}

impl From<ProductDeploymentEvent> for DomainEvent {
    fn from(event: ProductDeploymentEvent) -> Self {
        DomainEvent::Product(event)
    }
}
