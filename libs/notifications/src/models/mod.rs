//! Notification models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Kind of aggregate an event originated from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AggregateType {
    Deployment,
    ProductDeployment,
}

impl std::fmt::Display for AggregateType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AggregateType::Deployment => write!(f, "deployment"),
            AggregateType::ProductDeployment => write!(f, "product_deployment"),
        }
    }
}

/// A published domain event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventEnvelope {
    /// Unique id of this envelope
    pub event_id: Uuid,

    /// Aggregate the event belongs to
    pub aggregate_type: AggregateType,

    /// Id of the aggregate instance
    pub aggregate_id: String,

    /// Stable event name, e.g. "ProductDeploymentCompleted"
    pub event_type: String,

    /// When the envelope was created
    pub occurred_at: DateTime<Utc>,

    /// Event body
    pub payload: serde_json::Value,
}

impl EventEnvelope {
    /// Wrap a payload in a fresh envelope
    pub fn new(
        aggregate_type: AggregateType,
        aggregate_id: impl Into<String>,
        event_type: impl Into<String>,
        occurred_at: DateTime<Utc>,
        payload: serde_json::Value,
    ) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            aggregate_type,
            aggregate_id: aggregate_id.into(),
            event_type: event_type.into(),
            occurred_at,
            payload,
        }
    }
}
