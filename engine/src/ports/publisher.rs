//! Event publishing contract

use async_trait::async_trait;
use stackrail_notifications::EventEnvelope;

use crate::errors::EngineError;

/// Downstream sink for domain events (read models, notifications)
#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(&self, events: Vec<EventEnvelope>) -> Result<(), EngineError>;
}
