//! Notification models for the stackrail engine
//!
//! Wire shapes handed to the external event/notification collaborator.

pub mod models;

pub use models::{AggregateType, EventEnvelope};
