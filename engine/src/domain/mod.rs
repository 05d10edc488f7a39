//! Deployment aggregates
//!
//! Plain in-memory state machines: no I/O, no locking, no threads. Callers
//! serialize mutating calls against one instance.

pub mod deployment;
pub mod events;
pub mod phase;
pub mod product;
pub mod service;
pub mod stack;

pub use deployment::{Deployment, DeploymentStatus, DeploymentTarget, OperationMode};
pub use events::{DeploymentEvent, DomainEvent, ProductDeploymentEvent};
pub use phase::{DeploymentPhase, PhaseRecord, ProductPhaseRecord};
pub use product::{NewProductDeployment, ProductDeployment, ProductDeploymentStatus, ProductUpgrade};
pub use service::{DeployedService, HealthCheckConfig, HealthCheckType};
pub use stack::{StackDeployment, StackDeploymentConfig, StackDeploymentStatus};
