//! Collaborator contracts
//!
//! The engine never talks to a database, a container engine or a message bus
//! directly; it goes through these traits.

pub mod catalog;
pub mod publisher;
pub mod repository;
pub mod runtime;

pub use catalog::{StackCatalog, StackDefinition};
pub use publisher::EventPublisher;
pub use repository::{DeploymentRepository, ProductDeploymentRepository};
pub use runtime::{ServiceRuntimeInfo, StackDeployRequest, StackRuntime};
