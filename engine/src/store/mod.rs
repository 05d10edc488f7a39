//! In-memory implementations of the collaborator contracts

pub mod catalog;
pub mod deployments;
pub mod publisher;

pub use catalog::InMemoryCatalog;
pub use deployments::{InMemoryDeploymentRepository, InMemoryProductDeploymentRepository};
pub use publisher::{LoggingPublisher, RecordingPublisher};
