//! Stackrail deployment engine
//!
//! State machines for single-stack deployments and multi-stack products,
//! plus the orchestration layer that drives them through collaborator
//! contracts.

pub mod clock;
pub mod config;
pub mod domain;
pub mod errors;
pub mod ids;
pub mod logs;
pub mod orchestrator;
pub mod ports;
pub mod store;
pub mod utils;

pub use errors::{DomainError, EngineError};
