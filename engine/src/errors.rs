//! Error types for the stackrail engine

use thiserror::Error;

/// Errors raised by aggregate operations.
///
/// Both kinds are detected before any state is touched, so an aggregate that
/// returned an error is exactly as it was before the call.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Illegal transition: {0}")]
    IllegalTransition(String),
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        DomainError::ValidationError(msg.into())
    }

    pub fn illegal(msg: impl Into<String>) -> Self {
        DomainError::IllegalTransition(msg.into())
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, DomainError::ValidationError(_))
    }

    pub fn is_illegal_transition(&self) -> bool {
        matches!(self, DomainError::IllegalTransition(_))
    }
}

/// Main error type for the orchestration layer and binary
#[derive(Error, Debug)]
pub enum EngineError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Runtime error: {0}")]
    RuntimeError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Publish error: {0}")]
    PublishError(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<anyhow::Error> for EngineError {
    fn from(err: anyhow::Error) -> Self {
        EngineError::Internal(err.to_string())
    }
}

/// Fail with a validation error when `value` is blank
pub(crate) fn require_non_empty(value: &str, field: &str) -> Result<(), DomainError> {
    if value.trim().is_empty() {
        return Err(DomainError::validation(format!("{} must not be empty", field)));
    }
    Ok(())
}
