//! Services running inside a deployment

use serde::{Deserialize, Serialize};

use crate::errors::{require_non_empty, DomainError};

/// Runtime status string reported for a healthy container
pub const STATUS_RUNNING: &str = "running";

/// Runtime status string stamped on every service when a deployment is removed
pub const STATUS_REMOVED: &str = "removed";

/// One container belonging to a deployment.
///
/// `status` is whatever the container runtime reports ("starting", "running",
/// "exited", ...); it is not a closed set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeployedService {
    /// Service name, unique within its deployment (case-sensitive)
    pub service_name: String,

    /// Runtime container id
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub container_id: Option<String>,

    /// Runtime container name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub container_name: Option<String>,

    /// Image reference the container runs
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,

    /// Runtime status
    pub status: String,
}

impl DeployedService {
    pub fn new(
        service_name: impl Into<String>,
        image: Option<String>,
        status: impl Into<String>,
    ) -> Result<Self, DomainError> {
        let service = Self {
            service_name: service_name.into(),
            container_id: None,
            container_name: None,
            image,
            status: status.into(),
        };
        service.validate()?;
        Ok(service)
    }

    /// Name and status must be non-blank
    pub(crate) fn validate(&self) -> Result<(), DomainError> {
        require_non_empty(&self.service_name, "service name")?;
        require_non_empty(&self.status, "service status")?;
        Ok(())
    }

    /// Attach container identity reported by the runtime
    pub fn with_container(
        mut self,
        container_id: impl Into<String>,
        container_name: impl Into<String>,
    ) -> Self {
        self.container_id = Some(container_id.into());
        self.container_name = Some(container_name.into());
        self
    }

    pub fn is_running(&self) -> bool {
        self.status.eq_ignore_ascii_case(STATUS_RUNNING)
    }
}

/// Kind of health probe configured for a service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum HealthCheckType {
    /// Use the container's own HEALTHCHECK
    #[default]
    Docker,
    Http,
    Tcp,
    /// No probing, the service counts as healthy when running
    None,
}

/// Health probe settings for one service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthCheckConfig {
    /// Service the probe applies to (matched case-insensitively)
    pub service_name: String,

    #[serde(default)]
    pub check_type: HealthCheckType,

    /// HTTP path for `Http` probes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,

    /// Port for `Http` and `Tcp` probes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,

    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default = "default_retries")]
    pub retries: u32,
}

fn default_interval_secs() -> u64 {
    30
}

fn default_timeout_secs() -> u64 {
    10
}

fn default_retries() -> u32 {
    3
}

impl HealthCheckConfig {
    pub fn new(service_name: impl Into<String>, check_type: HealthCheckType) -> Self {
        Self {
            service_name: service_name.into(),
            check_type,
            path: None,
            port: None,
            interval_secs: default_interval_secs(),
            timeout_secs: default_timeout_secs(),
            retries: default_retries(),
        }
    }

    pub(crate) fn validate(&self) -> Result<(), DomainError> {
        require_non_empty(&self.service_name, "health check service name")?;
        match self.check_type {
            HealthCheckType::Http if self.path.is_none() || self.port.is_none() => Err(
                DomainError::validation("http health checks need both a path and a port"),
            ),
            HealthCheckType::Tcp if self.port.is_none() => {
                Err(DomainError::validation("tcp health checks need a port"))
            }
            _ => Ok(()),
        }
    }
}
