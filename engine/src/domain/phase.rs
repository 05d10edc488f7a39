//! Deployment phases and phase history

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Step of an install/upgrade run, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeploymentPhase {
    Initializing,
    PullingImages,
    CreatingNetworks,
    RunningInitContainers,
    StartingServices,
    RemovingOldContainers,
    Finalizing,
    Completed,
    Failed,
}

impl DeploymentPhase {
    /// Once an upgrade has reached this phase, new containers may already be
    /// serving and the previous version can no longer be restored in place.
    pub const POINT_OF_NO_RETURN: DeploymentPhase = DeploymentPhase::StartingServices;

    pub fn as_str(&self) -> &'static str {
        match self {
            DeploymentPhase::Initializing => "initializing",
            DeploymentPhase::PullingImages => "pulling_images",
            DeploymentPhase::CreatingNetworks => "creating_networks",
            DeploymentPhase::RunningInitContainers => "running_init_containers",
            DeploymentPhase::StartingServices => "starting_services",
            DeploymentPhase::RemovingOldContainers => "removing_old_containers",
            DeploymentPhase::Finalizing => "finalizing",
            DeploymentPhase::Completed => "completed",
            DeploymentPhase::Failed => "failed",
        }
    }
}

impl std::fmt::Display for DeploymentPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One entry of a deployment's phase history
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseRecord {
    pub phase: DeploymentPhase,
    pub percentage: u8,
    pub message: String,
    pub recorded_at: DateTime<Utc>,
}

/// One entry of a product deployment's phase history
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductPhaseRecord {
    /// Short label, e.g. "initiated" or "stack_completed"
    pub phase: String,
    pub message: String,
    pub recorded_at: DateTime<Utc>,
}
