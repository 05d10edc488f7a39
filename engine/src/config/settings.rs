//! Settings file management

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::errors::EngineError;
use crate::logs::LogLevel;

/// Engine settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Log level
    #[serde(default)]
    pub log_level: LogLevel,

    /// Emit JSON log lines
    #[serde(default)]
    pub log_json: bool,

    /// Directory for a daily log file; stdout only when unset
    #[serde(default)]
    pub log_dir: Option<String>,

    /// Orchestration settings
    #[serde(default)]
    pub orchestration: OrchestrationSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            log_level: LogLevel::Info,
            log_json: false,
            log_dir: None,
            orchestration: OrchestrationSettings::default(),
        }
    }
}

impl Settings {
    /// Read settings from a JSON file
    pub async fn load(path: &Path) -> Result<Self, EngineError> {
        let raw = tokio::fs::read_to_string(path).await?;
        serde_json::from_str(&raw)
            .map_err(|e| EngineError::ConfigError(format!("{}: {}", path.display(), e)))
    }
}

/// Orchestration settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestrationSettings {
    /// Continue with remaining stacks after a failure
    #[serde(default = "default_true")]
    pub continue_on_error: bool,

    /// Expected time for a single stack, in seconds
    #[serde(default = "default_expected_stack_duration")]
    pub expected_stack_duration_secs: u64,
}

fn default_true() -> bool {
    true
}

fn default_expected_stack_duration() -> u64 {
    600
}

impl Default for OrchestrationSettings {
    fn default() -> Self {
        Self {
            continue_on_error: true,
            expected_stack_duration_secs: default_expected_stack_duration(),
        }
    }
}
