//! Typed engine options

use std::path::PathBuf;

use crate::config::settings::Settings;
use crate::logs::LogOptions;

/// Main engine options
#[derive(Debug, Clone, Default)]
pub struct EngineOptions {
    /// Logging configuration
    pub log: LogOptions,

    /// Orchestrator behaviour
    pub orchestrator: OrchestratorOptions,
}

impl From<&Settings> for EngineOptions {
    fn from(settings: &Settings) -> Self {
        Self {
            log: LogOptions {
                log_level: settings.log_level.clone(),
                stdout: true,
                log_dir: settings.log_dir.as_ref().map(PathBuf::from),
                json_format: settings.log_json,
            },
            orchestrator: OrchestratorOptions {
                continue_on_error: settings.orchestration.continue_on_error,
                expected_stack_duration: chrono::Duration::seconds(
                    settings.orchestration.expected_stack_duration_secs as i64,
                ),
            },
        }
    }
}

/// Orchestrator options
#[derive(Debug, Clone)]
pub struct OrchestratorOptions {
    /// Keep deploying remaining stacks after one fails, unless a request
    /// says otherwise
    pub continue_on_error: bool,

    /// A stack taking longer than this is logged as overdue
    pub expected_stack_duration: chrono::Duration,
}

impl Default for OrchestratorOptions {
    fn default() -> Self {
        Self {
            continue_on_error: true,
            expected_stack_duration: chrono::Duration::minutes(10),
        }
    }
}
