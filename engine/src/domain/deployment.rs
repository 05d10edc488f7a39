//! Single-stack deployment lifecycle
//!
//! A [`Deployment`] follows one stack instance in one environment through
//! install, upgrade, rollback and removal:
//!
//! ```text
//! Installing -> Running | Failed
//! Running    -> Upgrading | Removed
//! Upgrading  -> Running | Failed
//! Failed     -> Upgrading | Removed
//! Removed    (terminal)
//! ```
//!
//! Every operation checks all of its preconditions before touching any field
//! and returns the events it produced.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::clock::SharedClock;
use crate::domain::events::DeploymentEvent;
use crate::domain::phase::{DeploymentPhase, PhaseRecord};
use crate::domain::service::{DeployedService, HealthCheckConfig, STATUS_REMOVED};
use crate::errors::{require_non_empty, DomainError};
use crate::ids::{DeploymentId, EnvironmentId, UserId};

/// Deployment status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeploymentStatus {
    /// First install in progress
    Installing,

    /// Upgrade or rollback in progress
    Upgrading,

    /// Stack is up
    Running,

    /// Last install/upgrade failed
    Failed,

    /// Torn down
    Removed,
}

impl DeploymentStatus {
    pub const ALL: [DeploymentStatus; 5] = [
        DeploymentStatus::Installing,
        DeploymentStatus::Upgrading,
        DeploymentStatus::Running,
        DeploymentStatus::Failed,
        DeploymentStatus::Removed,
    ];

    pub fn is_terminal(&self) -> bool {
        matches!(self, DeploymentStatus::Removed)
    }

    pub fn is_in_progress(&self) -> bool {
        matches!(self, DeploymentStatus::Installing | DeploymentStatus::Upgrading)
    }

    pub fn is_operational(&self) -> bool {
        matches!(self, DeploymentStatus::Running)
    }

    /// Lookup against the transition table
    pub fn can_transition_to(&self, target: DeploymentStatus) -> bool {
        use DeploymentStatus::*;
        matches!(
            (self, target),
            (Installing, Running)
                | (Installing, Failed)
                | (Running, Upgrading)
                | (Running, Removed)
                | (Upgrading, Running)
                | (Upgrading, Failed)
                | (Failed, Upgrading)
                | (Failed, Removed)
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DeploymentStatus::Installing => "installing",
            DeploymentStatus::Upgrading => "upgrading",
            DeploymentStatus::Running => "running",
            DeploymentStatus::Failed => "failed",
            DeploymentStatus::Removed => "removed",
        }
    }
}

impl std::fmt::Display for DeploymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether a running deployment accepts traffic normally
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationMode {
    #[default]
    Normal,
    Maintenance,
}

/// Identity of the stack instance a deployment is created for
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeploymentTarget {
    pub id: DeploymentId,
    pub environment_id: EnvironmentId,
    pub stack_id: String,
    pub stack_name: String,
    pub project_name: String,
    pub deployed_by: UserId,
}

impl DeploymentTarget {
    fn validate(&self) -> Result<(), DomainError> {
        require_non_empty(&self.stack_id, "stack id")?;
        require_non_empty(&self.stack_name, "stack name")?;
        require_non_empty(&self.project_name, "project name")?;
        Ok(())
    }
}

/// One stack instance in one environment
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Deployment {
    id: DeploymentId,
    environment_id: EnvironmentId,
    stack_id: String,
    stack_name: String,
    project_name: String,
    deployed_by: UserId,
    status: DeploymentStatus,
    current_phase: DeploymentPhase,
    progress_percentage: u8,
    progress_message: String,
    phase_history: Vec<PhaseRecord>,
    created_at: DateTime<Utc>,
    started_at: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,
    error_message: Option<String>,
    stack_version: Option<String>,
    previous_version: Option<String>,
    target_version: Option<String>,
    upgrade_count: u32,
    last_upgraded_at: Option<DateTime<Utc>>,
    variables: BTreeMap<String, String>,
    health_check_configs: Vec<HealthCheckConfig>,
    services: Vec<DeployedService>,
    operation_mode: OperationMode,
    maintenance_reason: Option<String>,
    is_cancellation_requested: bool,
    cancellation_reason: Option<String>,
    #[serde(skip)]
    clock: SharedClock,
}

impl Deployment {
    /// Begin the first install of a stack
    pub fn start_installation(
        target: DeploymentTarget,
        clock: SharedClock,
    ) -> Result<(Self, Vec<DeploymentEvent>), DomainError> {
        target.validate()?;
        let deployment = Self::create(
            target,
            DeploymentStatus::Installing,
            None,
            "Installation started",
            clock,
        );
        let event = deployment.started_event();
        Ok((deployment, vec![event]))
    }

    /// Begin a deployment record for a stack that is being upgraded from
    /// `previous_version`
    pub fn start_upgrade(
        target: DeploymentTarget,
        previous_version: Option<String>,
        clock: SharedClock,
    ) -> Result<(Self, Vec<DeploymentEvent>), DomainError> {
        target.validate()?;
        if let Some(version) = &previous_version {
            require_non_empty(version, "previous version")?;
        }
        let deployment = Self::create(
            target,
            DeploymentStatus::Upgrading,
            previous_version,
            "Upgrade started",
            clock,
        );
        let event = deployment.started_event();
        Ok((deployment, vec![event]))
    }

    fn create(
        target: DeploymentTarget,
        status: DeploymentStatus,
        previous_version: Option<String>,
        message: &str,
        clock: SharedClock,
    ) -> Self {
        let now = clock.now();
        Self {
            id: target.id,
            environment_id: target.environment_id,
            stack_id: target.stack_id,
            stack_name: target.stack_name,
            project_name: target.project_name,
            deployed_by: target.deployed_by,
            status,
            current_phase: DeploymentPhase::Initializing,
            progress_percentage: 0,
            progress_message: message.to_string(),
            phase_history: vec![PhaseRecord {
                phase: DeploymentPhase::Initializing,
                percentage: 0,
                message: message.to_string(),
                recorded_at: now,
            }],
            created_at: now,
            started_at: now,
            completed_at: None,
            error_message: None,
            stack_version: None,
            previous_version,
            target_version: None,
            upgrade_count: 0,
            last_upgraded_at: None,
            variables: BTreeMap::new(),
            health_check_configs: Vec::new(),
            services: Vec::new(),
            operation_mode: OperationMode::Normal,
            maintenance_reason: None,
            is_cancellation_requested: false,
            cancellation_reason: None,
            clock,
        }
    }

    /// Replace the clock, e.g. after loading from storage
    pub fn with_clock(mut self, clock: SharedClock) -> Self {
        self.clock = clock;
        self
    }

    // ---------------------------------------------------------------------
    // Accessors
    // ---------------------------------------------------------------------

    pub fn id(&self) -> DeploymentId {
        self.id
    }

    pub fn environment_id(&self) -> EnvironmentId {
        self.environment_id
    }

    pub fn stack_id(&self) -> &str {
        &self.stack_id
    }

    pub fn stack_name(&self) -> &str {
        &self.stack_name
    }

    pub fn project_name(&self) -> &str {
        &self.project_name
    }

    pub fn deployed_by(&self) -> UserId {
        self.deployed_by
    }

    pub fn status(&self) -> DeploymentStatus {
        self.status
    }

    pub fn current_phase(&self) -> DeploymentPhase {
        self.current_phase
    }

    pub fn progress_percentage(&self) -> u8 {
        self.progress_percentage
    }

    pub fn progress_message(&self) -> &str {
        &self.progress_message
    }

    pub fn phase_history(&self) -> &[PhaseRecord] {
        &self.phase_history
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Start of the current install/upgrade/rollback run
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.completed_at
    }

    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }

    pub fn stack_version(&self) -> Option<&str> {
        self.stack_version.as_deref()
    }

    pub fn previous_version(&self) -> Option<&str> {
        self.previous_version.as_deref()
    }

    /// Version an in-flight upgrade or rollback is heading to
    pub fn target_version(&self) -> Option<&str> {
        self.target_version.as_deref()
    }

    pub fn upgrade_count(&self) -> u32 {
        self.upgrade_count
    }

    pub fn last_upgraded_at(&self) -> Option<DateTime<Utc>> {
        self.last_upgraded_at
    }

    pub fn variables(&self) -> &BTreeMap<String, String> {
        &self.variables
    }

    pub fn health_check_configs(&self) -> &[HealthCheckConfig] {
        &self.health_check_configs
    }

    pub fn services(&self) -> &[DeployedService] {
        &self.services
    }

    pub fn service(&self, name: &str) -> Option<&DeployedService> {
        self.services.iter().find(|s| s.service_name == name)
    }

    pub fn operation_mode(&self) -> OperationMode {
        self.operation_mode
    }

    pub fn maintenance_reason(&self) -> Option<&str> {
        self.maintenance_reason.as_deref()
    }

    pub fn is_cancellation_requested(&self) -> bool {
        self.is_cancellation_requested
    }

    pub fn cancellation_reason(&self) -> Option<&str> {
        self.cancellation_reason.as_deref()
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    pub fn is_in_progress(&self) -> bool {
        self.status.is_in_progress()
    }

    pub fn is_operational(&self) -> bool {
        self.status.is_operational()
    }

    pub fn can_transition_to(&self, target: DeploymentStatus) -> bool {
        self.status.can_transition_to(target)
    }

    // ---------------------------------------------------------------------
    // Configuration and services
    // ---------------------------------------------------------------------

    pub fn set_stack_version(&mut self, version: impl Into<String>) -> Result<(), DomainError> {
        self.ensure_not_terminal("set stack version")?;
        let version = version.into();
        require_non_empty(&version, "stack version")?;
        self.stack_version = Some(version);
        Ok(())
    }

    pub fn set_variables(&mut self, variables: BTreeMap<String, String>) -> Result<(), DomainError> {
        self.ensure_not_terminal("set variables")?;
        if variables.keys().any(|k| k.trim().is_empty()) {
            return Err(DomainError::validation("variable names must not be empty"));
        }
        self.variables = variables;
        Ok(())
    }

    /// Insert or replace the health check of one service
    pub fn set_health_check_config(&mut self, config: HealthCheckConfig) -> Result<(), DomainError> {
        self.ensure_not_terminal("set health check")?;
        config.validate()?;
        match self
            .health_check_configs
            .iter_mut()
            .find(|c| c.service_name.eq_ignore_ascii_case(&config.service_name))
        {
            Some(existing) => *existing = config,
            None => self.health_check_configs.push(config),
        }
        Ok(())
    }

    pub fn health_check_config(&self, service_name: &str) -> Option<&HealthCheckConfig> {
        self.health_check_configs
            .iter()
            .find(|c| c.service_name.eq_ignore_ascii_case(service_name))
    }

    /// Record a service, updating it in place if the name is already known
    pub fn add_service(
        &mut self,
        name: impl Into<String>,
        image: Option<String>,
        status: impl Into<String>,
    ) -> Result<Vec<DeploymentEvent>, DomainError> {
        self.ensure_not_terminal("add service")?;
        let service = DeployedService::new(name, image, status)?;
        Ok(self.upsert_service(service).into_iter().collect())
    }

    /// Attach runtime container details to a service
    pub fn set_service_container_info(
        &mut self,
        name: &str,
        container_id: impl Into<String>,
        container_name: impl Into<String>,
        status: impl Into<String>,
    ) -> Result<Vec<DeploymentEvent>, DomainError> {
        self.ensure_not_terminal("set service container info")?;
        let container_id = container_id.into();
        let container_name = container_name.into();
        require_non_empty(&container_id, "container id")?;
        require_non_empty(&container_name, "container name")?;

        let image = self.service(name).and_then(|s| s.image.clone());
        let service =
            DeployedService::new(name, image, status)?.with_container(container_id, container_name);
        Ok(self.upsert_service(service).into_iter().collect())
    }

    /// Drop a service; unknown names are ignored
    pub fn remove_service(&mut self, name: &str) -> Result<(), DomainError> {
        self.ensure_not_terminal("remove service")?;
        self.services.retain(|s| s.service_name != name);
        Ok(())
    }

    fn upsert_service(&mut self, service: DeployedService) -> Option<DeploymentEvent> {
        let previous_status = match self
            .services
            .iter_mut()
            .find(|s| s.service_name == service.service_name)
        {
            Some(existing) => {
                let previous = std::mem::replace(existing, service.clone());
                Some(previous.status)
            }
            None => {
                self.services.push(service.clone());
                None
            }
        };

        if previous_status.as_deref() == Some(service.status.as_str()) {
            return None;
        }
        Some(DeploymentEvent::ServiceStatusChanged {
            deployment_id: self.id,
            service_name: service.service_name,
            previous_status,
            new_status: service.status,
        })
    }

    // ---------------------------------------------------------------------
    // Lifecycle
    // ---------------------------------------------------------------------

    pub fn mark_as_running(&mut self) -> Result<Vec<DeploymentEvent>, DomainError> {
        self.ensure_transition(DeploymentStatus::Running, "mark as running")?;

        let now = self.clock.now();
        if self.status == DeploymentStatus::Upgrading {
            self.last_upgraded_at = Some(now);
            if let Some(target) = self.target_version.take() {
                if self.stack_version.as_deref() != Some(target.as_str()) {
                    self.previous_version = self.stack_version.take();
                }
                self.stack_version = Some(target);
            }
        }
        self.status = DeploymentStatus::Running;
        self.completed_at = Some(now);
        self.error_message = None;
        self.is_cancellation_requested = false;
        self.record_phase(DeploymentPhase::Completed, 100, "Deployment completed".to_string());

        Ok(vec![DeploymentEvent::DeploymentCompleted {
            deployment_id: self.id,
            status: DeploymentStatus::Running,
            message: None,
        }])
    }

    pub fn mark_as_failed(
        &mut self,
        message: impl Into<String>,
    ) -> Result<Vec<DeploymentEvent>, DomainError> {
        self.ensure_transition(DeploymentStatus::Failed, "mark as failed")?;
        let message = message.into();
        require_non_empty(&message, "error message")?;
        Ok(vec![self.fail(message)])
    }

    fn fail(&mut self, message: String) -> DeploymentEvent {
        let now = self.clock.now();
        self.status = DeploymentStatus::Failed;
        self.completed_at = Some(now);
        self.target_version = None;
        self.is_cancellation_requested = false;
        self.error_message = Some(message.clone());
        let percentage = self.progress_percentage;
        self.record_phase(DeploymentPhase::Failed, percentage, message.clone());

        DeploymentEvent::DeploymentCompleted {
            deployment_id: self.id,
            status: DeploymentStatus::Failed,
            message: Some(message),
        }
    }

    pub fn mark_as_removed(&mut self) -> Result<Vec<DeploymentEvent>, DomainError> {
        self.ensure_transition(DeploymentStatus::Removed, "remove")?;

        for service in &mut self.services {
            service.status = STATUS_REMOVED.to_string();
        }
        self.status = DeploymentStatus::Removed;
        self.completed_at = Some(self.clock.now());
        self.operation_mode = OperationMode::Normal;
        self.maintenance_reason = None;

        Ok(vec![DeploymentEvent::DeploymentRemoved {
            deployment_id: self.id,
            stack_name: self.stack_name.clone(),
        }])
    }

    /// Re-enter `Upgrading` from `Running` towards `new_version`
    pub fn start_upgrade_process(
        &mut self,
        new_version: impl Into<String>,
    ) -> Result<Vec<DeploymentEvent>, DomainError> {
        if self.status != DeploymentStatus::Running {
            return Err(self.illegal("start upgrade"));
        }
        let new_version = new_version.into();
        require_non_empty(&new_version, "target version")?;
        let message = format!("Upgrade to {} started", new_version);
        Ok(vec![self.restart_run(new_version, message)])
    }

    /// Re-enter `Upgrading` from `Failed` towards `target_version`
    pub fn start_rollback_process(
        &mut self,
        target_version: impl Into<String>,
    ) -> Result<Vec<DeploymentEvent>, DomainError> {
        if self.status != DeploymentStatus::Failed {
            return Err(self.illegal("start rollback"));
        }
        let target_version = target_version.into();
        require_non_empty(&target_version, "rollback version")?;
        let message = format!("Rollback to {} started", target_version);
        Ok(vec![self.restart_run(target_version, message)])
    }

    /// Re-enter `Upgrading` from `Failed` to try `target_version` again.
    ///
    /// Same edge as a rollback, recorded as a retry for a version that was
    /// never running.
    pub fn start_retry_process(
        &mut self,
        target_version: impl Into<String>,
    ) -> Result<Vec<DeploymentEvent>, DomainError> {
        if self.status != DeploymentStatus::Failed {
            return Err(self.illegal("start retry"));
        }
        let target_version = target_version.into();
        require_non_empty(&target_version, "retry version")?;
        let message = format!("Retry of {} started", target_version);
        Ok(vec![self.restart_run(target_version, message)])
    }

    fn restart_run(&mut self, target_version: String, message: String) -> DeploymentEvent {
        let now = self.clock.now();
        self.status = DeploymentStatus::Upgrading;
        self.started_at = now;
        self.completed_at = None;
        self.error_message = None;
        self.is_cancellation_requested = false;
        self.cancellation_reason = None;
        self.target_version = Some(target_version);
        self.record_phase(DeploymentPhase::Initializing, 0, message);
        self.started_event()
    }

    pub fn update_progress(
        &mut self,
        phase: DeploymentPhase,
        percentage: u8,
        message: impl Into<String>,
    ) -> Result<Vec<DeploymentEvent>, DomainError> {
        if !self.is_in_progress() {
            return Err(self.illegal("update progress"));
        }
        if percentage > 100 {
            return Err(DomainError::validation(format!(
                "progress percentage must be between 0 and 100, got {}",
                percentage
            )));
        }
        let message = message.into();
        self.record_phase(phase, percentage, message.clone());

        Ok(vec![DeploymentEvent::DeploymentProgressUpdated {
            deployment_id: self.id,
            phase,
            percentage,
            message,
        }])
    }

    /// First half of cooperative cancellation: raise the flag only
    pub fn request_cancellation(
        &mut self,
        reason: impl Into<String>,
    ) -> Result<Vec<DeploymentEvent>, DomainError> {
        if !self.is_in_progress() {
            return Err(self.illegal("request cancellation"));
        }
        if self.is_cancellation_requested {
            return Err(DomainError::illegal(format!(
                "cancellation of deployment {} was already requested",
                self.id
            )));
        }
        let reason = reason.into();
        require_non_empty(&reason, "cancellation reason")?;

        self.is_cancellation_requested = true;
        self.cancellation_reason = Some(reason.clone());
        Ok(vec![DeploymentEvent::DeploymentCancellationRequested {
            deployment_id: self.id,
            reason,
        }])
    }

    /// Second half of cooperative cancellation, called once in-flight work stopped
    pub fn confirm_cancellation(&mut self) -> Result<Vec<DeploymentEvent>, DomainError> {
        if !self.is_cancellation_requested || !self.is_in_progress() {
            return Err(DomainError::illegal(format!(
                "no cancellation pending for deployment {}",
                self.id
            )));
        }
        let message = match &self.cancellation_reason {
            Some(reason) => format!("Deployment cancelled: {}", reason),
            None => "Deployment cancelled".to_string(),
        };
        Ok(vec![self.fail(message)])
    }

    pub fn enter_maintenance(
        &mut self,
        reason: impl Into<String>,
    ) -> Result<Vec<DeploymentEvent>, DomainError> {
        self.ensure_running("enter maintenance")?;
        if self.operation_mode == OperationMode::Maintenance {
            return Err(DomainError::illegal(format!(
                "deployment {} is already in maintenance mode",
                self.id
            )));
        }
        let reason = reason.into();
        require_non_empty(&reason, "maintenance reason")?;

        self.operation_mode = OperationMode::Maintenance;
        self.maintenance_reason = Some(reason.clone());
        Ok(vec![DeploymentEvent::OperationModeChanged {
            deployment_id: self.id,
            previous_mode: OperationMode::Normal,
            new_mode: OperationMode::Maintenance,
            reason: Some(reason),
        }])
    }

    pub fn exit_maintenance(&mut self) -> Result<Vec<DeploymentEvent>, DomainError> {
        self.ensure_running("exit maintenance")?;
        if self.operation_mode == OperationMode::Normal {
            return Err(DomainError::illegal(format!(
                "deployment {} is not in maintenance mode",
                self.id
            )));
        }

        self.operation_mode = OperationMode::Normal;
        self.maintenance_reason = None;
        Ok(vec![DeploymentEvent::OperationModeChanged {
            deployment_id: self.id,
            previous_mode: OperationMode::Maintenance,
            new_mode: OperationMode::Normal,
            reason: None,
        }])
    }

    pub fn record_upgrade(
        &mut self,
        previous_version: impl Into<String>,
        new_version: impl Into<String>,
    ) -> Result<Vec<DeploymentEvent>, DomainError> {
        self.ensure_running("record upgrade")?;
        let previous_version = previous_version.into();
        let new_version = new_version.into();
        require_non_empty(&previous_version, "previous version")?;
        require_non_empty(&new_version, "new version")?;

        self.upgrade_count += 1;
        self.last_upgraded_at = Some(self.clock.now());
        self.previous_version = Some(previous_version.clone());
        self.stack_version = Some(new_version.clone());

        Ok(vec![DeploymentEvent::DeploymentUpgraded {
            deployment_id: self.id,
            previous_version,
            new_version,
            upgrade_count: self.upgrade_count,
        }])
    }

    /// Swap in the service set observed after an upgrade
    pub fn update_services_after_upgrade(
        &mut self,
        services: Vec<DeployedService>,
    ) -> Result<Vec<DeploymentEvent>, DomainError> {
        self.ensure_running("update services")?;
        for (i, service) in services.iter().enumerate() {
            service.validate()?;
            if services[..i]
                .iter()
                .any(|s| s.service_name == service.service_name)
            {
                return Err(DomainError::validation(format!(
                    "duplicate service '{}'",
                    service.service_name
                )));
            }
        }

        let message = format!("{} services updated after upgrade", services.len());
        self.services = services;
        Ok(vec![DeploymentEvent::DeploymentProgressUpdated {
            deployment_id: self.id,
            phase: self.current_phase,
            percentage: self.progress_percentage,
            message,
        }])
    }

    // ---------------------------------------------------------------------
    // Queries
    // ---------------------------------------------------------------------

    pub fn can_rollback(&self) -> bool {
        self.status == DeploymentStatus::Failed && self.stack_version.is_some()
    }

    /// Last known good version, when a rollback is possible
    pub fn rollback_target_version(&self) -> Option<&str> {
        if self.can_rollback() {
            self.stack_version.as_deref()
        } else {
            None
        }
    }

    /// True once an upgrade has started replacing containers
    pub fn is_past_point_of_no_return(&self) -> bool {
        self.status == DeploymentStatus::Upgrading
            && self.current_phase >= DeploymentPhase::POINT_OF_NO_RETURN
    }

    /// True when there is at least one service and every service is running
    pub fn are_all_services_healthy(&self) -> bool {
        !self.services.is_empty() && self.services.iter().all(|s| s.is_running())
    }

    pub fn unhealthy_services(&self) -> Vec<&DeployedService> {
        self.services.iter().filter(|s| !s.is_running()).collect()
    }

    pub fn running_service_count(&self) -> usize {
        self.services.iter().filter(|s| s.is_running()).count()
    }

    /// Length of the last finished run
    pub fn duration(&self) -> Option<Duration> {
        self.completed_at.map(|done| done - self.started_at)
    }

    /// Time spent in the current run so far
    pub fn elapsed_time(&self) -> Duration {
        self.completed_at.unwrap_or_else(|| self.clock.now()) - self.started_at
    }

    pub fn is_overdue(&self, expected: Duration) -> bool {
        self.is_in_progress() && self.elapsed_time() > expected
    }

    // ---------------------------------------------------------------------
    // Helpers
    // ---------------------------------------------------------------------

    fn started_event(&self) -> DeploymentEvent {
        DeploymentEvent::DeploymentStarted {
            deployment_id: self.id,
            environment_id: self.environment_id,
            stack_name: self.stack_name.clone(),
            status: self.status,
            target_version: self.target_version.clone(),
        }
    }

    fn record_phase(&mut self, phase: DeploymentPhase, percentage: u8, message: String) {
        self.current_phase = phase;
        self.progress_percentage = percentage;
        self.progress_message = message.clone();
        self.phase_history.push(PhaseRecord {
            phase,
            percentage,
            message,
            recorded_at: self.clock.now(),
        });
    }

    fn illegal(&self, operation: &str) -> DomainError {
        DomainError::illegal(format!(
            "cannot {} deployment {} in status {}",
            operation, self.id, self.status
        ))
    }

    fn ensure_not_terminal(&self, operation: &str) -> Result<(), DomainError> {
        if self.is_terminal() {
            return Err(self.illegal(operation));
        }
        Ok(())
    }

    fn ensure_running(&self, operation: &str) -> Result<(), DomainError> {
        if self.status != DeploymentStatus::Running {
            return Err(self.illegal(operation));
        }
        Ok(())
    }

    fn ensure_transition(&self, target: DeploymentStatus, operation: &str) -> Result<(), DomainError> {
        if !self.status.can_transition_to(target) {
            return Err(self.illegal(operation));
        }
        Ok(())
    }
}
