//! Product deployment lifecycle
//!
//! A product is an ordered group of stacks deployed, upgraded and removed as
//! one unit. The aggregate tracks one [`StackDeployment`] per stack and
//! derives its own status from their outcomes:
//!
//! ```text
//! Deploying        -> Running | PartiallyRunning | Failed
//! Running          -> Upgrading | Removing
//! PartiallyRunning -> Upgrading | Removing
//! Upgrading        -> Running | PartiallyRunning | Failed
//! Failed           -> Upgrading | Removing
//! Removing         -> Removed
//! Removed          (terminal)
//! ```
//!
//! Stacks are installed in ascending `order` and torn down in the exact
//! reverse. The aggregate only declares that ordering; the orchestrator
//! decides how to walk it.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::clock::SharedClock;
use crate::domain::events::ProductDeploymentEvent;
use crate::domain::phase::ProductPhaseRecord;
use crate::domain::stack::{StackDeployment, StackDeploymentConfig, StackDeploymentStatus};
use crate::errors::{require_non_empty, DomainError};
use crate::ids::{DeploymentId, EnvironmentId, ProductDeploymentId, UserId};

/// Product deployment status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductDeploymentStatus {
    Deploying,
    Running,
    PartiallyRunning,
    Upgrading,
    Failed,
    Removing,
    Removed,
}

impl ProductDeploymentStatus {
    pub const ALL: [ProductDeploymentStatus; 7] = [
        ProductDeploymentStatus::Deploying,
        ProductDeploymentStatus::Running,
        ProductDeploymentStatus::PartiallyRunning,
        ProductDeploymentStatus::Upgrading,
        ProductDeploymentStatus::Failed,
        ProductDeploymentStatus::Removing,
        ProductDeploymentStatus::Removed,
    ];

    pub fn is_operational(&self) -> bool {
        matches!(
            self,
            ProductDeploymentStatus::Running | ProductDeploymentStatus::PartiallyRunning
        )
    }

    pub fn is_in_progress(&self) -> bool {
        matches!(
            self,
            ProductDeploymentStatus::Deploying | ProductDeploymentStatus::Upgrading
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ProductDeploymentStatus::Removed)
    }

    pub fn can_transition_to(&self, target: ProductDeploymentStatus) -> bool {
        use ProductDeploymentStatus::*;
        matches!(
            (self, target),
            (Deploying, Running)
                | (Deploying, PartiallyRunning)
                | (Deploying, Failed)
                | (Running, Upgrading)
                | (Running, Removing)
                | (PartiallyRunning, Upgrading)
                | (PartiallyRunning, Removing)
                | (Upgrading, Running)
                | (Upgrading, PartiallyRunning)
                | (Upgrading, Failed)
                | (Failed, Upgrading)
                | (Failed, Removing)
                | (Removing, Removed)
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ProductDeploymentStatus::Deploying => "deploying",
            ProductDeploymentStatus::Running => "running",
            ProductDeploymentStatus::PartiallyRunning => "partially_running",
            ProductDeploymentStatus::Upgrading => "upgrading",
            ProductDeploymentStatus::Failed => "failed",
            ProductDeploymentStatus::Removing => "removing",
            ProductDeploymentStatus::Removed => "removed",
        }
    }
}

impl std::fmt::Display for ProductDeploymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Input for a first-time product install
#[derive(Debug, Clone)]
pub struct NewProductDeployment {
    pub id: ProductDeploymentId,
    pub environment_id: EnvironmentId,
    pub product_group_id: String,
    pub product_id: String,
    pub product_name: String,
    pub product_display_name: String,
    pub product_version: String,
    pub deployed_by: UserId,
    /// One entry per stack, in install order
    pub stack_configs: Vec<StackDeploymentConfig>,
    pub shared_variables: BTreeMap<String, String>,
    /// Keep going after a stack fails instead of aborting
    pub continue_on_error: bool,
}

/// Input for upgrading (or rolling back) an installed product
#[derive(Debug, Clone)]
pub struct ProductUpgrade {
    pub id: ProductDeploymentId,
    pub environment_id: EnvironmentId,
    pub product_group_id: String,
    pub product_id: String,
    pub product_name: String,
    pub product_display_name: String,
    pub product_version: String,
    pub deployed_by: UserId,
    /// Stack set of the target version, in install order
    pub target_configs: Vec<StackDeploymentConfig>,
    pub shared_variables: BTreeMap<String, String>,
}

/// An ordered group of stacks deployed as one unit
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductDeployment {
    id: ProductDeploymentId,
    environment_id: EnvironmentId,
    product_group_id: String,
    product_id: String,
    product_name: String,
    product_display_name: String,
    product_version: String,
    deployed_by: UserId,
    status: ProductDeploymentStatus,
    created_at: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,
    error_message: Option<String>,
    continue_on_error: bool,
    shared_variables: BTreeMap<String, String>,
    previous_version: Option<String>,
    upgrade_count: u32,
    last_upgraded_at: Option<DateTime<Utc>>,
    stacks: Vec<StackDeployment>,
    phase_history: Vec<ProductPhaseRecord>,
    #[serde(skip)]
    clock: SharedClock,
}

fn validate_stack_configs(configs: &[StackDeploymentConfig]) -> Result<(), DomainError> {
    if configs.is_empty() {
        return Err(DomainError::validation(
            "a product deployment needs at least one stack",
        ));
    }
    for (i, config) in configs.iter().enumerate() {
        config.validate()?;
        if configs[..i]
            .iter()
            .any(|c| c.stack_name.eq_ignore_ascii_case(&config.stack_name))
        {
            return Err(DomainError::validation(format!(
                "duplicate stack name '{}'",
                config.stack_name
            )));
        }
    }
    Ok(())
}

impl ProductDeployment {
    /// Start installing a product from its stack configs
    pub fn initiate_deployment(
        request: NewProductDeployment,
        clock: SharedClock,
    ) -> Result<(Self, Vec<ProductDeploymentEvent>), DomainError> {
        require_non_empty(&request.product_id, "product id")?;
        require_non_empty(&request.product_name, "product name")?;
        require_non_empty(&request.product_version, "product version")?;
        validate_stack_configs(&request.stack_configs)?;

        let stacks = request
            .stack_configs
            .into_iter()
            .enumerate()
            .map(|(order, config)| StackDeployment::new(config, order, false))
            .collect();

        let mut product = Self {
            id: request.id,
            environment_id: request.environment_id,
            product_group_id: request.product_group_id,
            product_id: request.product_id,
            product_name: request.product_name,
            product_display_name: request.product_display_name,
            product_version: request.product_version,
            deployed_by: request.deployed_by,
            status: ProductDeploymentStatus::Deploying,
            created_at: clock.now(),
            completed_at: None,
            error_message: None,
            continue_on_error: request.continue_on_error,
            shared_variables: request.shared_variables,
            previous_version: None,
            upgrade_count: 0,
            last_upgraded_at: None,
            stacks,
            phase_history: Vec::new(),
            clock,
        };
        product.record_phase(
            "initiated",
            format!(
                "Deployment of {} {} initiated with {} stacks",
                product.product_name,
                product.product_version,
                product.stacks.len()
            ),
        );

        let event = ProductDeploymentEvent::ProductDeploymentInitiated {
            product_deployment_id: product.id,
            environment_id: product.environment_id,
            product_name: product.product_name.clone(),
            product_version: product.product_version.clone(),
            total_stacks: product.stacks.len(),
        };
        Ok((product, vec![event]))
    }

    /// Start upgrading an operational product to a new version.
    ///
    /// Produces a new aggregate in `Upgrading`; stacks the existing product
    /// does not have are flagged `is_new_in_upgrade`.
    pub fn initiate_upgrade(
        request: ProductUpgrade,
        existing: &ProductDeployment,
        clock: SharedClock,
    ) -> Result<(Self, Vec<ProductDeploymentEvent>), DomainError> {
        if !existing.can_upgrade() {
            return Err(DomainError::illegal(format!(
                "cannot upgrade product deployment {} in status {}",
                existing.id, existing.status
            )));
        }
        Self::upgrade_from(request, existing, "upgrade_initiated", clock)
    }

    /// Start rolling a failed upgrade back to the product's previous version
    pub fn initiate_rollback(
        request: ProductUpgrade,
        existing: &ProductDeployment,
        clock: SharedClock,
    ) -> Result<(Self, Vec<ProductDeploymentEvent>), DomainError> {
        if !existing.can_rollback() {
            return Err(DomainError::illegal(format!(
                "cannot roll back product deployment {} in status {}",
                existing.id, existing.status
            )));
        }
        if existing.previous_version.as_deref() != Some(request.product_version.as_str()) {
            return Err(DomainError::validation(format!(
                "rollback target {} does not match previous version {}",
                request.product_version,
                existing.previous_version.as_deref().unwrap_or("-")
            )));
        }
        Self::upgrade_from(request, existing, "rollback_initiated", clock)
    }

    fn upgrade_from(
        request: ProductUpgrade,
        existing: &ProductDeployment,
        phase: &str,
        clock: SharedClock,
    ) -> Result<(Self, Vec<ProductDeploymentEvent>), DomainError> {
        require_non_empty(&request.product_id, "product id")?;
        require_non_empty(&request.product_name, "product name")?;
        require_non_empty(&request.product_version, "product version")?;
        validate_stack_configs(&request.target_configs)?;
        if request.environment_id != existing.environment_id {
            return Err(DomainError::validation(
                "an upgrade must target the environment of the existing deployment",
            ));
        }

        let stacks: Vec<StackDeployment> = request
            .target_configs
            .into_iter()
            .enumerate()
            .map(|(order, config)| {
                let is_new = existing.stack(&config.stack_name).is_none();
                StackDeployment::new(config, order, is_new)
            })
            .collect();
        let new_stacks = stacks.iter().filter(|s| s.is_new_in_upgrade()).count();

        let mut product = Self {
            id: request.id,
            environment_id: request.environment_id,
            product_group_id: request.product_group_id,
            product_id: request.product_id,
            product_name: request.product_name,
            product_display_name: request.product_display_name,
            product_version: request.product_version,
            deployed_by: request.deployed_by,
            status: ProductDeploymentStatus::Upgrading,
            created_at: clock.now(),
            completed_at: None,
            error_message: None,
            continue_on_error: existing.continue_on_error,
            shared_variables: request.shared_variables,
            previous_version: Some(existing.product_version.clone()),
            upgrade_count: existing.upgrade_count + 1,
            last_upgraded_at: existing.last_upgraded_at,
            stacks,
            phase_history: Vec::new(),
            clock,
        };
        product.record_phase(
            phase,
            format!(
                "{} {} -> {} ({} new stacks)",
                product.product_name,
                existing.product_version,
                product.product_version,
                new_stacks
            ),
        );

        let event = ProductDeploymentEvent::ProductUpgradeInitiated {
            product_deployment_id: product.id,
            environment_id: product.environment_id,
            product_name: product.product_name.clone(),
            previous_version: existing.product_version.clone(),
            new_version: product.product_version.clone(),
            total_stacks: product.stacks.len(),
            new_stacks,
        };
        Ok((product, vec![event]))
    }

    /// Replace the clock, e.g. after loading from storage
    pub fn with_clock(mut self, clock: SharedClock) -> Self {
        self.clock = clock;
        self
    }

    // ---------------------------------------------------------------------
    // Accessors
    // ---------------------------------------------------------------------

    pub fn id(&self) -> ProductDeploymentId {
        self.id
    }

    pub fn environment_id(&self) -> EnvironmentId {
        self.environment_id
    }

    pub fn product_group_id(&self) -> &str {
        &self.product_group_id
    }

    pub fn product_id(&self) -> &str {
        &self.product_id
    }

    pub fn product_name(&self) -> &str {
        &self.product_name
    }

    pub fn product_display_name(&self) -> &str {
        &self.product_display_name
    }

    pub fn product_version(&self) -> &str {
        &self.product_version
    }

    pub fn deployed_by(&self) -> UserId {
        self.deployed_by
    }

    pub fn status(&self) -> ProductDeploymentStatus {
        self.status
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.completed_at
    }

    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }

    pub fn continue_on_error(&self) -> bool {
        self.continue_on_error
    }

    pub fn shared_variables(&self) -> &BTreeMap<String, String> {
        &self.shared_variables
    }

    pub fn previous_version(&self) -> Option<&str> {
        self.previous_version.as_deref()
    }

    pub fn upgrade_count(&self) -> u32 {
        self.upgrade_count
    }

    pub fn last_upgraded_at(&self) -> Option<DateTime<Utc>> {
        self.last_upgraded_at
    }

    pub fn stacks(&self) -> &[StackDeployment] {
        &self.stacks
    }

    pub fn phase_history(&self) -> &[ProductPhaseRecord] {
        &self.phase_history
    }

    /// Case-insensitive lookup by stack name
    pub fn stack(&self, name: &str) -> Option<&StackDeployment> {
        self.stacks.iter().find(|s| s.matches_name(name))
    }

    /// Shared variables overlaid with the stack's own
    pub fn effective_variables(&self, stack_name: &str) -> Option<BTreeMap<String, String>> {
        let stack = self.stack(stack_name)?;
        let mut merged = self.shared_variables.clone();
        merged.extend(
            stack
                .variables()
                .iter()
                .map(|(k, v)| (k.clone(), v.clone())),
        );
        Some(merged)
    }

    pub fn total_stacks(&self) -> usize {
        self.stacks.len()
    }

    pub fn completed_stacks(&self) -> usize {
        self.count_stacks(StackDeploymentStatus::Running)
    }

    pub fn failed_stacks(&self) -> usize {
        self.count_stacks(StackDeploymentStatus::Failed)
    }

    pub fn pending_stacks(&self) -> usize {
        self.count_stacks(StackDeploymentStatus::Pending)
    }

    pub fn removed_stacks(&self) -> usize {
        self.count_stacks(StackDeploymentStatus::Removed)
    }

    fn count_stacks(&self, status: StackDeploymentStatus) -> usize {
        self.stacks.iter().filter(|s| s.status() == status).count()
    }

    /// Share of stacks running, 0-100
    pub fn progress_percentage(&self) -> u8 {
        if self.stacks.is_empty() {
            return 0;
        }
        ((self.completed_stacks() * 100) / self.stacks.len()) as u8
    }

    pub fn is_operational(&self) -> bool {
        self.status.is_operational()
    }

    pub fn is_in_progress(&self) -> bool {
        self.status.is_in_progress()
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    pub fn can_upgrade(&self) -> bool {
        self.is_operational()
    }

    pub fn can_remove(&self) -> bool {
        matches!(
            self.status,
            ProductDeploymentStatus::Running
                | ProductDeploymentStatus::PartiallyRunning
                | ProductDeploymentStatus::Failed
        )
    }

    pub fn can_rollback(&self) -> bool {
        self.status == ProductDeploymentStatus::Failed && self.previous_version.is_some()
    }

    pub fn can_transition_to(&self, target: ProductDeploymentStatus) -> bool {
        self.status.can_transition_to(target)
    }

    /// Ascending by order: the install sequence
    pub fn stacks_in_deploy_order(&self) -> Vec<&StackDeployment> {
        let mut stacks: Vec<&StackDeployment> = self.stacks.iter().collect();
        stacks.sort_by_key(|s| s.order());
        stacks
    }

    /// Descending by order: the exact reverse of the install sequence
    pub fn stacks_in_remove_order(&self) -> Vec<&StackDeployment> {
        let mut stacks = self.stacks_in_deploy_order();
        stacks.reverse();
        stacks
    }

    /// First stack in deploy order still waiting to be started
    pub fn next_pending_stack(&self) -> Option<&StackDeployment> {
        self.stacks_in_deploy_order()
            .into_iter()
            .find(|s| s.status() == StackDeploymentStatus::Pending)
    }

    /// Wall time of the run, `None` until it finished
    pub fn duration(&self) -> Option<Duration> {
        self.completed_at.map(|done| done - self.created_at)
    }

    // ---------------------------------------------------------------------
    // Per-stack drivers
    // ---------------------------------------------------------------------

    pub fn start_stack(
        &mut self,
        name: &str,
        deployment_id: DeploymentId,
        deployment_stack_name: &str,
    ) -> Result<Vec<ProductDeploymentEvent>, DomainError> {
        self.ensure_in_progress("start stack")?;
        let now = self.clock.now();
        let index = self.stack_index(name)?;
        self.stacks[index].start(deployment_id, deployment_stack_name, now)?;

        let stack_name = self.stacks[index].stack_name().to_string();
        let stack_index = self.stacks[index].order();
        self.record_phase("stack_started", format!("Stack {} started", stack_name));

        Ok(vec![ProductDeploymentEvent::ProductStackDeploymentStarted {
            product_deployment_id: self.id,
            stack_name,
            deployment_id,
            stack_index,
            total_stacks: self.stacks.len(),
        }])
    }

    pub fn complete_stack(&mut self, name: &str) -> Result<Vec<ProductDeploymentEvent>, DomainError> {
        self.ensure_in_progress("complete stack")?;
        let now = self.clock.now();
        let index = self.stack_index(name)?;
        self.stacks[index].complete(now)?;

        let stack_name = self.stacks[index].stack_name().to_string();
        self.record_phase("stack_completed", format!("Stack {} running", stack_name));
        let mut events = vec![ProductDeploymentEvent::ProductStackDeploymentCompleted {
            product_deployment_id: self.id,
            stack_name,
            completed_stacks: self.completed_stacks(),
            total_stacks: self.stacks.len(),
        }];

        if self
            .stacks
            .iter()
            .all(|s| s.status() == StackDeploymentStatus::Running)
        {
            if self.status == ProductDeploymentStatus::Upgrading {
                self.last_upgraded_at = Some(now);
            }
            self.status = ProductDeploymentStatus::Running;
            self.completed_at = Some(now);
            self.error_message = None;
            self.record_phase(
                "completed",
                format!("All {} stacks running", self.stacks.len()),
            );
            events.push(ProductDeploymentEvent::ProductDeploymentCompleted {
                product_deployment_id: self.id,
                product_name: self.product_name.clone(),
                product_version: self.product_version.clone(),
                total_stacks: self.stacks.len(),
            });
        }
        Ok(events)
    }

    /// Record a stack failure. The product status is left alone: the caller
    /// decides between `mark_as_partially_running` and `mark_as_failed`.
    pub fn fail_stack(
        &mut self,
        name: &str,
        message: &str,
    ) -> Result<Vec<ProductDeploymentEvent>, DomainError> {
        if !self.is_in_progress() && self.status != ProductDeploymentStatus::Removing {
            return Err(self.illegal("fail stack"));
        }
        let now = self.clock.now();
        let index = self.stack_index(name)?;
        self.stacks[index].fail(message, now)?;

        let stack_name = self.stacks[index].stack_name().to_string();
        self.record_phase(
            "stack_failed",
            format!("Stack {} failed: {}", stack_name, message),
        );
        Ok(vec![ProductDeploymentEvent::ProductStackDeploymentFailed {
            product_deployment_id: self.id,
            stack_name,
            error_message: message.to_string(),
        }])
    }

    /// Put a failed stack back in the pending lane for another attempt
    pub fn retry_stack(&mut self, name: &str) -> Result<(), DomainError> {
        self.ensure_in_progress("retry stack")?;
        let index = self.stack_index(name)?;
        if self.stacks[index].status() != StackDeploymentStatus::Failed {
            return Err(DomainError::illegal(format!(
                "stack '{}' is {} and cannot be retried",
                self.stacks[index].stack_name(),
                self.stacks[index].status()
            )));
        }
        self.stacks[index].reset_to_pending();
        let stack_name = self.stacks[index].stack_name().to_string();
        self.record_phase("stack_retry", format!("Stack {} queued for retry", stack_name));
        Ok(())
    }

    // ---------------------------------------------------------------------
    // Aggregate outcome
    // ---------------------------------------------------------------------

    pub fn mark_as_partially_running(
        &mut self,
        reason: &str,
    ) -> Result<Vec<ProductDeploymentEvent>, DomainError> {
        self.ensure_in_progress("mark as partially running")?;
        require_non_empty(reason, "reason")?;
        let running_count = self.completed_stacks();
        if running_count == 0 {
            return Err(DomainError::illegal(format!(
                "product deployment {} has no running stacks",
                self.id
            )));
        }
        let failed_count = self.failed_stacks();

        self.status = ProductDeploymentStatus::PartiallyRunning;
        self.completed_at = Some(self.clock.now());
        self.error_message = Some(reason.to_string());
        self.record_phase("partially_running", reason.to_string());

        Ok(vec![
            ProductDeploymentEvent::ProductDeploymentPartiallyCompleted {
                product_deployment_id: self.id,
                running_count,
                failed_count,
                reason: reason.to_string(),
            },
        ])
    }

    pub fn mark_as_failed(&mut self, message: &str) -> Result<Vec<ProductDeploymentEvent>, DomainError> {
        self.ensure_in_progress("mark as failed")?;
        require_non_empty(message, "error message")?;

        self.status = ProductDeploymentStatus::Failed;
        self.completed_at = Some(self.clock.now());
        self.error_message = Some(message.to_string());
        self.record_phase("failed", message.to_string());

        Ok(vec![ProductDeploymentEvent::ProductDeploymentFailed {
            product_deployment_id: self.id,
            completed_count: self.completed_stacks(),
            failed_count: self.failed_stacks(),
            error_message: message.to_string(),
        }])
    }

    // ---------------------------------------------------------------------
    // Removal
    // ---------------------------------------------------------------------

    /// Enter `Removing`; every stack goes back to `Pending` so teardown
    /// re-uses the pending lane
    pub fn start_removal(&mut self) -> Result<Vec<ProductDeploymentEvent>, DomainError> {
        if !self.can_remove() {
            return Err(self.illegal("start removal"));
        }
        for stack in &mut self.stacks {
            stack.reset_to_pending();
        }
        self.status = ProductDeploymentStatus::Removing;
        self.completed_at = None;
        self.error_message = None;
        self.record_phase(
            "removal_started",
            format!("Removing {} stacks", self.stacks.len()),
        );

        Ok(vec![ProductDeploymentEvent::ProductRemovalInitiated {
            product_deployment_id: self.id,
            total_stacks: self.stacks.len(),
        }])
    }

    pub fn mark_stack_removed(&mut self, name: &str) -> Result<Vec<ProductDeploymentEvent>, DomainError> {
        if self.status != ProductDeploymentStatus::Removing {
            return Err(self.illegal("mark stack removed"));
        }
        let index = self.stack_index(name)?;
        if self.stacks[index].status() == StackDeploymentStatus::Removed {
            return Err(DomainError::illegal(format!(
                "stack '{}' is already removed",
                self.stacks[index].stack_name()
            )));
        }
        let now = self.clock.now();
        self.stacks[index].mark_removed(now);

        let stack_name = self.stacks[index].stack_name().to_string();
        let remaining_stacks = self.stacks.len() - self.count_stacks(StackDeploymentStatus::Removed);
        self.record_phase("stack_removed", format!("Stack {} removed", stack_name));
        let mut events = vec![ProductDeploymentEvent::ProductStackRemoved {
            product_deployment_id: self.id,
            stack_name,
            remaining_stacks,
        }];

        if remaining_stacks == 0 {
            self.status = ProductDeploymentStatus::Removed;
            self.completed_at = Some(now);
            self.record_phase("removed", "All stacks removed".to_string());
            events.push(ProductDeploymentEvent::ProductDeploymentRemoved {
                product_deployment_id: self.id,
                product_name: self.product_name.clone(),
            });
        }
        Ok(events)
    }

    // ---------------------------------------------------------------------
    // Helpers
    // ---------------------------------------------------------------------

    fn stack_index(&self, name: &str) -> Result<usize, DomainError> {
        self.stacks
            .iter()
            .position(|s| s.matches_name(name))
            .ok_or_else(|| {
                DomainError::illegal(format!(
                    "product deployment {} has no stack named '{}'",
                    self.id, name
                ))
            })
    }

    fn record_phase(&mut self, phase: &str, message: String) {
        self.phase_history.push(ProductPhaseRecord {
            phase: phase.to_string(),
            message,
            recorded_at: self.clock.now(),
        });
    }

    fn illegal(&self, operation: &str) -> DomainError {
        DomainError::illegal(format!(
            "cannot {} on product deployment {} in status {}",
            operation, self.id, self.status
        ))
    }

    fn ensure_in_progress(&self, operation: &str) -> Result<(), DomainError> {
        if !self.is_in_progress() {
            return Err(self.illegal(operation));
        }
        Ok(())
    }
}
