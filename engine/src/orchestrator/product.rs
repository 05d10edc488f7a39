//! Product orchestrator
//!
//! Walks a product's stacks in order, drives the container runtime for each
//! one, and keeps the `ProductDeployment` and per-stack `Deployment`
//! aggregates in step with what actually happened.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::{debug, error, info, warn};

use crate::clock::SharedClock;
use crate::config::options::OrchestratorOptions;
use crate::domain::{
    DeployedService, Deployment, DeploymentPhase, DeploymentStatus, DeploymentTarget, DomainEvent,
    NewProductDeployment, ProductDeployment, ProductDeploymentStatus, ProductUpgrade,
    StackDeploymentConfig, StackDeploymentStatus,
};
use crate::errors::{DomainError, EngineError};
use crate::ids::{DeploymentId, EnvironmentId, ProductDeploymentId, UserId};
use crate::ports::{
    DeploymentRepository, EventPublisher, ProductDeploymentRepository, StackCatalog,
    StackDeployRequest, StackRuntime,
};

/// What to deploy
#[derive(Debug, Clone)]
pub struct ProductDeployRequest {
    pub environment_id: EnvironmentId,
    pub product_group_id: String,
    pub product_id: String,
    pub product_name: String,
    pub product_display_name: String,
    pub product_version: String,
    pub deployed_by: UserId,
    pub stacks: Vec<StackDeploymentConfig>,
    pub shared_variables: BTreeMap<String, String>,
    /// Falls back to the orchestrator default when unset
    pub continue_on_error: Option<bool>,
}

/// Collaborators the orchestrator works through
#[derive(Clone)]
pub struct Collaborators {
    pub deployments: Arc<dyn DeploymentRepository>,
    pub products: Arc<dyn ProductDeploymentRepository>,
    pub catalog: Arc<dyn StackCatalog>,
    pub runtime: Arc<dyn StackRuntime>,
    pub publisher: Arc<dyn EventPublisher>,
}

/// Whether a run installs or upgrades
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RunKind {
    Install,
    Upgrade,
}

/// Drives product deployments end to end
pub struct ProductOrchestrator {
    deps: Collaborators,
    clock: SharedClock,
    options: OrchestratorOptions,
}

impl ProductOrchestrator {
    pub fn new(deps: Collaborators, clock: SharedClock, options: OrchestratorOptions) -> Self {
        Self { deps, clock, options }
    }

    /// Install a product, stack by stack in deploy order
    pub async fn deploy_product(
        &self,
        request: ProductDeployRequest,
    ) -> Result<ProductDeployment, EngineError> {
        info!(
            "Deploying product {} {} ({} stacks)",
            request.product_name,
            request.product_version,
            request.stacks.len()
        );

        let stacks = self.with_catalog_names(request.stacks).await;
        let product_display_name = self
            .display_name_for(&request.product_display_name, &stacks)
            .await;

        let new_product = NewProductDeployment {
            id: self.deps.products.next_identity(),
            environment_id: request.environment_id,
            product_group_id: request.product_group_id,
            product_id: request.product_id,
            product_name: request.product_name,
            product_display_name,
            product_version: request.product_version,
            deployed_by: request.deployed_by,
            stack_configs: stacks,
            shared_variables: request.shared_variables,
            continue_on_error: request
                .continue_on_error
                .unwrap_or(self.options.continue_on_error),
        };
        let (mut product, events) =
            ProductDeployment::initiate_deployment(new_product, self.clock.clone())?;
        self.deps.products.add(&product).await?;
        self.publish(events).await?;

        self.run_stacks(&mut product, RunKind::Install).await?;
        Ok(product)
    }

    /// Upgrade an installed product to the version described by `request`
    pub async fn upgrade_product(
        &self,
        existing_id: ProductDeploymentId,
        request: ProductDeployRequest,
    ) -> Result<ProductDeployment, EngineError> {
        let existing = self.load_current_product(existing_id).await?;
        info!(
            "Upgrading product {} {} -> {}",
            existing.product_name(),
            existing.product_version(),
            request.product_version
        );

        let stacks = self.with_catalog_names(request.stacks).await;
        let product_display_name = self
            .display_name_for(&request.product_display_name, &stacks)
            .await;
        let upgrade = ProductUpgrade {
            id: self.deps.products.next_identity(),
            environment_id: request.environment_id,
            product_group_id: request.product_group_id,
            product_id: request.product_id,
            product_name: request.product_name,
            product_display_name,
            product_version: request.product_version,
            deployed_by: request.deployed_by,
            target_configs: stacks,
            shared_variables: request.shared_variables,
        };
        let (mut product, events) =
            ProductDeployment::initiate_upgrade(upgrade, &existing, self.clock.clone())?;
        self.deps.products.add(&product).await?;
        self.publish(events).await?;

        self.run_stacks(&mut product, RunKind::Upgrade).await?;
        if product.is_operational() {
            self.retire_dropped_stacks(&existing, &product).await?;
        }
        Ok(product)
    }

    /// Tear a product down, stack by stack in remove order
    pub async fn remove_product(
        &self,
        id: ProductDeploymentId,
    ) -> Result<ProductDeployment, EngineError> {
        let mut product = self.load_current_product(id).await?;
        if product.status() == ProductDeploymentStatus::Removing {
            info!(
                "Resuming removal of product {} {} ({} stacks left)",
                product.product_name(),
                product.product_version(),
                product.total_stacks() - product.removed_stacks()
            );
        } else {
            info!("Removing product {} {}", product.product_name(), product.product_version());
            let events = product.start_removal()?;
            self.save_product(&product, events).await?;
        }

        let names: Vec<String> = product
            .stacks_in_remove_order()
            .iter()
            .filter(|s| s.status() != StackDeploymentStatus::Removed)
            .map(|s| s.stack_name().to_string())
            .collect();

        for name in names {
            let (deployment_id, project_name, status) = match product.stack(&name) {
                Some(stack) => (
                    stack.deployment_id(),
                    stack.deployment_stack_name().map(str::to_string),
                    stack.status(),
                ),
                None => continue,
            };

            if let Some(project_name) = &project_name {
                if let Err(e) = self
                    .deps
                    .runtime
                    .remove_stack(product.environment_id(), project_name)
                    .await
                {
                    error!("Failed to remove stack {}: {}", name, e);
                    if status != StackDeploymentStatus::Failed {
                        let events = product.fail_stack(&name, &e.to_string())?;
                        self.save_product(&product, events).await?;
                    }
                    continue;
                }
            }

            if let Some(deployment_id) = deployment_id {
                if let Some(mut deployment) = self.load_deployment(deployment_id).await? {
                    if deployment.can_transition_to(DeploymentStatus::Removed) {
                        let events = deployment.mark_as_removed()?;
                        self.save_deployment(&deployment, events).await?;
                    } else {
                        warn!(
                            "Deployment {} of stack {} is {}, leaving it in place",
                            deployment_id,
                            name,
                            deployment.status()
                        );
                    }
                }
            }

            let events = product.mark_stack_removed(&name)?;
            self.save_product(&product, events).await?;
            debug!("Stack {} removed", name);
        }

        if product.is_terminal() {
            info!("Product {} removed", product.product_name());
        } else {
            warn!(
                "Product {} still has {} stacks that could not be removed",
                product.product_name(),
                product.failed_stacks()
            );
        }
        Ok(product)
    }

    async fn run_stacks(
        &self,
        product: &mut ProductDeployment,
        kind: RunKind,
    ) -> Result<(), EngineError> {
        let names: Vec<String> = product
            .stacks_in_deploy_order()
            .iter()
            .map(|s| s.stack_name().to_string())
            .collect();
        let mut aborted = false;

        for name in names {
            if !self.deploy_stack(product, &name, kind).await? && !product.continue_on_error() {
                warn!("Stack {} failed, aborting remaining stacks", name);
                aborted = true;
                break;
            }
        }

        if !product.is_in_progress() {
            info!(
                "Product {} {} is {}",
                product.product_name(),
                product.product_version(),
                product.status()
            );
            return Ok(());
        }

        let failed: Vec<String> = product
            .stacks()
            .iter()
            .filter(|s| s.error_message().is_some())
            .map(|s| s.stack_name().to_string())
            .collect();
        let events = if !aborted && product.completed_stacks() > 0 {
            let reason = format!(
                "{} of {} stacks failed: {}",
                failed.len(),
                product.total_stacks(),
                failed.join(", ")
            );
            product.mark_as_partially_running(&reason)?
        } else {
            let message = if aborted {
                format!("Deployment aborted after failure of {}", failed.join(", "))
            } else {
                format!("All stacks failed: {}", failed.join(", "))
            };
            product.mark_as_failed(&message)?
        };
        self.save_product(product, events).await?;

        warn!(
            "Product {} {} finished as {}",
            product.product_name(),
            product.product_version(),
            product.status()
        );
        Ok(())
    }

    /// Deploy one stack; returns whether it ended up running
    async fn deploy_stack(
        &self,
        product: &mut ProductDeployment,
        name: &str,
        kind: RunKind,
    ) -> Result<bool, EngineError> {
        let stack = match product.stack(name) {
            Some(stack) => stack.clone(),
            None => return Ok(false),
        };
        let project_name = project_name(product.product_name(), stack.stack_name());
        let variables = product.effective_variables(name).unwrap_or_default();
        let version = product.product_version().to_string();

        let (mut deployment, previous_version) = match self
            .begin_deployment(product, stack.stack_id(), &project_name, kind)
            .await
        {
            Ok(started) => started,
            Err(EngineError::Domain(e)) => {
                error!("Cannot start deployment of stack {}: {}", name, e);
                let events = product.fail_stack(name, &e.to_string())?;
                self.save_product(product, events).await?;
                return Ok(false);
            }
            Err(e) => return Err(e),
        };
        let reentered = deployment.status() == DeploymentStatus::Upgrading;
        deployment.set_variables(variables.clone())?;
        self.deps.deployments.update(&deployment).await?;

        let events = product.start_stack(name, deployment.id(), &project_name)?;
        self.save_product(product, events).await?;

        let events = deployment.update_progress(
            DeploymentPhase::StartingServices,
            50,
            format!("Starting services of {}", project_name),
        )?;
        self.save_deployment(&deployment, events).await?;

        let request = StackDeployRequest {
            deployment_id: deployment.id(),
            environment_id: product.environment_id(),
            stack_id: stack.stack_id().to_string(),
            stack_name: stack.stack_name().to_string(),
            project_name: project_name.clone(),
            version: version.clone(),
            variables,
        };

        match self.deps.runtime.deploy_stack(&request).await {
            Ok(services) => {
                let mut events = Vec::new();
                if reentered {
                    events.extend(deployment.update_progress(
                        DeploymentPhase::RemovingOldContainers,
                        80,
                        format!("Replacing services of {}", project_name),
                    )?);
                } else {
                    for service in &services {
                        events.extend(deployment.add_service(
                            service.service_name.as_str(),
                            service.image.clone(),
                            service.status.as_str(),
                        )?);
                        events.extend(deployment.set_service_container_info(
                            &service.service_name,
                            service.container_id.as_str(),
                            service.container_name.as_str(),
                            service.status.as_str(),
                        )?);
                    }
                    deployment.set_stack_version(version.as_str())?;
                }
                if deployment.is_overdue(self.options.expected_stack_duration) {
                    warn!(
                        "Stack {} took {}s, longer than expected",
                        name,
                        deployment.elapsed_time().num_seconds()
                    );
                }
                events.extend(deployment.update_progress(
                    DeploymentPhase::Finalizing,
                    90,
                    format!("{} services started", services.len()),
                )?);
                events.extend(deployment.mark_as_running()?);
                if reentered {
                    let observed = services
                        .iter()
                        .map(|s| {
                            DeployedService::new(s.service_name.as_str(), s.image.clone(), s.status.as_str())
                                .map(|d| d.with_container(s.container_id.as_str(), s.container_name.as_str()))
                        })
                        .collect::<Result<Vec<_>, _>>()?;
                    events.extend(deployment.update_services_after_upgrade(observed)?);
                    if let Some(previous) = previous_version.filter(|p| *p != version) {
                        events.extend(deployment.record_upgrade(previous, version.as_str())?);
                    }
                }
                self.save_deployment(&deployment, events).await?;

                let events = product.complete_stack(name)?;
                self.save_product(product, events).await?;
                info!("Stack {} running ({} services)", name, services.len());
                Ok(true)
            }
            Err(e) => {
                error!("Stack {} failed: {}", name, e);
                let message = e.to_string();
                let events = deployment.mark_as_failed(message.as_str())?;
                self.save_deployment(&deployment, events).await?;

                let events = product.fail_stack(name, &message)?;
                self.save_product(product, events).await?;
                Ok(false)
            }
        }
    }

    /// Create or re-enter the `Deployment` for one stack.
    ///
    /// Returns the deployment and, for upgrades of an existing stack, the
    /// version it was running before.
    async fn begin_deployment(
        &self,
        product: &ProductDeployment,
        stack_id: &str,
        project_name: &str,
        kind: RunKind,
    ) -> Result<(Deployment, Option<String>), EngineError> {
        let version = product.product_version();
        if kind == RunKind::Upgrade {
            let existing = self
                .find_stack_deployment(product.environment_id(), project_name)
                .await?;
            if let Some(mut deployment) = existing {
                let previous = deployment.stack_version().map(str::to_string);
                let events = match deployment.status() {
                    DeploymentStatus::Failed if deployment.rollback_target_version() == Some(version) => {
                        info!("Rolling failed stack {} back to {}", project_name, version);
                        deployment.start_rollback_process(version)?
                    }
                    DeploymentStatus::Failed => {
                        info!(
                            "Retrying failed stack {} at {} (last good version: {})",
                            project_name,
                            version,
                            deployment.stack_version().unwrap_or("none")
                        );
                        deployment.start_retry_process(version)?
                    }
                    _ => deployment.start_upgrade_process(version)?,
                };
                self.save_deployment(&deployment, events).await?;
                return Ok((deployment, previous));
            }
        }

        let target = DeploymentTarget {
            id: self.deps.deployments.next_identity(),
            environment_id: product.environment_id(),
            stack_id: stack_id.to_string(),
            stack_name: project_name.to_string(),
            project_name: project_name.to_string(),
            deployed_by: product.deployed_by(),
        };
        let (deployment, events) = Deployment::start_installation(target, self.clock.clone())?;
        self.deps.deployments.add(&deployment).await?;
        self.publish(events).await?;
        Ok((deployment, None))
    }

    /// Remove stacks the previous version had and the new one dropped
    async fn retire_dropped_stacks(
        &self,
        existing: &ProductDeployment,
        upgraded: &ProductDeployment,
    ) -> Result<(), EngineError> {
        for stack in existing.stacks_in_remove_order() {
            if upgraded.stack(stack.stack_name()).is_some() {
                continue;
            }
            let project_name = project_name(existing.product_name(), stack.stack_name());
            info!("Retiring stack {} dropped by upgrade", project_name);

            if let Err(e) = self
                .deps
                .runtime
                .remove_stack(existing.environment_id(), &project_name)
                .await
            {
                error!("Failed to retire stack {}: {}", project_name, e);
                continue;
            }
            if let Some(mut deployment) = self
                .find_stack_deployment(existing.environment_id(), &project_name)
                .await?
            {
                if deployment.can_transition_to(DeploymentStatus::Removed) {
                    let events = deployment.mark_as_removed()?;
                    self.save_deployment(&deployment, events).await?;
                }
            }
        }
        Ok(())
    }

    async fn with_catalog_names(&self, stacks: Vec<StackDeploymentConfig>) -> Vec<StackDeploymentConfig> {
        let mut resolved = Vec::with_capacity(stacks.len());
        for mut config in stacks {
            if config.stack_display_name.trim().is_empty() {
                if let Some(definition) = self.deps.catalog.get_stack(&config.stack_id).await {
                    config.stack_display_name = if definition.stack_display_name.is_empty() {
                        definition.stack_name
                    } else {
                        definition.stack_display_name
                    };
                }
            }
            resolved.push(config);
        }
        resolved
    }

    async fn display_name_for(&self, requested: &str, stacks: &[StackDeploymentConfig]) -> String {
        if !requested.trim().is_empty() {
            return requested.to_string();
        }
        for config in stacks {
            if let Some(definition) = self.deps.catalog.get_stack(&config.stack_id).await {
                return definition.product_display_name;
            }
        }
        String::new()
    }

    async fn load_deployment(&self, id: DeploymentId) -> Result<Option<Deployment>, EngineError> {
        Ok(self
            .deps
            .deployments
            .get(id)
            .await?
            .map(|d| d.with_clock(self.clock.clone())))
    }

    async fn find_stack_deployment(
        &self,
        environment_id: EnvironmentId,
        project_name: &str,
    ) -> Result<Option<Deployment>, EngineError> {
        Ok(self
            .deps
            .deployments
            .get_by_stack_name(environment_id, project_name)
            .await?
            .map(|d| d.with_clock(self.clock.clone())))
    }

    async fn load_product(&self, id: ProductDeploymentId) -> Result<ProductDeployment, EngineError> {
        self.deps
            .products
            .get(id)
            .await?
            .map(|p| p.with_clock(self.clock.clone()))
            .ok_or_else(|| EngineError::NotFound(format!("product deployment {}", id)))
    }

    /// Load a product record, refusing one that a later upgrade superseded
    async fn load_current_product(
        &self,
        id: ProductDeploymentId,
    ) -> Result<ProductDeployment, EngineError> {
        let product = self.load_product(id).await?;
        let active = self
            .deps
            .products
            .get_active_for_product(product.environment_id(), product.product_group_id())
            .await?;
        match active {
            Some(active) if active.id() != product.id() => {
                Err(EngineError::Domain(DomainError::illegal(format!(
                    "product deployment {} was superseded by {} ({})",
                    product.id(),
                    active.id(),
                    active.product_version()
                ))))
            }
            _ => Ok(product),
        }
    }

    async fn save_product<E: Into<DomainEvent>>(
        &self,
        product: &ProductDeployment,
        events: Vec<E>,
    ) -> Result<(), EngineError> {
        self.deps.products.update(product).await?;
        self.publish(events).await
    }

    async fn save_deployment<E: Into<DomainEvent>>(
        &self,
        deployment: &Deployment,
        events: Vec<E>,
    ) -> Result<(), EngineError> {
        self.deps.deployments.update(deployment).await?;
        self.publish(events).await
    }

    async fn publish<E: Into<DomainEvent>>(&self, events: Vec<E>) -> Result<(), EngineError> {
        if events.is_empty() {
            return Ok(());
        }
        let now = self.clock.now();
        let envelopes = events
            .into_iter()
            .map(|e| {
                let event: DomainEvent = e.into();
                event.to_envelope(now)
            })
            .collect::<Result<Vec<_>, _>>()?;
        self.deps.publisher.publish(envelopes).await
    }
}

/// Name under which a product's stack runs in the container engine
pub fn project_name(product_name: &str, stack_name: &str) -> String {
    format!("{}-{}", product_name, stack_name)
        .to_lowercase()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '-' })
        .collect()
}
