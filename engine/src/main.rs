//! Stackrail - Entry Point
//!
//! Deploys a product described by a JSON manifest through the product
//! orchestrator. Without a container runtime wired in, stacks go through
//! the dry-run runtime and events are written to the log.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use tracing::{error, info};

use stackrail::clock::SharedClock;
use stackrail::config::options::EngineOptions;
use stackrail::config::settings::Settings;
use stackrail::ids::{EnvironmentId, UserId};
use stackrail::logs::init_logging;
use stackrail::orchestrator::dry_run::DryRunRuntime;
use stackrail::orchestrator::manifest::ProductManifest;
use stackrail::orchestrator::product::{project_name, Collaborators, ProductOrchestrator};
use stackrail::ports::StackDefinition;
use stackrail::store::catalog::InMemoryCatalog;
use stackrail::store::deployments::{
    InMemoryDeploymentRepository, InMemoryProductDeploymentRepository,
};
use stackrail::store::publisher::LoggingPublisher;
use stackrail::utils::{parse_cli_args, version_info};

#[tokio::main]
async fn main() {
    let cli_args = parse_cli_args(std::env::args().skip(1));

    // Print version and exit
    if cli_args.contains_key("version") {
        match serde_json::to_string_pretty(&version_info()) {
            Ok(json) => println!("{}", json),
            Err(e) => eprintln!("Failed to render version: {e}"),
        }
        return;
    }

    let settings = match cli_args.get("settings") {
        Some(path) => match Settings::load(&PathBuf::from(path)).await {
            Ok(settings) => settings,
            Err(e) => {
                eprintln!("Unable to read settings file: {e}");
                std::process::exit(2);
            }
        },
        None => Settings::default(),
    };
    let options = EngineOptions::from(&settings);

    // Keep the guard alive so the file writer flushes on exit
    let _guard = match init_logging(options.log.clone()) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Failed to initialize logging: {e}");
            None
        }
    };

    let Some(manifest_path) = cli_args.get("manifest") else {
        eprintln!("Usage: stackrail --manifest=<product.json> [--settings=<settings.json>] [--plan] [--remove]");
        std::process::exit(2);
    };

    if let Err(e) = run(PathBuf::from(manifest_path), &cli_args, options).await {
        error!("{:#}", e);
        std::process::exit(1);
    }
}

async fn run(
    manifest_path: PathBuf,
    cli_args: &std::collections::HashMap<String, String>,
    options: EngineOptions,
) -> anyhow::Result<()> {
    let manifest = ProductManifest::load(&manifest_path)
        .await
        .with_context(|| format!("loading manifest {}", manifest_path.display()))?;

    if cli_args.contains_key("plan") {
        let names: Vec<String> = manifest
            .stacks
            .iter()
            .map(|stack| project_name(&manifest.product_name, &stack.stack_name))
            .collect();
        println!("Deploy order:");
        for (order, name) in names.iter().enumerate() {
            println!("{:>3}. {}", order + 1, name);
        }
        println!("Remove order:");
        for (order, name) in names.iter().rev().enumerate() {
            println!("{:>3}. {}", order + 1, name);
        }
        return Ok(());
    }

    let catalog = Arc::new(InMemoryCatalog::new());
    for stack in &manifest.stacks {
        catalog.insert(StackDefinition {
            stack_id: stack.stack_id.clone(),
            stack_name: stack.stack_name.clone(),
            stack_display_name: stack.stack_display_name.clone(),
            product_name: manifest.product_name.clone(),
            product_display_name: manifest.product_display_name.clone(),
            version: Some(manifest.product_version.clone()),
            services: Vec::new(),
        });
    }

    let deps = Collaborators {
        deployments: Arc::new(InMemoryDeploymentRepository::new()),
        products: Arc::new(InMemoryProductDeploymentRepository::new()),
        catalog,
        runtime: Arc::new(DryRunRuntime::new()),
        publisher: Arc::new(LoggingPublisher),
    };
    let orchestrator = ProductOrchestrator::new(deps, SharedClock::system(), options.orchestrator);

    let environment_id = match cli_args.get("environment") {
        Some(raw) => EnvironmentId::parse(raw)?,
        None => EnvironmentId::new(),
    };
    let request = manifest.into_request(environment_id, UserId::new());

    let product = orchestrator.deploy_product(request).await?;
    info!(
        "Product {} {} finished as {} ({}/{} stacks running)",
        product.product_name(),
        product.product_version(),
        product.status(),
        product.completed_stacks(),
        product.total_stacks()
    );

    let product = if cli_args.contains_key("remove") {
        orchestrator.remove_product(product.id()).await?
    } else {
        product
    };

    println!("{}", serde_json::to_string_pretty(&product)?);
    Ok(())
}
