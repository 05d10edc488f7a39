//! Orchestration on top of the aggregates

pub mod dry_run;
pub mod manifest;
pub mod product;

pub use dry_run::DryRunRuntime;
pub use manifest::ProductManifest;
pub use product::{project_name, Collaborators, ProductDeployRequest, ProductOrchestrator};
