//! Domain layer: pure types, validation and selection logic.
//!
//! This module has zero imports from `crate::infra`, `crate::commands`,
//! `crate::application`, `tokio`, `std::fs`, `std::process`, or `std::net`.
//! All functions are synchronous and take data in, returning data out.

pub mod bindings;
pub mod config;
pub mod database;
pub mod error;
pub mod exit;
pub mod inventory;
pub mod naming;
pub mod plan;
pub mod resource;
pub mod snapshot;

pub use bindings::EnvironmentBindings;
pub use config::Settings;
pub use database::{
    ClusterMember, ClusterSummary, DatabaseEndpoint, DbCluster, DbInstance, InstanceSummary, Page,
};
pub use error::{CloudError, ProvisionError, UsageError};
pub use exit::RunOutcome;
pub use plan::{
    BastionRequest, ExistingProxy, Mode, ProvisioningPlan, ProxyMode, RestoreSource, RunRequest,
    Stage,
};
pub use resource::{ResourceHandle, ResourceKind};
pub use snapshot::Snapshot;
