//! Ports: the contracts the cloud, process and terminal adapters fulfill.
//!
//! Imports only from `crate::domain`. Adapters live in `crate::infra`.

use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Output};
use std::time::Duration;

use anyhow::Result;
use chrono::{DateTime, Utc};

use crate::domain::{ClusterSummary, DbCluster, DbInstance, InstanceSummary, Page, Snapshot};

// ── Command Runner Port ───────────────────────────────────────────────────────

/// Abstracts process execution so infrastructure can be swapped or mocked.
#[allow(async_fn_in_trait)]
pub trait CommandRunner {
    /// Run a program and capture its output.
    ///
    /// Implementations should delegate to `run_with_timeout` using the
    /// instance's configured default timeout.
    async fn run(&self, program: &str, args: &[&str]) -> Result<Output>;
    /// Run a program with a custom timeout override.
    ///
    /// # Errors
    ///
    /// Returns an error if the process cannot be spawned or exceeds `timeout`.
    /// On timeout, the child process must be killed (not left orphaned).
    async fn run_with_timeout(
        &self,
        program: &str,
        args: &[&str],
        timeout: Duration,
    ) -> Result<Output>;
    /// Spawn a long-running program in the background.
    ///
    /// # Errors
    ///
    /// Returns an error if the process cannot be spawned.
    fn spawn(&self, program: &str, args: &[&str]) -> Result<tokio::process::Child>;
    /// Run a program with inherited stdio and extra environment variables.
    /// No timeout; the caller decides when to give up.
    async fn run_status(
        &self,
        program: &str,
        args: &[&str],
        envs: &[(&str, &str)],
    ) -> Result<ExitStatus>;
}

// ── Cloud Ports ───────────────────────────────────────────────────────────────

/// A freshly created keypair, including its private half.
#[derive(Debug, Clone)]
pub struct CreatedKeypair {
    pub id: String,
    pub name: String,
    pub private_key: String,
}

/// SSH keypair operations.
#[allow(async_fn_in_trait)]
pub trait KeypairApi {
    async fn create_keypair(&self, name: &str) -> Result<CreatedKeypair>;
    /// Returns `true` once the keypair shows up in listings.
    async fn keypair_visible(&self, name: &str) -> Result<bool>;
    async fn delete_keypair(&self, id: &str) -> Result<()>;
}

/// Firewall rule (security group) operations.
#[allow(async_fn_in_trait)]
pub trait FirewallApi {
    /// Create a rule in `vpc_id` and return its id.
    async fn create_rule(&self, name: &str, vpc_id: &str, description: &str) -> Result<String>;
    /// Returns `true` once the default egress permissions are populated.
    async fn rule_ready(&self, group_id: &str) -> Result<bool>;
    async fn authorize_ingress(&self, group_id: &str, cidr: &str, port: u16) -> Result<()>;
    async fn delete_rule(&self, group_id: &str) -> Result<()>;
}

/// Filter for the bastion machine image.
#[derive(Debug, Clone)]
pub struct ImageFilter<'a> {
    pub owner: &'a str,
    pub name: &'a str,
    pub architecture: &'a str,
}

/// A bootable machine image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Image {
    pub id: String,
    pub created_at: DateTime<Utc>,
}

/// Launch parameters for the bastion instance.
#[derive(Debug, Clone)]
pub struct LaunchSpec<'a> {
    pub image_id: &'a str,
    pub instance_type: &'a str,
    pub key_name: &'a str,
    pub group_id: &'a str,
    pub subnet_id: &'a str,
}

/// Observed compute instance state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComputeStatus {
    /// Lifecycle state name, e.g. `pending`, `running`, `terminated`.
    pub state: String,
    pub public_ip: Option<String>,
}

/// Compute instance operations.
#[allow(async_fn_in_trait)]
pub trait ComputeApi {
    async fn list_images(&self, filter: &ImageFilter<'_>) -> Result<Vec<Image>>;
    /// Launch one instance and return its id.
    async fn run_instance(&self, spec: &LaunchSpec<'_>) -> Result<String>;
    async fn describe_compute(&self, id: &str) -> Result<ComputeStatus>;
    /// Request termination and return the state reported by the call.
    async fn terminate_instance(&self, id: &str) -> Result<String>;
}

/// Parameters for restoring a cluster snapshot.
#[derive(Debug, Clone)]
pub struct ClusterRestore<'a> {
    pub identifier: &'a str,
    pub snapshot_arn: &'a str,
    pub engine: &'a str,
}

/// Parameters for adding an instance to a restored cluster.
#[derive(Debug, Clone)]
pub struct ClusterInstanceSpec<'a> {
    pub identifier: &'a str,
    pub cluster_id: &'a str,
    pub engine: &'a str,
    pub instance_class: &'a str,
}

/// Parameters for restoring an instance snapshot.
#[derive(Debug, Clone)]
pub struct InstanceRestore<'a> {
    pub identifier: &'a str,
    pub snapshot_arn: &'a str,
    pub engine: &'a str,
    pub instance_class: &'a str,
}

/// Managed database operations. Listings are paginated by marker.
#[allow(async_fn_in_trait)]
pub trait DatabaseApi {
    async fn list_clusters(&self, marker: Option<&str>) -> Result<Page<ClusterSummary>>;
    async fn list_instances(&self, marker: Option<&str>) -> Result<Page<InstanceSummary>>;
    async fn list_cluster_snapshots(
        &self,
        cluster_id: &str,
        marker: Option<&str>,
    ) -> Result<Page<Snapshot>>;
    async fn list_instance_snapshots(
        &self,
        instance_id: &str,
        marker: Option<&str>,
    ) -> Result<Page<Snapshot>>;
    async fn restore_cluster(&self, request: &ClusterRestore<'_>) -> Result<()>;
    async fn describe_cluster(&self, id: &str) -> Result<DbCluster>;
    async fn create_cluster_instance(&self, spec: &ClusterInstanceSpec<'_>) -> Result<()>;
    async fn restore_instance(&self, request: &InstanceRestore<'_>) -> Result<()>;
    async fn describe_db_instance(&self, id: &str) -> Result<DbInstance>;
    async fn delete_db_instance(&self, id: &str) -> Result<()>;
    async fn delete_cluster(&self, id: &str) -> Result<()>;
}

/// Composite trait: any type implementing all four cloud ports is a `CloudProvider`.
pub trait CloudProvider: KeypairApi + FirewallApi + ComputeApi + DatabaseApi {}

/// Blanket implementation: any type implementing all four ports is a `CloudProvider`.
impl<T> CloudProvider for T where T: KeypairApi + FirewallApi + ComputeApi + DatabaseApi {}

// ── Script and Tunnel Ports ───────────────────────────────────────────────────

/// Executes user scripts.
#[allow(async_fn_in_trait)]
pub trait ScriptRunner {
    /// Scripts found in `dir`, in execution order.
    fn list(&self, dir: &Path) -> Result<Vec<PathBuf>>;
    /// Run one script with inherited stdio and `envs` added to its environment.
    async fn run(&self, script: &Path, envs: &[(&str, &str)]) -> Result<ExitStatus>;
}

/// Where the SSH private key comes from.
#[derive(Debug, Clone, Copy)]
pub enum Identity<'a> {
    /// A key file supplied by the operator.
    File(&'a Path),
    /// Key material returned by keypair creation.
    Material(&'a str),
}

/// An SSH endpoint and the identity used to reach it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SshTarget {
    pub host: String,
    pub user: String,
    pub identity: PathBuf,
}

/// A local port forward through the SSH target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Forward {
    pub local_port: u16,
    pub remote_host: String,
    pub remote_port: u16,
}

/// Launches and stops SSH port-forwarding processes.
#[allow(async_fn_in_trait)]
pub trait TunnelLauncher {
    /// Resolve an identity to a key file usable by `ssh -i`.
    fn load_identity(&self, identity: Identity<'_>) -> Result<PathBuf>;
    /// One reachability attempt; `Ok(false)` means not reachable yet.
    async fn probe(&self, target: &SshTarget) -> Result<bool>;
    /// Start the forward in the background and return its process id.
    async fn launch(&self, target: &SshTarget, forward: &Forward) -> Result<u32>;
    /// Stop a launched forward. A process that already exited counts as stopped.
    async fn terminate(&self, pid: u32) -> Result<()>;
}

// ── Operator Ports ────────────────────────────────────────────────────────────

/// Blocks until the operator asks for teardown.
#[allow(async_fn_in_trait)]
pub trait OperatorGate {
    async fn wait_for_release(&self) -> Result<()>;
}

/// Delivers process termination requests.
#[allow(async_fn_in_trait)]
pub trait SignalSource {
    /// Resolves when the first termination signal arrives.
    async fn recv(&mut self) -> Result<()>;
}

// ── Progress Reporting Port ───────────────────────────────────────────────────

/// Abstracts progress reporting so services can emit events without
/// depending on the Presentation layer. Sync trait, no async needed.
pub trait ProgressReporter {
    /// Emit an in-progress step message.
    fn step(&self, message: &str);
    /// One readiness check came back "not yet".
    fn tick(&self);
    /// Emit a success message.
    fn success(&self, message: &str);
    /// Emit a warning message.
    fn warn(&self, message: &str);
}
