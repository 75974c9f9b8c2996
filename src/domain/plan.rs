//! Run intent: raw flag values folded into an immutable provisioning plan.
//!
//! `resolve` is the only place flag combinations are validated; it runs
//! before any cloud call is made.

use std::path::PathBuf;

use crate::domain::error::UsageError;

/// Flag values exactly as parsed, before validation.
#[derive(Debug, Clone, Default)]
pub struct RunRequest {
    pub list: bool,
    pub cluster_id: Option<String>,
    pub instance_id: Option<String>,
    pub instance_class: String,
    pub pre_scripts: Option<PathBuf>,
    pub post_scripts: Option<PathBuf>,
    pub proxy: Option<String>,
    pub proxy_key: Option<PathBuf>,
    pub proxy_user: String,
    pub proxy_create: bool,
    pub proxy_vpc: Option<String>,
    pub proxy_subnet: Option<String>,
    pub ingress_cidr: String,
    pub local_port: Option<u16>,
    /// Skip the steady-state wait.
    pub yes: bool,
}

/// What the invocation asked for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mode {
    List,
    Validate(ProvisioningPlan),
}

/// Which snapshot family the database is restored from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RestoreSource {
    Cluster(String),
    Instance(String),
}

impl RestoreSource {
    #[must_use]
    pub fn id(&self) -> &str {
        match self {
            Self::Cluster(id) | Self::Instance(id) => id,
        }
    }
}

/// An operator-supplied SSH proxy host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExistingProxy {
    pub host: String,
    pub key_path: PathBuf,
    pub user: String,
}

/// Network placement for an ephemeral bastion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BastionRequest {
    pub vpc_id: String,
    pub subnet_id: String,
    pub ingress_cidr: String,
    pub user: String,
}

/// How the database is reached from this machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProxyMode {
    Direct,
    Existing(ExistingProxy),
    Ephemeral(BastionRequest),
}

/// Immutable description of one provisioning run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvisioningPlan {
    pub restore: RestoreSource,
    pub instance_class: String,
    pub proxy: ProxyMode,
    pub pre_scripts: Option<PathBuf>,
    pub post_scripts: Option<PathBuf>,
    pub local_port: Option<u16>,
    /// Wait for operator confirmation once steady.
    pub hold: bool,
}

/// Orchestration stages, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    PreScripts,
    Keypair,
    FirewallRule,
    ComputeInstance,
    DatabaseRestore,
    TunnelReachability,
    TunnelLaunch,
    PostScripts,
    Steady,
}

impl ProvisioningPlan {
    /// The stages this plan executes, skipped stages omitted.
    #[must_use]
    pub fn stages(&self) -> Vec<Stage> {
        let mut stages = Vec::new();
        if self.pre_scripts.is_some() {
            stages.push(Stage::PreScripts);
        }
        if matches!(self.proxy, ProxyMode::Ephemeral(_)) {
            stages.extend([Stage::Keypair, Stage::FirewallRule, Stage::ComputeInstance]);
        }
        stages.push(Stage::DatabaseRestore);
        if self.tunnelled() {
            stages.extend([Stage::TunnelReachability, Stage::TunnelLaunch]);
        }
        if self.post_scripts.is_some() {
            stages.push(Stage::PostScripts);
        }
        stages.push(Stage::Steady);
        stages
    }

    /// Returns `true` when database traffic goes through an SSH tunnel.
    #[must_use]
    pub fn tunnelled(&self) -> bool {
        !matches!(self.proxy, ProxyMode::Direct)
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// Validate flag combinations and build the run mode.
///
/// Empty strings count as absent, so `RV_CLUSTER_ID=` does not select a
/// restore source.
///
/// # Errors
///
/// Returns a [`UsageError`] describing the first invalid combination found.
pub fn resolve(req: RunRequest) -> Result<Mode, UsageError> {
    let cluster = non_empty(req.cluster_id);
    let instance = non_empty(req.instance_id);

    if req.list {
        if cluster.is_some() || instance.is_some() {
            return Err(UsageError::ListWithSource);
        }
        return Ok(Mode::List);
    }

    let restore = match (cluster, instance) {
        (Some(_), Some(_)) => return Err(UsageError::BothSources),
        (None, None) => return Err(UsageError::NoMode),
        (Some(c), None) => RestoreSource::Cluster(c),
        (None, Some(i)) => RestoreSource::Instance(i),
    };

    let proxy_host = non_empty(req.proxy);
    let proxy = match (proxy_host, req.proxy_create) {
        (Some(_), true) => return Err(UsageError::BothProxies),
        (Some(host), false) => {
            let key_path = req.proxy_key.ok_or(UsageError::MissingProxyKey)?;
            ProxyMode::Existing(ExistingProxy {
                host,
                key_path,
                user: req.proxy_user,
            })
        }
        (None, true) => {
            let (Some(vpc_id), Some(subnet_id)) =
                (non_empty(req.proxy_vpc), non_empty(req.proxy_subnet))
            else {
                return Err(UsageError::MissingBastionNetwork);
            };
            ProxyMode::Ephemeral(BastionRequest {
                vpc_id,
                subnet_id,
                ingress_cidr: req.ingress_cidr,
                user: req.proxy_user,
            })
        }
        (None, false) => ProxyMode::Direct,
    };

    Ok(Mode::Validate(ProvisioningPlan {
        restore,
        instance_class: req.instance_class,
        proxy,
        pre_scripts: req.pre_scripts,
        post_scripts: req.post_scripts,
        local_port: req.local_port,
        hold: !req.yes,
    }))
}
