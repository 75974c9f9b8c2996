//! Acquisition steps: create a resource, wait for it, record it.
//!
//! A handle reaches the ledger only after the resource is confirmed ready.
//! A resource that was created but never confirmed (the wait was cancelled,
//! timed out or failed) is discarded through the ledger right away.

use anyhow::{Context, Result};

use crate::application::ledger::{Ledger, Recorded, Releaser};
use crate::application::poller::{Poll, Waiter};
use crate::application::ports::{
    ClusterInstanceSpec, ClusterRestore, ComputeApi, ComputeStatus, DatabaseApi, FirewallApi,
    Forward, ImageFilter, InstanceRestore, KeypairApi, LaunchSpec, ProgressReporter, SshTarget,
    TunnelLauncher,
};
use crate::application::services::inventory;
use crate::domain::config::BastionSettings;
use crate::domain::database::{STATUS_AVAILABLE, is_failed_status};
use crate::domain::error::is_not_found;
use crate::domain::{
    BastionRequest, DatabaseEndpoint, DbCluster, DbInstance, ProvisionError, ResourceHandle,
    ResourceKind, RestoreSource, Snapshot, naming, snapshot,
};

const SSH_PORT: u16 = 22;
const RULE_DESCRIPTION: &str = "Temporary SSH access for rdsvalidator";

/// Compute states from which an instance never reaches `running`.
const COMPUTE_DEAD_STATES: &[&str] = &["shutting-down", "terminated", "stopping", "stopped"];

// ── Ledger helpers ────────────────────────────────────────────────────────────

async fn track<R: Releaser>(ledger: &Ledger<R>, handle: ResourceHandle) -> Result<()> {
    match ledger.record(handle).await {
        Recorded::Tracked => Ok(()),
        Recorded::ReleasedInline => Err(ProvisionError::Cancelled {
            waiting_for: "teardown".to_string(),
        }
        .into()),
    }
}

/// Record `handle` if `ready` succeeded, otherwise discard the resource.
async fn confirm<T, R: Releaser>(
    ledger: &Ledger<R>,
    handle: ResourceHandle,
    ready: Result<T>,
) -> Result<T> {
    match ready {
        Ok(value) => {
            track(ledger, handle).await?;
            Ok(value)
        }
        Err(e) => {
            ledger.discard(handle).await;
            Err(e)
        }
    }
}

// ── Keypair ───────────────────────────────────────────────────────────────────

/// A recorded keypair and its private key.
#[derive(Debug, Clone)]
pub struct Keypair {
    pub id: String,
    pub name: String,
    pub private_key: String,
}

/// Create the bastion keypair.
///
/// # Errors
///
/// Returns an error if creation fails or the wait is cancelled.
pub async fn keypair<R: Releaser, P: ProgressReporter>(
    api: &impl KeypairApi,
    name: &str,
    wait: &Waiter<'_, P>,
    ledger: &Ledger<R>,
) -> Result<Keypair> {
    wait.reporter.step(&format!("Creating keypair {name}..."));
    let created = api
        .create_keypair(name)
        .await
        .with_context(|| format!("creating keypair {name}"))?;

    let ready = wait
        .until(&format!("keypair {name}"), move || async move {
            Ok(if api.keypair_visible(name).await? {
                Poll::Ready(())
            } else {
                Poll::NotYet
            })
        })
        .await;
    let handle = ResourceHandle::Keypair {
        id: created.id.clone(),
        name: created.name.clone(),
    };
    confirm(ledger, handle, ready).await?;

    wait.reporter.success(&format!("Keypair {name} ready"));
    Ok(Keypair {
        id: created.id,
        name: created.name,
        private_key: created.private_key,
    })
}

// ── Firewall rule ─────────────────────────────────────────────────────────────

/// Create the bastion firewall rule and open SSH to `request.ingress_cidr`.
///
/// # Errors
///
/// Returns an error if creation or authorization fails, or the wait is
/// cancelled.
pub async fn firewall_rule<R: Releaser, P: ProgressReporter>(
    api: &impl FirewallApi,
    name: &str,
    request: &BastionRequest,
    wait: &Waiter<'_, P>,
    ledger: &Ledger<R>,
) -> Result<String> {
    wait.reporter
        .step(&format!("Creating firewall rule {name} in {}...", request.vpc_id));
    let group_id = api
        .create_rule(name, &request.vpc_id, RULE_DESCRIPTION)
        .await
        .with_context(|| format!("creating firewall rule {name}"))?;

    let id = group_id.as_str();
    let ready = async {
        wait.until(&format!("firewall rule {name}"), move || async move {
            match api.rule_ready(id).await {
                Ok(true) => Ok(Poll::Ready(())),
                Ok(false) => Ok(Poll::NotYet),
                Err(e) if is_not_found(&e) => Ok(Poll::NotYet),
                Err(e) => Err(e),
            }
        })
        .await?;
        api.authorize_ingress(id, &request.ingress_cidr, SSH_PORT)
            .await
            .with_context(|| format!("allowing ssh from {}", request.ingress_cidr))
    }
    .await;
    let handle = ResourceHandle::FirewallRule {
        group_id: group_id.clone(),
        name: name.to_string(),
    };
    confirm(ledger, handle, ready).await?;

    wait.reporter.success(&format!("Firewall rule {group_id} ready"));
    Ok(group_id)
}

// ── Compute instance ──────────────────────────────────────────────────────────

/// A recorded bastion instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bastion {
    pub instance_id: String,
    pub public_ip: String,
}

/// Everything the bastion launch needs from earlier stages.
pub struct BastionLaunch<'a> {
    pub settings: &'a BastionSettings,
    pub key_name: &'a str,
    pub group_id: &'a str,
    pub subnet_id: &'a str,
}

/// Launch the bastion from the newest matching image and wait for its
/// public address.
///
/// # Errors
///
/// Returns [`ProvisionError::NoImage`] when no image matches, or an error if
/// the launch fails, the instance dies, or the wait is cancelled.
pub async fn compute_instance<R: Releaser, P: ProgressReporter>(
    api: &impl ComputeApi,
    launch: &BastionLaunch<'_>,
    wait: &Waiter<'_, P>,
    ledger: &Ledger<R>,
) -> Result<Bastion> {
    let filter = ImageFilter {
        owner: &launch.settings.image_owner,
        name: &launch.settings.image_name,
        architecture: &launch.settings.architecture,
    };
    let image = api
        .list_images(&filter)
        .await
        .context("looking up bastion image")?
        .into_iter()
        .max_by_key(|i| i.created_at)
        .ok_or(ProvisionError::NoImage)?;

    wait.reporter.step(&format!(
        "Launching {} bastion from {}...",
        launch.settings.instance_type, image.id
    ));
    let instance_id = api
        .run_instance(&LaunchSpec {
            image_id: &image.id,
            instance_type: &launch.settings.instance_type,
            key_name: launch.key_name,
            group_id: launch.group_id,
            subnet_id: launch.subnet_id,
        })
        .await
        .context("launching bastion instance")?;

    let id = instance_id.as_str();
    let ready = wait
        .until(&format!("bastion {id}"), move || async move {
            match api.describe_compute(id).await {
                Ok(status) => compute_poll(id, status),
                Err(e) if is_not_found(&e) => Ok(Poll::NotYet),
                Err(e) => Err(e),
            }
        })
        .await;
    let handle = ResourceHandle::ComputeInstance {
        instance_id: instance_id.clone(),
    };
    let public_ip = confirm(ledger, handle, ready).await?;

    wait.reporter
        .success(&format!("Bastion {instance_id} reachable at {public_ip}"));
    Ok(Bastion {
        instance_id,
        public_ip,
    })
}

fn compute_poll(id: &str, status: ComputeStatus) -> Result<Poll<String>> {
    if COMPUTE_DEAD_STATES.contains(&status.state.as_str()) {
        return Err(ProvisionError::FailedState {
            kind: ResourceKind::ComputeInstance,
            id: id.to_string(),
            status: status.state,
        }
        .into());
    }
    Ok(match status.public_ip {
        Some(ip) if status.state == "running" => Poll::Ready(ip),
        _ => Poll::NotYet,
    })
}

// ── Database ──────────────────────────────────────────────────────────────────

/// Restore the newest snapshot of `source` and wait until it accepts
/// connections.
///
/// A cluster restore records two handles: the cluster, then its instance.
///
/// # Errors
///
/// Returns [`ProvisionError::NoSnapshots`] when nothing is restorable, or an
/// error if a restore call fails, the restore fails, or the wait is
/// cancelled.
pub async fn database<R: Releaser, P: ProgressReporter>(
    api: &impl DatabaseApi,
    source: &RestoreSource,
    instance_class: &str,
    wait: &Waiter<'_, P>,
    ledger: &Ledger<R>,
) -> Result<DatabaseEndpoint> {
    let chosen = snapshot::latest(inventory::snapshots(api, source).await?).ok_or_else(|| {
        ProvisionError::NoSnapshots {
            source_id: source.id().to_string(),
        }
    })?;
    let identifier = snapshot::restored_identifier(source.id(), &naming::random_suffix(8));
    wait.reporter.step(&format!(
        "Restoring {identifier} from snapshot {} ({})...",
        chosen.identifier,
        chosen.created_at.format("%Y-%m-%d %H:%M UTC")
    ));

    let endpoint = match source {
        RestoreSource::Cluster(_) => {
            restore_cluster(api, &chosen, &identifier, instance_class, wait, ledger).await?
        }
        RestoreSource::Instance(_) => {
            restore_instance(api, &chosen, &identifier, instance_class, wait, ledger).await?
        }
    };
    wait.reporter.success(&format!(
        "Database {identifier} available at {}:{}",
        endpoint.address, endpoint.port
    ));
    Ok(endpoint)
}

async fn restore_cluster<R: Releaser, P: ProgressReporter>(
    api: &impl DatabaseApi,
    snapshot: &Snapshot,
    cluster_id: &str,
    instance_class: &str,
    wait: &Waiter<'_, P>,
    ledger: &Ledger<R>,
) -> Result<DatabaseEndpoint> {
    // 1. Cluster
    api.restore_cluster(&ClusterRestore {
        identifier: cluster_id,
        snapshot_arn: &snapshot.arn,
        engine: &snapshot.engine,
    })
    .await
    .with_context(|| format!("restoring cluster {cluster_id}"))?;
    let ready = wait
        .until(&format!("cluster {cluster_id}"), move || async move {
            cluster_poll(api.describe_cluster(cluster_id).await)
        })
        .await;
    let handle = ResourceHandle::DatabaseCluster {
        cluster_id: cluster_id.to_string(),
    };
    confirm(ledger, handle, ready).await?;

    // 2. Writer instance
    let instance_id = format!("{cluster_id}-instance-1");
    wait.reporter
        .step(&format!("Adding instance {instance_id} to {cluster_id}..."));
    api.create_cluster_instance(&ClusterInstanceSpec {
        identifier: &instance_id,
        cluster_id,
        engine: &snapshot.engine,
        instance_class,
    })
    .await
    .with_context(|| format!("creating instance {instance_id}"))?;
    let id = instance_id.as_str();
    let ready = wait
        .until(&format!("database instance {id}"), move || async move {
            instance_poll(api.describe_db_instance(id).await)
        })
        .await;
    let handle = ResourceHandle::DatabaseInstance {
        instance_id: instance_id.clone(),
        cluster_id: Some(cluster_id.to_string()),
    };
    confirm(ledger, handle, ready).await
}

async fn restore_instance<R: Releaser, P: ProgressReporter>(
    api: &impl DatabaseApi,
    snapshot: &Snapshot,
    instance_id: &str,
    instance_class: &str,
    wait: &Waiter<'_, P>,
    ledger: &Ledger<R>,
) -> Result<DatabaseEndpoint> {
    api.restore_instance(&InstanceRestore {
        identifier: instance_id,
        snapshot_arn: &snapshot.arn,
        engine: &snapshot.engine,
        instance_class,
    })
    .await
    .with_context(|| format!("restoring instance {instance_id}"))?;
    let ready = wait
        .until(&format!("database instance {instance_id}"), move || async move {
            instance_poll(api.describe_db_instance(instance_id).await)
        })
        .await;
    let handle = ResourceHandle::DatabaseInstance {
        instance_id: instance_id.to_string(),
        cluster_id: None,
    };
    confirm(ledger, handle, ready).await
}

fn cluster_poll(described: Result<DbCluster>) -> Result<Poll<()>> {
    let cluster = match described {
        Ok(c) => c,
        Err(e) if is_not_found(&e) => return Ok(Poll::NotYet),
        Err(e) => return Err(e),
    };
    if is_failed_status(&cluster.status) {
        return Err(ProvisionError::FailedState {
            kind: ResourceKind::DatabaseCluster,
            id: cluster.identifier,
            status: cluster.status,
        }
        .into());
    }
    Ok(if cluster.status == STATUS_AVAILABLE {
        Poll::Ready(())
    } else {
        Poll::NotYet
    })
}

fn instance_poll(described: Result<DbInstance>) -> Result<Poll<DatabaseEndpoint>> {
    let instance = match described {
        Ok(i) => i,
        Err(e) if is_not_found(&e) => return Ok(Poll::NotYet),
        Err(e) => return Err(e),
    };
    if is_failed_status(&instance.status) {
        return Err(ProvisionError::FailedState {
            kind: ResourceKind::DatabaseInstance,
            id: instance.identifier,
            status: instance.status,
        }
        .into());
    }
    if instance.status != STATUS_AVAILABLE {
        return Ok(Poll::NotYet);
    }
    Ok(instance.endpoint().map_or(Poll::NotYet, Poll::Ready))
}

// ── Tunnel ────────────────────────────────────────────────────────────────────

/// Start the port forward and record its process.
///
/// # Errors
///
/// Returns an error if the forward could not be started.
pub async fn tunnel<R: Releaser>(
    launcher: &impl TunnelLauncher,
    target: &SshTarget,
    forward: &Forward,
    reporter: &impl ProgressReporter,
    ledger: &Ledger<R>,
) -> Result<u32> {
    reporter.step(&format!(
        "Forwarding localhost:{} to {}:{} via {}...",
        forward.local_port, forward.remote_host, forward.remote_port, target.host
    ));
    let pid = launcher
        .launch(target, forward)
        .await
        .with_context(|| format!("starting ssh tunnel via {}", target.host))?;
    track(
        ledger,
        ResourceHandle::ExternalProcess {
            pid,
            label: format!("ssh tunnel localhost:{}", forward.local_port),
        },
    )
    .await?;
    reporter.success(&format!("Tunnel up on localhost:{}", forward.local_port));
    Ok(pid)
}
