//! Releasing acquired resources.
//!
//! One dispatch per resource kind. A resource the cloud no longer knows
//! about counts as released, so a repeated or late release is harmless.

use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;

use crate::application::ledger::Releaser;
use crate::application::poller::{Poll, PollPolicy, Waiter};
use crate::application::ports::{CloudProvider, ProgressReporter, TunnelLauncher};
use crate::domain::ResourceHandle;
use crate::domain::error::is_not_found;

const STATE_TERMINATED: &str = "terminated";

/// Releases handles through the cloud and tunnel adapters.
pub struct CloudReleaser<'a, C, T, P> {
    cloud: &'a C,
    tunnels: &'a T,
    reporter: &'a P,
    policy: PollPolicy,
    // Never cancelled: teardown waits run to completion even after an interrupt.
    cancel: CancellationToken,
}

impl<'a, C, T, P> CloudReleaser<'a, C, T, P>
where
    C: CloudProvider,
    T: TunnelLauncher,
    P: ProgressReporter,
{
    pub fn new(cloud: &'a C, tunnels: &'a T, reporter: &'a P, policy: PollPolicy) -> Self {
        Self {
            cloud,
            tunnels,
            reporter,
            policy,
            cancel: CancellationToken::new(),
        }
    }

    fn waiter(&self) -> Waiter<'_, P> {
        Waiter::new(self.policy, &self.cancel, self.reporter)
    }

    async fn terminate_compute(&self, id: &str) -> Result<()> {
        let state = self.cloud.terminate_instance(id).await?;
        if state == STATE_TERMINATED {
            return Ok(());
        }
        let cloud = self.cloud;
        self.waiter()
            .until(&format!("bastion {id} to terminate"), move || async move {
                match cloud.describe_compute(id).await {
                    Ok(status) if status.state == STATE_TERMINATED => Ok(Poll::Ready(())),
                    Ok(_) => Ok(Poll::NotYet),
                    Err(e) if is_not_found(&e) => Ok(Poll::Ready(())),
                    Err(e) => Err(e),
                }
            })
            .await
    }

    async fn delete_database_instance(&self, id: &str, in_cluster: bool) -> Result<()> {
        self.cloud.delete_db_instance(id).await?;
        if !in_cluster {
            return Ok(());
        }
        // The owning cluster can only be deleted once its members are gone.
        let cloud = self.cloud;
        self.waiter()
            .until(&format!("database instance {id} to delete"), move || async move {
                match cloud.describe_db_instance(id).await {
                    Ok(_) => Ok(Poll::NotYet),
                    Err(e) if is_not_found(&e) => Ok(Poll::Ready(())),
                    Err(e) => Err(e),
                }
            })
            .await
    }
}

impl<C, T, P> Releaser for CloudReleaser<'_, C, T, P>
where
    C: CloudProvider,
    T: TunnelLauncher,
    P: ProgressReporter,
{
    async fn release(&self, handle: &ResourceHandle) -> Result<()> {
        self.reporter.step(&format!("Deleting {handle}..."));
        let result = match handle {
            ResourceHandle::Keypair { id, .. } => self.cloud.delete_keypair(id).await,
            ResourceHandle::FirewallRule { group_id, .. } => self.cloud.delete_rule(group_id).await,
            ResourceHandle::ComputeInstance { instance_id } => {
                self.terminate_compute(instance_id).await
            }
            ResourceHandle::DatabaseCluster { cluster_id } => {
                self.cloud.delete_cluster(cluster_id).await
            }
            ResourceHandle::DatabaseInstance {
                instance_id,
                cluster_id,
            } => {
                self.delete_database_instance(instance_id, cluster_id.is_some())
                    .await
            }
            ResourceHandle::ExternalProcess { pid, .. } => self.tunnels.terminate(*pid).await,
        };

        match result {
            Ok(()) => {
                self.reporter.success(&format!("Deleted {handle}"));
                Ok(())
            }
            Err(e) if is_not_found(&e) => {
                tracing::debug!(resource = %handle, "already gone");
                self.reporter.success(&format!("{handle} already gone"));
                Ok(())
            }
            Err(e) => {
                self.reporter.warn(&format!("Could not delete {handle}"));
                Err(e).with_context(|| format!("deleting {handle}"))
            }
        }
    }
}
