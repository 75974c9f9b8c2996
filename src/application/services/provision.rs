//! Provisioning orchestrator.
//!
//! Drives one run through its stages in order:
//!
//! 1. pre scripts
//! 2. bastion keypair, firewall rule and instance (`--proxy-create` only)
//! 3. database restore
//! 4. tunnel reachability and launch (any proxy)
//! 5. post scripts, with the database bindings
//! 6. steady: wait for the operator
//!
//! Every acquired resource is recorded in the ledger as it becomes ready.
//! The orchestrator never releases anything itself: on success, failure or
//! interrupt the caller unwinds the ledger once.

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;

use crate::application::ledger::{Ledger, Releaser};
use crate::application::poller::{Poll, PollPolicy, Waiter};
use crate::application::ports::{
    CloudProvider, Forward, Identity, OperatorGate, ProgressReporter, ScriptRunner, SshTarget,
    TunnelLauncher,
};
use crate::application::services::acquire::{self, BastionLaunch};
use crate::domain::{
    BastionRequest, DatabaseEndpoint, EnvironmentBindings, ProvisionError, ProvisioningPlan,
    ProxyMode, Settings, Stage, naming,
};

/// The adapters one run talks to.
pub struct Collaborators<'a, C, S, T, P> {
    pub cloud: &'a C,
    pub scripts: &'a S,
    pub tunnels: &'a T,
    pub reporter: &'a P,
}

/// Runs a [`ProvisioningPlan`].
pub struct Orchestrator<'a, C, S, T, P> {
    plan: &'a ProvisioningPlan,
    settings: &'a Settings,
    deps: Collaborators<'a, C, S, T, P>,
    cancel: CancellationToken,
}

impl<'a, C, S, T, P> Orchestrator<'a, C, S, T, P>
where
    C: CloudProvider,
    S: ScriptRunner,
    T: TunnelLauncher,
    P: ProgressReporter,
{
    pub fn new(
        plan: &'a ProvisioningPlan,
        settings: &'a Settings,
        deps: Collaborators<'a, C, S, T, P>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            plan,
            settings,
            deps,
            cancel,
        }
    }

    /// Execute every stage of the plan.
    ///
    /// # Errors
    ///
    /// Returns the first stage failure, or [`ProvisionError::Cancelled`] once
    /// the run has been cancelled.
    pub async fn run<R: Releaser>(
        &self,
        ledger: &Ledger<R>,
        gate: &impl OperatorGate,
    ) -> Result<()> {
        // 1. Pre scripts see no database bindings.
        if let Some(dir) = &self.plan.pre_scripts {
            self.enter(Stage::PreScripts)?;
            self.run_scripts(dir, &EnvironmentBindings::new())
                .await
                .context("pre scripts")?;
        }

        // 2. SSH target
        let target = match &self.plan.proxy {
            ProxyMode::Direct => None,
            ProxyMode::Existing(proxy) => Some(SshTarget {
                host: proxy.host.clone(),
                user: proxy.user.clone(),
                identity: self
                    .deps
                    .tunnels
                    .load_identity(Identity::File(&proxy.key_path))?,
            }),
            ProxyMode::Ephemeral(request) => Some(self.bastion(request, ledger).await?),
        };

        // 3. Database
        self.enter(Stage::DatabaseRestore)?;
        let endpoint = acquire::database(
            self.deps.cloud,
            &self.plan.restore,
            &self.plan.instance_class,
            &self.waiter(self.settings.poll.database_interval_secs),
            ledger,
        )
        .await?;

        // 4. Tunnel
        let tunnel_port = match &target {
            Some(target) => Some(self.tunnel(target, &endpoint, ledger).await?),
            None => None,
        };
        let bindings = EnvironmentBindings::for_database(&endpoint, tunnel_port);

        // 5. Post scripts
        if let Some(dir) = &self.plan.post_scripts {
            self.enter(Stage::PostScripts)?;
            self.run_scripts(dir, &bindings)
                .await
                .context("post scripts")?;
        }

        // 6. Steady
        self.enter(Stage::Steady)?;
        self.steady(&bindings, gate).await
    }

    fn enter(&self, stage: Stage) -> Result<()> {
        if self.cancel.is_cancelled() {
            return Err(ProvisionError::Cancelled {
                waiting_for: format!("{stage:?} stage"),
            }
            .into());
        }
        tracing::info!(?stage, "entering stage");
        Ok(())
    }

    fn waiter(&self, interval_secs: u64) -> Waiter<'_, P> {
        let policy = PollPolicy::every(Duration::from_secs(interval_secs))
            .with_timeout(self.settings.poll.timeout());
        Waiter::new(policy, &self.cancel, self.deps.reporter)
    }

    async fn bastion<R: Releaser>(
        &self,
        request: &BastionRequest,
        ledger: &Ledger<R>,
    ) -> Result<SshTarget> {
        let wait = self.waiter(self.settings.poll.compute_interval_secs);
        let name = naming::resource_name(&naming::random_suffix(8));

        self.enter(Stage::Keypair)?;
        let keypair = acquire::keypair(self.deps.cloud, &name, &wait, ledger).await?;

        self.enter(Stage::FirewallRule)?;
        let group_id =
            acquire::firewall_rule(self.deps.cloud, &name, request, &wait, ledger).await?;

        self.enter(Stage::ComputeInstance)?;
        let launch = BastionLaunch {
            settings: &self.settings.bastion,
            key_name: &keypair.name,
            group_id: &group_id,
            subnet_id: &request.subnet_id,
        };
        let bastion = acquire::compute_instance(self.deps.cloud, &launch, &wait, ledger).await?;

        let identity = self
            .deps
            .tunnels
            .load_identity(Identity::Material(&keypair.private_key))?;
        Ok(SshTarget {
            host: bastion.public_ip,
            user: request.user.clone(),
            identity,
        })
    }

    async fn tunnel<R: Releaser>(
        &self,
        target: &SshTarget,
        endpoint: &DatabaseEndpoint,
        ledger: &Ledger<R>,
    ) -> Result<u16> {
        self.enter(Stage::TunnelReachability)?;
        let tunnels = self.deps.tunnels;
        let destination = format!("{}@{}", target.user, target.host);
        self.deps
            .reporter
            .step(&format!("Waiting for ssh on {destination}..."));
        self.waiter(self.settings.poll.ssh_interval_secs)
            .until(&format!("ssh to {destination}"), move || async move {
                Ok(if tunnels.probe(target).await? {
                    Poll::Ready(())
                } else {
                    Poll::NotYet
                })
            })
            .await?;
        self.deps
            .reporter
            .success(&format!("{destination} reachable"));

        self.enter(Stage::TunnelLaunch)?;
        let local_port = match self.plan.local_port {
            Some(port) => port,
            None => endpoint
                .port
                .checked_add(self.settings.database.port_offset)
                .with_context(|| {
                    format!(
                        "no default local port for database port {}; pass --local-port",
                        endpoint.port
                    )
                })?,
        };
        let forward = Forward {
            local_port,
            remote_host: endpoint.address.clone(),
            remote_port: endpoint.port,
        };
        acquire::tunnel(tunnels, target, &forward, self.deps.reporter, ledger).await?;
        Ok(local_port)
    }

    async fn run_scripts(&self, dir: &Path, bindings: &EnvironmentBindings) -> Result<()> {
        let scripts = self.deps.scripts.list(dir)?;
        let total = scripts.len();
        self.deps.reporter.step(&format!(
            "Running {total} script(s) from {}...",
            dir.display()
        ));
        let envs: Vec<(&str, &str)> = bindings.iter().collect();

        for (index, script) in scripts.iter().enumerate() {
            let name = script
                .file_name()
                .map_or_else(|| script.display().to_string(), |n| n.to_string_lossy().into_owned());
            self.deps
                .reporter
                .step(&format!("[{}/{total}] Calling {name}", index + 1));
            let status = tokio::select! {
                status = self.deps.scripts.run(script, &envs) => {
                    status.with_context(|| format!("running {name}"))?
                }
                () = self.cancel.cancelled() => {
                    return Err(ProvisionError::Cancelled { waiting_for: format!("script {name}") }.into());
                }
            };
            if !status.success() {
                return Err(ProvisionError::ScriptFailed {
                    script: name,
                    code: status.code(),
                }
                .into());
            }
        }
        Ok(())
    }

    async fn steady(&self, bindings: &EnvironmentBindings, gate: &impl OperatorGate) -> Result<()> {
        let reporter = self.deps.reporter;
        reporter.success("Environment ready");
        for (key, value) in bindings.iter() {
            reporter.step(&format!("{key}={value}"));
        }
        if !self.plan.hold {
            return Ok(());
        }
        reporter.step("Press Enter to tear down...");
        tokio::select! {
            released = gate.wait_for_release() => released.context("waiting for operator"),
            () = self.cancel.cancelled() => Err(ProvisionError::Cancelled {
                waiting_for: "operator".to_string(),
            }
            .into()),
        }
    }
}
