//! Validation run: provision, run scripts, hold, tear down.

use std::time::Duration;

use anyhow::Result;
use tokio_util::sync::CancellationToken;

use crate::application::interrupt::{Termination, guard};
use crate::application::ledger::Ledger;
use crate::application::poller::PollPolicy;
use crate::application::ports::CloudProvider;
use crate::application::services::provision::{Collaborators, Orchestrator};
use crate::application::services::release::CloudReleaser;
use crate::domain::exit::RunOutcome;
use crate::domain::{ProvisioningPlan, Settings};
use crate::infra::command_runner::{DEFAULT_CMD_TIMEOUT, SSH_PROBE_TIMEOUT, TokioCommandRunner};
use crate::infra::gate::StdinGate;
use crate::infra::scripts::DirScriptRunner;
use crate::infra::signal::OsSignals;
use crate::infra::tunnel::SshTunnels;
use crate::output::{OutputContext, TerminalReporter};

/// Execute `plan` and return the exit code.
///
/// # Errors
///
/// Returns an error only when signal handlers cannot be installed; every
/// later failure is reported and folded into the exit code.
pub async fn run(
    ctx: &OutputContext,
    plan: &ProvisioningPlan,
    settings: &Settings,
    cloud: &impl CloudProvider,
) -> Result<i32> {
    // Handlers go in before anything is created.
    let signals = OsSignals::install()?;

    let reporter = TerminalReporter::new(ctx);
    let tunnels = SshTunnels::new(TokioCommandRunner::new(SSH_PROBE_TIMEOUT));
    let scripts = DirScriptRunner::new(TokioCommandRunner::new(DEFAULT_CMD_TIMEOUT));

    let teardown_policy =
        PollPolicy::every(Duration::from_secs(settings.poll.database_interval_secs))
            .with_timeout(settings.poll.timeout());
    let ledger = Ledger::new(CloudReleaser::new(
        cloud,
        &tunnels,
        &reporter,
        teardown_policy,
    ));
    let cancel = CancellationToken::new();
    let orchestrator = Orchestrator::new(
        plan,
        settings,
        Collaborators {
            cloud,
            scripts: &scripts,
            tunnels: &tunnels,
            reporter: &reporter,
        },
        cancel.clone(),
    );

    tracing::debug!(stages = ?plan.stages(), "plan resolved");
    ctx.header(&format!("Validating latest snapshot of {}", plan.restore.id()));
    let termination = guard(&ledger, &cancel, signals, orchestrator.run(&ledger, &StdinGate)).await;
    summarize(ctx, &termination);
    Ok(termination.exit_code())
}

fn summarize(ctx: &OutputContext, termination: &Termination) {
    if let Some(e) = &termination.error {
        ctx.error(&format!("{e:#}"));
    }
    for failed in &termination.report.failed {
        ctx.error(&format!("{} was not deleted: {}", failed.handle, failed.error));
    }
    if !termination.report.is_complete() {
        ctx.error("Some resources were left behind and need manual cleanup");
        return;
    }
    match termination.outcome {
        RunOutcome::Completed => ctx.success("Validation complete, environment torn down"),
        RunOutcome::Interrupted => ctx.warn("Interrupted, environment torn down"),
        RunOutcome::Failed => ctx.warn("Run failed, environment torn down"),
    }
}
