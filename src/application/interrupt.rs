//! Interrupt coordinator.
//!
//! Runs next to the orchestrator on the same task. The first termination
//! signal cancels the run. The ledger is unwound only after the run has
//! returned, so a resource still in its readiness wait is discarded by its
//! own acquire step before anything it depends on is released. Whichever
//! side reaches the ledger second gets the cached report back.

use std::future::Future;

use anyhow::Result;
use tokio_util::sync::CancellationToken;

use crate::application::ledger::{Ledger, Releaser, UnwindReport};
use crate::application::ports::SignalSource;
use crate::domain::error::is_cancelled;
use crate::domain::exit::{RunOutcome, exit_code};

/// Turns the first termination signal into cancellation plus teardown.
pub struct InterruptCoordinator<'a, R> {
    ledger: &'a Ledger<R>,
    cancel: CancellationToken,
}

impl<'a, R: Releaser> InterruptCoordinator<'a, R> {
    pub fn new(ledger: &'a Ledger<R>, cancel: CancellationToken) -> Self {
        Self { ledger, cancel }
    }

    /// Wait for a signal until `settled` fires.
    ///
    /// `settled` fires once the run future has returned. On a signal the run
    /// is cancelled, and the ledger is unwound after `settled`. Returns the
    /// unwind report when a signal arrived, `None` otherwise.
    pub async fn watch(
        &self,
        mut signals: impl SignalSource,
        settled: &CancellationToken,
    ) -> Option<UnwindReport> {
        let received = tokio::select! {
            biased;
            () = settled.cancelled() => return None,
            received = signals.recv() => received,
        };
        if let Err(e) = received {
            tracing::warn!(error = %format!("{e:#}"), "signal listener failed; interrupts are not handled");
            settled.cancelled().await;
            return None;
        }
        tracing::warn!("interrupt received, cancelling run");
        self.cancel.cancel();
        settled.cancelled().await;
        tracing::info!("run stopped, tearing down");
        Some(self.ledger.unwind().await)
    }
}

/// How a guarded run ended.
#[derive(Debug)]
pub struct Termination {
    pub outcome: RunOutcome,
    pub report: UnwindReport,
    /// The orchestrator's error, when it failed for a reason other than the interrupt.
    pub error: Option<anyhow::Error>,
}

impl Termination {
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        exit_code(self.outcome, self.report.is_complete())
    }
}

/// Drive `run` to completion under interrupt protection, then unwind.
///
/// The ledger is unwound exactly once whether `run` succeeds, fails, or is
/// interrupted.
pub async fn guard<R, S, F>(
    ledger: &Ledger<R>,
    cancel: &CancellationToken,
    signals: S,
    run: F,
) -> Termination
where
    R: Releaser,
    S: SignalSource,
    F: Future<Output = Result<()>>,
{
    let settled = CancellationToken::new();
    let coordinator = InterruptCoordinator::new(ledger, cancel.clone());

    let main_path = async {
        let result = run.await;
        settled.cancel();
        let report = ledger.unwind().await;
        (result, report)
    };

    let ((result, report), interrupted) =
        tokio::join!(main_path, coordinator.watch(signals, &settled));

    match (result, interrupted) {
        (_, Some(watched)) => Termination {
            outcome: RunOutcome::Interrupted,
            report: later(report, watched),
            error: None,
        },
        (Err(e), None) if is_cancelled(&e) => Termination {
            outcome: RunOutcome::Interrupted,
            report,
            error: None,
        },
        (Err(e), None) => Termination {
            outcome: RunOutcome::Failed,
            report,
            error: Some(e),
        },
        (Ok(()), None) => Termination {
            outcome: RunOutcome::Completed,
            report,
            error: None,
        },
    }
}

// Both reports come from the same ledger; the later one also covers
// anything released inline after the first unwind.
fn later(a: UnwindReport, b: UnwindReport) -> UnwindReport {
    let size = |r: &UnwindReport| r.released.len() + r.failed.len();
    if size(&b) > size(&a) { b } else { a }
}
