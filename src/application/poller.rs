//! Readiness polling.
//!
//! Every cloud resource becomes usable some time after the create call
//! returns. `await_ready` repeats a check until it reports ready, the
//! caller cancels, or the optional deadline passes.

use std::future::Future;
use std::time::Duration;

use anyhow::Result;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::application::ports::ProgressReporter;
use crate::domain::ProvisionError;

/// Outcome of a single readiness check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Poll<T> {
    Ready(T),
    NotYet,
}

/// Interval between checks and an optional overall deadline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub interval: Duration,
    pub timeout: Option<Duration>,
}

impl PollPolicy {
    #[must_use]
    pub fn every(interval: Duration) -> Self {
        Self {
            interval,
            timeout: None,
        }
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Repeat `check` until it returns [`Poll::Ready`].
///
/// The first check runs immediately; later checks are spaced by
/// `policy.interval`. An `Err` from `check` is fatal and returned as-is.
///
/// # Errors
///
/// - [`ProvisionError::Cancelled`] once `cancel` fires.
/// - [`ProvisionError::TimedOut`] once `policy.timeout` has elapsed.
/// - Any error returned by `check`.
pub async fn await_ready<T, F, Fut>(
    waiting_for: &str,
    policy: PollPolicy,
    cancel: &CancellationToken,
    reporter: &impl ProgressReporter,
    mut check: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Poll<T>>>,
{
    let started = Instant::now();
    let mut attempt: u32 = 0;
    loop {
        if cancel.is_cancelled() {
            return Err(cancelled(waiting_for));
        }
        attempt = attempt.saturating_add(1);
        if let Poll::Ready(value) = check().await? {
            tracing::debug!(waiting_for, attempt, "ready");
            return Ok(value);
        }
        tracing::debug!(waiting_for, attempt, "not ready");
        reporter.tick();

        if let Some(limit) = policy.timeout
            && started.elapsed() >= limit
        {
            return Err(ProvisionError::TimedOut {
                waiting_for: waiting_for.to_string(),
                after: limit,
            }
            .into());
        }

        tokio::select! {
            () = cancel.cancelled() => return Err(cancelled(waiting_for)),
            () = tokio::time::sleep(policy.interval) => {}
        }
    }
}

fn cancelled(waiting_for: &str) -> anyhow::Error {
    ProvisionError::Cancelled {
        waiting_for: waiting_for.to_string(),
    }
    .into()
}

/// Bundles a policy with the token and reporter shared by one run.
pub struct Waiter<'a, P> {
    pub policy: PollPolicy,
    pub cancel: &'a CancellationToken,
    pub reporter: &'a P,
}

impl<'a, P: ProgressReporter> Waiter<'a, P> {
    pub fn new(policy: PollPolicy, cancel: &'a CancellationToken, reporter: &'a P) -> Self {
        Self {
            policy,
            cancel,
            reporter,
        }
    }

    /// See [`await_ready`].
    ///
    /// # Errors
    ///
    /// Propagates cancellation, timeout and check failures.
    pub async fn until<T, F, Fut>(&self, waiting_for: &str, check: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<Poll<T>>>,
    {
        await_ready(waiting_for, self.policy, self.cancel, self.reporter, check).await
    }
}
