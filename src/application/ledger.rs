//! Acquisition ledger: every confirmed-ready resource, in acquisition order.
//!
//! Teardown walks the ledger newest-first so dependents go before their
//! dependencies (the tunnel before the bastion, the bastion before its
//! firewall rule and keypair). A release failure is recorded and the walk
//! continues.
//!
//! The ledger is shared by reference between the orchestrator and the
//! interrupt coordinator. Its state sits behind one async mutex that is
//! held for the whole unwind, so a record racing an unwind either lands
//! before the walk starts or is released on the spot.

use anyhow::Result;
use tokio::sync::Mutex;

use crate::domain::ResourceHandle;

/// Releases one resource.
#[allow(async_fn_in_trait)]
pub trait Releaser {
    /// Release `handle`. A resource that no longer exists counts as released.
    ///
    /// # Errors
    ///
    /// Returns an error if the resource could not be released.
    async fn release(&self, handle: &ResourceHandle) -> Result<()>;
}

/// A release that did not succeed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedRelease {
    pub handle: ResourceHandle,
    pub error: String,
}

/// Result of an unwind.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UnwindReport {
    /// Released handles, in release order.
    pub released: Vec<ResourceHandle>,
    pub failed: Vec<FailedRelease>,
}

impl UnwindReport {
    /// `true` when nothing was left behind.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// What happened to a handle passed to [`Ledger::record`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recorded {
    /// Appended; it will be released by the next unwind.
    Tracked,
    /// Teardown had already run, so the resource was released immediately.
    ReleasedInline,
}

#[derive(Debug, Default)]
struct State {
    entries: Vec<ResourceHandle>,
    unwound: bool,
    report: UnwindReport,
}

/// Ordered record of acquired resources, generic over how they are released.
pub struct Ledger<R> {
    releaser: R,
    state: Mutex<State>,
}

impl<R: Releaser> Ledger<R> {
    pub fn new(releaser: R) -> Self {
        Self {
            releaser,
            state: Mutex::new(State::default()),
        }
    }

    pub fn releaser(&self) -> &R {
        &self.releaser
    }

    /// Append a confirmed-ready resource.
    ///
    /// After an unwind has started the resource is released right away
    /// instead, and [`Recorded::ReleasedInline`] is returned.
    pub async fn record(&self, handle: ResourceHandle) -> Recorded {
        let mut state = self.state.lock().await;
        if state.unwound {
            tracing::warn!(resource = %handle, "acquired after teardown began, releasing now");
            let state = &mut *state;
            self.release_into(&mut state.report, handle).await;
            return Recorded::ReleasedInline;
        }
        tracing::info!(resource = %handle, position = state.entries.len(), "recorded");
        state.entries.push(handle);
        Recorded::Tracked
    }

    /// Release a resource that was created but never confirmed ready.
    ///
    /// The handle is not added to the ledger; a failure still counts
    /// against the final report.
    pub async fn discard(&self, handle: ResourceHandle) {
        let mut state = self.state.lock().await;
        tracing::info!(resource = %handle, "discarding unconfirmed resource");
        let state = &mut *state;
        self.release_into(&mut state.report, handle).await;
    }

    /// Release every recorded resource, newest first.
    ///
    /// Runs at most once. Later calls wait for the first to finish and get
    /// its report back, along with anything released inline since.
    pub async fn unwind(&self) -> UnwindReport {
        let mut state = self.state.lock().await;
        if state.unwound {
            tracing::debug!("ledger already unwound");
            return state.report.clone();
        }
        state.unwound = true;

        let entries = std::mem::take(&mut state.entries);
        tracing::info!(count = entries.len(), "unwinding ledger");
        let state = &mut *state;
        for handle in entries.into_iter().rev() {
            self.release_into(&mut state.report, handle).await;
        }
        state.report.clone()
    }

    /// Handles still awaiting release, oldest first.
    pub async fn entries(&self) -> Vec<ResourceHandle> {
        self.state.lock().await.entries.clone()
    }

    pub async fn len(&self) -> usize {
        self.state.lock().await.entries.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.state.lock().await.entries.is_empty()
    }

    async fn release_into(&self, report: &mut UnwindReport, handle: ResourceHandle) {
        match self.releaser.release(&handle).await {
            Ok(()) => {
                tracing::info!(resource = %handle, "released");
                report.released.push(handle);
            }
            Err(e) => {
                let error = format!("{e:#}");
                tracing::error!(resource = %handle, %error, "release failed, manual cleanup required");
                report.failed.push(FailedRelease { handle, error });
            }
        }
    }
}
