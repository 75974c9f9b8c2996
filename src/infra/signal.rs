//! OS termination signals.

use anyhow::Result;

use crate::application::ports::SignalSource;

/// Listens for SIGINT, SIGTERM and SIGQUIT (Ctrl+C elsewhere).
///
/// Handlers are registered by [`OsSignals::install`]; from then on these
/// signals no longer kill the process, so repeated signals during teardown
/// are absorbed.
#[cfg(unix)]
pub struct OsSignals {
    interrupt: tokio::signal::unix::Signal,
    terminate: tokio::signal::unix::Signal,
    quit: tokio::signal::unix::Signal,
}

#[cfg(unix)]
impl OsSignals {
    /// Register the handlers.
    ///
    /// # Errors
    ///
    /// Returns an error if a handler cannot be registered.
    pub fn install() -> Result<Self> {
        use anyhow::Context;
        use tokio::signal::unix::{SignalKind, signal};
        Ok(Self {
            interrupt: signal(SignalKind::interrupt()).context("registering SIGINT handler")?,
            terminate: signal(SignalKind::terminate()).context("registering SIGTERM handler")?,
            quit: signal(SignalKind::quit()).context("registering SIGQUIT handler")?,
        })
    }
}

#[cfg(unix)]
impl SignalSource for OsSignals {
    async fn recv(&mut self) -> Result<()> {
        let name = tokio::select! {
            _ = self.interrupt.recv() => "SIGINT",
            _ = self.terminate.recv() => "SIGTERM",
            _ = self.quit.recv() => "SIGQUIT",
        };
        tracing::warn!(signal = name, "termination signal received");
        Ok(())
    }
}

#[cfg(not(unix))]
pub struct OsSignals;

#[cfg(not(unix))]
impl OsSignals {
    /// # Errors
    ///
    /// Never fails on this platform; the handler is registered on first use.
    pub fn install() -> Result<Self> {
        Ok(Self)
    }
}

#[cfg(not(unix))]
impl SignalSource for OsSignals {
    async fn recv(&mut self) -> Result<()> {
        use anyhow::Context;
        tokio::signal::ctrl_c().await.context("listening for Ctrl+C")?;
        tracing::warn!("Ctrl+C received");
        Ok(())
    }
}
