//! Application layer: ports, readiness polling, the acquisition ledger and
//! the provisioning use cases.
//!
//! Depends only on `crate::domain`.

pub mod interrupt;
pub mod ledger;
pub mod poller;
pub mod ports;
pub mod services;

pub use interrupt::{InterruptCoordinator, Termination, guard};
pub use ledger::{Ledger, Recorded, Releaser, UnwindReport};
pub use poller::{Poll, PollPolicy, Waiter, await_ready};
pub use ports::{
    CloudProvider, CommandRunner, ComputeApi, DatabaseApi, FirewallApi, KeypairApi,
    OperatorGate, ProgressReporter, ScriptRunner, SignalSource, TunnelLauncher,
};
