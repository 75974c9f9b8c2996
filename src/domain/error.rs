//! Typed domain error enums.
//!
//! All error types implement `thiserror::Error` and convert to `anyhow::Error`
//! via the `?` operator. Callers that need to branch on a specific failure
//! use `anyhow::Error::downcast_ref`.

use std::time::Duration;

use thiserror::Error;

use crate::domain::resource::ResourceKind;

// ── Usage errors ──────────────────────────────────────────────────────────────

/// Flag combinations rejected before any resource is touched.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum UsageError {
    #[error("Must specify one of --list, --cluster-id or --instance-id")]
    NoMode,

    #[error("--cluster-id and --instance-id are mutually exclusive")]
    BothSources,

    #[error("--list cannot be combined with --cluster-id or --instance-id")]
    ListWithSource,

    #[error("--proxy and --proxy-create are mutually exclusive")]
    BothProxies,

    #[error("Must provide --proxy-key when using --proxy")]
    MissingProxyKey,

    #[error("Must provide --proxy-vpc and --proxy-subnet when using --proxy-create")]
    MissingBastionNetwork,
}

// ── Provisioning errors ───────────────────────────────────────────────────────

/// Failures raised while acquiring resources.
#[derive(Debug, Error)]
pub enum ProvisionError {
    #[error("cancelled while waiting for {waiting_for}")]
    Cancelled { waiting_for: String },

    #[error("gave up waiting for {waiting_for} after {}s", .after.as_secs())]
    TimedOut { waiting_for: String, after: Duration },

    #[error("{kind} {id} entered state '{status}'")]
    FailedState {
        kind: ResourceKind,
        id: String,
        status: String,
    },

    #[error("no snapshots found for {source_id}")]
    NoSnapshots { source_id: String },

    #[error("no machine image matches the bastion image filter")]
    NoImage,

    #[error("script {script} exited with {}", describe_exit(.code))]
    ScriptFailed { script: String, code: Option<i32> },
}

#[allow(clippy::ref_option)]
fn describe_exit(code: &Option<i32>) -> String {
    code.map_or_else(|| "a signal".to_string(), |c| format!("status {c}"))
}

impl ProvisionError {
    /// Returns `true` when the error stems from an operator interrupt.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }
}

// ── Cloud errors ──────────────────────────────────────────────────────────────

/// An error reported by the cloud API for a single operation.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{operation} failed ({code}): {message}")]
pub struct CloudError {
    /// API operation name, e.g. `DescribeDBInstances`.
    pub operation: String,
    /// Service error code, e.g. `DBInstanceNotFound`.
    pub code: String,
    /// Human-readable message returned by the service.
    pub message: String,
}

impl CloudError {
    /// Returns `true` when the service reports that the resource does not exist.
    ///
    /// Covers the EC2 (`InvalidKeyPair.NotFound`, `InvalidGroup.NotFound`,
    /// `InvalidInstanceID.NotFound`) and RDS (`DBInstanceNotFound`,
    /// `DBClusterNotFoundFault`) spellings.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        self.code.contains("NotFound")
    }
}

/// Returns `true` if `err` wraps a [`CloudError`] reporting a missing resource.
#[must_use]
pub fn is_not_found(err: &anyhow::Error) -> bool {
    err.chain()
        .filter_map(|e| e.downcast_ref::<CloudError>())
        .any(CloudError::is_not_found)
}

/// Returns `true` if `err` wraps a [`ProvisionError::Cancelled`].
#[must_use]
pub fn is_cancelled(err: &anyhow::Error) -> bool {
    err.chain()
        .filter_map(|e| e.downcast_ref::<ProvisionError>())
        .any(ProvisionError::is_cancelled)
}
