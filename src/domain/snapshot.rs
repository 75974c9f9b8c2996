//! Snapshot selection.

use chrono::{DateTime, Utc};

/// A restorable snapshot of a cluster or an instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub identifier: String,
    pub arn: String,
    /// Cluster or instance the snapshot was taken from.
    pub source_id: String,
    pub engine: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

/// Pick the most recently created snapshot that can be restored.
///
/// Snapshots are ordered by creation time ascending and the last one wins,
/// so the input order is irrelevant. Snapshots still being taken are skipped.
#[must_use]
pub fn latest(mut snapshots: Vec<Snapshot>) -> Option<Snapshot> {
    snapshots.retain(|s| s.status == crate::domain::database::STATUS_AVAILABLE);
    snapshots.sort_by_key(|s| s.created_at);
    snapshots.pop()
}

/// Name for the restored copy: the source identifier plus a random suffix.
#[must_use]
pub fn restored_identifier(source_id: &str, suffix: &str) -> String {
    format!("{source_id}-{suffix}")
}
