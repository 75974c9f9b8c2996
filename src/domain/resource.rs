//! Resource handles, one closed variant per provisionable resource kind.
//!
//! A handle is only ever built from an identifier returned by a successful
//! creation call whose readiness has been confirmed; it carries just enough
//! to release the resource again.

use std::fmt;

/// The kinds of resources a run can acquire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Keypair,
    FirewallRule,
    ComputeInstance,
    DatabaseCluster,
    DatabaseInstance,
    ExternalProcess,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Keypair => "keypair",
            Self::FirewallRule => "firewall rule",
            Self::ComputeInstance => "compute instance",
            Self::DatabaseCluster => "database cluster",
            Self::DatabaseInstance => "database instance",
            Self::ExternalProcess => "process",
        };
        f.write_str(name)
    }
}

/// Release token for one acquired resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceHandle {
    Keypair { id: String, name: String },
    FirewallRule { group_id: String, name: String },
    ComputeInstance { instance_id: String },
    DatabaseCluster { cluster_id: String },
    /// `cluster_id` is set for members of a restored cluster.
    DatabaseInstance {
        instance_id: String,
        cluster_id: Option<String>,
    },
    ExternalProcess { pid: u32, label: String },
}

impl ResourceHandle {
    #[must_use]
    pub fn kind(&self) -> ResourceKind {
        match self {
            Self::Keypair { .. } => ResourceKind::Keypair,
            Self::FirewallRule { .. } => ResourceKind::FirewallRule,
            Self::ComputeInstance { .. } => ResourceKind::ComputeInstance,
            Self::DatabaseCluster { .. } => ResourceKind::DatabaseCluster,
            Self::DatabaseInstance { .. } => ResourceKind::DatabaseInstance,
            Self::ExternalProcess { .. } => ResourceKind::ExternalProcess,
        }
    }

    /// The identifier the release call is issued against.
    #[must_use]
    pub fn id(&self) -> String {
        match self {
            Self::Keypair { id, .. } => id.clone(),
            Self::FirewallRule { group_id, .. } => group_id.clone(),
            Self::ComputeInstance { instance_id } | Self::DatabaseInstance { instance_id, .. } => {
                instance_id.clone()
            }
            Self::DatabaseCluster { cluster_id } => cluster_id.clone(),
            Self::ExternalProcess { pid, .. } => pid.to_string(),
        }
    }
}

impl fmt::Display for ResourceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Keypair { id, name } => write!(f, "keypair {name} ({id})"),
            Self::FirewallRule { group_id, name } => write!(f, "firewall rule {name} ({group_id})"),
            Self::ExternalProcess { pid, label } => write!(f, "{label} (pid {pid})"),
            other => write!(f, "{} {}", other.kind(), other.id()),
        }
    }
}
