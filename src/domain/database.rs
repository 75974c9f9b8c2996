//! Database resource descriptions as returned by the cloud API.

/// Status reported once a cluster or instance accepts connections.
pub const STATUS_AVAILABLE: &str = "available";

/// Statuses from which a restore never becomes available.
const FAILED_STATUSES: &[&str] = &[
    "failed",
    "incompatible-restore",
    "incompatible-parameters",
    "incompatible-network",
    "storage-full",
    "inaccessible-encryption-credentials",
];

/// Returns `true` if `status` is terminal and not `available`.
#[must_use]
pub fn is_failed_status(status: &str) -> bool {
    FAILED_STATUSES.contains(&status)
}

/// One page of a marker-paginated listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// Present when more pages follow.
    pub marker: Option<String>,
}

impl<T> Page<T> {
    #[must_use]
    pub fn last(items: Vec<T>) -> Self {
        Self {
            items,
            marker: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterMember {
    pub identifier: String,
    pub writer: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterSummary {
    pub identifier: String,
    pub status: String,
    pub members: Vec<ClusterMember>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstanceSummary {
    pub identifier: String,
    pub status: String,
    /// Set when the instance belongs to a cluster.
    pub cluster_id: Option<String>,
}

/// A described database cluster.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DbCluster {
    pub identifier: String,
    pub status: String,
}

/// A described database instance.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DbInstance {
    pub identifier: String,
    pub status: String,
    pub engine: String,
    pub address: Option<String>,
    pub port: Option<u16>,
    pub db_name: Option<String>,
    pub master_user: Option<String>,
    pub cluster_id: Option<String>,
}

/// Connection details of a ready database.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseEndpoint {
    pub address: String,
    pub port: u16,
    pub db_name: String,
    pub user: String,
    pub engine: String,
}

impl DbInstance {
    /// Connection details, if the instance already has an endpoint.
    #[must_use]
    pub fn endpoint(&self) -> Option<DatabaseEndpoint> {
        Some(DatabaseEndpoint {
            address: self.address.clone()?,
            port: self.port?,
            db_name: self.db_name.clone().unwrap_or_default(),
            user: self.master_user.clone().unwrap_or_default(),
            engine: self.engine.clone(),
        })
    }
}
