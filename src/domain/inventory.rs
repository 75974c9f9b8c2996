//! List-mode document.
//!
//! Clusters are listed with their members; only instances that do not
//! belong to a cluster appear in `instances`.

use serde::Serialize;

use crate::domain::database::{ClusterSummary, InstanceSummary};

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct MemberEntry {
    pub identifier: String,
    pub writer: bool,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ClusterEntry {
    pub identifier: String,
    pub status: String,
    pub members: Vec<MemberEntry>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct InstanceEntry {
    pub identifier: String,
    pub status: String,
}

/// The JSON document printed by `--list`.
#[derive(Debug, Clone, Serialize, PartialEq, Eq, Default)]
pub struct Inventory {
    pub clusters: Vec<ClusterEntry>,
    pub instances: Vec<InstanceEntry>,
}

impl Inventory {
    /// Build the document from raw listings.
    #[must_use]
    pub fn build(clusters: Vec<ClusterSummary>, instances: Vec<InstanceSummary>) -> Self {
        let clusters = clusters
            .into_iter()
            .map(|c| ClusterEntry {
                identifier: c.identifier,
                status: c.status,
                members: c
                    .members
                    .into_iter()
                    .map(|m| MemberEntry {
                        identifier: m.identifier,
                        writer: m.writer,
                    })
                    .collect(),
            })
            .collect();
        let instances = instances
            .into_iter()
            .filter(|i| i.cluster_id.is_none())
            .map(|i| InstanceEntry {
                identifier: i.identifier,
                status: i.status,
            })
            .collect();
        Self {
            clusters,
            instances,
        }
    }
}
