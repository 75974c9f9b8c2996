//! List mode and snapshot lookup over paginated listings.

#![allow(clippy::expect_used)]

use rds_validator::application::services::inventory::{collect, snapshots};
use rds_validator::domain::inventory::{InstanceEntry, MemberEntry};
use rds_validator::domain::{
    ClusterMember, ClusterSummary, InstanceSummary, Page, RestoreSource,
};

use crate::mocks::{CallLog, FakeCloud, snapshot};

fn page<T>(items: Vec<T>, next: Option<&str>) -> Page<T> {
    Page {
        items,
        marker: next.map(str::to_string),
    }
}

fn instance(id: &str, cluster: Option<&str>) -> InstanceSummary {
    InstanceSummary {
        identifier: id.to_string(),
        status: "available".to_string(),
        cluster_id: cluster.map(str::to_string),
    }
}

#[tokio::test]
async fn test_collect_follows_every_page() {
    let log = CallLog::default();
    let mut cloud = FakeCloud::new(&log);
    cloud.instance_pages = vec![
        page(vec![instance("a", None)], Some("1")),
        page(vec![instance("b", None), instance("c", None)], Some("2")),
        page(vec![instance("d", None)], None),
    ];

    let inventory = collect(&cloud).await.expect("collect");

    let ids: Vec<&str> = inventory
        .instances
        .iter()
        .map(|i| i.identifier.as_str())
        .collect();
    assert_eq!(ids, ["a", "b", "c", "d"]);
    assert_eq!(log.count("list_instances"), 3);
    assert!(log.contains("list_instances 2"));
}

#[tokio::test]
async fn test_cluster_members_are_not_listed_as_instances() {
    let log = CallLog::default();
    let mut cloud = FakeCloud::new(&log);
    cloud.cluster_pages = vec![page(
        vec![ClusterSummary {
            identifier: "orders".to_string(),
            status: "available".to_string(),
            members: vec![ClusterMember {
                identifier: "orders-1".to_string(),
                writer: true,
            }],
        }],
        None,
    )];
    cloud.instance_pages = vec![page(
        vec![
            instance("orders-1", Some("orders")),
            instance("billing", None),
            instance("reports", None),
        ],
        None,
    )];

    let inventory = collect(&cloud).await.expect("collect");

    assert_eq!(inventory.clusters.len(), 1);
    assert_eq!(
        inventory.clusters[0].members,
        vec![MemberEntry {
            identifier: "orders-1".to_string(),
            writer: true,
        }]
    );
    assert_eq!(
        inventory.instances,
        vec![
            InstanceEntry {
                identifier: "billing".to_string(),
                status: "available".to_string(),
            },
            InstanceEntry {
                identifier: "reports".to_string(),
                status: "available".to_string(),
            },
        ]
    );
}

#[tokio::test]
async fn test_empty_marker_ends_pagination() {
    let log = CallLog::default();
    let mut cloud = FakeCloud::new(&log);
    cloud.cluster_pages = vec![page(Vec::new(), Some(""))];

    let inventory = collect(&cloud).await.expect("collect");

    assert!(inventory.clusters.is_empty());
    assert_eq!(log.count("list_clusters"), 1);
}

#[tokio::test]
async fn test_listing_error_is_reported_with_context() {
    let log = CallLog::default();
    let mut cloud = FakeCloud::new(&log);
    cloud.failing.insert("list_clusters");

    let err = collect(&cloud).await.expect_err("listing fails");

    assert_eq!(err.to_string(), "listing database clusters");
    assert!(!log.contains("list_instances"));
}

#[tokio::test]
async fn test_snapshots_uses_family_of_source() {
    let log = CallLog::default();
    let mut cloud = FakeCloud::new(&log);
    cloud.snapshots = vec![
        snapshot("s1", "orders", 1, "available"),
        snapshot("s2", "orders", 2, "available"),
    ];

    let found = snapshots(&cloud, &RestoreSource::Cluster("orders".to_string()))
        .await
        .expect("snapshots");

    assert_eq!(found.len(), 2);
    assert!(log.contains("list_cluster_snapshots orders"));
    assert!(!log.contains("list_instance_snapshots"));
}
