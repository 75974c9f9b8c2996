//! Read-only queries: list mode and snapshot lookup.

use std::future::Future;

use anyhow::{Context, Result};

use crate::application::ports::DatabaseApi;
use crate::domain::inventory::Inventory;
use crate::domain::{Page, RestoreSource, Snapshot};

/// Fetch every page of a marker-paginated listing.
///
/// # Errors
///
/// Returns the first error raised by `fetch`.
pub async fn drain<T, F, Fut>(mut fetch: F) -> Result<Vec<T>>
where
    F: FnMut(Option<String>) -> Fut,
    Fut: Future<Output = Result<Page<T>>>,
{
    let mut items = Vec::new();
    let mut marker = None;
    loop {
        let page = fetch(marker.take()).await?;
        items.extend(page.items);
        match page.marker {
            Some(next) if !next.is_empty() => marker = Some(next),
            _ => return Ok(items),
        }
    }
}

/// Collect every cluster and every standalone instance in the account.
///
/// # Errors
///
/// Returns an error if any listing call fails.
pub async fn collect(api: &impl DatabaseApi) -> Result<Inventory> {
    let clusters = drain(move |m| async move { api.list_clusters(m.as_deref()).await })
        .await
        .context("listing database clusters")?;
    let instances = drain(move |m| async move { api.list_instances(m.as_deref()).await })
        .await
        .context("listing database instances")?;
    tracing::debug!(
        clusters = clusters.len(),
        instances = instances.len(),
        "inventory collected"
    );
    Ok(Inventory::build(clusters, instances))
}

/// Every snapshot taken of `source`, across all pages.
///
/// # Errors
///
/// Returns an error if a listing call fails.
pub async fn snapshots(api: &impl DatabaseApi, source: &RestoreSource) -> Result<Vec<Snapshot>> {
    match source {
        RestoreSource::Cluster(id) => {
            let id = id.as_str();
            drain(move |m| async move { api.list_cluster_snapshots(id, m.as_deref()).await })
                .await
                .with_context(|| format!("listing snapshots of cluster {id}"))
        }
        RestoreSource::Instance(id) => {
            let id = id.as_str();
            drain(move |m| async move { api.list_instance_snapshots(id, m.as_deref()).await })
                .await
                .with_context(|| format!("listing snapshots of instance {id}"))
        }
    }
}
