//! `--list`: print clusters and standalone instances as JSON.

use anyhow::Result;

use crate::application::ports::DatabaseApi;
use crate::application::services::inventory;
use crate::output::json;

/// Run list mode.
///
/// # Errors
///
/// Returns an error if a listing call fails.
pub async fn run(cloud: &impl DatabaseApi) -> Result<()> {
    let inventory = inventory::collect(cloud).await?;
    json::print_inventory(&inventory)
}
