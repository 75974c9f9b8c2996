//! JSON output for list mode.

use anyhow::{Context, Result};

use crate::domain::inventory::Inventory;

/// Pretty-print the inventory document.
///
/// # Errors
///
/// Returns an error if serialization fails.
pub fn format_inventory(inventory: &Inventory) -> Result<String> {
    serde_json::to_string_pretty(inventory).context("JSON serialization failed")
}

/// Write the inventory document to stdout.
///
/// # Errors
///
/// Returns an error if serialization fails.
pub fn print_inventory(inventory: &Inventory) -> Result<()> {
    println!("{}", format_inventory(inventory)?);
    Ok(())
}
