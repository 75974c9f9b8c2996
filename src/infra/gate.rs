//! Operator confirmation on stdin.

use anyhow::{Context, Result};
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::application::ports::OperatorGate;

/// Releases the environment once a line (or end of input) is read from stdin.
pub struct StdinGate;

impl OperatorGate for StdinGate {
    async fn wait_for_release(&self) -> Result<()> {
        let mut line = String::new();
        BufReader::new(tokio::io::stdin())
            .read_line(&mut line)
            .await
            .context("reading confirmation from stdin")?;
        Ok(())
    }
}
