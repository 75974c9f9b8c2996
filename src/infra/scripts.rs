//! Script directory runner.

use std::path::{Path, PathBuf};
use std::process::ExitStatus;

use anyhow::{Context, Result};

use crate::application::ports::{CommandRunner, ScriptRunner};

/// Runs every regular file in a directory, in file name order.
///
/// Scripts inherit this process's stdio and environment; the bindings are
/// added on top.
pub struct DirScriptRunner<R: CommandRunner> {
    runner: R,
}

impl<R: CommandRunner> DirScriptRunner<R> {
    pub fn new(runner: R) -> Self {
        Self { runner }
    }
}

impl<R: CommandRunner> ScriptRunner for DirScriptRunner<R> {
    fn list(&self, dir: &Path) -> Result<Vec<PathBuf>> {
        let entries =
            std::fs::read_dir(dir).with_context(|| format!("cannot read {}", dir.display()))?;
        let mut scripts = Vec::new();
        for entry in entries {
            let entry = entry.with_context(|| format!("cannot read {}", dir.display()))?;
            // Follows symlinks: a link to a file counts as a script.
            let is_file = std::fs::metadata(entry.path()).is_ok_and(|m| m.is_file());
            if is_file {
                scripts.push(entry.path());
            } else {
                tracing::debug!(path = %entry.path().display(), "skipping non-file");
            }
        }
        scripts.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
        Ok(scripts)
    }

    async fn run(&self, script: &Path, envs: &[(&str, &str)]) -> Result<ExitStatus> {
        let program = script.to_string_lossy();
        tracing::info!(script = %program, "running script");
        self.runner.run_status(&program, &[], envs).await
    }
}
