//! SSH port forwarding through a proxy host.

use std::collections::HashMap;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::Duration;

use anyhow::{Context, Result};
use tempfile::TempPath;
use tokio::process::Child;

use crate::application::ports::{CommandRunner, Forward, Identity, SshTarget, TunnelLauncher};
use crate::infra::command_runner::SSH_PROBE_TIMEOUT;

#[cfg(windows)]
const DEVNULL: &str = "NUL";
#[cfg(not(windows))]
const DEVNULL: &str = "/dev/null";

/// How long a fresh forward must stay up before it counts as launched.
const LAUNCH_GRACE: Duration = Duration::from_millis(500);

/// Launches `ssh -N -L` forwards and keeps their child handles by pid.
///
/// Key material written by [`Identity::Material`] lives in temp files that
/// are removed when this value is dropped.
pub struct SshTunnels<R: CommandRunner> {
    runner: R,
    children: Mutex<HashMap<u32, Child>>,
    keys: Mutex<Vec<TempPath>>,
}

impl<R: CommandRunner> SshTunnels<R> {
    pub fn new(runner: R) -> Self {
        Self {
            runner,
            children: Mutex::new(HashMap::new()),
            keys: Mutex::new(Vec::new()),
        }
    }

    fn take_child(&self, pid: u32) -> Option<Child> {
        self.children.lock().ok()?.remove(&pid)
    }
}

fn common_args(target: &SshTarget) -> Vec<String> {
    vec![
        "-i".to_string(),
        target.identity.to_string_lossy().into_owned(),
        "-o".to_string(),
        "StrictHostKeyChecking=no".to_string(),
        "-o".to_string(),
        format!("UserKnownHostsFile={DEVNULL}"),
        "-o".to_string(),
        "LogLevel=ERROR".to_string(),
        "-o".to_string(),
        "BatchMode=yes".to_string(),
    ]
}

fn write_key(material: &str) -> Result<TempPath> {
    let mut file = tempfile::Builder::new()
        .prefix("rdsvalidator-key-")
        .tempfile()
        .context("creating key file")?;
    file.write_all(material.as_bytes())
        .context("writing key file")?;
    if !material.ends_with('\n') {
        file.write_all(b"\n").context("writing key file")?;
    }
    // tempfile creates the file with 0600 on unix, which ssh requires.
    Ok(file.into_temp_path())
}

impl<R: CommandRunner> TunnelLauncher for SshTunnels<R> {
    fn load_identity(&self, identity: Identity<'_>) -> Result<PathBuf> {
        match identity {
            Identity::File(path) => {
                anyhow::ensure!(path.is_file(), "key file {} not found", path.display());
                Ok(path.to_path_buf())
            }
            Identity::Material(material) => {
                let key = write_key(material)?;
                let path = key.to_path_buf();
                self.keys
                    .lock()
                    .map_err(|_| anyhow::anyhow!("key registry poisoned"))?
                    .push(key);
                Ok(path)
            }
        }
    }

    async fn probe(&self, target: &SshTarget) -> Result<bool> {
        let mut args = common_args(target);
        args.extend([
            "-o".to_string(),
            "ConnectTimeout=5".to_string(),
            format!("{}@{}", target.user, target.host),
            "true".to_string(),
        ]);
        let args: Vec<&str> = args.iter().map(String::as_str).collect();
        let output = self
            .runner
            .run_with_timeout("ssh", &args, SSH_PROBE_TIMEOUT)
            .await?;
        if !output.status.success() {
            tracing::debug!(
                host = %target.host,
                stderr = %String::from_utf8_lossy(&output.stderr).trim(),
                "ssh probe failed"
            );
        }
        Ok(output.status.success())
    }

    async fn launch(&self, target: &SshTarget, forward: &Forward) -> Result<u32> {
        let mut args = common_args(target);
        args.extend([
            "-N".to_string(),
            "-o".to_string(),
            "ExitOnForwardFailure=yes".to_string(),
            "-o".to_string(),
            "ServerAliveInterval=30".to_string(),
            "-L".to_string(),
            format!(
                "{}:{}:{}",
                forward.local_port, forward.remote_host, forward.remote_port
            ),
            format!("{}@{}", target.user, target.host),
        ]);
        let args: Vec<&str> = args.iter().map(String::as_str).collect();
        let mut child = self.runner.spawn("ssh", &args)?;
        let pid = child.id().context("ssh exited before reporting a pid")?;

        tokio::time::sleep(LAUNCH_GRACE).await;
        if let Some(status) = child.try_wait().context("checking ssh tunnel")? {
            anyhow::bail!("ssh tunnel exited immediately ({status})");
        }

        tracing::info!(pid, local_port = forward.local_port, "ssh tunnel started");
        self.children
            .lock()
            .map_err(|_| anyhow::anyhow!("process registry poisoned"))?
            .insert(pid, child);
        Ok(pid)
    }

    async fn terminate(&self, pid: u32) -> Result<()> {
        let Some(mut child) = self.take_child(pid) else {
            tracing::debug!(pid, "no such tunnel process, nothing to stop");
            return Ok(());
        };
        if let Some(status) = child.try_wait().context("checking ssh tunnel")? {
            tracing::debug!(pid, %status, "tunnel already exited");
            return Ok(());
        }
        child
            .kill()
            .await
            .with_context(|| format!("stopping ssh tunnel (pid {pid})"))
    }
}
