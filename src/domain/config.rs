//! Settings schema for `~/.rdsvalidator/config.yaml`.
//!
//! Pure types only. Loading lives in `crate::infra::config`.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Top-level settings file.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(default)]
pub struct Settings {
    pub poll: PollSettings,
    pub bastion: BastionSettings,
    pub database: DatabaseSettings,
}

/// Readiness polling intervals.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PollSettings {
    /// Interval for keypair, firewall rule and compute instance checks.
    pub compute_interval_secs: u64,
    /// Interval for database cluster/instance checks.
    pub database_interval_secs: u64,
    /// Interval between SSH reachability probes.
    pub ssh_interval_secs: u64,
    /// Upper bound for any single wait. Unset means wait forever.
    pub timeout_secs: Option<u64>,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            compute_interval_secs: 1,
            database_interval_secs: 5,
            ssh_interval_secs: 1,
            timeout_secs: None,
        }
    }
}

impl PollSettings {
    #[must_use]
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}

/// Ephemeral bastion machine settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct BastionSettings {
    pub instance_type: String,
    /// Account that publishes the bastion image.
    pub image_owner: String,
    /// Image name filter; the newest match is used.
    pub image_name: String,
    pub architecture: String,
}

impl Default for BastionSettings {
    fn default() -> Self {
        Self {
            instance_type: "t4g.nano".to_string(),
            image_owner: "099720109477".to_string(),
            image_name: "ubuntu/images/*ubuntu-focal-20.*-server-*".to_string(),
            architecture: "arm64".to_string(),
        }
    }
}

/// Restored database settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct DatabaseSettings {
    /// Local tunnel port = database port + offset, unless `--local-port` is given.
    pub port_offset: u16,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self { port_offset: 10000 }
    }
}
