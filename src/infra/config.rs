//! Settings file loading.

use std::path::PathBuf;

use anyhow::{Context, Result};

use crate::domain::Settings;

/// Reads [`Settings`] from a YAML file.
///
/// The path is `--config` / `RV_CONFIG` when given, otherwise
/// `~/.rdsvalidator/config.yaml`. A missing file yields the defaults.
pub struct YamlSettingsStore {
    explicit: Option<PathBuf>,
}

impl YamlSettingsStore {
    #[must_use]
    pub fn new(explicit: Option<PathBuf>) -> Self {
        Self { explicit }
    }

    /// Load settings, falling back to defaults when the file does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load(&self) -> Result<Settings> {
        let path = self.path()?;
        if !path.exists() {
            tracing::debug!(path = %path.display(), "no settings file, using defaults");
            return Ok(Settings::default());
        }
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("cannot read {}", path.display()))?;
        let settings =
            serde_yaml::from_str(&content).with_context(|| format!("cannot parse {}", path.display()))?;
        tracing::debug!(path = %path.display(), "settings loaded");
        Ok(settings)
    }

    /// Resolved settings path.
    ///
    /// # Errors
    ///
    /// Returns an error if no explicit path was given and the home
    /// directory cannot be determined.
    pub fn path(&self) -> Result<PathBuf> {
        if let Some(path) = &self.explicit {
            return Ok(path.clone());
        }
        let home =
            dirs::home_dir().ok_or_else(|| anyhow::anyhow!("cannot determine home directory"))?;
        Ok(home.join(".rdsvalidator").join("config.yaml"))
    }
}
