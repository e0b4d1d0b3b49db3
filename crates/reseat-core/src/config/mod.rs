//! Loading and validation of `reseat.toml`.
//!
//! Credentials live in two immutable [`TenantConfig`] values (source and
//! target) that are handed to directory-client construction; nothing in the
//! process holds mutable credential state.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use serde::Deserialize;
use url::Url;

use crate::types::TenantRole;

/// Identity of one tenant's directory endpoint plus the client credentials
/// used to authenticate against it. Exactly two instances exist per run.
#[derive(Debug, Clone, Deserialize)]
pub struct TenantConfig {
    pub tenant_id: String,
    pub client_id: String,
    pub client_secret: String,
    /// Token endpoint override. Defaults to the platform identity endpoint
    /// for `tenant_id`.
    pub token_endpoint: Option<Url>,
    /// Directory collection endpoint override. Defaults to the device
    /// enrollment collection of the management API.
    pub directory_endpoint: Option<Url>,
}

impl TenantConfig {
    pub fn token_endpoint(&self) -> anyhow::Result<Url> {
        match &self.token_endpoint {
            Some(url) => Ok(url.clone()),
            None => Url::parse(&format!(
                "https://login.microsoftonline.com/{}/oauth2/v2.0/token",
                self.tenant_id
            ))
            .context("Failed to build token endpoint from tenant id"),
        }
    }

    pub fn directory_endpoint(&self) -> anyhow::Result<Url> {
        match &self.directory_endpoint {
            Some(url) => Ok(url.clone()),
            None => Url::parse(
                "https://graph.microsoft.com/v1.0/deviceManagement/importedWindowsAutopilotDeviceIdentities",
            )
            .context("Failed to build default directory endpoint"),
        }
    }

    fn validate(&self, role: TenantRole) -> anyhow::Result<()> {
        if self.tenant_id.trim().is_empty() {
            anyhow::bail!("[{role}] tenant_id must not be empty");
        }
        if self.client_id.trim().is_empty() {
            anyhow::bail!("[{role}] client_id must not be empty");
        }
        if self.client_secret.trim().is_empty() {
            anyhow::bail!("[{role}] client_secret must not be empty");
        }
        Ok(())
    }
}

/// Timing knobs for the migration workflow. The defaults are the values
/// the workflow was operated with; propagation delay is roughly uniform,
/// so there is no adaptive backoff.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MigrationSettings {
    pub poll_timeout_secs: u64,
    pub poll_interval_secs: u64,
    pub pacing_secs: u64,
}

impl Default for MigrationSettings {
    fn default() -> Self {
        Self {
            poll_timeout_secs: 60,
            poll_interval_secs: 10,
            pacing_secs: 2,
        }
    }
}

impl MigrationSettings {
    pub fn poll_timeout(&self) -> Duration {
        Duration::from_secs(self.poll_timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn pacing(&self) -> Duration {
        Duration::from_secs(self.pacing_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReseatConfig {
    pub source: TenantConfig,
    pub target: TenantConfig,
    #[serde(default)]
    pub migration: MigrationSettings,
}

impl ReseatConfig {
    /// Default config location: `<config dir>/reseat/reseat.toml`.
    pub fn default_path() -> anyhow::Result<PathBuf> {
        let dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?;
        Ok(dir.join("reseat").join("reseat.toml"))
    }

    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::parse(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    pub fn parse(content: &str) -> anyhow::Result<Self> {
        let config: ReseatConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn tenant(&self, role: TenantRole) -> &TenantConfig {
        match role {
            TenantRole::Source => &self.source,
            TenantRole::Target => &self.target,
        }
    }

    fn validate(&self) -> anyhow::Result<()> {
        self.source.validate(TenantRole::Source)?;
        self.target.validate(TenantRole::Target)?;
        if self.migration.poll_interval_secs == 0 {
            anyhow::bail!("[migration] poll_interval_secs must be greater than zero");
        }
        Ok(())
    }
}
