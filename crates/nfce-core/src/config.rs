//! Configuration management for NFC-e retrieval.
//!
//! Provides TOML-based configuration with XDG-compliant paths and
//! environment variable overrides.

use crate::error::{ConfigError, ConfigResult};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main application configuration.
///
/// This is loaded from `~/.config/nfce/config.toml` (or platform equivalent).
/// If the file doesn't exist, default values are used.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Portal connection settings
    pub portal: PortalConfig,
    /// Scraping protocol settings
    pub scraping: ScrapingConfig,
    /// Background job settings
    pub jobs: JobsConfig,
    /// HTTP API settings
    pub server: ServerConfig,
}

impl AppConfig {
    /// Load configuration from disk, falling back to defaults if not found.
    ///
    /// # Errors
    /// Returns error if:
    /// - Config directory cannot be determined
    /// - File exists but cannot be read
    /// - File contents are not valid TOML
    pub fn load() -> ConfigResult<Self> {
        Self::load_from(&Self::config_path()?)
    }

    /// Load configuration from an explicit path, falling back to defaults
    /// when the file is absent.
    pub fn load_from(path: &Path) -> ConfigResult<Self> {
        if path.exists() {
            tracing::debug!("Loading config from {}", path.display());
            let contents = fs::read_to_string(path)?;
            let config: Self = toml::from_str(&contents)?;
            config.validate()?;
            Ok(config)
        } else {
            tracing::debug!("Config file not found, using defaults");
            Ok(Self::default())
        }
    }

    /// Load configuration with environment variable overrides.
    ///
    /// Supports the following environment variables:
    /// - `NFCE_BIND`: Override the HTTP listen address
    /// - `NFCE_ACCEPT_INVALID_CERTS`: Override TLS certificate checking (true/false)
    /// - `NFCE_JOB_DEADLINE_SECS`: Override the per-job deadline
    /// - `NFCE_JOB_RETENTION_SECS`: Override how long job records are kept
    /// - `NFCE_MAX_CAPTCHA_ATTEMPTS`: Override the captcha retry cap
    pub fn load_with_env() -> ConfigResult<Self> {
        let mut config = Self::load()?;
        config.apply_env(|name| std::env::var(name).ok());
        config.validate()?;
        Ok(config)
    }

    /// Apply overrides from a variable lookup. Unparseable values are ignored.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(bind) = lookup("NFCE_BIND") {
            tracing::debug!("Override server.bind from env: {}", bind);
            self.server.bind = bind;
        }

        if let Some(Ok(accept)) = lookup("NFCE_ACCEPT_INVALID_CERTS").map(|v| v.parse()) {
            self.portal.accept_invalid_certs = accept;
            tracing::debug!("Override portal.accept_invalid_certs from env: {}", accept);
        }

        if let Some(Ok(secs)) = lookup("NFCE_JOB_DEADLINE_SECS").map(|v| v.parse()) {
            self.jobs.deadline_secs = secs;
            tracing::debug!("Override jobs.deadline_secs from env: {}", secs);
        }

        if let Some(Ok(secs)) = lookup("NFCE_JOB_RETENTION_SECS").map(|v| v.parse()) {
            self.jobs.retention_secs = secs;
            tracing::debug!("Override jobs.retention_secs from env: {}", secs);
        }

        if let Some(Ok(attempts)) = lookup("NFCE_MAX_CAPTCHA_ATTEMPTS").map(|v| v.parse()) {
            self.scraping.max_captcha_attempts = attempts;
            tracing::debug!("Override scraping.max_captcha_attempts from env: {}", attempts);
        }
    }

    /// Reject values that would make the system unusable.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.scraping.max_captcha_attempts == 0 {
            return Err(invalid("scraping.max_captcha_attempts", "must be at least 1"));
        }
        if self.jobs.deadline_secs == 0 {
            return Err(invalid("jobs.deadline_secs", "must be greater than zero"));
        }
        if self.jobs.janitor_interval_secs == 0 {
            return Err(invalid("jobs.janitor_interval_secs", "must be greater than zero"));
        }
        if self.portal.base_url.trim().is_empty() {
            return Err(invalid("portal.base_url", "must not be empty"));
        }
        Ok(())
    }

    /// Get the path to the configuration file.
    ///
    /// Uses XDG base directories: `~/.config/nfce/config.toml`
    pub fn config_path() -> ConfigResult<PathBuf> {
        let dirs = ProjectDirs::from("br", "nfce", "nfce").ok_or(ConfigError::NoConfigDir)?;
        Ok(dirs.config_dir().join("config.toml"))
    }
}

fn invalid(field: &str, reason: &str) -> ConfigError {
    ConfigError::InvalidValue {
        field: field.to_string(),
        reason: reason.to_string(),
    }
}

/// Portal connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PortalConfig {
    /// Base URL of the SEFAZ-BA portal
    pub base_url: String,
    /// Request timeout in seconds
    pub timeout_secs: u64,
    /// User agent string
    pub user_agent: String,
    /// Value of the `Accept-Language` header
    pub accept_language: String,
    /// Accept certificates that fail verification
    pub accept_invalid_certs: bool,
}

impl PortalConfig {
    /// Request timeout as a [`Duration`].
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for PortalConfig {
    fn default() -> Self {
        Self {
            base_url: "https://nfe.sefaz.ba.gov.br".to_string(),
            timeout_secs: 30,
            user_agent: "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0 Safari/537.36"
                .to_string(),
            accept_language: "pt-BR,pt;q=0.9,en-US;q=0.8,en;q=0.7".to_string(),
            // the BA portal certificate chain is not always trusted
            accept_invalid_certs: true,
        }
    }
}

/// Scraping protocol settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScrapingConfig {
    /// Captcha submissions allowed per run before giving up
    pub max_captcha_attempts: u32,
}

impl Default for ScrapingConfig {
    fn default() -> Self {
        Self {
            max_captcha_attempts: 5,
        }
    }
}

/// Background job settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct JobsConfig {
    /// Wall-clock limit for one job run, in seconds
    pub deadline_secs: u64,
    /// How long a job record is kept after creation, in seconds
    pub retention_secs: u64,
    /// How often the janitor sweeps expired records, in seconds
    pub janitor_interval_secs: u64,
}

impl JobsConfig {
    /// Per-job deadline as a [`Duration`].
    #[must_use]
    pub fn deadline(&self) -> Duration {
        Duration::from_secs(self.deadline_secs)
    }

    /// Retention window as a [`Duration`].
    #[must_use]
    pub fn retention(&self) -> Duration {
        Duration::from_secs(self.retention_secs)
    }

    /// Janitor tick interval as a [`Duration`].
    #[must_use]
    pub fn janitor_interval(&self) -> Duration {
        Duration::from_secs(self.janitor_interval_secs)
    }
}

impl Default for JobsConfig {
    fn default() -> Self {
        Self {
            deadline_secs: 60,
            retention_secs: 120,
            janitor_interval_secs: 60,
        }
    }
}

/// HTTP API settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Listen address
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:8080".to_string(),
        }
    }
}
