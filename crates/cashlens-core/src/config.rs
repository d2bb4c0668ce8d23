//! Remote analysis configuration
//!
//! Resolution order, lowest to highest priority:
//! 1. Built-in defaults
//! 2. TOML file (`--config`, else ~/.config/cashlens/cashlens.toml if present)
//! 3. Environment variables
//! 4. CLI flags (applied by the caller through `Settings::apply`)
//!
//! Example file:
//!
//! ```toml
//! [remote]
//! dispatch_url = "https://hooks.example.com/webhook/transaction-upload"
//! status_url = "https://hooks.example.com/webhook/transaction-status"
//! poll_interval_ms = 2000
//! request_timeout_secs = 30
//! ```
//!
//! Environment variables:
//! - `CASHLENS_DISPATCH_URL`: remote analysis endpoint (POST)
//! - `CASHLENS_STATUS_URL`: status endpoint for asynchronous jobs (GET)
//! - `CASHLENS_POLL_INTERVAL_MS`: delay between status requests
//! - `CASHLENS_REQUEST_TIMEOUT_SECS`: per-request HTTP timeout

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use tracing::{debug, warn};

use crate::error::{Error, Result};

pub const DEFAULT_POLL_INTERVAL_MS: u64 = 2000;
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Configuration handed to the dispatcher at construction
#[derive(Debug, Clone, PartialEq)]
pub struct DispatcherConfig {
    pub dispatch_url: String,
    pub status_url: String,
    pub poll_interval_ms: u64,
    pub request_timeout_secs: u64,
}

impl DispatcherConfig {
    pub fn new(dispatch_url: &str, status_url: &str, poll_interval_ms: u64) -> Self {
        Self {
            dispatch_url: dispatch_url.to_string(),
            status_url: status_url.to_string(),
            poll_interval_ms,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn validate(&self) -> Result<()> {
        if self.dispatch_url.trim().is_empty() {
            return Err(Error::Config("dispatch_url must not be empty".into()));
        }
        if self.status_url.trim().is_empty() {
            return Err(Error::Config("status_url must not be empty".into()));
        }
        if self.poll_interval_ms == 0 {
            return Err(Error::Config("poll_interval_ms must be greater than 0".into()));
        }
        if self.request_timeout_secs == 0 {
            return Err(Error::Config(
                "request_timeout_secs must be greater than 0".into(),
            ));
        }
        Ok(())
    }
}

/// Layered settings before they become a `DispatcherConfig`
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub remote: RemoteSettings,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RemoteSettings {
    pub dispatch_url: Option<String>,
    pub status_url: Option<String>,
    pub poll_interval_ms: Option<u64>,
    pub request_timeout_secs: Option<u64>,
}

impl Settings {
    /// Load file settings (if any) and apply environment overrides
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        let mut settings = match config_path {
            Some(path) => Self::from_file(path)?,
            None => match default_config_path().filter(|p| p.exists()) {
                Some(path) => Self::from_file(&path)?,
                None => Self::default(),
            },
        };
        settings.apply_env();
        Ok(settings)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        debug!(path = %path.display(), "Loaded config file");
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Config(format!("Invalid config TOML: {}", e)))
    }

    /// Apply `CASHLENS_*` environment variables
    pub fn apply_env(&mut self) {
        self.apply_vars(|name| std::env::var(name).ok());
    }

    fn apply_vars(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(url) = var("CASHLENS_DISPATCH_URL") {
            self.remote.dispatch_url = Some(url);
        }
        if let Some(url) = var("CASHLENS_STATUS_URL") {
            self.remote.status_url = Some(url);
        }
        if let Some(ms) = var("CASHLENS_POLL_INTERVAL_MS") {
            match ms.parse() {
                Ok(ms) => self.remote.poll_interval_ms = Some(ms),
                Err(_) => warn!(value = %ms, "Ignoring invalid CASHLENS_POLL_INTERVAL_MS"),
            }
        }
        if let Some(secs) = var("CASHLENS_REQUEST_TIMEOUT_SECS") {
            match secs.parse() {
                Ok(secs) => self.remote.request_timeout_secs = Some(secs),
                Err(_) => warn!(value = %secs, "Ignoring invalid CASHLENS_REQUEST_TIMEOUT_SECS"),
            }
        }
    }

    /// Overlay explicitly set values (CLI flags)
    pub fn apply(&mut self, overrides: RemoteSettings) {
        let remote = &mut self.remote;
        if overrides.dispatch_url.is_some() {
            remote.dispatch_url = overrides.dispatch_url;
        }
        if overrides.status_url.is_some() {
            remote.status_url = overrides.status_url;
        }
        if overrides.poll_interval_ms.is_some() {
            remote.poll_interval_ms = overrides.poll_interval_ms;
        }
        if overrides.request_timeout_secs.is_some() {
            remote.request_timeout_secs = overrides.request_timeout_secs;
        }
    }

    /// Build the dispatcher config
    ///
    /// Returns `Ok(None)` when no dispatch URL is configured (local-only
    /// mode). The status URL defaults to `<dispatch_url>/status`.
    pub fn dispatcher_config(&self) -> Result<Option<DispatcherConfig>> {
        let Some(dispatch_url) = self
            .remote
            .dispatch_url
            .as_deref()
            .map(str::trim)
            .filter(|u| !u.is_empty())
        else {
            return Ok(None);
        };

        let status_url = self
            .remote
            .status_url
            .clone()
            .unwrap_or_else(|| format!("{}/status", dispatch_url.trim_end_matches('/')));

        let config = DispatcherConfig {
            dispatch_url: dispatch_url.to_string(),
            status_url,
            poll_interval_ms: self
                .remote
                .poll_interval_ms
                .unwrap_or(DEFAULT_POLL_INTERVAL_MS),
            request_timeout_secs: self
                .remote
                .request_timeout_secs
                .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS),
        };
        config.validate()?;
        Ok(Some(config))
    }
}

/// Default config file location
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("cashlens").join("cashlens.toml"))
}
