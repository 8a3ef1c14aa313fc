//! Configuration file loading and management
//!
//! This module handles loading and parsing the service configuration from
//! `$XDG_CONFIG_HOME/fleet-managers/config.toml`. If the configuration file
//! doesn't exist, a default configuration is created with documented comments.

use anyhow::{Context, Result};
use fleet_managers_core::PluginApi;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use uuid::Uuid;

/// Main service configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Config {
    /// Service-wide settings
    pub service: ServiceConfig,
    /// How plugins are reached
    pub plugins: PluginsConfig,
    /// Resource store settings
    #[serde(default)]
    pub store: StoreConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServiceConfig {
    /// Log level (trace, debug, info, warn, error)
    /// Default: "info"
    pub log_level: String,
    /// UUID of the aggregator's own manager resource
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root_service_uuid: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PluginsConfig {
    /// URL scheme used to reach plugins ("http" or "https")
    /// Default: "https"
    pub scheme: String,
    /// API root exposed by every plugin
    /// Default: "ODIM/v1"
    pub api_root: String,
    /// Upper bound for any single plugin exchange, in seconds
    /// Default: 30
    pub request_timeout_secs: u64,
    /// Session lifetime in seconds. Sessions never expire when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_ttl_secs: Option<u64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct StoreConfig {
    /// Path to the store database (SQLite)
    /// If None, uses XDG_DATA_HOME/fleet-managers/store.db
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            service: ServiceConfig::default(),
            plugins: PluginsConfig::default(),
            store: StoreConfig::default(),
        }
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            root_service_uuid: None,
        }
    }
}

impl Default for PluginsConfig {
    fn default() -> Self {
        Self {
            scheme: "https".to_string(),
            api_root: "ODIM/v1".to_string(),
            request_timeout_secs: 30,
            session_ttl_secs: None,
        }
    }
}

impl Config {
    /// Load configuration from the specified path
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from the default XDG config location
    ///
    /// If the configuration file doesn't exist, creates a default configuration
    /// file with documented comments.
    pub fn load_default() -> Result<Self> {
        let config_path = Self::default_config_path()?;

        if !config_path.exists() {
            Self::create_default_file(&config_path)?;
        }

        Self::load(&config_path)
    }

    /// Returns `$XDG_CONFIG_HOME/fleet-managers/config.toml`
    pub fn default_config_path() -> Result<PathBuf> {
        let dirs = directories::ProjectDirs::from("", "fleet-managers", "fleet-managers")
            .context("Failed to determine project directories")?;

        Ok(dirs.config_dir().join("config.toml"))
    }

    fn create_default_file(path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        fs::write(path, Self::default_config_content())
            .with_context(|| format!("Failed to write default config file: {}", path.display()))?;

        tracing::info!("Created default configuration file at: {}", path.display());
        Ok(())
    }

    fn default_config_content() -> String {
        r#"# fleet-managers configuration

[service]
# Log level: trace, debug, info, warn, error
# RUST_LOG takes precedence when set.
# Default: "info"
log_level = "info"

# UUID of the aggregator's own manager resource
# root_service_uuid = "a9cf0e1e-c36d-4d5b-9a31-cc07b611c01b"

[plugins]
# Scheme used to reach plugins: "http" or "https"
# Default: "https"
scheme = "https"

# API root every plugin serves under
# Default: "ODIM/v1"
api_root = "ODIM/v1"

# Upper bound for a single plugin exchange, in seconds
# Default: 30
request_timeout_secs = 30

# Session lifetime in seconds. Leave unset to keep sessions until a plugin
# rejects them.
# session_ttl_secs = 1800

[store]
# Path to the SQLite resource store
# If not specified, defaults to $XDG_DATA_HOME/fleet-managers/store.db
# path = "/path/to/store.db"
"#
        .to_string()
    }

    /// Ensures all configuration values are valid and within acceptable ranges.
    pub fn validate(&self) -> Result<()> {
        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&self.service.log_level.as_str()) {
            anyhow::bail!(
                "Invalid log_level: {}. Must be one of: {}",
                self.service.log_level,
                valid_log_levels.join(", ")
            );
        }

        if !matches!(self.plugins.scheme.as_str(), "http" | "https") {
            anyhow::bail!(
                "Invalid plugins.scheme: {}. Must be http or https",
                self.plugins.scheme
            );
        }

        if self.plugins.api_root.trim_matches('/').is_empty() {
            anyhow::bail!("plugins.api_root must not be empty");
        }

        if self.plugins.request_timeout_secs == 0 {
            anyhow::bail!("plugins.request_timeout_secs must be greater than 0");
        }

        if self.plugins.session_ttl_secs == Some(0) {
            anyhow::bail!("plugins.session_ttl_secs must be greater than 0 when set");
        }

        Ok(())
    }

    /// Returns the configured store path or the default XDG data directory path
    pub fn store_path(&self) -> Result<PathBuf> {
        if let Some(ref path) = self.store.path {
            return Ok(path.clone());
        }

        let dirs = directories::ProjectDirs::from("", "fleet-managers", "fleet-managers")
            .context("Failed to determine project directories")?;

        Ok(dirs.data_dir().join("store.db"))
    }

    pub fn plugin_api(&self) -> PluginApi {
        PluginApi::new(self.plugins.scheme.clone(), self.plugins.api_root.clone())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.plugins.request_timeout_secs)
    }

    pub fn session_ttl(&self) -> Option<Duration> {
        self.plugins.session_ttl_secs.map(Duration::from_secs)
    }

    /// URL of the aggregator's own manager, when its UUID is configured.
    pub fn service_manager_url(&self) -> Option<String> {
        self.service
            .root_service_uuid
            .map(|uuid| format!("/redfish/v1/Managers/{}", uuid))
    }
}
