//! Preview configuration
//!
//! Configuration is loaded from:
//! 1. Default values
//! 2. Config file (~/.config/foxhound/preview.toml)
//! 3. Environment variables (FOXHOUND_* prefix)
//!
//! Environment variables take precedence over config file values.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Environment variable prefix
const ENV_PREFIX: &str = "FOXHOUND";

/// Debounce window for authoritative refreshes while typing
pub const DEFAULT_DEBOUNCE_MS: u64 = 1000;

/// Preview engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreviewConfig {
    /// Base URL of the site (REST routes hang off `<site_url>/wp-json/`)
    #[serde(default = "default_site_url")]
    pub site_url: String,

    /// Namespace of the theme's own REST routes
    #[serde(default = "default_rest_namespace")]
    pub rest_namespace: String,

    /// Debounce window for deferred refreshes, in milliseconds
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,

    /// Timeout for a single REST request, in seconds
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Menu locations rendered by the page
    #[serde(default = "default_menu_locations")]
    pub menu_locations: Vec<String>,

    /// Customizer changeset the server should render against
    #[serde(default)]
    pub changeset_uuid: Option<Uuid>,
}

impl Default for PreviewConfig {
    fn default() -> Self {
        Self {
            site_url: default_site_url(),
            rest_namespace: default_rest_namespace(),
            debounce_ms: default_debounce_ms(),
            request_timeout_secs: default_request_timeout_secs(),
            menu_locations: default_menu_locations(),
            changeset_uuid: None,
        }
    }
}

impl PreviewConfig {
    /// Load configuration from default location and environment
    ///
    /// Order of precedence (highest to lowest):
    /// 1. Environment variables (FOXHOUND_SITE_URL, FOXHOUND_DEBOUNCE_MS, ...)
    /// 2. Config file (~/.config/foxhound/preview.toml or FOXHOUND_CONFIG)
    /// 3. Default values
    pub fn load() -> Result<Self> {
        Self::load_from_path(&Self::config_file_path())
    }

    /// Load configuration from a specific path
    ///
    /// If the file doesn't exist, defaults are used.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {:?}", path))?;
            toml::from_str(&content)
                .with_context(|| format!("Failed to parse config file: {:?}", path))?
        } else {
            Self::default()
        };

        config.apply_env_overrides()?;
        Ok(config)
    }

    /// Load configuration from a TOML string
    pub fn load_from_str(toml_content: &str) -> Result<Self> {
        let mut config: PreviewConfig =
            toml::from_str(toml_content).context("Failed to parse config TOML")?;
        config.apply_env_overrides()?;
        Ok(config)
    }

    fn apply_env_overrides(&mut self) -> Result<()> {
        if let Ok(val) = std::env::var(format!("{}_SITE_URL", ENV_PREFIX)) {
            self.site_url = val;
        }

        if let Ok(val) = std::env::var(format!("{}_REST_NAMESPACE", ENV_PREFIX)) {
            self.rest_namespace = val;
        }

        if let Ok(val) = std::env::var(format!("{}_DEBOUNCE_MS", ENV_PREFIX)) {
            self.debounce_ms = val
                .parse()
                .with_context(|| format!("Invalid {}_DEBOUNCE_MS: {:?}", ENV_PREFIX, val))?;
        }

        // Empty string clears it
        if let Ok(val) = std::env::var(format!("{}_CHANGESET_UUID", ENV_PREFIX)) {
            self.changeset_uuid = if val.is_empty() {
                None
            } else {
                Some(
                    Uuid::parse_str(&val)
                        .with_context(|| format!("Invalid {}_CHANGESET_UUID", ENV_PREFIX))?,
                )
            };
        }

        Ok(())
    }

    /// Get the config file path
    ///
    /// Can be overridden with FOXHOUND_CONFIG environment variable
    pub fn config_file_path() -> PathBuf {
        if let Ok(path) = std::env::var(format!("{}_CONFIG", ENV_PREFIX)) {
            return PathBuf::from(path);
        }

        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("foxhound")
            .join("preview.toml")
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Root of the REST API (`<site_url>/wp-json`)
    pub fn rest_root(&self) -> String {
        format!("{}/wp-json", self.site_url.trim_end_matches('/'))
    }
}

fn default_site_url() -> String {
    "http://localhost".to_string()
}

fn default_rest_namespace() -> String {
    "foxhound".to_string()
}

fn default_debounce_ms() -> u64 {
    DEFAULT_DEBOUNCE_MS
}

fn default_request_timeout_secs() -> u64 {
    10
}

fn default_menu_locations() -> Vec<String> {
    vec!["primary".to_string()]
}
