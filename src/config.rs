//! Typed client configuration.
//!
//! Loaded from TOML or JSON and validated once at load time, so the clients
//! never look settings up by string key.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_CACHE_LIFETIME_MINUTES: u64 = 1440;
pub const DEFAULT_CACHE_PREFIX: &str = "ga4_analytics_data";

fn default_true() -> bool {
    true
}

fn default_lifetime() -> u64 {
    DEFAULT_CACHE_LIFETIME_MINUTES
}

fn default_prefix() -> String {
    DEFAULT_CACHE_PREFIX.to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheSettings {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_lifetime")]
    pub lifetime_in_minutes: u64,
    /// Key prefix shared by every entry this client writes
    #[serde(default = "default_prefix")]
    pub prefix: String,
}

impl Default for CacheSettings {
    fn default() -> Self {
        CacheSettings {
            enabled: true,
            lifetime_in_minutes: DEFAULT_CACHE_LIFETIME_MINUTES,
            prefix: default_prefix(),
        }
    }
}

impl CacheSettings {
    pub fn lifetime(&self) -> Duration {
        Duration::from_secs(self.lifetime_in_minutes.saturating_mul(60))
    }
}

/// Settings of one named client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientConfig {
    pub property_id: String,
    /// Absolute, or relative to the working directory
    pub service_account_credentials_json: PathBuf,
    #[serde(default)]
    pub cache: CacheSettings,
    #[serde(default)]
    pub proxy: Option<String>,
    /// Hosts that bypass the proxy
    #[serde(default)]
    pub no_proxy: Vec<String>,
}

impl ClientConfig {
    pub fn new(property_id: impl Into<String>, credentials: impl Into<PathBuf>) -> Self {
        ClientConfig {
            property_id: property_id.into(),
            service_account_credentials_json: credentials.into(),
            cache: CacheSettings::default(),
            proxy: None,
            no_proxy: Vec::new(),
        }
    }

    pub fn has_proxy(&self) -> bool {
        self.proxy.as_deref().is_some_and(|proxy| !proxy.is_empty())
    }

    fn validate(&self, name: &str) -> Result<(), ConfigError> {
        if self.property_id.trim().is_empty() {
            return Err(ConfigError::Invalid(format!(
                "client \"{}\": property_id must not be empty",
                name
            )));
        }
        if self.service_account_credentials_json.as_os_str().is_empty() {
            return Err(ConfigError::Invalid(format!(
                "client \"{}\": service_account_credentials_json must not be empty",
                name
            )));
        }
        if self.cache.enabled && self.cache.lifetime_in_minutes == 0 {
            return Err(ConfigError::Invalid(format!(
                "client \"{}\": cache.lifetime_in_minutes must be greater than 0",
                name
            )));
        }
        Ok(())
    }
}

/// Top-level configuration: a set of named clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub default_client: Option<String>,
    /// Expose per-client diagnostic summaries
    #[serde(default)]
    pub diagnostics: bool,
    pub clients: BTreeMap<String, ClientConfig>,
}

impl Config {
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_str(contents: &str) -> Result<Self, ConfigError> {
        let config: Config = serde_json::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads a `.json` file as JSON and anything else as TOML.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)?;
        let is_json = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));

        if is_json {
            Self::from_json_str(&contents)
        } else {
            Self::from_toml_str(&contents)
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.clients.is_empty() {
            return Err(ConfigError::Invalid(
                "at least one client must be configured".to_string(),
            ));
        }
        for (name, client) in &self.clients {
            client.validate(name)?;
        }
        if let Some(default) = &self.default_client {
            if !self.clients.contains_key(default) {
                return Err(ConfigError::Invalid(format!(
                    "default_client \"{}\" is not a configured client",
                    default
                )));
            }
        }
        Ok(())
    }

    pub fn client(&self, name: &str) -> Option<&ClientConfig> {
        self.clients.get(name)
    }

    /// The explicit `default_client`, otherwise the first client by name.
    pub fn default_client_name(&self) -> Option<&str> {
        self.default_client
            .as_deref()
            .or_else(|| self.clients.keys().next().map(String::as_str))
    }
}
