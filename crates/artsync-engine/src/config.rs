//! Engine configuration (`artsync.toml`)

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Log output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// One tenant and the directory its declarations live in
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TenantConfig {
    pub id: String,
    pub registry_root: PathBuf,
}

impl TenantConfig {
    pub fn new(id: impl Into<String>, registry_root: impl Into<PathBuf>) -> Self {
        Self {
            id: id.into(),
            registry_root: registry_root.into(),
        }
    }
}

/// Top-level configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// Seconds between scheduled passes
    pub interval_secs: u64,
    /// `EnvFilter` directive used when `RUST_LOG` is unset
    pub log_filter: String,
    pub log_format: LogFormat,
    pub tenants: Vec<TenantConfig>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            interval_secs: 30,
            log_filter: "info".to_string(),
            log_format: LogFormat::Text,
            tenants: vec![TenantConfig::new("default", "./registry")],
        }
    }
}

impl EngineConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_interval_secs(mut self, interval_secs: u64) -> Self {
        self.interval_secs = interval_secs;
        self
    }

    #[must_use]
    pub fn with_log_filter(mut self, log_filter: impl Into<String>) -> Self {
        self.log_filter = log_filter.into();
        self
    }

    #[must_use]
    pub fn with_log_format(mut self, log_format: LogFormat) -> Self {
        self.log_format = log_format;
        self
    }

    /// Replace the tenant list
    #[must_use]
    pub fn with_tenants(mut self, tenants: Vec<TenantConfig>) -> Self {
        self.tenants = tenants;
        self
    }

    #[must_use]
    pub fn with_tenant(mut self, tenant: TenantConfig) -> Self {
        self.tenants.push(tenant);
        self
    }

    #[must_use]
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    /// Read and validate a TOML file
    ///
    /// # Errors
    /// [`ConfigError`] if the file cannot be read, parsed or validated.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    /// Parse and validate TOML text; absent keys take their defaults
    ///
    /// # Errors
    /// [`ConfigError::Parse`] or [`ConfigError::Invalid`]
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// # Errors
    /// [`ConfigError::Invalid`] for a zero interval, no tenants, or empty
    /// or duplicate tenant ids.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.interval_secs == 0 {
            return Err(ConfigError::invalid("interval_secs must be greater than zero"));
        }
        if self.tenants.is_empty() {
            return Err(ConfigError::invalid("at least one tenant is required"));
        }
        let mut seen = HashSet::new();
        for tenant in &self.tenants {
            if tenant.id.trim().is_empty() {
                return Err(ConfigError::invalid("tenant id must not be empty"));
            }
            if !seen.insert(tenant.id.as_str()) {
                return Err(ConfigError::invalid(format!("duplicate tenant id {}", tenant.id)));
            }
        }
        Ok(())
    }
}
