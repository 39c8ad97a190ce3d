//! Settings Models
//!
//! Host configuration stored in config.json.

use std::path::PathBuf;
use std::time::Duration;

use semver::Version;
use serde::{Deserialize, Serialize};

/// Version of this host framework, as reported to extensions.
pub const HOST_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Backing store for persisted approval decisions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionStoreKind {
    /// Process-local, lost on exit
    Memory,
    /// SQLite file under the host directory
    #[default]
    Sqlite,
}

/// Host configuration stored in config.json
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HostConfig {
    /// Host framework version checked against extensions' minimum host version
    #[serde(default = "default_host_version")]
    pub host_version: String,
    /// Extension ids to register and activate at startup, in order
    #[serde(default)]
    pub enabled_extensions: Vec<String>,
    /// Where approval decisions are persisted
    #[serde(default)]
    pub decision_store: DecisionStoreKind,
    /// Override for the SQLite file (default: ~/.extension-host/decisions.db)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database_path: Option<PathBuf>,
    /// Per-handler timeout for hook dispatch in milliseconds (absent = unbounded)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hook_timeout_ms: Option<u64>,
}

fn default_host_version() -> String {
    HOST_VERSION.to_string()
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            host_version: default_host_version(),
            enabled_extensions: Vec::new(),
            decision_store: DecisionStoreKind::default(),
            database_path: None,
            hook_timeout_ms: None,
        }
    }
}

/// Partial update of the host configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct HostConfigUpdate {
    pub host_version: Option<String>,
    pub enabled_extensions: Option<Vec<String>>,
    pub decision_store: Option<DecisionStoreKind>,
    pub database_path: Option<PathBuf>,
    pub hook_timeout_ms: Option<u64>,
}

impl HostConfig {
    /// Apply a partial update to the configuration
    pub fn apply_update(&mut self, update: HostConfigUpdate) {
        if let Some(version) = update.host_version {
            self.host_version = version;
        }
        if let Some(extensions) = update.enabled_extensions {
            self.enabled_extensions = extensions;
        }
        if let Some(kind) = update.decision_store {
            self.decision_store = kind;
        }
        if let Some(path) = update.database_path {
            self.database_path = Some(path);
        }
        if let Some(timeout) = update.hook_timeout_ms {
            self.hook_timeout_ms = Some(timeout);
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if let Err(e) = Version::parse(&self.host_version) {
            return Err(format!("Invalid host_version '{}': {}", self.host_version, e));
        }

        if self.enabled_extensions.iter().any(|id| id.trim().is_empty()) {
            return Err("enabled_extensions must not contain empty ids".to_string());
        }

        if self.hook_timeout_ms == Some(0) {
            return Err("hook_timeout_ms must be greater than 0".to_string());
        }

        Ok(())
    }

    /// Parsed host version. Call `validate` first; falls back to 0.0.0.
    pub fn parsed_host_version(&self) -> Version {
        Version::parse(&self.host_version).unwrap_or_else(|_| Version::new(0, 0, 0))
    }

    pub fn hook_timeout(&self) -> Option<Duration> {
        self.hook_timeout_ms.map(Duration::from_millis)
    }
}
