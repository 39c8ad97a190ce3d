//! JSON Configuration Management
//!
//! Handles reading and writing the host configuration file.

use std::fs;
use std::path::{Path, PathBuf};

use crate::models::settings::{HostConfig, HostConfigUpdate};
use crate::utils::error::{HostError, HostResult};
use crate::utils::paths::{config_path, ensure_dir};

/// Configuration service for managing host settings
#[derive(Debug)]
pub struct ConfigService {
    config_path: PathBuf,
    config: HostConfig,
}

impl ConfigService {
    /// Load `~/.extension-host/config.json`, creating it with defaults if absent
    pub fn new() -> HostResult<Self> {
        Self::open(config_path()?)
    }

    /// Load the config file at `path`, creating it with defaults if absent
    pub fn open(path: impl Into<PathBuf>) -> HostResult<Self> {
        let config_path = path.into();
        if let Some(parent) = config_path.parent() {
            ensure_dir(parent)?;
        }

        let config = if config_path.exists() {
            Self::load_from_file(&config_path)?
        } else {
            let default_config = HostConfig::default();
            Self::save_to_file(&config_path, &default_config)?;
            tracing::info!(path = %config_path.display(), "wrote default host config");
            default_config
        };

        Ok(Self {
            config_path,
            config,
        })
    }

    /// Load configuration from a file
    fn load_from_file(path: &Path) -> HostResult<HostConfig> {
        let content = fs::read_to_string(path)?;
        let config: HostConfig = serde_json::from_str(&content)?;
        config.validate().map_err(HostError::config)?;
        Ok(config)
    }

    /// Save configuration to a file with pretty formatting
    fn save_to_file(path: &Path, config: &HostConfig) -> HostResult<()> {
        config.validate().map_err(HostError::config)?;
        let content = serde_json::to_string_pretty(config)?;
        fs::write(path, content)?;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.config_path
    }

    /// Get the current configuration
    pub fn get_config(&self) -> &HostConfig {
        &self.config
    }

    /// Get a clone of the current configuration
    pub fn get_config_clone(&self) -> HostConfig {
        self.config.clone()
    }

    /// Apply a partial update and persist it. Invalid updates leave both the
    /// file and the in-memory config untouched.
    pub fn update_config(&mut self, update: HostConfigUpdate) -> HostResult<HostConfig> {
        let mut next = self.config.clone();
        next.apply_update(update);
        Self::save_to_file(&self.config_path, &next)?;
        self.config = next;
        Ok(self.config.clone())
    }

    /// Save the current configuration to disk
    pub fn save(&self) -> HostResult<()> {
        Self::save_to_file(&self.config_path, &self.config)
    }

    /// Reload configuration from disk
    pub fn reload(&mut self) -> HostResult<()> {
        self.config = Self::load_from_file(&self.config_path)?;
        Ok(())
    }

    /// Reset configuration to defaults
    pub fn reset(&mut self) -> HostResult<()> {
        self.config = HostConfig::default();
        self.save()
    }

    /// Check if the config service is healthy
    pub fn is_healthy(&self) -> bool {
        self.config_path.exists() && self.config.validate().is_ok()
    }
}
