//! Cross-Platform Path Utilities
//!
//! Resolves the host's data directory (`~/.extension-host/`) and the files in it.

use std::path::{Path, PathBuf};

use crate::utils::error::{HostError, HostResult};

/// Get the user's home directory
pub fn home_dir() -> HostResult<PathBuf> {
    dirs::home_dir().ok_or_else(|| HostError::config("Could not determine home directory"))
}

/// Get the host data directory (~/.extension-host/)
pub fn host_dir() -> HostResult<PathBuf> {
    Ok(home_dir()?.join(".extension-host"))
}

/// Get the config file path (~/.extension-host/config.json)
pub fn config_path() -> HostResult<PathBuf> {
    Ok(host_dir()?.join("config.json"))
}

/// Get the decision database path (~/.extension-host/decisions.db)
pub fn decisions_db_path() -> HostResult<PathBuf> {
    Ok(host_dir()?.join("decisions.db"))
}

/// Ensure a directory exists, creating it if necessary
pub fn ensure_dir(path: &Path) -> HostResult<()> {
    if !path.exists() {
        std::fs::create_dir_all(path)?;
    }
    Ok(())
}
