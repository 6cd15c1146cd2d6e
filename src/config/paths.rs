//! Path management for audit-trail
//!
//! Resolves where the configuration file lives.
//!
//! ## Path Resolution Order
//!
//! 1. `AUDIT_TRAIL_CONFIG_DIR` environment variable (if set)
//! 2. Unix (Linux/macOS): `$XDG_CONFIG_HOME/audit-trail` or `~/.config/audit-trail`
//! 3. Windows: `%APPDATA%\audit-trail`

use std::path::PathBuf;

use crate::error::AuditError;

/// Manages the paths used by audit-trail
#[derive(Debug, Clone)]
pub struct AuditPaths {
    base_dir: PathBuf,
}

impl AuditPaths {
    /// Create a new AuditPaths instance
    ///
    /// # Errors
    ///
    /// Returns an error if the home directory cannot be determined.
    pub fn new() -> Result<Self, AuditError> {
        let base_dir = if let Ok(custom) = std::env::var("AUDIT_TRAIL_CONFIG_DIR") {
            PathBuf::from(custom)
        } else {
            resolve_default_path()?
        };

        Ok(Self { base_dir })
    }

    /// Create AuditPaths with a custom base directory (useful for testing)
    pub fn with_base_dir(base_dir: PathBuf) -> Self {
        Self { base_dir }
    }

    pub fn base_dir(&self) -> &PathBuf {
        &self.base_dir
    }

    /// Get the path to the configuration file
    pub fn config_file(&self) -> PathBuf {
        self.base_dir.join("config.json")
    }
}

/// Resolve the default config directory based on platform
#[cfg(not(windows))]
fn resolve_default_path() -> Result<PathBuf, AuditError> {
    let config_base = match std::env::var("XDG_CONFIG_HOME") {
        Ok(dir) => PathBuf::from(dir),
        Err(_) => {
            let home = std::env::var("HOME")
                .map_err(|_| AuditError::Config("HOME environment variable not set".into()))?;
            PathBuf::from(home).join(".config")
        }
    };
    Ok(config_base.join("audit-trail"))
}

/// Resolve the default config directory based on platform
#[cfg(windows)]
fn resolve_default_path() -> Result<PathBuf, AuditError> {
    let appdata = std::env::var("APPDATA")
        .map_err(|_| AuditError::Config("Could not determine APPDATA directory".into()))?;
    Ok(PathBuf::from(appdata).join("audit-trail"))
}
