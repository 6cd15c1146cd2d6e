//! Audit settings for audit-trail
//!
//! Manages the configuration surface of the audit engine: the global switch,
//! the target backend alias, async delivery, entity inclusion/exclusion lists,
//! entry-point capture toggles, and the backend availability policy.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};

use super::paths::AuditPaths;
use crate::error::{AuditError, AuditResult};

/// Which entities are eligible for auditing
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "RawAuditModels", into = "RawAuditModels")]
pub enum AuditModels {
    /// Every entity is eligible (default)
    #[default]
    All,
    /// Only the listed qualified entity names are eligible
    Only(Vec<String>),
}

/// Wire form: the keyword `"all"` or a list of qualified names
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum RawAuditModels {
    Keyword(String),
    List(Vec<String>),
}

impl TryFrom<RawAuditModels> for AuditModels {
    type Error = String;

    fn try_from(raw: RawAuditModels) -> Result<Self, Self::Error> {
        match raw {
            RawAuditModels::Keyword(k) if k.eq_ignore_ascii_case("all") => Ok(AuditModels::All),
            RawAuditModels::Keyword(k) => Err(format!(
                "audit_models must be \"all\" or a list of entity names, got \"{}\"",
                k
            )),
            RawAuditModels::List(list) => Ok(AuditModels::Only(list)),
        }
    }
}

impl From<AuditModels> for RawAuditModels {
    fn from(models: AuditModels) -> Self {
        match models {
            AuditModels::All => RawAuditModels::Keyword("all".to_string()),
            AuditModels::Only(list) => RawAuditModels::List(list),
        }
    }
}

/// Retry policy for queued audit writes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Retries after the first attempt
    pub max_retries: u32,
    /// Delay before the first retry, doubled on every further retry
    pub base_delay_ms: u64,
    /// Upper bound for a single backoff delay
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_ms: 1_000,
            max_delay_ms: 60_000,
        }
    }
}

/// Runtime settings of the audit engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuditSettings {
    /// Global switch; when off nothing is audited
    pub enabled: bool,

    /// Backend alias the log tables live in
    pub database_alias: String,

    /// Route writes through the task queue when one is available
    #[serde(rename = "async")]
    pub async_delivery: bool,

    /// Inclusion list
    pub audit_models: AuditModels,

    /// Exclusion list, applied after the inclusion list
    pub not_audit_models: Vec<String>,

    pub capture_http: bool,
    pub capture_commands: bool,
    pub capture_tasks: bool,

    /// Fail the audited mutation when the backend cannot be reached
    pub raise_error_if_unavailable: bool,

    /// Use the default backend when the configured one cannot be reached.
    /// Only consulted when `raise_error_if_unavailable` is off.
    pub fallback_to_default: bool,

    /// Timeout for the liveness probe, in seconds
    pub probe_timeout_secs: u64,

    pub retry: RetryConfig,
}

impl Default for AuditSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            database_alias: default_alias(),
            async_delivery: false,
            audit_models: AuditModels::All,
            not_audit_models: Vec::new(),
            capture_http: true,
            capture_commands: true,
            capture_tasks: true,
            raise_error_if_unavailable: false,
            fallback_to_default: false,
            probe_timeout_secs: 5,
            retry: RetryConfig::default(),
        }
    }
}

fn default_alias() -> String {
    "default".to_string()
}

fn default_max_connections() -> u32 {
    5
}

/// Connection settings for one named backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Connection URL (`postgres://`, `mysql://`, `sqlite://`)
    pub url: String,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

impl BackendConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            max_connections: default_max_connections(),
        }
    }
}

/// Full configuration file: audit settings plus the known backends
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditConfig {
    #[serde(default)]
    pub audit: AuditSettings,

    /// Alias of the process's default backend
    #[serde(default = "default_alias")]
    pub default_backend: String,

    #[serde(default)]
    pub backends: BTreeMap<String, BackendConfig>,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            audit: AuditSettings::default(),
            default_backend: default_alias(),
            backends: BTreeMap::new(),
        }
    }
}

impl AuditConfig {
    /// Load a configuration file, choosing the format from its extension
    ///
    /// `.yaml` and `.yml` are parsed as YAML, everything else as JSON.
    pub fn load(path: &Path) -> AuditResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            AuditError::Io(format!("Failed to read config file {}: {}", path.display(), e))
        })?;

        let is_yaml = matches!(
            path.extension().and_then(|e| e.to_str()),
            Some("yaml") | Some("yml")
        );

        let config: AuditConfig = if is_yaml {
            serde_yaml::from_str(&contents).map_err(|e| {
                AuditError::Config(format!("Failed to parse {}: {}", path.display(), e))
            })?
        } else {
            serde_json::from_str(&contents).map_err(|e| {
                AuditError::Config(format!("Failed to parse {}: {}", path.display(), e))
            })?
        };

        Ok(config)
    }

    /// Load the config file from the standard location, or defaults if absent
    pub fn load_or_default(paths: &AuditPaths) -> AuditResult<Self> {
        let config_path = paths.config_file();

        if config_path.exists() {
            Self::load(&config_path)
        } else {
            Ok(Self::default())
        }
    }

    /// Save the configuration as pretty JSON
    pub fn save(&self, path: &Path) -> AuditResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                AuditError::Io(format!("Failed to create config directory: {}", e))
            })?;
        }

        let contents = serde_json::to_string_pretty(self)
            .map_err(|e| AuditError::Config(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path, contents)
            .map_err(|e| AuditError::Io(format!("Failed to write config file: {}", e)))?;

        Ok(())
    }
}

/// Shared, live view of the audit settings
///
/// Readers take a snapshot per mutation, so `update` is visible to the very
/// next audited write.
#[derive(Debug, Clone, Default)]
pub struct SettingsHandle {
    inner: Arc<RwLock<AuditSettings>>,
}

impl SettingsHandle {
    pub fn new(settings: AuditSettings) -> Self {
        Self {
            inner: Arc::new(RwLock::new(settings)),
        }
    }

    /// Copy of the current settings
    pub fn snapshot(&self) -> AuditSettings {
        match self.inner.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Mutate the settings in place
    pub fn update(&self, f: impl FnOnce(&mut AuditSettings)) {
        let mut guard = match self.inner.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        f(&mut guard);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_settings() {
        let settings = AuditSettings::default();
        assert!(settings.enabled);
        assert_eq!(settings.database_alias, "default");
        assert!(!settings.async_delivery);
        assert_eq!(settings.audit_models, AuditModels::All);
        assert!(settings.not_audit_models.is_empty());
        assert!(settings.capture_http && settings.capture_commands && settings.capture_tasks);
        assert!(!settings.raise_error_if_unavailable);
        assert!(!settings.fallback_to_default);
        assert_eq!(settings.retry.max_retries, 3);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let json = r#"{"audit": {"async": true, "audit_models": ["shop.widget"]}}"#;
        let config: AuditConfig = serde_json::from_str(json).unwrap();

        assert!(config.audit.async_delivery);
        assert!(config.audit.enabled);
        assert_eq!(
            config.audit.audit_models,
            AuditModels::Only(vec!["shop.widget".to_string()])
        );
        assert_eq!(config.default_backend, "default");
        assert!(config.backends.is_empty());
    }

    #[test]
    fn test_audit_models_keyword() {
        let models: AuditModels = serde_json::from_str(r#""all""#).unwrap();
        assert_eq!(models, AuditModels::All);

        assert!(serde_json::from_str::<AuditModels>(r#""some""#).is_err());
        assert_eq!(serde_json::to_string(&AuditModels::All).unwrap(), r#""all""#);
    }

    #[test]
    fn test_load_yaml() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("audit.yaml");
        std::fs::write(
            &path,
            "audit:\n  database_alias: audit\n  fallback_to_default: true\nbackends:\n  default:\n    url: sqlite://default.db\n  audit:\n    url: sqlite://audit.db\n    max_connections: 2\n",
        )
        .unwrap();

        let config = AuditConfig::load(&path).unwrap();
        assert_eq!(config.audit.database_alias, "audit");
        assert!(config.audit.fallback_to_default);
        assert_eq!(config.backends["audit"].max_connections, 2);
        assert_eq!(config.backends["default"].max_connections, 5);
    }

    #[test]
    fn test_save_and_load() {
        let temp_dir = TempDir::new().unwrap();
        let paths = AuditPaths::with_base_dir(temp_dir.path().to_path_buf());

        let mut config = AuditConfig::default();
        config.audit.not_audit_models = vec!["shop.category".into()];
        config
            .backends
            .insert("default".into(), BackendConfig::new("sqlite://audit.db"));

        config.save(&paths.config_file()).unwrap();

        let loaded = AuditConfig::load_or_default(&paths).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let paths = AuditPaths::with_base_dir(temp_dir.path().to_path_buf());

        let loaded = AuditConfig::load_or_default(&paths).unwrap();
        assert_eq!(loaded, AuditConfig::default());
    }

    #[test]
    fn test_settings_handle_update_is_visible() {
        let handle = SettingsHandle::new(AuditSettings::default());
        let reader = handle.clone();

        handle.update(|s| s.enabled = false);
        assert!(!reader.snapshot().enabled);
    }
}
