//! Named backend connections
//!
//! Pools are created lazily on first use of an alias and cached for the life
//! of the registry. Creating a pool never touches the network; reachability is
//! established per write by [`BackendHandle::probe`].

use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;
use std::time::Duration;

use sqlx::any::{install_default_drivers, AnyPoolOptions};
use sqlx::AnyPool;
use tracing::debug;

use super::dialect::Dialect;
use crate::config::{AuditConfig, BackendConfig};
use crate::error::{AuditError, AuditResult};

/// Upper bound on how long a pooled connection may be waited for
const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(5);

/// A resolved, usable backend
#[derive(Debug, Clone)]
pub struct BackendHandle {
    alias: String,
    dialect: Dialect,
    pool: AnyPool,
}

impl BackendHandle {
    pub fn alias(&self) -> &str {
        &self.alias
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    pub fn pool(&self) -> &AnyPool {
        &self.pool
    }

    /// Run a trivial round-trip, bounded by `timeout`
    pub async fn probe(&self, timeout: Duration) -> AuditResult<()> {
        let query = sqlx::query(self.dialect.probe_query()).execute(&self.pool);

        match tokio::time::timeout(timeout, query).await {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(e)) => Err(AuditError::backend_unavailable(&self.alias, e.to_string())),
            Err(_) => Err(AuditError::backend_unavailable(
                &self.alias,
                format!("probe timed out after {:?}", timeout),
            )),
        }
    }
}

/// Alias to backend mapping
#[derive(Debug)]
pub struct BackendRegistry {
    default_alias: String,
    configs: HashMap<String, BackendConfig>,
    pools: Mutex<HashMap<String, BackendHandle>>,
}

impl BackendRegistry {
    pub fn new(
        default_alias: impl Into<String>,
        backends: impl IntoIterator<Item = (String, BackendConfig)>,
    ) -> Self {
        install_default_drivers();

        Self {
            default_alias: default_alias.into(),
            configs: backends.into_iter().collect(),
            pools: Mutex::new(HashMap::new()),
        }
    }

    pub fn from_config(config: &AuditConfig) -> Self {
        Self::new(config.default_backend.clone(), config.backends.clone())
    }

    /// Registry with a single backend registered as the default
    pub fn single(alias: impl Into<String>, url: impl Into<String>) -> Self {
        let alias = alias.into();
        let mut backends = BTreeMap::new();
        backends.insert(alias.clone(), BackendConfig::new(url));
        Self::new(alias, backends)
    }

    pub fn default_alias(&self) -> &str {
        &self.default_alias
    }

    pub fn contains(&self, alias: &str) -> bool {
        self.configs.contains_key(alias)
    }

    pub fn aliases(&self) -> Vec<&str> {
        let mut aliases: Vec<&str> = self.configs.keys().map(String::as_str).collect();
        aliases.sort_unstable();
        aliases
    }

    /// Handle for `alias`, creating its pool on first use
    ///
    /// Fails with [`AuditError::BackendUnavailable`] when the alias is not
    /// configured and with [`AuditError::Config`] when its URL is unusable.
    pub fn handle(&self, alias: &str) -> AuditResult<BackendHandle> {
        let mut pools = match self.pools.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        if let Some(handle) = pools.get(alias) {
            return Ok(handle.clone());
        }

        let config = self.configs.get(alias).ok_or_else(|| {
            AuditError::backend_unavailable(alias, "no backend configured under this alias")
        })?;

        let dialect = Dialect::from_url(&config.url)?;
        let pool = AnyPoolOptions::new()
            .max_connections(config.max_connections.max(1))
            .acquire_timeout(ACQUIRE_TIMEOUT)
            .connect_lazy(&config.url)
            .map_err(|e| AuditError::Config(format!("Backend '{}': {}", alias, e)))?;

        debug!(alias, %dialect, "created backend pool");

        let handle = BackendHandle {
            alias: alias.to_string(),
            dialect,
            pool,
        };
        pools.insert(alias.to_string(), handle.clone());
        Ok(handle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sqlite_url(dir: &TempDir, name: &str) -> String {
        format!("sqlite://{}?mode=rwc", dir.path().join(name).display())
    }

    #[tokio::test]
    async fn test_unknown_alias() {
        let registry = BackendRegistry::new("default", BTreeMap::new());

        let err = registry.handle("wrong").unwrap_err();
        assert!(err.is_backend_unavailable());
    }

    #[tokio::test]
    async fn test_handle_is_cached_and_probes() {
        let dir = TempDir::new().unwrap();
        let registry = BackendRegistry::single("default", sqlite_url(&dir, "audit.db"));

        let first = registry.handle("default").unwrap();
        let second = registry.handle("default").unwrap();
        assert_eq!(first.dialect(), Dialect::Sqlite);
        assert_eq!(second.alias(), "default");

        first.probe(Duration::from_secs(5)).await.unwrap();
    }

    #[tokio::test]
    async fn test_unsupported_url() {
        let mut backends = BTreeMap::new();
        backends.insert("odd".to_string(), BackendConfig::new("oracle://h/db"));
        let registry = BackendRegistry::new("odd", backends);

        assert!(matches!(
            registry.handle("odd"),
            Err(AuditError::Config(_))
        ));
    }

    #[tokio::test]
    async fn test_probe_failure_is_unavailable() {
        let dir = TempDir::new().unwrap();
        let url = format!(
            "sqlite://{}?mode=rwc",
            dir.path().join("missing").join("audit.db").display()
        );
        let registry = BackendRegistry::single("default", url);

        let handle = registry.handle("default").unwrap();
        let err = handle.probe(Duration::from_secs(5)).await.unwrap_err();
        assert!(err.is_backend_unavailable());
    }
}
