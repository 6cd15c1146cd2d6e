//! Backend check command

use crate::backend::{list_log_tables, BackendRegistry, ResolvePolicy};
use crate::config::AuditConfig;
use crate::error::{AuditError, AuditResult};

/// Handle `check`: resolve the audit backend the way a write would
pub async fn handle_check_command(config: &AuditConfig, database: Option<String>) -> AuditResult<()> {
    let registry = BackendRegistry::from_config(config);
    let alias = database.unwrap_or_else(|| config.audit.database_alias.clone());
    let policy = ResolvePolicy::from(&config.audit);

    let handle = registry
        .resolve(&alias, &policy)
        .await?
        .ok_or_else(|| AuditError::backend_unavailable(&alias, "no usable backend"))?;

    if handle.alias() != alias {
        println!("Database '{}' not usable, resolved to '{}'", alias, handle.alias());
    }
    println!(
        "Database '{}' is reachable ({})",
        handle.alias(),
        handle.dialect()
    );

    let tables = list_log_tables(&handle).await?;
    println!("Audit log tables: {}", tables.len());
    for table in tables {
        println!("  {}", table);
    }

    Ok(())
}
