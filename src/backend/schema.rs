//! Log table provisioning
//!
//! Each audited entity gets a sibling table `<table>_log` on the resolved
//! backend. Creation is idempotent and safe against concurrent callers.

use tracing::{debug, info};

use super::dialect::validate_identifier;
use super::registry::BackendHandle;
use crate::audit::EntityMeta;
use crate::error::AuditResult;

/// Suffix shared by every log table
pub const LOG_TABLE_SUFFIX: &str = "_log";

/// Make sure the log table for `entity` exists on `handle`
///
/// Returns the table name, or `None` when there is no backend to provision.
pub async fn ensure_log_table(
    handle: Option<&BackendHandle>,
    entity: &EntityMeta,
) -> AuditResult<Option<String>> {
    let Some(handle) = handle else {
        return Ok(None);
    };

    let table = entity.log_table();
    validate_identifier(&table)?;

    if table_exists(handle, &table).await? {
        return Ok(Some(table));
    }

    let sql = handle.dialect().create_log_table(&table);
    sqlx::query(&sql).execute(handle.pool()).await?;

    info!(alias = handle.alias(), table = %table, "created audit log table");
    Ok(Some(table))
}

/// Whether `table` exists in the backend's current schema
pub async fn table_exists(handle: &BackendHandle, table: &str) -> AuditResult<bool> {
    let count: i64 = sqlx::query_scalar(handle.dialect().table_exists_query())
        .bind(table.to_string())
        .fetch_one(handle.pool())
        .await?;

    debug!(alias = handle.alias(), table, exists = count > 0, "checked log table");
    Ok(count > 0)
}

/// All log tables on the backend, sorted by name
pub async fn list_log_tables(handle: &BackendHandle) -> AuditResult<Vec<String>> {
    let names: Vec<String> = sqlx::query_scalar(handle.dialect().list_tables_query())
        .fetch_all(handle.pool())
        .await?;

    let mut tables: Vec<String> = names
        .into_iter()
        .filter(|name| name.ends_with(LOG_TABLE_SUFFIX) && validate_identifier(name).is_ok())
        .collect();
    tables.sort();
    Ok(tables)
}
