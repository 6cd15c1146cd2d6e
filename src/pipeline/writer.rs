//! Log row serialization and insert

use tracing::debug;

use crate::audit::{ChangeEvent, EntityMeta};
use crate::backend::{ensure_log_table, BackendHandle, BackendRegistry, ColumnKind, ResolvePolicy};
use crate::config::AuditSettings;
use crate::error::AuditResult;

/// Column order of every insert, with the kind each value is bound as
const COLUMNS: [(&str, ColumnKind); 14] = [
    ("action", ColumnKind::Text),
    ("object_pk", ColumnKind::Text),
    ("before", ColumnKind::Json),
    ("after", ColumnKind::Json),
    ("changes", ColumnKind::Json),
    ("entry_point", ColumnKind::Text),
    ("route", ColumnKind::Text),
    ("path", ColumnKind::Text),
    ("method", ColumnKind::Text),
    ("ip", ColumnKind::Text),
    ("user_id", ColumnKind::Integer),
    ("user_name", ColumnKind::Text),
    ("user_agent", ColumnKind::Text),
    ("created_at", ColumnKind::Timestamp),
];

/// A change event flattened into bindable column values
///
/// JSON columns carry serialized text so the same row works on every dialect;
/// absent values stay `None` and are written as NULL.
#[derive(Debug, Clone, PartialEq)]
pub struct LogRow {
    pub action: String,
    pub object_pk: String,
    pub before: Option<String>,
    pub after: Option<String>,
    pub changes: Option<String>,
    pub entry_point: String,
    pub route: Option<String>,
    pub path: Option<String>,
    pub method: Option<String>,
    pub ip: Option<String>,
    pub user_id: Option<i64>,
    pub user_name: Option<String>,
    pub user_agent: Option<String>,
    pub created_at: String,
}

impl LogRow {
    pub fn from_event(event: &ChangeEvent, handle: &BackendHandle) -> AuditResult<Self> {
        let ctx = &event.context;
        Ok(Self {
            action: event.action.as_str().to_string(),
            object_pk: event.object_pk.clone(),
            before: event.before.as_ref().map(serde_json::to_string).transpose()?,
            after: event.after.as_ref().map(serde_json::to_string).transpose()?,
            changes: event.changes.as_ref().map(serde_json::to_string).transpose()?,
            entry_point: ctx.entry_point.as_str().to_string(),
            route: ctx.route.clone(),
            path: ctx.path.clone(),
            method: ctx.method.clone(),
            ip: ctx.ip.clone(),
            user_id: ctx.user_id,
            user_name: ctx.user_name.clone(),
            user_agent: ctx.user_agent.clone(),
            created_at: handle.dialect().format_timestamp(&event.created_at),
        })
    }
}

/// `INSERT` statement for `table` in the handle's dialect
pub fn insert_statement(handle: &BackendHandle, table: &str) -> String {
    let dialect = handle.dialect();
    let columns: Vec<String> = COLUMNS.iter().map(|(name, _)| dialect.quote(name)).collect();
    let values: Vec<String> = COLUMNS
        .iter()
        .enumerate()
        .map(|(i, (_, kind))| dialect.bind_expr(i + 1, *kind))
        .collect();

    format!(
        "INSERT INTO {} ({}) VALUES ({})",
        dialect.quote(table),
        columns.join(", "),
        values.join(", ")
    )
}

/// Insert one log row for `event` into an already provisioned table
pub async fn insert_row(handle: &BackendHandle, table: &str, event: &ChangeEvent) -> AuditResult<()> {
    let row = LogRow::from_event(event, handle)?;
    let sql = insert_statement(handle, table);

    sqlx::query(&sql)
        .bind(row.action)
        .bind(row.object_pk)
        .bind(row.before)
        .bind(row.after)
        .bind(row.changes)
        .bind(row.entry_point)
        .bind(row.route)
        .bind(row.path)
        .bind(row.method)
        .bind(row.ip)
        .bind(row.user_id)
        .bind(row.user_name)
        .bind(row.user_agent)
        .bind(row.created_at)
        .execute(handle.pool())
        .await?;

    debug!(
        alias = handle.alias(),
        table,
        action = %event.action,
        object_pk = %event.object_pk,
        "wrote audit row"
    );
    Ok(())
}

/// Resolve the configured backend and provision the log table for `entity`
///
/// `Ok(None)` means the write is skipped.
pub async fn prepare(
    registry: &BackendRegistry,
    settings: &AuditSettings,
    entity: &EntityMeta,
) -> AuditResult<Option<(BackendHandle, String)>> {
    let policy = ResolvePolicy::from(settings);
    let Some(handle) = registry.resolve(&settings.database_alias, &policy).await? else {
        return Ok(None);
    };

    match ensure_log_table(Some(&handle), entity).await? {
        Some(table) => Ok(Some((handle, table))),
        None => Ok(None),
    }
}

/// Resolve, provision and insert in one go
pub async fn write(
    registry: &BackendRegistry,
    settings: &AuditSettings,
    entity: &EntityMeta,
    event: &ChangeEvent,
) -> AuditResult<bool> {
    match prepare(registry, settings, entity).await? {
        Some((handle, table)) => {
            insert_row(&handle, &table, event).await?;
            Ok(true)
        }
        None => Ok(false),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::Action;
    use crate::context::RequestContext;
    use chrono::Utc;
    use serde_json::json;
    use sqlx::Row;
    use tempfile::TempDir;

    fn event() -> ChangeEvent {
        ChangeEvent {
            action: Action::Insert,
            object_pk: "7".into(),
            before: None,
            after: Some(json!({"id": 7, "qty": 1})),
            changes: None,
            created_at: Utc::now(),
            context: RequestContext::task("shop.tasks.restock"),
        }
    }

    fn registry(dir: &TempDir) -> BackendRegistry {
        BackendRegistry::single(
            "default",
            format!("sqlite://{}?mode=rwc", dir.path().join("audit.db").display()),
        )
    }

    #[tokio::test]
    async fn test_insert_statement_sqlite() {
        let dir = TempDir::new().unwrap();
        let handle = registry(&dir).handle("default").unwrap();

        let sql = insert_statement(&handle, "widget_log");
        assert!(sql.starts_with("INSERT INTO \"widget_log\" (\"action\""));
        assert_eq!(sql.matches('?').count(), 14);
    }

    #[tokio::test]
    async fn test_write_creates_table_and_row() {
        let dir = TempDir::new().unwrap();
        let registry = registry(&dir);
        let entity = EntityMeta::new("shop.widget", "widget");
        let event = event();

        let written = write(&registry, &AuditSettings::default(), &entity, &event)
            .await
            .unwrap();
        assert!(written);

        let handle = registry.handle("default").unwrap();
        let row = sqlx::query(
            "SELECT action, object_pk, \"after\", \"before\", entry_point, method, created_at \
             FROM widget_log",
        )
        .fetch_one(handle.pool())
        .await
        .unwrap();

        assert_eq!(row.get::<String, _>("action"), "insert");
        assert_eq!(row.get::<String, _>("object_pk"), "7");
        let after: serde_json::Value =
            serde_json::from_str(&row.get::<String, _>("after")).unwrap();
        assert_eq!(after["qty"], 1);
        assert_eq!(row.get::<Option<String>, _>("before"), None);
        assert_eq!(row.get::<String, _>("entry_point"), "celery_task");
        assert_eq!(row.get::<String, _>("method"), "run");
        assert_eq!(
            row.get::<String, _>("created_at"),
            event.created_at.format("%Y-%m-%d %H:%M:%S%.6f").to_string()
        );
    }

    #[tokio::test]
    async fn test_write_skips_without_backend() {
        let registry = BackendRegistry::new("default", std::collections::BTreeMap::new());
        let settings = AuditSettings::default();

        let written = write(
            &registry,
            &settings,
            &EntityMeta::new("shop.widget", "widget"),
            &event(),
        )
        .await
        .unwrap();
        assert!(!written);
    }
}
