//! Schema maintenance for existing log tables
//!
//! Log tables created by older releases store `created_at` at second
//! precision with a server-side default. Queued delivery supplies the event
//! time explicitly, so the column must keep microseconds.

use tracing::info;

use crate::backend::{list_log_tables, BackendHandle, Dialect};
use crate::error::AuditResult;

/// Planned change for one log table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationStep {
    pub table: String,
    /// `None` when the dialect needs no change
    pub statement: Option<String>,
}

/// Timestamp precision migration for every log table on one backend
#[derive(Debug, Clone)]
pub struct TimestampMigration {
    alias: String,
    dialect: Dialect,
    steps: Vec<MigrationStep>,
}

impl TimestampMigration {
    /// Discover log tables and work out the statement for each
    pub async fn plan(handle: &BackendHandle) -> AuditResult<Self> {
        let dialect = handle.dialect();
        let steps = list_log_tables(handle)
            .await?
            .into_iter()
            .map(|table| MigrationStep {
                statement: dialect.timestamp_migration(&table),
                table,
            })
            .collect();

        Ok(Self {
            alias: handle.alias().to_string(),
            dialect,
            steps,
        })
    }

    pub fn alias(&self) -> &str {
        &self.alias
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    pub fn steps(&self) -> &[MigrationStep] {
        &self.steps
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Execute the plan; returns the number of tables altered
    pub async fn apply(&self, handle: &BackendHandle) -> AuditResult<usize> {
        let mut altered = 0;
        for step in &self.steps {
            let Some(statement) = &step.statement else {
                continue;
            };
            sqlx::query(statement).execute(handle.pool()).await?;
            info!(alias = handle.alias(), table = %step.table, "migrated created_at precision");
            altered += 1;
        }
        Ok(altered)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::EntityMeta;
    use crate::backend::{ensure_log_table, BackendRegistry};
    use tempfile::TempDir;

    fn handle(dir: &TempDir) -> BackendHandle {
        BackendRegistry::single(
            "default",
            format!("sqlite://{}?mode=rwc", dir.path().join("audit.db").display()),
        )
        .handle("default")
        .unwrap()
    }

    #[tokio::test]
    async fn test_plan_empty_backend() {
        let dir = TempDir::new().unwrap();
        let plan = TimestampMigration::plan(&handle(&dir)).await.unwrap();

        assert!(plan.is_empty());
        assert_eq!(plan.alias(), "default");
    }

    #[tokio::test]
    async fn test_plan_and_apply_sqlite() {
        let dir = TempDir::new().unwrap();
        let handle = handle(&dir);
        for table in ["widget", "category"] {
            ensure_log_table(Some(&handle), &EntityMeta::new(format!("shop.{}", table), table))
                .await
                .unwrap();
        }

        let plan = TimestampMigration::plan(&handle).await.unwrap();
        let tables: Vec<&str> = plan.steps().iter().map(|s| s.table.as_str()).collect();
        assert_eq!(tables, vec!["category_log", "widget_log"]);
        assert!(plan.steps().iter().all(|s| s.statement.is_none()));

        assert_eq!(plan.apply(&handle).await.unwrap(), 0);
    }
}
