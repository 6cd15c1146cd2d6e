//! Queued audit delivery
//!
//! The payload carries the qualified entity name and the full event, so the
//! consumer never depends on in-process state from the producer: it
//! re-resolves the entity and the backend, then provisions and inserts.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use super::writer;
use crate::audit::{ChangeEvent, EntityRegistry};
use crate::backend::BackendRegistry;
use crate::config::SettingsHandle;
use crate::error::AuditResult;
use crate::queue::TaskHandler;

/// Registered task name of the audit delivery task
pub const INSERT_LOG_TASK: &str = "audit_trail.insert_log_async";

/// Message handed to the queue
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditTaskPayload {
    /// Qualified entity name, resolved through an [`EntityRegistry`]
    pub entity: String,
    pub event: ChangeEvent,
}

impl AuditTaskPayload {
    pub fn to_value(&self) -> AuditResult<Value> {
        Ok(serde_json::to_value(self)?)
    }

    pub fn from_value(value: Value) -> AuditResult<Self> {
        Ok(serde_json::from_value(value)?)
    }
}

/// Consumer of [`INSERT_LOG_TASK`]
pub struct InsertLogTask {
    backends: Arc<BackendRegistry>,
    entities: EntityRegistry,
    settings: SettingsHandle,
}

impl InsertLogTask {
    pub fn new(
        backends: Arc<BackendRegistry>,
        entities: EntityRegistry,
        settings: SettingsHandle,
    ) -> Self {
        Self {
            backends,
            entities,
            settings,
        }
    }
}

#[async_trait]
impl TaskHandler for InsertLogTask {
    fn name(&self) -> &str {
        INSERT_LOG_TASK
    }

    /// Its own writes must never be attributed to a task context
    fn audit_exempt(&self) -> bool {
        true
    }

    async fn run(&self, payload: Value) -> AuditResult<()> {
        let payload = AuditTaskPayload::from_value(payload)?;
        let entity = self.entities.resolve(&payload.entity)?;
        let settings = self.settings.snapshot();

        if !writer::write(&self.backends, &settings, &entity, &payload.event).await? {
            warn!(entity = %payload.entity, "no audit backend available, queued audit skipped");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::{Action, EntityMeta};
    use crate::config::AuditSettings;
    use crate::context::RequestContext;
    use chrono::Utc;
    use serde_json::json;
    use tempfile::TempDir;

    fn payload(entity: &str) -> AuditTaskPayload {
        AuditTaskPayload {
            entity: entity.to_string(),
            event: ChangeEvent {
                action: Action::Delete,
                object_pk: "3".into(),
                before: Some(json!({"id": 3, "qty": 2})),
                after: None,
                changes: None,
                created_at: Utc::now(),
                context: RequestContext::unspecified(),
            },
        }
    }

    fn task(dir: &TempDir) -> (InsertLogTask, Arc<BackendRegistry>) {
        let backends = Arc::new(BackendRegistry::single(
            "default",
            format!("sqlite://{}?mode=rwc", dir.path().join("audit.db").display()),
        ));
        let entities = EntityRegistry::new();
        entities.register(EntityMeta::new("shop.widget", "widget"));

        let task = InsertLogTask::new(
            Arc::clone(&backends),
            entities,
            SettingsHandle::new(AuditSettings::default()),
        );
        (task, backends)
    }

    #[test]
    fn test_payload_preserves_event_time() {
        let original = payload("shop.widget");
        let value = original.to_value().unwrap();

        assert_eq!(value["entity"], "shop.widget");
        assert_eq!(AuditTaskPayload::from_value(value).unwrap(), original);
    }

    #[tokio::test]
    async fn test_run_inserts_row() {
        let dir = TempDir::new().unwrap();
        let (task, backends) = task(&dir);

        task.run(payload("shop.widget").to_value().unwrap())
            .await
            .unwrap();

        let handle = backends.handle("default").unwrap();
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM widget_log")
            .fetch_one(handle.pool())
            .await
            .unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn test_run_unknown_entity_fails() {
        let dir = TempDir::new().unwrap();
        let (task, _) = task(&dir);

        let err = task
            .run(payload("shop.gadget").to_value().unwrap())
            .await
            .unwrap_err();
        assert!(err.is_unknown_entity());
        assert!(task.audit_exempt());
    }
}
