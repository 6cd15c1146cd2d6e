//! Durable write pipeline
//!
//! Routes a captured event to storage. Three paths exist:
//!
//! - immediate: resolve, provision, insert now
//! - deferred: inside a transaction, resolve and provision now, insert on commit
//! - queued: with async delivery on and a live queue, enqueue a payload for
//!   [`InsertLogTask`] (deferred to commit inside a transaction)
//!
//! A queue that is missing, down, or refuses the task makes the pipeline fall
//! back to the synchronous path.

mod deferred;
mod task;
mod writer;

use std::sync::Arc;

use tracing::{debug, warn};

use crate::audit::{ChangeEvent, EntityMeta};
use crate::backend::BackendRegistry;
use crate::config::{AuditSettings, SettingsHandle};
use crate::error::AuditResult;
use crate::queue::{TaskHandle, TaskQueue};

pub use deferred::{Deferred, DeferredWrites};
pub use task::{AuditTaskPayload, InsertLogTask, INSERT_LOG_TASK};
pub use writer::{insert_row, insert_statement, prepare, write, LogRow};

/// Dispatcher shared by an auditor and its transactions
#[derive(Clone)]
pub struct Pipeline {
    backends: Arc<BackendRegistry>,
    settings: SettingsHandle,
    queue: Option<Arc<dyn TaskQueue>>,
}

impl Pipeline {
    pub fn new(backends: Arc<BackendRegistry>, settings: SettingsHandle) -> Self {
        Self {
            backends,
            settings,
            queue: None,
        }
    }

    pub fn with_queue(mut self, queue: Arc<dyn TaskQueue>) -> Self {
        self.queue = Some(queue);
        self
    }

    fn available_queue(&self) -> Option<&Arc<dyn TaskQueue>> {
        self.queue.as_ref().filter(|q| q.is_available())
    }

    async fn enqueue(&self, payload: &AuditTaskPayload) -> AuditResult<Option<TaskHandle>> {
        let Some(queue) = self.available_queue() else {
            return Ok(None);
        };
        let handle = queue.enqueue(INSERT_LOG_TASK, payload.to_value()?).await?;
        debug!(task_id = %handle.id, entity = %payload.entity, "audit write enqueued");
        Ok(Some(handle))
    }

    /// Deliver `event` now, or add it to `deferrals` when inside a transaction
    ///
    /// Only [`AuditError::BackendUnavailable`](crate::error::AuditError) is
    /// meant to reach the mutation's caller; the auditor swallows the rest.
    pub async fn dispatch(
        &self,
        settings: &AuditSettings,
        entity: &EntityMeta,
        event: ChangeEvent,
        deferrals: Option<&mut DeferredWrites>,
    ) -> AuditResult<()> {
        if settings.async_delivery {
            if self.available_queue().is_some() {
                return self.dispatch_queued(settings, entity, event, deferrals).await;
            }
            debug!("task queue unavailable, writing synchronously");
        }

        match deferrals {
            Some(deferrals) => {
                if let Some((handle, table)) = prepare(&self.backends, settings, entity).await? {
                    deferrals.push(Deferred::Insert {
                        handle,
                        table,
                        event,
                    });
                }
                Ok(())
            }
            None => self.write_now(settings, entity, &event).await,
        }
    }

    async fn dispatch_queued(
        &self,
        settings: &AuditSettings,
        entity: &EntityMeta,
        event: ChangeEvent,
        deferrals: Option<&mut DeferredWrites>,
    ) -> AuditResult<()> {
        let payload = AuditTaskPayload {
            entity: entity.qualified_name.clone(),
            event,
        };

        if let Some(deferrals) = deferrals {
            deferrals.push(Deferred::Enqueue {
                entity: entity.clone(),
                payload,
            });
            return Ok(());
        }

        match self.enqueue(&payload).await {
            Ok(Some(_)) => return Ok(()),
            Ok(None) => debug!("task queue went away, writing synchronously"),
            Err(err) => warn!(error = %err, "enqueue failed, writing synchronously"),
        }
        self.write_now(settings, entity, &payload.event).await
    }

    async fn write_now(
        &self,
        settings: &AuditSettings,
        entity: &EntityMeta,
        event: &ChangeEvent,
    ) -> AuditResult<()> {
        write(&self.backends, settings, entity, event).await?;
        Ok(())
    }

    /// Execute one delivery after its transaction committed
    pub async fn run_deferred(&self, deferred: Deferred) -> AuditResult<()> {
        match deferred {
            Deferred::Insert {
                handle,
                table,
                event,
            } => insert_row(&handle, &table, &event).await,
            Deferred::Enqueue { entity, payload } => {
                match self.enqueue(&payload).await {
                    Ok(Some(_)) => return Ok(()),
                    Ok(None) => debug!("task queue unavailable at commit, writing synchronously"),
                    Err(err) => warn!(error = %err, "enqueue at commit failed, writing synchronously"),
                }
                let settings = self.settings.snapshot();
                self.write_now(&settings, &entity, &payload.event).await
            }
        }
    }
}
