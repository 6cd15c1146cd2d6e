//! Entry point for the persistence layer
//!
//! The persistence layer calls [`Auditor::on_insert`], [`Auditor::on_update`]
//! and [`Auditor::on_delete`] after each autocommit mutation, or the same
//! methods on an [`AuditTransaction`] while a transaction is open. Auditing
//! never fails the mutation, except with `AuditError::BackendUnavailable`
//! when `raise_error_if_unavailable` is set.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::audit::{capture, should_audit, Auditable, EntityMeta, EntityRegistry, Mutation};
use crate::backend::BackendRegistry;
use crate::config::{AuditConfig, SettingsHandle};
use crate::error::AuditResult;
use crate::pipeline::{DeferredWrites, InsertLogTask, Pipeline};
use crate::queue::TaskQueue;

/// Audit facade shared across the process
#[derive(Clone)]
pub struct Auditor {
    settings: SettingsHandle,
    backends: Arc<BackendRegistry>,
    entities: EntityRegistry,
    pipeline: Pipeline,
}

impl Auditor {
    pub fn new(settings: SettingsHandle, backends: Arc<BackendRegistry>) -> Self {
        let pipeline = Pipeline::new(Arc::clone(&backends), settings.clone());
        Self {
            settings,
            backends,
            entities: EntityRegistry::new(),
            pipeline,
        }
    }

    pub fn from_config(config: &AuditConfig) -> Self {
        Self::new(
            SettingsHandle::new(config.audit.clone()),
            Arc::new(BackendRegistry::from_config(config)),
        )
    }

    /// Route writes through `queue` whenever async delivery is on
    pub fn with_queue(mut self, queue: Arc<dyn TaskQueue>) -> Self {
        self.pipeline = self.pipeline.with_queue(queue);
        self
    }

    pub fn settings(&self) -> &SettingsHandle {
        &self.settings
    }

    pub fn backends(&self) -> &Arc<BackendRegistry> {
        &self.backends
    }

    pub fn entities(&self) -> &EntityRegistry {
        &self.entities
    }

    /// Make an entity type resolvable by the queued delivery task
    pub fn register<E: Auditable>(&self) {
        self.entities.register_type::<E>();
    }

    /// Consumer for queued writes, to be registered with the task queue
    pub fn delivery_task(&self) -> InsertLogTask {
        InsertLogTask::new(
            Arc::clone(&self.backends),
            self.entities.clone(),
            self.settings.clone(),
        )
    }

    pub async fn on_insert<E: Auditable>(&self, record: &E) -> AuditResult<()> {
        self.record_with(&E::entity(), Mutation::insert(record), None)
            .await
    }

    pub async fn on_update<E: Auditable>(&self, before: &E, after: &E) -> AuditResult<()> {
        self.record_with(&E::entity(), Mutation::update(before, after), None)
            .await
    }

    pub async fn on_delete<E: Auditable>(&self, record: &E) -> AuditResult<()> {
        self.record_with(&E::entity(), Mutation::delete(record), None)
            .await
    }

    /// Audit an untyped mutation of `entity`
    pub async fn record(&self, entity: &EntityMeta, mutation: Mutation) -> AuditResult<()> {
        self.record_with(entity, Ok(mutation), None).await
    }

    /// Open a transaction whose audit writes wait for [`AuditTransaction::commit`]
    pub fn begin(&self) -> AuditTransaction {
        AuditTransaction {
            auditor: self.clone(),
            pending: DeferredWrites::new(),
        }
    }

    async fn record_with(
        &self,
        entity: &EntityMeta,
        mutation: AuditResult<Mutation>,
        deferrals: Option<&mut DeferredWrites>,
    ) -> AuditResult<()> {
        // the queued consumer resolves the entity by qualified name
        self.entities.register(entity.clone());

        let settings = self.settings.snapshot();
        if !should_audit(&entity.qualified_name, &settings) {
            return Ok(());
        }

        let result = match mutation {
            Ok(mutation) => {
                let event = capture(mutation);
                self.pipeline
                    .dispatch(&settings, entity, event, deferrals)
                    .await
            }
            Err(err) => Err(err),
        };

        match result {
            Err(err) if err.is_backend_unavailable() => Err(err),
            Err(err) => {
                warn!(
                    entity = %entity.qualified_name,
                    error = %err,
                    "audit record dropped, mutation proceeds"
                );
                Ok(())
            }
            Ok(()) => Ok(()),
        }
    }
}

/// Audit side of one open transaction
///
/// Dropping it without [`commit`](Self::commit) discards every pending write.
pub struct AuditTransaction {
    auditor: Auditor,
    pending: DeferredWrites,
}

impl AuditTransaction {
    pub async fn on_insert<E: Auditable>(&mut self, record: &E) -> AuditResult<()> {
        self.auditor
            .record_with(&E::entity(), Mutation::insert(record), Some(&mut self.pending))
            .await
    }

    pub async fn on_update<E: Auditable>(&mut self, before: &E, after: &E) -> AuditResult<()> {
        self.auditor
            .record_with(
                &E::entity(),
                Mutation::update(before, after),
                Some(&mut self.pending),
            )
            .await
    }

    pub async fn on_delete<E: Auditable>(&mut self, record: &E) -> AuditResult<()> {
        self.auditor
            .record_with(&E::entity(), Mutation::delete(record), Some(&mut self.pending))
            .await
    }

    pub async fn record(&mut self, entity: &EntityMeta, mutation: Mutation) -> AuditResult<()> {
        self.auditor
            .record_with(entity, Ok(mutation), Some(&mut self.pending))
            .await
    }

    /// Number of writes waiting for commit
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    /// Run every pending write in order; returns how many succeeded
    ///
    /// Call after the owning transaction committed. Failures are logged, the
    /// mutation is already durable at this point.
    pub async fn commit(mut self) -> usize {
        let mut delivered = 0;
        for deferred in self.pending.take() {
            match self.auditor.pipeline.run_deferred(deferred).await {
                Ok(()) => delivered += 1,
                Err(err) => warn!(error = %err, "deferred audit write failed after commit"),
            }
        }
        delivered
    }

    /// Discard every pending write
    pub fn rollback(mut self) {
        let discarded = self.pending.take().len();
        debug!(discarded, "audit transaction rolled back");
    }
}

impl Drop for AuditTransaction {
    fn drop(&mut self) {
        if !self.pending.is_empty() {
            debug!(
                discarded = self.pending.len(),
                "audit transaction dropped without commit"
            );
        }
    }
}

impl std::fmt::Debug for AuditTransaction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuditTransaction")
            .field("pending", &self.pending.len())
            .finish()
    }
}
