//! Writes held until the owning transaction commits
//!
//! Deferred work is plain data, not closures: a rolled back transaction simply
//! drops the list and nothing was ever executed.

use crate::audit::{ChangeEvent, EntityMeta};
use crate::backend::BackendHandle;

use super::task::AuditTaskPayload;

/// One delivery waiting for commit
#[derive(Debug, Clone)]
pub enum Deferred {
    /// Synchronous path: backend resolved and table provisioned at mutation time
    Insert {
        handle: BackendHandle,
        table: String,
        event: ChangeEvent,
    },
    /// Queued path: enqueued on commit
    Enqueue {
        entity: EntityMeta,
        payload: AuditTaskPayload,
    },
}

/// Ordered list of pending deliveries for one transaction
#[derive(Debug, Default)]
pub struct DeferredWrites {
    pending: Vec<Deferred>,
}

impl DeferredWrites {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, deferred: Deferred) {
        self.pending.push(deferred);
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Take every pending delivery in the order they were deferred
    pub fn take(&mut self) -> Vec<Deferred> {
        std::mem::take(&mut self.pending)
    }
}
