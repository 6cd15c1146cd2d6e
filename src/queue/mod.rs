//! Task queue interface
//!
//! The queue runtime is a collaborator: the pipeline only needs to enqueue a
//! named task with a JSON payload and to know whether the runtime is up.
//! Consumers reconstruct everything from the payload. [`LocalTaskQueue`] is
//! the in-process implementation.

mod local;
mod retry;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::error::AuditResult;

pub use local::{LocalTaskQueue, TaskFailure};
pub use retry::calculate_backoff;

/// Receipt for an enqueued task
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskHandle {
    pub id: Uuid,
    pub task: String,
}

impl TaskHandle {
    pub fn new(task: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            task: task.into(),
        }
    }
}

/// Producer side of a task queue
#[async_trait]
pub trait TaskQueue: Send + Sync {
    /// Whether tasks can currently be accepted
    fn is_available(&self) -> bool;

    /// Hand `payload` to the task registered as `task`
    async fn enqueue(&self, task: &str, payload: Value) -> AuditResult<TaskHandle>;
}

/// Consumer side: one named task
#[async_trait]
pub trait TaskHandler: Send + Sync {
    fn name(&self) -> &str;

    /// Tasks that must never run under their own request context
    fn audit_exempt(&self) -> bool {
        false
    }

    /// Execute once; an error triggers a retry
    async fn run(&self, payload: Value) -> AuditResult<()>;
}
