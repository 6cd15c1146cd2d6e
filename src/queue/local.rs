//! In-process task queue
//!
//! One tokio worker consumes an unbounded channel, so tasks run strictly in
//! enqueue order. Failing tasks are retried in place with exponential backoff;
//! once the retries in [`RetryConfig`](crate::config::RetryConfig) are used up
//! the failure is recorded and the worker moves on.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};
use uuid::Uuid;

use super::{TaskHandle, TaskHandler, TaskQueue};
use crate::config::SettingsHandle;
use crate::context;
use crate::error::{AuditError, AuditResult};

/// A task that failed on every attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskFailure {
    pub id: Uuid,
    pub task: String,
    pub attempts: u32,
    pub reason: String,
}

impl TaskFailure {
    pub fn to_error(&self) -> AuditError {
        AuditError::AsyncDeliveryFailure {
            task: self.task.clone(),
            attempts: self.attempts,
            reason: self.reason.clone(),
        }
    }
}

#[derive(Debug)]
struct QueuedTask {
    handle: TaskHandle,
    payload: Value,
}

struct Shared {
    settings: SettingsHandle,
    handlers: RwLock<HashMap<String, Arc<dyn TaskHandler>>>,
    failures: Mutex<Vec<TaskFailure>>,
}

impl Shared {
    fn handler(&self, task: &str) -> Option<Arc<dyn TaskHandler>> {
        let handlers = match self.handlers.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        handlers.get(task).cloned()
    }

    fn record_failure(&self, failure: TaskFailure) {
        error!(task_id = %failure.id, error = %failure.to_error(), "task failed permanently");

        let mut failures = match self.failures.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        failures.push(failure);
    }

    async fn execute(&self, queued: QueuedTask) {
        let QueuedTask { handle, payload } = queued;

        let Some(handler) = self.handler(&handle.task) else {
            self.record_failure(TaskFailure {
                id: handle.id,
                task: handle.task,
                attempts: 0,
                reason: "no handler registered".to_string(),
            });
            return;
        };

        let mut attempt: u32 = 0;
        loop {
            let settings = self.settings.snapshot();
            let result = context::run_task(
                &settings,
                &handle.task,
                handler.audit_exempt(),
                handler.run(payload.clone()),
            )
            .await;

            match result {
                Ok(()) => {
                    debug!(task_id = %handle.id, task = %handle.task, attempt, "task completed");
                    return;
                }
                Err(err) if attempt < settings.retry.max_retries => {
                    let delay = settings.retry.delay_for(attempt);
                    warn!(
                        task_id = %handle.id,
                        task = %handle.task,
                        attempt,
                        error = %err,
                        "task failed, retrying in {:?}",
                        delay
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => {
                    self.record_failure(TaskFailure {
                        id: handle.id,
                        task: handle.task,
                        attempts: attempt + 1,
                        reason: err.to_string(),
                    });
                    return;
                }
            }
        }
    }
}

/// Single-worker, in-order task queue running on the current tokio runtime
pub struct LocalTaskQueue {
    shared: Arc<Shared>,
    sender: Mutex<Option<mpsc::UnboundedSender<QueuedTask>>>,
    worker: tokio::sync::Mutex<Option<JoinHandle<()>>>,
}

impl LocalTaskQueue {
    /// Spawn the worker. Must be called from within a tokio runtime.
    pub fn start(settings: SettingsHandle) -> Self {
        let shared = Arc::new(Shared {
            settings,
            handlers: RwLock::new(HashMap::new()),
            failures: Mutex::new(Vec::new()),
        });

        let (sender, mut receiver) = mpsc::unbounded_channel::<QueuedTask>();
        let worker_shared = Arc::clone(&shared);
        let worker = tokio::spawn(async move {
            while let Some(queued) = receiver.recv().await {
                worker_shared.execute(queued).await;
            }
            debug!("task queue worker stopped");
        });

        Self {
            shared,
            sender: Mutex::new(Some(sender)),
            worker: tokio::sync::Mutex::new(Some(worker)),
        }
    }

    /// Register (or replace) the handler for its task name
    pub fn register(&self, handler: Arc<dyn TaskHandler>) {
        let mut handlers = match self.shared.handlers.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        handlers.insert(handler.name().to_string(), handler);
    }

    /// Tasks that exhausted their retries, oldest first
    pub fn failures(&self) -> Vec<TaskFailure> {
        match self.shared.failures.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Drain the recorded failures, oldest first
    ///
    /// Long-lived workers should call this periodically; failures accumulate
    /// until taken.
    pub fn take_failures(&self) -> Vec<TaskFailure> {
        let mut failures = match self.shared.failures.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        std::mem::take(&mut *failures)
    }

    /// Stop accepting tasks and wait until every pending task has run
    pub async fn shutdown(&self) {
        let sender = match self.sender.lock() {
            Ok(mut guard) => guard.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        drop(sender);

        if let Some(worker) = self.worker.lock().await.take() {
            if let Err(e) = worker.await {
                error!(error = %e, "task queue worker panicked");
            }
        }
    }
}

#[async_trait]
impl TaskQueue for LocalTaskQueue {
    fn is_available(&self) -> bool {
        match self.sender.lock() {
            Ok(guard) => guard.as_ref().map(|s| !s.is_closed()).unwrap_or(false),
            Err(_) => false,
        }
    }

    async fn enqueue(&self, task: &str, payload: Value) -> AuditResult<TaskHandle> {
        let handle = TaskHandle::new(task);
        let queued = QueuedTask {
            handle: handle.clone(),
            payload,
        };

        let sender = match self.sender.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        };
        let sender = sender.ok_or_else(|| AuditError::Queue("task queue is shut down".into()))?;

        sender
            .send(queued)
            .map_err(|_| AuditError::Queue("task queue worker is gone".into()))?;

        debug!(task_id = %handle.id, task, "task enqueued");
        Ok(handle)
    }
}
