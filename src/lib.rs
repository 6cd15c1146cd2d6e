//! audit-trail - Change-capture and audit-trail engine
//!
//! This library records every insert, update and delete of audited entities
//! as a row in a per-entity `<table>_log` table, together with the causal
//! context (HTTP request, operator command or queued task) that triggered it.
//!
//! # Architecture
//!
//! The crate is organized into the following modules:
//!
//! - `config`: Settings, backend definitions and path management
//! - `error`: Custom error types
//! - `context`: Task-local request context and entry-point capture
//! - `audit`: Change events, diffs, entity descriptors and the dispatch policy
//! - `backend`: Dialects, connection registry, resolution and table provisioning
//! - `pipeline`: Immediate, deferred and queued delivery of log rows
//! - `queue`: Task queue interface and the in-process queue
//! - `auditor`: Facade used by the persistence layer
//! - `maintenance`: Schema upgrades for existing log tables
//!
//! # Example
//!
//! ```rust,ignore
//! use audit_trail::{Auditor, AuditConfig};
//!
//! let auditor = Auditor::from_config(&AuditConfig::load(path)?);
//! auditor.on_insert(&widget).await?;
//!
//! let mut tx = auditor.begin();
//! tx.on_update(&before, &after).await?;
//! tx.commit().await;
//! ```

pub mod audit;
pub mod auditor;
pub mod backend;
pub mod cli;
pub mod config;
pub mod context;
pub mod error;
pub mod logging;
pub mod maintenance;
pub mod pipeline;
pub mod queue;

pub use audit::{Auditable, EntityMeta};
pub use auditor::{AuditTransaction, Auditor};
pub use config::{AuditConfig, AuditSettings, SettingsHandle};
pub use context::RequestContext;
pub use error::{AuditError, AuditResult};
