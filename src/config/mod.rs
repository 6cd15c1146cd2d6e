//! Configuration module for audit-trail
//!
//! This module provides configuration management including:
//! - Config file location resolution
//! - Audit settings and backend definitions (JSON or YAML)
//! - A live settings handle that mutations re-read on every write

pub mod paths;
pub mod settings;

pub use paths::AuditPaths;
pub use settings::{
    AuditConfig, AuditModels, AuditSettings, BackendConfig, RetryConfig, SettingsHandle,
};
