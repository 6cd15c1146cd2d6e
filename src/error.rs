//! Custom error types for audit-trail
//!
//! This module defines the error hierarchy for the audit engine using thiserror
//! for ergonomic error definitions.
//!
//! Only [`AuditError::BackendUnavailable`] is ever allowed to reach the caller of
//! an audited mutation. Every other failure is logged and swallowed by the
//! dispatch layer.

use thiserror::Error;

/// The main error type for audit-trail operations
#[derive(Error, Debug)]
pub enum AuditError {
    /// The audit backend could not be reached and the policy says to raise
    #[error("Audit backend '{alias}' is unavailable: {reason}")]
    BackendUnavailable { alias: String, reason: String },

    /// A qualified entity name could not be mapped back to an entity
    #[error("Unknown entity: {0}")]
    UnknownEntity(String),

    /// A table name that cannot be interpolated into SQL safely
    #[error("Invalid SQL identifier: {0}")]
    InvalidIdentifier(String),

    /// An entity could not be turned into a JSON object snapshot
    #[error("Snapshot error: {0}")]
    Snapshot(String),

    /// Errors reported by the database driver
    #[error("Database error: {0}")]
    Database(String),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(String),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// File I/O errors
    #[error("I/O error: {0}")]
    Io(String),

    /// The task queue refused or lost a task
    #[error("Queue error: {0}")]
    Queue(String),

    /// A queued audit write failed on every attempt
    #[error("Task '{task}' failed after {attempts} attempt(s): {reason}")]
    AsyncDeliveryFailure {
        task: String,
        attempts: u32,
        reason: String,
    },
}

impl AuditError {
    /// Create a "backend unavailable" error
    pub fn backend_unavailable(alias: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::BackendUnavailable {
            alias: alias.into(),
            reason: reason.into(),
        }
    }

    /// Check if this is a "backend unavailable" error
    pub fn is_backend_unavailable(&self) -> bool {
        matches!(self, Self::BackendUnavailable { .. })
    }

    /// Check if this is an "unknown entity" error
    pub fn is_unknown_entity(&self) -> bool {
        matches!(self, Self::UnknownEntity(_))
    }
}

// Implement From traits for common error types

impl From<std::io::Error> for AuditError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<serde_json::Error> for AuditError {
    fn from(err: serde_json::Error) -> Self {
        Self::Json(err.to_string())
    }
}

impl From<serde_yaml::Error> for AuditError {
    fn from(err: serde_yaml::Error) -> Self {
        Self::Config(err.to_string())
    }
}

impl From<sqlx::Error> for AuditError {
    fn from(err: sqlx::Error) -> Self {
        Self::Database(err.to_string())
    }
}

/// Result type alias for audit-trail operations
pub type AuditResult<T> = Result<T, AuditError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = AuditError::Config("test error".into());
        assert_eq!(err.to_string(), "Configuration error: test error");
    }

    #[test]
    fn test_backend_unavailable_error() {
        let err = AuditError::backend_unavailable("wrong", "unknown alias");
        assert_eq!(
            err.to_string(),
            "Audit backend 'wrong' is unavailable: unknown alias"
        );
        assert!(err.is_backend_unavailable());
        assert!(!AuditError::Database("x".into()).is_backend_unavailable());
    }

    #[test]
    fn test_async_delivery_failure_error() {
        let err = AuditError::AsyncDeliveryFailure {
            task: "audit_trail.insert_log_async".into(),
            attempts: 4,
            reason: "connection reset".into(),
        };
        assert_eq!(
            err.to_string(),
            "Task 'audit_trail.insert_log_async' failed after 4 attempt(s): connection reset"
        );
    }

    #[test]
    fn test_from_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let audit_err: AuditError = io_err.into();
        assert!(matches!(audit_err, AuditError::Io(_)));
    }

    #[test]
    fn test_from_json_error() {
        let json_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let audit_err: AuditError = json_err.into();
        assert!(matches!(audit_err, AuditError::Json(_)));
    }
}
