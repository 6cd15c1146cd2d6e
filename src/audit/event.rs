//! Change event data structures
//!
//! Defines the action tag, the per-field change record, and the change event
//! itself: one audit record before it is written to a log table.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::diff::describe_changes;
use crate::context::RequestContext;

/// Kind of mutation that was observed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    /// Entity was inserted
    Insert,
    /// Entity was updated
    Update,
    /// Entity was deleted
    Delete,
}

impl Action {
    /// Value written to the `action` column
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Insert => "insert",
            Action::Update => "update",
            Action::Delete => "delete",
        }
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Action::Insert => write!(f, "INSERT"),
            Action::Update => write!(f, "UPDATE"),
            Action::Delete => write!(f, "DELETE"),
        }
    }
}

/// Old and new value of one changed field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldChange {
    pub from: Value,
    pub to: Value,
}

/// Field name to change, ordered by field name
pub type ChangeSet = BTreeMap<String, FieldChange>;

/// A single audit record, captured but not yet written
///
/// For inserts `before` is absent, for deletes `after` is absent, and only
/// updates carry `changes`. `created_at` is taken when the mutation is
/// observed and travels with the event through deferred and queued delivery.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub action: Action,

    /// Stringified primary key of the mutated entity
    pub object_pk: String,

    #[serde(default)]
    pub before: Option<Value>,

    #[serde(default)]
    pub after: Option<Value>,

    #[serde(default)]
    pub changes: Option<ChangeSet>,

    pub created_at: DateTime<Utc>,

    /// Entry-point metadata of the unit of work
    #[serde(flatten)]
    pub context: RequestContext,
}

impl ChangeEvent {
    /// Format the event for log output
    pub fn format_human_readable(&self, entity: &str) -> String {
        let mut output = format!(
            "[{}] {} {} {}",
            self.created_at.format("%Y-%m-%d %H:%M:%S%.6f UTC"),
            self.action,
            entity,
            self.object_pk
        );

        if let Some(path) = &self.context.path {
            output.push_str(&format!(" via {} {}", self.context.entry_point, path));
        }

        if let Some(diff) = self.changes.as_ref().and_then(describe_changes) {
            output.push_str(&format!("\n  Changes: {}", diff));
        }

        output
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::EntryPoint;
    use serde_json::json;

    fn sample_update() -> ChangeEvent {
        let mut changes = ChangeSet::new();
        changes.insert(
            "qty".to_string(),
            FieldChange {
                from: json!(1),
                to: json!(5),
            },
        );

        ChangeEvent {
            action: Action::Update,
            object_pk: "1".to_string(),
            before: Some(json!({"id": 1, "name": "H", "qty": 1})),
            after: Some(json!({"id": 1, "name": "H", "qty": 5})),
            changes: Some(changes),
            created_at: Utc::now(),
            context: RequestContext {
                entry_point: EntryPoint::Http,
                path: Some("/api/widgets/1/".to_string()),
                ..RequestContext::default()
            },
        }
    }

    #[test]
    fn test_action_display() {
        assert_eq!(Action::Insert.to_string(), "INSERT");
        assert_eq!(Action::Update.as_str(), "update");
        assert_eq!(serde_json::to_string(&Action::Delete).unwrap(), "\"delete\"");
    }

    #[test]
    fn test_context_is_flattened() {
        let value = serde_json::to_value(sample_update()).unwrap();

        assert_eq!(value["entry_point"], "http");
        assert_eq!(value["path"], "/api/widgets/1/");
        assert!(value["user_id"].is_null());
        assert_eq!(value["changes"]["qty"]["from"], 1);
        assert_eq!(value["changes"]["qty"]["to"], 5);
    }

    #[test]
    fn test_serialization_keeps_timestamp() {
        let event = sample_update();

        let json = serde_json::to_string(&event).unwrap();
        let restored: ChangeEvent = serde_json::from_str(&json).unwrap();

        assert_eq!(restored.created_at, event.created_at);
        assert_eq!(restored.context, event.context);
    }

    #[test]
    fn test_human_readable_format() {
        let formatted = sample_update().format_human_readable("shop.widget");

        assert!(formatted.contains("UPDATE"));
        assert!(formatted.contains("shop.widget"));
        assert!(formatted.contains("via http /api/widgets/1/"));
        assert!(formatted.contains("qty: 1 -> 5"));
    }
}
