//! Field-level diff between entity snapshots
//!
//! Computes the structured change set stored with update events, plus a
//! human-readable rendering of it for log output.

use serde_json::{Map, Value};

use super::event::{ChangeSet, FieldChange};

/// Compute the fields whose value differs between two snapshots
///
/// Only top-level fields are compared, by value. A field missing from one
/// side counts as `null`, so a field absent from both or equal in both never
/// appears in the result.
pub fn compute_changes(before: &Value, after: &Value) -> ChangeSet {
    let empty = Map::new();
    let before_obj = before.as_object().unwrap_or(&empty);
    let after_obj = after.as_object().unwrap_or(&empty);

    let mut changes = ChangeSet::new();

    // Check for modified and removed fields
    for (key, before_val) in before_obj {
        let after_val = after_obj.get(key).unwrap_or(&Value::Null);
        if before_val != after_val {
            changes.insert(
                key.clone(),
                FieldChange {
                    from: before_val.clone(),
                    to: after_val.clone(),
                },
            );
        }
    }

    // Check for added fields
    for (key, after_val) in after_obj {
        if !before_obj.contains_key(key) && !after_val.is_null() {
            changes.insert(
                key.clone(),
                FieldChange {
                    from: Value::Null,
                    to: after_val.clone(),
                },
            );
        }
    }

    changes
}

/// Render a change set as `field: old -> new` pairs
pub fn describe_changes(changes: &ChangeSet) -> Option<String> {
    if changes.is_empty() {
        return None;
    }

    let parts: Vec<String> = changes
        .iter()
        .map(|(key, change)| {
            format!(
                "{}: {} -> {}",
                key,
                format_value(&change.from),
                format_value(&change.to)
            )
        })
        .collect();

    Some(parts.join(", "))
}

/// Format a JSON value for human-readable display
fn format_value(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => {
            // Truncate long strings
            if s.chars().count() > 50 {
                let head: String = s.chars().take(47).collect();
                format!("\"{}...\"", head)
            } else {
                format!("\"{}\"", s)
            }
        }
        Value::Array(arr) => format!("[{} items]", arr.len()),
        Value::Object(obj) => format!("{{{} fields}}", obj.len()),
    }
}
