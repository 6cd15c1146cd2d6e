//! Entity descriptors
//!
//! An entity is a persistent record type whose mutations are audited. The
//! engine only needs its qualified name (for policy decisions and the async
//! payload) and its storage table name (to derive the log table).

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use serde::Serialize;
use serde_json::Value;

use crate::error::{AuditError, AuditResult};

/// Identity of an audited entity type
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EntityMeta {
    /// Qualified type name, e.g. `shop.widget`
    pub qualified_name: String,
    /// Storage table of the entity itself
    pub table_name: String,
}

impl EntityMeta {
    pub fn new(qualified_name: impl Into<String>, table_name: impl Into<String>) -> Self {
        Self {
            qualified_name: qualified_name.into(),
            table_name: table_name.into(),
        }
    }

    /// Name of the log table for this entity
    pub fn log_table(&self) -> String {
        format!("{}_log", self.table_name)
    }
}

/// A record type whose mutations can be audited
///
/// Snapshots are produced through `Serialize` and must be JSON objects.
pub trait Auditable: Serialize {
    /// Descriptor of this entity type
    fn entity() -> EntityMeta;

    /// Current primary-key value, stringified
    fn primary_key(&self) -> String;

    /// Full field snapshot of this record
    fn snapshot(&self) -> AuditResult<Value> {
        snapshot(self)
    }
}

/// Serialize a record into an object snapshot
pub fn snapshot<T: Serialize + ?Sized>(record: &T) -> AuditResult<Value> {
    let value = serde_json::to_value(record)
        .map_err(|e| AuditError::Snapshot(format!("Failed to serialize entity: {}", e)))?;

    if value.is_object() {
        Ok(value)
    } else {
        Err(AuditError::Snapshot(format!(
            "Entity snapshot must be an object, got {}",
            value
        )))
    }
}

/// Qualified name to entity lookup, used by the async consumer
#[derive(Debug, Clone, Default)]
pub struct EntityRegistry {
    entities: Arc<RwLock<HashMap<String, EntityMeta>>>,
}

impl EntityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an entity descriptor; re-registering replaces it
    pub fn register(&self, meta: EntityMeta) {
        let mut entities = match self.entities.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        entities.insert(meta.qualified_name.to_lowercase(), meta);
    }

    /// Register an [`Auditable`] type
    pub fn register_type<E: Auditable>(&self) {
        self.register(E::entity());
    }

    /// Look up an entity by qualified name (case-insensitive)
    pub fn resolve(&self, qualified_name: &str) -> AuditResult<EntityMeta> {
        let entities = match self.entities.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        entities
            .get(&qualified_name.to_lowercase())
            .cloned()
            .ok_or_else(|| AuditError::UnknownEntity(qualified_name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Serialize)]
    struct Widget {
        id: i64,
        name: String,
    }

    impl Auditable for Widget {
        fn entity() -> EntityMeta {
            EntityMeta::new("shop.widget", "widget")
        }

        fn primary_key(&self) -> String {
            self.id.to_string()
        }
    }

    #[test]
    fn test_log_table_name() {
        assert_eq!(Widget::entity().log_table(), "widget_log");
    }

    #[test]
    fn test_snapshot() {
        let widget = Widget {
            id: 3,
            name: "H".into(),
        };
        assert_eq!(widget.snapshot().unwrap(), json!({"id": 3, "name": "H"}));
        assert!(matches!(snapshot(&42), Err(AuditError::Snapshot(_))));
    }

    #[test]
    fn test_registry_resolve() {
        let registry = EntityRegistry::new();
        registry.register_type::<Widget>();

        assert_eq!(registry.resolve("Shop.Widget").unwrap().table_name, "widget");
        assert!(registry.resolve("shop.gadget").unwrap_err().is_unknown_entity());
    }
}
