//! Change capture
//!
//! Turns a mutation notification into a [`ChangeEvent`]: action tag, primary
//! key, snapshots, field diff, event time, and the active request context.

use chrono::Utc;
use serde_json::Value;

use super::diff::compute_changes;
use super::entity::Auditable;
use super::event::{Action, ChangeEvent};
use crate::context::{self, RequestContext};
use crate::error::AuditResult;

/// A mutation as delivered by the persistence layer
#[derive(Debug, Clone, PartialEq)]
pub struct Mutation {
    pub action: Action,
    /// Post-mutation key for inserts and updates, pre-mutation key for deletes
    pub object_pk: String,
    pub before: Option<Value>,
    pub after: Option<Value>,
}

impl Mutation {
    pub fn insert<E: Auditable>(after: &E) -> AuditResult<Self> {
        Ok(Self {
            action: Action::Insert,
            object_pk: after.primary_key(),
            before: None,
            after: Some(after.snapshot()?),
        })
    }

    pub fn update<E: Auditable>(before: &E, after: &E) -> AuditResult<Self> {
        Ok(Self {
            action: Action::Update,
            object_pk: after.primary_key(),
            before: Some(before.snapshot()?),
            after: Some(after.snapshot()?),
        })
    }

    pub fn delete<E: Auditable>(before: &E) -> AuditResult<Self> {
        Ok(Self {
            action: Action::Delete,
            object_pk: before.primary_key(),
            before: Some(before.snapshot()?),
            after: None,
        })
    }
}

/// Build the change event for a mutation observed right now
///
/// The timestamp is taken here, synchronously, and the current context (or
/// an all-absent one) is merged in.
pub fn capture(mutation: Mutation) -> ChangeEvent {
    let created_at = Utc::now();

    let Mutation {
        action,
        object_pk,
        before,
        after,
    } = mutation;

    let (before, after, changes) = match action {
        Action::Insert => (None, after, None),
        Action::Delete => (before, None, None),
        Action::Update => {
            let changes = match (&before, &after) {
                (Some(b), Some(a)) => compute_changes(b, a),
                (Some(b), None) => compute_changes(b, &Value::Null),
                (None, Some(a)) => compute_changes(&Value::Null, a),
                (None, None) => Default::default(),
            };
            (before, after, Some(changes))
        }
    };

    ChangeEvent {
        action,
        object_pk,
        before,
        after,
        changes,
        created_at,
        context: context::current().unwrap_or_else(RequestContext::unspecified),
    }
}
