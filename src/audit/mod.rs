//! Change capture for audit-trail
//!
//! Records create, update, delete operations with before/after snapshots and
//! a field-level diff.
//!
//! # Architecture
//!
//! - `EntityMeta` / `Auditable`: identity of an audited entity type and how a
//!   record becomes a JSON snapshot.
//! - `Mutation` / `capture`: builds a `ChangeEvent` at the moment a mutation
//!   is observed, merging the active request context.
//! - `compute_changes`: the update diff, restricted to changed fields.
//! - `should_audit`: inclusion/exclusion policy, evaluated per mutation.
//!
//! # Example
//!
//! ```rust,ignore
//! use audit_trail::audit::{capture, Mutation};
//!
//! let event = capture(Mutation::update(&before, &after)?);
//! assert_eq!(event.changes.unwrap()["qty"].to, 5);
//! ```

mod capture;
mod diff;
mod entity;
mod event;
mod policy;

pub use capture::{capture, Mutation};
pub use diff::{compute_changes, describe_changes};
pub use entity::{snapshot, Auditable, EntityMeta, EntityRegistry};
pub use event::{Action, ChangeEvent, ChangeSet, FieldChange};
pub use policy::should_audit;
