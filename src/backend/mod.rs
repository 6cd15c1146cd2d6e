//! Audit storage backends
//!
//! - `Dialect`: SQL generation per backend family (PostgreSQL, MySQL, SQLite)
//! - `BackendRegistry` / `BackendHandle`: named connection pools
//! - `resolve`: alias resolution with probe and fallback
//! - `ensure_log_table`: idempotent creation of `<table>_log`

mod dialect;
mod registry;
mod resolver;
mod schema;

pub use dialect::{validate_identifier, ColumnKind, Dialect};
pub use registry::{BackendHandle, BackendRegistry};
pub use resolver::ResolvePolicy;
pub use schema::{ensure_log_table, list_log_tables, table_exists, LOG_TABLE_SUFFIX};
