//! SQL dialects supported for log tables
//!
//! Every statement the engine issues is generated here, one match arm per
//! dialect, so the write path never branches on the backend family itself.

use chrono::{DateTime, SecondsFormat, Utc};

use crate::error::{AuditError, AuditResult};

/// Longest identifier accepted by every supported dialect
const MAX_IDENTIFIER_LEN: usize = 63;

/// Backend family of a connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    Postgres,
    MySql,
    Sqlite,
}

/// How a bound parameter must be read by the database
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Text,
    Integer,
    Json,
    Timestamp,
}

impl Dialect {
    /// Detect the dialect from a connection URL scheme
    pub fn from_url(url: &str) -> AuditResult<Self> {
        let scheme = url
            .split_once(':')
            .map(|(scheme, _)| scheme.to_ascii_lowercase())
            .ok_or_else(|| AuditError::Config(format!("Backend URL has no scheme: {}", url)))?;

        match scheme.as_str() {
            "postgres" | "postgresql" => Ok(Dialect::Postgres),
            "mysql" => Ok(Dialect::MySql),
            "sqlite" => Ok(Dialect::Sqlite),
            other => Err(AuditError::Config(format!(
                "Unsupported backend scheme '{}'",
                other
            ))),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Dialect::Postgres => "postgresql",
            Dialect::MySql => "mysql",
            Dialect::Sqlite => "sqlite",
        }
    }

    /// Column type for `before`, `after` and `changes`
    pub fn json_type(&self) -> &'static str {
        match self {
            Dialect::Postgres => "JSONB",
            Dialect::MySql => "JSON",
            Dialect::Sqlite => "TEXT",
        }
    }

    /// Quote an identifier that has already passed [`validate_identifier`]
    pub fn quote(&self, ident: &str) -> String {
        match self {
            Dialect::MySql => format!("`{}`", ident),
            Dialect::Postgres | Dialect::Sqlite => format!("\"{}\"", ident),
        }
    }

    /// Parameter expression for the `index`-th (1-based) bound value
    pub fn bind_expr(&self, index: usize, kind: ColumnKind) -> String {
        match (self, kind) {
            (Dialect::Postgres, ColumnKind::Json) => format!("CAST(${} AS JSONB)", index),
            (Dialect::Postgres, ColumnKind::Timestamp) => {
                format!("CAST(${} AS TIMESTAMPTZ)", index)
            }
            (Dialect::Postgres, _) => format!("${}", index),
            // Values are UTC; convert into the session zone TIMESTAMP expects
            (Dialect::MySql, ColumnKind::Timestamp) => {
                "CONVERT_TZ(?, '+00:00', @@session.time_zone)".to_string()
            }
            (Dialect::MySql, _) | (Dialect::Sqlite, _) => "?".to_string(),
        }
    }

    /// Render an event time as a literal the dialect parses
    pub fn format_timestamp(&self, ts: &DateTime<Utc>) -> String {
        match self {
            Dialect::Postgres => ts.to_rfc3339_opts(SecondsFormat::Micros, true),
            Dialect::MySql | Dialect::Sqlite => ts.format("%Y-%m-%d %H:%M:%S%.6f").to_string(),
        }
    }

    /// Trivial round-trip used as a liveness probe
    pub fn probe_query(&self) -> &'static str {
        "SELECT 1"
    }

    /// Count of tables named by the single bound parameter
    pub fn table_exists_query(&self) -> &'static str {
        match self {
            Dialect::Postgres => {
                "SELECT COUNT(*) FROM information_schema.tables \
                 WHERE table_schema = current_schema() AND table_name = $1"
            }
            Dialect::MySql => {
                "SELECT COUNT(*) FROM information_schema.tables \
                 WHERE table_schema = DATABASE() AND table_name = ?"
            }
            Dialect::Sqlite => "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?",
        }
    }

    /// Names of every table in the current schema
    pub fn list_tables_query(&self) -> &'static str {
        match self {
            Dialect::Postgres => {
                "SELECT CAST(table_name AS TEXT) FROM information_schema.tables \
                 WHERE table_schema = current_schema() ORDER BY 1"
            }
            Dialect::MySql => {
                "SELECT CAST(table_name AS CHAR) FROM information_schema.tables \
                 WHERE table_schema = DATABASE() ORDER BY 1"
            }
            Dialect::Sqlite => "SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name",
        }
    }

    /// Create-if-not-exists statement for a log table
    pub fn create_log_table(&self, table: &str) -> String {
        let json = self.json_type();
        let q = |ident: &str| self.quote(ident);

        match self {
            Dialect::Postgres => format!(
                "CREATE TABLE IF NOT EXISTS {table} (\n\
                 \x20   id BIGSERIAL PRIMARY KEY,\n\
                 \x20   action VARCHAR(10) NOT NULL,\n\
                 \x20   object_pk TEXT NOT NULL,\n\
                 \x20   {before} {json},\n\
                 \x20   {after} {json},\n\
                 \x20   changes {json},\n\
                 \x20   entry_point VARCHAR(20),\n\
                 \x20   route TEXT,\n\
                 \x20   path TEXT,\n\
                 \x20   method VARCHAR(16),\n\
                 \x20   ip TEXT,\n\
                 \x20   user_id BIGINT,\n\
                 \x20   user_name TEXT,\n\
                 \x20   user_agent TEXT,\n\
                 \x20   created_at TIMESTAMPTZ(6) DEFAULT NOW()\n\
                 )",
                table = q(table),
                before = q("before"),
                after = q("after"),
                json = json,
            ),
            Dialect::MySql => format!(
                "CREATE TABLE IF NOT EXISTS {table} (\n\
                 \x20   id BIGINT AUTO_INCREMENT PRIMARY KEY,\n\
                 \x20   action VARCHAR(10) NOT NULL,\n\
                 \x20   object_pk TEXT NOT NULL,\n\
                 \x20   {before} {json},\n\
                 \x20   {after} {json},\n\
                 \x20   changes {json},\n\
                 \x20   entry_point VARCHAR(20),\n\
                 \x20   route TEXT,\n\
                 \x20   path TEXT,\n\
                 \x20   method VARCHAR(16),\n\
                 \x20   ip TEXT,\n\
                 \x20   user_id BIGINT,\n\
                 \x20   user_name TEXT,\n\
                 \x20   user_agent TEXT,\n\
                 \x20   created_at TIMESTAMP(6) NULL DEFAULT CURRENT_TIMESTAMP(6)\n\
                 ) ENGINE=InnoDB",
                table = q(table),
                before = q("before"),
                after = q("after"),
                json = json,
            ),
            Dialect::Sqlite => format!(
                "CREATE TABLE IF NOT EXISTS {table} (\n\
                 \x20   id INTEGER PRIMARY KEY AUTOINCREMENT,\n\
                 \x20   action TEXT NOT NULL,\n\
                 \x20   object_pk TEXT NOT NULL,\n\
                 \x20   {before} {json},\n\
                 \x20   {after} {json},\n\
                 \x20   changes {json},\n\
                 \x20   entry_point TEXT,\n\
                 \x20   route TEXT,\n\
                 \x20   path TEXT,\n\
                 \x20   method TEXT,\n\
                 \x20   ip TEXT,\n\
                 \x20   user_id INTEGER,\n\
                 \x20   user_name TEXT,\n\
                 \x20   user_agent TEXT,\n\
                 \x20   created_at TEXT DEFAULT (strftime('%Y-%m-%d %H:%M:%f', 'now'))\n\
                 )",
                table = q(table),
                before = q("before"),
                after = q("after"),
                json = json,
            ),
        }
    }

    /// Statement that gives `created_at` microsecond precision
    ///
    /// `None` when the dialect already stores the supplied value verbatim.
    pub fn timestamp_migration(&self, table: &str) -> Option<String> {
        match self {
            Dialect::Postgres => Some(format!(
                "ALTER TABLE {} ALTER COLUMN created_at TYPE TIMESTAMPTZ(6), \
                 ALTER COLUMN created_at SET DEFAULT NOW()",
                self.quote(table)
            )),
            Dialect::MySql => Some(format!(
                "ALTER TABLE {} MODIFY COLUMN created_at TIMESTAMP(6) NULL \
                 DEFAULT CURRENT_TIMESTAMP(6)",
                self.quote(table)
            )),
            Dialect::Sqlite => None,
        }
    }
}

impl std::fmt::Display for Dialect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Reject anything but a plain `[A-Za-z_][A-Za-z0-9_]*` identifier
pub fn validate_identifier(ident: &str) -> AuditResult<()> {
    let mut chars = ident.chars();
    let valid_start = chars
        .next()
        .map(|c| c.is_ascii_alphabetic() || c == '_')
        .unwrap_or(false);
    let valid_rest = chars.all(|c| c.is_ascii_alphanumeric() || c == '_');

    if valid_start && valid_rest && ident.len() <= MAX_IDENTIFIER_LEN {
        Ok(())
    } else {
        Err(AuditError::InvalidIdentifier(ident.to_string()))
    }
}
