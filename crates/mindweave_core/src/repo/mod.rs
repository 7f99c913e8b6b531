//! Repository layer abstractions and persistence implementations.
//!
//! # Responsibility
//! - Define use-case oriented data access contracts.
//! - Isolate SQLite query details from service/business orchestration.
//!
//! # Invariants
//! - Repository writes must run model validation before SQL mutations.
//! - Repository APIs return semantic errors (`NotFound`, `UniqueViolation`)
//!   in addition to DB transport errors.
//! - Repositories are constructed through `try_new` and refuse connections
//!   whose schema is not fully migrated.

use crate::db::migrations::latest_version;
use crate::db::DbError;
use crate::model::graph::GraphViolation;
use crate::model::ValidationError;
use rusqlite::Connection;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

pub mod activity_repo;
pub mod comment_repo;
pub mod document_repo;
pub mod history_repo;
pub mod invitation_repo;
pub mod presence_repo;
pub mod template_repo;
pub mod version_repo;

pub type RepoResult<T> = Result<T, RepoError>;

/// Shared repository error for persistence and query operations.
#[derive(Debug)]
pub enum RepoError {
    /// Field-level validation rejected the write.
    Validation(ValidationError),
    /// Structural graph validation rejected the write.
    Graph(GraphViolation),
    /// Underlying SQLite/bootstrap error.
    Db(DbError),
    /// Target row does not exist.
    NotFound {
        entity: &'static str,
        key: String,
    },
    /// Insert collided with a uniqueness constraint.
    UniqueViolation {
        entity: &'static str,
        key: String,
    },
    /// Connection schema is not at the expected migrated version.
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
    /// Required table is missing.
    MissingRequiredTable(&'static str),
    /// Required column is missing from expected table.
    MissingRequiredColumn {
        table: &'static str,
        column: &'static str,
    },
    /// Persisted data cannot be converted to valid read model.
    InvalidData(String),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::Graph(err) => write!(f, "{err}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::NotFound { entity, key } => write!(f, "{entity} row not found: {key}"),
            Self::UniqueViolation { entity, key } => {
                write!(f, "{entity} uniqueness violated by: {key}")
            }
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "repository requires schema version {expected_version}, got {actual_version}"
            ),
            Self::MissingRequiredTable(table) => {
                write!(f, "repository requires table `{table}`")
            }
            Self::MissingRequiredColumn { table, column } => write!(
                f,
                "repository requires column `{column}` in table `{table}`"
            ),
            Self::InvalidData(message) => write!(f, "invalid persisted data: {message}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Graph(err) => Some(err),
            Self::Db(err) => Some(err),
            Self::NotFound { .. } => None,
            Self::UniqueViolation { .. } => None,
            Self::UninitializedConnection { .. } => None,
            Self::MissingRequiredTable(_) => None,
            Self::MissingRequiredColumn { .. } => None,
            Self::InvalidData(_) => None,
        }
    }
}

impl From<ValidationError> for RepoError {
    fn from(value: ValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<GraphViolation> for RepoError {
    fn from(value: GraphViolation) -> Self {
        Self::Graph(value)
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Verifies that the connection carries the fully migrated schema and all
/// tables/columns a repository depends on.
pub(crate) fn ensure_connection_ready(
    conn: &Connection,
    requirements: &[(&'static str, &'static [&'static str])],
) -> RepoResult<()> {
    let expected_version = latest_version();
    let actual_version: u32 = conn.query_row("PRAGMA user_version;", [], |row| row.get(0))?;
    if actual_version != expected_version {
        return Err(RepoError::UninitializedConnection {
            expected_version,
            actual_version,
        });
    }

    for (table, columns) in requirements {
        if !table_exists(conn, table)? {
            return Err(RepoError::MissingRequiredTable(table));
        }
        for column in *columns {
            if !table_has_column(conn, table, column)? {
                return Err(RepoError::MissingRequiredColumn { table, column });
            }
        }
    }

    Ok(())
}

pub(crate) fn table_exists(conn: &Connection, table: &str) -> RepoResult<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(
            SELECT 1
            FROM sqlite_master
            WHERE type = 'table' AND name = ?1
        );",
        [table],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}

pub(crate) fn table_has_column(conn: &Connection, table: &str, column: &str) -> RepoResult<bool> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({table});"))?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let current: String = row.get(1)?;
        if current == column {
            return Ok(true);
        }
    }
    Ok(false)
}

pub(crate) fn parse_uuid(value: &str, column: &'static str) -> RepoResult<Uuid> {
    Uuid::parse_str(value)
        .map_err(|_| RepoError::InvalidData(format!("invalid uuid `{value}` in {column}")))
}

pub(crate) fn parse_bool(value: i64, column: &'static str) -> RepoResult<bool> {
    match value {
        0 => Ok(false),
        1 => Ok(true),
        other => Err(RepoError::InvalidData(format!(
            "invalid boolean value `{other}` in {column}"
        ))),
    }
}

pub(crate) fn bool_to_int(value: bool) -> i64 {
    if value {
        1
    } else {
        0
    }
}

pub(crate) fn to_json<T: Serialize>(value: &T, what: &'static str) -> RepoResult<String> {
    serde_json::to_string(value)
        .map_err(|err| RepoError::InvalidData(format!("cannot encode {what}: {err}")))
}

pub(crate) fn from_json<T: DeserializeOwned>(text: &str, column: &'static str) -> RepoResult<T> {
    serde_json::from_str(text)
        .map_err(|err| RepoError::InvalidData(format!("invalid json in {column}: {err}")))
}

/// Whether an insert failed on a `UNIQUE` constraint (including primary keys).
pub(crate) fn is_unique_violation(err: &rusqlite::Error) -> bool {
    match err {
        rusqlite::Error::SqliteFailure(code, message) => {
            code.code == rusqlite::ErrorCode::ConstraintViolation
                && message
                    .as_deref()
                    .map_or(false, |msg| msg.contains("UNIQUE constraint failed"))
        }
        _ => false,
    }
}

/// Whether a write failed on a `FOREIGN KEY` constraint.
pub(crate) fn is_foreign_key_violation(err: &rusqlite::Error) -> bool {
    match err {
        rusqlite::Error::SqliteFailure(code, message) => {
            code.code == rusqlite::ErrorCode::ConstraintViolation
                && message
                    .as_deref()
                    .map_or(false, |msg| msg.contains("FOREIGN KEY constraint failed"))
        }
        _ => false,
    }
}
