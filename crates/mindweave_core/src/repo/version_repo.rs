//! Version archive repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Persist immutable named snapshots with per-document version numbers.
//!
//! # Invariants
//! - Version numbers per document are contiguous from 1 and assigned inside
//!   an exclusive write transaction; `UNIQUE(document_id, version)` backstops
//!   the assignment.
//! - Stored versions are never updated.

use crate::model::document::DocumentId;
use crate::model::graph::GraphSnapshot;
use crate::model::version::{
    validate_version_description, validate_version_name, DocumentVersion,
};
use crate::model::{validate_actor_id, ActorId};
use crate::repo::{
    bool_to_int, ensure_connection_ready, from_json, is_unique_violation, parse_bool, parse_uuid,
    to_json, RepoError, RepoResult,
};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, Row, Transaction, TransactionBehavior};
use uuid::Uuid;

const VERSION_SELECT_SQL: &str = "SELECT
    id,
    document_id,
    version,
    name,
    description,
    snapshot_json,
    created_by,
    is_autosave,
    created_at
FROM document_versions";

const VERSION_COLUMNS: &[&str] = &[
    "id",
    "document_id",
    "version",
    "name",
    "description",
    "snapshot_json",
    "created_by",
    "is_autosave",
    "created_at",
];

/// Repository interface for the version archive.
pub trait VersionRepository {
    /// Stores a new version under the next number for the document.
    fn create_version(
        &self,
        document_id: DocumentId,
        name: &str,
        description: Option<&str>,
        snapshot: &GraphSnapshot,
        created_by: ActorId,
        is_autosave: bool,
    ) -> RepoResult<DocumentVersion>;
    fn get_version(
        &self,
        document_id: DocumentId,
        version: i64,
    ) -> RepoResult<Option<DocumentVersion>>;
    /// Lists versions newest-first.
    fn list_versions(
        &self,
        document_id: DocumentId,
        limit: Option<u32>,
        offset: u32,
    ) -> RepoResult<Vec<DocumentVersion>>;
    /// Highest assigned version number, 0 when none exist.
    fn latest_version_number(&self, document_id: DocumentId) -> RepoResult<i64>;
}

/// SQLite-backed version repository.
pub struct SqliteVersionRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteVersionRepository<'conn> {
    /// Creates repository from migrated connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(conn, &[("document_versions", VERSION_COLUMNS)])?;
        Ok(Self { conn })
    }
}

impl VersionRepository for SqliteVersionRepository<'_> {
    fn create_version(
        &self,
        document_id: DocumentId,
        name: &str,
        description: Option<&str>,
        snapshot: &GraphSnapshot,
        created_by: ActorId,
        is_autosave: bool,
    ) -> RepoResult<DocumentVersion> {
        validate_actor_id(created_by)?;
        validate_version_name(name)?;
        if let Some(description) = description {
            validate_version_description(description)?;
        }

        let id = Uuid::new_v4();
        let snapshot_json = to_json(snapshot, "version snapshot")?;

        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        let version: i64 = tx.query_row(
            "SELECT COALESCE(MAX(version), 0) + 1
             FROM document_versions
             WHERE document_id = ?1;",
            [document_id.to_string()],
            |row| row.get(0),
        )?;

        tx.execute(
            "INSERT INTO document_versions (
                id,
                document_id,
                version,
                name,
                description,
                snapshot_json,
                created_by,
                is_autosave
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8);",
            params![
                id.to_string(),
                document_id.to_string(),
                version,
                name,
                description,
                snapshot_json.as_str(),
                created_by,
                bool_to_int(is_autosave),
            ],
        )
        .map_err(|err| {
            if is_unique_violation(&err) {
                return RepoError::UniqueViolation {
                    entity: "document_versions",
                    key: format!("{document_id}/{version}"),
                };
            }
            err.into()
        })?;

        let stored = load_required_version(&tx, document_id, version)?;
        tx.commit()?;
        Ok(stored)
    }

    fn get_version(
        &self,
        document_id: DocumentId,
        version: i64,
    ) -> RepoResult<Option<DocumentVersion>> {
        let mut stmt = self.conn.prepare(&format!(
            "{VERSION_SELECT_SQL}
             WHERE document_id = ?1
               AND version = ?2;"
        ))?;
        let mut rows = stmt.query(params![document_id.to_string(), version])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_version_row(row)?));
        }
        Ok(None)
    }

    fn list_versions(
        &self,
        document_id: DocumentId,
        limit: Option<u32>,
        offset: u32,
    ) -> RepoResult<Vec<DocumentVersion>> {
        let mut sql = format!(
            "{VERSION_SELECT_SQL}
             WHERE document_id = ?
             ORDER BY version DESC"
        );
        let mut bind_values: Vec<Value> = vec![Value::Text(document_id.to_string())];

        if let Some(limit) = limit {
            sql.push_str(" LIMIT ?");
            bind_values.push(Value::Integer(i64::from(limit)));
            if offset > 0 {
                sql.push_str(" OFFSET ?");
                bind_values.push(Value::Integer(i64::from(offset)));
            }
        } else if offset > 0 {
            sql.push_str(" LIMIT -1 OFFSET ?");
            bind_values.push(Value::Integer(i64::from(offset)));
        }

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut versions = Vec::new();

        while let Some(row) = rows.next()? {
            versions.push(parse_version_row(row)?);
        }

        Ok(versions)
    }

    fn latest_version_number(&self, document_id: DocumentId) -> RepoResult<i64> {
        let latest: i64 = self.conn.query_row(
            "SELECT COALESCE(MAX(version), 0)
             FROM document_versions
             WHERE document_id = ?1;",
            [document_id.to_string()],
            |row| row.get(0),
        )?;
        Ok(latest)
    }
}

fn load_required_version(
    conn: &Connection,
    document_id: DocumentId,
    version: i64,
) -> RepoResult<DocumentVersion> {
    let mut stmt = conn.prepare(&format!(
        "{VERSION_SELECT_SQL}
         WHERE document_id = ?1
           AND version = ?2;"
    ))?;
    let mut rows = stmt.query(params![document_id.to_string(), version])?;
    if let Some(row) = rows.next()? {
        return parse_version_row(row);
    }
    Err(RepoError::NotFound {
        entity: "document_versions",
        key: format!("{document_id}/{version}"),
    })
}

fn parse_version_row(row: &Row<'_>) -> RepoResult<DocumentVersion> {
    let id_text: String = row.get("id")?;
    let id = parse_uuid(&id_text, "document_versions.id")?;

    let document_id_text: String = row.get("document_id")?;
    let document_id = parse_uuid(&document_id_text, "document_versions.document_id")?;

    let snapshot_text: String = row.get("snapshot_json")?;

    Ok(DocumentVersion {
        id,
        document_id,
        version: row.get("version")?,
        name: row.get("name")?,
        description: row.get("description")?,
        snapshot: from_json(&snapshot_text, "document_versions.snapshot_json")?,
        created_by: row.get("created_by")?,
        is_autosave: parse_bool(row.get("is_autosave")?, "document_versions.is_autosave")?,
        created_at: row.get("created_at")?,
    })
}
