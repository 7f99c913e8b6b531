//! Activity feed repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Persist append-only activity entries per document.
//!
//! # Invariants
//! - Entries are never updated; retention pruning is the only deletion path.

use crate::model::activity::{ActivityEntry, ActivityKind};
use crate::model::document::DocumentId;
use crate::model::{validate_actor_id, ActorId};
use crate::repo::{ensure_connection_ready, from_json, parse_uuid, to_json, RepoError, RepoResult};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, Row};

const ACTIVITY_SELECT_SQL: &str = "SELECT
    seq,
    document_id,
    actor_id,
    kind,
    details_json,
    created_at
FROM document_activity";

const ACTIVITY_COLUMNS: &[&str] = &[
    "seq",
    "document_id",
    "actor_id",
    "kind",
    "details_json",
    "created_at",
];

/// Repository interface for the activity feed.
pub trait ActivityRepository {
    /// Appends one entry and returns its sequence number.
    fn record_activity(
        &self,
        document_id: DocumentId,
        actor_id: ActorId,
        kind: ActivityKind,
        details: Option<&serde_json::Value>,
    ) -> RepoResult<i64>;
    /// Lists entries newest-first.
    fn list_activity(
        &self,
        document_id: DocumentId,
        limit: Option<u32>,
        offset: u32,
    ) -> RepoResult<Vec<ActivityEntry>>;
    /// Deletes entries older than the cutoff. Returns the number removed.
    fn prune_activity_before(&self, cutoff_ms: i64) -> RepoResult<usize>;
}

/// SQLite-backed activity repository.
pub struct SqliteActivityRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteActivityRepository<'conn> {
    /// Creates repository from migrated connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(conn, &[("document_activity", ACTIVITY_COLUMNS)])?;
        Ok(Self { conn })
    }
}

impl ActivityRepository for SqliteActivityRepository<'_> {
    fn record_activity(
        &self,
        document_id: DocumentId,
        actor_id: ActorId,
        kind: ActivityKind,
        details: Option<&serde_json::Value>,
    ) -> RepoResult<i64> {
        validate_actor_id(actor_id)?;

        let details_json = details
            .map(|value| to_json(value, "activity details"))
            .transpose()?;

        self.conn.execute(
            "INSERT INTO document_activity (document_id, actor_id, kind, details_json)
             VALUES (?1, ?2, ?3, ?4);",
            params![
                document_id.to_string(),
                actor_id,
                kind.as_db_str(),
                details_json.as_deref(),
            ],
        )?;

        Ok(self.conn.last_insert_rowid())
    }

    fn list_activity(
        &self,
        document_id: DocumentId,
        limit: Option<u32>,
        offset: u32,
    ) -> RepoResult<Vec<ActivityEntry>> {
        let mut sql = format!(
            "{ACTIVITY_SELECT_SQL}
             WHERE document_id = ?
             ORDER BY seq DESC"
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
        let mut entries = Vec::new();

        while let Some(row) = rows.next()? {
            entries.push(parse_activity_row(row)?);
        }

        Ok(entries)
    }

    fn prune_activity_before(&self, cutoff_ms: i64) -> RepoResult<usize> {
        let removed = self.conn.execute(
            "DELETE FROM document_activity
             WHERE created_at < ?1;",
            [cutoff_ms],
        )?;
        Ok(removed)
    }
}

fn parse_activity_row(row: &Row<'_>) -> RepoResult<ActivityEntry> {
    let document_id_text: String = row.get("document_id")?;
    let document_id = parse_uuid(&document_id_text, "document_activity.document_id")?;

    let kind_text: String = row.get("kind")?;
    let kind = ActivityKind::parse_db_str(&kind_text).ok_or_else(|| {
        RepoError::InvalidData(format!(
            "invalid kind `{kind_text}` in document_activity.kind"
        ))
    })?;

    let details = row
        .get::<_, Option<String>>("details_json")?
        .map(|text| from_json::<serde_json::Value>(&text, "document_activity.details_json"))
        .transpose()?;

    Ok(ActivityEntry {
        seq: row.get("seq")?,
        document_id,
        actor_id: row.get("actor_id")?,
        kind,
        details,
        created_at: row.get("created_at")?,
    })
}
