//! History ledger repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Persist the append-only mutation log per document.
//! - Store periodic full snapshots so replay never walks the whole log.
//!
//! # Invariants
//! - Entries are never updated in place; retention pruning is the only
//!   deletion path.
//! - The first entry of a document always stores a full snapshot; later
//!   entries store one at the configured cadence.
//! - Replay reads the nearest stored snapshot at or before the target entry
//!   and applies the deltas after it in `seq` order.

use crate::model::document::{DocumentId, GraphPatch};
use crate::model::graph::GraphSnapshot;
use crate::model::history::{HistoryAction, HistoryEntry};
use crate::model::{validate_actor_id, ActorId};
use crate::repo::{ensure_connection_ready, from_json, parse_uuid, to_json, RepoError, RepoResult};
use rusqlite::types::Value;
use rusqlite::{
    params, params_from_iter, Connection, OptionalExtension, Row, Transaction,
    TransactionBehavior,
};

const HISTORY_SELECT_SQL: &str = "SELECT
    seq,
    document_id,
    actor_id,
    action,
    delta_json,
    snapshot_json,
    created_at
FROM document_history";

const HISTORY_COLUMNS: &[&str] = &[
    "seq",
    "document_id",
    "actor_id",
    "action",
    "delta_json",
    "snapshot_json",
    "created_at",
];

/// Repository interface for the history ledger.
pub trait HistoryRepository {
    /// Appends one entry, storing a full snapshot when the per-document
    /// ordinal hits the cadence.
    fn append_entry(
        &self,
        document_id: DocumentId,
        actor_id: ActorId,
        action: HistoryAction,
        delta: Option<&GraphPatch>,
        snapshot: &GraphSnapshot,
        snapshot_every: u32,
    ) -> RepoResult<HistoryEntry>;
    /// Lists entries newest-first.
    fn list_entries(
        &self,
        document_id: DocumentId,
        limit: Option<u32>,
        offset: u32,
    ) -> RepoResult<Vec<HistoryEntry>>;
    /// Reconstructs graph state as of the given entry. `None` when the entry
    /// does not exist for this document or no snapshot base at or before it
    /// survived retention.
    fn replay_state_at(
        &self,
        document_id: DocumentId,
        seq: i64,
    ) -> RepoResult<Option<GraphSnapshot>>;
    /// Deletes entries older than the cutoff. Returns the number removed.
    fn prune_entries_before(&self, cutoff_ms: i64) -> RepoResult<usize>;
}

/// SQLite-backed history repository.
pub struct SqliteHistoryRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteHistoryRepository<'conn> {
    /// Creates repository from migrated connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(conn, &[("document_history", HISTORY_COLUMNS)])?;
        Ok(Self { conn })
    }
}

impl HistoryRepository for SqliteHistoryRepository<'_> {
    fn append_entry(
        &self,
        document_id: DocumentId,
        actor_id: ActorId,
        action: HistoryAction,
        delta: Option<&GraphPatch>,
        snapshot: &GraphSnapshot,
        snapshot_every: u32,
    ) -> RepoResult<HistoryEntry> {
        validate_actor_id(actor_id)?;

        let delta_json = delta.map(|patch| to_json(patch, "history delta")).transpose()?;

        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        let prior_entries: i64 = tx.query_row(
            "SELECT COUNT(*)
             FROM document_history
             WHERE document_id = ?1;",
            [document_id.to_string()],
            |row| row.get(0),
        )?;

        let ordinal = prior_entries + 1;
        let store_snapshot =
            ordinal == 1 || (snapshot_every > 0 && ordinal % i64::from(snapshot_every) == 0);
        let snapshot_json = if store_snapshot {
            Some(to_json(snapshot, "history snapshot")?)
        } else {
            None
        };

        tx.execute(
            "INSERT INTO document_history (document_id, actor_id, action, delta_json, snapshot_json)
             VALUES (?1, ?2, ?3, ?4, ?5);",
            params![
                document_id.to_string(),
                actor_id,
                action.as_db_str(),
                delta_json.as_deref(),
                snapshot_json.as_deref(),
            ],
        )?;

        let seq = tx.last_insert_rowid();
        let entry = load_required_entry(&tx, seq)?;
        tx.commit()?;
        Ok(entry)
    }

    fn list_entries(
        &self,
        document_id: DocumentId,
        limit: Option<u32>,
        offset: u32,
    ) -> RepoResult<Vec<HistoryEntry>> {
        let mut sql = format!(
            "{HISTORY_SELECT_SQL}
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
            entries.push(parse_history_row(row)?);
        }

        Ok(entries)
    }

    fn replay_state_at(
        &self,
        document_id: DocumentId,
        seq: i64,
    ) -> RepoResult<Option<GraphSnapshot>> {
        let target_exists: i64 = self.conn.query_row(
            "SELECT EXISTS(
                SELECT 1
                FROM document_history
                WHERE document_id = ?1
                  AND seq = ?2
            );",
            params![document_id.to_string(), seq],
            |row| row.get(0),
        )?;
        if target_exists == 0 {
            return Ok(None);
        }

        let base: Option<(i64, String)> = self
            .conn
            .query_row(
                "SELECT seq, snapshot_json
                 FROM document_history
                 WHERE document_id = ?1
                   AND seq <= ?2
                   AND snapshot_json IS NOT NULL
                 ORDER BY seq DESC
                 LIMIT 1;",
                params![document_id.to_string(), seq],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        // Retention pruning can remove the oldest snapshots. Without a base
        // the surviving deltas cannot reconstruct the state, so report the
        // position as unreachable instead of replaying from a guessed blank.
        let Some((base_seq, base_json)) = base else {
            return Ok(None);
        };
        let mut snapshot =
            from_json::<GraphSnapshot>(&base_json, "document_history.snapshot_json")?;

        let mut stmt = self.conn.prepare(
            "SELECT delta_json
             FROM document_history
             WHERE document_id = ?1
               AND seq > ?2
               AND seq <= ?3
             ORDER BY seq ASC;",
        )?;
        let mut rows = stmt.query(params![document_id.to_string(), base_seq, seq])?;

        while let Some(row) = rows.next()? {
            if let Some(text) = row.get::<_, Option<String>>(0)? {
                let patch: GraphPatch = from_json(&text, "document_history.delta_json")?;
                patch.apply_to_snapshot(&mut snapshot);
            }
        }

        Ok(Some(snapshot))
    }

    fn prune_entries_before(&self, cutoff_ms: i64) -> RepoResult<usize> {
        let removed = self.conn.execute(
            "DELETE FROM document_history
             WHERE created_at < ?1;",
            [cutoff_ms],
        )?;
        Ok(removed)
    }
}

fn load_required_entry(conn: &Connection, seq: i64) -> RepoResult<HistoryEntry> {
    let mut stmt = conn.prepare(&format!("{HISTORY_SELECT_SQL} WHERE seq = ?1;"))?;
    let mut rows = stmt.query([seq])?;
    if let Some(row) = rows.next()? {
        return parse_history_row(row);
    }
    Err(RepoError::NotFound {
        entity: "document_history",
        key: seq.to_string(),
    })
}

fn parse_history_row(row: &Row<'_>) -> RepoResult<HistoryEntry> {
    let document_id_text: String = row.get("document_id")?;
    let document_id = parse_uuid(&document_id_text, "document_history.document_id")?;

    let action_text: String = row.get("action")?;
    let action = HistoryAction::parse_db_str(&action_text).ok_or_else(|| {
        RepoError::InvalidData(format!(
            "invalid action `{action_text}` in document_history.action"
        ))
    })?;

    let delta = row
        .get::<_, Option<String>>("delta_json")?
        .map(|text| from_json::<GraphPatch>(&text, "document_history.delta_json"))
        .transpose()?;
    let snapshot = row
        .get::<_, Option<String>>("snapshot_json")?
        .map(|text| from_json::<GraphSnapshot>(&text, "document_history.snapshot_json"))
        .transpose()?;

    Ok(HistoryEntry {
        seq: row.get("seq")?,
        document_id,
        actor_id: row.get("actor_id")?,
        action,
        delta,
        snapshot,
        created_at: row.get("created_at")?,
    })
}
