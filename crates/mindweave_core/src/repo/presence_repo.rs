//! Presence registry repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Persist per-connection presence sessions and their activity clocks.
//!
//! # Invariants
//! - `connection_id` is unique across all documents; duplicate joins fail.
//! - All time comparisons use caller-supplied epoch ms, never the wall clock.
//! - The active listing window is stricter than the idle sweep TTL.

use crate::model::document::DocumentId;
use crate::model::graph::Viewport;
use crate::model::presence::{
    PresenceCursor, PresenceHeartbeat, PresenceSession, PresenceUserInfo,
    PRESENCE_ACTIVE_WINDOW_MS, PRESENCE_IDLE_TTL_MS,
};
use crate::repo::{
    bool_to_int, ensure_connection_ready, from_json, is_foreign_key_violation,
    is_unique_violation, parse_bool, parse_uuid, to_json, RepoError, RepoResult,
};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, Row};

const SESSION_SELECT_SQL: &str = "SELECT
    connection_id,
    document_id,
    actor_id,
    user_info_json,
    cursor_json,
    viewport_json,
    is_editing,
    connected_at,
    last_activity_at
FROM presence_sessions";

const SESSION_COLUMNS: &[&str] = &[
    "connection_id",
    "document_id",
    "actor_id",
    "user_info_json",
    "cursor_json",
    "viewport_json",
    "is_editing",
    "connected_at",
    "last_activity_at",
];

/// Repository interface for presence sessions.
pub trait PresenceRepository {
    /// Inserts one session. Fails with `UniqueViolation` on duplicate
    /// connection ids and `NotFound` when the document does not exist.
    fn insert_session(&self, session: &PresenceSession) -> RepoResult<()>;
    fn get_session(&self, connection_id: &str) -> RepoResult<Option<PresenceSession>>;
    /// Applies a heartbeat and moves the activity clock to `now_ms`.
    fn touch_session(
        &self,
        connection_id: &str,
        heartbeat: &PresenceHeartbeat,
        now_ms: i64,
    ) -> RepoResult<()>;
    fn delete_session(&self, connection_id: &str) -> RepoResult<()>;
    /// Sessions of one document active within the listing window.
    fn list_active_sessions(
        &self,
        document_id: DocumentId,
        now_ms: i64,
    ) -> RepoResult<Vec<PresenceSession>>;
    /// Removes sessions idle beyond the TTL. Returns the number removed.
    fn delete_idle_sessions(&self, now_ms: i64) -> RepoResult<usize>;
}

/// SQLite-backed presence repository.
pub struct SqlitePresenceRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqlitePresenceRepository<'conn> {
    /// Creates repository from migrated connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(conn, &[("presence_sessions", SESSION_COLUMNS)])?;
        Ok(Self { conn })
    }
}

impl PresenceRepository for SqlitePresenceRepository<'_> {
    fn insert_session(&self, session: &PresenceSession) -> RepoResult<()> {
        let user_info = session.user_info.clone().unwrap_or_default();
        let cursor_json = session
            .cursor
            .as_ref()
            .map(|cursor| to_json(cursor, "presence cursor"))
            .transpose()?;
        let viewport_json = session
            .viewport
            .as_ref()
            .map(|viewport| to_json(viewport, "presence viewport"))
            .transpose()?;

        self.conn
            .execute(
                "INSERT INTO presence_sessions (
                    connection_id,
                    document_id,
                    actor_id,
                    user_info_json,
                    cursor_json,
                    viewport_json,
                    is_editing,
                    connected_at,
                    last_activity_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9);",
                params![
                    session.connection_id.as_str(),
                    session.document_id.to_string(),
                    session.actor_id,
                    to_json(&user_info, "presence user info")?,
                    cursor_json.as_deref(),
                    viewport_json.as_deref(),
                    bool_to_int(session.is_editing),
                    session.connected_at,
                    session.last_activity_at,
                ],
            )
            .map_err(|err| {
                if is_unique_violation(&err) {
                    return RepoError::UniqueViolation {
                        entity: "presence_sessions",
                        key: session.connection_id.clone(),
                    };
                }
                if is_foreign_key_violation(&err) {
                    return RepoError::NotFound {
                        entity: "documents",
                        key: session.document_id.to_string(),
                    };
                }
                err.into()
            })?;

        Ok(())
    }

    fn get_session(&self, connection_id: &str) -> RepoResult<Option<PresenceSession>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{SESSION_SELECT_SQL} WHERE connection_id = ?1;"))?;
        let mut rows = stmt.query([connection_id])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_session_row(row)?));
        }
        Ok(None)
    }

    fn touch_session(
        &self,
        connection_id: &str,
        heartbeat: &PresenceHeartbeat,
        now_ms: i64,
    ) -> RepoResult<()> {
        let mut sql = String::from("UPDATE presence_sessions SET last_activity_at = ?");
        let mut bind_values: Vec<Value> = vec![Value::Integer(now_ms)];

        if let Some(cursor) = &heartbeat.cursor {
            sql.push_str(", cursor_json = ?");
            bind_values.push(Value::Text(to_json(cursor, "presence cursor")?));
        }
        if let Some(viewport) = &heartbeat.viewport {
            sql.push_str(", viewport_json = ?");
            bind_values.push(Value::Text(to_json(viewport, "presence viewport")?));
        }
        if let Some(is_editing) = heartbeat.is_editing {
            sql.push_str(", is_editing = ?");
            bind_values.push(Value::Integer(bool_to_int(is_editing)));
        }

        sql.push_str(" WHERE connection_id = ?;");
        bind_values.push(Value::Text(connection_id.to_string()));

        let changed = self.conn.execute(&sql, params_from_iter(bind_values))?;
        if changed == 0 {
            return Err(RepoError::NotFound {
                entity: "presence_sessions",
                key: connection_id.to_string(),
            });
        }

        Ok(())
    }

    fn delete_session(&self, connection_id: &str) -> RepoResult<()> {
        let changed = self.conn.execute(
            "DELETE FROM presence_sessions
             WHERE connection_id = ?1;",
            [connection_id],
        )?;

        if changed == 0 {
            return Err(RepoError::NotFound {
                entity: "presence_sessions",
                key: connection_id.to_string(),
            });
        }

        Ok(())
    }

    fn list_active_sessions(
        &self,
        document_id: DocumentId,
        now_ms: i64,
    ) -> RepoResult<Vec<PresenceSession>> {
        let window_start = now_ms - PRESENCE_ACTIVE_WINDOW_MS;
        let mut stmt = self.conn.prepare(&format!(
            "{SESSION_SELECT_SQL}
             WHERE document_id = ?1
               AND last_activity_at >= ?2
             ORDER BY last_activity_at DESC, connection_id ASC;"
        ))?;
        let mut rows = stmt.query(params![document_id.to_string(), window_start])?;
        let mut sessions = Vec::new();

        while let Some(row) = rows.next()? {
            sessions.push(parse_session_row(row)?);
        }

        Ok(sessions)
    }

    fn delete_idle_sessions(&self, now_ms: i64) -> RepoResult<usize> {
        let cutoff = now_ms - PRESENCE_IDLE_TTL_MS;
        let removed = self.conn.execute(
            "DELETE FROM presence_sessions
             WHERE last_activity_at < ?1;",
            [cutoff],
        )?;
        Ok(removed)
    }
}

fn parse_session_row(row: &Row<'_>) -> RepoResult<PresenceSession> {
    let document_id_text: String = row.get("document_id")?;
    let document_id = parse_uuid(&document_id_text, "presence_sessions.document_id")?;

    let user_info_text: String = row.get("user_info_json")?;
    let user_info: PresenceUserInfo =
        from_json(&user_info_text, "presence_sessions.user_info_json")?;

    let cursor = row
        .get::<_, Option<String>>("cursor_json")?
        .map(|text| from_json::<PresenceCursor>(&text, "presence_sessions.cursor_json"))
        .transpose()?;
    let viewport = row
        .get::<_, Option<String>>("viewport_json")?
        .map(|text| from_json::<Viewport>(&text, "presence_sessions.viewport_json"))
        .transpose()?;

    Ok(PresenceSession {
        connection_id: row.get("connection_id")?,
        document_id,
        actor_id: row.get("actor_id")?,
        user_info: Some(user_info),
        cursor,
        viewport,
        is_editing: parse_bool(row.get("is_editing")?, "presence_sessions.is_editing")?,
        connected_at: row.get("connected_at")?,
        last_activity_at: row.get("last_activity_at")?,
    })
}
