//! Invitation repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Persist collaboration invitations and their status transitions.
//!
//! # Invariants
//! - Tokens are unique; collisions surface as `UniqueViolation`.
//! - Expiry comparisons use caller-supplied epoch ms.
//! - Status values are only moved forward by callers; this layer does not
//!   re-open settled invitations.

use crate::model::document::{CollaboratorRole, DocumentId};
use crate::model::invitation::{
    validate_message, Invitation, InvitationStatus, INVITATION_TTL_MS,
};
use crate::model::{validate_actor_id, ActorId, ValidationError};
use crate::repo::{
    ensure_connection_ready, is_unique_violation, parse_uuid, RepoError, RepoResult,
};
use rusqlite::{params, Connection, Row};
use uuid::Uuid;

const INVITATION_SELECT_SQL: &str = "SELECT
    id,
    document_id,
    invited_by,
    email,
    invited_actor_id,
    role,
    token,
    message,
    status,
    expires_at,
    accepted_at,
    created_at,
    updated_at
FROM invitations";

const INVITATION_COLUMNS: &[&str] = &[
    "id",
    "document_id",
    "invited_by",
    "email",
    "invited_actor_id",
    "role",
    "token",
    "message",
    "status",
    "expires_at",
    "accepted_at",
    "created_at",
    "updated_at",
];

/// Repository interface for invitations.
pub trait InvitationRepository {
    /// Creates one pending invitation expiring `INVITATION_TTL_MS` after
    /// `now_ms`.
    fn create_invitation(
        &self,
        document_id: DocumentId,
        invited_by: ActorId,
        email: &str,
        invited_actor_id: Option<ActorId>,
        role: CollaboratorRole,
        message: Option<&str>,
        now_ms: i64,
    ) -> RepoResult<Invitation>;
    fn get_invitation(&self, id: Uuid) -> RepoResult<Option<Invitation>>;
    fn get_invitation_by_token(&self, token: &str) -> RepoResult<Option<Invitation>>;
    /// Whether a pending, unexpired invitation exists for this address.
    fn has_live_pending(
        &self,
        document_id: DocumentId,
        email: &str,
        now_ms: i64,
    ) -> RepoResult<bool>;
    /// Pending invitations that have not yet passed their expiry.
    fn list_pending_for_document(
        &self,
        document_id: DocumentId,
        now_ms: i64,
    ) -> RepoResult<Vec<Invitation>>;
    /// Moves one invitation to a new status, optionally stamping
    /// `accepted_at`.
    fn set_status(
        &self,
        id: Uuid,
        status: InvitationStatus,
        accepted_at: Option<i64>,
    ) -> RepoResult<()>;
    /// Marks one invitation accepted, recording who accepted it and when.
    fn mark_accepted(&self, id: Uuid, actor_id: ActorId, accepted_at: i64) -> RepoResult<()>;
    /// Flips pending invitations past their expiry to expired. Returns the
    /// number flipped.
    fn expire_pending(&self, now_ms: i64) -> RepoResult<usize>;
}

/// SQLite-backed invitation repository.
pub struct SqliteInvitationRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteInvitationRepository<'conn> {
    /// Creates repository from migrated connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(conn, &[("invitations", INVITATION_COLUMNS)])?;
        Ok(Self { conn })
    }
}

impl InvitationRepository for SqliteInvitationRepository<'_> {
    fn create_invitation(
        &self,
        document_id: DocumentId,
        invited_by: ActorId,
        email: &str,
        invited_actor_id: Option<ActorId>,
        role: CollaboratorRole,
        message: Option<&str>,
        now_ms: i64,
    ) -> RepoResult<Invitation> {
        validate_actor_id(invited_by)?;
        if let Some(actor_id) = invited_actor_id {
            validate_actor_id(actor_id)?;
        }
        if role == CollaboratorRole::Owner {
            return Err(ValidationError::OwnerRoleNotAssignable.into());
        }
        if let Some(message) = message {
            validate_message(message)?;
        }

        let id = Uuid::new_v4();
        let token = new_invitation_token();
        let expires_at = now_ms + INVITATION_TTL_MS;

        self.conn
            .execute(
                "INSERT INTO invitations (
                    id,
                    document_id,
                    invited_by,
                    email,
                    invited_actor_id,
                    role,
                    token,
                    message,
                    expires_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9);",
                params![
                    id.to_string(),
                    document_id.to_string(),
                    invited_by,
                    email,
                    invited_actor_id,
                    role.as_db_str(),
                    token.as_str(),
                    message,
                    expires_at,
                ],
            )
            .map_err(|err| {
                if is_unique_violation(&err) {
                    return RepoError::UniqueViolation {
                        entity: "invitations",
                        key: token.clone(),
                    };
                }
                err.into()
            })?;

        load_required_invitation(self.conn, id)
    }

    fn get_invitation(&self, id: Uuid) -> RepoResult<Option<Invitation>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{INVITATION_SELECT_SQL} WHERE id = ?1;"))?;
        let mut rows = stmt.query([id.to_string()])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_invitation_row(row)?));
        }
        Ok(None)
    }

    fn get_invitation_by_token(&self, token: &str) -> RepoResult<Option<Invitation>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{INVITATION_SELECT_SQL} WHERE token = ?1;"))?;
        let mut rows = stmt.query([token])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_invitation_row(row)?));
        }
        Ok(None)
    }

    fn has_live_pending(
        &self,
        document_id: DocumentId,
        email: &str,
        now_ms: i64,
    ) -> RepoResult<bool> {
        let exists: i64 = self.conn.query_row(
            "SELECT EXISTS(
                SELECT 1
                FROM invitations
                WHERE document_id = ?1
                  AND email = ?2
                  AND status = 'pending'
                  AND expires_at > ?3
            );",
            params![document_id.to_string(), email, now_ms],
            |row| row.get(0),
        )?;
        Ok(exists == 1)
    }

    fn list_pending_for_document(
        &self,
        document_id: DocumentId,
        now_ms: i64,
    ) -> RepoResult<Vec<Invitation>> {
        let mut stmt = self.conn.prepare(&format!(
            "{INVITATION_SELECT_SQL}
             WHERE document_id = ?1
               AND status = 'pending'
               AND expires_at > ?2
             ORDER BY created_at ASC, id ASC;"
        ))?;
        let mut rows = stmt.query(params![document_id.to_string(), now_ms])?;
        let mut invitations = Vec::new();

        while let Some(row) = rows.next()? {
            invitations.push(parse_invitation_row(row)?);
        }

        Ok(invitations)
    }

    fn set_status(
        &self,
        id: Uuid,
        status: InvitationStatus,
        accepted_at: Option<i64>,
    ) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE invitations
             SET status = ?2,
                 accepted_at = COALESCE(?3, accepted_at),
                 updated_at = (strftime('%s', 'now') * 1000)
             WHERE id = ?1;",
            params![id.to_string(), status.as_db_str(), accepted_at],
        )?;

        if changed == 0 {
            return Err(RepoError::NotFound {
                entity: "invitations",
                key: id.to_string(),
            });
        }

        Ok(())
    }

    fn mark_accepted(&self, id: Uuid, actor_id: ActorId, accepted_at: i64) -> RepoResult<()> {
        validate_actor_id(actor_id)?;

        let changed = self.conn.execute(
            "UPDATE invitations
             SET status = 'accepted',
                 invited_actor_id = ?2,
                 accepted_at = ?3,
                 updated_at = (strftime('%s', 'now') * 1000)
             WHERE id = ?1;",
            params![id.to_string(), actor_id, accepted_at],
        )?;

        if changed == 0 {
            return Err(RepoError::NotFound {
                entity: "invitations",
                key: id.to_string(),
            });
        }

        Ok(())
    }

    fn expire_pending(&self, now_ms: i64) -> RepoResult<usize> {
        let flipped = self.conn.execute(
            "UPDATE invitations
             SET status = 'expired',
                 updated_at = (strftime('%s', 'now') * 1000)
             WHERE status = 'pending'
               AND expires_at <= ?1;",
            [now_ms],
        )?;
        Ok(flipped)
    }
}

fn new_invitation_token() -> String {
    Uuid::new_v4().simple().to_string()
}

fn load_required_invitation(conn: &Connection, id: Uuid) -> RepoResult<Invitation> {
    let mut stmt = conn.prepare(&format!("{INVITATION_SELECT_SQL} WHERE id = ?1;"))?;
    let mut rows = stmt.query([id.to_string()])?;
    if let Some(row) = rows.next()? {
        return parse_invitation_row(row);
    }
    Err(RepoError::NotFound {
        entity: "invitations",
        key: id.to_string(),
    })
}

fn parse_invitation_row(row: &Row<'_>) -> RepoResult<Invitation> {
    let id_text: String = row.get("id")?;
    let id = parse_uuid(&id_text, "invitations.id")?;

    let document_id_text: String = row.get("document_id")?;
    let document_id = parse_uuid(&document_id_text, "invitations.document_id")?;

    let role_text: String = row.get("role")?;
    let role = CollaboratorRole::parse_db_str(&role_text).ok_or_else(|| {
        RepoError::InvalidData(format!("invalid role `{role_text}` in invitations.role"))
    })?;

    let status_text: String = row.get("status")?;
    let status = InvitationStatus::parse_db_str(&status_text).ok_or_else(|| {
        RepoError::InvalidData(format!(
            "invalid status `{status_text}` in invitations.status"
        ))
    })?;

    Ok(Invitation {
        id,
        document_id,
        invited_by: row.get("invited_by")?,
        email: row.get("email")?,
        invited_actor_id: row.get("invited_actor_id")?,
        role,
        token: row.get("token")?,
        message: row.get("message")?,
        status,
        expires_at: row.get("expires_at")?,
        accepted_at: row.get("accepted_at")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}
