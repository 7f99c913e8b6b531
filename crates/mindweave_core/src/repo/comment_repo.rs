//! Comment repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Persist node-anchored comment threads.
//!
//! # Invariants
//! - Write paths validate content bounds before SQL mutations.
//! - Deleting a comment hard-deletes its replies through the parent foreign
//!   key cascade.

use crate::model::comment::{validate_content, Comment};
use crate::model::document::DocumentId;
use crate::model::{validate_actor_id, ActorId};
use crate::repo::{
    ensure_connection_ready, from_json, parse_bool, parse_uuid, to_json, RepoError, RepoResult,
};
use rusqlite::{params, Connection, Row};
use uuid::Uuid;

const COMMENT_SELECT_SQL: &str = "SELECT
    id,
    document_id,
    node_id,
    author_id,
    content,
    mentions_json,
    parent_comment_id,
    resolved,
    resolved_by,
    resolved_at,
    is_edited,
    edited_at,
    created_at,
    updated_at
FROM comments";

const COMMENT_COLUMNS: &[&str] = &[
    "id",
    "document_id",
    "node_id",
    "author_id",
    "content",
    "mentions_json",
    "parent_comment_id",
    "resolved",
    "resolved_by",
    "resolved_at",
    "is_edited",
    "edited_at",
    "created_at",
    "updated_at",
];

/// Repository interface for comments.
pub trait CommentRepository {
    fn create_comment(
        &self,
        document_id: DocumentId,
        node_id: &str,
        author_id: ActorId,
        content: &str,
        mentions: &[ActorId],
        parent_comment_id: Option<Uuid>,
    ) -> RepoResult<Comment>;
    fn get_comment(&self, id: Uuid) -> RepoResult<Option<Comment>>;
    /// Replaces the body and marks the comment edited.
    fn update_content(&self, id: Uuid, content: &str) -> RepoResult<()>;
    /// Resolves or reopens one comment.
    fn set_resolved(
        &self,
        id: Uuid,
        resolved: bool,
        resolved_by: Option<ActorId>,
    ) -> RepoResult<()>;
    /// Hard-deletes one comment and, through cascade, its replies.
    fn delete_comment(&self, id: Uuid) -> RepoResult<()>;
    /// All comments of one document, oldest-first.
    fn list_comments_for_document(&self, document_id: DocumentId) -> RepoResult<Vec<Comment>>;
    /// Comments anchored to one node, oldest-first.
    fn list_comments_for_node(
        &self,
        document_id: DocumentId,
        node_id: &str,
    ) -> RepoResult<Vec<Comment>>;
}

/// SQLite-backed comment repository.
pub struct SqliteCommentRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteCommentRepository<'conn> {
    /// Creates repository from migrated connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(conn, &[("comments", COMMENT_COLUMNS)])?;
        Ok(Self { conn })
    }
}

impl CommentRepository for SqliteCommentRepository<'_> {
    fn create_comment(
        &self,
        document_id: DocumentId,
        node_id: &str,
        author_id: ActorId,
        content: &str,
        mentions: &[ActorId],
        parent_comment_id: Option<Uuid>,
    ) -> RepoResult<Comment> {
        validate_actor_id(author_id)?;
        validate_content(content)?;

        let id = Uuid::new_v4();
        self.conn.execute(
            "INSERT INTO comments (
                id,
                document_id,
                node_id,
                author_id,
                content,
                mentions_json,
                parent_comment_id
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7);",
            params![
                id.to_string(),
                document_id.to_string(),
                node_id,
                author_id,
                content,
                to_json(&mentions, "comment mentions")?,
                parent_comment_id.map(|value| value.to_string()),
            ],
        )?;

        load_required_comment(self.conn, id)
    }

    fn get_comment(&self, id: Uuid) -> RepoResult<Option<Comment>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{COMMENT_SELECT_SQL} WHERE id = ?1;"))?;
        let mut rows = stmt.query([id.to_string()])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_comment_row(row)?));
        }
        Ok(None)
    }

    fn update_content(&self, id: Uuid, content: &str) -> RepoResult<()> {
        validate_content(content)?;

        let changed = self.conn.execute(
            "UPDATE comments
             SET content = ?2,
                 is_edited = 1,
                 edited_at = (strftime('%s', 'now') * 1000),
                 updated_at = (strftime('%s', 'now') * 1000)
             WHERE id = ?1;",
            params![id.to_string(), content],
        )?;

        if changed == 0 {
            return Err(RepoError::NotFound {
                entity: "comments",
                key: id.to_string(),
            });
        }

        Ok(())
    }

    fn set_resolved(
        &self,
        id: Uuid,
        resolved: bool,
        resolved_by: Option<ActorId>,
    ) -> RepoResult<()> {
        let changed = if resolved {
            self.conn.execute(
                "UPDATE comments
                 SET resolved = 1,
                     resolved_by = ?2,
                     resolved_at = (strftime('%s', 'now') * 1000),
                     updated_at = (strftime('%s', 'now') * 1000)
                 WHERE id = ?1;",
                params![id.to_string(), resolved_by],
            )?
        } else {
            self.conn.execute(
                "UPDATE comments
                 SET resolved = 0,
                     resolved_by = NULL,
                     resolved_at = NULL,
                     updated_at = (strftime('%s', 'now') * 1000)
                 WHERE id = ?1;",
                [id.to_string()],
            )?
        };

        if changed == 0 {
            return Err(RepoError::NotFound {
                entity: "comments",
                key: id.to_string(),
            });
        }

        Ok(())
    }

    fn delete_comment(&self, id: Uuid) -> RepoResult<()> {
        let changed = self.conn.execute(
            "DELETE FROM comments
             WHERE id = ?1;",
            [id.to_string()],
        )?;

        if changed == 0 {
            return Err(RepoError::NotFound {
                entity: "comments",
                key: id.to_string(),
            });
        }

        Ok(())
    }

    fn list_comments_for_document(&self, document_id: DocumentId) -> RepoResult<Vec<Comment>> {
        let mut stmt = self.conn.prepare(&format!(
            "{COMMENT_SELECT_SQL}
             WHERE document_id = ?1
             ORDER BY created_at ASC, id ASC;"
        ))?;
        let mut rows = stmt.query([document_id.to_string()])?;
        let mut comments = Vec::new();

        while let Some(row) = rows.next()? {
            comments.push(parse_comment_row(row)?);
        }

        Ok(comments)
    }

    fn list_comments_for_node(
        &self,
        document_id: DocumentId,
        node_id: &str,
    ) -> RepoResult<Vec<Comment>> {
        let mut stmt = self.conn.prepare(&format!(
            "{COMMENT_SELECT_SQL}
             WHERE document_id = ?1
               AND node_id = ?2
             ORDER BY created_at ASC, id ASC;"
        ))?;
        let mut rows = stmt.query(params![document_id.to_string(), node_id])?;
        let mut comments = Vec::new();

        while let Some(row) = rows.next()? {
            comments.push(parse_comment_row(row)?);
        }

        Ok(comments)
    }
}

fn load_required_comment(conn: &Connection, id: Uuid) -> RepoResult<Comment> {
    let mut stmt = conn.prepare(&format!("{COMMENT_SELECT_SQL} WHERE id = ?1;"))?;
    let mut rows = stmt.query([id.to_string()])?;
    if let Some(row) = rows.next()? {
        return parse_comment_row(row);
    }
    Err(RepoError::NotFound {
        entity: "comments",
        key: id.to_string(),
    })
}

fn parse_comment_row(row: &Row<'_>) -> RepoResult<Comment> {
    let id_text: String = row.get("id")?;
    let id = parse_uuid(&id_text, "comments.id")?;

    let document_id_text: String = row.get("document_id")?;
    let document_id = parse_uuid(&document_id_text, "comments.document_id")?;

    let parent_comment_id = row
        .get::<_, Option<String>>("parent_comment_id")?
        .map(|value| parse_uuid(&value, "comments.parent_comment_id"))
        .transpose()?;

    let mentions_text: String = row.get("mentions_json")?;

    Ok(Comment {
        id,
        document_id,
        node_id: row.get("node_id")?,
        author_id: row.get("author_id")?,
        content: row.get("content")?,
        mentions: from_json(&mentions_text, "comments.mentions_json")?,
        parent_comment_id,
        resolved: parse_bool(row.get("resolved")?, "comments.resolved")?,
        resolved_by: row.get("resolved_by")?,
        resolved_at: row.get("resolved_at")?,
        is_edited: parse_bool(row.get("is_edited")?, "comments.is_edited")?,
        edited_at: row.get("edited_at")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}
