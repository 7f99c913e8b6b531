//! Document repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Provide CRUD, fork and collaborator persistence over `documents`.
//! - Keep patch merging and graph validation inside one write transaction.
//!
//! # Invariants
//! - Write paths validate field bounds and graph structure before SQL
//!   mutations; a rejected patch leaves the stored row untouched.
//! - `node_count`/`edge_count` are recomputed on every committed write.
//! - Creation and fork insert the owner collaborator row in the same
//!   transaction as the document row.

use crate::model::document::{
    validate_title, Collaborator, CollaboratorRole, CollaboratorStatus, DocumentCategory,
    DocumentId, DocumentSpec, DocumentStatus, DocumentSummary, GraphDocument, GraphPatch,
    MAX_TITLE_CHARS,
};
use crate::model::graph::validate_graph;
use crate::model::{validate_actor_id, ActorId};
use crate::repo::{
    bool_to_int, ensure_connection_ready, from_json, parse_bool, parse_uuid, to_json, RepoError,
    RepoResult,
};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, Row, Transaction, TransactionBehavior};
use uuid::Uuid;

const DOCUMENT_SELECT_SQL: &str = "SELECT
    id,
    owner_id,
    title,
    description,
    nodes_json,
    edges_json,
    viewport_json,
    settings_json,
    is_public,
    share_token,
    category,
    tags_json,
    is_favorite,
    status,
    node_count,
    edge_count,
    last_edited_by,
    view_count,
    fork_count,
    forked_from,
    created_at,
    updated_at
FROM documents";

const SUMMARY_SELECT_SQL: &str = "SELECT
    id,
    owner_id,
    title,
    description,
    category,
    tags_json,
    is_public,
    is_favorite,
    status,
    node_count,
    edge_count,
    last_edited_by,
    view_count,
    fork_count,
    forked_from,
    created_at,
    updated_at
FROM documents";

const COLLABORATOR_SELECT_SQL: &str = "SELECT
    actor_id,
    role,
    invited_by,
    status,
    created_at,
    updated_at
FROM document_collaborators";

const DOCUMENT_COLUMNS: &[&str] = &[
    "id",
    "owner_id",
    "title",
    "description",
    "nodes_json",
    "edges_json",
    "viewport_json",
    "settings_json",
    "is_public",
    "share_token",
    "category",
    "tags_json",
    "is_favorite",
    "status",
    "node_count",
    "edge_count",
    "last_edited_by",
    "view_count",
    "fork_count",
    "forked_from",
    "created_at",
    "updated_at",
];

const COLLABORATOR_COLUMNS: &[&str] = &[
    "document_id",
    "actor_id",
    "role",
    "invited_by",
    "status",
    "created_at",
    "updated_at",
];

/// Sort order for document listings. Every order has a stable `id` tie-break.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DocumentSort {
    #[default]
    UpdatedDesc,
    UpdatedAsc,
    CreatedDesc,
    CreatedAsc,
    TitleAsc,
    TitleDesc,
    ViewsDesc,
}

/// Query options for listing documents visible to one actor.
#[derive(Debug, Clone, Default)]
pub struct DocumentListQuery {
    /// Acting user. Listings cover owned documents plus accepted
    /// collaborations.
    pub actor_id: ActorId,
    /// Exact status filter. `None` lists everything except deleted.
    pub status: Option<DocumentStatus>,
    pub category: Option<DocumentCategory>,
    pub favorites_only: bool,
    /// Restrict to this id set, e.g. full-text hits. `Some(empty)` yields
    /// an empty page.
    pub ids: Option<Vec<DocumentId>>,
    pub sort: DocumentSort,
    pub limit: Option<u32>,
    pub offset: u32,
}

/// Repository interface for document persistence.
pub trait DocumentRepository {
    /// Creates one document together with its owner collaborator row.
    fn create_document(&self, owner_id: ActorId, spec: &DocumentSpec) -> RepoResult<GraphDocument>;
    /// Loads one document with collaborators, regardless of status.
    fn get_document(&self, id: DocumentId) -> RepoResult<Option<GraphDocument>>;
    /// Loads one public document by its share token.
    fn get_document_by_share_token(&self, token: &str) -> RepoResult<Option<GraphDocument>>;
    /// Lists summaries visible to the query actor.
    fn list_documents(&self, query: &DocumentListQuery) -> RepoResult<Vec<DocumentSummary>>;
    /// Merges a patch into the stored document and commits the result.
    fn apply_patch(
        &self,
        id: DocumentId,
        actor_id: ActorId,
        patch: &GraphPatch,
    ) -> RepoResult<GraphDocument>;
    /// Deep-copies a document under a new owner and bumps the source fork
    /// counter.
    fn fork_document(
        &self,
        source_id: DocumentId,
        new_owner_id: ActorId,
        title_override: Option<&str>,
    ) -> RepoResult<GraphDocument>;
    /// Moves the document to another lifecycle status.
    fn set_status(&self, id: DocumentId, status: DocumentStatus) -> RepoResult<()>;
    /// Changes public visibility. Going public mints a share token once and
    /// keeps it across later toggles.
    fn set_visibility(&self, id: DocumentId, is_public: bool) -> RepoResult<GraphDocument>;
    fn set_favorite(&self, id: DocumentId, is_favorite: bool) -> RepoResult<()>;
    /// Increments the view counter without touching `updated_at`.
    fn record_view(&self, id: DocumentId) -> RepoResult<()>;
    /// Inserts or updates one collaborator row, preserving `invited_by` on
    /// update.
    fn upsert_collaborator(
        &self,
        document_id: DocumentId,
        collaborator: &Collaborator,
    ) -> RepoResult<()>;
    fn get_collaborator(
        &self,
        document_id: DocumentId,
        actor_id: ActorId,
    ) -> RepoResult<Option<Collaborator>>;
    fn list_collaborators(&self, document_id: DocumentId) -> RepoResult<Vec<Collaborator>>;
    /// Marks one collaborator as removed.
    fn remove_collaborator(&self, document_id: DocumentId, actor_id: ActorId) -> RepoResult<()>;
    /// Changes the role of an accepted collaborator.
    fn set_collaborator_role(
        &self,
        document_id: DocumentId,
        actor_id: ActorId,
        role: CollaboratorRole,
    ) -> RepoResult<()>;
    /// Counts collaborators holding the owner role with accepted status.
    fn count_accepted_owners(&self, document_id: DocumentId) -> RepoResult<i64>;
}

/// SQLite-backed document repository.
pub struct SqliteDocumentRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteDocumentRepository<'conn> {
    /// Creates repository from migrated connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(
            conn,
            &[
                ("documents", DOCUMENT_COLUMNS),
                ("document_collaborators", COLLABORATOR_COLUMNS),
            ],
        )?;
        Ok(Self { conn })
    }
}

impl DocumentRepository for SqliteDocumentRepository<'_> {
    fn create_document(&self, owner_id: ActorId, spec: &DocumentSpec) -> RepoResult<GraphDocument> {
        validate_actor_id(owner_id)?;
        spec.validate()?;
        validate_graph(&spec.nodes, &spec.edges)?;

        let id = Uuid::new_v4();
        let viewport = spec.viewport.unwrap_or_default();
        let settings = spec.settings.clone().unwrap_or_default();
        let share_token = if spec.is_public {
            Some(new_share_token())
        } else {
            None
        };

        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        tx.execute(
            "INSERT INTO documents (
                id,
                owner_id,
                title,
                description,
                nodes_json,
                edges_json,
                viewport_json,
                settings_json,
                is_public,
                share_token,
                category,
                tags_json,
                node_count,
                edge_count
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14);",
            params![
                id.to_string(),
                owner_id,
                spec.title.as_str(),
                spec.description.as_str(),
                to_json(&spec.nodes, "document nodes")?,
                to_json(&spec.edges, "document edges")?,
                to_json(&viewport, "document viewport")?,
                to_json(&settings, "document settings")?,
                bool_to_int(spec.is_public),
                share_token.as_deref(),
                spec.category.as_db_str(),
                to_json(&spec.tags, "document tags")?,
                spec.nodes.len() as i64,
                spec.edges.len() as i64,
            ],
        )?;
        tx.execute(
            "INSERT INTO document_collaborators (document_id, actor_id, role, invited_by, status)
             VALUES (?1, ?2, 'owner', ?2, 'accepted');",
            params![id.to_string(), owner_id],
        )?;

        let document = load_required_document(&tx, id)?;
        tx.commit()?;
        Ok(document)
    }

    fn get_document(&self, id: DocumentId) -> RepoResult<Option<GraphDocument>> {
        load_document(self.conn, id)
    }

    fn get_document_by_share_token(&self, token: &str) -> RepoResult<Option<GraphDocument>> {
        let mut stmt = self.conn.prepare(&format!(
            "{DOCUMENT_SELECT_SQL}
             WHERE share_token = ?1
               AND is_public = 1
               AND status != 'deleted';"
        ))?;
        let mut rows = stmt.query([token])?;
        if let Some(row) = rows.next()? {
            let mut document = parse_document_row(row)?;
            document.collaborators = load_collaborators(self.conn, document.id)?;
            return Ok(Some(document));
        }
        Ok(None)
    }

    fn list_documents(&self, query: &DocumentListQuery) -> RepoResult<Vec<DocumentSummary>> {
        validate_actor_id(query.actor_id)?;

        if let Some(ids) = &query.ids {
            if ids.is_empty() {
                return Ok(Vec::new());
            }
        }

        let mut sql = format!(
            "{SUMMARY_SELECT_SQL}
             WHERE (
                owner_id = ?
                OR EXISTS(
                    SELECT 1
                    FROM document_collaborators c
                    WHERE c.document_id = documents.id
                      AND c.actor_id = ?
                      AND c.status = 'accepted'
                )
             )"
        );
        let mut bind_values: Vec<Value> = vec![
            Value::Integer(query.actor_id),
            Value::Integer(query.actor_id),
        ];

        match query.status {
            Some(status) => {
                sql.push_str(" AND status = ?");
                bind_values.push(Value::Text(status.as_db_str().to_string()));
            }
            None => sql.push_str(" AND status != 'deleted'"),
        }

        if let Some(category) = query.category {
            sql.push_str(" AND category = ?");
            bind_values.push(Value::Text(category.as_db_str().to_string()));
        }

        if query.favorites_only {
            sql.push_str(" AND is_favorite = 1");
        }

        if let Some(ids) = &query.ids {
            let placeholders = vec!["?"; ids.len()].join(", ");
            sql.push_str(&format!(" AND id IN ({placeholders})"));
            for id in ids {
                bind_values.push(Value::Text(id.to_string()));
            }
        }

        sql.push_str(match query.sort {
            DocumentSort::UpdatedDesc => " ORDER BY updated_at DESC, id ASC",
            DocumentSort::UpdatedAsc => " ORDER BY updated_at ASC, id ASC",
            DocumentSort::CreatedDesc => " ORDER BY created_at DESC, id ASC",
            DocumentSort::CreatedAsc => " ORDER BY created_at ASC, id ASC",
            DocumentSort::TitleAsc => " ORDER BY title COLLATE NOCASE ASC, id ASC",
            DocumentSort::TitleDesc => " ORDER BY title COLLATE NOCASE DESC, id ASC",
            DocumentSort::ViewsDesc => " ORDER BY view_count DESC, id ASC",
        });

        if let Some(limit) = query.limit {
            sql.push_str(" LIMIT ?");
            bind_values.push(Value::Integer(i64::from(limit)));
            if query.offset > 0 {
                sql.push_str(" OFFSET ?");
                bind_values.push(Value::Integer(i64::from(query.offset)));
            }
        } else if query.offset > 0 {
            sql.push_str(" LIMIT -1 OFFSET ?");
            bind_values.push(Value::Integer(i64::from(query.offset)));
        }

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut summaries = Vec::new();

        while let Some(row) = rows.next()? {
            summaries.push(parse_summary_row(row)?);
        }

        Ok(summaries)
    }

    fn apply_patch(
        &self,
        id: DocumentId,
        actor_id: ActorId,
        patch: &GraphPatch,
    ) -> RepoResult<GraphDocument> {
        validate_actor_id(actor_id)?;
        patch.validate()?;

        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        let Some(current) = load_document(&tx, id)? else {
            return Err(RepoError::NotFound {
                entity: "documents",
                key: id.to_string(),
            });
        };

        let title = patch.title.clone().unwrap_or(current.title);
        let description = patch.description.clone().unwrap_or(current.description);
        let nodes = patch.nodes.clone().unwrap_or(current.nodes);
        let edges = patch.edges.clone().unwrap_or(current.edges);
        let viewport = patch.viewport.unwrap_or(current.viewport);
        let settings = patch.settings.clone().unwrap_or(current.settings);
        let category = patch.category.unwrap_or(current.category);
        let tags = patch.tags.clone().unwrap_or(current.tags);

        validate_graph(&nodes, &edges)?;

        tx.execute(
            "UPDATE documents
             SET title = ?2,
                 description = ?3,
                 nodes_json = ?4,
                 edges_json = ?5,
                 viewport_json = ?6,
                 settings_json = ?7,
                 category = ?8,
                 tags_json = ?9,
                 node_count = ?10,
                 edge_count = ?11,
                 last_edited_by = ?12,
                 updated_at = (strftime('%s', 'now') * 1000)
             WHERE id = ?1;",
            params![
                id.to_string(),
                title.as_str(),
                description.as_str(),
                to_json(&nodes, "document nodes")?,
                to_json(&edges, "document edges")?,
                to_json(&viewport, "document viewport")?,
                to_json(&settings, "document settings")?,
                category.as_db_str(),
                to_json(&tags, "document tags")?,
                nodes.len() as i64,
                edges.len() as i64,
                actor_id,
            ],
        )?;

        let updated = load_required_document(&tx, id)?;
        tx.commit()?;
        Ok(updated)
    }

    fn fork_document(
        &self,
        source_id: DocumentId,
        new_owner_id: ActorId,
        title_override: Option<&str>,
    ) -> RepoResult<GraphDocument> {
        validate_actor_id(new_owner_id)?;

        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        let Some(source) = load_document(&tx, source_id)? else {
            return Err(RepoError::NotFound {
                entity: "documents",
                key: source_id.to_string(),
            });
        };

        let title = match title_override {
            Some(value) => value.to_string(),
            None => fork_title(&source.title),
        };
        validate_title(&title)?;

        let id = Uuid::new_v4();
        tx.execute(
            "INSERT INTO documents (
                id,
                owner_id,
                title,
                description,
                nodes_json,
                edges_json,
                viewport_json,
                settings_json,
                is_public,
                share_token,
                category,
                tags_json,
                node_count,
                edge_count,
                forked_from
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, 0, NULL, ?9, ?10, ?11, ?12, ?13);",
            params![
                id.to_string(),
                new_owner_id,
                title.as_str(),
                source.description.as_str(),
                to_json(&source.nodes, "document nodes")?,
                to_json(&source.edges, "document edges")?,
                to_json(&source.viewport, "document viewport")?,
                to_json(&source.settings, "document settings")?,
                source.category.as_db_str(),
                to_json(&source.tags, "document tags")?,
                source.node_count,
                source.edge_count,
                source_id.to_string(),
            ],
        )?;
        tx.execute(
            "INSERT INTO document_collaborators (document_id, actor_id, role, invited_by, status)
             VALUES (?1, ?2, 'owner', ?2, 'accepted');",
            params![id.to_string(), new_owner_id],
        )?;
        tx.execute(
            "UPDATE documents
             SET fork_count = fork_count + 1
             WHERE id = ?1;",
            [source_id.to_string()],
        )?;

        let fork = load_required_document(&tx, id)?;
        tx.commit()?;
        Ok(fork)
    }

    fn set_status(&self, id: DocumentId, status: DocumentStatus) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE documents
             SET status = ?2,
                 updated_at = (strftime('%s', 'now') * 1000)
             WHERE id = ?1;",
            params![id.to_string(), status.as_db_str()],
        )?;

        if changed == 0 {
            return Err(RepoError::NotFound {
                entity: "documents",
                key: id.to_string(),
            });
        }

        Ok(())
    }

    fn set_visibility(&self, id: DocumentId, is_public: bool) -> RepoResult<GraphDocument> {
        let minted_token = if is_public {
            Some(new_share_token())
        } else {
            None
        };

        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        let changed = tx.execute(
            "UPDATE documents
             SET is_public = ?2,
                 share_token = COALESCE(share_token, ?3),
                 updated_at = (strftime('%s', 'now') * 1000)
             WHERE id = ?1;",
            params![id.to_string(), bool_to_int(is_public), minted_token],
        )?;

        if changed == 0 {
            return Err(RepoError::NotFound {
                entity: "documents",
                key: id.to_string(),
            });
        }

        let document = load_required_document(&tx, id)?;
        tx.commit()?;
        Ok(document)
    }

    fn set_favorite(&self, id: DocumentId, is_favorite: bool) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE documents
             SET is_favorite = ?2
             WHERE id = ?1;",
            params![id.to_string(), bool_to_int(is_favorite)],
        )?;

        if changed == 0 {
            return Err(RepoError::NotFound {
                entity: "documents",
                key: id.to_string(),
            });
        }

        Ok(())
    }

    fn record_view(&self, id: DocumentId) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE documents
             SET view_count = view_count + 1
             WHERE id = ?1;",
            [id.to_string()],
        )?;

        if changed == 0 {
            return Err(RepoError::NotFound {
                entity: "documents",
                key: id.to_string(),
            });
        }

        Ok(())
    }

    fn upsert_collaborator(
        &self,
        document_id: DocumentId,
        collaborator: &Collaborator,
    ) -> RepoResult<()> {
        validate_actor_id(collaborator.actor_id)?;
        validate_actor_id(collaborator.invited_by)?;

        self.conn.execute(
            "INSERT INTO document_collaborators (document_id, actor_id, role, invited_by, status)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(document_id, actor_id) DO UPDATE SET
                role = excluded.role,
                status = excluded.status,
                updated_at = (strftime('%s', 'now') * 1000);",
            params![
                document_id.to_string(),
                collaborator.actor_id,
                collaborator.role.as_db_str(),
                collaborator.invited_by,
                collaborator.status.as_db_str(),
            ],
        )?;

        Ok(())
    }

    fn get_collaborator(
        &self,
        document_id: DocumentId,
        actor_id: ActorId,
    ) -> RepoResult<Option<Collaborator>> {
        let mut stmt = self.conn.prepare(&format!(
            "{COLLABORATOR_SELECT_SQL}
             WHERE document_id = ?1
               AND actor_id = ?2;"
        ))?;
        let mut rows = stmt.query(params![document_id.to_string(), actor_id])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_collaborator_row(row)?));
        }
        Ok(None)
    }

    fn list_collaborators(&self, document_id: DocumentId) -> RepoResult<Vec<Collaborator>> {
        load_collaborators(self.conn, document_id)
    }

    fn remove_collaborator(&self, document_id: DocumentId, actor_id: ActorId) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE document_collaborators
             SET status = 'removed',
                 updated_at = (strftime('%s', 'now') * 1000)
             WHERE document_id = ?1
               AND actor_id = ?2
               AND status != 'removed';",
            params![document_id.to_string(), actor_id],
        )?;

        if changed == 0 {
            return Err(RepoError::NotFound {
                entity: "document_collaborators",
                key: format!("{document_id}/{actor_id}"),
            });
        }

        Ok(())
    }

    fn set_collaborator_role(
        &self,
        document_id: DocumentId,
        actor_id: ActorId,
        role: CollaboratorRole,
    ) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE document_collaborators
             SET role = ?3,
                 updated_at = (strftime('%s', 'now') * 1000)
             WHERE document_id = ?1
               AND actor_id = ?2
               AND status = 'accepted';",
            params![document_id.to_string(), actor_id, role.as_db_str()],
        )?;

        if changed == 0 {
            return Err(RepoError::NotFound {
                entity: "document_collaborators",
                key: format!("{document_id}/{actor_id}"),
            });
        }

        Ok(())
    }

    fn count_accepted_owners(&self, document_id: DocumentId) -> RepoResult<i64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*)
             FROM document_collaborators
             WHERE document_id = ?1
               AND role = 'owner'
               AND status = 'accepted';",
            [document_id.to_string()],
            |row| row.get(0),
        )?;
        Ok(count)
    }
}

fn new_share_token() -> String {
    Uuid::new_v4().simple().to_string()
}

/// Default fork title, clipped so the suffix never pushes it past bounds.
fn fork_title(source_title: &str) -> String {
    let suffix = " (copy)";
    let keep = MAX_TITLE_CHARS - suffix.chars().count();
    let mut title: String = source_title.chars().take(keep).collect();
    title.push_str(suffix);
    title
}

fn load_document(conn: &Connection, id: DocumentId) -> RepoResult<Option<GraphDocument>> {
    let mut stmt = conn.prepare(&format!("{DOCUMENT_SELECT_SQL} WHERE id = ?1;"))?;
    let mut rows = stmt.query([id.to_string()])?;
    if let Some(row) = rows.next()? {
        let mut document = parse_document_row(row)?;
        document.collaborators = load_collaborators(conn, document.id)?;
        return Ok(Some(document));
    }
    Ok(None)
}

fn load_required_document(conn: &Connection, id: DocumentId) -> RepoResult<GraphDocument> {
    load_document(conn, id)?.ok_or_else(|| RepoError::NotFound {
        entity: "documents",
        key: id.to_string(),
    })
}

fn load_collaborators(conn: &Connection, document_id: DocumentId) -> RepoResult<Vec<Collaborator>> {
    let mut stmt = conn.prepare(&format!(
        "{COLLABORATOR_SELECT_SQL}
         WHERE document_id = ?1
         ORDER BY created_at ASC, actor_id ASC;"
    ))?;
    let mut rows = stmt.query([document_id.to_string()])?;
    let mut collaborators = Vec::new();
    while let Some(row) = rows.next()? {
        collaborators.push(parse_collaborator_row(row)?);
    }
    Ok(collaborators)
}

fn parse_document_row(row: &Row<'_>) -> RepoResult<GraphDocument> {
    let id_text: String = row.get("id")?;
    let id = parse_uuid(&id_text, "documents.id")?;

    let forked_from = row
        .get::<_, Option<String>>("forked_from")?
        .map(|value| parse_uuid(&value, "documents.forked_from"))
        .transpose()?;

    let category_text: String = row.get("category")?;
    let category = DocumentCategory::parse_db_str(&category_text).ok_or_else(|| {
        RepoError::InvalidData(format!(
            "invalid category `{category_text}` in documents.category"
        ))
    })?;

    let status_text: String = row.get("status")?;
    let status = DocumentStatus::parse_db_str(&status_text).ok_or_else(|| {
        RepoError::InvalidData(format!("invalid status `{status_text}` in documents.status"))
    })?;

    let nodes_text: String = row.get("nodes_json")?;
    let edges_text: String = row.get("edges_json")?;
    let viewport_text: String = row.get("viewport_json")?;
    let settings_text: String = row.get("settings_json")?;
    let tags_text: String = row.get("tags_json")?;

    Ok(GraphDocument {
        id,
        owner_id: row.get("owner_id")?,
        title: row.get("title")?,
        description: row.get("description")?,
        nodes: from_json(&nodes_text, "documents.nodes_json")?,
        edges: from_json(&edges_text, "documents.edges_json")?,
        viewport: from_json(&viewport_text, "documents.viewport_json")?,
        settings: from_json(&settings_text, "documents.settings_json")?,
        collaborators: Vec::new(),
        is_public: parse_bool(row.get("is_public")?, "documents.is_public")?,
        share_token: row.get("share_token")?,
        category,
        tags: from_json(&tags_text, "documents.tags_json")?,
        is_favorite: parse_bool(row.get("is_favorite")?, "documents.is_favorite")?,
        status,
        node_count: row.get("node_count")?,
        edge_count: row.get("edge_count")?,
        last_edited_by: row.get("last_edited_by")?,
        view_count: row.get("view_count")?,
        fork_count: row.get("fork_count")?,
        forked_from,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

fn parse_summary_row(row: &Row<'_>) -> RepoResult<DocumentSummary> {
    let id_text: String = row.get("id")?;
    let id = parse_uuid(&id_text, "documents.id")?;

    let forked_from = row
        .get::<_, Option<String>>("forked_from")?
        .map(|value| parse_uuid(&value, "documents.forked_from"))
        .transpose()?;

    let category_text: String = row.get("category")?;
    let category = DocumentCategory::parse_db_str(&category_text).ok_or_else(|| {
        RepoError::InvalidData(format!(
            "invalid category `{category_text}` in documents.category"
        ))
    })?;

    let status_text: String = row.get("status")?;
    let status = DocumentStatus::parse_db_str(&status_text).ok_or_else(|| {
        RepoError::InvalidData(format!("invalid status `{status_text}` in documents.status"))
    })?;

    let tags_text: String = row.get("tags_json")?;

    Ok(DocumentSummary {
        id,
        owner_id: row.get("owner_id")?,
        title: row.get("title")?,
        description: row.get("description")?,
        category,
        tags: from_json(&tags_text, "documents.tags_json")?,
        is_public: parse_bool(row.get("is_public")?, "documents.is_public")?,
        is_favorite: parse_bool(row.get("is_favorite")?, "documents.is_favorite")?,
        status,
        node_count: row.get("node_count")?,
        edge_count: row.get("edge_count")?,
        last_edited_by: row.get("last_edited_by")?,
        view_count: row.get("view_count")?,
        fork_count: row.get("fork_count")?,
        forked_from,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

fn parse_collaborator_row(row: &Row<'_>) -> RepoResult<Collaborator> {
    let role_text: String = row.get("role")?;
    let role = CollaboratorRole::parse_db_str(&role_text).ok_or_else(|| {
        RepoError::InvalidData(format!(
            "invalid role `{role_text}` in document_collaborators.role"
        ))
    })?;

    let status_text: String = row.get("status")?;
    let status = CollaboratorStatus::parse_db_str(&status_text).ok_or_else(|| {
        RepoError::InvalidData(format!(
            "invalid status `{status_text}` in document_collaborators.status"
        ))
    })?;

    Ok(Collaborator {
        actor_id: row.get("actor_id")?,
        role,
        invited_by: row.get("invited_by")?,
        status,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}
