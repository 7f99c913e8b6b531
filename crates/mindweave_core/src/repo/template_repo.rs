//! Template catalog repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Persist reusable templates and their usage counters.
//!
//! # Invariants
//! - `usage_count` only moves through single-statement increments, so
//!   concurrent instantiations never lose updates.
//! - Catalog listings cover active public templates only.

use crate::model::document::DocumentCategory;
use crate::model::graph::GraphSnapshot;
use crate::model::template::{Template, TemplateSpec, TemplateStatus};
use crate::model::{validate_actor_id, ActorId};
use crate::repo::{
    bool_to_int, ensure_connection_ready, from_json, parse_bool, parse_uuid, to_json, RepoError,
    RepoResult,
};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, Row};
use uuid::Uuid;

const TEMPLATE_SELECT_SQL: &str = "SELECT
    id,
    title,
    description,
    category,
    tags_json,
    snapshot_json,
    created_by,
    is_official,
    is_public,
    status,
    usage_count,
    created_at,
    updated_at
FROM templates";

const TEMPLATE_COLUMNS: &[&str] = &[
    "id",
    "title",
    "description",
    "category",
    "tags_json",
    "snapshot_json",
    "created_by",
    "is_official",
    "is_public",
    "status",
    "usage_count",
    "created_at",
    "updated_at",
];

/// Query options for the template catalog.
#[derive(Debug, Clone, Default)]
pub struct TemplateListQuery {
    pub category: Option<DocumentCategory>,
    pub official_only: bool,
    pub limit: Option<u32>,
    pub offset: u32,
}

/// Repository interface for templates.
pub trait TemplateRepository {
    fn create_template(&self, created_by: ActorId, spec: &TemplateSpec) -> RepoResult<Template>;
    fn get_template(&self, id: Uuid) -> RepoResult<Option<Template>>;
    /// Lists active public templates, newest-first.
    fn list_templates(&self, query: &TemplateListQuery) -> RepoResult<Vec<Template>>;
    /// Most instantiated active public templates.
    fn list_popular(&self, limit: u32) -> RepoResult<Vec<Template>>;
    /// Atomically bumps the usage counter of one active template.
    fn increment_usage(&self, id: Uuid) -> RepoResult<()>;
    fn set_status(&self, id: Uuid, status: TemplateStatus) -> RepoResult<()>;
}

/// SQLite-backed template repository.
pub struct SqliteTemplateRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteTemplateRepository<'conn> {
    /// Creates repository from migrated connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(conn, &[("templates", TEMPLATE_COLUMNS)])?;
        Ok(Self { conn })
    }
}

impl TemplateRepository for SqliteTemplateRepository<'_> {
    fn create_template(&self, created_by: ActorId, spec: &TemplateSpec) -> RepoResult<Template> {
        validate_actor_id(created_by)?;
        spec.validate()?;
        spec.validate_snapshot()?;

        let id = Uuid::new_v4();
        self.conn.execute(
            "INSERT INTO templates (
                id,
                title,
                description,
                category,
                tags_json,
                snapshot_json,
                created_by,
                is_official,
                is_public
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9);",
            params![
                id.to_string(),
                spec.title.as_str(),
                spec.description.as_deref(),
                spec.category.as_db_str(),
                to_json(&spec.tags, "template tags")?,
                to_json(&spec.snapshot, "template snapshot")?,
                created_by,
                bool_to_int(spec.is_official),
                bool_to_int(spec.is_public),
            ],
        )?;

        load_required_template(self.conn, id)
    }

    fn get_template(&self, id: Uuid) -> RepoResult<Option<Template>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{TEMPLATE_SELECT_SQL} WHERE id = ?1;"))?;
        let mut rows = stmt.query([id.to_string()])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_template_row(row)?));
        }
        Ok(None)
    }

    fn list_templates(&self, query: &TemplateListQuery) -> RepoResult<Vec<Template>> {
        let mut sql = format!(
            "{TEMPLATE_SELECT_SQL}
             WHERE status = 'active'
               AND is_public = 1"
        );
        let mut bind_values: Vec<Value> = Vec::new();

        if let Some(category) = query.category {
            sql.push_str(" AND category = ?");
            bind_values.push(Value::Text(category.as_db_str().to_string()));
        }

        if query.official_only {
            sql.push_str(" AND is_official = 1");
        }

        sql.push_str(" ORDER BY created_at DESC, id ASC");

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
        let mut templates = Vec::new();

        while let Some(row) = rows.next()? {
            templates.push(parse_template_row(row)?);
        }

        Ok(templates)
    }

    fn list_popular(&self, limit: u32) -> RepoResult<Vec<Template>> {
        let mut stmt = self.conn.prepare(&format!(
            "{TEMPLATE_SELECT_SQL}
             WHERE status = 'active'
               AND is_public = 1
             ORDER BY usage_count DESC, id ASC
             LIMIT ?1;"
        ))?;
        let mut rows = stmt.query([i64::from(limit)])?;
        let mut templates = Vec::new();

        while let Some(row) = rows.next()? {
            templates.push(parse_template_row(row)?);
        }

        Ok(templates)
    }

    fn increment_usage(&self, id: Uuid) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE templates
             SET usage_count = usage_count + 1,
                 updated_at = (strftime('%s', 'now') * 1000)
             WHERE id = ?1
               AND status = 'active';",
            [id.to_string()],
        )?;

        if changed == 0 {
            return Err(RepoError::NotFound {
                entity: "templates",
                key: id.to_string(),
            });
        }

        Ok(())
    }

    fn set_status(&self, id: Uuid, status: TemplateStatus) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE templates
             SET status = ?2,
                 updated_at = (strftime('%s', 'now') * 1000)
             WHERE id = ?1;",
            params![id.to_string(), status.as_db_str()],
        )?;

        if changed == 0 {
            return Err(RepoError::NotFound {
                entity: "templates",
                key: id.to_string(),
            });
        }

        Ok(())
    }
}

fn load_required_template(conn: &Connection, id: Uuid) -> RepoResult<Template> {
    let mut stmt = conn.prepare(&format!("{TEMPLATE_SELECT_SQL} WHERE id = ?1;"))?;
    let mut rows = stmt.query([id.to_string()])?;
    if let Some(row) = rows.next()? {
        return parse_template_row(row);
    }
    Err(RepoError::NotFound {
        entity: "templates",
        key: id.to_string(),
    })
}

fn parse_template_row(row: &Row<'_>) -> RepoResult<Template> {
    let id_text: String = row.get("id")?;
    let id = parse_uuid(&id_text, "templates.id")?;

    let category_text: String = row.get("category")?;
    let category = DocumentCategory::parse_db_str(&category_text).ok_or_else(|| {
        RepoError::InvalidData(format!(
            "invalid category `{category_text}` in templates.category"
        ))
    })?;

    let status_text: String = row.get("status")?;
    let status = TemplateStatus::parse_db_str(&status_text).ok_or_else(|| {
        RepoError::InvalidData(format!("invalid status `{status_text}` in templates.status"))
    })?;

    let tags_text: String = row.get("tags_json")?;
    let snapshot_text: String = row.get("snapshot_json")?;
    let snapshot: GraphSnapshot = from_json(&snapshot_text, "templates.snapshot_json")?;

    Ok(Template {
        id,
        title: row.get("title")?,
        description: row.get("description")?,
        category,
        tags: from_json(&tags_text, "templates.tags_json")?,
        snapshot,
        created_by: row.get("created_by")?,
        is_official: parse_bool(row.get("is_official")?, "templates.is_official")?,
        is_public: parse_bool(row.get("is_public")?, "templates.is_public")?,
        status,
        usage_count: row.get("usage_count")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}
