//! Graph document aggregate and its lifecycle enums.
//!
//! # Responsibility
//! - Define the document read model, creation input, and mutation patch.
//! - Map lifecycle/category/role enums to their persisted string forms.
//!
//! # Invariants
//! - A document always carries exactly one owner collaborator with status
//!   accepted.
//! - Derived counters mirror `nodes.len()` / `edges.len()` after every commit.
//! - Patch application is last-writer-wins per field; absent fields are left
//!   untouched.

use crate::model::graph::{
    DocumentSettings, Edge, GraphSnapshot, Node, Viewport,
};
use crate::model::{ActorId, ValidationError};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stable identifier for graph documents.
pub type DocumentId = Uuid;

/// Maximum title length in characters.
pub const MAX_TITLE_CHARS: usize = 255;
/// Maximum description length in characters.
pub const MAX_DESCRIPTION_CHARS: usize = 2000;

/// Document lifecycle status. Hard delete does not exist in this subsystem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentStatus {
    Active,
    Archived,
    Deleted,
}

impl DocumentStatus {
    pub fn as_db_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Archived => "archived",
            Self::Deleted => "deleted",
        }
    }

    pub fn parse_db_str(value: &str) -> Option<Self> {
        match value {
            "active" => Some(Self::Active),
            "archived" => Some(Self::Archived),
            "deleted" => Some(Self::Deleted),
            _ => None,
        }
    }
}

/// Coarse document grouping used by list filters and templates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentCategory {
    Work,
    Personal,
    Education,
    Project,
    Brainstorming,
    AiGenerated,
    #[default]
    Other,
}

impl DocumentCategory {
    pub fn as_db_str(self) -> &'static str {
        match self {
            Self::Work => "work",
            Self::Personal => "personal",
            Self::Education => "education",
            Self::Project => "project",
            Self::Brainstorming => "brainstorming",
            Self::AiGenerated => "ai_generated",
            Self::Other => "other",
        }
    }

    pub fn parse_db_str(value: &str) -> Option<Self> {
        match value {
            "work" => Some(Self::Work),
            "personal" => Some(Self::Personal),
            "education" => Some(Self::Education),
            "project" => Some(Self::Project),
            "brainstorming" => Some(Self::Brainstorming),
            "ai_generated" => Some(Self::AiGenerated),
            "other" => Some(Self::Other),
            _ => None,
        }
    }
}

/// Collaborator role. Write access requires `Owner` or `Editor`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollaboratorRole {
    Owner,
    Editor,
    Viewer,
}

impl CollaboratorRole {
    /// Whether this role may commit document mutations.
    pub fn can_edit(self) -> bool {
        matches!(self, Self::Owner | Self::Editor)
    }

    pub fn as_db_str(self) -> &'static str {
        match self {
            Self::Owner => "owner",
            Self::Editor => "editor",
            Self::Viewer => "viewer",
        }
    }

    pub fn parse_db_str(value: &str) -> Option<Self> {
        match value {
            "owner" => Some(Self::Owner),
            "editor" => Some(Self::Editor),
            "viewer" => Some(Self::Viewer),
            _ => None,
        }
    }
}

/// Collaborator membership lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollaboratorStatus {
    Pending,
    Accepted,
    Rejected,
    Removed,
}

impl CollaboratorStatus {
    pub fn as_db_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Accepted => "accepted",
            Self::Rejected => "rejected",
            Self::Removed => "removed",
        }
    }

    pub fn parse_db_str(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(Self::Pending),
            "accepted" => Some(Self::Accepted),
            "rejected" => Some(Self::Rejected),
            "removed" => Some(Self::Removed),
            _ => None,
        }
    }
}

/// One collaborator entry of a document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Collaborator {
    pub actor_id: ActorId,
    pub role: CollaboratorRole,
    pub invited_by: ActorId,
    pub status: CollaboratorStatus,
    /// Epoch ms membership timestamps.
    pub created_at: i64,
    pub updated_at: i64,
}

impl Collaborator {
    /// Builds a membership row for writing. Row timestamps are
    /// storage-assigned; the zeros here are never persisted.
    pub fn new(
        actor_id: ActorId,
        role: CollaboratorRole,
        invited_by: ActorId,
        status: CollaboratorStatus,
    ) -> Self {
        Self {
            actor_id,
            role,
            invited_by,
            status,
            created_at: 0,
            updated_at: 0,
        }
    }
}

/// Full document read model, collaborators included.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphDocument {
    pub id: DocumentId,
    pub owner_id: ActorId,
    pub title: String,
    pub description: String,
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
    pub viewport: Viewport,
    pub settings: DocumentSettings,
    pub collaborators: Vec<Collaborator>,
    pub is_public: bool,
    /// Unguessable token for public link access. Kept after unsharing so a
    /// re-share restores the same link; lookups check `is_public` first.
    pub share_token: Option<String>,
    pub category: DocumentCategory,
    pub tags: Vec<String>,
    pub is_favorite: bool,
    pub status: DocumentStatus,
    /// Derived: always equals `nodes.len()` after commit.
    pub node_count: i64,
    /// Derived: always equals `edges.len()` after commit.
    pub edge_count: i64,
    pub last_edited_by: Option<ActorId>,
    pub view_count: i64,
    pub fork_count: i64,
    pub forked_from: Option<DocumentId>,
    /// Epoch ms row timestamps.
    pub created_at: i64,
    pub updated_at: i64,
}

impl GraphDocument {
    /// Captures the current graph state as an immutable snapshot.
    pub fn snapshot(&self) -> GraphSnapshot {
        GraphSnapshot {
            nodes: self.nodes.clone(),
            edges: self.edges.clone(),
            viewport: self.viewport,
            settings: self.settings.clone(),
        }
    }

    /// Returns the accepted role held by `actor_id`, if any.
    pub fn role_of(&self, actor_id: ActorId) -> Option<CollaboratorRole> {
        self.collaborators
            .iter()
            .find(|collaborator| {
                collaborator.actor_id == actor_id
                    && collaborator.status == CollaboratorStatus::Accepted
            })
            .map(|collaborator| collaborator.role)
    }
}

/// List projection without the node/edge payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentSummary {
    pub id: DocumentId,
    pub owner_id: ActorId,
    pub title: String,
    pub description: String,
    pub category: DocumentCategory,
    pub tags: Vec<String>,
    pub is_public: bool,
    pub is_favorite: bool,
    pub status: DocumentStatus,
    pub node_count: i64,
    pub edge_count: i64,
    pub last_edited_by: Option<ActorId>,
    pub view_count: i64,
    pub fork_count: i64,
    pub forked_from: Option<DocumentId>,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Creation input for a new document.
///
/// Defaults mirror a blank canvas: empty graph, centered viewport, standard
/// settings, category `other`, private visibility.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentSpec {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub nodes: Vec<Node>,
    #[serde(default)]
    pub edges: Vec<Edge>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub viewport: Option<Viewport>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub settings: Option<DocumentSettings>,
    #[serde(default)]
    pub category: DocumentCategory,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub is_public: bool,
}

impl DocumentSpec {
    /// Creates a spec with the given title and blank-canvas defaults.
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }

    /// Field-level checks, run before any write.
    ///
    /// # Errors
    /// - `TitleRequired` / `TitleTooLong` on title bounds.
    /// - `DescriptionTooLong` on description bounds.
    /// - `ZoomOutOfRange` when an explicit viewport is out of range.
    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_title(&self.title)?;
        validate_description(&self.description)?;
        if let Some(viewport) = &self.viewport {
            viewport.validate()?;
        }
        Ok(())
    }
}

/// Last-writer-wins mutation patch. Absent fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nodes: Option<Vec<Node>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub edges: Option<Vec<Edge>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub viewport: Option<Viewport>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub settings: Option<DocumentSettings>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<DocumentCategory>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
}

impl GraphPatch {
    /// Whether the patch carries no field at all.
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.nodes.is_none()
            && self.edges.is_none()
            && self.viewport.is_none()
            && self.settings.is_none()
            && self.category.is_none()
            && self.tags.is_none()
    }

    /// Field-level checks, run before any write.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if let Some(title) = &self.title {
            validate_title(title)?;
        }
        if let Some(description) = &self.description {
            validate_description(description)?;
        }
        if let Some(viewport) = &self.viewport {
            viewport.validate()?;
        }
        Ok(())
    }

    /// Applies the graph-level fields of this patch onto a snapshot.
    ///
    /// Document-level fields (title, description, category, tags) are not
    /// part of graph state and are ignored here.
    pub fn apply_to_snapshot(&self, snapshot: &mut GraphSnapshot) {
        if let Some(nodes) = &self.nodes {
            snapshot.nodes = nodes.clone();
        }
        if let Some(edges) = &self.edges {
            snapshot.edges = edges.clone();
        }
        if let Some(viewport) = self.viewport {
            snapshot.viewport = viewport;
        }
        if let Some(settings) = &self.settings {
            snapshot.settings = settings.clone();
        }
    }
}

pub(crate) fn validate_title(title: &str) -> Result<(), ValidationError> {
    if title.trim().is_empty() {
        return Err(ValidationError::TitleRequired);
    }
    let length = title.chars().count();
    if length > MAX_TITLE_CHARS {
        return Err(ValidationError::TitleTooLong {
            length,
            max: MAX_TITLE_CHARS,
        });
    }
    Ok(())
}

pub(crate) fn validate_description(description: &str) -> Result<(), ValidationError> {
    let length = description.chars().count();
    if length > MAX_DESCRIPTION_CHARS {
        return Err(ValidationError::DescriptionTooLong {
            length,
            max: MAX_DESCRIPTION_CHARS,
        });
    }
    Ok(())
}
