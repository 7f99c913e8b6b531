//! Reusable document templates.

use crate::model::document::{
    validate_description, validate_title, DocumentCategory,
};
use crate::model::graph::{validate_graph, GraphSnapshot};
use crate::model::{ActorId, ValidationError};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Template lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TemplateStatus {
    Active,
    Archived,
    Deleted,
}

impl TemplateStatus {
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

/// A registered template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Template {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub category: DocumentCategory,
    pub tags: Vec<String>,
    /// Seed graph cloned into each instantiated document.
    pub snapshot: GraphSnapshot,
    pub created_by: ActorId,
    pub is_official: bool,
    pub is_public: bool,
    pub status: TemplateStatus,
    /// Total successful instantiations.
    pub usage_count: i64,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Input for registering a template.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TemplateSpec {
    pub title: String,
    pub description: Option<String>,
    #[serde(default)]
    pub category: DocumentCategory,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub snapshot: GraphSnapshot,
    #[serde(default)]
    pub is_official: bool,
    #[serde(default = "default_public")]
    pub is_public: bool,
}

impl TemplateSpec {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            is_public: true,
            ..Self::default()
        }
    }

    /// Checks bounds and the structural rules of the seed graph.
    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_title(&self.title)?;
        if let Some(description) = &self.description {
            validate_description(description)?;
        }
        self.snapshot.viewport.validate()?;
        Ok(())
    }

    /// Structural check of the seed graph, separate from field bounds so
    /// callers can map the two failure kinds to different errors.
    pub fn validate_snapshot(&self) -> Result<(), crate::model::graph::GraphViolation> {
        validate_graph(&self.snapshot.nodes, &self.snapshot.edges)
    }
}

fn default_public() -> bool {
    true
}
