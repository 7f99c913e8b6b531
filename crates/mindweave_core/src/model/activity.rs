//! Activity feed entries.
//!
//! Entries are append-only audit records with a 180-day retention window.
//! Failures while recording them must never abort the action that triggered
//! them; callers log and continue.

use crate::model::document::DocumentId;
use crate::model::ActorId;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Activity retention window (180 days).
pub const ACTIVITY_RETENTION_MS: i64 = 180 * 24 * 60 * 60 * 1000;

/// What happened to a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityKind {
    Created,
    Updated,
    Viewed,
    Shared,
    Unshared,
    Forked,
    Commented,
    CollaboratorAdded,
    CollaboratorRemoved,
    VersionCreated,
    TemplateUsed,
}

impl ActivityKind {
    pub fn as_db_str(self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Updated => "updated",
            Self::Viewed => "viewed",
            Self::Shared => "shared",
            Self::Unshared => "unshared",
            Self::Forked => "forked",
            Self::Commented => "commented",
            Self::CollaboratorAdded => "collaborator_added",
            Self::CollaboratorRemoved => "collaborator_removed",
            Self::VersionCreated => "version_created",
            Self::TemplateUsed => "template_used",
        }
    }

    pub fn parse_db_str(value: &str) -> Option<Self> {
        match value {
            "created" => Some(Self::Created),
            "updated" => Some(Self::Updated),
            "viewed" => Some(Self::Viewed),
            "shared" => Some(Self::Shared),
            "unshared" => Some(Self::Unshared),
            "forked" => Some(Self::Forked),
            "commented" => Some(Self::Commented),
            "collaborator_added" => Some(Self::CollaboratorAdded),
            "collaborator_removed" => Some(Self::CollaboratorRemoved),
            "version_created" => Some(Self::VersionCreated),
            "template_used" => Some(Self::TemplateUsed),
            _ => None,
        }
    }
}

/// One feed entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityEntry {
    pub seq: i64,
    pub document_id: DocumentId,
    pub actor_id: ActorId,
    pub kind: ActivityKind,
    /// Free-form context, e.g. the name of a created version.
    pub details: Option<Value>,
    pub created_at: i64,
}
