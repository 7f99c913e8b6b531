//! Node-anchored discussion threads.

use crate::model::document::DocumentId;
use crate::model::{ActorId, ValidationError};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Maximum comment body length in characters.
pub const MAX_CONTENT_CHARS: usize = 2000;

/// One comment, anchored to a node and optionally replying to a parent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    pub id: Uuid,
    pub document_id: DocumentId,
    /// Node the thread hangs off. Kept even if the node is later removed so
    /// the thread history stays readable.
    pub node_id: String,
    pub author_id: ActorId,
    pub content: String,
    /// Actor ids mentioned in the body.
    pub mentions: Vec<ActorId>,
    pub parent_comment_id: Option<Uuid>,
    pub resolved: bool,
    pub resolved_by: Option<ActorId>,
    pub resolved_at: Option<i64>,
    pub is_edited: bool,
    pub edited_at: Option<i64>,
    pub created_at: i64,
    pub updated_at: i64,
}

pub(crate) fn validate_content(content: &str) -> Result<(), ValidationError> {
    if content.trim().is_empty() {
        return Err(ValidationError::ContentRequired);
    }
    let length = content.chars().count();
    if length > MAX_CONTENT_CHARS {
        return Err(ValidationError::ContentTooLong {
            length,
            max: MAX_CONTENT_CHARS,
        });
    }
    Ok(())
}
