//! Named immutable version snapshots.
//!
//! # Invariants
//! - `(document_id, version)` is unique; numbers are contiguous from 1.
//! - Rows are immutable once written; there is no update path.

use crate::model::document::DocumentId;
use crate::model::graph::GraphSnapshot;
use crate::model::{ActorId, ValidationError};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Maximum version name length in characters.
pub const MAX_VERSION_NAME_CHARS: usize = 255;
/// Maximum version description length in characters.
pub const MAX_VERSION_DESCRIPTION_CHARS: usize = 1000;

/// One archived document version.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentVersion {
    pub id: Uuid,
    pub document_id: DocumentId,
    /// Per-document number, contiguous from 1.
    pub version: i64,
    pub name: String,
    pub description: Option<String>,
    pub snapshot: GraphSnapshot,
    pub created_by: ActorId,
    pub is_autosave: bool,
    /// Epoch ms row timestamp.
    pub created_at: i64,
}

pub(crate) fn validate_version_name(name: &str) -> Result<(), ValidationError> {
    if name.trim().is_empty() {
        return Err(ValidationError::NameRequired);
    }
    let length = name.chars().count();
    if length > MAX_VERSION_NAME_CHARS {
        return Err(ValidationError::NameTooLong {
            length,
            max: MAX_VERSION_NAME_CHARS,
        });
    }
    Ok(())
}

pub(crate) fn validate_version_description(description: &str) -> Result<(), ValidationError> {
    let length = description.chars().count();
    if length > MAX_VERSION_DESCRIPTION_CHARS {
        return Err(ValidationError::DescriptionTooLong {
            length,
            max: MAX_VERSION_DESCRIPTION_CHARS,
        });
    }
    Ok(())
}
