//! Token-based collaboration invitations.
//!
//! # Invariants
//! - Tokens are unique and unguessable.
//! - At most one live pending invitation exists per (document, email) pair.
//! - Status moves pending -> accepted | rejected | cancelled | expired and
//!   never back.

use crate::model::document::{CollaboratorRole, DocumentId};
use crate::model::{ActorId, ValidationError};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Default invitation lifetime (7 days).
pub const INVITATION_TTL_MS: i64 = 7 * 24 * 60 * 60 * 1000;
/// Maximum invitation message length in characters.
pub const MAX_MESSAGE_CHARS: usize = 500;

/// Invitation lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvitationStatus {
    Pending,
    Accepted,
    Rejected,
    Cancelled,
    Expired,
}

impl InvitationStatus {
    pub fn as_db_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Accepted => "accepted",
            Self::Rejected => "rejected",
            Self::Cancelled => "cancelled",
            Self::Expired => "expired",
        }
    }

    pub fn parse_db_str(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(Self::Pending),
            "accepted" => Some(Self::Accepted),
            "rejected" => Some(Self::Rejected),
            "cancelled" => Some(Self::Cancelled),
            "expired" => Some(Self::Expired),
            _ => None,
        }
    }
}

/// One invitation row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Invitation {
    pub id: Uuid,
    pub document_id: DocumentId,
    pub invited_by: ActorId,
    /// Normalized to lowercase at creation.
    pub email: String,
    /// Filled when the invitee's actor id is already known.
    pub invited_actor_id: Option<ActorId>,
    /// Restricted to editor/viewer; owner is never assignable here.
    pub role: CollaboratorRole,
    pub token: String,
    pub message: Option<String>,
    pub status: InvitationStatus,
    /// Epoch ms expiry boundary.
    pub expires_at: i64,
    pub accepted_at: Option<i64>,
    pub created_at: i64,
    pub updated_at: i64,
}

pub(crate) fn validate_message(message: &str) -> Result<(), ValidationError> {
    let length = message.chars().count();
    if length > MAX_MESSAGE_CHARS {
        return Err(ValidationError::MessageTooLong {
            length,
            max: MAX_MESSAGE_CHARS,
        });
    }
    Ok(())
}
