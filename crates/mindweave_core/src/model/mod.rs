//! Domain model for collaborative graph documents.
//!
//! # Responsibility
//! - Define canonical data structures shared by repository and service layers.
//! - Own field-level validation so every write path fails closed before SQL.
//!
//! # Invariants
//! - Documents, versions, invitations, templates and comments are identified
//!   by stable UUIDs; actors are opaque integer references.
//! - Deletion of documents is represented by status transitions, not hard
//!   delete.

use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod activity;
pub mod comment;
pub mod document;
pub mod graph;
pub mod history;
pub mod invitation;
pub mod presence;
pub mod template;
pub mod version;

/// Opaque actor reference resolved by an external user directory.
pub type ActorId = i64;

/// Field-level validation failure raised before any persistence write.
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationError {
    /// Title is blank after trim.
    TitleRequired,
    /// Title exceeds the allowed length.
    TitleTooLong { length: usize, max: usize },
    /// Description exceeds the allowed length.
    DescriptionTooLong { length: usize, max: usize },
    /// Name is blank after trim.
    NameRequired,
    /// Name exceeds the allowed length.
    NameTooLong { length: usize, max: usize },
    /// Comment content is blank after trim.
    ContentRequired,
    /// Comment content exceeds the allowed length.
    ContentTooLong { length: usize, max: usize },
    /// Invitation message exceeds the allowed length.
    MessageTooLong { length: usize, max: usize },
    /// Actor references must be positive integers.
    InvalidActorId(ActorId),
    /// Invitation email does not look like an address.
    InvalidEmail(String),
    /// The owner role cannot be granted through invitations or role updates.
    OwnerRoleNotAssignable,
    /// Viewport zoom is outside the supported range.
    ZoomOutOfRange(f64),
}

impl Display for ValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::TitleRequired => write!(f, "title must not be blank"),
            Self::TitleTooLong { length, max } => {
                write!(f, "title length {length} exceeds maximum {max}")
            }
            Self::DescriptionTooLong { length, max } => {
                write!(f, "description length {length} exceeds maximum {max}")
            }
            Self::NameRequired => write!(f, "name must not be blank"),
            Self::NameTooLong { length, max } => {
                write!(f, "name length {length} exceeds maximum {max}")
            }
            Self::ContentRequired => write!(f, "content must not be blank"),
            Self::ContentTooLong { length, max } => {
                write!(f, "content length {length} exceeds maximum {max}")
            }
            Self::MessageTooLong { length, max } => {
                write!(f, "message length {length} exceeds maximum {max}")
            }
            Self::InvalidActorId(actor_id) => {
                write!(f, "actor id must be positive, got {actor_id}")
            }
            Self::InvalidEmail(email) => write!(f, "invalid email address: {email}"),
            Self::OwnerRoleNotAssignable => {
                write!(f, "the owner role cannot be assigned through this operation")
            }
            Self::ZoomOutOfRange(zoom) => {
                write!(f, "viewport zoom {zoom} is outside the supported range")
            }
        }
    }
}

impl Error for ValidationError {}

/// Validates an opaque actor reference.
pub fn validate_actor_id(actor_id: ActorId) -> Result<(), ValidationError> {
    if actor_id <= 0 {
        return Err(ValidationError::InvalidActorId(actor_id));
    }
    Ok(())
}
