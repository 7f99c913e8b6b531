//! Presence registry use-case service.
//!
//! # Responsibility
//! - Track live connections per document from an explicit host clock.
//! - Enforce join/heartbeat/leave semantics over the session repository.
//!
//! # Invariants
//! - One session per connection id; rejoining an id that is still registered
//!   is a conflict, not a refresh.
//! - Sessions from the same actor in different tabs stay independent.
//! - A heartbeat for a swept session fails; the caller must rejoin.

use crate::model::document::DocumentId;
use crate::model::presence::{PresenceHeartbeat, PresenceSession, PresenceUserInfo};
use crate::model::{validate_actor_id, ActorId, ValidationError};
use crate::repo::presence_repo::PresenceRepository;
use crate::repo::RepoError;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Errors from presence service operations.
#[derive(Debug)]
pub enum PresenceServiceError {
    /// Join target document does not exist.
    DocumentNotFound(DocumentId),
    /// No session is registered under this connection id.
    SessionNotFound(String),
    /// The connection id is already registered.
    DuplicateConnection(String),
    /// Field-level validation rejected the input.
    InvalidSpec(ValidationError),
    /// Persistence-layer failure.
    Repo(RepoError),
}

impl Display for PresenceServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DocumentNotFound(id) => write!(f, "document not found: {id}"),
            Self::SessionNotFound(connection_id) => {
                write!(f, "presence session not found: {connection_id}")
            }
            Self::DuplicateConnection(connection_id) => {
                write!(f, "connection id already registered: {connection_id}")
            }
            Self::InvalidSpec(err) => write!(f, "{err}"),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for PresenceServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::InvalidSpec(err) => Some(err),
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for PresenceServiceError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::Validation(err) => Self::InvalidSpec(err),
            other => Self::Repo(other),
        }
    }
}

/// Presence service facade over the session repository.
pub struct PresenceService<P: PresenceRepository> {
    repo: P,
}

impl<P: PresenceRepository> PresenceService<P> {
    /// Creates service from repository implementation.
    pub fn new(repo: P) -> Self {
        Self { repo }
    }

    /// Registers a new connection on a document.
    ///
    /// # Contract
    /// - `connection_id` must not be registered yet, else
    ///   `DuplicateConnection`.
    /// - The session starts with connected-at and last-activity at `now_ms`.
    pub fn join(
        &self,
        document_id: DocumentId,
        actor_id: ActorId,
        connection_id: impl Into<String>,
        user_info: Option<PresenceUserInfo>,
        now_ms: i64,
    ) -> Result<PresenceSession, PresenceServiceError> {
        validate_actor_id(actor_id).map_err(PresenceServiceError::InvalidSpec)?;

        let session = PresenceSession {
            connection_id: connection_id.into(),
            document_id,
            actor_id,
            user_info,
            cursor: None,
            viewport: None,
            is_editing: false,
            connected_at: now_ms,
            last_activity_at: now_ms,
        };

        self.repo.insert_session(&session).map_err(|err| match err {
            RepoError::UniqueViolation { .. } => {
                PresenceServiceError::DuplicateConnection(session.connection_id.clone())
            }
            RepoError::NotFound { .. } => PresenceServiceError::DocumentNotFound(document_id),
            other => other.into(),
        })?;

        Ok(session)
    }

    /// Refreshes one session's activity clock and optional cursor state.
    ///
    /// # Errors
    /// - `SessionNotFound` when the session was closed or swept; callers
    ///   must rejoin.
    pub fn heartbeat(
        &self,
        connection_id: &str,
        heartbeat: &PresenceHeartbeat,
        now_ms: i64,
    ) -> Result<(), PresenceServiceError> {
        self.repo
            .touch_session(connection_id, heartbeat, now_ms)
            .map_err(|err| match err {
                RepoError::NotFound { .. } => {
                    PresenceServiceError::SessionNotFound(connection_id.to_string())
                }
                other => other.into(),
            })
    }

    /// Removes one session immediately, distinct from idle expiry.
    pub fn leave(&self, connection_id: &str) -> Result<(), PresenceServiceError> {
        self.repo.delete_session(connection_id).map_err(|err| match err {
            RepoError::NotFound { .. } => {
                PresenceServiceError::SessionNotFound(connection_id.to_string())
            }
            other => other.into(),
        })
    }

    /// Sessions active within the listing window, most recent first.
    pub fn list_active(
        &self,
        document_id: DocumentId,
        now_ms: i64,
    ) -> Result<Vec<PresenceSession>, PresenceServiceError> {
        self.repo
            .list_active_sessions(document_id, now_ms)
            .map_err(Into::into)
    }

    /// Sweeps sessions idle past the TTL. Returns the number removed.
    pub fn expire_idle(&self, now_ms: i64) -> Result<usize, PresenceServiceError> {
        self.repo.delete_idle_sessions(now_ms).map_err(Into::into)
    }
}
