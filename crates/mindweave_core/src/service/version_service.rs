//! Version archive use-case service.
//!
//! # Responsibility
//! - Capture named point-in-time snapshots of live documents.
//! - Expose immutable version reads; no update surface exists.
//!
//! # Invariants
//! - Version numbers per document are contiguous from 1; assignment is
//!   serialized by the repository's exclusive increment.

use crate::model::activity::ActivityKind;
use crate::model::document::{CollaboratorRole, DocumentId, DocumentStatus, GraphDocument};
use crate::model::version::DocumentVersion;
use crate::model::{ActorId, ValidationError};
use crate::repo::activity_repo::ActivityRepository;
use crate::repo::document_repo::DocumentRepository;
use crate::repo::version_repo::VersionRepository;
use crate::repo::RepoError;
use log::warn;
use serde_json::json;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Errors from version service operations.
#[derive(Debug)]
pub enum VersionServiceError {
    /// Target document does not exist or is deleted.
    DocumentNotFound(DocumentId),
    /// No such version for this document.
    VersionNotFound {
        document_id: DocumentId,
        version: i64,
    },
    /// Caller lacks the role required by the operation.
    PermissionDenied {
        document_id: DocumentId,
        actor_id: ActorId,
    },
    /// Field-level validation rejected the input.
    InvalidSpec(ValidationError),
    /// Persistence-layer failure.
    Repo(RepoError),
}

impl Display for VersionServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DocumentNotFound(id) => write!(f, "document not found: {id}"),
            Self::VersionNotFound {
                document_id,
                version,
            } => write!(f, "version {version} not found for document {document_id}"),
            Self::PermissionDenied {
                document_id,
                actor_id,
            } => write!(
                f,
                "actor {actor_id} lacks permission on document {document_id}"
            ),
            Self::InvalidSpec(err) => write!(f, "{err}"),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for VersionServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::InvalidSpec(err) => Some(err),
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for VersionServiceError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::Validation(err) => Self::InvalidSpec(err),
            other => Self::Repo(other),
        }
    }
}

/// Version service facade over repository implementations.
pub struct VersionService<V, D, A>
where
    V: VersionRepository,
    D: DocumentRepository,
    A: ActivityRepository,
{
    versions: V,
    documents: D,
    activity: A,
}

impl<V, D, A> VersionService<V, D, A>
where
    V: VersionRepository,
    D: DocumentRepository,
    A: ActivityRepository,
{
    /// Creates service from repository implementations.
    pub fn new(versions: V, documents: D, activity: A) -> Self {
        Self {
            versions,
            documents,
            activity,
        }
    }

    /// Persists the document's current graph state as the next version.
    ///
    /// # Contract
    /// - Caller must hold the editor or owner role.
    /// - An absent name defaults to `Version N` for the assigned number.
    ///
    /// # Side effects
    /// - Records a `version_created` activity entry, best-effort.
    pub fn create_snapshot(
        &self,
        document_id: DocumentId,
        actor_id: ActorId,
        name: Option<&str>,
        description: Option<&str>,
        is_autosave: bool,
    ) -> Result<DocumentVersion, VersionServiceError> {
        let document = self.load_live(document_id)?;
        self.ensure_edit_access(&document, actor_id)?;

        let default_name;
        let name = match name {
            Some(value) => value,
            None => {
                let next = self.versions.latest_version_number(document_id)? + 1;
                default_name = format!("Version {next}");
                default_name.as_str()
            }
        };

        let snapshot = document.snapshot();
        let version = self.versions.create_version(
            document_id,
            name,
            description,
            &snapshot,
            actor_id,
            is_autosave,
        )?;

        if let Err(err) = self.activity.record_activity(
            document_id,
            actor_id,
            ActivityKind::VersionCreated,
            Some(&json!({ "version": version.version })),
        ) {
            warn!(
                "event=activity_record module=version_service status=error document_id={document_id} version={} error={err}",
                version.version
            );
        }

        Ok(version)
    }

    /// Loads one immutable version.
    pub fn get_version(
        &self,
        document_id: DocumentId,
        version: i64,
    ) -> Result<DocumentVersion, VersionServiceError> {
        self.versions
            .get_version(document_id, version)?
            .ok_or(VersionServiceError::VersionNotFound {
                document_id,
                version,
            })
    }

    /// Newest-first page of versions for one document.
    pub fn list_versions(
        &self,
        document_id: DocumentId,
        limit: Option<u32>,
        offset: u32,
    ) -> Result<Vec<DocumentVersion>, VersionServiceError> {
        self.versions
            .list_versions(document_id, limit, offset)
            .map_err(Into::into)
    }

    fn load_live(&self, id: DocumentId) -> Result<GraphDocument, VersionServiceError> {
        match self.documents.get_document(id)? {
            Some(document) if document.status != DocumentStatus::Deleted => Ok(document),
            _ => Err(VersionServiceError::DocumentNotFound(id)),
        }
    }

    fn ensure_edit_access(
        &self,
        document: &GraphDocument,
        actor_id: ActorId,
    ) -> Result<(), VersionServiceError> {
        let allowed = document.owner_id == actor_id
            || document
                .role_of(actor_id)
                .map_or(false, CollaboratorRole::can_edit);
        if allowed {
            return Ok(());
        }
        Err(VersionServiceError::PermissionDenied {
            document_id: document.id,
            actor_id,
        })
    }
}
