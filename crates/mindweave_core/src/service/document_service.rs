//! Document use-case service.
//!
//! # Responsibility
//! - Enforce read/edit/owner access rules on top of the document repository.
//! - Apply last-writer-wins mutations and guard lifecycle transitions.
//! - Record history and activity for committed changes, best-effort.
//!
//! # Invariants
//! - A mutation that fails validation leaves the document unchanged.
//! - History and activity appends never roll back a committed write.
//! - Deleted documents read as absent on every caller surface.

use crate::model::activity::ActivityKind;
use crate::model::document::{
    CollaboratorRole, DocumentCategory, DocumentId, DocumentSpec, DocumentStatus, DocumentSummary,
    GraphDocument, GraphPatch,
};
use crate::model::graph::GraphViolation;
use crate::model::history::{HistoryAction, DEFAULT_SNAPSHOT_EVERY};
use crate::model::{ActorId, ValidationError};
use crate::repo::activity_repo::ActivityRepository;
use crate::repo::document_repo::{DocumentListQuery, DocumentRepository, DocumentSort};
use crate::repo::history_repo::HistoryRepository;
use crate::repo::RepoError;
use crate::search::fts::{DocumentSearchIndex, SearchError, SearchQuery};
use log::warn;
use serde_json::json;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Candidate cap when a text filter resolves ids through the search index.
const TEXT_FILTER_MAX_HITS: u32 = 200;

/// Errors from document service operations.
#[derive(Debug)]
pub enum DocumentServiceError {
    /// Target document does not exist or is deleted.
    DocumentNotFound(DocumentId),
    /// No public document matches the share token.
    ShareTokenNotFound(String),
    /// Caller lacks the role required by the operation.
    PermissionDenied {
        document_id: DocumentId,
        actor_id: ActorId,
    },
    /// Field-level validation rejected the input.
    InvalidSpec(ValidationError),
    /// The resulting graph would break a structural invariant.
    InvariantViolation(GraphViolation),
    /// Lifecycle transition is not allowed from the current status.
    InvalidStatusTransition {
        document_id: DocumentId,
        from: DocumentStatus,
        to: DocumentStatus,
    },
    /// Full-text filter could not be evaluated.
    Search(SearchError),
    /// Persistence-layer failure.
    Repo(RepoError),
}

impl Display for DocumentServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DocumentNotFound(id) => write!(f, "document not found: {id}"),
            Self::ShareTokenNotFound(token) => {
                write!(f, "no public document for share token `{token}`")
            }
            Self::PermissionDenied {
                document_id,
                actor_id,
            } => write!(
                f,
                "actor {actor_id} lacks permission on document {document_id}"
            ),
            Self::InvalidSpec(err) => write!(f, "{err}"),
            Self::InvariantViolation(err) => write!(f, "{err}"),
            Self::InvalidStatusTransition {
                document_id,
                from,
                to,
            } => write!(
                f,
                "document {document_id} cannot move from {} to {}",
                from.as_db_str(),
                to.as_db_str()
            ),
            Self::Search(err) => write!(f, "{err}"),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for DocumentServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::InvalidSpec(err) => Some(err),
            Self::InvariantViolation(err) => Some(err),
            Self::Search(err) => Some(err),
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for DocumentServiceError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::Validation(err) => Self::InvalidSpec(err),
            RepoError::Graph(err) => Self::InvariantViolation(err),
            other => Self::Repo(other),
        }
    }
}

impl From<SearchError> for DocumentServiceError {
    fn from(value: SearchError) -> Self {
        Self::Search(value)
    }
}

/// Filters for document listing.
#[derive(Debug, Clone, Default)]
pub struct DocumentListRequest {
    /// Lifecycle filter; `None` lists everything except deleted.
    pub status: Option<DocumentStatus>,
    pub category: Option<DocumentCategory>,
    pub favorites_only: bool,
    /// Full-text filter over titles, descriptions and tags.
    pub text: Option<String>,
    pub sort: DocumentSort,
    pub limit: Option<u32>,
    pub offset: u32,
}

/// Document service facade over repository implementations.
pub struct DocumentService<D, H, A, S>
where
    D: DocumentRepository,
    H: HistoryRepository,
    A: ActivityRepository,
    S: DocumentSearchIndex,
{
    documents: D,
    history: H,
    activity: A,
    index: S,
}

impl<D, H, A, S> DocumentService<D, H, A, S>
where
    D: DocumentRepository,
    H: HistoryRepository,
    A: ActivityRepository,
    S: DocumentSearchIndex,
{
    /// Creates service from repository implementations.
    pub fn new(documents: D, history: H, activity: A, index: S) -> Self {
        Self {
            documents,
            history,
            activity,
            index,
        }
    }

    /// Creates one document owned by `owner_id`.
    ///
    /// # Contract
    /// - Spec fields and the initial graph are validated before any write.
    /// - The owner is seeded as an accepted collaborator in the same commit.
    ///
    /// # Side effects
    /// - Appends a `create` ledger entry and a `created` activity entry,
    ///   best-effort.
    pub fn create_document(
        &self,
        owner_id: ActorId,
        spec: &DocumentSpec,
    ) -> Result<GraphDocument, DocumentServiceError> {
        let document = self.documents.create_document(owner_id, spec)?;
        self.record_history(&document, owner_id, HistoryAction::Create, None);
        self.record_activity(document.id, owner_id, ActivityKind::Created, None);
        Ok(document)
    }

    /// Loads one document for a reader.
    ///
    /// # Contract
    /// - Caller must be the owner, an accepted collaborator, or the document
    ///   must be public.
    /// - Deleted documents read as absent.
    ///
    /// # Side effects
    /// - Bumps the view counter, best-effort. The returned read model carries
    ///   the pre-bump count.
    pub fn get_document(
        &self,
        id: DocumentId,
        actor_id: ActorId,
    ) -> Result<GraphDocument, DocumentServiceError> {
        let document = self.load_live(id)?;
        self.ensure_read_access(&document, actor_id)?;
        if let Err(err) = self.documents.record_view(id) {
            warn!("event=view_count module=document_service status=error document_id={id} error={err}");
        }
        Ok(document)
    }

    /// Resolves a public share link to its document.
    pub fn get_by_share_token(&self, token: &str) -> Result<GraphDocument, DocumentServiceError> {
        let Some(document) = self.documents.get_document_by_share_token(token)? else {
            return Err(DocumentServiceError::ShareTokenNotFound(token.to_string()));
        };
        if let Err(err) = self.documents.record_view(document.id) {
            warn!(
                "event=view_count module=document_service status=error document_id={} error={err}",
                document.id
            );
        }
        Ok(document)
    }

    /// Lists document summaries visible to `actor_id`.
    ///
    /// A text filter resolves candidate ids through the search index first
    /// and intersects them with the permission-checked listing; the requested
    /// sort order applies to the final page.
    pub fn list_documents(
        &self,
        actor_id: ActorId,
        request: &DocumentListRequest,
    ) -> Result<Vec<DocumentSummary>, DocumentServiceError> {
        let ids = match request.text.as_deref() {
            Some(text) if !text.trim().is_empty() => {
                let mut search = SearchQuery::new(text);
                search.category = request.category;
                search.limit = TEXT_FILTER_MAX_HITS;
                let hits = self.index.search(&search)?;
                Some(hits.into_iter().map(|hit| hit.document_id).collect())
            }
            _ => None,
        };

        let query = DocumentListQuery {
            actor_id,
            status: request.status,
            category: request.category,
            favorites_only: request.favorites_only,
            ids,
            sort: request.sort,
            limit: request.limit,
            offset: request.offset,
        };
        self.documents.list_documents(&query).map_err(Into::into)
    }

    /// Applies a last-writer-wins patch to one document.
    ///
    /// # Contract
    /// - Caller must hold the editor or owner role.
    /// - Structural invariants are checked against the resulting state; on
    ///   violation nothing is written.
    ///
    /// # Side effects
    /// - Appends an `update` ledger delta and an `updated` activity entry,
    ///   best-effort.
    pub fn apply_mutation(
        &self,
        id: DocumentId,
        actor_id: ActorId,
        patch: &GraphPatch,
    ) -> Result<GraphDocument, DocumentServiceError> {
        let current = self.load_live(id)?;
        self.ensure_edit_access(&current, actor_id)?;

        let updated = self.documents.apply_patch(id, actor_id, patch)?;
        self.record_history(&updated, actor_id, HistoryAction::Update, Some(patch));
        self.record_activity(id, actor_id, ActivityKind::Updated, None);
        Ok(updated)
    }

    /// Deep-copies a document under a new owner, recording lineage.
    ///
    /// # Contract
    /// - `new_owner_id` must have read access to the source.
    /// - The fork starts private regardless of source visibility.
    pub fn fork_document(
        &self,
        source_id: DocumentId,
        new_owner_id: ActorId,
        title_override: Option<&str>,
    ) -> Result<GraphDocument, DocumentServiceError> {
        let source = self.load_live(source_id)?;
        self.ensure_read_access(&source, new_owner_id)?;

        let fork = self
            .documents
            .fork_document(source_id, new_owner_id, title_override)?;
        self.record_history(&fork, new_owner_id, HistoryAction::Fork, None);
        self.record_activity(
            fork.id,
            new_owner_id,
            ActivityKind::Created,
            Some(json!({ "forked_from": source_id })),
        );
        self.record_activity(
            source_id,
            new_owner_id,
            ActivityKind::Forked,
            Some(json!({ "fork_id": fork.id })),
        );
        Ok(fork)
    }

    /// Archives an active document. Owner-only.
    pub fn archive(&self, id: DocumentId, caller_id: ActorId) -> Result<(), DocumentServiceError> {
        self.transition_status(id, caller_id, DocumentStatus::Archived, HistoryAction::Archive)
    }

    /// Restores an archived document to active. Owner-only.
    pub fn unarchive(
        &self,
        id: DocumentId,
        caller_id: ActorId,
    ) -> Result<(), DocumentServiceError> {
        self.transition_status(id, caller_id, DocumentStatus::Active, HistoryAction::Restore)
    }

    /// Soft-deletes a document. Owner-only. Deleted documents stay in
    /// storage for their relations but read as absent.
    pub fn soft_delete(
        &self,
        id: DocumentId,
        caller_id: ActorId,
    ) -> Result<(), DocumentServiceError> {
        self.transition_status(id, caller_id, DocumentStatus::Deleted, HistoryAction::Delete)
    }

    /// Flips the favorite flag. Requires read access. Returns the new value.
    pub fn toggle_favorite(
        &self,
        id: DocumentId,
        actor_id: ActorId,
    ) -> Result<bool, DocumentServiceError> {
        let document = self.load_live(id)?;
        self.ensure_read_access(&document, actor_id)?;

        let next = !document.is_favorite;
        self.documents.set_favorite(id, next)?;
        Ok(next)
    }

    /// Changes public visibility. Owner-only.
    ///
    /// The first share mints a link token; later toggles keep it stable so a
    /// restored share resolves to the same link.
    pub fn set_visibility(
        &self,
        id: DocumentId,
        caller_id: ActorId,
        is_public: bool,
    ) -> Result<GraphDocument, DocumentServiceError> {
        let document = self.load_live(id)?;
        self.ensure_owner(&document, caller_id)?;

        if document.is_public == is_public {
            return Ok(document);
        }

        let updated = self.documents.set_visibility(id, is_public)?;
        let kind = if is_public {
            ActivityKind::Shared
        } else {
            ActivityKind::Unshared
        };
        self.record_activity(id, caller_id, kind, None);
        Ok(updated)
    }

    fn transition_status(
        &self,
        id: DocumentId,
        caller_id: ActorId,
        to: DocumentStatus,
        action: HistoryAction,
    ) -> Result<(), DocumentServiceError> {
        let document = self.load_live(id)?;
        self.ensure_owner(&document, caller_id)?;

        if !transition_allowed(document.status, to) {
            return Err(DocumentServiceError::InvalidStatusTransition {
                document_id: id,
                from: document.status,
                to,
            });
        }

        self.documents.set_status(id, to)?;
        self.record_history(&document, caller_id, action, None);
        self.record_activity(
            id,
            caller_id,
            ActivityKind::Updated,
            Some(json!({ "status": to.as_db_str() })),
        );
        Ok(())
    }

    fn load_live(&self, id: DocumentId) -> Result<GraphDocument, DocumentServiceError> {
        match self.documents.get_document(id)? {
            Some(document) if document.status != DocumentStatus::Deleted => Ok(document),
            _ => Err(DocumentServiceError::DocumentNotFound(id)),
        }
    }

    fn ensure_read_access(
        &self,
        document: &GraphDocument,
        actor_id: ActorId,
    ) -> Result<(), DocumentServiceError> {
        let allowed = document.is_public
            || document.owner_id == actor_id
            || document.role_of(actor_id).is_some();
        if allowed {
            return Ok(());
        }
        Err(DocumentServiceError::PermissionDenied {
            document_id: document.id,
            actor_id,
        })
    }

    fn ensure_edit_access(
        &self,
        document: &GraphDocument,
        actor_id: ActorId,
    ) -> Result<(), DocumentServiceError> {
        let allowed = document.owner_id == actor_id
            || document
                .role_of(actor_id)
                .map_or(false, |role| role.can_edit());
        if allowed {
            return Ok(());
        }
        Err(DocumentServiceError::PermissionDenied {
            document_id: document.id,
            actor_id,
        })
    }

    fn ensure_owner(
        &self,
        document: &GraphDocument,
        actor_id: ActorId,
    ) -> Result<(), DocumentServiceError> {
        let allowed = document.owner_id == actor_id
            || document.role_of(actor_id) == Some(CollaboratorRole::Owner);
        if allowed {
            return Ok(());
        }
        Err(DocumentServiceError::PermissionDenied {
            document_id: document.id,
            actor_id,
        })
    }

    /// Best-effort ledger append. Failures are logged, never surfaced.
    fn record_history(
        &self,
        document: &GraphDocument,
        actor_id: ActorId,
        action: HistoryAction,
        delta: Option<&GraphPatch>,
    ) {
        let snapshot = document.snapshot();
        if let Err(err) = self.history.append_entry(
            document.id,
            actor_id,
            action,
            delta,
            &snapshot,
            DEFAULT_SNAPSHOT_EVERY,
        ) {
            warn!(
                "event=history_append module=document_service status=error document_id={} action={} error={err}",
                document.id,
                action.as_db_str()
            );
        }
    }

    /// Best-effort activity append. Failures are logged, never surfaced.
    fn record_activity(
        &self,
        document_id: DocumentId,
        actor_id: ActorId,
        kind: ActivityKind,
        details: Option<serde_json::Value>,
    ) {
        if let Err(err) = self
            .activity
            .record_activity(document_id, actor_id, kind, details.as_ref())
        {
            warn!(
                "event=activity_record module=document_service status=error document_id={document_id} kind={} error={err}",
                kind.as_db_str()
            );
        }
    }
}

fn transition_allowed(from: DocumentStatus, to: DocumentStatus) -> bool {
    matches!(
        (from, to),
        (DocumentStatus::Active, DocumentStatus::Archived)
            | (DocumentStatus::Archived, DocumentStatus::Active)
            | (DocumentStatus::Active, DocumentStatus::Deleted)
            | (DocumentStatus::Archived, DocumentStatus::Deleted)
    )
}
