//! Comment thread use-case service.
//!
//! # Responsibility
//! - Anchor comment threads to graph nodes with one-level replies.
//! - Enforce author/owner rules for edits, removal and resolution.
//!
//! # Invariants
//! - A comment's anchor node must exist at creation time; later node removal
//!   keeps the thread readable.
//! - Replies attach to root comments of the same document and node only.
//! - Resolve and reopen are strict transitions, never silent no-ops.

use crate::model::activity::ActivityKind;
use crate::model::comment::Comment;
use crate::model::document::{CollaboratorRole, DocumentId, DocumentStatus, GraphDocument};
use crate::model::{ActorId, ValidationError};
use crate::repo::activity_repo::ActivityRepository;
use crate::repo::comment_repo::CommentRepository;
use crate::repo::document_repo::DocumentRepository;
use crate::repo::RepoError;
use log::warn;
use serde_json::json;
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Errors from comment service operations.
#[derive(Debug)]
pub enum CommentServiceError {
    /// Target document does not exist or is deleted.
    DocumentNotFound(DocumentId),
    /// Target comment does not exist.
    CommentNotFound(Uuid),
    /// Anchor node is not part of the document's current graph.
    NodeNotFound {
        document_id: DocumentId,
        node_id: String,
    },
    /// Reply target does not exist.
    ParentNotFound(Uuid),
    /// Reply target belongs to another document or node.
    ParentMismatch(Uuid),
    /// Reply target is itself a reply; threads are one level deep.
    ParentNotRoot(Uuid),
    /// Caller lacks the role required by the operation.
    PermissionDenied {
        document_id: DocumentId,
        actor_id: ActorId,
    },
    /// Resolving a comment that is already resolved.
    AlreadyResolved(Uuid),
    /// Reopening a comment that is not resolved.
    NotResolved(Uuid),
    /// Field-level validation rejected the input.
    InvalidSpec(ValidationError),
    /// Persistence-layer failure.
    Repo(RepoError),
}

impl Display for CommentServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DocumentNotFound(id) => write!(f, "document not found: {id}"),
            Self::CommentNotFound(id) => write!(f, "comment not found: {id}"),
            Self::NodeNotFound {
                document_id,
                node_id,
            } => write!(f, "node `{node_id}` not found in document {document_id}"),
            Self::ParentNotFound(id) => write!(f, "parent comment not found: {id}"),
            Self::ParentMismatch(id) => {
                write!(f, "parent comment {id} anchors to a different thread")
            }
            Self::ParentNotRoot(id) => write!(f, "parent comment {id} is itself a reply"),
            Self::PermissionDenied {
                document_id,
                actor_id,
            } => write!(
                f,
                "actor {actor_id} lacks permission on document {document_id}"
            ),
            Self::AlreadyResolved(id) => write!(f, "comment already resolved: {id}"),
            Self::NotResolved(id) => write!(f, "comment is not resolved: {id}"),
            Self::InvalidSpec(err) => write!(f, "{err}"),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for CommentServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::InvalidSpec(err) => Some(err),
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for CommentServiceError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::Validation(err) => Self::InvalidSpec(err),
            other => Self::Repo(other),
        }
    }
}

/// Comment service facade over repository implementations.
pub struct CommentService<C, D, A>
where
    C: CommentRepository,
    D: DocumentRepository,
    A: ActivityRepository,
{
    comments: C,
    documents: D,
    activity: A,
}

impl<C, D, A> CommentService<C, D, A>
where
    C: CommentRepository,
    D: DocumentRepository,
    A: ActivityRepository,
{
    /// Creates service from repository implementations.
    pub fn new(comments: C, documents: D, activity: A) -> Self {
        Self {
            comments,
            documents,
            activity,
        }
    }

    /// Adds a comment to a node, optionally as a reply.
    ///
    /// # Contract
    /// - Caller must have read access to the document.
    /// - `node_id` must exist in the document's current graph.
    /// - A parent must be a root comment on the same document and node.
    ///
    /// # Side effects
    /// - Records a `commented` activity entry, best-effort.
    pub fn add_comment(
        &self,
        document_id: DocumentId,
        actor_id: ActorId,
        node_id: &str,
        content: &str,
        mentions: &[ActorId],
        parent_comment_id: Option<Uuid>,
    ) -> Result<Comment, CommentServiceError> {
        let document = self.load_live(document_id)?;
        self.ensure_read_access(&document, actor_id)?;

        if !document.nodes.iter().any(|node| node.id == node_id) {
            return Err(CommentServiceError::NodeNotFound {
                document_id,
                node_id: node_id.to_string(),
            });
        }

        if let Some(parent_id) = parent_comment_id {
            let parent = self
                .comments
                .get_comment(parent_id)?
                .ok_or(CommentServiceError::ParentNotFound(parent_id))?;
            if parent.document_id != document_id || parent.node_id != node_id {
                return Err(CommentServiceError::ParentMismatch(parent_id));
            }
            if parent.parent_comment_id.is_some() {
                return Err(CommentServiceError::ParentNotRoot(parent_id));
            }
        }

        let comment = self.comments.create_comment(
            document_id,
            node_id,
            actor_id,
            content,
            mentions,
            parent_comment_id,
        )?;

        if let Err(err) = self.activity.record_activity(
            document_id,
            actor_id,
            ActivityKind::Commented,
            Some(&json!({ "node_id": node_id })),
        ) {
            warn!(
                "event=activity_record module=comment_service status=error document_id={document_id} error={err}"
            );
        }

        Ok(comment)
    }

    /// Replaces a comment's body. Author-only.
    pub fn edit_comment(
        &self,
        comment_id: Uuid,
        actor_id: ActorId,
        content: &str,
    ) -> Result<Comment, CommentServiceError> {
        let comment = self.require_comment(comment_id)?;
        if comment.author_id != actor_id {
            return Err(CommentServiceError::PermissionDenied {
                document_id: comment.document_id,
                actor_id,
            });
        }

        self.comments.update_content(comment_id, content)?;
        self.require_comment(comment_id)
    }

    /// Marks a comment resolved, recording resolver and time.
    pub fn resolve(&self, comment_id: Uuid, actor_id: ActorId) -> Result<(), CommentServiceError> {
        let comment = self.require_comment(comment_id)?;
        let document = self.load_live(comment.document_id)?;
        self.ensure_read_access(&document, actor_id)?;

        if comment.resolved {
            return Err(CommentServiceError::AlreadyResolved(comment_id));
        }
        self.comments
            .set_resolved(comment_id, true, Some(actor_id))
            .map_err(Into::into)
    }

    /// Reopens a resolved comment.
    pub fn reopen(&self, comment_id: Uuid, actor_id: ActorId) -> Result<(), CommentServiceError> {
        let comment = self.require_comment(comment_id)?;
        let document = self.load_live(comment.document_id)?;
        self.ensure_read_access(&document, actor_id)?;

        if !comment.resolved {
            return Err(CommentServiceError::NotResolved(comment_id));
        }
        self.comments
            .set_resolved(comment_id, false, None)
            .map_err(Into::into)
    }

    /// Deletes a comment and its replies. Author or document owner.
    pub fn remove_comment(
        &self,
        comment_id: Uuid,
        actor_id: ActorId,
    ) -> Result<(), CommentServiceError> {
        let comment = self.require_comment(comment_id)?;
        let document = self.load_live(comment.document_id)?;

        let allowed = comment.author_id == actor_id
            || document.owner_id == actor_id
            || document.role_of(actor_id) == Some(CollaboratorRole::Owner);
        if !allowed {
            return Err(CommentServiceError::PermissionDenied {
                document_id: comment.document_id,
                actor_id,
            });
        }

        self.comments.delete_comment(comment_id).map_err(Into::into)
    }

    /// All comments of one document in chronological order.
    pub fn list_for_document(
        &self,
        document_id: DocumentId,
        include_resolved: bool,
    ) -> Result<Vec<Comment>, CommentServiceError> {
        self.load_live(document_id)?;
        let comments = self.comments.list_comments_for_document(document_id)?;
        if include_resolved {
            return Ok(comments);
        }
        Ok(comments
            .into_iter()
            .filter(|comment| !comment.resolved)
            .collect())
    }

    /// Comments anchored to one node in chronological order.
    pub fn list_for_node(
        &self,
        document_id: DocumentId,
        node_id: &str,
    ) -> Result<Vec<Comment>, CommentServiceError> {
        self.load_live(document_id)?;
        self.comments
            .list_comments_for_node(document_id, node_id)
            .map_err(Into::into)
    }

    fn require_comment(&self, id: Uuid) -> Result<Comment, CommentServiceError> {
        self.comments
            .get_comment(id)?
            .ok_or(CommentServiceError::CommentNotFound(id))
    }

    fn load_live(&self, id: DocumentId) -> Result<GraphDocument, CommentServiceError> {
        match self.documents.get_document(id)? {
            Some(document) if document.status != DocumentStatus::Deleted => Ok(document),
            _ => Err(CommentServiceError::DocumentNotFound(id)),
        }
    }

    fn ensure_read_access(
        &self,
        document: &GraphDocument,
        actor_id: ActorId,
    ) -> Result<(), CommentServiceError> {
        let allowed = document.is_public
            || document.owner_id == actor_id
            || document.role_of(actor_id).is_some();
        if allowed {
            return Ok(());
        }
        Err(CommentServiceError::PermissionDenied {
            document_id: document.id,
            actor_id,
        })
    }
}
