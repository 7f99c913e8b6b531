//! Collaboration use-case service.
//!
//! # Responsibility
//! - Drive the invitation lifecycle from creation to settlement.
//! - Manage collaborator membership, roles and removal.
//!
//! # Invariants
//! - Every document keeps exactly one accepted owner; operations that would
//!   drop below one fail before writing.
//! - At most one live pending invitation exists per (document, email).
//! - Acceptance is idempotent at the membership level: re-running the upsert
//!   never produces duplicate collaborator rows.

use crate::model::activity::ActivityKind;
use crate::model::document::{
    Collaborator, CollaboratorRole, CollaboratorStatus, DocumentId, DocumentStatus, GraphDocument,
};
use crate::model::invitation::{Invitation, InvitationStatus};
use crate::model::{validate_actor_id, ActorId, ValidationError};
use crate::repo::activity_repo::ActivityRepository;
use crate::repo::document_repo::DocumentRepository;
use crate::repo::invitation_repo::InvitationRepository;
use crate::repo::RepoError;
use log::warn;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::json;
use std::error::Error;
use std::fmt::{Display, Formatter};

static EMAIL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("valid email regex"));

/// Errors from collaboration service operations.
#[derive(Debug)]
pub enum CollaborationServiceError {
    /// Target document does not exist or is deleted.
    DocumentNotFound(DocumentId),
    /// No invitation matches the token.
    InvitationNotFound(String),
    /// Target actor is not a collaborator in the required status.
    CollaboratorNotFound {
        document_id: DocumentId,
        actor_id: ActorId,
    },
    /// Caller lacks the role required by the operation.
    PermissionDenied {
        document_id: DocumentId,
        actor_id: ActorId,
    },
    /// Field-level validation rejected the input.
    InvalidSpec(ValidationError),
    /// A live pending invitation already exists for this address.
    PendingInvitationExists {
        document_id: DocumentId,
        email: String,
    },
    /// The invitee already holds accepted membership.
    AlreadyCollaborator {
        document_id: DocumentId,
        actor_id: ActorId,
    },
    /// The invitation passed its expiry.
    InvitationExpired(String),
    /// The invitation is not in the status the operation requires.
    InvalidInvitationState(InvitationStatus),
    /// The operation would leave the document without an accepted owner.
    SoleOwner {
        document_id: DocumentId,
        actor_id: ActorId,
    },
    /// Persistence-layer failure.
    Repo(RepoError),
}

impl Display for CollaborationServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DocumentNotFound(id) => write!(f, "document not found: {id}"),
            Self::InvitationNotFound(token) => write!(f, "invitation not found: {token}"),
            Self::CollaboratorNotFound {
                document_id,
                actor_id,
            } => write!(
                f,
                "actor {actor_id} is not a collaborator on document {document_id}"
            ),
            Self::PermissionDenied {
                document_id,
                actor_id,
            } => write!(
                f,
                "actor {actor_id} lacks permission on document {document_id}"
            ),
            Self::InvalidSpec(err) => write!(f, "{err}"),
            Self::PendingInvitationExists { document_id, email } => write!(
                f,
                "a pending invitation for `{email}` already exists on document {document_id}"
            ),
            Self::AlreadyCollaborator {
                document_id,
                actor_id,
            } => write!(
                f,
                "actor {actor_id} already collaborates on document {document_id}"
            ),
            Self::InvitationExpired(token) => write!(f, "invitation expired: {token}"),
            Self::InvalidInvitationState(status) => {
                write!(f, "invitation is {}, expected pending", status.as_db_str())
            }
            Self::SoleOwner {
                document_id,
                actor_id,
            } => write!(
                f,
                "actor {actor_id} is the sole owner of document {document_id}"
            ),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for CollaborationServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::InvalidSpec(err) => Some(err),
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for CollaborationServiceError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::Validation(err) => Self::InvalidSpec(err),
            other => Self::Repo(other),
        }
    }
}

impl From<ValidationError> for CollaborationServiceError {
    fn from(value: ValidationError) -> Self {
        Self::InvalidSpec(value)
    }
}

/// Invitation input carried by [`CollaborationService::invite`].
#[derive(Debug, Clone)]
pub struct InviteRequest {
    pub email: String,
    /// Granted role; restricted to editor or viewer.
    pub role: CollaboratorRole,
    /// Actor id when the invitee already has an account.
    pub invited_actor_id: Option<ActorId>,
    /// Optional note relayed by the external dispatcher.
    pub message: Option<String>,
}

/// Collaboration service facade over repository implementations.
pub struct CollaborationService<I, D, A>
where
    I: InvitationRepository,
    D: DocumentRepository,
    A: ActivityRepository,
{
    invitations: I,
    documents: D,
    activity: A,
}

impl<I, D, A> CollaborationService<I, D, A>
where
    I: InvitationRepository,
    D: DocumentRepository,
    A: ActivityRepository,
{
    /// Creates service from repository implementations.
    pub fn new(invitations: I, documents: D, activity: A) -> Self {
        Self {
            invitations,
            documents,
            activity,
        }
    }

    /// Creates a pending invitation for an email address.
    ///
    /// # Contract
    /// - Inviter must hold the editor or owner role.
    /// - Role is restricted to editor or viewer.
    /// - The address is normalized to lowercase before any check.
    /// - At most one live pending invitation per (document, email).
    /// - A known invitee actor gets a pending membership row immediately so
    ///   the document lists them before acceptance.
    pub fn invite(
        &self,
        document_id: DocumentId,
        inviter_id: ActorId,
        request: &InviteRequest,
        now_ms: i64,
    ) -> Result<Invitation, CollaborationServiceError> {
        let document = self.load_live(document_id)?;
        self.ensure_edit_access(&document, inviter_id)?;

        if request.role == CollaboratorRole::Owner {
            return Err(ValidationError::OwnerRoleNotAssignable.into());
        }
        let email = normalize_email(&request.email)?;

        if let Some(actor_id) = request.invited_actor_id {
            validate_actor_id(actor_id)?;
            let existing = self.documents.get_collaborator(document_id, actor_id)?;
            if existing.map_or(false, |entry| entry.status == CollaboratorStatus::Accepted) {
                return Err(CollaborationServiceError::AlreadyCollaborator {
                    document_id,
                    actor_id,
                });
            }
        }

        if self
            .invitations
            .has_live_pending(document_id, &email, now_ms)?
        {
            return Err(CollaborationServiceError::PendingInvitationExists {
                document_id,
                email,
            });
        }

        let invitation = self.invitations.create_invitation(
            document_id,
            inviter_id,
            &email,
            request.invited_actor_id,
            request.role,
            request.message.as_deref(),
            now_ms,
        )?;

        if let Some(actor_id) = request.invited_actor_id {
            let pending = Collaborator::new(
                actor_id,
                request.role,
                inviter_id,
                CollaboratorStatus::Pending,
            );
            self.documents.upsert_collaborator(document_id, &pending)?;
        }

        Ok(invitation)
    }

    /// Settles an invitation as accepted and grants membership.
    ///
    /// # Contract
    /// - A pending invitation past its expiry fails `InvitationExpired` and
    ///   is flipped to expired as a side effect.
    /// - Any other non-pending status fails `InvalidInvitationState`, which
    ///   also makes a repeated accept with the same token fail.
    /// - Membership is written through an upsert, so acceptance never
    ///   duplicates collaborator rows.
    ///
    /// # Side effects
    /// - Records a `collaborator_added` activity entry, best-effort.
    pub fn accept(
        &self,
        token: &str,
        accepting_actor_id: ActorId,
        now_ms: i64,
    ) -> Result<Invitation, CollaborationServiceError> {
        validate_actor_id(accepting_actor_id)?;

        let invitation = self.require_invitation(token)?;
        self.ensure_live_pending(&invitation, token, now_ms)?;

        let membership = Collaborator::new(
            accepting_actor_id,
            invitation.role,
            invitation.invited_by,
            CollaboratorStatus::Accepted,
        );
        self.documents
            .upsert_collaborator(invitation.document_id, &membership)?;
        self.invitations
            .mark_accepted(invitation.id, accepting_actor_id, now_ms)?;

        self.record_activity(
            invitation.document_id,
            accepting_actor_id,
            ActivityKind::CollaboratorAdded,
            Some(json!({ "role": invitation.role.as_db_str() })),
        );

        self.invitations
            .get_invitation(invitation.id)?
            .ok_or_else(|| CollaborationServiceError::InvitationNotFound(token.to_string()))
    }

    /// Settles an invitation as rejected.
    ///
    /// Any pending membership row created for a known invitee is marked
    /// rejected as well.
    pub fn decline(
        &self,
        token: &str,
        actor_id: ActorId,
        now_ms: i64,
    ) -> Result<(), CollaborationServiceError> {
        validate_actor_id(actor_id)?;

        let invitation = self.require_invitation(token)?;
        self.ensure_live_pending(&invitation, token, now_ms)?;

        self.invitations
            .set_status(invitation.id, InvitationStatus::Rejected, None)?;

        if let Some(invitee_id) = invitation.invited_actor_id {
            let existing = self
                .documents
                .get_collaborator(invitation.document_id, invitee_id)?;
            if let Some(entry) = existing {
                if entry.status == CollaboratorStatus::Pending {
                    let rejected = Collaborator::new(
                        invitee_id,
                        entry.role,
                        entry.invited_by,
                        CollaboratorStatus::Rejected,
                    );
                    self.documents
                        .upsert_collaborator(invitation.document_id, &rejected)?;
                }
            }
        }

        Ok(())
    }

    /// Withdraws a pending invitation.
    ///
    /// # Contract
    /// - Only the inviter or a document owner may cancel.
    /// - Pending-only; settled invitations fail `InvalidInvitationState`.
    pub fn cancel(&self, token: &str, caller_id: ActorId) -> Result<(), CollaborationServiceError> {
        let invitation = self.require_invitation(token)?;
        let document = self.load_live(invitation.document_id)?;

        let is_inviter = invitation.invited_by == caller_id;
        let is_owner = document.owner_id == caller_id
            || document.role_of(caller_id) == Some(CollaboratorRole::Owner);
        if !(is_inviter || is_owner) {
            return Err(CollaborationServiceError::PermissionDenied {
                document_id: invitation.document_id,
                actor_id: caller_id,
            });
        }

        if invitation.status != InvitationStatus::Pending {
            return Err(CollaborationServiceError::InvalidInvitationState(
                invitation.status,
            ));
        }

        self.invitations
            .set_status(invitation.id, InvitationStatus::Cancelled, None)?;

        if let Some(invitee_id) = invitation.invited_actor_id {
            let existing = self
                .documents
                .get_collaborator(invitation.document_id, invitee_id)?;
            if let Some(entry) = existing {
                if entry.status == CollaboratorStatus::Pending {
                    self.documents
                        .remove_collaborator(invitation.document_id, invitee_id)?;
                }
            }
        }

        Ok(())
    }

    /// Changes the role of an accepted collaborator. Owner-only.
    ///
    /// # Errors
    /// - `InvalidSpec` when granting `owner`; ownership transfer is a
    ///   separate explicit operation.
    /// - `SoleOwner` when demoting the last accepted owner.
    pub fn update_role(
        &self,
        document_id: DocumentId,
        caller_id: ActorId,
        target_actor_id: ActorId,
        role: CollaboratorRole,
    ) -> Result<(), CollaborationServiceError> {
        let document = self.load_live(document_id)?;
        self.ensure_owner(&document, caller_id)?;

        if role == CollaboratorRole::Owner {
            return Err(ValidationError::OwnerRoleNotAssignable.into());
        }

        let target = self
            .documents
            .get_collaborator(document_id, target_actor_id)?
            .filter(|entry| entry.status == CollaboratorStatus::Accepted)
            .ok_or(CollaborationServiceError::CollaboratorNotFound {
                document_id,
                actor_id: target_actor_id,
            })?;

        if target.role == CollaboratorRole::Owner
            && self.documents.count_accepted_owners(document_id)? <= 1
        {
            return Err(CollaborationServiceError::SoleOwner {
                document_id,
                actor_id: target_actor_id,
            });
        }

        self.documents
            .set_collaborator_role(document_id, target_actor_id, role)
            .map_err(Into::into)
    }

    /// Marks a collaborator removed. Owner-only.
    ///
    /// # Errors
    /// - `SoleOwner` when removing the last accepted owner.
    ///
    /// # Side effects
    /// - Records a `collaborator_removed` activity entry, best-effort.
    pub fn remove_collaborator(
        &self,
        document_id: DocumentId,
        caller_id: ActorId,
        target_actor_id: ActorId,
    ) -> Result<(), CollaborationServiceError> {
        let document = self.load_live(document_id)?;
        self.ensure_owner(&document, caller_id)?;

        let target = self
            .documents
            .get_collaborator(document_id, target_actor_id)?
            .filter(|entry| entry.status != CollaboratorStatus::Removed)
            .ok_or(CollaborationServiceError::CollaboratorNotFound {
                document_id,
                actor_id: target_actor_id,
            })?;

        if target.role == CollaboratorRole::Owner
            && target.status == CollaboratorStatus::Accepted
            && self.documents.count_accepted_owners(document_id)? <= 1
        {
            return Err(CollaborationServiceError::SoleOwner {
                document_id,
                actor_id: target_actor_id,
            });
        }

        self.documents
            .remove_collaborator(document_id, target_actor_id)?;
        self.record_activity(
            document_id,
            caller_id,
            ActivityKind::CollaboratorRemoved,
            Some(json!({ "actor_id": target_actor_id })),
        );
        Ok(())
    }

    /// Membership rows in pending or accepted status.
    pub fn list_collaborators(
        &self,
        document_id: DocumentId,
    ) -> Result<Vec<Collaborator>, CollaborationServiceError> {
        self.load_live(document_id)?;
        let collaborators = self.documents.list_collaborators(document_id)?;
        Ok(collaborators
            .into_iter()
            .filter(|entry| {
                matches!(
                    entry.status,
                    CollaboratorStatus::Pending | CollaboratorStatus::Accepted
                )
            })
            .collect())
    }

    /// Pending invitations that have not yet passed their expiry.
    pub fn list_pending_invitations(
        &self,
        document_id: DocumentId,
        now_ms: i64,
    ) -> Result<Vec<Invitation>, CollaborationServiceError> {
        self.load_live(document_id)?;
        self.invitations
            .list_pending_for_document(document_id, now_ms)
            .map_err(Into::into)
    }

    /// Sweeps pending invitations past their expiry. Returns the number
    /// flipped to expired.
    pub fn expire_pending(&self, now_ms: i64) -> Result<usize, CollaborationServiceError> {
        self.invitations.expire_pending(now_ms).map_err(Into::into)
    }

    /// Expiry gate shared by accept and decline: a pending invitation past
    /// its expiry is flipped and reported expired; any other settled status
    /// is rejected as-is.
    fn ensure_live_pending(
        &self,
        invitation: &Invitation,
        token: &str,
        now_ms: i64,
    ) -> Result<(), CollaborationServiceError> {
        if invitation.status == InvitationStatus::Pending && invitation.expires_at <= now_ms {
            self.invitations
                .set_status(invitation.id, InvitationStatus::Expired, None)?;
            return Err(CollaborationServiceError::InvitationExpired(
                token.to_string(),
            ));
        }
        if invitation.status != InvitationStatus::Pending {
            return Err(CollaborationServiceError::InvalidInvitationState(
                invitation.status,
            ));
        }
        Ok(())
    }

    fn require_invitation(&self, token: &str) -> Result<Invitation, CollaborationServiceError> {
        self.invitations
            .get_invitation_by_token(token)?
            .ok_or_else(|| CollaborationServiceError::InvitationNotFound(token.to_string()))
    }

    fn load_live(&self, id: DocumentId) -> Result<GraphDocument, CollaborationServiceError> {
        match self.documents.get_document(id)? {
            Some(document) if document.status != DocumentStatus::Deleted => Ok(document),
            _ => Err(CollaborationServiceError::DocumentNotFound(id)),
        }
    }

    fn ensure_edit_access(
        &self,
        document: &GraphDocument,
        actor_id: ActorId,
    ) -> Result<(), CollaborationServiceError> {
        let allowed = document.owner_id == actor_id
            || document
                .role_of(actor_id)
                .map_or(false, CollaboratorRole::can_edit);
        if allowed {
            return Ok(());
        }
        Err(CollaborationServiceError::PermissionDenied {
            document_id: document.id,
            actor_id,
        })
    }

    fn ensure_owner(
        &self,
        document: &GraphDocument,
        actor_id: ActorId,
    ) -> Result<(), CollaborationServiceError> {
        let allowed = document.owner_id == actor_id
            || document.role_of(actor_id) == Some(CollaboratorRole::Owner);
        if allowed {
            return Ok(());
        }
        Err(CollaborationServiceError::PermissionDenied {
            document_id: document.id,
            actor_id,
        })
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
                "event=activity_record module=collaboration_service status=error document_id={document_id} kind={} error={err}",
                kind.as_db_str()
            );
        }
    }
}

fn normalize_email(value: &str) -> Result<String, CollaborationServiceError> {
    let normalized = value.trim().to_lowercase();
    if !EMAIL_RE.is_match(&normalized) {
        return Err(CollaborationServiceError::InvalidSpec(
            ValidationError::InvalidEmail(value.to_string()),
        ));
    }
    Ok(normalized)
}
