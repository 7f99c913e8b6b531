use mindweave_core::db::open_db_in_memory;
use mindweave_core::model::document::{
    CollaboratorRole, CollaboratorStatus, DocumentSpec,
};
use mindweave_core::model::invitation::{InvitationStatus, INVITATION_TTL_MS};
use mindweave_core::model::ValidationError;
use mindweave_core::repo::activity_repo::SqliteActivityRepository;
use mindweave_core::repo::document_repo::{DocumentRepository, SqliteDocumentRepository};
use mindweave_core::repo::history_repo::SqliteHistoryRepository;
use mindweave_core::repo::invitation_repo::{InvitationRepository, SqliteInvitationRepository};
use mindweave_core::search::fts::FtsDocumentIndex;
use mindweave_core::service::collaboration_service::{
    CollaborationService, CollaborationServiceError, InviteRequest,
};
use mindweave_core::service::document_service::DocumentService;
use rusqlite::{params, Connection};
use uuid::Uuid;

const NOW: i64 = 1_755_000_000_000;

type CollabService<'c> = CollaborationService<
    SqliteInvitationRepository<'c>,
    SqliteDocumentRepository<'c>,
    SqliteActivityRepository<'c>,
>;

fn setup() -> Connection {
    open_db_in_memory().unwrap()
}

fn collaboration_service(conn: &Connection) -> CollabService<'_> {
    CollaborationService::new(
        SqliteInvitationRepository::try_new(conn).unwrap(),
        SqliteDocumentRepository::try_new(conn).unwrap(),
        SqliteActivityRepository::try_new(conn).unwrap(),
    )
}

fn create_document(conn: &Connection, owner_id: i64, title: &str) -> Uuid {
    let documents = DocumentService::new(
        SqliteDocumentRepository::try_new(conn).unwrap(),
        SqliteHistoryRepository::try_new(conn).unwrap(),
        SqliteActivityRepository::try_new(conn).unwrap(),
        FtsDocumentIndex::new(conn),
    );
    documents
        .create_document(owner_id, &DocumentSpec::new(title))
        .unwrap()
        .id
}

fn invite_request(email: &str, role: CollaboratorRole) -> InviteRequest {
    InviteRequest {
        email: email.to_string(),
        role,
        invited_actor_id: None,
        message: None,
    }
}

#[test]
fn invite_normalizes_email_and_starts_pending() {
    let conn = setup();
    let service = collaboration_service(&conn);
    let document_id = create_document(&conn, 1, "Shared board");

    let mut request = invite_request("  Ada@Example.COM ", CollaboratorRole::Editor);
    request.message = Some("join my board".to_string());

    let invitation = service.invite(document_id, 1, &request, NOW).unwrap();

    assert_eq!(invitation.email, "ada@example.com");
    assert_eq!(invitation.status, InvitationStatus::Pending);
    assert_eq!(invitation.role, CollaboratorRole::Editor);
    assert_eq!(invitation.invited_by, 1);
    assert_eq!(invitation.expires_at, NOW + INVITATION_TTL_MS);
    assert_eq!(invitation.message.as_deref(), Some("join my board"));
    assert!(invitation.accepted_at.is_none());
    assert!(!invitation.token.is_empty());
}

#[test]
fn invite_requires_editor_or_owner_role() {
    let conn = setup();
    let service = collaboration_service(&conn);
    let document_id = create_document(&conn, 1, "Held");

    let err = service
        .invite(
            document_id,
            9,
            &invite_request("someone@example.com", CollaboratorRole::Viewer),
            NOW,
        )
        .unwrap_err();
    assert!(matches!(
        err,
        CollaborationServiceError::PermissionDenied { actor_id: 9, .. }
    ));

    // An accepted editor can invite; an accepted viewer cannot.
    let editor_invite = InviteRequest {
        invited_actor_id: Some(2),
        ..invite_request("editor@example.com", CollaboratorRole::Editor)
    };
    let editor = service.invite(document_id, 1, &editor_invite, NOW).unwrap();
    service.accept(&editor.token, 2, NOW + 1_000).unwrap();

    let viewer_invite = InviteRequest {
        invited_actor_id: Some(3),
        ..invite_request("viewer@example.com", CollaboratorRole::Viewer)
    };
    let viewer = service.invite(document_id, 2, &viewer_invite, NOW).unwrap();
    service.accept(&viewer.token, 3, NOW + 1_000).unwrap();

    let err = service
        .invite(
            document_id,
            3,
            &invite_request("friend@example.com", CollaboratorRole::Viewer),
            NOW,
        )
        .unwrap_err();
    assert!(matches!(
        err,
        CollaborationServiceError::PermissionDenied { actor_id: 3, .. }
    ));
}

#[test]
fn owner_role_is_not_grantable() {
    let conn = setup();
    let service = collaboration_service(&conn);
    let document_id = create_document(&conn, 1, "Throne");

    let err = service
        .invite(
            document_id,
            1,
            &invite_request("usurper@example.com", CollaboratorRole::Owner),
            NOW,
        )
        .unwrap_err();
    assert!(matches!(
        err,
        CollaborationServiceError::InvalidSpec(ValidationError::OwnerRoleNotAssignable)
    ));
}

#[test]
fn malformed_email_is_rejected() {
    let conn = setup();
    let service = collaboration_service(&conn);
    let document_id = create_document(&conn, 1, "Strict");

    let err = service
        .invite(
            document_id,
            1,
            &invite_request("not-an-email", CollaboratorRole::Viewer),
            NOW,
        )
        .unwrap_err();
    assert!(matches!(
        err,
        CollaborationServiceError::InvalidSpec(ValidationError::InvalidEmail(value))
            if value == "not-an-email"
    ));
}

#[test]
fn duplicate_live_pending_invitation_is_a_conflict() {
    let conn = setup();
    let service = collaboration_service(&conn);
    let document_id = create_document(&conn, 1, "Popular");

    let first = service
        .invite(
            document_id,
            1,
            &invite_request("ada@example.com", CollaboratorRole::Viewer),
            NOW,
        )
        .unwrap();

    // Same address in different case still collides.
    let err = service
        .invite(
            document_id,
            1,
            &invite_request("ADA@Example.com", CollaboratorRole::Editor),
            NOW,
        )
        .unwrap_err();
    assert!(matches!(
        err,
        CollaborationServiceError::PendingInvitationExists { email, .. }
            if email == "ada@example.com"
    ));

    // A settled invitation frees the address.
    service.decline(&first.token, 2, NOW + 1_000).unwrap();
    service
        .invite(
            document_id,
            1,
            &invite_request("ada@example.com", CollaboratorRole::Viewer),
            NOW + 2_000,
        )
        .unwrap();
}

#[test]
fn known_invitee_is_listed_pending_before_acceptance() {
    let conn = setup();
    let service = collaboration_service(&conn);
    let document_id = create_document(&conn, 1, "Previewed");

    let request = InviteRequest {
        invited_actor_id: Some(2),
        ..invite_request("ada@example.com", CollaboratorRole::Editor)
    };
    let invitation = service.invite(document_id, 1, &request, NOW).unwrap();
    assert_eq!(invitation.invited_actor_id, Some(2));

    let collaborators = service.list_collaborators(document_id).unwrap();
    let pending = collaborators
        .iter()
        .find(|entry| entry.actor_id == 2)
        .expect("invitee should be listed");
    assert_eq!(pending.status, CollaboratorStatus::Pending);
    assert_eq!(pending.role, CollaboratorRole::Editor);
}

#[test]
fn accept_grants_membership_and_settles_the_invitation() {
    let conn = setup();
    let service = collaboration_service(&conn);
    let documents = SqliteDocumentRepository::try_new(&conn).unwrap();
    let document_id = create_document(&conn, 1, "Joined");

    let invitation = service
        .invite(
            document_id,
            1,
            &invite_request("ada@example.com", CollaboratorRole::Editor),
            NOW,
        )
        .unwrap();

    let accepted = service.accept(&invitation.token, 2, NOW + 5_000).unwrap();
    assert_eq!(accepted.status, InvitationStatus::Accepted);
    assert_eq!(accepted.invited_actor_id, Some(2));
    assert_eq!(accepted.accepted_at, Some(NOW + 5_000));

    let membership = documents
        .get_collaborator(document_id, 2)
        .unwrap()
        .expect("membership should exist");
    assert_eq!(membership.status, CollaboratorStatus::Accepted);
    assert_eq!(membership.role, CollaboratorRole::Editor);
    assert_eq!(membership.invited_by, 1);

    let err = service
        .accept(&invitation.token, 2, NOW + 6_000)
        .unwrap_err();
    assert!(matches!(
        err,
        CollaborationServiceError::InvalidInvitationState(InvitationStatus::Accepted)
    ));
}

#[test]
fn accept_never_duplicates_membership_rows() {
    let conn = setup();
    let service = collaboration_service(&conn);
    let document_id = create_document(&conn, 1, "Single");

    let request = InviteRequest {
        invited_actor_id: Some(2),
        ..invite_request("ada@example.com", CollaboratorRole::Viewer)
    };
    let invitation = service.invite(document_id, 1, &request, NOW).unwrap();
    service.accept(&invitation.token, 2, NOW + 1_000).unwrap();

    let rows: i64 = conn
        .query_row(
            "SELECT COUNT(*)
             FROM document_collaborators
             WHERE document_id = ?1
               AND actor_id = 2;",
            [document_id.to_string()],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(rows, 1);
}

#[test]
fn accept_past_expiry_flips_the_invitation_to_expired() {
    let conn = setup();
    let service = collaboration_service(&conn);
    let invitations = SqliteInvitationRepository::try_new(&conn).unwrap();
    let documents = SqliteDocumentRepository::try_new(&conn).unwrap();
    let document_id = create_document(&conn, 1, "Stale");

    let invitation = service
        .invite(
            document_id,
            1,
            &invite_request("late@example.com", CollaboratorRole::Viewer),
            NOW,
        )
        .unwrap();

    let err = service
        .accept(&invitation.token, 2, NOW + INVITATION_TTL_MS)
        .unwrap_err();
    assert!(matches!(
        err,
        CollaborationServiceError::InvitationExpired(token) if token == invitation.token
    ));

    let stored = invitations
        .get_invitation_by_token(&invitation.token)
        .unwrap()
        .unwrap();
    assert_eq!(stored.status, InvitationStatus::Expired);
    assert!(documents.get_collaborator(document_id, 2).unwrap().is_none());

    // Once flipped, the failure mode changes from expired to invalid state.
    let err = service
        .accept(&invitation.token, 2, NOW + INVITATION_TTL_MS + 1)
        .unwrap_err();
    assert!(matches!(
        err,
        CollaborationServiceError::InvalidInvitationState(InvitationStatus::Expired)
    ));
}

#[test]
fn accept_with_unknown_token_fails_not_found() {
    let conn = setup();
    let service = collaboration_service(&conn);
    create_document(&conn, 1, "Empty");

    let err = service.accept("no-such-token", 2, NOW).unwrap_err();
    assert!(matches!(
        err,
        CollaborationServiceError::InvitationNotFound(token) if token == "no-such-token"
    ));
}

#[test]
fn decline_settles_rejected_and_marks_membership() {
    let conn = setup();
    let service = collaboration_service(&conn);
    let invitations = SqliteInvitationRepository::try_new(&conn).unwrap();
    let documents = SqliteDocumentRepository::try_new(&conn).unwrap();
    let document_id = create_document(&conn, 1, "Declined");

    let request = InviteRequest {
        invited_actor_id: Some(2),
        ..invite_request("ada@example.com", CollaboratorRole::Editor)
    };
    let invitation = service.invite(document_id, 1, &request, NOW).unwrap();

    service.decline(&invitation.token, 2, NOW + 1_000).unwrap();

    let stored = invitations
        .get_invitation_by_token(&invitation.token)
        .unwrap()
        .unwrap();
    assert_eq!(stored.status, InvitationStatus::Rejected);

    let membership = documents.get_collaborator(document_id, 2).unwrap().unwrap();
    assert_eq!(membership.status, CollaboratorStatus::Rejected);

    let listed = service.list_collaborators(document_id).unwrap();
    assert!(listed.iter().all(|entry| entry.actor_id != 2));
}

#[test]
fn cancel_is_restricted_to_inviter_or_owner() {
    let conn = setup();
    let service = collaboration_service(&conn);
    let invitations = SqliteInvitationRepository::try_new(&conn).unwrap();
    let document_id = create_document(&conn, 1, "Withdrawn");

    // Seed an accepted editor who will do the inviting.
    let editor_invite = InviteRequest {
        invited_actor_id: Some(2),
        ..invite_request("editor@example.com", CollaboratorRole::Editor)
    };
    let editor = service.invite(document_id, 1, &editor_invite, NOW).unwrap();
    service.accept(&editor.token, 2, NOW).unwrap();

    let invitation = service
        .invite(
            document_id,
            2,
            &invite_request("guest@example.com", CollaboratorRole::Viewer),
            NOW,
        )
        .unwrap();

    let err = service.cancel(&invitation.token, 9).unwrap_err();
    assert!(matches!(
        err,
        CollaborationServiceError::PermissionDenied { actor_id: 9, .. }
    ));

    // The owner may withdraw an invitation sent by someone else.
    service.cancel(&invitation.token, 1).unwrap();
    let stored = invitations
        .get_invitation_by_token(&invitation.token)
        .unwrap()
        .unwrap();
    assert_eq!(stored.status, InvitationStatus::Cancelled);

    let err = service.cancel(&invitation.token, 1).unwrap_err();
    assert!(matches!(
        err,
        CollaborationServiceError::InvalidInvitationState(InvitationStatus::Cancelled)
    ));
}

#[test]
fn cancel_clears_a_pending_membership_row() {
    let conn = setup();
    let service = collaboration_service(&conn);
    let documents = SqliteDocumentRepository::try_new(&conn).unwrap();
    let document_id = create_document(&conn, 1, "Retracted");

    let request = InviteRequest {
        invited_actor_id: Some(4),
        ..invite_request("four@example.com", CollaboratorRole::Viewer)
    };
    let invitation = service.invite(document_id, 1, &request, NOW).unwrap();

    service.cancel(&invitation.token, 1).unwrap();

    let membership = documents.get_collaborator(document_id, 4).unwrap().unwrap();
    assert_eq!(membership.status, CollaboratorStatus::Removed);
    let listed = service.list_collaborators(document_id).unwrap();
    assert!(listed.iter().all(|entry| entry.actor_id != 4));
}

#[test]
fn inviting_an_accepted_collaborator_conflicts() {
    let conn = setup();
    let service = collaboration_service(&conn);
    let document_id = create_document(&conn, 1, "Redundant");

    let request = InviteRequest {
        invited_actor_id: Some(2),
        ..invite_request("ada@example.com", CollaboratorRole::Editor)
    };
    let invitation = service.invite(document_id, 1, &request, NOW).unwrap();
    service.accept(&invitation.token, 2, NOW + 1_000).unwrap();

    let repeat = InviteRequest {
        invited_actor_id: Some(2),
        ..invite_request("ada.second@example.com", CollaboratorRole::Viewer)
    };
    let err = service.invite(document_id, 1, &repeat, NOW + 2_000).unwrap_err();
    assert!(matches!(
        err,
        CollaborationServiceError::AlreadyCollaborator { actor_id: 2, .. }
    ));
}

#[test]
fn update_role_switches_between_editor_and_viewer() {
    let conn = setup();
    let service = collaboration_service(&conn);
    let documents = SqliteDocumentRepository::try_new(&conn).unwrap();
    let document_id = create_document(&conn, 1, "Promoted");

    let request = InviteRequest {
        invited_actor_id: Some(2),
        ..invite_request("ada@example.com", CollaboratorRole::Viewer)
    };
    let invitation = service.invite(document_id, 1, &request, NOW).unwrap();
    service.accept(&invitation.token, 2, NOW).unwrap();

    service
        .update_role(document_id, 1, 2, CollaboratorRole::Editor)
        .unwrap();
    let membership = documents.get_collaborator(document_id, 2).unwrap().unwrap();
    assert_eq!(membership.role, CollaboratorRole::Editor);

    let err = service
        .update_role(document_id, 2, 2, CollaboratorRole::Viewer)
        .unwrap_err();
    assert!(matches!(
        err,
        CollaborationServiceError::PermissionDenied { actor_id: 2, .. }
    ));

    let err = service
        .update_role(document_id, 1, 2, CollaboratorRole::Owner)
        .unwrap_err();
    assert!(matches!(
        err,
        CollaborationServiceError::InvalidSpec(ValidationError::OwnerRoleNotAssignable)
    ));

    let err = service
        .update_role(document_id, 1, 42, CollaboratorRole::Viewer)
        .unwrap_err();
    assert!(matches!(
        err,
        CollaborationServiceError::CollaboratorNotFound { actor_id: 42, .. }
    ));
}

#[test]
fn sole_owner_cannot_be_demoted_or_removed() {
    let conn = setup();
    let service = collaboration_service(&conn);
    let document_id = create_document(&conn, 1, "Anchored");

    let err = service
        .update_role(document_id, 1, 1, CollaboratorRole::Editor)
        .unwrap_err();
    assert!(matches!(
        err,
        CollaborationServiceError::SoleOwner { actor_id: 1, .. }
    ));

    let err = service.remove_collaborator(document_id, 1, 1).unwrap_err();
    assert!(matches!(
        err,
        CollaborationServiceError::SoleOwner { actor_id: 1, .. }
    ));
}

#[test]
fn remove_collaborator_is_owner_only_and_final() {
    let conn = setup();
    let service = collaboration_service(&conn);
    let document_id = create_document(&conn, 1, "Pruned");

    let request = InviteRequest {
        invited_actor_id: Some(2),
        ..invite_request("ada@example.com", CollaboratorRole::Editor)
    };
    let invitation = service.invite(document_id, 1, &request, NOW).unwrap();
    service.accept(&invitation.token, 2, NOW).unwrap();

    let err = service.remove_collaborator(document_id, 2, 2).unwrap_err();
    assert!(matches!(
        err,
        CollaborationServiceError::PermissionDenied { actor_id: 2, .. }
    ));

    service.remove_collaborator(document_id, 1, 2).unwrap();
    let listed = service.list_collaborators(document_id).unwrap();
    assert!(listed.iter().all(|entry| entry.actor_id != 2));

    let err = service.remove_collaborator(document_id, 1, 2).unwrap_err();
    assert!(matches!(
        err,
        CollaborationServiceError::CollaboratorNotFound { actor_id: 2, .. }
    ));
}

#[test]
fn pending_listing_hides_expired_and_orders_by_creation() {
    let conn = setup();
    let service = collaboration_service(&conn);
    let document_id = create_document(&conn, 1, "Queue");

    let stale = service
        .invite(
            document_id,
            1,
            &invite_request("stale@example.com", CollaboratorRole::Viewer),
            NOW - INVITATION_TTL_MS - 1_000,
        )
        .unwrap();
    let second = service
        .invite(
            document_id,
            1,
            &invite_request("second@example.com", CollaboratorRole::Viewer),
            NOW,
        )
        .unwrap();
    let first = service
        .invite(
            document_id,
            1,
            &invite_request("first@example.com", CollaboratorRole::Viewer),
            NOW,
        )
        .unwrap();

    // Second-resolution row clocks tie; pin creation order explicitly.
    for (token, created_at) in [(&stale.token, 1_000), (&first.token, 2_000), (&second.token, 3_000)]
    {
        conn.execute(
            "UPDATE invitations SET created_at = ?2 WHERE token = ?1;",
            params![token, created_at],
        )
        .unwrap();
    }

    let pending = service.list_pending_invitations(document_id, NOW).unwrap();
    let emails: Vec<&str> = pending
        .iter()
        .map(|invitation| invitation.email.as_str())
        .collect();
    assert_eq!(emails, vec!["first@example.com", "second@example.com"]);
}

#[test]
fn expire_sweep_flips_only_overdue_pending_invitations() {
    let conn = setup();
    let service = collaboration_service(&conn);
    let invitations = SqliteInvitationRepository::try_new(&conn).unwrap();
    let document_id = create_document(&conn, 1, "Swept");

    let overdue_a = service
        .invite(
            document_id,
            1,
            &invite_request("a@example.com", CollaboratorRole::Viewer),
            NOW - INVITATION_TTL_MS - 5_000,
        )
        .unwrap();
    let overdue_b = service
        .invite(
            document_id,
            1,
            &invite_request("b@example.com", CollaboratorRole::Viewer),
            NOW - INVITATION_TTL_MS - 5_000,
        )
        .unwrap();
    let fresh = service
        .invite(
            document_id,
            1,
            &invite_request("c@example.com", CollaboratorRole::Viewer),
            NOW,
        )
        .unwrap();

    let flipped = service.expire_pending(NOW).unwrap();
    assert_eq!(flipped, 2);

    for token in [&overdue_a.token, &overdue_b.token] {
        let stored = invitations.get_invitation_by_token(token).unwrap().unwrap();
        assert_eq!(stored.status, InvitationStatus::Expired);
    }
    let stored = invitations
        .get_invitation_by_token(&fresh.token)
        .unwrap()
        .unwrap();
    assert_eq!(stored.status, InvitationStatus::Pending);

    assert_eq!(service.expire_pending(NOW).unwrap(), 0);
}

#[test]
fn operations_on_deleted_documents_fail_not_found() {
    let conn = setup();
    let service = collaboration_service(&conn);
    let documents = DocumentService::new(
        SqliteDocumentRepository::try_new(&conn).unwrap(),
        SqliteHistoryRepository::try_new(&conn).unwrap(),
        SqliteActivityRepository::try_new(&conn).unwrap(),
        FtsDocumentIndex::new(&conn),
    );
    let document_id = create_document(&conn, 1, "Erased");
    documents.soft_delete(document_id, 1).unwrap();

    let err = service
        .invite(
            document_id,
            1,
            &invite_request("ada@example.com", CollaboratorRole::Viewer),
            NOW,
        )
        .unwrap_err();
    assert!(matches!(
        err,
        CollaborationServiceError::DocumentNotFound(id) if id == document_id
    ));

    let err = service.list_collaborators(document_id).unwrap_err();
    assert!(matches!(err, CollaborationServiceError::DocumentNotFound(_)));
}
