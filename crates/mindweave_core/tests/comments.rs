use mindweave_core::db::open_db_in_memory;
use mindweave_core::model::comment::MAX_CONTENT_CHARS;
use mindweave_core::model::document::{
    Collaborator, CollaboratorRole, CollaboratorStatus, DocumentSpec,
};
use mindweave_core::model::graph::{Edge, Node, Position};
use mindweave_core::model::ValidationError;
use mindweave_core::repo::activity_repo::SqliteActivityRepository;
use mindweave_core::repo::comment_repo::SqliteCommentRepository;
use mindweave_core::repo::document_repo::{DocumentRepository, SqliteDocumentRepository};
use mindweave_core::repo::history_repo::SqliteHistoryRepository;
use mindweave_core::search::fts::FtsDocumentIndex;
use mindweave_core::service::comment_service::{CommentService, CommentServiceError};
use mindweave_core::service::document_service::DocumentService;
use rusqlite::{params, Connection};
use uuid::Uuid;

type Comments<'c> = CommentService<
    SqliteCommentRepository<'c>,
    SqliteDocumentRepository<'c>,
    SqliteActivityRepository<'c>,
>;

type DocService<'c> = DocumentService<
    SqliteDocumentRepository<'c>,
    SqliteHistoryRepository<'c>,
    SqliteActivityRepository<'c>,
    FtsDocumentIndex<'c>,
>;

fn setup() -> Connection {
    open_db_in_memory().unwrap()
}

fn comment_service(conn: &Connection) -> Comments<'_> {
    CommentService::new(
        SqliteCommentRepository::try_new(conn).unwrap(),
        SqliteDocumentRepository::try_new(conn).unwrap(),
        SqliteActivityRepository::try_new(conn).unwrap(),
    )
}

fn document_service(conn: &Connection) -> DocService<'_> {
    DocumentService::new(
        SqliteDocumentRepository::try_new(conn).unwrap(),
        SqliteHistoryRepository::try_new(conn).unwrap(),
        SqliteActivityRepository::try_new(conn).unwrap(),
        FtsDocumentIndex::new(conn),
    )
}

fn two_node_document(conn: &Connection, owner_id: i64) -> Uuid {
    let mut spec = DocumentSpec::new("Discussion Target");
    spec.nodes = vec![
        Node::new("n1", Position::new(0.0, 0.0)),
        Node::new("n2", Position::new(140.0, 30.0)),
    ];
    spec.edges = vec![Edge::new("e1", "n1", "n2")];
    document_service(conn).create_document(owner_id, &spec).unwrap().id
}

fn grant_role(conn: &Connection, document_id: Uuid, actor_id: i64, role: CollaboratorRole) {
    let repo = SqliteDocumentRepository::try_new(conn).unwrap();
    let entry = Collaborator::new(actor_id, role, 1, CollaboratorStatus::Accepted);
    repo.upsert_collaborator(document_id, &entry).unwrap();
}

fn pin_comment_created_at(conn: &Connection, id: Uuid, created_at: i64) {
    conn.execute(
        "UPDATE comments SET created_at = ?2 WHERE id = ?1;",
        params![id.to_string(), created_at],
    )
    .unwrap();
}

#[test]
fn root_comments_anchor_to_existing_nodes() {
    let conn = setup();
    let document_id = two_node_document(&conn, 1);
    let service = comment_service(&conn);

    let comment = service
        .add_comment(document_id, 1, "n1", "Looks off-center", &[], None)
        .unwrap();

    assert_eq!(comment.document_id, document_id);
    assert_eq!(comment.node_id, "n1");
    assert_eq!(comment.author_id, 1);
    assert_eq!(comment.content, "Looks off-center");
    assert!(comment.mentions.is_empty());
    assert!(comment.parent_comment_id.is_none());
    assert!(!comment.resolved);
    assert!(!comment.is_edited);
    assert!(comment.edited_at.is_none());
}

#[test]
fn mentions_are_stored_with_the_comment() {
    let conn = setup();
    let document_id = two_node_document(&conn, 1);
    let service = comment_service(&conn);

    let comment = service
        .add_comment(document_id, 1, "n1", "@sam @kim thoughts?", &[2, 3], None)
        .unwrap();
    assert_eq!(comment.mentions, vec![2, 3]);
}

#[test]
fn comments_on_missing_nodes_are_rejected() {
    let conn = setup();
    let document_id = two_node_document(&conn, 1);
    let service = comment_service(&conn);

    let err = service
        .add_comment(document_id, 1, "ghost", "Anchored to nothing", &[], None)
        .unwrap_err();
    assert!(matches!(
        err,
        CommentServiceError::NodeNotFound { document_id: id, node_id }
            if id == document_id && node_id == "ghost"
    ));
}

#[test]
fn commenting_requires_read_access() {
    let conn = setup();
    let document_id = two_node_document(&conn, 1);
    let service = comment_service(&conn);

    let err = service
        .add_comment(document_id, 9, "n1", "Drive-by", &[], None)
        .unwrap_err();
    assert!(matches!(
        err,
        CommentServiceError::PermissionDenied { actor_id: 9, .. }
    ));

    grant_role(&conn, document_id, 2, CollaboratorRole::Viewer);
    service
        .add_comment(document_id, 2, "n1", "Viewer can discuss", &[], None)
        .unwrap();

    document_service(&conn)
        .set_visibility(document_id, 1, true)
        .unwrap();
    service
        .add_comment(document_id, 9, "n1", "Public now", &[], None)
        .unwrap();
}

#[test]
fn blank_or_oversized_bodies_are_rejected() {
    let conn = setup();
    let document_id = two_node_document(&conn, 1);
    let service = comment_service(&conn);

    let err = service
        .add_comment(document_id, 1, "n1", "   ", &[], None)
        .unwrap_err();
    assert!(matches!(
        err,
        CommentServiceError::InvalidSpec(ValidationError::ContentRequired)
    ));

    let oversized = "x".repeat(MAX_CONTENT_CHARS + 1);
    let err = service
        .add_comment(document_id, 1, "n1", &oversized, &[], None)
        .unwrap_err();
    assert!(matches!(
        err,
        CommentServiceError::InvalidSpec(ValidationError::ContentTooLong { length, max })
            if length == MAX_CONTENT_CHARS + 1 && max == MAX_CONTENT_CHARS
    ));
}

#[test]
fn replies_attach_one_level_deep() {
    let conn = setup();
    let document_id = two_node_document(&conn, 1);
    let service = comment_service(&conn);

    let root = service
        .add_comment(document_id, 1, "n1", "Root question", &[], None)
        .unwrap();
    let reply = service
        .add_comment(document_id, 1, "n1", "First answer", &[], Some(root.id))
        .unwrap();
    assert_eq!(reply.parent_comment_id, Some(root.id));

    let err = service
        .add_comment(document_id, 1, "n1", "Nested too deep", &[], Some(reply.id))
        .unwrap_err();
    assert!(matches!(
        err,
        CommentServiceError::ParentNotRoot(id) if id == reply.id
    ));
}

#[test]
fn replies_must_share_the_parents_anchor() {
    let conn = setup();
    let document_id = two_node_document(&conn, 1);
    let other_document_id = two_node_document(&conn, 1);
    let service = comment_service(&conn);

    let root = service
        .add_comment(document_id, 1, "n1", "Root on n1", &[], None)
        .unwrap();

    let err = service
        .add_comment(document_id, 1, "n2", "Wrong node", &[], Some(root.id))
        .unwrap_err();
    assert!(matches!(
        err,
        CommentServiceError::ParentMismatch(id) if id == root.id
    ));

    let err = service
        .add_comment(other_document_id, 1, "n1", "Wrong document", &[], Some(root.id))
        .unwrap_err();
    assert!(matches!(
        err,
        CommentServiceError::ParentMismatch(id) if id == root.id
    ));

    let missing = Uuid::new_v4();
    let err = service
        .add_comment(document_id, 1, "n1", "Orphan reply", &[], Some(missing))
        .unwrap_err();
    assert!(matches!(
        err,
        CommentServiceError::ParentNotFound(id) if id == missing
    ));
}

#[test]
fn edits_are_author_only_and_marked() {
    let conn = setup();
    let document_id = two_node_document(&conn, 1);
    let service = comment_service(&conn);
    grant_role(&conn, document_id, 2, CollaboratorRole::Editor);

    let comment = service
        .add_comment(document_id, 2, "n1", "Typo here", &[], None)
        .unwrap();

    let err = service.edit_comment(comment.id, 1, "Owner rewrite").unwrap_err();
    assert!(matches!(
        err,
        CommentServiceError::PermissionDenied { actor_id: 1, .. }
    ));

    let edited = service.edit_comment(comment.id, 2, "Typo fixed").unwrap();
    assert_eq!(edited.content, "Typo fixed");
    assert!(edited.is_edited);
    assert!(edited.edited_at.is_some());
}

#[test]
fn resolve_records_resolver_and_time() {
    let conn = setup();
    let document_id = two_node_document(&conn, 1);
    let service = comment_service(&conn);
    grant_role(&conn, document_id, 2, CollaboratorRole::Viewer);

    let comment = service
        .add_comment(document_id, 1, "n1", "Open point", &[], None)
        .unwrap();

    service.resolve(comment.id, 2).unwrap();

    let listed = service.list_for_document(document_id, true).unwrap();
    assert_eq!(listed.len(), 1);
    assert!(listed[0].resolved);
    assert_eq!(listed[0].resolved_by, Some(2));
    assert!(listed[0].resolved_at.is_some());

    let err = service.resolve(comment.id, 1).unwrap_err();
    assert!(matches!(
        err,
        CommentServiceError::AlreadyResolved(id) if id == comment.id
    ));
}

#[test]
fn reopen_requires_a_resolved_comment() {
    let conn = setup();
    let document_id = two_node_document(&conn, 1);
    let service = comment_service(&conn);

    let comment = service
        .add_comment(document_id, 1, "n1", "Flip-flop", &[], None)
        .unwrap();

    let err = service.reopen(comment.id, 1).unwrap_err();
    assert!(matches!(
        err,
        CommentServiceError::NotResolved(id) if id == comment.id
    ));

    service.resolve(comment.id, 1).unwrap();
    service.reopen(comment.id, 1).unwrap();

    let listed = service.list_for_document(document_id, true).unwrap();
    assert!(!listed[0].resolved);
    assert_eq!(listed[0].resolved_by, None);
    assert_eq!(listed[0].resolved_at, None);
}

#[test]
fn removal_covers_author_and_document_owner() {
    let conn = setup();
    let document_id = two_node_document(&conn, 1);
    let service = comment_service(&conn);
    grant_role(&conn, document_id, 2, CollaboratorRole::Editor);
    grant_role(&conn, document_id, 3, CollaboratorRole::Viewer);

    let by_editor = service
        .add_comment(document_id, 2, "n1", "Editor note", &[], None)
        .unwrap();

    let err = service.remove_comment(by_editor.id, 3).unwrap_err();
    assert!(matches!(
        err,
        CommentServiceError::PermissionDenied { actor_id: 3, .. }
    ));

    service.remove_comment(by_editor.id, 2).unwrap();
    let err = service.remove_comment(by_editor.id, 2).unwrap_err();
    assert!(matches!(
        err,
        CommentServiceError::CommentNotFound(id) if id == by_editor.id
    ));

    let another = service
        .add_comment(document_id, 2, "n1", "Second note", &[], None)
        .unwrap();
    service.remove_comment(another.id, 1).unwrap();
    assert!(service.list_for_document(document_id, true).unwrap().is_empty());
}

#[test]
fn removing_a_root_cascades_to_replies() {
    let conn = setup();
    let document_id = two_node_document(&conn, 1);
    let service = comment_service(&conn);

    let root = service
        .add_comment(document_id, 1, "n1", "Thread start", &[], None)
        .unwrap();
    service
        .add_comment(document_id, 1, "n1", "Reply one", &[], Some(root.id))
        .unwrap();
    service
        .add_comment(document_id, 1, "n1", "Reply two", &[], Some(root.id))
        .unwrap();

    service.remove_comment(root.id, 1).unwrap();

    assert!(service.list_for_document(document_id, true).unwrap().is_empty());
    let count: i64 = conn
        .query_row("SELECT COUNT(*) FROM comments;", [], |row| row.get(0))
        .unwrap();
    assert_eq!(count, 0);
}

#[test]
fn listing_hides_resolved_comments_unless_asked() {
    let conn = setup();
    let document_id = two_node_document(&conn, 1);
    let service = comment_service(&conn);

    let settled = service
        .add_comment(document_id, 1, "n1", "Settled", &[], None)
        .unwrap();
    let open = service
        .add_comment(document_id, 1, "n2", "Still open", &[], None)
        .unwrap();
    service.resolve(settled.id, 1).unwrap();

    let unresolved_only = service.list_for_document(document_id, false).unwrap();
    assert_eq!(unresolved_only.len(), 1);
    assert_eq!(unresolved_only[0].id, open.id);

    let everything = service.list_for_document(document_id, true).unwrap();
    assert_eq!(everything.len(), 2);
}

#[test]
fn node_listing_scopes_to_the_anchor_in_order() {
    let conn = setup();
    let document_id = two_node_document(&conn, 1);
    let service = comment_service(&conn);

    let late = service
        .add_comment(document_id, 1, "n1", "Posted later", &[], None)
        .unwrap();
    let early = service
        .add_comment(document_id, 1, "n1", "Posted first", &[], None)
        .unwrap();
    service
        .add_comment(document_id, 1, "n2", "Other anchor", &[], None)
        .unwrap();
    pin_comment_created_at(&conn, early.id, 1_000);
    pin_comment_created_at(&conn, late.id, 2_000);

    let thread = service.list_for_node(document_id, "n1").unwrap();
    let ids: Vec<Uuid> = thread.iter().map(|comment| comment.id).collect();
    assert_eq!(ids, vec![early.id, late.id]);
}

#[test]
fn operations_on_deleted_documents_fail_not_found() {
    let conn = setup();
    let document_id = two_node_document(&conn, 1);
    let service = comment_service(&conn);

    let comment = service
        .add_comment(document_id, 1, "n1", "Soon orphaned", &[], None)
        .unwrap();
    document_service(&conn).soft_delete(document_id, 1).unwrap();

    let err = service
        .add_comment(document_id, 1, "n1", "Too late", &[], None)
        .unwrap_err();
    assert!(matches!(
        err,
        CommentServiceError::DocumentNotFound(id) if id == document_id
    ));

    let err = service.resolve(comment.id, 1).unwrap_err();
    assert!(matches!(
        err,
        CommentServiceError::DocumentNotFound(id) if id == document_id
    ));

    let err = service.list_for_document(document_id, true).unwrap_err();
    assert!(matches!(
        err,
        CommentServiceError::DocumentNotFound(id) if id == document_id
    ));
}
