use mindweave_core::db::open_db_in_memory;
use mindweave_core::model::document::DocumentSpec;
use mindweave_core::model::graph::{Node, Position, Viewport};
use mindweave_core::model::presence::{
    PresenceCursor, PresenceHeartbeat, PresenceUserInfo, PRESENCE_ACTIVE_WINDOW_MS,
    PRESENCE_IDLE_TTL_MS,
};
use mindweave_core::model::ValidationError;
use mindweave_core::repo::activity_repo::SqliteActivityRepository;
use mindweave_core::repo::document_repo::SqliteDocumentRepository;
use mindweave_core::repo::history_repo::SqliteHistoryRepository;
use mindweave_core::repo::presence_repo::{PresenceRepository, SqlitePresenceRepository};
use mindweave_core::search::fts::FtsDocumentIndex;
use mindweave_core::service::document_service::DocumentService;
use mindweave_core::service::presence_service::{PresenceService, PresenceServiceError};
use rusqlite::Connection;
use uuid::Uuid;

const NOW: i64 = 1_755_000_000_000;

fn setup() -> Connection {
    open_db_in_memory().unwrap()
}

fn presence_service(conn: &Connection) -> PresenceService<SqlitePresenceRepository<'_>> {
    PresenceService::new(SqlitePresenceRepository::try_new(conn).unwrap())
}

fn create_document(conn: &Connection, title: &str) -> Uuid {
    let documents = DocumentService::new(
        SqliteDocumentRepository::try_new(conn).unwrap(),
        SqliteHistoryRepository::try_new(conn).unwrap(),
        SqliteActivityRepository::try_new(conn).unwrap(),
        FtsDocumentIndex::new(conn),
    );
    let mut spec = DocumentSpec::new(title);
    spec.nodes = vec![Node::new("root", Position::new(0.0, 0.0))];
    documents.create_document(1, &spec).unwrap().id
}

#[test]
fn join_registers_a_fresh_session() {
    let conn = setup();
    let presence = presence_service(&conn);
    let document_id = create_document(&conn, "Live");

    let info = PresenceUserInfo {
        name: Some("Ada".to_string()),
        color: Some("#ff8800".to_string()),
        ..PresenceUserInfo::default()
    };
    let session = presence
        .join(document_id, 1, "conn-1", Some(info), NOW)
        .unwrap();

    assert_eq!(session.connection_id, "conn-1");
    assert_eq!(session.document_id, document_id);
    assert_eq!(session.actor_id, 1);
    assert!(session.cursor.is_none());
    assert!(session.viewport.is_none());
    assert!(!session.is_editing);
    assert_eq!(session.connected_at, NOW);
    assert_eq!(session.last_activity_at, NOW);

    let repo = SqlitePresenceRepository::try_new(&conn).unwrap();
    let stored = repo.get_session("conn-1").unwrap().unwrap();
    let stored_info = stored.user_info.unwrap();
    assert_eq!(stored_info.name.as_deref(), Some("Ada"));
    assert_eq!(stored_info.color.as_deref(), Some("#ff8800"));
}

#[test]
fn duplicate_connection_id_is_a_conflict() {
    let conn = setup();
    let presence = presence_service(&conn);
    let first_doc = create_document(&conn, "One");
    let second_doc = create_document(&conn, "Two");

    presence.join(first_doc, 1, "conn-1", None, NOW).unwrap();

    let err = presence.join(first_doc, 1, "conn-1", None, NOW).unwrap_err();
    assert!(matches!(
        err,
        PresenceServiceError::DuplicateConnection(id) if id == "conn-1"
    ));

    // Connection ids are global, not per document.
    let err = presence.join(second_doc, 2, "conn-1", None, NOW).unwrap_err();
    assert!(matches!(err, PresenceServiceError::DuplicateConnection(_)));
}

#[test]
fn join_on_unknown_document_fails_not_found() {
    let conn = setup();
    let presence = presence_service(&conn);
    let unknown = Uuid::new_v4();

    let err = presence.join(unknown, 1, "conn-1", None, NOW).unwrap_err();
    assert!(matches!(
        err,
        PresenceServiceError::DocumentNotFound(id) if id == unknown
    ));
}

#[test]
fn join_rejects_invalid_actor_ids() {
    let conn = setup();
    let presence = presence_service(&conn);
    let document_id = create_document(&conn, "Checked");

    let err = presence.join(document_id, 0, "conn-1", None, NOW).unwrap_err();
    assert!(matches!(
        err,
        PresenceServiceError::InvalidSpec(ValidationError::InvalidActorId(0))
    ));
}

#[test]
fn heartbeat_moves_the_clock_and_merges_partial_state() {
    let conn = setup();
    let presence = presence_service(&conn);
    let repo = SqlitePresenceRepository::try_new(&conn).unwrap();
    let document_id = create_document(&conn, "Edited");

    presence.join(document_id, 1, "conn-1", None, NOW).unwrap();

    let cursor_only = PresenceHeartbeat {
        cursor: Some(PresenceCursor {
            x: 10.0,
            y: 20.0,
            node_id: Some("root".to_string()),
        }),
        ..PresenceHeartbeat::default()
    };
    presence.heartbeat("conn-1", &cursor_only, NOW + 1_000).unwrap();

    let stored = repo.get_session("conn-1").unwrap().unwrap();
    assert_eq!(stored.last_activity_at, NOW + 1_000);
    assert_eq!(stored.cursor.as_ref().map(|cursor| cursor.x), Some(10.0));
    assert!(stored.viewport.is_none());
    assert!(!stored.is_editing);

    let editing_only = PresenceHeartbeat {
        is_editing: Some(true),
        ..PresenceHeartbeat::default()
    };
    presence.heartbeat("conn-1", &editing_only, NOW + 2_000).unwrap();

    let stored = repo.get_session("conn-1").unwrap().unwrap();
    assert_eq!(stored.last_activity_at, NOW + 2_000);
    assert!(stored.is_editing);
    // Fields absent from the heartbeat keep their previous value.
    assert_eq!(
        stored.cursor.as_ref().and_then(|cursor| cursor.node_id.clone()),
        Some("root".to_string())
    );

    let viewport_only = PresenceHeartbeat {
        viewport: Some(Viewport {
            x: -40.0,
            y: 12.5,
            zoom: 1.5,
        }),
        ..PresenceHeartbeat::default()
    };
    presence.heartbeat("conn-1", &viewport_only, NOW + 3_000).unwrap();

    let stored = repo.get_session("conn-1").unwrap().unwrap();
    assert_eq!(stored.viewport.map(|viewport| viewport.zoom), Some(1.5));
}

#[test]
fn heartbeat_for_missing_session_forces_rejoin() {
    let conn = setup();
    let presence = presence_service(&conn);
    let document_id = create_document(&conn, "Dropped");

    let err = presence
        .heartbeat("ghost", &PresenceHeartbeat::default(), NOW)
        .unwrap_err();
    assert!(matches!(
        err,
        PresenceServiceError::SessionNotFound(id) if id == "ghost"
    ));

    presence.join(document_id, 1, "conn-1", None, NOW).unwrap();
    presence.leave("conn-1").unwrap();

    let err = presence
        .heartbeat("conn-1", &PresenceHeartbeat::default(), NOW + 500)
        .unwrap_err();
    assert!(matches!(err, PresenceServiceError::SessionNotFound(_)));

    // Leaving frees the id for a clean rejoin.
    let rejoined = presence
        .join(document_id, 1, "conn-1", None, NOW + 1_000)
        .unwrap();
    assert_eq!(rejoined.connected_at, NOW + 1_000);
}

#[test]
fn leave_removes_the_session_immediately() {
    let conn = setup();
    let presence = presence_service(&conn);
    let document_id = create_document(&conn, "Left");

    presence.join(document_id, 1, "conn-1", None, NOW).unwrap();
    assert_eq!(presence.list_active(document_id, NOW).unwrap().len(), 1);

    presence.leave("conn-1").unwrap();
    assert!(presence.list_active(document_id, NOW).unwrap().is_empty());

    let err = presence.leave("conn-1").unwrap_err();
    assert!(matches!(err, PresenceServiceError::SessionNotFound(_)));
}

#[test]
fn tabs_of_the_same_actor_stay_independent() {
    let conn = setup();
    let presence = presence_service(&conn);
    let document_id = create_document(&conn, "Tabbed");

    presence.join(document_id, 1, "tab-a", None, NOW).unwrap();
    presence.join(document_id, 1, "tab-b", None, NOW).unwrap();

    presence.leave("tab-a").unwrap();

    let active = presence.list_active(document_id, NOW).unwrap();
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].connection_id, "tab-b");

    presence
        .heartbeat("tab-b", &PresenceHeartbeat::default(), NOW + 100)
        .unwrap();
}

#[test]
fn active_listing_is_windowed_and_most_recent_first() {
    let conn = setup();
    let presence = presence_service(&conn);
    let document_id = create_document(&conn, "Crowded");
    let other_document = create_document(&conn, "Elsewhere");

    presence
        .join(document_id, 1, "conn-stale", None, NOW - PRESENCE_ACTIVE_WINDOW_MS - 1)
        .unwrap();
    presence
        .join(document_id, 2, "conn-edge", None, NOW - PRESENCE_ACTIVE_WINDOW_MS)
        .unwrap();
    presence
        .join(document_id, 3, "conn-alpha", None, NOW - 100_000)
        .unwrap();
    presence
        .join(document_id, 4, "conn-beta", None, NOW - 100_000)
        .unwrap();
    presence.join(other_document, 5, "conn-other", None, NOW).unwrap();

    let active = presence.list_active(document_id, NOW).unwrap();
    let ids: Vec<&str> = active
        .iter()
        .map(|session| session.connection_id.as_str())
        .collect();

    // Window is inclusive at its edge; ties order by connection id.
    assert_eq!(ids, vec!["conn-alpha", "conn-beta", "conn-edge"]);
}

#[test]
fn idle_sweep_removes_only_stale_sessions() {
    let conn = setup();
    let presence = presence_service(&conn);
    let repo = SqlitePresenceRepository::try_new(&conn).unwrap();
    let document_id = create_document(&conn, "Swept");

    presence
        .join(document_id, 1, "conn-stale", None, NOW - PRESENCE_IDLE_TTL_MS - 1)
        .unwrap();
    presence
        .join(document_id, 2, "conn-edge", None, NOW - PRESENCE_IDLE_TTL_MS)
        .unwrap();
    presence.join(document_id, 3, "conn-fresh", None, NOW - 10).unwrap();

    let removed = presence.expire_idle(NOW).unwrap();
    assert_eq!(removed, 1);

    assert!(repo.get_session("conn-stale").unwrap().is_none());
    assert!(repo.get_session("conn-edge").unwrap().is_some());
    assert!(repo.get_session("conn-fresh").unwrap().is_some());

    let err = presence
        .heartbeat("conn-stale", &PresenceHeartbeat::default(), NOW)
        .unwrap_err();
    assert!(matches!(err, PresenceServiceError::SessionNotFound(_)));
}
