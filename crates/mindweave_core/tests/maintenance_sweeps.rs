use mindweave_core::db::open_db_in_memory;
use mindweave_core::model::activity::{ActivityKind, ACTIVITY_RETENTION_MS};
use mindweave_core::model::document::{CollaboratorRole, DocumentSpec};
use mindweave_core::model::graph::{GraphSnapshot, Node, Position};
use mindweave_core::model::history::{HistoryAction, DEFAULT_SNAPSHOT_EVERY, HISTORY_RETENTION_MS};
use mindweave_core::model::invitation::INVITATION_TTL_MS;
use mindweave_core::model::presence::PRESENCE_IDLE_TTL_MS;
use mindweave_core::repo::activity_repo::{ActivityRepository, SqliteActivityRepository};
use mindweave_core::repo::document_repo::SqliteDocumentRepository;
use mindweave_core::repo::history_repo::{HistoryRepository, SqliteHistoryRepository};
use mindweave_core::repo::invitation_repo::SqliteInvitationRepository;
use mindweave_core::repo::presence_repo::SqlitePresenceRepository;
use mindweave_core::search::fts::FtsDocumentIndex;
use mindweave_core::service::collaboration_service::{CollaborationService, InviteRequest};
use mindweave_core::service::document_service::DocumentService;
use mindweave_core::service::maintenance::{run_ttl_sweeps, SweepReport};
use mindweave_core::service::presence_service::PresenceService;
use rusqlite::{params, Connection};
use uuid::Uuid;

const NOW: i64 = 1_755_000_000_000;

fn setup() -> Connection {
    open_db_in_memory().unwrap()
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

fn invite(conn: &Connection, document_id: Uuid, email: &str, now_ms: i64) {
    let service = CollaborationService::new(
        SqliteInvitationRepository::try_new(conn).unwrap(),
        SqliteDocumentRepository::try_new(conn).unwrap(),
        SqliteActivityRepository::try_new(conn).unwrap(),
    );
    let request = InviteRequest {
        email: email.to_string(),
        role: CollaboratorRole::Editor,
        invited_actor_id: None,
        message: None,
    };
    service.invite(document_id, 1, &request, now_ms).unwrap();
}

fn pin_all_history(conn: &Connection, created_at: i64) {
    conn.execute(
        "UPDATE document_history SET created_at = ?1;",
        params![created_at],
    )
    .unwrap();
}

fn pin_history_entry(conn: &Connection, seq: i64, created_at: i64) {
    conn.execute(
        "UPDATE document_history SET created_at = ?2 WHERE seq = ?1;",
        params![seq, created_at],
    )
    .unwrap();
}

fn pin_all_activity(conn: &Connection, created_at: i64) {
    conn.execute(
        "UPDATE document_activity SET created_at = ?1;",
        params![created_at],
    )
    .unwrap();
}

fn pin_activity_entry(conn: &Connection, seq: i64, created_at: i64) {
    conn.execute(
        "UPDATE document_activity SET created_at = ?2 WHERE seq = ?1;",
        params![seq, created_at],
    )
    .unwrap();
}

fn count(conn: &Connection, sql: &str) -> i64 {
    conn.query_row(sql, [], |row| row.get(0)).unwrap()
}

#[test]
fn one_pass_sweeps_every_collection() {
    let conn = setup();
    let document_id = create_document(&conn, "Swept");

    let history = SqliteHistoryRepository::try_new(&conn).unwrap();
    let stale_entry = history
        .append_entry(
            document_id,
            1,
            HistoryAction::Update,
            None,
            &GraphSnapshot::empty(),
            DEFAULT_SNAPSHOT_EVERY,
        )
        .unwrap();

    let activity = SqliteActivityRepository::try_new(&conn).unwrap();
    let stale_view = activity
        .record_activity(document_id, 1, ActivityKind::Viewed, None)
        .unwrap();
    let stale_comment = activity
        .record_activity(document_id, 2, ActivityKind::Commented, None)
        .unwrap();

    pin_all_history(&conn, NOW);
    pin_history_entry(&conn, stale_entry.seq, NOW - HISTORY_RETENTION_MS - 1_000);
    pin_all_activity(&conn, NOW);
    pin_activity_entry(&conn, stale_view, NOW - ACTIVITY_RETENTION_MS - 1_000);
    pin_activity_entry(&conn, stale_comment, NOW - ACTIVITY_RETENTION_MS - 1_000);

    let presence = PresenceService::new(SqlitePresenceRepository::try_new(&conn).unwrap());
    presence
        .join(document_id, 1, "conn-idle", None, NOW - PRESENCE_IDLE_TTL_MS - 1)
        .unwrap();
    presence.join(document_id, 2, "conn-live", None, NOW).unwrap();

    invite(&conn, document_id, "stale@example.com", NOW - INVITATION_TTL_MS - 1_000);
    invite(&conn, document_id, "fresh@example.com", NOW);

    let report = run_ttl_sweeps(
        &SqliteHistoryRepository::try_new(&conn).unwrap(),
        &SqliteActivityRepository::try_new(&conn).unwrap(),
        &SqlitePresenceRepository::try_new(&conn).unwrap(),
        &SqliteInvitationRepository::try_new(&conn).unwrap(),
        NOW,
    );

    assert_eq!(
        report,
        SweepReport {
            history_removed: 1,
            activity_removed: 2,
            presence_removed: 1,
            invitations_expired: 1,
            failures: 0,
        }
    );

    assert_eq!(count(&conn, "SELECT COUNT(*) FROM document_history;"), 1);
    assert_eq!(count(&conn, "SELECT COUNT(*) FROM document_activity;"), 1);
    assert_eq!(count(&conn, "SELECT COUNT(*) FROM presence_sessions;"), 1);
    let survivor: String = conn
        .query_row("SELECT connection_id FROM presence_sessions;", [], |row| {
            row.get(0)
        })
        .unwrap();
    assert_eq!(survivor, "conn-live");
    assert_eq!(
        count(&conn, "SELECT COUNT(*) FROM invitations WHERE status = 'expired';"),
        1
    );
    assert_eq!(
        count(&conn, "SELECT COUNT(*) FROM invitations WHERE status = 'pending';"),
        1
    );
}

#[test]
fn a_second_pass_with_the_same_clock_removes_nothing() {
    let conn = setup();
    let document_id = create_document(&conn, "Twice");

    pin_all_history(&conn, NOW - HISTORY_RETENTION_MS - 1_000);
    pin_all_activity(&conn, NOW - ACTIVITY_RETENTION_MS - 1_000);
    invite(&conn, document_id, "stale@example.com", NOW - INVITATION_TTL_MS - 1_000);

    let history = SqliteHistoryRepository::try_new(&conn).unwrap();
    let activity = SqliteActivityRepository::try_new(&conn).unwrap();
    let presence = SqlitePresenceRepository::try_new(&conn).unwrap();
    let invitations = SqliteInvitationRepository::try_new(&conn).unwrap();

    let first = run_ttl_sweeps(&history, &activity, &presence, &invitations, NOW);
    assert_eq!(first.history_removed, 1);
    assert_eq!(first.activity_removed, 1);
    assert_eq!(first.invitations_expired, 1);
    assert_eq!(first.failures, 0);

    let second = run_ttl_sweeps(&history, &activity, &presence, &invitations, NOW);
    assert_eq!(second, SweepReport::default());
}

#[test]
fn an_empty_database_sweeps_cleanly() {
    let conn = setup();

    let report = run_ttl_sweeps(
        &SqliteHistoryRepository::try_new(&conn).unwrap(),
        &SqliteActivityRepository::try_new(&conn).unwrap(),
        &SqlitePresenceRepository::try_new(&conn).unwrap(),
        &SqliteInvitationRepository::try_new(&conn).unwrap(),
        NOW,
    );

    assert_eq!(report, SweepReport::default());
}

#[test]
fn a_failing_sweep_never_stops_the_others() {
    let conn = setup();
    let document_id = create_document(&conn, "Partial");

    pin_all_history(&conn, NOW - HISTORY_RETENTION_MS - 1_000);
    pin_all_activity(&conn, NOW - ACTIVITY_RETENTION_MS - 1_000);
    invite(&conn, document_id, "stale@example.com", NOW - INVITATION_TTL_MS - 1_000);

    let history = SqliteHistoryRepository::try_new(&conn).unwrap();
    let activity = SqliteActivityRepository::try_new(&conn).unwrap();
    let presence = SqlitePresenceRepository::try_new(&conn).unwrap();
    let invitations = SqliteInvitationRepository::try_new(&conn).unwrap();

    conn.execute_batch("DROP TABLE presence_sessions;").unwrap();

    let report = run_ttl_sweeps(&history, &activity, &presence, &invitations, NOW);

    assert_eq!(report.failures, 1);
    assert_eq!(report.history_removed, 1);
    assert_eq!(report.activity_removed, 1);
    assert_eq!(report.presence_removed, 0);
    assert_eq!(report.invitations_expired, 1);
}
