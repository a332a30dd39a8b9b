use rusqlite::Connection;
use shopfront::core::db::{db_connect, initialize_db};
use shopfront::shop::sessions::{
    self, create, get, load_or_create, purge_expired, push_flash, take_flash, Flash, FlashKind,
};
use tempfile::tempdir;

const TTL: i64 = 3600;
const NOW: i64 = 1_700_000_000;

fn test_db() -> (tempfile::TempDir, Connection) {
    let tmp = tempdir().unwrap();
    let path = tmp.path().join("shop.db");
    initialize_db(&path).unwrap();
    let conn = db_connect(&path).unwrap();
    (tmp, conn)
}

fn session_count(conn: &Connection) -> i64 {
    conn.query_row("SELECT COUNT(*) FROM sessions", [], |r| r.get(0))
        .unwrap()
}

#[test]
fn test_purge_removes_only_expired_sessions() {
    let (_tmp, conn) = test_db();
    let old = create(&conn, TTL, NOW - 2 * TTL).unwrap();
    let edge = create(&conn, TTL, NOW - TTL).unwrap();
    let live = create(&conn, TTL, NOW).unwrap();

    assert_eq!(purge_expired(&conn, NOW).unwrap(), 2);
    assert_eq!(session_count(&conn), 1);
    assert!(get(&conn, &old.id, NOW).unwrap().is_none());
    assert!(get(&conn, &edge.id, NOW).unwrap().is_none());
    assert_eq!(get(&conn, &live.id, NOW).unwrap().unwrap().id, live.id);
    assert_eq!(purge_expired(&conn, NOW).unwrap(), 0);
}

#[test]
fn test_expired_cookie_starts_a_new_session() {
    let (_tmp, conn) = test_db();
    let old = create(&conn, TTL, NOW - 2 * TTL).unwrap();

    let (session, created) = load_or_create(&conn, Some(&old.id), TTL, NOW).unwrap();
    assert!(created);
    assert_ne!(session.id, old.id);

    let (again, created) = load_or_create(&conn, Some(&session.id), TTL, NOW).unwrap();
    assert!(!created);
    assert_eq!(again.id, session.id);
}

#[test]
fn test_flashes_are_shown_once() {
    let (_tmp, conn) = test_db();
    let session = create(&conn, TTL, NOW).unwrap();
    assert!(take_flash(&conn, &session.id).unwrap().is_empty());

    push_flash(&conn, &session.id, Flash::info("Added to cart.")).unwrap();
    push_flash(&conn, &session.id, Flash::error("Coupon expired.")).unwrap();

    let shown = take_flash(&conn, &session.id).unwrap();
    assert_eq!(
        shown.iter().map(|f| f.kind).collect::<Vec<_>>(),
        vec![FlashKind::Info, FlashKind::Error]
    );
    assert_eq!(shown[0].text, "Added to cart.");
    assert!(take_flash(&conn, &session.id).unwrap().is_empty());
}

#[test]
fn test_flashes_are_per_session() {
    let (_tmp, conn) = test_db();
    let a = create(&conn, TTL, NOW).unwrap();
    let b = create(&conn, TTL, NOW).unwrap();
    sessions::push_flash(&conn, &a.id, Flash::info("hello")).unwrap();

    assert!(take_flash(&conn, &b.id).unwrap().is_empty());
    assert_eq!(take_flash(&conn, &a.id).unwrap().len(), 1);
}
