use rusqlite::Connection;
use shopfront::core::db::{db_connect, initialize_db};
use shopfront::core::error::ShopError;
use shopfront::shop::coupons::{
    create_coupon, delete_coupon, find_by_code, list_coupons, resolve, toggle_active, CouponKind,
    NewCoupon,
};
use tempfile::tempdir;

const NOW: i64 = 1_700_000_000;

fn test_db() -> (tempfile::TempDir, Connection) {
    let tmp = tempdir().unwrap();
    let path = tmp.path().join("shop.db");
    initialize_db(&path).unwrap();
    let conn = db_connect(&path).unwrap();
    (tmp, conn)
}

fn new_coupon(code: &str, kind: CouponKind, value: i64) -> NewCoupon {
    NewCoupon {
        code: code.to_string(),
        kind,
        value,
        min_subtotal_cents: 0,
        expires_at: None,
        usage_limit: None,
    }
}

fn is_validation<T>(r: Result<T, ShopError>) -> bool {
    matches!(r, Err(ShopError::Validation(_)))
}

#[test]
fn test_create_normalizes_code() {
    let (_tmp, conn) = test_db();
    let c = create_coupon(&conn, &new_coupon("  spring-5 ", CouponKind::Fixed, 500)).unwrap();
    assert_eq!(c.code, "SPRING-5");
    assert!(c.is_active);
    assert_eq!(c.used_count, 0);
    assert_eq!(find_by_code(&conn, "spring-5").unwrap().unwrap().id, c.id);
}

#[test]
fn test_create_validates_code_and_value() {
    let (_tmp, conn) = test_db();
    assert!(is_validation(create_coupon(&conn, &new_coupon("", CouponKind::Fixed, 100))));
    assert!(is_validation(create_coupon(&conn, &new_coupon("TEN OFF", CouponKind::Fixed, 100))));
    assert!(is_validation(create_coupon(&conn, &new_coupon("ZERO", CouponKind::Fixed, 0))));
    assert!(is_validation(create_coupon(&conn, &new_coupon("HUGE", CouponKind::Percent, 101))));
    assert!(create_coupon(&conn, &new_coupon("ALL", CouponKind::Percent, 100)).is_ok());
    // Fixed amounts have no upper bound.
    assert!(create_coupon(&conn, &new_coupon("BIG", CouponKind::Fixed, 10_000)).is_ok());

    let mut bad_limit = new_coupon("LIMITED", CouponKind::Fixed, 100);
    bad_limit.usage_limit = Some(0);
    assert!(is_validation(create_coupon(&conn, &bad_limit)));
    let mut bad_min = new_coupon("MIN", CouponKind::Fixed, 100);
    bad_min.min_subtotal_cents = -1;
    assert!(is_validation(create_coupon(&conn, &bad_min)));

    assert_eq!(list_coupons(&conn).unwrap().len(), 2);
}

#[test]
fn test_duplicate_code_conflicts() {
    let (_tmp, conn) = test_db();
    create_coupon(&conn, &new_coupon("WELCOME10", CouponKind::Percent, 10)).unwrap();
    assert!(matches!(
        create_coupon(&conn, &new_coupon("welcome10", CouponKind::Fixed, 100)),
        Err(ShopError::Conflict(_))
    ));
}

#[test]
fn test_toggle_and_delete() {
    let (_tmp, conn) = test_db();
    let c = create_coupon(&conn, &new_coupon("WELCOME10", CouponKind::Percent, 10)).unwrap();

    assert!(!toggle_active(&conn, c.id).unwrap());
    assert!(is_validation(resolve(&conn, "WELCOME10", 2000, NOW)));
    assert!(toggle_active(&conn, c.id).unwrap());
    assert_eq!(resolve(&conn, "welcome10", 2000, NOW).unwrap().id, c.id);

    delete_coupon(&conn, c.id).unwrap();
    assert!(find_by_code(&conn, "WELCOME10").unwrap().is_none());
    assert!(matches!(delete_coupon(&conn, c.id), Err(ShopError::NotFound(_))));
    assert!(matches!(toggle_active(&conn, c.id), Err(ShopError::NotFound(_))));
}
