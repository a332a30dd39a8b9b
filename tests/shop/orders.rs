use rusqlite::Connection;
use shopfront::core::db::{db_connect, initialize_db};
use shopfront::core::error::ShopError;
use shopfront::core::time::now_secs;
use shopfront::shop::accounts::{add_address, register, NewAddress, User};
use shopfront::shop::cart::CartLine;
use shopfront::shop::catalog::{create_product, delete_product, get_product, ProductInput, ProductRemoval};
use shopfront::shop::checkout::{place_order, CheckoutRequest, Pricing};
use shopfront::shop::orders::{
    cancel, get, get_for_user, list_all, list_for_user, update_status, OrderDetail, OrderStatus,
};
use tempfile::tempdir;

const PRICING: Pricing = Pricing {
    shipping_flat_cents: 500,
    free_shipping_threshold_cents: 10_000,
    tax_rate_bps: 0,
};

fn test_db() -> (tempfile::TempDir, Connection) {
    let tmp = tempdir().unwrap();
    let path = tmp.path().join("shop.db");
    initialize_db(&path).unwrap();
    let conn = db_connect(&path).unwrap();
    (tmp, conn)
}

fn customer(conn: &Connection, email: &str) -> (User, i64) {
    let user = register(conn, email, "Customer", "correct horse").unwrap();
    let address = add_address(
        conn,
        user.id,
        &NewAddress {
            line1: "1 Main St".into(),
            city: "Portland".into(),
            postal_code: "97201".into(),
            country: "US".into(),
            ..NewAddress::default()
        },
    )
    .unwrap();
    (user, address.id)
}

fn product_id(conn: &Connection, stock: i64) -> i64 {
    create_product(
        conn,
        &ProductInput {
            name: "Beans".into(),
            price_cents: 1500,
            stock,
            is_active: true,
            ..ProductInput::default()
        },
    )
    .unwrap()
    .id
}

fn order(conn: &Connection, user: &User, address_id: i64, product_id: i64, qty: i64) -> OrderDetail {
    let lines = vec![CartLine {
        product_id,
        quantity: qty,
    }];
    place_order(
        conn,
        &CheckoutRequest {
            user_id: user.id,
            address_id,
            lines: &lines,
            coupon_code: None,
            now: now_secs(),
        },
        &PRICING,
    )
    .unwrap()
}

#[test]
fn test_history_is_per_customer() {
    let (_tmp, conn) = test_db();
    let pid = product_id(&conn, 20);
    let (ada, ada_addr) = customer(&conn, "ada@example.com");
    let (bob, bob_addr) = customer(&conn, "bob@example.com");
    let first = order(&conn, &ada, ada_addr, pid, 1);
    let second = order(&conn, &ada, ada_addr, pid, 2);
    let bobs = order(&conn, &bob, bob_addr, pid, 1);

    let history = list_for_user(&conn, ada.id).unwrap();
    let numbers: Vec<&str> = history.iter().map(|o| o.number.as_str()).collect();
    assert_eq!(numbers, vec![second.order.number.as_str(), first.order.number.as_str()]);

    assert!(get_for_user(&conn, ada.id, &first.order.number).is_ok());
    assert!(matches!(
        get_for_user(&conn, ada.id, &bobs.order.number),
        Err(ShopError::NotFound(_))
    ));
    assert!(get(&conn, &bobs.order.number).is_ok());
}

#[test]
fn test_status_lifecycle() {
    let (_tmp, conn) = test_db();
    let pid = product_id(&conn, 20);
    let (ada, addr) = customer(&conn, "ada@example.com");
    let number = order(&conn, &ada, addr, pid, 1).order.number;

    assert!(matches!(
        update_status(&conn, &number, OrderStatus::Delivered),
        Err(ShopError::Validation(_))
    ));
    for next in [OrderStatus::Paid, OrderStatus::Shipped, OrderStatus::Delivered] {
        let detail = update_status(&conn, &number, next).unwrap();
        assert_eq!(detail.order.status, next);
    }
    assert!(OrderStatus::Delivered.next_allowed().is_empty());
    assert!(matches!(
        update_status(&conn, &number, OrderStatus::Cancelled),
        Err(ShopError::Validation(_))
    ));
}

#[test]
fn test_cancel_restocks_and_only_while_pending() {
    let (_tmp, conn) = test_db();
    let pid = product_id(&conn, 5);
    let (ada, addr) = customer(&conn, "ada@example.com");
    let first = order(&conn, &ada, addr, pid, 2).order.number;
    let second = order(&conn, &ada, addr, pid, 1).order.number;
    assert_eq!(get_product(&conn, pid).unwrap().stock, 2);

    let cancelled = cancel(&conn, ada.id, &first).unwrap();
    assert_eq!(cancelled.order.status, OrderStatus::Cancelled);
    assert_eq!(get_product(&conn, pid).unwrap().stock, 4);

    update_status(&conn, &second, OrderStatus::Paid).unwrap();
    assert!(matches!(
        cancel(&conn, ada.id, &second),
        Err(ShopError::Validation(_))
    ));

    // Admins may still cancel a paid order; stock comes back.
    update_status(&conn, &second, OrderStatus::Cancelled).unwrap();
    assert_eq!(get_product(&conn, pid).unwrap().stock, 5);
}

#[test]
fn test_other_customers_cannot_cancel() {
    let (_tmp, conn) = test_db();
    let pid = product_id(&conn, 5);
    let (ada, addr) = customer(&conn, "ada@example.com");
    let (bob, _) = customer(&conn, "bob@example.com");
    let number = order(&conn, &ada, addr, pid, 1).order.number;
    assert!(matches!(
        cancel(&conn, bob.id, &number),
        Err(ShopError::NotFound(_))
    ));
    assert_eq!(get(&conn, &number).unwrap().order.status, OrderStatus::Pending);
}

#[test]
fn test_admin_listing_filters_and_pages() {
    let (_tmp, conn) = test_db();
    let pid = product_id(&conn, 50);
    let (ada, addr) = customer(&conn, "ada@example.com");
    let mut numbers = Vec::new();
    for _ in 0..5 {
        numbers.push(order(&conn, &ada, addr, pid, 1).order.number);
    }
    update_status(&conn, &numbers[0], OrderStatus::Paid).unwrap();
    update_status(&conn, &numbers[1], OrderStatus::Paid).unwrap();

    let all = list_all(&conn, None, 1, 2).unwrap();
    assert_eq!(all.total, 5);
    assert_eq!(all.items.len(), 2);
    assert_eq!(all.total_pages(), 3);

    let paid = list_all(&conn, Some(OrderStatus::Paid), 1, 10).unwrap();
    assert_eq!(paid.total, 2);
    assert!(paid.items.iter().all(|o| o.status == OrderStatus::Paid));
}

#[test]
fn test_ordered_products_are_deactivated_not_deleted() {
    let (_tmp, conn) = test_db();
    let pid = product_id(&conn, 5);
    let (ada, addr) = customer(&conn, "ada@example.com");
    let number = order(&conn, &ada, addr, pid, 1).order.number;

    assert_eq!(delete_product(&conn, pid).unwrap(), ProductRemoval::Deactivated);
    assert!(!get_product(&conn, pid).unwrap().is_active);
    assert_eq!(get(&conn, &number).unwrap().items[0].product_name, "Beans");
}

#[test]
fn test_unknown_status_in_row_is_reported() {
    let (_tmp, conn) = test_db();
    let pid = product_id(&conn, 5);
    let (ada, addr) = customer(&conn, "ada@example.com");
    let placed = order(&conn, &ada, addr, pid, 1);
    conn.execute(
        "UPDATE orders SET status = 'misplaced' WHERE id = ?1",
        [placed.order.id],
    )
    .unwrap();

    assert!(matches!(
        get_for_user(&conn, ada.id, &placed.order.number),
        Err(ShopError::Sqlite(rusqlite::Error::FromSqlConversionFailure(3, _, _)))
    ));
    assert!(list_for_user(&conn, ada.id).is_err());
}
