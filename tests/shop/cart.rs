use rusqlite::Connection;
use shopfront::core::db::{db_connect, initialize_db};
use shopfront::core::error::ShopError;
use shopfront::core::time::now_secs;
use shopfront::shop::accounts::register;
use shopfront::shop::cart::{
    add_item, clear, load, load_user_lines, remove_item, set_quantity, view, CartLine, CartRef,
};
use shopfront::shop::catalog::{create_category, create_product, update_product, Product, ProductInput};
use shopfront::shop::sessions;
use tempfile::tempdir;

const TTL: i64 = 3600;

fn test_db() -> (tempfile::TempDir, Connection) {
    let tmp = tempdir().unwrap();
    let path = tmp.path().join("shop.db");
    initialize_db(&path).unwrap();
    let conn = db_connect(&path).unwrap();
    (tmp, conn)
}

fn product(conn: &Connection, name: &str, price: i64, stock: i64) -> Product {
    create_product(
        conn,
        &ProductInput {
            name: name.to_string(),
            price_cents: price,
            stock,
            is_active: true,
            ..ProductInput::default()
        },
    )
    .unwrap()
}

fn quantities(lines: &[CartLine]) -> Vec<(i64, i64)> {
    lines.iter().map(|l| (l.product_id, l.quantity)).collect()
}

#[test]
fn test_anonymous_cart_lives_in_session() {
    let (_tmp, conn) = test_db();
    let beans = product(&conn, "Beans", 1500, 10);
    let session = sessions::create(&conn, TTL, now_secs()).unwrap();
    let cart = CartRef::Session(&session.id);

    assert_eq!(add_item(&conn, cart, beans.id, 2).unwrap(), 2);
    assert_eq!(add_item(&conn, cart, beans.id, 3).unwrap(), 5);
    assert_eq!(quantities(&load(&conn, cart).unwrap()), vec![(beans.id, 5)]);

    let v = view(&conn, &load(&conn, cart).unwrap()).unwrap();
    assert_eq!(v.subtotal_cents, 7500);
    assert_eq!(v.item_count, 5);
}

#[test]
fn test_quantities_clamp_to_stock() {
    let (_tmp, conn) = test_db();
    let kettle = product(&conn, "Kettle", 4500, 3);
    let user = register(&conn, "ada@example.com", "Ada", "correct horse").unwrap();
    let cart = CartRef::User(user.id);

    assert_eq!(add_item(&conn, cart, kettle.id, 10).unwrap(), 3);
    assert_eq!(set_quantity(&conn, cart, kettle.id, 2).unwrap(), 2);
    assert_eq!(set_quantity(&conn, cart, kettle.id, 99).unwrap(), 3);
    assert_eq!(set_quantity(&conn, cart, kettle.id, 0).unwrap(), 0);
    assert!(load_user_lines(&conn, user.id).unwrap().is_empty());
}

#[test]
fn test_out_of_stock_and_bad_quantities_rejected() {
    let (_tmp, conn) = test_db();
    let filters = product(&conn, "Filters", 600, 0);
    let beans = product(&conn, "Beans", 1500, 10);
    let session = sessions::create(&conn, TTL, now_secs()).unwrap();
    let cart = CartRef::Session(&session.id);

    assert!(matches!(
        add_item(&conn, cart, filters.id, 1),
        Err(ShopError::OutOfStock(_))
    ));
    assert!(matches!(
        add_item(&conn, cart, beans.id, 0),
        Err(ShopError::Validation(_))
    ));
    assert!(matches!(
        add_item(&conn, cart, 9999, 1),
        Err(ShopError::NotFound(_))
    ));
    assert!(load(&conn, cart).unwrap().is_empty());
}

#[test]
fn test_remove_and_clear() {
    let (_tmp, conn) = test_db();
    let a = product(&conn, "A", 100, 10);
    let b = product(&conn, "B", 200, 10);
    let user = register(&conn, "ada@example.com", "Ada", "correct horse").unwrap();
    let cart = CartRef::User(user.id);
    add_item(&conn, cart, a.id, 1).unwrap();
    add_item(&conn, cart, b.id, 1).unwrap();

    remove_item(&conn, cart, a.id).unwrap();
    assert_eq!(quantities(&load(&conn, cart).unwrap()), vec![(b.id, 1)]);
    clear(&conn, cart).unwrap();
    assert!(load(&conn, cart).unwrap().is_empty());
}

#[test]
fn test_view_skips_deactivated_products() {
    let (_tmp, conn) = test_db();
    let a = product(&conn, "A", 100, 10);
    let b = product(&conn, "B", 200, 10);
    let session = sessions::create(&conn, TTL, now_secs()).unwrap();
    let cart = CartRef::Session(&session.id);
    add_item(&conn, cart, a.id, 1).unwrap();
    add_item(&conn, cart, b.id, 2).unwrap();
    update_product(
        &conn,
        b.id,
        &ProductInput {
            name: "B".into(),
            price_cents: 200,
            stock: 10,
            is_active: false,
            ..ProductInput::default()
        },
    )
    .unwrap();

    let v = view(&conn, &load(&conn, cart).unwrap()).unwrap();
    assert_eq!(v.items.len(), 1);
    assert_eq!(v.subtotal_cents, 100);
}

#[test]
fn test_login_merges_session_cart_into_saved_cart() {
    let (_tmp, conn) = test_db();
    let beans = product(&conn, "Beans", 1500, 10);
    let tea = product(&conn, "Tea", 900, 10);
    let kettle = product(&conn, "Kettle", 4500, 4);
    let user = register(&conn, "ada@example.com", "Ada", "correct horse").unwrap();

    // Saved from an earlier visit.
    add_item(&conn, CartRef::User(user.id), beans.id, 2).unwrap();
    add_item(&conn, CartRef::User(user.id), kettle.id, 3).unwrap();

    let session = sessions::create(&conn, TTL, now_secs()).unwrap();
    let anon = CartRef::Session(&session.id);
    add_item(&conn, anon, tea.id, 1).unwrap();
    add_item(&conn, anon, beans.id, 1).unwrap();
    add_item(&conn, anon, kettle.id, 2).unwrap();

    let merged = sessions::login(&conn, &session.id, user.id).unwrap();
    // Saved order first, quantities summed, kettle clamped to its stock of 4.
    assert_eq!(
        quantities(&merged),
        vec![(beans.id, 3), (kettle.id, 4), (tea.id, 1)]
    );
    assert_eq!(quantities(&load_user_lines(&conn, user.id).unwrap()), quantities(&merged));
    assert!(sessions::load_cart(&conn, &session.id).unwrap().is_empty());

    let current = sessions::get(&conn, &session.id, now_secs()).unwrap().unwrap();
    assert_eq!(current.user_id, Some(user.id));
}

#[test]
fn test_login_with_empty_session_cart_keeps_saved_cart() {
    let (_tmp, conn) = test_db();
    let beans = product(&conn, "Beans", 1500, 10);
    let user = register(&conn, "ada@example.com", "Ada", "correct horse").unwrap();
    add_item(&conn, CartRef::User(user.id), beans.id, 2).unwrap();

    let session = sessions::create(&conn, TTL, now_secs()).unwrap();
    let merged = sessions::login(&conn, &session.id, user.id).unwrap();
    assert_eq!(quantities(&merged), vec![(beans.id, 2)]);
}

#[test]
fn test_logout_leaves_saved_cart_alone() {
    let (_tmp, conn) = test_db();
    let beans = product(&conn, "Beans", 1500, 10);
    let user = register(&conn, "ada@example.com", "Ada", "correct horse").unwrap();
    let session = sessions::create(&conn, TTL, now_secs()).unwrap();
    sessions::login(&conn, &session.id, user.id).unwrap();
    add_item(&conn, CartRef::User(user.id), beans.id, 2).unwrap();

    sessions::logout(&conn, &session.id).unwrap();
    let current = sessions::get(&conn, &session.id, now_secs()).unwrap().unwrap();
    assert_eq!(current.user_id, None);
    assert_eq!(load_user_lines(&conn, user.id).unwrap().len(), 1);
}
