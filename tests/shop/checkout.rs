use rusqlite::Connection;
use shopfront::core::db::{db_connect, initialize_db};
use shopfront::core::error::ShopError;
use shopfront::core::time::now_secs;
use shopfront::shop::accounts::{add_address, register, NewAddress, User};
use shopfront::shop::cart::{add_item, load_user_lines, prune, CartLine, CartRef};
use shopfront::shop::catalog::{create_product, get_product, update_product, Product, ProductInput};
use shopfront::shop::checkout::{place_order, quote, CheckoutRequest, Pricing};
use shopfront::shop::coupons::{create_coupon, find_by_code, CouponKind, NewCoupon};
use shopfront::shop::orders::{self, OrderStatus};
use tempfile::tempdir;

const PRICING: Pricing = Pricing {
    shipping_flat_cents: 599,
    free_shipping_threshold_cents: 5000,
    tax_rate_bps: 800,
};

struct Fixture {
    _tmp: tempfile::TempDir,
    conn: Connection,
    user: User,
    address_id: i64,
    beans: Product,
    kettle: Product,
}

fn fixture() -> Fixture {
    let tmp = tempdir().unwrap();
    let path = tmp.path().join("shop.db");
    initialize_db(&path).unwrap();
    let conn = db_connect(&path).unwrap();
    let user = register(&conn, "ada@example.com", "Ada", "correct horse").unwrap();
    let address = add_address(
        &conn,
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
    let beans = product(&conn, "Beans", 1500, 10);
    let kettle = product(&conn, "Kettle", 4500, 2);
    Fixture {
        _tmp: tmp,
        conn,
        user,
        address_id: address.id,
        beans,
        kettle,
    }
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

fn order_count(conn: &Connection) -> i64 {
    conn.query_row("SELECT COUNT(*) FROM orders", [], |row| row.get(0))
        .unwrap()
}

fn welcome_coupon(conn: &Connection, usage_limit: Option<i64>) {
    create_coupon(
        conn,
        &NewCoupon {
            code: "welcome10".into(),
            kind: CouponKind::Percent,
            value: 10,
            min_subtotal_cents: 0,
            expires_at: None,
            usage_limit,
        },
    )
    .unwrap();
}

#[test]
fn test_place_order_snapshots_prices_and_decrements_stock() {
    let f = fixture();
    add_item(&f.conn, CartRef::User(f.user.id), f.beans.id, 2).unwrap();
    let lines = load_user_lines(&f.conn, f.user.id).unwrap();

    let detail = place_order(
        &f.conn,
        &CheckoutRequest {
            user_id: f.user.id,
            address_id: f.address_id,
            lines: &lines,
            coupon_code: None,
            now: now_secs(),
        },
        &PRICING,
    )
    .unwrap();

    let o = &detail.order;
    assert_eq!(o.status, OrderStatus::Pending);
    assert_eq!(o.subtotal_cents, 3000);
    assert_eq!(o.shipping_cents, 599);
    assert_eq!(o.tax_cents, 240);
    assert_eq!(o.total_cents, 3000 + 599 + 240);
    assert!(o.ship_to.contains("1 Main St"));
    assert_eq!(detail.items.len(), 1);
    assert_eq!(detail.items[0].unit_price_cents, 1500);
    assert_eq!(detail.customer_email, "ada@example.com");

    assert_eq!(get_product(&f.conn, f.beans.id).unwrap().stock, 8);
    assert!(load_user_lines(&f.conn, f.user.id).unwrap().is_empty());

    // Later price changes do not touch the order.
    update_product(
        &f.conn,
        f.beans.id,
        &ProductInput {
            name: "Beans".into(),
            price_cents: 9999,
            stock: 8,
            is_active: true,
            ..ProductInput::default()
        },
    )
    .unwrap();
    let again = orders::get(&f.conn, &o.number).unwrap();
    assert_eq!(again.items[0].unit_price_cents, 1500);
    assert_eq!(again.order.total_cents, o.total_cents);
}

#[test]
fn test_out_of_stock_rolls_back_everything() {
    let f = fixture();
    welcome_coupon(&f.conn, None);
    add_item(&f.conn, CartRef::User(f.user.id), f.beans.id, 1).unwrap();
    // More kettles than exist, as if another shopper bought them first.
    let lines = vec![
        CartLine {
            product_id: f.beans.id,
            quantity: 1,
        },
        CartLine {
            product_id: f.kettle.id,
            quantity: 3,
        },
    ];

    let result = place_order(
        &f.conn,
        &CheckoutRequest {
            user_id: f.user.id,
            address_id: f.address_id,
            lines: &lines,
            coupon_code: Some("WELCOME10"),
            now: now_secs(),
        },
        &PRICING,
    );
    assert!(matches!(result, Err(ShopError::OutOfStock(name)) if name == "Kettle"));

    assert_eq!(order_count(&f.conn), 0);
    assert_eq!(get_product(&f.conn, f.beans.id).unwrap().stock, 10);
    assert_eq!(get_product(&f.conn, f.kettle.id).unwrap().stock, 2);
    assert_eq!(load_user_lines(&f.conn, f.user.id).unwrap().len(), 1);
    assert_eq!(find_by_code(&f.conn, "WELCOME10").unwrap().unwrap().used_count, 0);
}

#[test]
fn test_coupon_applied_and_counted() {
    let f = fixture();
    welcome_coupon(&f.conn, Some(1));
    let lines = vec![CartLine {
        product_id: f.kettle.id,
        quantity: 2,
    }];
    let request = CheckoutRequest {
        user_id: f.user.id,
        address_id: f.address_id,
        lines: &lines,
        coupon_code: Some("welcome10"),
        now: now_secs(),
    };

    let detail = place_order(&f.conn, &request, &PRICING).unwrap();
    assert_eq!(detail.order.subtotal_cents, 9000);
    assert_eq!(detail.order.discount_cents, 900);
    assert_eq!(detail.order.shipping_cents, 0);
    assert_eq!(detail.order.coupon_code.as_deref(), Some("WELCOME10"));
    assert_eq!(find_by_code(&f.conn, "WELCOME10").unwrap().unwrap().used_count, 1);

    // The single use is spent.
    let lines = vec![CartLine {
        product_id: f.beans.id,
        quantity: 1,
    }];
    let second = place_order(
        &f.conn,
        &CheckoutRequest {
            lines: &lines,
            ..request
        },
        &PRICING,
    );
    assert!(matches!(second, Err(ShopError::Validation(_))));
    assert_eq!(order_count(&f.conn), 1);
}

#[test]
fn test_checkout_requires_cart_and_own_address() {
    let f = fixture();
    let empty: Vec<CartLine> = Vec::new();
    let result = place_order(
        &f.conn,
        &CheckoutRequest {
            user_id: f.user.id,
            address_id: f.address_id,
            lines: &empty,
            coupon_code: None,
            now: now_secs(),
        },
        &PRICING,
    );
    assert!(matches!(result, Err(ShopError::Validation(_))));

    let other = register(&f.conn, "bob@example.com", "Bob", "bobpassword").unwrap();
    let lines = vec![CartLine {
        product_id: f.beans.id,
        quantity: 1,
    }];
    let result = place_order(
        &f.conn,
        &CheckoutRequest {
            user_id: other.id,
            address_id: f.address_id,
            lines: &lines,
            coupon_code: None,
            now: now_secs(),
        },
        &PRICING,
    );
    assert!(matches!(result, Err(ShopError::Validation(_))));
    assert_eq!(order_count(&f.conn), 0);
}

#[test]
fn test_inactive_product_blocks_checkout() {
    let f = fixture();
    update_product(
        &f.conn,
        f.beans.id,
        &ProductInput {
            name: "Beans".into(),
            price_cents: 1500,
            stock: 10,
            is_active: false,
            ..ProductInput::default()
        },
    )
    .unwrap();
    let lines = vec![CartLine {
        product_id: f.beans.id,
        quantity: 1,
    }];
    let result = place_order(
        &f.conn,
        &CheckoutRequest {
            user_id: f.user.id,
            address_id: f.address_id,
            lines: &lines,
            coupon_code: None,
            now: now_secs(),
        },
        &PRICING,
    );
    assert!(matches!(result, Err(ShopError::Validation(_))));
}

#[test]
fn test_deactivated_product_is_pruned_before_checkout() {
    let f = fixture();
    let cart = CartRef::User(f.user.id);
    add_item(&f.conn, cart, f.beans.id, 1).unwrap();
    add_item(&f.conn, cart, f.kettle.id, 1).unwrap();
    update_product(
        &f.conn,
        f.beans.id,
        &ProductInput {
            name: "Beans".into(),
            price_cents: 1500,
            stock: 10,
            is_active: false,
            ..ProductInput::default()
        },
    )
    .unwrap();

    let view = prune(&f.conn, cart).unwrap();
    assert_eq!(view.items.len(), 1);
    assert_eq!(view.items[0].product_id, f.kettle.id);
    let saved = load_user_lines(&f.conn, f.user.id).unwrap();
    assert_eq!(saved, view.lines());

    let lines = prune(&f.conn, cart).unwrap().lines();
    let detail = place_order(
        &f.conn,
        &CheckoutRequest {
            user_id: f.user.id,
            address_id: f.address_id,
            lines: &lines,
            coupon_code: None,
            now: now_secs(),
        },
        &PRICING,
    )
    .unwrap();
    assert_eq!(detail.items.len(), 1);
    assert_eq!(detail.items[0].product_id, f.kettle.id);
    assert!(load_user_lines(&f.conn, f.user.id).unwrap().is_empty());
}

#[test]
fn test_quote_free_shipping_uses_discounted_subtotal() {
    let coupon = {
        let f = fixture();
        welcome_coupon(&f.conn, None);
        find_by_code(&f.conn, "WELCOME10").unwrap().unwrap()
    };
    // 5200 - 520 = 4680, under the 5000 threshold.
    let totals = quote(5200, 2, Some(&coupon), &PRICING);
    assert_eq!(totals.discount_cents, 520);
    assert_eq!(totals.shipping_cents, 599);
    assert_eq!(totals.tax_cents, 4680 * 800 / 10_000);
    assert_eq!(totals.total_cents, 4680 + 599 + totals.tax_cents);
}
