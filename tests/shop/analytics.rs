use rusqlite::Connection;
use shopfront::core::db::{db_connect, initialize_db};
use shopfront::core::time::{day_start, SECS_PER_DAY};
use shopfront::shop::accounts::{add_address, register, upsert_admin, NewAddress};
use shopfront::shop::analytics::{dashboard, LOW_STOCK_THRESHOLD};
use shopfront::shop::cart::CartLine;
use shopfront::shop::catalog::{create_product, ProductInput};
use shopfront::shop::checkout::{place_order, CheckoutRequest, Pricing};
use shopfront::shop::orders::{update_status, OrderStatus};
use tempfile::tempdir;

const PRICING: Pricing = Pricing {
    shipping_flat_cents: 0,
    free_shipping_threshold_cents: 0,
    tax_rate_bps: 0,
};

// 2023-11-14 22:13 UTC
const NOW: i64 = 1_700_000_000;

fn test_db() -> (tempfile::TempDir, Connection) {
    let tmp = tempdir().unwrap();
    let path = tmp.path().join("shop.db");
    initialize_db(&path).unwrap();
    let conn = db_connect(&path).unwrap();
    (tmp, conn)
}

fn product(conn: &Connection, name: &str, price: i64, stock: i64) -> i64 {
    create_product(
        conn,
        &ProductInput {
            name: name.into(),
            price_cents: price,
            stock,
            is_active: true,
            ..ProductInput::default()
        },
    )
    .unwrap()
    .id
}

#[test]
fn test_empty_shop_dashboard() {
    let (_tmp, conn) = test_db();
    let d = dashboard(&conn, NOW, 7).unwrap();
    assert_eq!(d.revenue_cents, 0);
    assert_eq!(d.order_count, 0);
    assert_eq!(d.average_order_cents, 0);
    assert_eq!(d.daily.len(), 7);
    assert!(d.daily.iter().all(|day| day.orders == 0));
    assert_eq!(d.daily[6].day_start, day_start(NOW));
    assert!(d.top_products.is_empty());
    assert_eq!(d.status_counts.len(), OrderStatus::ALL.len());
}

#[test]
fn test_dashboard_figures() {
    let (_tmp, conn) = test_db();
    upsert_admin(&conn, "root@example.com", "Root", "rootpassword").unwrap();
    let user = register(&conn, "ada@example.com", "Ada", "correct horse").unwrap();
    let addr = add_address(
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
    let beans = product(&conn, "Beans", 1000, 100);
    let kettle = product(&conn, "Kettle", 4000, LOW_STOCK_THRESHOLD + 3);

    let place = |lines: Vec<CartLine>, at: i64| {
        place_order(
            &conn,
            &CheckoutRequest {
                user_id: user.id,
                address_id: addr.id,
                lines: &lines,
                coupon_code: None,
                now: at,
            },
            &PRICING,
        )
        .unwrap()
        .order
        .number
    };

    let yesterday = NOW - SECS_PER_DAY;
    place(
        vec![CartLine {
            product_id: beans,
            quantity: 3,
        }],
        yesterday,
    );
    place(
        vec![CartLine {
            product_id: kettle,
            quantity: 1,
        }],
        NOW,
    );
    let cancelled = place(
        vec![CartLine {
            product_id: kettle,
            quantity: 2,
        }],
        NOW,
    );
    update_status(&conn, &cancelled, OrderStatus::Cancelled).unwrap();

    let d = dashboard(&conn, NOW, 7).unwrap();
    assert_eq!(d.revenue_cents, 3000 + 4000);
    assert_eq!(d.order_count, 2);
    assert_eq!(d.average_order_cents, 3500);

    let pending = d
        .status_counts
        .iter()
        .find(|(s, _)| *s == OrderStatus::Pending)
        .map(|(_, n)| *n);
    assert_eq!(pending, Some(2));
    let cancelled_count = d
        .status_counts
        .iter()
        .find(|(s, _)| *s == OrderStatus::Cancelled)
        .map(|(_, n)| *n);
    assert_eq!(cancelled_count, Some(1));

    assert_eq!(d.top_products[0].name, "Beans");
    assert_eq!(d.top_products[0].units, 3);
    assert_eq!(d.top_products[1].units, 1);

    assert_eq!(d.daily[5].orders, 1);
    assert_eq!(d.daily[5].revenue_cents, 3000);
    assert_eq!(d.daily[6].orders, 1);
    assert_eq!(d.daily[6].revenue_cents, 4000);

    // Kettle stock restored by the cancellation: threshold + 3 - 1 = threshold + 2.
    assert!(d.low_stock.is_empty());
    assert_eq!(d.customer_count, 1);
}
