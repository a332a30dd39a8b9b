//! Back-office dashboard figures.

use crate::core::error::ShopError;
use crate::core::time::{self, SECS_PER_DAY};
use crate::shop::catalog::{self, Product};
use crate::shop::orders::OrderStatus;
use rusqlite::{Connection, params};
use serde::Serialize;

pub const LOW_STOCK_THRESHOLD: i64 = 5;
pub const TOP_PRODUCTS: i64 = 5;

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct TopProduct {
    pub product_id: i64,
    pub name: String,
    pub units: i64,
    pub revenue_cents: i64,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct DailyRevenue {
    pub day_start: i64,
    pub orders: i64,
    pub revenue_cents: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct Dashboard {
    pub revenue_cents: i64,
    pub order_count: i64,
    pub average_order_cents: i64,
    pub status_counts: Vec<(OrderStatus, i64)>,
    pub top_products: Vec<TopProduct>,
    pub daily: Vec<DailyRevenue>,
    pub low_stock: Vec<Product>,
    pub customer_count: i64,
    pub new_customers: i64,
}

/// Figures for the `days` UTC days ending with the day containing `now`.
/// Revenue excludes cancelled orders.
pub fn dashboard(conn: &Connection, now: i64, days: i64) -> Result<Dashboard, ShopError> {
    let days = days.clamp(1, 366);
    let cancelled = OrderStatus::Cancelled.as_str();

    let (revenue, order_count): (i64, i64) = conn.query_row(
        "SELECT COALESCE(SUM(total_cents), 0), COUNT(*) FROM orders WHERE status != ?1",
        [cancelled],
        |row| Ok((row.get(0)?, row.get(1)?)),
    )?;
    let average = if order_count > 0 {
        revenue / order_count
    } else {
        0
    };

    let mut status_counts = Vec::with_capacity(OrderStatus::ALL.len());
    for status in OrderStatus::ALL {
        let n: i64 = conn.query_row(
            "SELECT COUNT(*) FROM orders WHERE status = ?1",
            [status.as_str()],
            |row| row.get(0),
        )?;
        status_counts.push((status, n));
    }

    let mut stmt = conn.prepare(
        "SELECT oi.product_id, oi.product_name, SUM(oi.quantity) AS units,
                SUM(oi.quantity * oi.unit_price_cents)
         FROM order_items oi JOIN orders o ON o.id = oi.order_id
         WHERE o.status != ?1
         GROUP BY oi.product_id
         ORDER BY units DESC, oi.product_id ASC
         LIMIT ?2",
    )?;
    let rows = stmt.query_map(params![cancelled, TOP_PRODUCTS], |row| {
        Ok(TopProduct {
            product_id: row.get(0)?,
            name: row.get(1)?,
            units: row.get(2)?,
            revenue_cents: row.get(3)?,
        })
    })?;
    let mut top_products = Vec::new();
    for r in rows {
        top_products.push(r?);
    }

    let first_day = time::day_start(now) - (days - 1) * SECS_PER_DAY;
    let mut daily: Vec<DailyRevenue> = (0..days)
        .map(|i| DailyRevenue {
            day_start: first_day + i * SECS_PER_DAY,
            orders: 0,
            revenue_cents: 0,
        })
        .collect();
    let mut stmt = conn.prepare(
        "SELECT (created_at - (created_at % 86400)) AS day, COUNT(*), SUM(total_cents)
         FROM orders
         WHERE status != ?1 AND created_at >= ?2
         GROUP BY day",
    )?;
    let rows = stmt.query_map(params![cancelled, first_day], |row| {
        Ok((
            row.get::<_, i64>(0)?,
            row.get::<_, i64>(1)?,
            row.get::<_, i64>(2)?,
        ))
    })?;
    for r in rows {
        let (day, orders, revenue_cents) = r?;
        let idx = (day - first_day) / SECS_PER_DAY;
        if let Some(bucket) = usize::try_from(idx).ok().and_then(|i| daily.get_mut(i)) {
            bucket.orders = orders;
            bucket.revenue_cents = revenue_cents;
        }
    }

    let low_stock = catalog::low_stock(conn, LOW_STOCK_THRESHOLD)?;

    let customer_count: i64 =
        conn.query_row("SELECT COUNT(*) FROM users WHERE is_admin = 0", [], |row| {
            row.get(0)
        })?;
    let new_customers: i64 = conn.query_row(
        "SELECT COUNT(*) FROM users WHERE is_admin = 0 AND created_at >= ?1",
        [first_day],
        |row| row.get(0),
    )?;

    Ok(Dashboard {
        revenue_cents: revenue,
        order_count,
        average_order_cents: average,
        status_counts,
        top_products,
        daily,
        low_stock,
        customer_count,
        new_customers,
    })
}
