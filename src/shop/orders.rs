//! Orders: history for shoppers, status workflow for admins.

use crate::core::error::ShopError;
use crate::core::time;
use crate::shop::catalog::Page;
use rusqlite::{Connection, OptionalExtension, params};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Pending,
    Paid,
    Shipped,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 5] = [
        OrderStatus::Pending,
        OrderStatus::Paid,
        OrderStatus::Shipped,
        OrderStatus::Delivered,
        OrderStatus::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Paid => "paid",
            OrderStatus::Shipped => "shipped",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(s: &str) -> Result<Self, ShopError> {
        OrderStatus::ALL
            .into_iter()
            .find(|st| st.as_str() == s)
            .ok_or_else(|| ShopError::Validation(format!("unknown order status '{}'", s)))
    }

    /// Statuses reachable from this one.
    pub fn next_allowed(&self) -> &'static [OrderStatus] {
        match self {
            OrderStatus::Pending => &[OrderStatus::Paid, OrderStatus::Cancelled],
            OrderStatus::Paid => &[OrderStatus::Shipped, OrderStatus::Cancelled],
            OrderStatus::Shipped => &[OrderStatus::Delivered],
            OrderStatus::Delivered | OrderStatus::Cancelled => &[],
        }
    }

    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        self.next_allowed().contains(&next)
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Order {
    pub id: i64,
    pub number: String,
    pub user_id: i64,
    pub status: OrderStatus,
    pub subtotal_cents: i64,
    pub discount_cents: i64,
    pub shipping_cents: i64,
    pub tax_cents: i64,
    pub total_cents: i64,
    pub coupon_code: Option<String>,
    pub ship_to: String,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OrderItem {
    pub product_id: i64,
    pub product_name: String,
    pub unit_price_cents: i64,
    pub quantity: i64,
}

impl OrderItem {
    pub fn line_total_cents(&self) -> i64 {
        self.unit_price_cents * self.quantity
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct OrderDetail {
    pub order: Order,
    pub items: Vec<OrderItem>,
    pub customer_email: String,
}

const ORDER_COLUMNS: &str = "o.id, o.number, o.user_id, o.status, o.subtotal_cents, o.discount_cents, o.shipping_cents, o.tax_cents, o.total_cents, o.coupon_code, o.ship_to, o.created_at, o.updated_at";

fn order_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Order> {
    let status: String = row.get(3)?;
    let status = OrderStatus::parse(&status).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(3, rusqlite::types::Type::Text, Box::new(e))
    })?;
    Ok(Order {
        id: row.get(0)?,
        number: row.get(1)?,
        user_id: row.get(2)?,
        status,
        subtotal_cents: row.get(4)?,
        discount_cents: row.get(5)?,
        shipping_cents: row.get(6)?,
        tax_cents: row.get(7)?,
        total_cents: row.get(8)?,
        coupon_code: row.get(9)?,
        ship_to: row.get(10)?,
        created_at: row.get(11)?,
        updated_at: row.get(12)?,
    })
}

pub fn items_for(conn: &Connection, order_id: i64) -> Result<Vec<OrderItem>, ShopError> {
    let mut stmt = conn.prepare(
        "SELECT product_id, product_name, unit_price_cents, quantity FROM order_items
         WHERE order_id = ?1 ORDER BY id ASC",
    )?;
    let rows = stmt.query_map([order_id], |row| {
        Ok(OrderItem {
            product_id: row.get(0)?,
            product_name: row.get(1)?,
            unit_price_cents: row.get(2)?,
            quantity: row.get(3)?,
        })
    })?;
    let mut out = Vec::new();
    for r in rows {
        out.push(r?);
    }
    Ok(out)
}

pub fn list_for_user(conn: &Connection, user_id: i64) -> Result<Vec<Order>, ShopError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM orders o WHERE o.user_id = ?1 ORDER BY o.created_at DESC, o.id DESC",
        ORDER_COLUMNS
    ))?;
    let rows = stmt.query_map([user_id], order_from_row)?;
    let mut out = Vec::new();
    for r in rows {
        out.push(r?);
    }
    Ok(out)
}

fn detail_by_number(conn: &Connection, number: &str) -> Result<Option<OrderDetail>, ShopError> {
    let found = conn
        .query_row(
            &format!(
                "SELECT {}, u.email FROM orders o JOIN users u ON u.id = o.user_id WHERE o.number = ?1",
                ORDER_COLUMNS
            ),
            [number],
            |row| Ok((order_from_row(row)?, row.get::<_, String>(13)?)),
        )
        .optional()?;
    let Some((order, customer_email)) = found else {
        return Ok(None);
    };
    let items = items_for(conn, order.id)?;
    Ok(Some(OrderDetail {
        order,
        items,
        customer_email,
    }))
}

/// Admin lookup by public order number.
pub fn get(conn: &Connection, number: &str) -> Result<OrderDetail, ShopError> {
    detail_by_number(conn, number)?.ok_or_else(|| ShopError::NotFound(format!("order {}", number)))
}

/// Shopper lookup: someone else's order is reported as NotFound.
pub fn get_for_user(conn: &Connection, user_id: i64, number: &str) -> Result<OrderDetail, ShopError> {
    match detail_by_number(conn, number)? {
        Some(detail) if detail.order.user_id == user_id => Ok(detail),
        _ => Err(ShopError::NotFound(format!("order {}", number))),
    }
}

pub fn list_all(
    conn: &Connection,
    status: Option<OrderStatus>,
    page: i64,
    per_page: i64,
) -> Result<Page<Order>, ShopError> {
    let per_page = per_page.clamp(1, 200);
    let page = page.max(1);
    let status_str = status.map(|s| s.as_str());

    let total: i64 = conn.query_row(
        "SELECT COUNT(*) FROM orders WHERE (?1 IS NULL OR status = ?1)",
        [status_str],
        |row| row.get(0),
    )?;
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM orders o WHERE (?1 IS NULL OR o.status = ?1)
         ORDER BY o.created_at DESC, o.id DESC LIMIT ?2 OFFSET ?3",
        ORDER_COLUMNS
    ))?;
    let rows = stmt.query_map(
        params![status_str, per_page, (page - 1) * per_page],
        order_from_row,
    )?;
    let mut items = Vec::new();
    for r in rows {
        items.push(r?);
    }
    Ok(Page {
        items,
        page,
        per_page,
        total,
    })
}

fn restock(conn: &Connection, order_id: i64) -> Result<(), ShopError> {
    for item in items_for(conn, order_id)? {
        conn.execute(
            "UPDATE products SET stock = stock + ?1 WHERE id = ?2",
            params![item.quantity, item.product_id],
        )?;
    }
    Ok(())
}

fn apply_transition(
    conn: &Connection,
    order: &Order,
    next: OrderStatus,
    now: i64,
) -> Result<(), ShopError> {
    if !order.status.can_transition_to(next) {
        return Err(ShopError::Validation(format!(
            "order {} cannot move from {} to {}",
            order.number, order.status, next
        )));
    }
    let tx = conn.unchecked_transaction()?;
    // Guard on the status we read so a concurrent change is not overwritten.
    let changed = tx.execute(
        "UPDATE orders SET status = ?1, updated_at = ?2 WHERE id = ?3 AND status = ?4",
        params![next.as_str(), now, order.id, order.status.as_str()],
    )?;
    if changed == 0 {
        return Err(ShopError::Conflict(format!(
            "order {} changed while updating",
            order.number
        )));
    }
    if next == OrderStatus::Cancelled {
        restock(&tx, order.id)?;
    }
    tx.commit()?;
    Ok(())
}

/// Admin status change. Cancelling puts the items back in stock.
pub fn update_status(
    conn: &Connection,
    number: &str,
    next: OrderStatus,
) -> Result<OrderDetail, ShopError> {
    let detail = get(conn, number)?;
    apply_transition(conn, &detail.order, next, time::now_secs())?;
    tracing::info!(order = number, from = %detail.order.status, to = %next, "order status changed");
    get(conn, number)
}

/// Shopper cancellation; only pending orders qualify.
pub fn cancel(conn: &Connection, user_id: i64, number: &str) -> Result<OrderDetail, ShopError> {
    let detail = get_for_user(conn, user_id, number)?;
    if detail.order.status != OrderStatus::Pending {
        return Err(ShopError::Validation(format!(
            "order {} is {} and can no longer be cancelled",
            number, detail.order.status
        )));
    }
    apply_transition(conn, &detail.order, OrderStatus::Cancelled, time::now_secs())?;
    get_for_user(conn, user_id, number)
}
