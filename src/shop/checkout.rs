//! Checkout: pricing a cart and turning it into an order.
//!
//! `place_order` runs every write in one transaction. Dropping the
//! transaction on any `?` rolls back, so a failed checkout leaves no order
//! row, no items, stock untouched and the cart intact.

use crate::core::config::ShopConfig;
use crate::core::error::ShopError;
use crate::shop::accounts;
use crate::shop::cart::{self, CartLine};
use crate::shop::catalog;
use crate::shop::coupons::{self, Coupon};
use crate::shop::orders::{self, OrderDetail, OrderStatus};
use rusqlite::{Connection, params};
use serde::Serialize;
use ulid::Ulid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pricing {
    pub shipping_flat_cents: i64,
    pub free_shipping_threshold_cents: i64,
    pub tax_rate_bps: i64,
}

impl From<&ShopConfig> for Pricing {
    fn from(config: &ShopConfig) -> Self {
        Self {
            shipping_flat_cents: config.shipping_flat_cents,
            free_shipping_threshold_cents: config.free_shipping_threshold_cents,
            tax_rate_bps: config.tax_rate_bps,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, PartialEq, Eq)]
pub struct Totals {
    pub subtotal_cents: i64,
    pub discount_cents: i64,
    pub shipping_cents: i64,
    pub tax_cents: i64,
    pub total_cents: i64,
}

/// Price a cart of `item_count` units with an optional (already validated)
/// coupon. Only an empty cart quotes all zeros; free products still ship.
pub fn quote(
    subtotal_cents: i64,
    item_count: i64,
    coupon: Option<&Coupon>,
    pricing: &Pricing,
) -> Totals {
    if item_count <= 0 {
        return Totals::default();
    }
    let discount = coupon
        .map(|c| coupons::discount_for(c, subtotal_cents))
        .unwrap_or(0);
    let taxable = subtotal_cents - discount;
    let shipping = if taxable >= pricing.free_shipping_threshold_cents {
        0
    } else {
        pricing.shipping_flat_cents
    };
    let tax = taxable * pricing.tax_rate_bps / 10_000;
    Totals {
        subtotal_cents,
        discount_cents: discount,
        shipping_cents: shipping,
        tax_cents: tax,
        total_cents: taxable + shipping + tax,
    }
}

#[derive(Debug, Clone)]
pub struct CheckoutRequest<'a> {
    pub user_id: i64,
    pub address_id: i64,
    pub lines: &'a [CartLine],
    pub coupon_code: Option<&'a str>,
    pub now: i64,
}

/// Create an order from `lines` for `user_id`.
///
/// Steps, all in one transaction: validate the address and products,
/// revalidate the coupon against the live subtotal, insert the order and its
/// items with price snapshots, decrement stock guarded by `stock >= qty`,
/// count the coupon redemption and empty the user's saved cart.
pub fn place_order(
    conn: &Connection,
    req: &CheckoutRequest<'_>,
    pricing: &Pricing,
) -> Result<OrderDetail, ShopError> {
    let lines: Vec<&CartLine> = req.lines.iter().filter(|l| l.quantity > 0).collect();
    if lines.is_empty() {
        return Err(ShopError::Validation("your cart is empty".into()));
    }

    let tx = conn.unchecked_transaction()?;

    let address = match accounts::get_address(&tx, req.user_id, req.address_id) {
        Ok(a) => a,
        Err(ShopError::NotFound(_)) => {
            return Err(ShopError::Validation("choose a shipping address".into()));
        }
        Err(e) => return Err(e),
    };

    let mut priced = Vec::with_capacity(lines.len());
    let mut subtotal: i64 = 0;
    let mut item_count: i64 = 0;
    for line in &lines {
        let product = match catalog::get_product(&tx, line.product_id) {
            Ok(p) if p.is_active => p,
            Ok(p) => {
                return Err(ShopError::Validation(format!(
                    "{} is no longer available",
                    p.name
                )));
            }
            Err(ShopError::NotFound(_)) => {
                return Err(ShopError::Validation(
                    "an item in your cart is no longer available".into(),
                ));
            }
            Err(e) => return Err(e),
        };
        subtotal += product.price_cents * line.quantity;
        item_count += line.quantity;
        priced.push((product, line.quantity));
    }

    let coupon = match req.coupon_code.filter(|c| !c.trim().is_empty()) {
        Some(code) => Some(coupons::resolve(&tx, code, subtotal, req.now)?),
        None => None,
    };
    let totals = quote(subtotal, item_count, coupon.as_ref(), pricing);

    let number = Ulid::new().to_string();
    tx.execute(
        "INSERT INTO orders(number, user_id, status, subtotal_cents, discount_cents, shipping_cents,
                            tax_cents, total_cents, coupon_code, ship_to, created_at, updated_at)
         VALUES(?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?11)",
        params![
            number,
            req.user_id,
            OrderStatus::Pending.as_str(),
            totals.subtotal_cents,
            totals.discount_cents,
            totals.shipping_cents,
            totals.tax_cents,
            totals.total_cents,
            coupon.as_ref().map(|c| c.code.as_str()),
            address.one_line(),
            req.now
        ],
    )?;
    let order_id = tx.last_insert_rowid();

    for (product, quantity) in &priced {
        tx.execute(
            "INSERT INTO order_items(order_id, product_id, product_name, unit_price_cents, quantity)
             VALUES(?1, ?2, ?3, ?4, ?5)",
            params![order_id, product.id, product.name, product.price_cents, quantity],
        )?;
        let updated = tx.execute(
            "UPDATE products SET stock = stock - ?1 WHERE id = ?2 AND stock >= ?1",
            params![quantity, product.id],
        )?;
        if updated == 0 {
            tracing::warn!(product_id = product.id, quantity, "checkout hit insufficient stock");
            return Err(ShopError::OutOfStock(product.name.clone()));
        }
    }

    if let Some(c) = &coupon {
        coupons::record_use(&tx, c.id)?;
    }
    cart::save_user_lines(&tx, req.user_id, &[])?;

    tx.commit()?;
    tracing::info!(
        order = %number,
        user_id = req.user_id,
        total_cents = totals.total_cents,
        "order placed"
    );
    orders::get_for_user(conn, req.user_id, &number)
}
