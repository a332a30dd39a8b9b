//! Shopping carts.
//!
//! Anonymous visitors keep their lines in the session row; signed-in users
//! keep them in `carts`. Both are the same `Vec<CartLine>` shape, so every
//! mutation is written once against the vector and then persisted to
//! whichever store `CartRef` points at.

use crate::core::error::ShopError;
use crate::core::time;
use crate::shop::catalog::{self, Product};
use crate::shop::sessions;
use rusqlite::{Connection, params};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct CartLine {
    pub product_id: i64,
    pub quantity: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CartRef<'a> {
    User(i64),
    Session(&'a str),
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct CartItem {
    pub product_id: i64,
    pub slug: String,
    pub name: String,
    pub unit_price_cents: i64,
    pub quantity: i64,
    pub available: i64,
    pub line_total_cents: i64,
}

#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct CartView {
    pub items: Vec<CartItem>,
    pub subtotal_cents: i64,
    pub item_count: i64,
}

impl CartView {
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn lines(&self) -> Vec<CartLine> {
        self.items
            .iter()
            .map(|i| CartLine {
                product_id: i.product_id,
                quantity: i.quantity,
            })
            .collect()
    }
}

// --- pure line operations ---

fn sellable(product: &Product) -> Result<(), ShopError> {
    if !product.is_active {
        return Err(ShopError::NotFound(format!("product {}", product.id)));
    }
    if product.stock <= 0 {
        return Err(ShopError::OutOfStock(product.name.clone()));
    }
    Ok(())
}

/// Add `qty` of `product`, clamping the line to available stock.
/// Returns the resulting line quantity.
pub fn add_line(lines: &mut Vec<CartLine>, product: &Product, qty: i64) -> Result<i64, ShopError> {
    if qty < 1 {
        return Err(ShopError::Validation("quantity must be at least 1".into()));
    }
    sellable(product)?;
    match lines.iter_mut().find(|l| l.product_id == product.id) {
        Some(line) => {
            line.quantity = line.quantity.saturating_add(qty).min(product.stock);
            Ok(line.quantity)
        }
        None => {
            let quantity = qty.min(product.stock);
            lines.push(CartLine {
                product_id: product.id,
                quantity,
            });
            Ok(quantity)
        }
    }
}

/// Set a line to `qty`; zero (or less) removes it, above stock clamps.
pub fn set_line_quantity(
    lines: &mut Vec<CartLine>,
    product: &Product,
    qty: i64,
) -> Result<i64, ShopError> {
    if qty <= 0 {
        remove_line(lines, product.id);
        return Ok(0);
    }
    sellable(product)?;
    let quantity = qty.min(product.stock);
    match lines.iter_mut().find(|l| l.product_id == product.id) {
        Some(line) => line.quantity = quantity,
        None => lines.push(CartLine {
            product_id: product.id,
            quantity,
        }),
    }
    Ok(quantity)
}

pub fn remove_line(lines: &mut Vec<CartLine>, product_id: i64) -> bool {
    let before = lines.len();
    lines.retain(|l| l.product_id != product_id);
    lines.len() != before
}

/// Combine an anonymous cart with a user's saved cart.
///
/// Quantities for the same product are summed. User lines keep their order;
/// products only in the session cart follow in session order.
pub fn merge(session_lines: &[CartLine], user_lines: &[CartLine]) -> Vec<CartLine> {
    let mut merged: Vec<CartLine> = Vec::with_capacity(user_lines.len() + session_lines.len());
    for line in user_lines.iter().chain(session_lines) {
        if line.quantity <= 0 {
            continue;
        }
        match merged.iter_mut().find(|m| m.product_id == line.product_id) {
            Some(existing) => existing.quantity = existing.quantity.saturating_add(line.quantity),
            None => merged.push(*line),
        }
    }
    merged
}

// --- persistence ---

pub fn load_user_lines(conn: &Connection, user_id: i64) -> Result<Vec<CartLine>, ShopError> {
    let mut stmt = conn.prepare(
        "SELECT product_id, quantity FROM carts WHERE user_id = ?1 ORDER BY position ASC, product_id ASC",
    )?;
    let rows = stmt.query_map([user_id], |row| {
        Ok(CartLine {
            product_id: row.get(0)?,
            quantity: row.get(1)?,
        })
    })?;
    let mut out = Vec::new();
    for r in rows {
        out.push(r?);
    }
    Ok(out)
}

/// Replace the user's saved cart. Does not open its own transaction so it
/// can run inside checkout's.
pub fn save_user_lines(conn: &Connection, user_id: i64, lines: &[CartLine]) -> Result<(), ShopError> {
    conn.execute("DELETE FROM carts WHERE user_id = ?1", [user_id])?;
    let now = time::now_secs();
    let mut stmt = conn.prepare(
        "INSERT INTO carts(user_id, product_id, quantity, position, updated_at) VALUES(?1, ?2, ?3, ?4, ?5)",
    )?;
    for (pos, line) in lines.iter().enumerate() {
        stmt.execute(params![user_id, line.product_id, line.quantity, pos as i64, now])?;
    }
    Ok(())
}

pub fn load(conn: &Connection, cart: CartRef<'_>) -> Result<Vec<CartLine>, ShopError> {
    match cart {
        CartRef::User(user_id) => load_user_lines(conn, user_id),
        CartRef::Session(session_id) => sessions::load_cart(conn, session_id),
    }
}

pub fn store(conn: &Connection, cart: CartRef<'_>, lines: &[CartLine]) -> Result<(), ShopError> {
    match cart {
        CartRef::User(user_id) => save_user_lines(conn, user_id, lines),
        CartRef::Session(session_id) => sessions::save_cart(conn, session_id, lines),
    }
}

pub fn add_item(
    conn: &Connection,
    cart: CartRef<'_>,
    product_id: i64,
    qty: i64,
) -> Result<i64, ShopError> {
    let product = catalog::get_product(conn, product_id)?;
    let mut lines = load(conn, cart)?;
    let quantity = add_line(&mut lines, &product, qty)?;
    store(conn, cart, &lines)?;
    Ok(quantity)
}

pub fn set_quantity(
    conn: &Connection,
    cart: CartRef<'_>,
    product_id: i64,
    qty: i64,
) -> Result<i64, ShopError> {
    let mut lines = load(conn, cart)?;
    if qty <= 0 {
        remove_line(&mut lines, product_id);
        store(conn, cart, &lines)?;
        return Ok(0);
    }
    let product = catalog::get_product(conn, product_id)?;
    let quantity = set_line_quantity(&mut lines, &product, qty)?;
    store(conn, cart, &lines)?;
    Ok(quantity)
}

pub fn remove_item(conn: &Connection, cart: CartRef<'_>, product_id: i64) -> Result<(), ShopError> {
    let mut lines = load(conn, cart)?;
    if remove_line(&mut lines, product_id) {
        store(conn, cart, &lines)?;
    }
    Ok(())
}

pub fn clear(conn: &Connection, cart: CartRef<'_>) -> Result<(), ShopError> {
    store(conn, cart, &[])
}

/// Resolve lines against the catalog. Lines whose product is gone or
/// inactive are dropped; quantities are shown as stored.
pub fn view(conn: &Connection, lines: &[CartLine]) -> Result<CartView, ShopError> {
    let mut view = CartView::default();
    for line in lines {
        let product = match catalog::get_product(conn, line.product_id) {
            Ok(p) if p.is_active => p,
            Ok(_) | Err(ShopError::NotFound(_)) => continue,
            Err(e) => return Err(e),
        };
        let line_total = product.price_cents * line.quantity;
        view.subtotal_cents += line_total;
        view.item_count += line.quantity;
        view.items.push(CartItem {
            product_id: product.id,
            slug: product.slug,
            name: product.name,
            unit_price_cents: product.price_cents,
            quantity: line.quantity,
            available: product.stock,
            line_total_cents: line_total,
        });
    }
    Ok(view)
}

/// Load and price a cart, writing it back without the lines `view` drops.
///
/// A product deactivated or deleted after it was added would otherwise sit
/// in the stored cart with no way for the shopper to see or remove it.
pub fn prune(conn: &Connection, cart: CartRef<'_>) -> Result<CartView, ShopError> {
    let lines = load(conn, cart)?;
    let view = view(conn, &lines)?;
    if view.items.len() != lines.len() {
        store(conn, cart, &view.lines())?;
        tracing::debug!(
            dropped = lines.len() - view.items.len(),
            "pruned unavailable cart lines"
        );
    }
    Ok(view)
}

/// Fold an anonymous cart into the user's saved cart at login.
///
/// Quantities are clamped to current stock and unavailable products are
/// dropped. The session cart is emptied in the same transaction.
pub fn merge_into_user_cart(
    conn: &Connection,
    user_id: i64,
    session_id: &str,
) -> Result<Vec<CartLine>, ShopError> {
    let tx = conn.unchecked_transaction()?;
    let session_lines = sessions::load_cart(&tx, session_id)?;
    let user_lines = load_user_lines(&tx, user_id)?;
    if session_lines.is_empty() {
        tx.commit()?;
        return Ok(user_lines);
    }

    let mut result = Vec::new();
    for line in merge(&session_lines, &user_lines) {
        let product = match catalog::get_product(&tx, line.product_id) {
            Ok(p) => p,
            Err(ShopError::NotFound(_)) => continue,
            Err(e) => return Err(e),
        };
        if !product.is_active || product.stock <= 0 {
            continue;
        }
        result.push(CartLine {
            product_id: line.product_id,
            quantity: line.quantity.min(product.stock),
        });
    }

    save_user_lines(&tx, user_id, &result)?;
    sessions::save_cart(&tx, session_id, &[])?;
    tx.commit()?;
    tracing::debug!(user_id, lines = result.len(), "merged session cart into user cart");
    Ok(result)
}
