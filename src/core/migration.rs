//! Schema migration for the storefront database.
//!
//! Each step is idempotent (`IF NOT EXISTS`), so re-running `migrate` on an
//! up-to-date database is a no-op apart from re-reading `meta`.

use crate::core::error::ShopError;
use crate::core::schemas;
use rusqlite::{Connection, OptionalExtension};

pub const SHOP_VERSION: &str = env!("CARGO_PKG_VERSION");

pub struct Migration {
    pub version: u32,
    pub description: &'static str,
    pub statements: &'static [&'static str],
}

pub fn all_migrations() -> Vec<Migration> {
    vec![
        Migration {
            version: 1,
            description: "Catalog, accounts, carts, orders and sessions",
            statements: &[
                schemas::SCHEMA_USERS,
                schemas::SCHEMA_CATEGORIES,
                schemas::SCHEMA_PRODUCTS,
                schemas::SCHEMA_INDEX_PRODUCTS_CATEGORY,
                schemas::SCHEMA_ADDRESSES,
                schemas::SCHEMA_CARTS,
                schemas::SCHEMA_ORDERS,
                schemas::SCHEMA_INDEX_ORDERS_USER,
                schemas::SCHEMA_INDEX_ORDERS_STATUS,
                schemas::SCHEMA_ORDER_ITEMS,
                schemas::SCHEMA_SESSIONS,
            ],
        },
        Migration {
            version: 2,
            description: "Coupons",
            statements: &[schemas::SCHEMA_COUPONS],
        },
        Migration {
            version: 3,
            description: "Product reviews",
            statements: &[
                schemas::SCHEMA_REVIEWS,
                schemas::SCHEMA_INDEX_REVIEWS_PRODUCT,
            ],
        },
    ]
}

pub fn current_version(conn: &Connection) -> Result<u32, ShopError> {
    conn.execute(schemas::SCHEMA_META, [])?;
    let current: Option<String> = conn
        .query_row(
            "SELECT value FROM meta WHERE key = 'schema_version'",
            [],
            |row| row.get(0),
        )
        .optional()?;
    Ok(current
        .as_deref()
        .and_then(|s| s.parse::<u32>().ok())
        .unwrap_or(0))
}

/// Apply every step above the recorded version. Returns the versions applied.
pub fn migrate(conn: &Connection) -> Result<Vec<u32>, ShopError> {
    let from = current_version(conn)?;
    if from >= schemas::SCHEMA_VERSION {
        return Ok(Vec::new());
    }

    let tx = conn.unchecked_transaction()?;
    let mut applied = Vec::new();
    for m in all_migrations().into_iter().filter(|m| m.version > from) {
        for stmt in m.statements {
            tx.execute(stmt, [])?;
        }
        tracing::info!(version = m.version, "applied migration: {}", m.description);
        applied.push(m.version);
    }
    tx.execute(
        "INSERT INTO meta(key, value) VALUES('schema_version', ?1)
         ON CONFLICT(key) DO UPDATE SET value=excluded.value",
        [schemas::SCHEMA_VERSION.to_string()],
    )?;
    tx.commit()?;
    Ok(applied)
}
