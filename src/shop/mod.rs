//! Storefront subsystems. Each module owns its tables and exposes plain
//! functions over a `rusqlite::Connection`; the web layer reaches them
//! through `core::broker::DbBroker`.

pub mod accounts;
pub mod analytics;
pub mod cart;
pub mod catalog;
pub mod checkout;
pub mod coupons;
pub mod orders;
pub mod reviews;
pub mod seed;
pub mod sessions;
