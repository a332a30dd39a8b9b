//! Infrastructure shared by every storefront subsystem: configuration,
//! database access, schema migration, errors and display helpers.

pub mod assets;
pub mod broker;
pub mod config;
pub mod db;
pub mod error;
pub mod migration;
pub mod output;
pub mod schemas;
pub mod time;
