use rusqlite;
use std::io;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ShopError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Authentication required")]
    Unauthorized,
    #[error("Forbidden: {0}")]
    Forbidden(String),
    #[error("Out of stock: {0}")]
    OutOfStock(String),
    #[error("Conflict: {0}")]
    Conflict(String),
}

impl ShopError {
    /// True for errors caused by shopper input rather than the server.
    pub fn is_user_facing(&self) -> bool {
        matches!(
            self,
            ShopError::Validation(_)
                | ShopError::OutOfStock(_)
                | ShopError::Conflict(_)
                | ShopError::Unauthorized
        )
    }
}
