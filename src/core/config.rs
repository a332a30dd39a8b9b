//! Storefront configuration.
//!
//! Loaded from `shopfront.toml`. A missing file is not an error: every key
//! has a default, and `SHOPFRONT_BIND` / `SHOPFRONT_DATABASE` override the
//! file for deployments that only set environment variables.

use crate::core::error::ShopError;
use crate::core::schemas;
use serde::{Deserialize, Serialize};
use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

pub const CONFIG_FILE_NAME: &str = "shopfront.toml";
pub const CONFIG_ENV: &str = "SHOPFRONT_CONFIG";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ShopConfig {
    pub shop_name: String,
    pub bind: String,
    pub database: PathBuf,
    pub currency: String,
    pub shipping_flat_cents: i64,
    pub free_shipping_threshold_cents: i64,
    pub tax_rate_bps: i64,
    pub page_size: i64,
    pub session_ttl_hours: i64,
    pub log_level: String,
}

impl Default for ShopConfig {
    fn default() -> Self {
        Self {
            shop_name: "Shopfront".to_string(),
            bind: "127.0.0.1:8080".to_string(),
            database: PathBuf::from(schemas::DEFAULT_DB_NAME),
            currency: "USD".to_string(),
            shipping_flat_cents: 599,
            free_shipping_threshold_cents: 5000,
            tax_rate_bps: 0,
            page_size: 12,
            session_ttl_hours: 336,
            log_level: "info".to_string(),
        }
    }
}

impl ShopConfig {
    pub fn validate(&self) -> Result<(), ShopError> {
        if !(1..=100).contains(&self.page_size) {
            return Err(ShopError::Config(format!(
                "page_size must be between 1 and 100, got {}",
                self.page_size
            )));
        }
        if !(0..=10_000).contains(&self.tax_rate_bps) {
            return Err(ShopError::Config(format!(
                "tax_rate_bps must be between 0 and 10000, got {}",
                self.tax_rate_bps
            )));
        }
        if self.shipping_flat_cents < 0 || self.free_shipping_threshold_cents < 0 {
            return Err(ShopError::Config(
                "shipping amounts must not be negative".to_string(),
            ));
        }
        if self.session_ttl_hours <= 0 {
            return Err(ShopError::Config(
                "session_ttl_hours must be positive".to_string(),
            ));
        }
        self.bind_addr()?;
        Ok(())
    }

    pub fn bind_addr(&self) -> Result<SocketAddr, ShopError> {
        self.bind
            .parse()
            .map_err(|e| ShopError::Config(format!("invalid bind address '{}': {}", self.bind, e)))
    }

    pub fn session_ttl_secs(&self) -> i64 {
        self.session_ttl_hours * 3600
    }

    /// Resolve `database` relative to the directory holding the config file.
    pub fn resolve_database(&mut self, base: &Path) {
        if self.database.is_relative() {
            self.database = base.join(&self.database);
        }
    }

    pub fn to_toml(&self) -> Result<String, ShopError> {
        toml::to_string_pretty(self).map_err(|e| ShopError::Config(e.to_string()))
    }
}

/// Pick the config path: explicit flag, then `SHOPFRONT_CONFIG`, then `./shopfront.toml`.
pub fn config_path(explicit: Option<&Path>) -> PathBuf {
    if let Some(p) = explicit {
        return p.to_path_buf();
    }
    if let Ok(p) = std::env::var(CONFIG_ENV) {
        if !p.trim().is_empty() {
            return PathBuf::from(p);
        }
    }
    PathBuf::from(CONFIG_FILE_NAME)
}

pub fn parse_config(content: &str) -> Result<ShopConfig, ShopError> {
    let config: ShopConfig =
        toml::from_str(content).map_err(|e| ShopError::Config(e.to_string()))?;
    Ok(config)
}

pub fn load_config(path: &Path) -> Result<ShopConfig, ShopError> {
    let mut config = if path.exists() {
        let content = fs::read_to_string(path)?;
        let mut c = parse_config(&content)?;
        if let Some(dir) = path.parent() {
            c.resolve_database(dir);
        }
        c
    } else {
        ShopConfig::default()
    };

    if let Ok(bind) = std::env::var("SHOPFRONT_BIND") {
        config.bind = bind;
    }
    if let Ok(db) = std::env::var("SHOPFRONT_DATABASE") {
        config.database = PathBuf::from(db);
    }

    config.validate()?;
    Ok(config)
}
