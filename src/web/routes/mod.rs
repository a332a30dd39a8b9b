//! Route tables. Each submodule returns a `Router<AppState>` that
//! `web::router` merges (or nests under `/admin`).

pub mod account;
pub mod admin;
pub mod shop;

use serde::Deserialize;

#[derive(Debug, Default, Deserialize)]
pub struct PageParams {
    pub page: Option<i64>,
}

impl PageParams {
    pub fn page(&self) -> i64 {
        self.page.unwrap_or(1).max(1)
    }
}
