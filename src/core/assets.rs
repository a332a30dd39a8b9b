//! Embedded static assets.
//!
//! Stylesheets and images are baked into the binary so a deployment is a
//! single executable plus its database file.

use rust_embed::RustEmbed;

#[derive(RustEmbed)]
#[folder = "assets/"]
#[include = "*.css"]
#[include = "*.svg"]
#[include = "*.ico"]
struct StaticAssets;

/// Asset bytes and content type for a path below `/static/`.
pub fn get_asset(path: &str) -> Option<(Vec<u8>, &'static str)> {
    let key = path.trim_start_matches('/');
    let file = StaticAssets::get(key)?;
    Some((file.data.into_owned(), content_type_for(key)))
}

pub fn list_assets() -> Vec<String> {
    StaticAssets::iter().map(|p| p.to_string()).collect()
}

fn content_type_for(path: &str) -> &'static str {
    match path.rsplit('.').next() {
        Some("css") => "text/css; charset=utf-8",
        Some("svg") => "image/svg+xml",
        Some("ico") => "image/x-icon",
        _ => "application/octet-stream",
    }
}
