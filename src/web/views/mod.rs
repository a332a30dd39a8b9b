//! Server-rendered HTML.
//!
//! Pages are plain `String`s assembled with `format!`. Every value that
//! originates from the database or the request goes through `escape` (or
//! `url_encode` inside query strings) before it is interpolated.

pub mod account;
pub mod admin;
pub mod shop;

use crate::core::output;
use crate::shop::accounts::User;
use crate::shop::sessions::{Flash, FlashKind};
use axum::http::StatusCode;
use axum::response::Html;
use std::fmt::Write;

#[derive(Debug, Clone)]
pub struct Chrome {
    pub shop_name: String,
    pub currency: String,
    pub user: Option<User>,
    pub cart_count: i64,
    pub flashes: Vec<Flash>,
}

impl Chrome {
    pub fn money(&self, cents: i64) -> String {
        output::format_money(cents, &self.currency)
    }

    pub fn is_admin(&self) -> bool {
        self.user.as_ref().is_some_and(|u| u.is_admin)
    }
}

pub fn escape(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Percent-encode everything outside the RFC 3986 unreserved set.
pub fn url_encode(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for b in input.bytes() {
        match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(b as char)
            }
            _ => {
                let _ = write!(out, "%{:02X}", b);
            }
        }
    }
    out
}

fn render_flashes(flashes: &[Flash]) -> String {
    flashes
        .iter()
        .map(|f| {
            let class = match f.kind {
                FlashKind::Info => "info",
                FlashKind::Error => "error",
            };
            format!(r#"<div class="flash {}">{}</div>"#, class, escape(&f.text))
        })
        .collect()
}

fn render_nav(chrome: &Chrome) -> String {
    let mut nav = String::new();
    nav.push_str(r#"<a href="/">Shop</a>"#);
    let _ = write!(nav, r#"<a href="/cart">Cart ({})</a>"#, chrome.cart_count);
    match &chrome.user {
        Some(user) => {
            nav.push_str(r#"<a href="/orders">Orders</a>"#);
            let _ = write!(nav, r#"<a href="/account">{}</a>"#, escape(&user.name));
            if user.is_admin {
                nav.push_str(r#"<a href="/admin">Admin</a>"#);
            }
            nav.push_str(
                r#"<form method="post" action="/logout"><button class="link" type="submit">Sign out</button></form>"#,
            );
        }
        None => {
            nav.push_str(r#"<a href="/login">Sign in</a><a href="/register">Register</a>"#);
        }
    }
    nav
}

pub fn layout(chrome: &Chrome, title: &str, body: &str) -> Html<String> {
    Html(format!(
        r#"<!doctype html>
<html lang="en">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>{title} · {shop}</title>
<link rel="stylesheet" href="/static/style.css">
</head>
<body>
<header class="site"><a class="brand" href="/">{shop}</a><nav>{nav}</nav></header>
<main>
{flashes}
{body}
</main>
</body>
</html>"#,
        title = escape(title),
        shop = escape(&chrome.shop_name),
        nav = render_nav(chrome),
        flashes = render_flashes(&chrome.flashes),
        body = body,
    ))
}

/// Standalone page for errors raised before or outside the layout.
pub fn error_page(status: StatusCode, message: &str) -> String {
    format!(
        r#"<!doctype html>
<html lang="en">
<head><meta charset="utf-8"><title>{code}</title><link rel="stylesheet" href="/static/style.css"></head>
<body><main><h1>{code} {reason}</h1><p>{message}</p><p><a href="/">Back to the shop</a></p></main></body>
</html>"#,
        code = status.as_u16(),
        reason = escape(status.canonical_reason().unwrap_or("Error")),
        message = escape(message),
    )
}

/// Previous/next links; `base` is a path plus query string without `page`.
pub fn pager(base: &str, page: i64, total_pages: i64) -> String {
    if total_pages <= 1 {
        return String::new();
    }
    let sep = if base.contains('?') { '&' } else { '?' };
    let mut out = String::from(r#"<div class="pager">"#);
    if page > 1 {
        let _ = write!(out, r#"<a href="{}{}page={}">&larr; Prev</a>"#, base, sep, page - 1);
    }
    let _ = write!(out, "<span>Page {} of {}</span>", page, total_pages);
    if page < total_pages {
        let _ = write!(out, r#"<a href="{}{}page={}">Next &rarr;</a>"#, base, sep, page + 1);
    }
    out.push_str("</div>");
    out
}

pub fn stars(rating: f64) -> String {
    let full = rating.round().clamp(0.0, 5.0) as usize;
    format!("{}{}", "★".repeat(full), "☆".repeat(5 - full))
}
