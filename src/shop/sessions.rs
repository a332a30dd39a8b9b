//! Server-side sessions keyed by the `sf_session` cookie.
//!
//! A session row carries the anonymous cart, an applied coupon code and the
//! pending flash messages. Binding a user to the session is what "logged in"
//! means.

use crate::core::error::ShopError;
use crate::core::time;
use crate::shop::cart::{self, CartLine};
use rusqlite::{Connection, OptionalExtension, params};
use serde::{Deserialize, Serialize};
use ulid::Ulid;

pub const SESSION_COOKIE: &str = "sf_session";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub id: String,
    pub user_id: Option<i64>,
    pub coupon_code: Option<String>,
    pub created_at: i64,
    pub expires_at: i64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FlashKind {
    Info,
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Flash {
    pub kind: FlashKind,
    pub text: String,
}

impl Flash {
    pub fn info(text: impl Into<String>) -> Self {
        Self {
            kind: FlashKind::Info,
            text: text.into(),
        }
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self {
            kind: FlashKind::Error,
            text: text.into(),
        }
    }
}

/// Two ULIDs back to back: 52 characters, 160 random bits.
pub fn new_session_id() -> String {
    format!("{}{}", Ulid::new(), Ulid::new())
}

fn looks_like_session_id(id: &str) -> bool {
    id.len() == 52 && id.chars().all(|c| c.is_ascii_alphanumeric())
}

fn session_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Session> {
    Ok(Session {
        id: row.get(0)?,
        user_id: row.get(1)?,
        coupon_code: row.get(2)?,
        created_at: row.get(3)?,
        expires_at: row.get(4)?,
    })
}

pub fn create(conn: &Connection, ttl_secs: i64, now: i64) -> Result<Session, ShopError> {
    let session = Session {
        id: new_session_id(),
        user_id: None,
        coupon_code: None,
        created_at: now,
        expires_at: now + ttl_secs,
    };
    conn.execute(
        "INSERT INTO sessions(id, user_id, cart, coupon_code, flash, created_at, expires_at)
         VALUES(?1, NULL, '[]', NULL, '[]', ?2, ?3)",
        params![session.id, session.created_at, session.expires_at],
    )?;
    Ok(session)
}

/// Live session by id; expired or unknown ids yield `None`.
pub fn get(conn: &Connection, id: &str, now: i64) -> Result<Option<Session>, ShopError> {
    if !looks_like_session_id(id) {
        return Ok(None);
    }
    let session = conn
        .query_row(
            "SELECT id, user_id, coupon_code, created_at, expires_at FROM sessions
             WHERE id = ?1 AND expires_at > ?2",
            params![id, now],
            session_from_row,
        )
        .optional()?;
    Ok(session)
}

/// Load the session named by the cookie, or start a fresh one.
/// The flag is true when a new session was created.
pub fn load_or_create(
    conn: &Connection,
    cookie_id: Option<&str>,
    ttl_secs: i64,
    now: i64,
) -> Result<(Session, bool), ShopError> {
    if let Some(id) = cookie_id {
        if let Some(session) = get(conn, id, now)? {
            return Ok((session, false));
        }
    }
    Ok((create(conn, ttl_secs, now)?, true))
}

/// Bind `user_id` to the session and fold the anonymous cart into the
/// user's saved cart.
pub fn login(conn: &Connection, session_id: &str, user_id: i64) -> Result<Vec<CartLine>, ShopError> {
    let changed = conn.execute(
        "UPDATE sessions SET user_id = ?1 WHERE id = ?2",
        params![user_id, session_id],
    )?;
    if changed == 0 {
        return Err(ShopError::NotFound("session".into()));
    }
    cart::merge_into_user_cart(conn, user_id, session_id)
}

pub fn logout(conn: &Connection, session_id: &str) -> Result<(), ShopError> {
    conn.execute(
        "UPDATE sessions SET user_id = NULL, cart = '[]', coupon_code = NULL WHERE id = ?1",
        [session_id],
    )?;
    Ok(())
}

pub fn load_cart(conn: &Connection, session_id: &str) -> Result<Vec<CartLine>, ShopError> {
    let raw: Option<String> = conn
        .query_row(
            "SELECT cart FROM sessions WHERE id = ?1",
            [session_id],
            |row| row.get(0),
        )
        .optional()?;
    Ok(raw
        .and_then(|s| serde_json::from_str::<Vec<CartLine>>(&s).ok())
        .unwrap_or_default())
}

pub fn save_cart(conn: &Connection, session_id: &str, lines: &[CartLine]) -> Result<(), ShopError> {
    let raw = serde_json::to_string(lines)
        .map_err(|e| ShopError::Validation(format!("cart encode: {}", e)))?;
    conn.execute(
        "UPDATE sessions SET cart = ?1 WHERE id = ?2",
        params![raw, session_id],
    )?;
    Ok(())
}

pub fn set_coupon(conn: &Connection, session_id: &str, code: Option<&str>) -> Result<(), ShopError> {
    conn.execute(
        "UPDATE sessions SET coupon_code = ?1 WHERE id = ?2",
        params![code, session_id],
    )?;
    Ok(())
}

pub fn push_flash(conn: &Connection, session_id: &str, flash: Flash) -> Result<(), ShopError> {
    let mut pending = peek_flash(conn, session_id)?;
    pending.push(flash);
    let raw = serde_json::to_string(&pending)
        .map_err(|e| ShopError::Validation(format!("flash encode: {}", e)))?;
    conn.execute(
        "UPDATE sessions SET flash = ?1 WHERE id = ?2",
        params![raw, session_id],
    )?;
    Ok(())
}

fn peek_flash(conn: &Connection, session_id: &str) -> Result<Vec<Flash>, ShopError> {
    let raw: Option<String> = conn
        .query_row(
            "SELECT flash FROM sessions WHERE id = ?1",
            [session_id],
            |row| row.get(0),
        )
        .optional()?;
    Ok(raw
        .and_then(|s| serde_json::from_str::<Vec<Flash>>(&s).ok())
        .unwrap_or_default())
}

/// Return pending flash messages and clear them.
pub fn take_flash(conn: &Connection, session_id: &str) -> Result<Vec<Flash>, ShopError> {
    let pending = peek_flash(conn, session_id)?;
    if !pending.is_empty() {
        conn.execute("UPDATE sessions SET flash = '[]' WHERE id = ?1", [session_id])?;
    }
    Ok(pending)
}

pub fn purge_expired(conn: &Connection, now: i64) -> Result<usize, ShopError> {
    Ok(conn.execute("DELETE FROM sessions WHERE expires_at <= ?1", [now])?)
}

/// Pull the session id out of a `Cookie` header value.
pub fn session_id_from_cookie_header(header: &str) -> Option<&str> {
    header
        .split(';')
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .map(|(_, value)| value.trim())
}

pub fn set_cookie_header(session_id: &str, ttl_secs: i64) -> String {
    format!(
        "{}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
        SESSION_COOKIE, session_id, ttl_secs
    )
}

pub fn touch(conn: &Connection, session_id: &str, ttl_secs: i64) -> Result<(), ShopError> {
    conn.execute(
        "UPDATE sessions SET expires_at = ?1 WHERE id = ?2",
        params![time::now_secs() + ttl_secs, session_id],
    )?;
    Ok(())
}
