use crate::core::error::ShopError;
use crate::core::time;
use regex::Regex;
use rusqlite::{Connection, OptionalExtension, Row, params};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::sync::LazyLock;
use ulid::Ulid;

pub const MIN_PASSWORD_LEN: usize = 8;
const HASH_SCHEME: &str = "sha256";
const HASH_ITERATIONS: u32 = 10_000;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct User {
    pub id: i64,
    pub email: String,
    pub name: String,
    pub is_admin: bool,
    pub created_at: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Address {
    pub id: i64,
    pub user_id: i64,
    pub label: String,
    pub line1: String,
    pub line2: String,
    pub city: String,
    pub postal_code: String,
    pub country: String,
    pub is_default: bool,
}

impl Address {
    /// Single-line rendering stored on orders as the shipping snapshot.
    pub fn one_line(&self) -> String {
        let mut parts = vec![self.line1.as_str()];
        if !self.line2.trim().is_empty() {
            parts.push(self.line2.as_str());
        }
        parts.push(self.city.as_str());
        parts.push(self.postal_code.as_str());
        parts.push(self.country.as_str());
        parts.join(", ")
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewAddress {
    #[serde(default)]
    pub label: String,
    pub line1: String,
    #[serde(default)]
    pub line2: String,
    pub city: String,
    pub postal_code: String,
    pub country: String,
}

static EMAIL_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap());

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        email: row.get(1)?,
        name: row.get(2)?,
        is_admin: row.get::<_, i64>(3)? != 0,
        created_at: row.get(4)?,
    })
}

const USER_COLUMNS: &str = "id, email, name, is_admin, created_at";

// --- password hashing ---

fn digest(salt: &str, password: &str, iterations: u32) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(password.as_bytes());
    let mut out = hasher.finalize();
    for _ in 1..iterations {
        let mut h = Sha256::new();
        h.update(out);
        h.update(salt.as_bytes());
        out = h.finalize();
    }
    format!("{:x}", out)
}

pub fn hash_password(password: &str) -> String {
    let salt = Ulid::new().to_string();
    format!(
        "{}${}${}${}",
        HASH_SCHEME,
        HASH_ITERATIONS,
        salt,
        digest(&salt, password, HASH_ITERATIONS)
    )
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

pub fn verify_password(password: &str, stored: &str) -> bool {
    let parts: Vec<&str> = stored.split('$').collect();
    let [scheme, iters, salt, expected] = parts.as_slice() else {
        return false;
    };
    if *scheme != HASH_SCHEME {
        return false;
    }
    let Ok(iterations) = iters.parse::<u32>() else {
        return false;
    };
    let actual = digest(salt, password, iterations.max(1));
    constant_time_eq(actual.as_bytes(), expected.as_bytes())
}

// --- users ---

pub fn register(
    conn: &Connection,
    email: &str,
    name: &str,
    password: &str,
) -> Result<User, ShopError> {
    let email = normalize_email(email);
    let name = name.trim();
    if !EMAIL_PATTERN.is_match(&email) {
        return Err(ShopError::Validation("enter a valid email address".into()));
    }
    if name.is_empty() {
        return Err(ShopError::Validation("name is required".into()));
    }
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ShopError::Validation(format!(
            "password must be at least {} characters",
            MIN_PASSWORD_LEN
        )));
    }
    if find_by_email(conn, &email)?.is_some() {
        return Err(ShopError::Conflict(format!(
            "an account for {} already exists",
            email
        )));
    }

    let now = time::now_secs();
    conn.execute(
        "INSERT INTO users(email, name, password_hash, is_admin, created_at) VALUES(?1, ?2, ?3, 0, ?4)",
        params![email, name, hash_password(password), now],
    )?;
    Ok(User {
        id: conn.last_insert_rowid(),
        email,
        name: name.to_string(),
        is_admin: false,
        created_at: now,
    })
}

pub fn authenticate(conn: &Connection, email: &str, password: &str) -> Result<User, ShopError> {
    let email = normalize_email(email);
    let found: Option<(User, String)> = conn
        .query_row(
            &format!("SELECT {}, password_hash FROM users WHERE email = ?1", USER_COLUMNS),
            [&email],
            |row| Ok((user_from_row(row)?, row.get::<_, String>(5)?)),
        )
        .optional()?;

    match found {
        Some((user, hash)) if verify_password(password, &hash) => Ok(user),
        _ => Err(ShopError::Unauthorized),
    }
}

pub fn find_by_email(conn: &Connection, email: &str) -> Result<Option<User>, ShopError> {
    let user = conn
        .query_row(
            &format!("SELECT {} FROM users WHERE email = ?1", USER_COLUMNS),
            [normalize_email(email)],
            user_from_row,
        )
        .optional()?;
    Ok(user)
}

pub fn get_user(conn: &Connection, id: i64) -> Result<Option<User>, ShopError> {
    let user = conn
        .query_row(
            &format!("SELECT {} FROM users WHERE id = ?1", USER_COLUMNS),
            [id],
            user_from_row,
        )
        .optional()?;
    Ok(user)
}

pub fn list_users(conn: &Connection) -> Result<Vec<User>, ShopError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM users ORDER BY created_at DESC, id DESC",
        USER_COLUMNS
    ))?;
    let rows = stmt.query_map([], user_from_row)?;
    let mut out = Vec::new();
    for r in rows {
        out.push(r?);
    }
    Ok(out)
}

/// Grant or revoke admin. `acting_user_id` may not revoke their own flag.
pub fn set_admin(
    conn: &Connection,
    acting_user_id: i64,
    user_id: i64,
    is_admin: bool,
) -> Result<User, ShopError> {
    if acting_user_id == user_id && !is_admin {
        return Err(ShopError::Forbidden(
            "you cannot revoke your own admin access".into(),
        ));
    }
    let changed = conn.execute(
        "UPDATE users SET is_admin = ?1 WHERE id = ?2",
        params![is_admin as i64, user_id],
    )?;
    if changed == 0 {
        return Err(ShopError::NotFound(format!("user {}", user_id)));
    }
    get_user(conn, user_id)?.ok_or_else(|| ShopError::NotFound(format!("user {}", user_id)))
}

/// Create an admin account, or promote and re-password an existing one.
pub fn upsert_admin(
    conn: &Connection,
    email: &str,
    name: &str,
    password: &str,
) -> Result<User, ShopError> {
    if let Some(existing) = find_by_email(conn, email)? {
        if password.chars().count() < MIN_PASSWORD_LEN {
            return Err(ShopError::Validation(format!(
                "password must be at least {} characters",
                MIN_PASSWORD_LEN
            )));
        }
        conn.execute(
            "UPDATE users SET is_admin = 1, password_hash = ?1 WHERE id = ?2",
            params![hash_password(password), existing.id],
        )?;
        return get_user(conn, existing.id)?
            .ok_or_else(|| ShopError::NotFound(format!("user {}", existing.id)));
    }
    let user = register(conn, email, name, password)?;
    conn.execute("UPDATE users SET is_admin = 1 WHERE id = ?1", [user.id])?;
    Ok(User {
        is_admin: true,
        ..user
    })
}

pub fn count_users(conn: &Connection) -> Result<i64, ShopError> {
    Ok(conn.query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))?)
}

// --- addresses ---

fn address_from_row(row: &Row<'_>) -> rusqlite::Result<Address> {
    Ok(Address {
        id: row.get(0)?,
        user_id: row.get(1)?,
        label: row.get(2)?,
        line1: row.get(3)?,
        line2: row.get(4)?,
        city: row.get(5)?,
        postal_code: row.get(6)?,
        country: row.get(7)?,
        is_default: row.get::<_, i64>(8)? != 0,
    })
}

const ADDRESS_COLUMNS: &str =
    "id, user_id, label, line1, line2, city, postal_code, country, is_default";

pub fn add_address(conn: &Connection, user_id: i64, new: &NewAddress) -> Result<Address, ShopError> {
    for (field, value) in [
        ("street address", &new.line1),
        ("city", &new.city),
        ("postal code", &new.postal_code),
        ("country", &new.country),
    ] {
        if value.trim().is_empty() {
            return Err(ShopError::Validation(format!("{} is required", field)));
        }
    }

    let existing: i64 = conn.query_row(
        "SELECT COUNT(*) FROM addresses WHERE user_id = ?1",
        [user_id],
        |row| row.get(0),
    )?;
    let is_default = existing == 0;

    conn.execute(
        "INSERT INTO addresses(user_id, label, line1, line2, city, postal_code, country, is_default)
         VALUES(?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            user_id,
            new.label.trim(),
            new.line1.trim(),
            new.line2.trim(),
            new.city.trim(),
            new.postal_code.trim(),
            new.country.trim(),
            is_default as i64
        ],
    )?;
    let id = conn.last_insert_rowid();
    get_address(conn, user_id, id)
}

pub fn list_addresses(conn: &Connection, user_id: i64) -> Result<Vec<Address>, ShopError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM addresses WHERE user_id = ?1 ORDER BY is_default DESC, id ASC",
        ADDRESS_COLUMNS
    ))?;
    let rows = stmt.query_map([user_id], address_from_row)?;
    let mut out = Vec::new();
    for r in rows {
        out.push(r?);
    }
    Ok(out)
}

/// Fetch an address owned by `user_id`; another user's address is NotFound.
pub fn get_address(conn: &Connection, user_id: i64, id: i64) -> Result<Address, ShopError> {
    conn.query_row(
        &format!(
            "SELECT {} FROM addresses WHERE id = ?1 AND user_id = ?2",
            ADDRESS_COLUMNS
        ),
        params![id, user_id],
        address_from_row,
    )
    .optional()?
    .ok_or_else(|| ShopError::NotFound(format!("address {}", id)))
}

pub fn delete_address(conn: &Connection, user_id: i64, id: i64) -> Result<(), ShopError> {
    let address = get_address(conn, user_id, id)?;
    conn.execute("DELETE FROM addresses WHERE id = ?1", [id])?;
    if address.is_default {
        // Promote the oldest remaining address.
        conn.execute(
            "UPDATE addresses SET is_default = 1
             WHERE id = (SELECT id FROM addresses WHERE user_id = ?1 ORDER BY id ASC LIMIT 1)",
            [user_id],
        )?;
    }
    Ok(())
}

pub fn set_default_address(conn: &Connection, user_id: i64, id: i64) -> Result<(), ShopError> {
    get_address(conn, user_id, id)?;
    let tx = conn.unchecked_transaction()?;
    tx.execute(
        "UPDATE addresses SET is_default = 0 WHERE user_id = ?1",
        [user_id],
    )?;
    tx.execute("UPDATE addresses SET is_default = 1 WHERE id = ?1", [id])?;
    tx.commit()?;
    Ok(())
}
