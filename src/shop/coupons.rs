use crate::core::error::ShopError;
use rusqlite::{Connection, OptionalExtension, params};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CouponKind {
    /// `value` is a whole percentage, 1..=100.
    Percent,
    /// `value` is an amount in cents.
    Fixed,
}

impl CouponKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CouponKind::Percent => "percent",
            CouponKind::Fixed => "fixed",
        }
    }

    pub fn parse(s: &str) -> Result<Self, ShopError> {
        match s {
            "percent" => Ok(CouponKind::Percent),
            "fixed" => Ok(CouponKind::Fixed),
            other => Err(ShopError::Validation(format!(
                "unknown coupon kind '{}'",
                other
            ))),
        }
    }
}

impl fmt::Display for CouponKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Coupon {
    pub id: i64,
    pub code: String,
    pub kind: CouponKind,
    pub value: i64,
    pub min_subtotal_cents: i64,
    pub expires_at: Option<i64>,
    pub usage_limit: Option<i64>,
    pub used_count: i64,
    pub is_active: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewCoupon {
    pub code: String,
    pub kind: CouponKind,
    pub value: i64,
    pub min_subtotal_cents: i64,
    pub expires_at: Option<i64>,
    pub usage_limit: Option<i64>,
}

pub fn normalize_code(code: &str) -> String {
    code.trim().to_uppercase()
}

/// Check that `coupon` may be applied to `subtotal_cents` at `now`.
pub fn validate(coupon: &Coupon, subtotal_cents: i64, now: i64) -> Result<(), ShopError> {
    if !coupon.is_active {
        return Err(ShopError::Validation(format!(
            "coupon {} is no longer active",
            coupon.code
        )));
    }
    if coupon.expires_at.is_some_and(|exp| exp <= now) {
        return Err(ShopError::Validation(format!(
            "coupon {} has expired",
            coupon.code
        )));
    }
    if coupon.usage_limit.is_some_and(|limit| coupon.used_count >= limit) {
        return Err(ShopError::Validation(format!(
            "coupon {} has been fully redeemed",
            coupon.code
        )));
    }
    if subtotal_cents < coupon.min_subtotal_cents {
        return Err(ShopError::Validation(format!(
            "coupon {} requires a subtotal of at least {} cents",
            coupon.code, coupon.min_subtotal_cents
        )));
    }
    Ok(())
}

/// Discount in cents; never exceeds the subtotal.
pub fn discount_for(coupon: &Coupon, subtotal_cents: i64) -> i64 {
    let raw = match coupon.kind {
        CouponKind::Percent => subtotal_cents * coupon.value.clamp(0, 100) / 100,
        CouponKind::Fixed => coupon.value,
    };
    raw.clamp(0, subtotal_cents.max(0))
}

fn coupon_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Coupon> {
    let kind: String = row.get(2)?;
    let kind = CouponKind::parse(&kind).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(2, rusqlite::types::Type::Text, Box::new(e))
    })?;
    Ok(Coupon {
        id: row.get(0)?,
        code: row.get(1)?,
        kind,
        value: row.get(3)?,
        min_subtotal_cents: row.get(4)?,
        expires_at: row.get(5)?,
        usage_limit: row.get(6)?,
        used_count: row.get(7)?,
        is_active: row.get::<_, i64>(8)? != 0,
    })
}

const COUPON_COLUMNS: &str = "id, code, kind, value, min_subtotal_cents, expires_at, usage_limit, used_count, is_active";

pub fn find_by_code(conn: &Connection, code: &str) -> Result<Option<Coupon>, ShopError> {
    let coupon = conn
        .query_row(
            &format!("SELECT {} FROM coupons WHERE code = ?1", COUPON_COLUMNS),
            [normalize_code(code)],
            coupon_from_row,
        )
        .optional()?;
    Ok(coupon)
}

/// Look up and validate in one step, mapping an unknown code to Validation.
pub fn resolve(
    conn: &Connection,
    code: &str,
    subtotal_cents: i64,
    now: i64,
) -> Result<Coupon, ShopError> {
    let coupon = find_by_code(conn, code)?.ok_or_else(|| {
        ShopError::Validation(format!("coupon {} does not exist", normalize_code(code)))
    })?;
    validate(&coupon, subtotal_cents, now)?;
    Ok(coupon)
}

pub fn list_coupons(conn: &Connection) -> Result<Vec<Coupon>, ShopError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM coupons ORDER BY code",
        COUPON_COLUMNS
    ))?;
    let rows = stmt.query_map([], coupon_from_row)?;
    let mut out = Vec::new();
    for r in rows {
        out.push(r?);
    }
    Ok(out)
}

pub fn create_coupon(conn: &Connection, new: &NewCoupon) -> Result<Coupon, ShopError> {
    let code = normalize_code(&new.code);
    if code.is_empty() || !code.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
        return Err(ShopError::Validation(
            "coupon code must be letters, digits or dashes".into(),
        ));
    }
    if new.value <= 0 {
        return Err(ShopError::Validation("coupon value must be positive".into()));
    }
    if new.kind == CouponKind::Percent && new.value > 100 {
        return Err(ShopError::Validation(
            "percentage coupons cannot exceed 100".into(),
        ));
    }
    if new.min_subtotal_cents < 0 || new.usage_limit.is_some_and(|l| l <= 0) {
        return Err(ShopError::Validation(
            "minimum subtotal and usage limit must be positive".into(),
        ));
    }
    if find_by_code(conn, &code)?.is_some() {
        return Err(ShopError::Conflict(format!("coupon {} already exists", code)));
    }
    conn.execute(
        "INSERT INTO coupons(code, kind, value, min_subtotal_cents, expires_at, usage_limit, used_count, is_active)
         VALUES(?1, ?2, ?3, ?4, ?5, ?6, 0, 1)",
        params![
            code,
            new.kind.as_str(),
            new.value,
            new.min_subtotal_cents,
            new.expires_at,
            new.usage_limit
        ],
    )?;
    find_by_code(conn, &code)?.ok_or_else(|| ShopError::NotFound(format!("coupon {}", code)))
}

pub fn set_active(conn: &Connection, id: i64, active: bool) -> Result<(), ShopError> {
    let changed = conn.execute(
        "UPDATE coupons SET is_active = ?1 WHERE id = ?2",
        params![active as i64, id],
    )?;
    if changed == 0 {
        return Err(ShopError::NotFound(format!("coupon {}", id)));
    }
    Ok(())
}

pub fn toggle_active(conn: &Connection, id: i64) -> Result<bool, ShopError> {
    let current: Option<i64> = conn
        .query_row("SELECT is_active FROM coupons WHERE id = ?1", [id], |row| {
            row.get(0)
        })
        .optional()?;
    let current = current.ok_or_else(|| ShopError::NotFound(format!("coupon {}", id)))?;
    let next = current == 0;
    set_active(conn, id, next)?;
    Ok(next)
}

pub fn delete_coupon(conn: &Connection, id: i64) -> Result<(), ShopError> {
    let changed = conn.execute("DELETE FROM coupons WHERE id = ?1", [id])?;
    if changed == 0 {
        return Err(ShopError::NotFound(format!("coupon {}", id)));
    }
    Ok(())
}

/// Count one redemption. Used inside the checkout transaction.
pub fn record_use(conn: &Connection, id: i64) -> Result<(), ShopError> {
    conn.execute(
        "UPDATE coupons SET used_count = used_count + 1 WHERE id = ?1",
        [id],
    )?;
    Ok(())
}
