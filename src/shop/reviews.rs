use crate::core::error::ShopError;
use crate::core::time;
use rusqlite::{Connection, OptionalExtension, params};
use serde::{Deserialize, Serialize};

pub const MAX_REVIEW_CHARS: usize = 2000;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Review {
    pub id: i64,
    pub product_id: i64,
    pub user_id: i64,
    pub author_name: String,
    pub rating: i64,
    pub body: String,
    pub created_at: i64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct RatingSummary {
    pub average: f64,
    pub count: i64,
}

pub fn add_review(
    conn: &Connection,
    user_id: i64,
    product_id: i64,
    rating: i64,
    body: &str,
) -> Result<Review, ShopError> {
    if !(1..=5).contains(&rating) {
        return Err(ShopError::Validation("rating must be between 1 and 5".into()));
    }
    let body = body.trim();
    if body.chars().count() > MAX_REVIEW_CHARS {
        return Err(ShopError::Validation(format!(
            "reviews are limited to {} characters",
            MAX_REVIEW_CHARS
        )));
    }
    let existing: i64 = conn.query_row(
        "SELECT COUNT(*) FROM reviews WHERE product_id = ?1 AND user_id = ?2",
        params![product_id, user_id],
        |row| row.get(0),
    )?;
    if existing > 0 {
        return Err(ShopError::Conflict(
            "you have already reviewed this product".into(),
        ));
    }

    conn.execute(
        "INSERT INTO reviews(product_id, user_id, rating, body, created_at) VALUES(?1, ?2, ?3, ?4, ?5)",
        params![product_id, user_id, rating, body, time::now_secs()],
    )?;
    let id = conn.last_insert_rowid();
    let review = conn.query_row(
        "SELECT r.id, r.product_id, r.user_id, u.name, r.rating, r.body, r.created_at
         FROM reviews r JOIN users u ON u.id = r.user_id WHERE r.id = ?1",
        [id],
        review_from_row,
    )?;
    Ok(review)
}

fn review_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Review> {
    Ok(Review {
        id: row.get(0)?,
        product_id: row.get(1)?,
        user_id: row.get(2)?,
        author_name: row.get(3)?,
        rating: row.get(4)?,
        body: row.get(5)?,
        created_at: row.get(6)?,
    })
}

pub fn list_reviews(conn: &Connection, product_id: i64) -> Result<Vec<Review>, ShopError> {
    let mut stmt = conn.prepare(
        "SELECT r.id, r.product_id, r.user_id, u.name, r.rating, r.body, r.created_at
         FROM reviews r JOIN users u ON u.id = r.user_id
         WHERE r.product_id = ?1
         ORDER BY r.created_at DESC, r.id DESC",
    )?;
    let rows = stmt.query_map([product_id], review_from_row)?;
    let mut out = Vec::new();
    for r in rows {
        out.push(r?);
    }
    Ok(out)
}

pub fn rating_summary(conn: &Connection, product_id: i64) -> Result<RatingSummary, ShopError> {
    let (avg, count): (Option<f64>, i64) = conn.query_row(
        "SELECT AVG(rating), COUNT(*) FROM reviews WHERE product_id = ?1",
        [product_id],
        |row| Ok((row.get(0)?, row.get(1)?)),
    )?;
    Ok(RatingSummary {
        average: avg.unwrap_or(0.0),
        count,
    })
}

/// Moderation delete. Returns the product the review belonged to.
pub fn delete_review(conn: &Connection, id: i64) -> Result<i64, ShopError> {
    let product_id: i64 = conn
        .query_row("SELECT product_id FROM reviews WHERE id = ?1", [id], |row| {
            row.get(0)
        })
        .optional()?
        .ok_or_else(|| ShopError::NotFound(format!("review {}", id)))?;
    conn.execute("DELETE FROM reviews WHERE id = ?1", [id])?;
    Ok(product_id)
}
