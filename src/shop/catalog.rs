//! Categories and products.

use crate::core::error::ShopError;
use crate::core::time;
use rusqlite::types::Value;
use rusqlite::{Connection, OptionalExtension, Row, params, params_from_iter};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Category {
    pub id: i64,
    pub name: String,
    pub slug: String,
    pub description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Product {
    pub id: i64,
    pub category_id: Option<i64>,
    pub name: String,
    pub slug: String,
    pub description: String,
    pub price_cents: i64,
    pub stock: i64,
    pub is_active: bool,
    pub created_at: i64,
}

impl Product {
    pub fn in_stock(&self) -> bool {
        self.stock > 0
    }
}

/// Editable product fields, shared by create and update.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProductInput {
    pub name: String,
    pub category_id: Option<i64>,
    pub description: String,
    pub price_cents: i64,
    pub stock: i64,
    pub is_active: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductSort {
    #[default]
    Newest,
    PriceAsc,
    PriceDesc,
    Name,
}

impl ProductSort {
    pub fn parse(s: &str) -> Self {
        match s {
            "price_asc" => Self::PriceAsc,
            "price_desc" => Self::PriceDesc,
            "name" => Self::Name,
            _ => Self::Newest,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Newest => "newest",
            Self::PriceAsc => "price_asc",
            Self::PriceDesc => "price_desc",
            Self::Name => "name",
        }
    }

    fn order_by(&self) -> &'static str {
        match self {
            Self::Newest => "p.created_at DESC, p.id DESC",
            Self::PriceAsc => "p.price_cents ASC, p.id ASC",
            Self::PriceDesc => "p.price_cents DESC, p.id ASC",
            Self::Name => "p.name COLLATE NOCASE ASC, p.id ASC",
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ProductQuery {
    pub category_slug: Option<String>,
    pub search: Option<String>,
    pub sort: ProductSort,
    pub page: i64,
    pub per_page: i64,
    pub active_only: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: i64,
    pub per_page: i64,
    pub total: i64,
}

impl<T> Page<T> {
    pub fn total_pages(&self) -> i64 {
        if self.per_page <= 0 {
            return 1;
        }
        ((self.total + self.per_page - 1) / self.per_page).max(1)
    }

    pub fn has_next(&self) -> bool {
        self.page < self.total_pages()
    }

    pub fn has_prev(&self) -> bool {
        self.page > 1
    }
}

/// Lowercase ASCII alphanumerics joined by single dashes.
pub fn slugify(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut pending_dash = false;
    for c in input.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_dash && !out.is_empty() {
                out.push('-');
            }
            pending_dash = false;
            out.push(c.to_ascii_lowercase());
        } else {
            pending_dash = true;
        }
    }
    out
}

/// First free slug among `base`, `base-2`, `base-3`, ... in `table`,
/// ignoring the row `exclude_id` (the row being renamed).
fn unique_slug(
    conn: &Connection,
    table: &str,
    name: &str,
    exclude_id: Option<i64>,
) -> Result<String, ShopError> {
    let base = match slugify(name) {
        s if s.is_empty() => "item".to_string(),
        s => s,
    };
    let sql = format!(
        "SELECT COUNT(*) FROM {} WHERE slug = ?1 AND id != ?2",
        table
    );
    let mut candidate = base.clone();
    let mut n = 2;
    loop {
        let taken: i64 =
            conn.query_row(&sql, params![candidate, exclude_id.unwrap_or(-1)], |row| {
                row.get(0)
            })?;
        if taken == 0 {
            return Ok(candidate);
        }
        candidate = format!("{}-{}", base, n);
        n += 1;
    }
}

// --- categories ---

fn category_from_row(row: &Row<'_>) -> rusqlite::Result<Category> {
    Ok(Category {
        id: row.get(0)?,
        name: row.get(1)?,
        slug: row.get(2)?,
        description: row.get(3)?,
    })
}

pub fn list_categories(conn: &Connection) -> Result<Vec<Category>, ShopError> {
    let mut stmt = conn.prepare(
        "SELECT id, name, slug, description FROM categories ORDER BY name COLLATE NOCASE",
    )?;
    let rows = stmt.query_map([], category_from_row)?;
    let mut out = Vec::new();
    for r in rows {
        out.push(r?);
    }
    Ok(out)
}

pub fn get_category(conn: &Connection, id: i64) -> Result<Category, ShopError> {
    conn.query_row(
        "SELECT id, name, slug, description FROM categories WHERE id = ?1",
        [id],
        category_from_row,
    )
    .optional()?
    .ok_or_else(|| ShopError::NotFound(format!("category {}", id)))
}

pub fn get_category_by_slug(conn: &Connection, slug: &str) -> Result<Category, ShopError> {
    conn.query_row(
        "SELECT id, name, slug, description FROM categories WHERE slug = ?1",
        [slug],
        category_from_row,
    )
    .optional()?
    .ok_or_else(|| ShopError::NotFound(format!("category '{}'", slug)))
}

pub fn create_category(
    conn: &Connection,
    name: &str,
    description: &str,
) -> Result<Category, ShopError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(ShopError::Validation("category name is required".into()));
    }
    let slug = unique_slug(conn, "categories", name, None)?;
    conn.execute(
        "INSERT INTO categories(name, slug, description) VALUES(?1, ?2, ?3)",
        params![name, slug, description.trim()],
    )?;
    get_category(conn, conn.last_insert_rowid())
}

pub fn update_category(
    conn: &Connection,
    id: i64,
    name: &str,
    description: &str,
) -> Result<Category, ShopError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(ShopError::Validation("category name is required".into()));
    }
    let current = get_category(conn, id)?;
    let slug = if current.name == name {
        current.slug
    } else {
        unique_slug(conn, "categories", name, Some(id))?
    };
    conn.execute(
        "UPDATE categories SET name = ?1, slug = ?2, description = ?3 WHERE id = ?4",
        params![name, slug, description.trim(), id],
    )?;
    get_category(conn, id)
}

/// Refused while any product still references the category.
pub fn delete_category(conn: &Connection, id: i64) -> Result<(), ShopError> {
    let category = get_category(conn, id)?;
    let in_use: i64 = conn.query_row(
        "SELECT COUNT(*) FROM products WHERE category_id = ?1",
        [id],
        |row| row.get(0),
    )?;
    if in_use > 0 {
        return Err(ShopError::Conflict(format!(
            "category '{}' still has {} product(s)",
            category.name, in_use
        )));
    }
    conn.execute("DELETE FROM categories WHERE id = ?1", [id])?;
    Ok(())
}

/// Every category with the number of products filed under it.
pub fn category_counts(conn: &Connection) -> Result<Vec<(Category, i64)>, ShopError> {
    let mut stmt = conn.prepare(
        "SELECT c.id, c.name, c.slug, c.description, COUNT(p.id)
         FROM categories c LEFT JOIN products p ON p.category_id = c.id
         GROUP BY c.id ORDER BY c.name COLLATE NOCASE",
    )?;
    let rows = stmt.query_map([], |row| Ok((category_from_row(row)?, row.get(4)?)))?;
    let mut out = Vec::new();
    for r in rows {
        out.push(r?);
    }
    Ok(out)
}

// --- products ---

const PRODUCT_COLUMNS: &str = "p.id, p.category_id, p.name, p.slug, p.description, p.price_cents, p.stock, p.is_active, p.created_at";

pub(crate) fn product_from_row(row: &Row<'_>) -> rusqlite::Result<Product> {
    Ok(Product {
        id: row.get(0)?,
        category_id: row.get(1)?,
        name: row.get(2)?,
        slug: row.get(3)?,
        description: row.get(4)?,
        price_cents: row.get(5)?,
        stock: row.get(6)?,
        is_active: row.get::<_, i64>(7)? != 0,
        created_at: row.get(8)?,
    })
}

pub fn list_products(conn: &Connection, query: &ProductQuery) -> Result<Page<Product>, ShopError> {
    let per_page = query.per_page.clamp(1, 100);
    let page = query.page.max(1);

    let mut clauses: Vec<&str> = Vec::new();
    let mut args: Vec<Value> = Vec::new();

    if query.active_only {
        clauses.push("p.is_active = 1");
    }
    if let Some(slug) = query.category_slug.as_deref().filter(|s| !s.is_empty()) {
        clauses.push("c.slug = ?");
        args.push(Value::Text(slug.to_string()));
    }
    if let Some(term) = query
        .search
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
    {
        clauses.push("(p.name LIKE ? ESCAPE '\\' OR p.description LIKE ? ESCAPE '\\')");
        let pattern = format!("%{}%", escape_like(term));
        args.push(Value::Text(pattern.clone()));
        args.push(Value::Text(pattern));
    }

    let where_sql = if clauses.is_empty() {
        String::new()
    } else {
        format!("WHERE {}", clauses.join(" AND "))
    };
    let from_sql = format!(
        "FROM products p LEFT JOIN categories c ON c.id = p.category_id {}",
        where_sql
    );

    let total: i64 = conn.query_row(
        &format!("SELECT COUNT(*) {}", from_sql),
        params_from_iter(args.iter()),
        |row| row.get(0),
    )?;

    let mut page_args = args.clone();
    page_args.push(Value::Integer(per_page));
    page_args.push(Value::Integer((page - 1) * per_page));
    let mut stmt = conn.prepare(&format!(
        "SELECT {} {} ORDER BY {} LIMIT ? OFFSET ?",
        PRODUCT_COLUMNS,
        from_sql,
        query.sort.order_by()
    ))?;
    let rows = stmt.query_map(params_from_iter(page_args.iter()), product_from_row)?;
    let mut items = Vec::new();
    for r in rows {
        items.push(r?);
    }

    Ok(Page {
        items,
        page,
        per_page,
        total,
    })
}

fn escape_like(term: &str) -> String {
    term.replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

pub fn get_product(conn: &Connection, id: i64) -> Result<Product, ShopError> {
    conn.query_row(
        &format!("SELECT {} FROM products p WHERE p.id = ?1", PRODUCT_COLUMNS),
        [id],
        product_from_row,
    )
    .optional()?
    .ok_or_else(|| ShopError::NotFound(format!("product {}", id)))
}

/// Product lookup for shoppers: inactive products are NotFound.
pub fn get_visible_product(conn: &Connection, id: i64) -> Result<Product, ShopError> {
    let product = get_product(conn, id)?;
    if !product.is_active {
        return Err(ShopError::NotFound(format!("product {}", id)));
    }
    Ok(product)
}

pub fn get_product_by_slug(
    conn: &Connection,
    slug: &str,
    include_inactive: bool,
) -> Result<Product, ShopError> {
    let product = conn
        .query_row(
            &format!("SELECT {} FROM products p WHERE p.slug = ?1", PRODUCT_COLUMNS),
            [slug],
            product_from_row,
        )
        .optional()?
        .filter(|p| include_inactive || p.is_active);
    product.ok_or_else(|| ShopError::NotFound(format!("product '{}'", slug)))
}

fn validate_product(conn: &Connection, input: &ProductInput) -> Result<(), ShopError> {
    if input.name.trim().is_empty() {
        return Err(ShopError::Validation("product name is required".into()));
    }
    if input.price_cents < 0 {
        return Err(ShopError::Validation("price cannot be negative".into()));
    }
    if input.stock < 0 {
        return Err(ShopError::Validation("stock cannot be negative".into()));
    }
    if let Some(cid) = input.category_id {
        get_category(conn, cid)?;
    }
    Ok(())
}

pub fn create_product(conn: &Connection, input: &ProductInput) -> Result<Product, ShopError> {
    validate_product(conn, input)?;
    let name = input.name.trim();
    let slug = unique_slug(conn, "products", name, None)?;
    conn.execute(
        "INSERT INTO products(category_id, name, slug, description, price_cents, stock, is_active, created_at)
         VALUES(?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            input.category_id,
            name,
            slug,
            input.description.trim(),
            input.price_cents,
            input.stock,
            input.is_active as i64,
            time::now_secs()
        ],
    )?;
    get_product(conn, conn.last_insert_rowid())
}

pub fn update_product(
    conn: &Connection,
    id: i64,
    input: &ProductInput,
) -> Result<Product, ShopError> {
    validate_product(conn, input)?;
    let current = get_product(conn, id)?;
    let name = input.name.trim();
    let slug = if current.name == name {
        current.slug
    } else {
        unique_slug(conn, "products", name, Some(id))?
    };
    conn.execute(
        "UPDATE products SET category_id = ?1, name = ?2, slug = ?3, description = ?4,
             price_cents = ?5, stock = ?6, is_active = ?7
         WHERE id = ?8",
        params![
            input.category_id,
            name,
            slug,
            input.description.trim(),
            input.price_cents,
            input.stock,
            input.is_active as i64,
            id
        ],
    )?;
    get_product(conn, id)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProductRemoval {
    Deleted,
    Deactivated,
}

/// Delete a product, or deactivate it when past orders reference it.
pub fn delete_product(conn: &Connection, id: i64) -> Result<ProductRemoval, ShopError> {
    get_product(conn, id)?;
    let ordered: i64 = conn.query_row(
        "SELECT COUNT(*) FROM order_items WHERE product_id = ?1",
        [id],
        |row| row.get(0),
    )?;
    if ordered > 0 {
        conn.execute("UPDATE products SET is_active = 0 WHERE id = ?1", [id])?;
        return Ok(ProductRemoval::Deactivated);
    }
    conn.execute("DELETE FROM products WHERE id = ?1", [id])?;
    Ok(ProductRemoval::Deleted)
}

pub fn low_stock(conn: &Connection, threshold: i64) -> Result<Vec<Product>, ShopError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM products p WHERE p.is_active = 1 AND p.stock <= ?1 ORDER BY p.stock ASC, p.name",
        PRODUCT_COLUMNS
    ))?;
    let rows = stmt.query_map([threshold], product_from_row)?;
    let mut out = Vec::new();
    for r in rows {
        out.push(r?);
    }
    Ok(out)
}
