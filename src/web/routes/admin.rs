//! Back-office, nested under `/admin` behind `session::admin_guard`.

use super::PageParams;
use crate::core::error::ShopError;
use crate::core::{output, time};
use crate::shop::catalog::{self, ProductInput, ProductQuery, ProductRemoval, ProductSort};
use crate::shop::coupons::{self, CouponKind, NewCoupon};
use crate::shop::orders::{self, OrderStatus};
use crate::shop::{accounts, analytics, reviews};
use crate::web::AppState;
use crate::web::error::WebResult;
use crate::web::session::{self, Ctx};
use crate::web::views::{self, url_encode};
use axum::Router;
use axum::extract::{Extension, Form, Path, Query, State};
use axum::middleware;
use axum::response::{Html, Redirect};
use axum::routing::{get, post};
use serde::Deserialize;

const DEFAULT_DASHBOARD_DAYS: i64 = 14;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(dashboard))
        .route("/products", get(products))
        .route("/products/new", get(new_product_form).post(create_product))
        .route("/products/:id/edit", get(edit_product_form).post(update_product))
        .route("/products/:id/delete", post(delete_product))
        .route("/categories", get(categories).post(create_category))
        .route("/categories/:id/edit", post(update_category))
        .route("/categories/:id/delete", post(delete_category))
        .route("/orders", get(order_list))
        .route("/orders/:number", get(order_detail))
        .route("/orders/:number/status", post(order_status))
        .route("/users", get(users))
        .route("/users/:id/admin", post(set_admin))
        .route("/coupons", get(coupon_list).post(create_coupon))
        .route("/coupons/:id/toggle", post(toggle_coupon))
        .route("/coupons/:id/delete", post(delete_coupon))
        .route("/reviews/:id/delete", post(delete_review))
        .route_layer(middleware::from_fn(session::admin_guard))
}

// --- dashboard ---

#[derive(Debug, Default, Deserialize)]
pub struct DashboardParams {
    pub days: Option<i64>,
}

async fn dashboard(
    State(state): State<AppState>,
    Extension(ctx): Extension<Ctx>,
    Query(params): Query<DashboardParams>,
) -> WebResult<Html<String>> {
    let days = params.days.unwrap_or(DEFAULT_DASHBOARD_DAYS).clamp(1, 90);
    let data = state
        .read(move |conn| analytics::dashboard(conn, time::now_secs(), days))
        .await?;
    let chrome = session::chrome(&state, &ctx).await?;
    Ok(views::admin::dashboard(&chrome, &data, days))
}

// --- products ---

async fn products(
    State(state): State<AppState>,
    Extension(ctx): Extension<Ctx>,
    Query(params): Query<PageParams>,
) -> WebResult<Html<String>> {
    let query = ProductQuery {
        sort: ProductSort::Name,
        page: params.page(),
        per_page: state.config.page_size * 2,
        active_only: false,
        ..ProductQuery::default()
    };
    let (page, categories) = state
        .read(move |conn| {
            Ok((
                catalog::list_products(conn, &query)?,
                catalog::list_categories(conn)?,
            ))
        })
        .await?;
    let chrome = session::chrome(&state, &ctx).await?;
    Ok(views::admin::products(&chrome, &page, &categories))
}

/// Raw product form. Prices arrive as text (`12.50`), the category as an
/// optional id and the active flag as a checkbox.
#[derive(Debug, Deserialize)]
pub struct ProductForm {
    pub name: String,
    #[serde(default)]
    pub category_id: String,
    pub price: String,
    #[serde(default)]
    pub stock: String,
    #[serde(default)]
    pub description: String,
    pub is_active: Option<String>,
}

impl ProductForm {
    pub fn into_input(self) -> Result<ProductInput, ShopError> {
        let price_cents = output::parse_money(&self.price).ok_or_else(|| {
            ShopError::Validation(format!("'{}' is not a valid price", self.price.trim()))
        })?;
        let stock = match self.stock.trim() {
            "" => 0,
            s => s
                .parse()
                .map_err(|_| ShopError::Validation(format!("'{}' is not a valid stock count", s)))?,
        };
        let category_id = match self.category_id.trim() {
            "" => None,
            s => Some(
                s.parse()
                    .map_err(|_| ShopError::Validation("unknown category".into()))?,
            ),
        };
        Ok(ProductInput {
            name: self.name,
            category_id,
            description: self.description,
            price_cents,
            stock,
            is_active: self.is_active.is_some(),
        })
    }
}

async fn new_product_form(
    State(state): State<AppState>,
    Extension(ctx): Extension<Ctx>,
) -> WebResult<Html<String>> {
    let categories = state.read(catalog::list_categories).await?;
    let chrome = session::chrome(&state, &ctx).await?;
    Ok(views::admin::product_form(&chrome, None, &categories))
}

async fn create_product(
    State(state): State<AppState>,
    Extension(ctx): Extension<Ctx>,
    Form(form): Form<ProductForm>,
) -> WebResult<Redirect> {
    let result = state
        .write(ctx.actor(), "catalog.create_product", move |conn| {
            catalog::create_product(conn, &form.into_input()?)
        })
        .await;
    session::finish(
        &state,
        &ctx,
        result,
        |p| Some(format!("Created {}.", p.name)),
        "/admin/products",
        "/admin/products/new",
    )
    .await
}

async fn edit_product_form(
    State(state): State<AppState>,
    Extension(ctx): Extension<Ctx>,
    Path(id): Path<i64>,
) -> WebResult<Html<String>> {
    let (product, categories) = state
        .read(move |conn| {
            Ok((
                catalog::get_product(conn, id)?,
                catalog::list_categories(conn)?,
            ))
        })
        .await?;
    let chrome = session::chrome(&state, &ctx).await?;
    Ok(views::admin::product_form(&chrome, Some(&product), &categories))
}

async fn update_product(
    State(state): State<AppState>,
    Extension(ctx): Extension<Ctx>,
    Path(id): Path<i64>,
    Form(form): Form<ProductForm>,
) -> WebResult<Redirect> {
    let result = state
        .write(ctx.actor(), "catalog.update_product", move |conn| {
            catalog::update_product(conn, id, &form.into_input()?)
        })
        .await;
    session::finish(
        &state,
        &ctx,
        result,
        |p| Some(format!("Saved {}.", p.name)),
        "/admin/products",
        &format!("/admin/products/{}/edit", id),
    )
    .await
}

async fn delete_product(
    State(state): State<AppState>,
    Extension(ctx): Extension<Ctx>,
    Path(id): Path<i64>,
) -> WebResult<Redirect> {
    let result = state
        .write(ctx.actor(), "catalog.delete_product", move |conn| {
            catalog::delete_product(conn, id)
        })
        .await;
    session::finish(
        &state,
        &ctx,
        result,
        |removal| {
            Some(match removal {
                ProductRemoval::Deleted => "Product deleted.".to_string(),
                ProductRemoval::Deactivated => {
                    "Product has past orders, so it was deactivated instead.".to_string()
                }
            })
        },
        "/admin/products",
        "/admin/products",
    )
    .await
}

// --- categories ---

async fn categories(
    State(state): State<AppState>,
    Extension(ctx): Extension<Ctx>,
) -> WebResult<Html<String>> {
    let list = state.read(catalog::category_counts).await?;
    let chrome = session::chrome(&state, &ctx).await?;
    Ok(views::admin::categories(&chrome, &list))
}

#[derive(Debug, Deserialize)]
pub struct CategoryForm {
    pub name: String,
    #[serde(default)]
    pub description: String,
}

async fn create_category(
    State(state): State<AppState>,
    Extension(ctx): Extension<Ctx>,
    Form(form): Form<CategoryForm>,
) -> WebResult<Redirect> {
    let result = state
        .write(ctx.actor(), "catalog.create_category", move |conn| {
            catalog::create_category(conn, &form.name, &form.description)
        })
        .await;
    session::finish(
        &state,
        &ctx,
        result,
        |c| Some(format!("Created category {}.", c.name)),
        "/admin/categories",
        "/admin/categories",
    )
    .await
}

async fn update_category(
    State(state): State<AppState>,
    Extension(ctx): Extension<Ctx>,
    Path(id): Path<i64>,
    Form(form): Form<CategoryForm>,
) -> WebResult<Redirect> {
    let result = state
        .write(ctx.actor(), "catalog.update_category", move |conn| {
            catalog::update_category(conn, id, &form.name, &form.description)
        })
        .await;
    session::finish(
        &state,
        &ctx,
        result,
        |c| Some(format!("Saved category {}.", c.name)),
        "/admin/categories",
        "/admin/categories",
    )
    .await
}

async fn delete_category(
    State(state): State<AppState>,
    Extension(ctx): Extension<Ctx>,
    Path(id): Path<i64>,
) -> WebResult<Redirect> {
    let result = state
        .write(ctx.actor(), "catalog.delete_category", move |conn| {
            catalog::delete_category(conn, id)
        })
        .await;
    session::finish(
        &state,
        &ctx,
        result,
        |_| Some("Category deleted.".into()),
        "/admin/categories",
        "/admin/categories",
    )
    .await
}

// --- orders ---

#[derive(Debug, Default, Deserialize)]
pub struct OrderParams {
    pub status: Option<String>,
    pub page: Option<i64>,
}

async fn order_list(
    State(state): State<AppState>,
    Extension(ctx): Extension<Ctx>,
    Query(params): Query<OrderParams>,
) -> WebResult<Html<String>> {
    let status = match params.status.as_deref().filter(|s| !s.is_empty()) {
        Some(s) => Some(OrderStatus::parse(s)?),
        None => None,
    };
    let page = params.page.unwrap_or(1);
    let per_page = state.config.page_size * 2;
    let list = state
        .read(move |conn| orders::list_all(conn, status, page, per_page))
        .await?;
    let chrome = session::chrome(&state, &ctx).await?;
    Ok(views::admin::orders(&chrome, &list, status))
}

async fn order_detail(
    State(state): State<AppState>,
    Extension(ctx): Extension<Ctx>,
    Path(number): Path<String>,
) -> WebResult<Html<String>> {
    let detail = state.read(move |conn| orders::get(conn, &number)).await?;
    let chrome = session::chrome(&state, &ctx).await?;
    Ok(views::admin::order_detail(&chrome, &detail))
}

#[derive(Debug, Deserialize)]
pub struct StatusForm {
    pub status: String,
}

async fn order_status(
    State(state): State<AppState>,
    Extension(ctx): Extension<Ctx>,
    Path(number): Path<String>,
    Form(form): Form<StatusForm>,
) -> WebResult<Redirect> {
    let target = format!("/admin/orders/{}", url_encode(&number));
    let result = state
        .write(ctx.actor(), "orders.update_status", move |conn| {
            let next = OrderStatus::parse(&form.status)?;
            orders::update_status(conn, &number, next)
        })
        .await;
    session::finish(
        &state,
        &ctx,
        result,
        |d| Some(format!("Order {} is now {}.", d.order.number, d.order.status)),
        &target,
        &target,
    )
    .await
}

// --- users ---

async fn users(
    State(state): State<AppState>,
    Extension(ctx): Extension<Ctx>,
) -> WebResult<Html<String>> {
    let list = state.read(accounts::list_users).await?;
    let chrome = session::chrome(&state, &ctx).await?;
    Ok(views::admin::users(&chrome, &list))
}

#[derive(Debug, Deserialize)]
pub struct AdminFlagForm {
    pub is_admin: String,
}

async fn set_admin(
    State(state): State<AppState>,
    Extension(ctx): Extension<Ctx>,
    Path(id): Path<i64>,
    Form(form): Form<AdminFlagForm>,
) -> WebResult<Redirect> {
    let acting = ctx.require_admin()?.id;
    let grant = matches!(form.is_admin.as_str(), "1" | "true" | "on");
    let result = state
        .write(ctx.actor(), "accounts.set_admin", move |conn| {
            accounts::set_admin(conn, acting, id, grant)
        })
        .await;
    session::finish(
        &state,
        &ctx,
        result,
        |u| {
            Some(if u.is_admin {
                format!("{} is now an administrator.", u.email)
            } else {
                format!("{} is no longer an administrator.", u.email)
            })
        },
        "/admin/users",
        "/admin/users",
    )
    .await
}

// --- coupons ---

async fn coupon_list(
    State(state): State<AppState>,
    Extension(ctx): Extension<Ctx>,
) -> WebResult<Html<String>> {
    let list = state.read(coupons::list_coupons).await?;
    let chrome = session::chrome(&state, &ctx).await?;
    Ok(views::admin::coupons(&chrome, &list))
}

/// Raw coupon form. `value` is a whole percent for percentage coupons and
/// a price for fixed ones; `expires_on` is the last day the code works.
#[derive(Debug, Deserialize)]
pub struct CouponForm {
    pub code: String,
    pub kind: String,
    pub value: String,
    #[serde(default)]
    pub min_subtotal: String,
    #[serde(default)]
    pub expires_on: String,
    #[serde(default)]
    pub usage_limit: String,
}

impl CouponForm {
    pub fn into_new(self) -> Result<NewCoupon, ShopError> {
        let kind = CouponKind::parse(&self.kind)?;
        let value = match kind {
            CouponKind::Percent => self.value.trim().trim_end_matches('%').parse().ok(),
            CouponKind::Fixed => output::parse_money(&self.value),
        }
        .ok_or_else(|| ShopError::Validation(format!("'{}' is not a valid amount", self.value.trim())))?;
        let min_subtotal_cents = match self.min_subtotal.trim() {
            "" => 0,
            s => output::parse_money(s)
                .ok_or_else(|| ShopError::Validation(format!("'{}' is not a valid price", s)))?,
        };
        let expires_at = match self.expires_on.trim() {
            "" => None,
            s => Some(
                time::parse_date(s)
                    .ok_or_else(|| ShopError::Validation(format!("'{}' is not a date", s)))?
                    + time::SECS_PER_DAY,
            ),
        };
        let usage_limit = match self.usage_limit.trim() {
            "" => None,
            s => Some(
                s.parse()
                    .map_err(|_| ShopError::Validation(format!("'{}' is not a number", s)))?,
            ),
        };
        Ok(NewCoupon {
            code: self.code,
            kind,
            value,
            min_subtotal_cents,
            expires_at,
            usage_limit,
        })
    }
}

async fn create_coupon(
    State(state): State<AppState>,
    Extension(ctx): Extension<Ctx>,
    Form(form): Form<CouponForm>,
) -> WebResult<Redirect> {
    let result = state
        .write(ctx.actor(), "coupons.create", move |conn| {
            coupons::create_coupon(conn, &form.into_new()?)
        })
        .await;
    session::finish(
        &state,
        &ctx,
        result,
        |c| Some(format!("Coupon {} created.", c.code)),
        "/admin/coupons",
        "/admin/coupons",
    )
    .await
}

async fn toggle_coupon(
    State(state): State<AppState>,
    Extension(ctx): Extension<Ctx>,
    Path(id): Path<i64>,
) -> WebResult<Redirect> {
    let result = state
        .write(ctx.actor(), "coupons.toggle", move |conn| {
            coupons::toggle_active(conn, id)
        })
        .await;
    session::finish(&state, &ctx, result, |_| None, "/admin/coupons", "/admin/coupons").await
}

async fn delete_coupon(
    State(state): State<AppState>,
    Extension(ctx): Extension<Ctx>,
    Path(id): Path<i64>,
) -> WebResult<Redirect> {
    let result = state
        .write(ctx.actor(), "coupons.delete", move |conn| {
            coupons::delete_coupon(conn, id)
        })
        .await;
    session::finish(
        &state,
        &ctx,
        result,
        |_| Some("Coupon deleted.".into()),
        "/admin/coupons",
        "/admin/coupons",
    )
    .await
}

// --- reviews ---

async fn delete_review(
    State(state): State<AppState>,
    Extension(ctx): Extension<Ctx>,
    Path(id): Path<i64>,
) -> WebResult<Redirect> {
    let result = state
        .write(ctx.actor(), "reviews.delete", move |conn| {
            let product_id = reviews::delete_review(conn, id)?;
            Ok(catalog::get_product(conn, product_id)?.slug)
        })
        .await;
    let target = match &result {
        Ok(slug) => format!("/product/{}", url_encode(slug)),
        Err(_) => "/admin".to_string(),
    };
    session::finish(
        &state,
        &ctx,
        result,
        |_| Some("Review removed.".into()),
        &target,
        &target,
    )
    .await
}
