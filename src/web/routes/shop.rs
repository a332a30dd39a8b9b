//! Storefront: browsing, cart, checkout and order history.

use crate::core::error::ShopError;
use crate::core::time;
use crate::shop::cart::{self, CartRef, CartView};
use crate::shop::catalog::{self, ProductQuery, ProductSort};
use crate::shop::checkout::{self, CheckoutRequest, Pricing, Totals};
use crate::shop::coupons::{self, Coupon};
use crate::shop::sessions::{self, Flash};
use crate::shop::{accounts, orders, reviews};
use crate::web::AppState;
use crate::web::error::WebResult;
use crate::web::session::{self, CartOwner, Ctx};
use crate::web::views::{self, url_encode};
use axum::Router;
use axum::extract::{Extension, Form, Path, Query, State};
use axum::response::{Html, IntoResponse, Redirect, Response};
use axum::routing::{get, post};
use rusqlite::Connection;
use serde::Deserialize;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(index))
        .route("/category/:slug", get(category))
        .route("/product/:slug", get(product))
        .route("/product/:slug/review", post(post_review))
        .route("/cart", get(cart_page))
        .route("/cart/add", post(cart_add))
        .route("/cart/update", post(cart_update))
        .route("/cart/remove", post(cart_remove))
        .route("/cart/coupon", post(coupon_apply))
        .route("/cart/coupon/clear", post(coupon_clear))
        .route("/checkout", get(checkout_page).post(checkout_submit))
        .route("/orders", get(order_list))
        .route("/orders/:number", get(order_detail))
        .route("/orders/:number/cancel", post(order_cancel))
}

#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
    pub q: Option<String>,
    pub sort: Option<String>,
    pub page: Option<i64>,
}

async fn index(
    State(state): State<AppState>,
    Extension(ctx): Extension<Ctx>,
    Query(params): Query<ListParams>,
) -> WebResult<Html<String>> {
    list(state, ctx, None, params).await
}

async fn category(
    State(state): State<AppState>,
    Extension(ctx): Extension<Ctx>,
    Path(slug): Path<String>,
    Query(params): Query<ListParams>,
) -> WebResult<Html<String>> {
    list(state, ctx, Some(slug), params).await
}

async fn list(
    state: AppState,
    ctx: Ctx,
    slug: Option<String>,
    params: ListParams,
) -> WebResult<Html<String>> {
    let search = params.q.unwrap_or_default().trim().to_string();
    let sort = ProductSort::parse(params.sort.as_deref().unwrap_or_default());
    let query = ProductQuery {
        category_slug: slug,
        search: Some(search.clone()).filter(|s| !s.is_empty()),
        sort,
        page: params.page.unwrap_or(1),
        per_page: state.config.page_size,
        active_only: true,
    };
    let (categories, category, page) = state
        .read(move |conn| {
            let category = match query.category_slug.as_deref() {
                Some(s) => Some(catalog::get_category_by_slug(conn, s)?),
                None => None,
            };
            let categories = catalog::list_categories(conn)?;
            let page = catalog::list_products(conn, &query)?;
            Ok((categories, category, page))
        })
        .await?;

    let chrome = session::chrome(&state, &ctx).await?;
    let filter = views::shop::ListFilter {
        category: category.as_ref(),
        search: &search,
        sort,
    };
    Ok(views::shop::product_list(&chrome, &categories, &page, &filter))
}

async fn product(
    State(state): State<AppState>,
    Extension(ctx): Extension<Ctx>,
    Path(slug): Path<String>,
) -> WebResult<Html<String>> {
    // Administrators can preview inactive products.
    let include_inactive = ctx.user.as_ref().is_some_and(|u| u.is_admin);
    let (product, category, reviews, summary) = state
        .read(move |conn| {
            let product = catalog::get_product_by_slug(conn, &slug, include_inactive)?;
            let category = match product.category_id {
                Some(id) => Some(catalog::get_category(conn, id)?),
                None => None,
            };
            let list = reviews::list_reviews(conn, product.id)?;
            let summary = reviews::rating_summary(conn, product.id)?;
            Ok((product, category, list, summary))
        })
        .await?;
    let chrome = session::chrome(&state, &ctx).await?;
    Ok(views::shop::product_detail(
        &chrome,
        &product,
        category.as_ref(),
        &reviews,
        &summary,
    ))
}

#[derive(Debug, Deserialize)]
pub struct ReviewForm {
    pub rating: i64,
    #[serde(default)]
    pub body: String,
}

async fn post_review(
    State(state): State<AppState>,
    Extension(ctx): Extension<Ctx>,
    Path(slug): Path<String>,
    Form(form): Form<ReviewForm>,
) -> WebResult<Redirect> {
    let user_id = ctx.require_user()?.id;
    let target = format!("/product/{}", url_encode(&slug));
    let result = state
        .write(ctx.actor(), "reviews.add", move |conn| {
            let product = catalog::get_product_by_slug(conn, &slug, false)?;
            reviews::add_review(conn, user_id, product.id, form.rating, &form.body)
        })
        .await;
    session::finish(
        &state,
        &ctx,
        result,
        |_| Some("Thanks for your review.".into()),
        &target,
        &target,
    )
    .await
}

/// Cart contents priced with the session's coupon. A coupon that no longer
/// applies is reported in the third slot and left out of the totals.
pub fn priced_cart(
    conn: &Connection,
    owner: &CartOwner,
    coupon_code: Option<&str>,
    pricing: &Pricing,
    now: i64,
) -> Result<(CartView, Totals, Result<Option<Coupon>, ShopError>), ShopError> {
    let view = cart::prune(conn, owner.as_ref())?;
    let coupon = match coupon_code {
        Some(code) => match coupons::resolve(conn, code, view.subtotal_cents, now) {
            Ok(c) => Ok(Some(c)),
            Err(e) if e.is_user_facing() => Err(e),
            Err(e) => return Err(e),
        },
        None => Ok(None),
    };
    let applied = coupon.as_ref().ok().and_then(|c| c.as_ref());
    let totals = checkout::quote(view.subtotal_cents, view.item_count, applied, pricing);
    Ok((view, totals, coupon))
}

async fn cart_page(
    State(state): State<AppState>,
    Extension(ctx): Extension<Ctx>,
) -> WebResult<Html<String>> {
    let owner = ctx.cart_owner();
    let code = ctx.coupon_code.clone();
    let pricing = Pricing::from(state.config.as_ref());
    let (view, totals, coupon) = state
        .read(move |conn| priced_cart(conn, &owner, code.as_deref(), &pricing, time::now_secs()))
        .await?;

    let mut chrome = session::chrome(&state, &ctx).await?;
    let applied = match coupon {
        Ok(c) => c.map(|c| c.code),
        Err(e) => {
            if !view.is_empty() {
                chrome.flashes.push(Flash::error(session::user_message(&e)));
            }
            None
        }
    };
    Ok(views::shop::cart_page(
        &chrome,
        &view,
        &totals,
        applied.as_deref(),
    ))
}

#[derive(Debug, Deserialize)]
pub struct CartForm {
    pub product_id: i64,
    pub quantity: Option<i64>,
}

async fn cart_add(
    State(state): State<AppState>,
    Extension(ctx): Extension<Ctx>,
    Form(form): Form<CartForm>,
) -> WebResult<Redirect> {
    let owner = ctx.cart_owner();
    let result = state
        .write(ctx.actor(), "cart.add", move |conn| {
            let product = catalog::get_visible_product(conn, form.product_id)?;
            let qty = cart::add_item(conn, owner.as_ref(), product.id, form.quantity.unwrap_or(1))?;
            Ok((product.name, qty))
        })
        .await;
    session::finish(
        &state,
        &ctx,
        result,
        |(name, qty)| Some(format!("{} x {} is in your cart.", qty, name)),
        "/cart",
        "/cart",
    )
    .await
}

async fn cart_update(
    State(state): State<AppState>,
    Extension(ctx): Extension<Ctx>,
    Form(form): Form<CartForm>,
) -> WebResult<Redirect> {
    let owner = ctx.cart_owner();
    let result = state
        .write(ctx.actor(), "cart.update", move |conn| {
            cart::set_quantity(conn, owner.as_ref(), form.product_id, form.quantity.unwrap_or(0))
        })
        .await;
    session::finish(&state, &ctx, result, |_| None, "/cart", "/cart").await
}

async fn cart_remove(
    State(state): State<AppState>,
    Extension(ctx): Extension<Ctx>,
    Form(form): Form<CartForm>,
) -> WebResult<Redirect> {
    let owner = ctx.cart_owner();
    let result = state
        .write(ctx.actor(), "cart.remove", move |conn| {
            cart::remove_item(conn, owner.as_ref(), form.product_id)
        })
        .await;
    session::finish(&state, &ctx, result, |_| None, "/cart", "/cart").await
}

#[derive(Debug, Deserialize)]
pub struct CouponForm {
    pub code: String,
}

async fn coupon_apply(
    State(state): State<AppState>,
    Extension(ctx): Extension<Ctx>,
    Form(form): Form<CouponForm>,
) -> WebResult<Redirect> {
    let owner = ctx.cart_owner();
    let result = state
        .write(ctx.actor(), "cart.coupon", move |conn| {
            let lines = cart::load(conn, owner.as_ref())?;
            let view = cart::view(conn, &lines)?;
            let coupon = coupons::resolve(conn, &form.code, view.subtotal_cents, time::now_secs())?;
            sessions::set_coupon(conn, &owner.session_id, Some(&coupon.code))?;
            Ok(coupon.code)
        })
        .await;
    session::finish(
        &state,
        &ctx,
        result,
        |code| Some(format!("Coupon {} applied.", code)),
        "/cart",
        "/cart",
    )
    .await
}

async fn coupon_clear(
    State(state): State<AppState>,
    Extension(ctx): Extension<Ctx>,
) -> WebResult<Redirect> {
    let session_id = ctx.session_id.clone();
    let result = state
        .write(ctx.actor(), "cart.coupon_clear", move |conn| {
            sessions::set_coupon(conn, &session_id, None)
        })
        .await;
    session::finish(&state, &ctx, result, |_| None, "/cart", "/cart").await
}

async fn checkout_page(
    State(state): State<AppState>,
    Extension(ctx): Extension<Ctx>,
) -> WebResult<Response> {
    let user_id = ctx.require_user()?.id;
    let owner = ctx.cart_owner();
    let code = ctx.coupon_code.clone();
    let pricing = Pricing::from(state.config.as_ref());
    let (view, totals, coupon, addresses) = state
        .read(move |conn| {
            let (view, totals, coupon) =
                priced_cart(conn, &owner, code.as_deref(), &pricing, time::now_secs())?;
            Ok((view, totals, coupon, accounts::list_addresses(conn, user_id)?))
        })
        .await?;

    if view.is_empty() {
        session::flash(&state, &ctx, Flash::info("Your cart is empty.")).await?;
        return Ok(Redirect::to("/cart").into_response());
    }
    if let Err(e) = coupon {
        session::flash(&state, &ctx, Flash::error(session::user_message(&e))).await?;
        return Ok(Redirect::to("/cart").into_response());
    }
    let chrome = session::chrome(&state, &ctx).await?;
    Ok(views::shop::checkout_page(&chrome, &view, &totals, &addresses).into_response())
}

#[derive(Debug, Deserialize)]
pub struct CheckoutForm {
    pub address_id: Option<i64>,
}

async fn checkout_submit(
    State(state): State<AppState>,
    Extension(ctx): Extension<Ctx>,
    Form(form): Form<CheckoutForm>,
) -> WebResult<Redirect> {
    let user_id = ctx.require_user()?.id;
    let session_id = ctx.session_id.clone();
    let code = ctx.coupon_code.clone();
    let pricing = Pricing::from(state.config.as_ref());
    let result = state
        .write(ctx.actor(), "checkout.place_order", move |conn| {
            let lines = cart::prune(conn, CartRef::User(user_id))?.lines();
            let request = CheckoutRequest {
                user_id,
                address_id: form.address_id.unwrap_or(0),
                lines: &lines,
                coupon_code: code.as_deref(),
                now: time::now_secs(),
            };
            let detail = checkout::place_order(conn, &request, &pricing)?;
            sessions::set_coupon(conn, &session_id, None)?;
            Ok(detail)
        })
        .await;

    match result {
        Ok(detail) => {
            let number = detail.order.number;
            session::flash(
                &state,
                &ctx,
                Flash::info(format!("Thank you! Order {} has been placed.", number)),
            )
            .await?;
            Ok(Redirect::to(&format!("/orders/{}", url_encode(&number))))
        }
        Err(e) => session::finish(&state, &ctx, Err::<(), _>(e), |_| None, "/checkout", "/cart").await,
    }
}

async fn order_list(
    State(state): State<AppState>,
    Extension(ctx): Extension<Ctx>,
) -> WebResult<Html<String>> {
    let user_id = ctx.require_user()?.id;
    let list = state
        .read(move |conn| orders::list_for_user(conn, user_id))
        .await?;
    let chrome = session::chrome(&state, &ctx).await?;
    Ok(views::shop::orders_page(&chrome, &list))
}

async fn order_detail(
    State(state): State<AppState>,
    Extension(ctx): Extension<Ctx>,
    Path(number): Path<String>,
) -> WebResult<Html<String>> {
    let user_id = ctx.require_user()?.id;
    let detail = state
        .read(move |conn| orders::get_for_user(conn, user_id, &number))
        .await?;
    let chrome = session::chrome(&state, &ctx).await?;
    Ok(views::shop::order_detail(&chrome, &detail))
}

async fn order_cancel(
    State(state): State<AppState>,
    Extension(ctx): Extension<Ctx>,
    Path(number): Path<String>,
) -> WebResult<Redirect> {
    let user_id = ctx.require_user()?.id;
    let target = format!("/orders/{}", url_encode(&number));
    let result = state
        .write(ctx.actor(), "orders.cancel", move |conn| {
            orders::cancel(conn, user_id, &number)
        })
        .await;
    session::finish(
        &state,
        &ctx,
        result,
        |d| Some(format!("Order {} was cancelled.", d.order.number)),
        &target,
        &target,
    )
    .await
}
