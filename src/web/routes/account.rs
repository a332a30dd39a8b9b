//! Registration, sign-in and the account page.

use crate::shop::accounts::{self, NewAddress};
use crate::shop::sessions::{self, Flash};
use crate::web::AppState;
use crate::web::error::{WebError, WebResult};
use crate::web::session::{self, Ctx};
use crate::web::views;
use axum::Router;
use axum::extract::{Extension, Form, Path, State};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Redirect, Response};
use axum::routing::{get, post};
use serde::Deserialize;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/register", get(register_form).post(register))
        .route("/login", get(login_form).post(login))
        .route("/logout", post(logout))
        .route("/account", get(account))
        .route("/account/addresses", post(add_address))
        .route("/account/addresses/:id/delete", post(delete_address))
        .route("/account/addresses/:id/default", post(default_address))
}

async fn register_form(
    State(state): State<AppState>,
    Extension(ctx): Extension<Ctx>,
) -> WebResult<Response> {
    if ctx.user.is_some() {
        return Ok(Redirect::to("/account").into_response());
    }
    let chrome = session::chrome(&state, &ctx).await?;
    Ok(views::account::register_page(&chrome, "", "").into_response())
}

#[derive(Debug, Deserialize)]
pub struct RegisterForm {
    pub name: String,
    pub email: String,
    pub password: String,
}

async fn register(
    State(state): State<AppState>,
    Extension(ctx): Extension<Ctx>,
    Form(form): Form<RegisterForm>,
) -> WebResult<Response> {
    let session_id = ctx.session_id.clone();
    let (name, email, password) = (form.name.clone(), form.email.clone(), form.password);
    let result = state
        .write(accounts::normalize_email(&form.email), "accounts.register", move |conn| {
            let user = accounts::register(conn, &email, &name, &password)?;
            sessions::login(conn, &session_id, user.id)?;
            Ok(user)
        })
        .await;

    match result {
        Ok(user) => {
            tracing::info!(user_id = user.id, "account registered");
            session::flash(&state, &ctx, Flash::info(format!("Welcome, {}!", user.name))).await?;
            Ok(Redirect::to("/").into_response())
        }
        Err(e) if e.is_user_facing() => {
            let mut chrome = session::chrome(&state, &ctx).await?;
            chrome.flashes.push(Flash::error(session::user_message(&e)));
            let page = views::account::register_page(&chrome, &form.name, &form.email);
            Ok((StatusCode::BAD_REQUEST, page).into_response())
        }
        Err(e) => Err(WebError(e)),
    }
}

async fn login_form(
    State(state): State<AppState>,
    Extension(ctx): Extension<Ctx>,
) -> WebResult<Response> {
    if ctx.user.is_some() {
        return Ok(Redirect::to("/account").into_response());
    }
    let chrome = session::chrome(&state, &ctx).await?;
    Ok(views::account::login_page(&chrome, "").into_response())
}

#[derive(Debug, Deserialize)]
pub struct LoginForm {
    pub email: String,
    pub password: String,
}

async fn login(
    State(state): State<AppState>,
    Extension(ctx): Extension<Ctx>,
    Form(form): Form<LoginForm>,
) -> WebResult<Response> {
    let session_id = ctx.session_id.clone();
    let (email, password) = (form.email.clone(), form.password);
    let result = state
        .write(accounts::normalize_email(&form.email), "accounts.login", move |conn| {
            let user = accounts::authenticate(conn, &email, &password)?;
            let merged = sessions::login(conn, &session_id, user.id)?;
            Ok((user, merged.len()))
        })
        .await;

    match result {
        Ok((user, lines)) => {
            tracing::info!(user_id = user.id, cart_lines = lines, "signed in");
            session::flash(
                &state,
                &ctx,
                Flash::info(format!("Welcome back, {}.", user.name)),
            )
            .await?;
            Ok(Redirect::to("/").into_response())
        }
        Err(e) if e.is_user_facing() => {
            let mut chrome = session::chrome(&state, &ctx).await?;
            chrome
                .flashes
                .push(Flash::error("Invalid email or password."));
            let page: Html<String> = views::account::login_page(&chrome, &form.email);
            Ok((StatusCode::UNAUTHORIZED, page).into_response())
        }
        Err(e) => Err(WebError(e)),
    }
}

async fn logout(
    State(state): State<AppState>,
    Extension(ctx): Extension<Ctx>,
) -> WebResult<Redirect> {
    let session_id = ctx.session_id.clone();
    state
        .write(ctx.actor(), "accounts.logout", move |conn| {
            sessions::logout(conn, &session_id)
        })
        .await?;
    session::flash(&state, &ctx, Flash::info("You have been signed out.")).await?;
    Ok(Redirect::to("/"))
}

async fn account(
    State(state): State<AppState>,
    Extension(ctx): Extension<Ctx>,
) -> WebResult<Html<String>> {
    let user = ctx.require_user()?.clone();
    let user_id = user.id;
    let addresses = state
        .read(move |conn| accounts::list_addresses(conn, user_id))
        .await?;
    let chrome = session::chrome(&state, &ctx).await?;
    Ok(views::account::account_page(&chrome, &user, &addresses))
}

async fn add_address(
    State(state): State<AppState>,
    Extension(ctx): Extension<Ctx>,
    Form(form): Form<NewAddress>,
) -> WebResult<Redirect> {
    let user_id = ctx.require_user()?.id;
    let result = state
        .write(ctx.actor(), "accounts.add_address", move |conn| {
            accounts::add_address(conn, user_id, &form)
        })
        .await;
    session::finish(
        &state,
        &ctx,
        result,
        |_| Some("Address saved.".into()),
        "/account",
        "/account",
    )
    .await
}

async fn delete_address(
    State(state): State<AppState>,
    Extension(ctx): Extension<Ctx>,
    Path(id): Path<i64>,
) -> WebResult<Redirect> {
    let user_id = ctx.require_user()?.id;
    let result = state
        .write(ctx.actor(), "accounts.delete_address", move |conn| {
            accounts::delete_address(conn, user_id, id)
        })
        .await;
    session::finish(
        &state,
        &ctx,
        result,
        |_| Some("Address removed.".into()),
        "/account",
        "/account",
    )
    .await
}

async fn default_address(
    State(state): State<AppState>,
    Extension(ctx): Extension<Ctx>,
    Path(id): Path<i64>,
) -> WebResult<Redirect> {
    let user_id = ctx.require_user()?.id;
    let result = state
        .write(ctx.actor(), "accounts.default_address", move |conn| {
            accounts::set_default_address(conn, user_id, id)
        })
        .await;
    session::finish(&state, &ctx, result, |_| None, "/account", "/account").await
}
