//! Per-request session context.

use crate::core::error::ShopError;
use crate::core::time;
use crate::shop::accounts::{self, User};
use crate::shop::cart::{self, CartRef};
use crate::shop::sessions::{self, Flash};
use crate::web::AppState;
use crate::web::error::{WebError, WebResult};
use crate::web::views::Chrome;
use axum::extract::{Request, State};
use axum::http::{HeaderValue, header};
use axum::middleware::Next;
use axum::response::{IntoResponse, Redirect, Response};

/// Inserted into request extensions by `session_layer`.
#[derive(Debug, Clone)]
pub struct Ctx {
    pub session_id: String,
    pub user: Option<User>,
    pub coupon_code: Option<String>,
}

/// Owned cart handle that can be moved onto the blocking pool.
#[derive(Debug, Clone)]
pub struct CartOwner {
    pub user_id: Option<i64>,
    pub session_id: String,
}

impl CartOwner {
    pub fn as_ref(&self) -> CartRef<'_> {
        match self.user_id {
            Some(id) => CartRef::User(id),
            None => CartRef::Session(&self.session_id),
        }
    }
}

impl Ctx {
    pub fn cart_owner(&self) -> CartOwner {
        CartOwner {
            user_id: self.user.as_ref().map(|u| u.id),
            session_id: self.session_id.clone(),
        }
    }

    /// Audit actor: the user's email, or `anon`.
    pub fn actor(&self) -> String {
        self.user
            .as_ref()
            .map(|u| u.email.clone())
            .unwrap_or_else(|| "anon".to_string())
    }

    pub fn require_user(&self) -> Result<&User, ShopError> {
        self.user.as_ref().ok_or(ShopError::Unauthorized)
    }

    pub fn require_admin(&self) -> Result<&User, ShopError> {
        let user = self.require_user()?;
        if !user.is_admin {
            return Err(ShopError::Forbidden("administrators only".into()));
        }
        Ok(user)
    }
}

pub async fn session_layer(State(state): State<AppState>, mut req: Request, next: Next) -> Response {
    let cookie_id = req
        .headers()
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .find_map(sessions::session_id_from_cookie_header)
        .map(str::to_string);
    let ttl = state.config.session_ttl_secs();

    let loaded = state
        .read(move |conn| {
            let now = time::now_secs();
            let (session, created) =
                sessions::load_or_create(conn, cookie_id.as_deref(), ttl, now)?;
            // Sliding expiry: refresh once half the lifetime has passed.
            let refreshed = !created && session.expires_at - now < ttl / 2;
            if refreshed {
                sessions::touch(conn, &session.id, ttl)?;
            }
            let user = match session.user_id {
                Some(id) => accounts::get_user(conn, id)?,
                None => None,
            };
            Ok((session, created || refreshed, user))
        })
        .await;

    let (session, send_cookie, user) = match loaded {
        Ok(v) => v,
        Err(e) => return WebError(e).into_response(),
    };

    let cookie = send_cookie.then(|| sessions::set_cookie_header(&session.id, ttl));
    req.extensions_mut().insert(Ctx {
        session_id: session.id,
        user,
        coupon_code: session.coupon_code,
    });

    let mut response = next.run(req).await;
    if let Some(value) = cookie.and_then(|c| HeaderValue::from_str(&c).ok()) {
        response.headers_mut().append(header::SET_COOKIE, value);
    }
    response
}

/// Layout data: who is signed in, cart size, pending flash messages.
pub async fn chrome(state: &AppState, ctx: &Ctx) -> WebResult<Chrome> {
    let owner = ctx.cart_owner();
    let (flashes, cart_count) = state
        .read(move |conn| {
            let flashes = sessions::take_flash(conn, &owner.session_id)?;
            let lines = cart::load(conn, owner.as_ref())?;
            let count = cart::view(conn, &lines)?.item_count;
            Ok((flashes, count))
        })
        .await?;
    Ok(Chrome {
        shop_name: state.config.shop_name.clone(),
        currency: state.config.currency.clone(),
        user: ctx.user.clone(),
        cart_count,
        flashes,
    })
}

pub async fn flash(state: &AppState, ctx: &Ctx, message: Flash) -> WebResult<()> {
    let session_id = ctx.session_id.clone();
    state
        .read(move |conn| sessions::push_flash(conn, &session_id, message))
        .await?;
    Ok(())
}

/// Finish a form post: on success flash `ok` and go to `to`; on a
/// shopper-facing error flash it and go `back`. Server errors propagate.
pub async fn finish<T>(
    state: &AppState,
    ctx: &Ctx,
    result: Result<T, ShopError>,
    ok: impl FnOnce(&T) -> Option<String>,
    to: &str,
    back: &str,
) -> WebResult<Redirect> {
    match result {
        Ok(value) => {
            if let Some(text) = ok(&value) {
                flash(state, ctx, Flash::info(text)).await?;
            }
            Ok(Redirect::to(to))
        }
        Err(ShopError::Unauthorized) => Ok(Redirect::to("/login")),
        Err(e) if e.is_user_facing() || matches!(e, ShopError::NotFound(_)) => {
            flash(state, ctx, Flash::error(user_message(&e))).await?;
            Ok(Redirect::to(back))
        }
        Err(e) => Err(WebError(e)),
    }
}

/// Shopper-readable text without the error category prefix.
pub fn user_message(e: &ShopError) -> String {
    match e {
        ShopError::Validation(m) | ShopError::Conflict(m) | ShopError::Forbidden(m) => m.clone(),
        ShopError::OutOfStock(name) => format!("Sorry, {} is out of stock.", name),
        ShopError::NotFound(what) => format!("{} was not found.", what),
        ShopError::Unauthorized => "Please sign in first.".to_string(),
        other => other.to_string(),
    }
}

/// Route layer for the back-office: anything but an administrator is turned
/// away before the handler runs.
pub async fn admin_guard(req: Request, next: Next) -> Response {
    let denied = match req.extensions().get::<Ctx>() {
        Some(ctx) => ctx.require_admin().err(),
        None => Some(ShopError::Unauthorized),
    };
    match denied {
        Some(e) => WebError(e).into_response(),
        None => next.run(req).await,
    }
}
