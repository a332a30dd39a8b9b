//! HTTP surface: an axum `Router` over the shop subsystems.
//!
//! ```text
//! request ─> log_requests ─> session_layer ─> route handler
//!                                 │                │
//!                                 │ Ctx            │ AppState::read / write
//!                                 v                v
//!                           sessions table    DbBroker (spawn_blocking)
//! ```
//!
//! Handlers never hold a connection across an `.await`: every database
//! step is a closure shipped to the blocking pool through `AppState`.

pub mod error;
pub mod routes;
pub mod session;
pub mod views;

use crate::core::broker::DbBroker;
use crate::core::config::ShopConfig;
use crate::core::error::ShopError;
use crate::core::{assets, time};
use crate::shop::sessions;
use axum::Router;
use axum::extract::{Path, Request};
use axum::http::{StatusCode, header};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use rusqlite::Connection;
use std::sync::Arc;
use std::time::{Duration, Instant};

const SESSION_SWEEP_PERIOD: Duration = Duration::from_secs(3600);

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ShopConfig>,
    pub broker: DbBroker,
}

impl AppState {
    pub fn new(config: ShopConfig) -> Self {
        let broker = DbBroker::new(&config.database);
        Self {
            config: Arc::new(config),
            broker,
        }
    }

    /// Run an unaudited closure on the blocking pool.
    pub async fn read<F, R>(&self, f: F) -> Result<R, ShopError>
    where
        F: FnOnce(&Connection) -> Result<R, ShopError> + Send + 'static,
        R: Send + 'static,
    {
        let broker = self.broker.clone();
        tokio::task::spawn_blocking(move || broker.read(f))
            .await
            .map_err(|e| ShopError::Io(std::io::Error::other(e)))?
    }

    /// Run a mutating closure on the blocking pool and audit it as `op`.
    pub async fn write<F, R>(&self, actor: String, op: &'static str, f: F) -> Result<R, ShopError>
    where
        F: FnOnce(&Connection) -> Result<R, ShopError> + Send + 'static,
        R: Send + 'static,
    {
        let broker = self.broker.clone();
        tokio::task::spawn_blocking(move || broker.with_conn(&actor, op, f))
            .await
            .map_err(|e| ShopError::Io(std::io::Error::other(e)))?
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .merge(routes::shop::routes())
        .merge(routes::account::routes())
        .nest("/admin", routes::admin::routes())
        .layer(middleware::from_fn_with_state(
            state.clone(),
            session::session_layer,
        ))
        // Outside the session layer: no session row for probes and assets.
        .route("/healthz", get(healthz))
        .route("/static/*path", get(static_asset))
        .fallback(not_found)
        .layer(middleware::from_fn(log_requests))
        .with_state(state)
}

async fn healthz() -> &'static str {
    "ok"
}

async fn static_asset(Path(path): Path<String>) -> Response {
    match assets::get_asset(&path) {
        Some((bytes, content_type)) => (
            [
                (header::CONTENT_TYPE, content_type),
                (header::CACHE_CONTROL, "public, max-age=3600"),
            ],
            bytes,
        )
            .into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn not_found() -> Response {
    error::WebError(ShopError::NotFound("page".into())).into_response()
}

async fn log_requests(req: Request, next: Next) -> Response {
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let started = Instant::now();
    let response = next.run(req).await;
    tracing::info!(
        %method,
        path = %path,
        status = response.status().as_u16(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "request"
    );
    response
}

/// Delete expired session rows. Audited as `sessions.purge`.
pub async fn purge_sessions(state: &AppState) -> Result<usize, ShopError> {
    let purged = state
        .write("system".into(), "sessions.purge", |conn| {
            sessions::purge_expired(conn, time::now_secs())
        })
        .await?;
    if purged > 0 {
        tracing::info!(purged, "removed expired sessions");
    }
    Ok(purged)
}

/// Purge expired sessions now and then every `period` until aborted.
pub fn spawn_session_sweeper(state: AppState, period: Duration) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            if let Err(e) = purge_sessions(&state).await {
                tracing::warn!(error = %e, "session purge failed");
            }
        }
    })
}

/// Bind, start the session sweeper and serve until ctrl-c.
pub async fn serve(config: ShopConfig) -> Result<(), ShopError> {
    let addr = config.bind_addr()?;
    let state = AppState::new(config);
    let sweeper = spawn_session_sweeper(state.clone(), SESSION_SWEEP_PERIOD);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(
        %addr,
        shop = %state.config.shop_name,
        db = %state.config.database.display(),
        "storefront listening"
    );
    axum::serve(listener, router(state))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("shutdown requested");
        })
        .await?;
    sweeper.abort();
    Ok(())
}
