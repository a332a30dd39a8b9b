use crate::core::error::ShopError;
use crate::web::views;
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Redirect, Response};

/// Handler error: a `ShopError` rendered as an HTTP response.
#[derive(Debug)]
pub struct WebError(pub ShopError);

impl From<ShopError> for WebError {
    fn from(e: ShopError) -> Self {
        WebError(e)
    }
}

pub type WebResult<T> = Result<T, WebError>;

pub fn status_for(e: &ShopError) -> StatusCode {
    match e {
        ShopError::NotFound(_) => StatusCode::NOT_FOUND,
        ShopError::Unauthorized => StatusCode::UNAUTHORIZED,
        ShopError::Forbidden(_) => StatusCode::FORBIDDEN,
        ShopError::Validation(_) | ShopError::OutOfStock(_) | ShopError::Conflict(_) => {
            StatusCode::BAD_REQUEST
        }
        ShopError::Sqlite(_) | ShopError::Io(_) | ShopError::Config(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

impl IntoResponse for WebError {
    fn into_response(self) -> Response {
        let status = status_for(&self.0);
        match &self.0 {
            ShopError::Unauthorized => Redirect::to("/login").into_response(),
            e if status == StatusCode::INTERNAL_SERVER_ERROR => {
                tracing::error!(error = %e, "request failed");
                (
                    status,
                    Html(views::error_page(status, "Something went wrong on our side.")),
                )
                    .into_response()
            }
            e => {
                let message = match e {
                    ShopError::NotFound(_) => "We couldn't find that page.".to_string(),
                    ShopError::Forbidden(reason) => format!("Access denied: {}", reason),
                    other => other.to_string(),
                };
                (status, Html(views::error_page(status, &message))).into_response()
            }
        }
    }
}
