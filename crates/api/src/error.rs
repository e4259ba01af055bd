use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use coldchain_core::error::CoreError;
use coldchain_events::RouterError;
use serde_json::json;

/// Application-level error type for HTTP handlers.
///
/// Wraps [`CoreError`] and [`RouterError`] and adds HTTP-specific variants.
/// Implements [`IntoResponse`] to produce consistent JSON error responses.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// A domain-level error from `coldchain_core`.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// A routing or broker error from `coldchain_events`.
    #[error(transparent)]
    Router(#[from] RouterError),

    /// A bad request with a human-readable message.
    #[error("Bad request: {0}")]
    BadRequest(String),
}

/// Convenience type alias for handler return values.
pub type AppResult<T> = Result<T, AppError>;

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::Core(CoreError::InvalidArgument(msg)) => {
                (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone())
            }

            AppError::Router(err) => classify_router_error(err),

            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone()),
        };

        let body = json!({
            "error": message,
            "code": code,
        });

        (status, axum::Json(body)).into_response()
    }
}

/// Map a router error to an HTTP status, error code, and sanitized message.
///
/// Broker details are logged, never returned to the client.
fn classify_router_error(err: &RouterError) -> (StatusCode, &'static str, String) {
    match err {
        RouterError::Publish { routing_key, source } => {
            tracing::error!(routing_key = %routing_key, error = %source, "Publish failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "PUBLISH_ERROR",
                "Failed to publish message to the broker".to_string(),
            )
        }
        other => {
            tracing::error!(error = %other, "Router error");
            internal()
        }
    }
}

fn internal() -> (StatusCode, &'static str, String) {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        "INTERNAL_ERROR",
        "An internal error occurred".to_string(),
    )
}
