use axum::extract::State;
use axum::{routing::get, Json, Router};
use serde::Serialize;

use crate::state::AppState;

/// Health check response payload.
#[derive(Serialize)]
pub struct HealthResponse {
    /// Overall service status.
    pub status: &'static str,
    /// Crate version from Cargo.toml.
    pub version: &'static str,
    /// Whether the broker topology has been declared.
    pub broker_provisioned: bool,
}

/// GET /health -- returns service and broker health.
async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let broker_provisioned = state.router.is_provisioned();
    tracing::debug!(broker_provisioned, "Health check");

    let status = if broker_provisioned { "ok" } else { "degraded" };

    Json(HealthResponse {
        status,
        version: env!("CARGO_PKG_VERSION"),
        broker_provisioned,
    })
}

/// Mount health check routes (root level, NOT under `/api/v1`).
pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
