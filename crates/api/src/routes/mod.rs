pub mod health;
pub mod refrigeration;

use axum::Router;

use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// ```text
/// /refrigeration/systems                       batch of readings (GET)
/// /refrigeration/systems/{id}                  single reading (GET)
/// /refrigeration/systems/{id}/generate         reading + full log/alert dispatch (POST)
/// /refrigeration/systems/{id}/publish          reading + alerts, status summary (POST)
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new().nest("/refrigeration", refrigeration::router())
}
