//! Route definitions for the refrigeration telemetry endpoints.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::refrigeration;
use crate::state::AppState;

/// Routes mounted at `/refrigeration`.
///
/// ```text
/// GET  /systems                 -> list_systems
/// GET  /systems/{id}            -> get_system
/// POST /systems/{id}/generate   -> generate_system_data
/// POST /systems/{id}/publish    -> publish_system_data
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/systems", get(refrigeration::list_systems))
        .route("/systems/{id}", get(refrigeration::get_system))
        .route(
            "/systems/{id}/generate",
            post(refrigeration::generate_system_data),
        )
        .route(
            "/systems/{id}/publish",
            post(refrigeration::publish_system_data),
        )
}
