use std::sync::Arc;

use axum::body::Body;
use axum::http::{Method, Request, Response};
use axum::Router;
use coldchain_events::{InMemoryBroker, MessageRouter};
use http_body_util::BodyExt;
use tower::ServiceExt;

use coldchain_api::config::ServerConfig;
use coldchain_api::router::build_app_router;
use coldchain_api::state::AppState;

/// Fixed seed so generated readings are reproducible across test runs.
pub const TEST_SEED: u64 = 42;

/// Build a test `ServerConfig` with safe defaults.
pub fn test_config() -> ServerConfig {
    test_config_seeded(TEST_SEED)
}

pub fn test_config_seeded(seed: u64) -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        simulation_seed: Some(seed),
    }
}

/// Full application router over an in-memory broker.
///
/// Returns the broker so tests can inspect queues and inject failures.
/// The topology is provisioned unless `provision` is false.
pub async fn build_test_app_with(provision: bool) -> (Router, Arc<InMemoryBroker>) {
    build(provision, TEST_SEED).await
}

pub async fn build_test_app() -> (Router, Arc<InMemoryBroker>) {
    build_test_app_with(true).await
}

/// Provisioned app whose generator starts from `seed`.
pub async fn build_test_app_seeded(seed: u64) -> (Router, Arc<InMemoryBroker>) {
    build(true, seed).await
}

async fn build(provision: bool, seed: u64) -> (Router, Arc<InMemoryBroker>) {
    let broker = Arc::new(InMemoryBroker::new());
    let router = Arc::new(MessageRouter::new(broker.clone()));
    if provision {
        router.provision_topology().await.unwrap();
    }
    let state = AppState::new(test_config_seeded(seed), router);
    (build_app_router(state), broker)
}

pub async fn get(app: Router, uri: &str) -> Response<Body> {
    send(app, Method::GET, uri).await
}

pub async fn post(app: Router, uri: &str) -> Response<Body> {
    send(app, Method::POST, uri).await
}

async fn send(app: Router, method: Method, uri: &str) -> Response<Body> {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    app.oneshot(request).await.unwrap()
}

/// Collect a response body and parse it as JSON.
pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}
