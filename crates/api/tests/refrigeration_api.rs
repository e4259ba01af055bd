//! Integration tests for the `/api/v1/refrigeration` endpoints.

mod common;

use axum::http::StatusCode;
use chrono::Utc;
use coldchain_core::evaluator::evaluate;
use coldchain_core::generator::TelemetryGenerator;
use coldchain_core::reading::SystemReading;
use coldchain_core::status::OperationalStatus;
use coldchain_events::topology::{
    ALERTS_QUEUE, ALERTS_ROUTING_KEY, DATA_QUEUE, DATA_ROUTING_KEY, LOGS_QUEUE,
};
use common::{body_json, get, post};

fn reading_from(json: &serde_json::Value) -> SystemReading {
    serde_json::from_value(json.clone()).unwrap()
}

// ---------------------------------------------------------------------------
// Test: GET /systems/{id} returns a reading and publishes only a log
// ---------------------------------------------------------------------------

#[tokio::test]
async fn get_system_returns_reading_and_logs_only() {
    let (app, broker) = common::build_test_app().await;
    let response = get(app, "/api/v1/refrigeration/systems/SYS-042").await;

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    let reading = reading_from(&json["data"]);
    assert_eq!(reading.system_id, "SYS-042");
    assert!((-25.0..=5.0).contains(&reading.temperature));

    assert_eq!(broker.queue_depth(DATA_QUEUE).await, 0);
    assert_eq!(broker.queue_depth(ALERTS_QUEUE).await, 0);

    let logs = broker.messages(LOGS_QUEUE).await;
    assert_eq!(logs.len(), 1);
    let log = logs[0].json().unwrap();
    assert_eq!(log["system_id"], "SYS-042");
    assert_eq!(log["level"], "INFO");
    assert_eq!(log["details"]["endpoint"], "get_system");
}

// ---------------------------------------------------------------------------
// Test: Blank system id is rejected before anything is published
// ---------------------------------------------------------------------------

#[tokio::test]
async fn blank_system_id_returns_400() {
    let (app, broker) = common::build_test_app().await;
    let response = get(app, "/api/v1/refrigeration/systems/%20%20").await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["code"], "VALIDATION_ERROR");
    assert!(broker.attempts().await.is_empty());
}

// ---------------------------------------------------------------------------
// Test: GET /systems defaults to five readings, each with its alerts
// ---------------------------------------------------------------------------

#[tokio::test]
async fn list_systems_defaults_to_five() {
    let (app, broker) = common::build_test_app().await;
    let response = get(app, "/api/v1/refrigeration/systems").await;

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    let readings: Vec<SystemReading> = json["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(reading_from)
        .collect();

    let ids: Vec<_> = readings.iter().map(|r| r.system_id.as_str()).collect();
    assert_eq!(ids, vec!["SYS-001", "SYS-002", "SYS-003", "SYS-004", "SYS-005"]);

    let expected_alerts: usize = readings.iter().map(|r| evaluate(r).len()).sum();
    assert_eq!(broker.queue_depth(DATA_QUEUE).await, 5);
    assert_eq!(broker.queue_depth(ALERTS_QUEUE).await, expected_alerts);

    let logs = broker.messages(LOGS_QUEUE).await;
    assert_eq!(logs.len(), 1);
    let log = logs[0].json().unwrap();
    assert_eq!(log["system_id"], "MULTIPLE_SYSTEMS");
    assert_eq!(log["details"]["system_count"], 5);
}

// ---------------------------------------------------------------------------
// Test: GET /systems honours count within bounds
// ---------------------------------------------------------------------------

#[tokio::test]
async fn list_systems_accepts_upper_bound() {
    let (app, broker) = common::build_test_app().await;
    let response = get(app, "/api/v1/refrigeration/systems?count=50").await;

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    let data = json["data"].as_array().unwrap();
    assert_eq!(data.len(), 50);
    assert_eq!(data[49]["system_id"], "SYS-050");
    assert_eq!(broker.queue_depth(DATA_QUEUE).await, 50);
}

// ---------------------------------------------------------------------------
// Test: Out-of-range and malformed counts return 400
// ---------------------------------------------------------------------------

#[tokio::test]
async fn list_systems_rejects_out_of_range_count() {
    for count in ["0", "51"] {
        let (app, broker) = common::build_test_app().await;
        let uri = format!("/api/v1/refrigeration/systems?count={count}");
        let response = get(app, &uri).await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "count={count}");
        let json = body_json(response).await;
        assert_eq!(json["code"], "VALIDATION_ERROR");
        assert!(broker.attempts().await.is_empty());
    }
}

#[tokio::test]
async fn list_systems_rejects_non_numeric_count() {
    let (app, _broker) = common::build_test_app().await;
    let response = get(app, "/api/v1/refrigeration/systems?count=lots").await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["code"], "BAD_REQUEST");
}

// ---------------------------------------------------------------------------
// Test: POST /systems/{id}/generate runs the full dispatch
// ---------------------------------------------------------------------------

#[tokio::test]
async fn generate_returns_reading_and_dispatch_report() {
    let (app, broker) = common::build_test_app().await;
    let response = post(app, "/api/v1/refrigeration/systems/SYS-007/generate").await;

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    let reading = reading_from(&json["data"]["reading"]);
    let deliveries = json["data"]["dispatch"]["deliveries"].as_array().unwrap();

    assert_eq!(deliveries[0]["event"], "reading");
    assert_eq!(deliveries[0]["routing_key"], DATA_ROUTING_KEY);
    assert_eq!(deliveries[1]["event"], "log:INFO");
    assert!(deliveries.iter().all(|d| d["delivered"] == true));

    let alerts = evaluate(&reading);
    let escalations = usize::from(reading.status != OperationalStatus::Operational)
        + usize::from(reading.temperature_out_of_range());
    assert_eq!(deliveries.len(), 2 + alerts.len() + escalations);
    assert_eq!(broker.queue_depth(DATA_QUEUE).await, 1);
    assert_eq!(broker.queue_depth(ALERTS_QUEUE).await, alerts.len());
    assert_eq!(broker.queue_depth(LOGS_QUEUE).await, 1 + escalations);

    let info = broker.messages(LOGS_QUEUE).await[0].json().unwrap();
    assert_eq!(info["details"]["endpoint"], "generate_system_data");
    assert_eq!(info["details"]["temperature"], reading.temperature);
}

// ---------------------------------------------------------------------------
// Test: Failed reading publish returns 500 and emits an ERROR log
// ---------------------------------------------------------------------------

#[tokio::test]
async fn generate_with_broker_failure_returns_500() {
    let (app, broker) = common::build_test_app().await;
    broker.fail_routing_key(DATA_ROUTING_KEY).await;

    let response = post(app, "/api/v1/refrigeration/systems/SYS-007/generate").await;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let json = body_json(response).await;
    assert_eq!(json["code"], "PUBLISH_ERROR");

    assert_eq!(broker.queue_depth(ALERTS_QUEUE).await, 0);
    let logs = broker.messages(LOGS_QUEUE).await;
    assert_eq!(logs.len(), 1);
    let log = logs[0].json().unwrap();
    assert_eq!(log["level"], "ERROR");
    assert_eq!(log["details"]["endpoint"], "generate_system_data");
    assert!(log["details"]["error"].is_string());
}

// ---------------------------------------------------------------------------
// Test: POST /systems/{id}/publish returns a status summary
// ---------------------------------------------------------------------------

#[tokio::test]
async fn publish_returns_status_summary() {
    let (app, broker) = common::build_test_app().await;
    let response = post(app, "/api/v1/refrigeration/systems/SYS-100/publish").await;

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    let data = &json["data"];
    assert_eq!(data["status"], "success");
    assert_eq!(data["system_id"], "SYS-100");
    assert!(data["timestamp"].is_string());
    assert_eq!(data["alerts_failed"], 0);

    let published = data["alerts_published"].as_u64().unwrap() as usize;
    assert_eq!(broker.queue_depth(DATA_QUEUE).await, 1);
    assert_eq!(broker.queue_depth(ALERTS_QUEUE).await, published);

    let logs = broker.messages(LOGS_QUEUE).await;
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].json().unwrap()["level"], "INFO");
}

// ---------------------------------------------------------------------------
// Test: Alert failures do not fail the publish endpoint
// ---------------------------------------------------------------------------

#[tokio::test]
async fn publish_survives_alert_failures() {
    // First seed whose first reading for SYS-100 raises at least one alert.
    let (seed, expected) = (0..)
        .map(|seed| {
            let reading = TelemetryGenerator::seeded(seed)
                .generate("SYS-100", Utc::now())
                .unwrap();
            (seed, evaluate(&reading))
        })
        .find(|(_, alerts)| !alerts.is_empty())
        .unwrap();
    assert!(!expected.is_empty());

    let (app, broker) = common::build_test_app_seeded(seed).await;
    broker.fail_routing_key(ALERTS_ROUTING_KEY).await;

    let response = post(app, "/api/v1/refrigeration/systems/SYS-100/publish").await;

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["data"]["status"], "success");
    assert_eq!(json["data"]["alerts_published"], 0);
    assert_eq!(json["data"]["alerts_failed"], expected.len());

    let alert_attempts: Vec<_> = broker
        .attempts()
        .await
        .into_iter()
        .filter(|a| a.routing_key == ALERTS_ROUTING_KEY)
        .collect();
    assert_eq!(alert_attempts.len(), expected.len());
    assert!(alert_attempts.iter().all(|a| !a.succeeded));

    assert_eq!(broker.queue_depth(DATA_QUEUE).await, 1);
    assert_eq!(broker.queue_depth(ALERTS_QUEUE).await, 0);
    assert_eq!(broker.queue_depth(LOGS_QUEUE).await, 1);
}
