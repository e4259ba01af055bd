//! Handlers for the refrigeration telemetry endpoints.
//!
//! Every handler generates fresh readings, publishes them through the shared
//! [`MessageRouter`](coldchain_events::MessageRouter) and returns what was
//! generated. A failed reading publish surfaces as a 500 and is also reported
//! as a best-effort ERROR log event.

use axum::extract::rejection::QueryRejection;
use axum::extract::{Path, Query, State};
use axum::Json;
use chrono::Utc;
use coldchain_core::log_event::LogLevel;
use coldchain_core::reading::SystemReading;
use coldchain_core::types::{Details, Timestamp};
use coldchain_events::{DispatchReport, RouterError};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};
use crate::response::DataResponse;
use crate::state::AppState;

/// System id used for log events that cover a whole batch.
pub const BATCH_LOG_SYSTEM_ID: &str = "MULTIPLE_SYSTEMS";

/// Batch size used when `count` is omitted.
pub const DEFAULT_BATCH_COUNT: usize = 5;

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

/// Query parameters for the batch endpoint.
#[derive(Debug, Deserialize)]
pub struct BatchQuery {
    /// Number of systems to generate (default: 5, allowed: 1..=50).
    pub count: Option<usize>,
}

/// Response for `POST /systems/{id}/generate`.
#[derive(Debug, Serialize)]
pub struct GenerateResponse {
    pub reading: SystemReading,
    pub dispatch: DispatchReport,
}

/// Response for `POST /systems/{id}/publish`.
#[derive(Debug, Serialize)]
pub struct PublishSummary {
    pub status: &'static str,
    pub system_id: String,
    pub timestamp: Timestamp,
    pub message: &'static str,
    pub alerts_published: usize,
    pub alerts_failed: usize,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// GET /refrigeration/systems/{id}
///
/// Generate one reading. Only an INFO log event is published.
pub async fn get_system(
    State(state): State<AppState>,
    Path(system_id): Path<String>,
) -> AppResult<Json<DataResponse<SystemReading>>> {
    let reading = generate(&state, &system_id).await?;

    let mut details = endpoint_details("get_system");
    details.insert("temperature".into(), reading.temperature.into());
    details.insert("status".into(), reading.status.to_string().into());
    state
        .router
        .publish_log(
            &system_id,
            LogLevel::Info,
            "System data retrieved via API",
            details,
        )
        .await;

    tracing::info!(
        system_id = %system_id,
        status = %reading.status,
        temperature = format!("{:.2}", reading.temperature),
        "System data retrieved"
    );
    Ok(Json(DataResponse { data: reading }))
}

/// GET /refrigeration/systems?count=N
///
/// Generate a batch and publish every reading with its alerts, then one INFO
/// log event for the whole batch.
pub async fn list_systems(
    State(state): State<AppState>,
    query: Result<Query<BatchQuery>, QueryRejection>,
) -> AppResult<Json<DataResponse<Vec<SystemReading>>>> {
    let Query(query) = query.map_err(|e| AppError::BadRequest(e.body_text()))?;
    let count = query.count.unwrap_or(DEFAULT_BATCH_COUNT);
    let readings = state
        .generator
        .lock()
        .await
        .generate_batch(count, Utc::now())?;

    let mut alerts = DispatchReport::new();
    for reading in &readings {
        if let Err(e) = state.router.publish_reading(reading).await {
            return Err(report_failure(
                &state,
                BATCH_LOG_SYSTEM_ID,
                "list_systems",
                "Failed to publish batch of systems",
                e,
            )
            .await);
        }
        alerts.merge(state.router.publish_alerts(reading).await);
    }

    let mut details = endpoint_details("list_systems");
    details.insert("system_count".into(), readings.len().into());
    state
        .router
        .publish_log(
            BATCH_LOG_SYSTEM_ID,
            LogLevel::Info,
            "Data for multiple systems generated and published",
            details,
        )
        .await;

    tracing::info!(
        count = readings.len(),
        alerts = alerts.deliveries.len(),
        alerts_failed = alerts.failed_count(),
        "Batch of systems generated"
    );
    Ok(Json(DataResponse { data: readings }))
}

/// POST /refrigeration/systems/{id}/generate
///
/// Generate one reading and run the full dispatch: reading, INFO log, alerts,
/// and escalated WARN / ERROR logs when the unit is unhealthy.
pub async fn generate_system_data(
    State(state): State<AppState>,
    Path(system_id): Path<String>,
) -> AppResult<Json<DataResponse<GenerateResponse>>> {
    let reading = generate(&state, &system_id).await?;

    let dispatch = match state
        .router
        .dispatch_reading(&reading, endpoint_details("generate_system_data"))
        .await
    {
        Ok(report) => report,
        Err(e) => {
            return Err(report_failure(
                &state,
                &system_id,
                "generate_system_data",
                "Failed to generate system data and logs",
                e,
            )
            .await)
        }
    };

    tracing::info!(
        system_id = %system_id,
        published = dispatch.delivered_count(),
        failed = dispatch.failed_count(),
        "System data and logs generated"
    );
    Ok(Json(DataResponse {
        data: GenerateResponse { reading, dispatch },
    }))
}

/// POST /refrigeration/systems/{id}/publish
///
/// Generate one reading, publish it with its alerts and a plain INFO log, and
/// return a status summary.
pub async fn publish_system_data(
    State(state): State<AppState>,
    Path(system_id): Path<String>,
) -> AppResult<Json<DataResponse<PublishSummary>>> {
    const MESSAGE: &str = "Data published to broker successfully";

    let reading = generate(&state, &system_id).await?;

    if let Err(e) = state.router.publish_reading(&reading).await {
        return Err(report_failure(
            &state,
            &system_id,
            "publish_system_data",
            "Failed to publish system data",
            e,
        )
        .await);
    }
    let alerts = state.router.publish_alerts(&reading).await;
    state
        .router
        .publish_log(&system_id, LogLevel::Info, MESSAGE, Details::new())
        .await;

    tracing::info!(system_id = %system_id, "System data published");
    Ok(Json(DataResponse {
        data: PublishSummary {
            status: "success",
            system_id,
            timestamp: reading.timestamp,
            message: MESSAGE,
            alerts_published: alerts.delivered_count(),
            alerts_failed: alerts.failed_count(),
        },
    }))
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

async fn generate(state: &AppState, system_id: &str) -> AppResult<SystemReading> {
    let reading = state.generator.lock().await.generate(system_id, Utc::now())?;
    Ok(reading)
}

fn endpoint_details(endpoint: &str) -> Details {
    let mut details = Details::new();
    details.insert("endpoint".into(), endpoint.into());
    details
}

/// Publish a best-effort ERROR log for a failed request and convert the
/// router error into the response error.
async fn report_failure(
    state: &AppState,
    system_id: &str,
    endpoint: &str,
    message: &str,
    err: RouterError,
) -> AppError {
    let mut details = endpoint_details(endpoint);
    details.insert("error".into(), err.to_string().into());
    state
        .router
        .publish_log(system_id, LogLevel::Error, message, details)
        .await;
    AppError::Router(err)
}
