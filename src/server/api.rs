//! REST API handlers for the scheduler service
//!
//! CRUD for schedules and schedule events by id or name, the full-reload
//! endpoint, and the ping/stats/metrics surface. Queries answer with the
//! model itself and mutations with the id they touched; failures carry the
//! scheduler error kind next to the message so callers can branch without
//! parsing prose. Kinds map onto status codes here: `NotFound` → 404,
//! `InvalidRecurrence` / `UnknownSchedule` / `InvalidMethod` → 400,
//! `AlreadyExists` → 409, everything else → 500.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use uuid::Uuid;

use crate::metrics;
use crate::models::{Schedule, ScheduleEvent};
use crate::scheduler::{RegistryStats, SchedulerError, SchedulerResult};

use super::AppState;

// ============================================================================
// API Payloads
// ============================================================================

/// Failure payload: the scheduler error kind plus its message.
#[derive(Debug, Serialize)]
pub struct ApiError {
    pub kind: &'static str,
    pub message: String,
}

impl From<&SchedulerError> for ApiError {
    fn from(error: &SchedulerError) -> Self {
        Self {
            kind: error.kind(),
            message: error.to_string(),
        }
    }
}

/// Identifier of the schedule or event a mutation touched.
#[derive(Debug, Serialize)]
pub struct IdResponse {
    pub id: String,
}

/// Stats response
#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub version: String,
    pub uptime_secs: u64,
    pub registry: RegistryStats,
}

/// Map a scheduler error kind onto the HTTP status the surrounding layer
/// promises its callers.
fn status_for(error: &SchedulerError) -> StatusCode {
    match error {
        SchedulerError::NotFound { .. } => StatusCode::NOT_FOUND,
        SchedulerError::InvalidRecurrence { .. }
        | SchedulerError::UnknownSchedule { .. }
        | SchedulerError::InvalidMethod { .. } => StatusCode::BAD_REQUEST,
        SchedulerError::AlreadyExists { .. } => StatusCode::CONFLICT,
        SchedulerError::MetadataUnavailable { .. } | SchedulerError::DispatchFailed { .. } => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

/// Render a registry result: the payload on success, the kind-labelled
/// error body otherwise.
fn reply<T: Serialize>(result: SchedulerResult<T>) -> Response {
    match result {
        Ok(payload) => (StatusCode::OK, Json(payload)).into_response(),
        Err(error) => (status_for(&error), Json(ApiError::from(&error))).into_response(),
    }
}

// ============================================================================
// API Routes
// ============================================================================

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Service endpoints
        .route("/api/v1/ping", get(ping))
        .route("/api/v1/stats", get(get_stats))
        .route("/api/v1/metrics", get(get_metrics))
        // Schedule endpoints
        .route("/api/v1/schedule", post(add_schedule).put(update_schedule))
        .route("/api/v1/schedule/name/:name", get(get_schedule_by_name))
        .route(
            "/api/v1/schedule/:id",
            get(get_schedule).delete(remove_schedule),
        )
        // Schedule event endpoints
        .route(
            "/api/v1/scheduleevent",
            post(add_schedule_event).put(update_schedule_event),
        )
        .route(
            "/api/v1/scheduleevent/name/:name",
            get(get_schedule_event_by_name),
        )
        .route(
            "/api/v1/scheduleevent/:id",
            get(get_schedule_event).delete(remove_schedule_event),
        )
        // Full reload
        .route("/api/v1/schedulers", post(reload_schedulers))
        .with_state(state)
}

// ============================================================================
// Service Handlers
// ============================================================================

/// Liveness probe
async fn ping() -> &'static str {
    "pong"
}

/// Version, uptime and registry sizes
async fn get_stats(State(state): State<AppState>) -> impl IntoResponse {
    let registry = state.registry.stats().await;

    Json(StatsResponse {
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: state.start_time.elapsed().as_secs(),
        registry,
    })
}

/// Prometheus exposition
async fn get_metrics() -> impl IntoResponse {
    metrics::gather()
}

// ============================================================================
// Schedule Handlers
// ============================================================================

async fn get_schedule(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    reply(state.registry.query_schedule(&id).await)
}

async fn get_schedule_by_name(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Response {
    reply(state.registry.query_schedule_by_name(&name).await)
}

async fn add_schedule(
    State(state): State<AppState>,
    Json(mut schedule): Json<Schedule>,
) -> Response {
    if schedule.id.is_empty() {
        schedule.id = Uuid::new_v4().to_string();
    }
    let id = schedule.id.clone();

    reply(
        state
            .registry
            .add_schedule(schedule)
            .await
            .map(|()| IdResponse { id }),
    )
}

async fn update_schedule(
    State(state): State<AppState>,
    Json(schedule): Json<Schedule>,
) -> Response {
    let id = schedule.id.clone();

    reply(
        state
            .registry
            .update_schedule(schedule)
            .await
            .map(|()| IdResponse { id }),
    )
}

async fn remove_schedule(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    reply(
        state
            .registry
            .remove_schedule(&id)
            .await
            .map(|()| IdResponse { id }),
    )
}

// ============================================================================
// Schedule Event Handlers
// ============================================================================

async fn get_schedule_event(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    reply(state.registry.query_schedule_event(&id).await)
}

async fn get_schedule_event_by_name(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Response {
    reply(state.registry.query_schedule_event_by_name(&name).await)
}

async fn add_schedule_event(
    State(state): State<AppState>,
    Json(mut event): Json<ScheduleEvent>,
) -> Response {
    if event.id.is_empty() {
        event.id = Uuid::new_v4().to_string();
    }
    let id = event.id.clone();

    reply(
        state
            .registry
            .add_schedule_event(event)
            .await
            .map(|()| IdResponse { id }),
    )
}

async fn update_schedule_event(
    State(state): State<AppState>,
    Json(event): Json<ScheduleEvent>,
) -> Response {
    let id = event.id.clone();

    reply(
        state
            .registry
            .update_schedule_event(event)
            .await
            .map(|()| IdResponse { id }),
    )
}

async fn remove_schedule_event(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    reply(
        state
            .registry
            .remove_schedule_event(&id)
            .await
            .map(|()| IdResponse { id }),
    )
}

// ============================================================================
// Reload Handler
// ============================================================================

/// Drop the registry and rebuild it from metadata and config.
async fn reload_schedulers(State(state): State<AppState>) -> Response {
    reply(state.loader.load_all().await)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_error_carries_kind_and_message() {
        let error = SchedulerError::schedule_not_found("s1");
        let payload = ApiError::from(&error);

        assert_eq!(payload.kind, "NotFound");
        assert!(payload.message.contains("s1"));

        let json = serde_json::to_string(&payload).unwrap();
        assert!(json.contains("\"kind\":\"NotFound\""));
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            status_for(&SchedulerError::schedule_not_found("x")),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_for(&SchedulerError::invalid_recurrence("s", "bad")),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_for(&SchedulerError::unknown_schedule("e", "s")),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_for(&SchedulerError::invalid_method("ZAP")),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_for(&SchedulerError::schedule_exists("s")),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status_for(&SchedulerError::metadata_unavailable("pull", "down")),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
