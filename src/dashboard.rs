//! Dashboard HTTP API
//!
//! Thin REST glue over the Status Reporter and Poll Scheduler. Only compiled
//! when the `dashboard` feature is enabled.

use axum::{
    extract::State,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};

use crate::scheduler::PollScheduler;
use crate::status::StatusReporter;

/// Standard API response envelope
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
        }
    }
}

#[derive(Clone)]
struct AppState {
    reporter: Arc<StatusReporter>,
    scheduler: Arc<PollScheduler>,
    default_interval: Duration,
}

/// Create the API router with all endpoints
pub fn create_router(
    reporter: Arc<StatusReporter>,
    scheduler: Arc<PollScheduler>,
    default_interval: Duration,
) -> Router {
    Router::new()
        .route("/status", get(get_status))
        .route("/monitor", post(post_monitor))
        .with_state(AppState {
            reporter,
            scheduler,
            default_interval,
        })
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
}

/// GET /status - current cache and scheduler snapshot
async fn get_status(State(state): State<AppState>) -> impl IntoResponse {
    let snapshot = state.reporter.snapshot().await;
    Json(ApiResponse::success(snapshot))
}

#[derive(Debug, Deserialize)]
struct MonitorRequest {
    action: String,
    interval_seconds: Option<u64>,
}

/// POST /monitor {action: start|stop, interval_seconds}
async fn post_monitor(
    State(state): State<AppState>,
    Json(request): Json<MonitorRequest>,
) -> impl IntoResponse {
    match request.action.as_str() {
        "start" => {
            let interval = request
                .interval_seconds
                .map(Duration::from_secs)
                .unwrap_or(state.default_interval);
            state.scheduler.start(interval).await;
            Json(ApiResponse::success("monitoring started".to_string()))
        }
        "stop" => {
            state.scheduler.stop().await;
            Json(ApiResponse::success("monitoring stopped".to_string()))
        }
        other => Json(ApiResponse::error(format!(
            "unknown action '{}', expected start or stop",
            other
        ))),
    }
}
