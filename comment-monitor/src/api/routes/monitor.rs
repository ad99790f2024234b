//! Monitor control routes.

use axum::{Json, Router, extract::State, routing::get, routing::post};

use crate::api::error::ApiResult;
use crate::api::models::{StartMonitorRequest, StatusResponse};
use crate::api::server::AppState;
use crate::monitor::{StartOutcome, StartRequest, StopOutcome};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/start", post(start_monitor))
        .route("/stop", post(stop_monitor))
        .route("/status", get(monitor_status))
}

/// Start monitoring a video.
///
/// Answers `already_running` (200) when a session is active and
/// `CONFIG_ERROR` (400) when no account is available.
async fn start_monitor(
    State(state): State<AppState>,
    Json(body): Json<StartMonitorRequest>,
) -> ApiResult<Json<StartOutcome>> {
    let request = StartRequest {
        target: body.bvid.clone(),
        credentials: body.credentials(),
        expand_sub_comments: body.fetch_sub_comments,
    };
    let outcome = state.controller.start(request).await?;
    Ok(Json(outcome))
}

async fn stop_monitor(State(state): State<AppState>) -> Json<StopOutcome> {
    Json(state.controller.stop().await)
}

async fn monitor_status(State(state): State<AppState>) -> Json<StatusResponse> {
    let status = state.controller.status().await;
    Json(StatusResponse::new(status, state.hub.len()))
}
