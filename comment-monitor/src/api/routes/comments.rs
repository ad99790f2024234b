//! Stored comment queries.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::get,
};

use crate::api::error::{ApiError, ApiResult};
use crate::api::models::{CommentsQuery, CommentsResponse};
use crate::api::server::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/comments/{bvid}", get(list_comments))
}

/// Most recent stored comments of a video, newest first.
async fn list_comments(
    State(state): State<AppState>,
    Path(bvid): Path<String>,
    Query(query): Query<CommentsQuery>,
) -> ApiResult<Json<CommentsResponse>> {
    let bvid = bvid.trim().to_string();
    if bvid.is_empty() {
        return Err(ApiError::bad_request("bvid is required"));
    }

    let comments = state
        .repository
        .list_recent(&bvid, query.effective_limit())
        .await?;
    let metadata = state.repository.find_metadata(&bvid).await?;

    Ok(Json(CommentsResponse {
        bvid,
        metadata,
        comments,
    }))
}
