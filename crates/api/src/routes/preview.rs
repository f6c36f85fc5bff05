use axum::{extract::State, routing::post, Extension, Json, Router};
use serde::{Deserialize, Serialize};

use crate::{
    error::{ApiResult, AppError},
    state::{AppState, RequestId},
};
use pipeline::preview::{PreviewError, PreviewGroups};

const MAX_PREVIEW_DAYS: i64 = 365;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/v1/preview", post(preview))
        .with_state(state)
}

#[derive(Debug, Deserialize)]
struct PreviewRequest {
    channels: Vec<String>,
    days: Option<i64>,
}

#[derive(Debug, Serialize)]
struct PreviewResponse {
    success: bool,
    channels_count: usize,
    messages_count: usize,
    data: PreviewGroups,
}

async fn preview(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    Json(payload): Json<PreviewRequest>,
) -> ApiResult<Json<PreviewResponse>> {
    if payload.days.is_some_and(|days| !(1..=MAX_PREVIEW_DAYS).contains(&days)) {
        return Err(AppError::BadRequest(format!(
            "days must be between 1 and {MAX_PREVIEW_DAYS}"
        ))
        .with_request_id(&request_id.0));
    }

    let groups = state
        .previewer
        .preview(&payload.channels, payload.days)
        .await
        .map_err(|err| map_preview_error(err).with_request_id(&request_id.0))?;

    Ok(Json(PreviewResponse {
        success: true,
        channels_count: groups.len(),
        messages_count: groups.values().map(Vec::len).sum(),
        data: groups,
    }))
}

fn map_preview_error(err: PreviewError) -> AppError {
    match err {
        PreviewError::Empty => AppError::BadRequest("channels must not be empty".to_string()),
        PreviewError::Busy(_) => AppError::Conflict,
        PreviewError::Timeout(_) => AppError::Timeout(err.to_string()),
    }
}
