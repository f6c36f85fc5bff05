use axum::{extract::State, routing::get, Extension, Json, Router};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::error;

use crate::{
    error::{ApiResult, AppError},
    state::{AppState, RequestId},
};
use gleaner_core::types::MessageRecord;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/v1/snapshot", get(latest_snapshot))
        .with_state(state)
}

#[derive(Debug, Serialize)]
struct SnapshotResponse {
    success: bool,
    run_id: i64,
    parsed_at: DateTime<Utc>,
    parse_days: i64,
    chats_count: i64,
    messages_count: i64,
    data: Vec<MessageRecord>,
}

async fn latest_snapshot(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
) -> ApiResult<Json<SnapshotResponse>> {
    let run = state
        .ledger
        .latest_success()
        .await
        .map_err(|err| {
            error!(error = %err, "failed to load latest snapshot");
            AppError::Internal.with_request_id(&request_id.0)
        })?
        .ok_or_else(|| AppError::NotReady.with_request_id(&request_id.0))?;

    let snapshot = run
        .snapshot()
        .ok_or_else(|| AppError::NotReady.with_request_id(&request_id.0))?
        .map_err(|err| {
            error!(run_id = run.id, error = %err, "stored snapshot is unreadable");
            AppError::Internal.with_request_id(&request_id.0)
        })?;

    Ok(Json(SnapshotResponse {
        success: true,
        run_id: run.id,
        parsed_at: snapshot.parsed_at,
        parse_days: snapshot.parse_days,
        chats_count: snapshot.chats_count,
        messages_count: snapshot.messages_count,
        data: snapshot.messages,
    }))
}
