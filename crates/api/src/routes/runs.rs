use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Extension, Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::{
    error::{ApiResult, AppError},
    state::{AppState, RequestId},
};
use db::models::{Run, RunStatus};
use gleaner_core::types::RunTrigger;

const DEFAULT_LIST_LIMIT: usize = 20;
const MAX_LIST_LIMIT: usize = 100;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/v1/runs", post(trigger_run).get(list_runs))
        .route("/v1/runs/latest", get(latest_run))
        .route("/v1/runs/{id}", get(get_run))
        .with_state(state)
}

#[derive(Debug, Serialize)]
struct RunStatusResponse {
    status: RunStatus,
    run_id: i64,
    trigger: String,
    started_at: DateTime<Utc>,
    finished_at: Option<DateTime<Utc>>,
    channels_attempted: i32,
    messages_found: i32,
    stop_reason: Option<String>,
    error: Option<String>,
}

impl From<Run> for RunStatusResponse {
    fn from(run: Run) -> Self {
        Self {
            status: run.status,
            run_id: run.id,
            trigger: run.trigger_kind,
            started_at: run.started_at,
            finished_at: run.finished_at,
            channels_attempted: run.channels_attempted,
            messages_found: run.messages_found,
            stop_reason: run.stop_reason,
            error: run.error,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum LatestRunResponse {
    Run(RunStatusResponse),
    NeverRun { status: &'static str },
}

#[derive(Debug, Serialize)]
struct TriggerResponse {
    accepted: bool,
}

#[derive(Debug, Deserialize)]
struct ListQuery {
    limit: Option<usize>,
}

#[derive(Debug, Serialize)]
struct RunListResponse {
    items: Vec<RunStatusResponse>,
}

async fn latest_run(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
) -> ApiResult<Json<LatestRunResponse>> {
    let run = state.ledger.latest_status().await.map_err(|err| {
        error!(error = %err, "failed to load latest run");
        AppError::Internal.with_request_id(&request_id.0)
    })?;

    Ok(Json(match run {
        Some(run) => LatestRunResponse::Run(run.into()),
        None => LatestRunResponse::NeverRun {
            status: "never_run",
        },
    }))
}

async fn get_run(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    Path(id): Path<i64>,
) -> ApiResult<Json<RunStatusResponse>> {
    let run = state
        .ledger
        .get_run(id)
        .await
        .map_err(|err| {
            error!(run_id = id, error = %err, "failed to load run");
            AppError::Internal.with_request_id(&request_id.0)
        })?
        .ok_or_else(|| {
            AppError::NotFound(format!("run {id} not found")).with_request_id(&request_id.0)
        })?;

    Ok(Json(run.into()))
}

async fn list_runs(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    Query(query): Query<ListQuery>,
) -> ApiResult<Json<RunListResponse>> {
    let limit = query
        .limit
        .unwrap_or(DEFAULT_LIST_LIMIT)
        .clamp(1, MAX_LIST_LIMIT);
    let runs = state.ledger.list_recent(limit).await.map_err(|err| {
        error!(error = %err, "failed to list runs");
        AppError::Internal.with_request_id(&request_id.0)
    })?;

    Ok(Json(RunListResponse {
        items: runs.into_iter().map(RunStatusResponse::from).collect(),
    }))
}

async fn trigger_run(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
) -> ApiResult<(StatusCode, Json<TriggerResponse>)> {
    state
        .job
        .trigger(RunTrigger::Manual)
        .map_err(|_| AppError::Conflict.with_request_id(&request_id.0))?;

    info!(request_id = %request_id.0, "manual run accepted");
    Ok((StatusCode::ACCEPTED, Json(TriggerResponse { accepted: true })))
}
