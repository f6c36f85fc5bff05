//! Ingestion run ledger operations. A run is inserted as `running` and
//! updated once more when it reaches `success` or `failed`.

use crate::models::{Run, RunStatus};
use sqlx::PgPool;

/// Insert a new run in `running` state with zero counts.
pub async fn create(pool: &PgPool, trigger_kind: &str) -> Result<Run, sqlx::Error> {
    sqlx::query_as::<_, Run>(
        r#"
        INSERT INTO ingest_runs (trigger_kind, status)
        VALUES ($1, $2)
        RETURNING id, trigger_kind, status, started_at, finished_at,
               channels_attempted, messages_found, snapshot, stop_reason, error
        "#
    )
    .bind(trigger_kind)
    .bind(RunStatus::Running)
    .fetch_one(pool)
    .await
}

/// Move a running run to `success` and store its snapshot.
pub async fn mark_success(
    pool: &PgPool,
    id: i64,
    channels_attempted: i32,
    messages_found: i32,
    snapshot: serde_json::Value,
    stop_reason: Option<&str>,
) -> Result<(), sqlx::Error> {
    let result = sqlx::query(
        r#"
        UPDATE ingest_runs
        SET status = $1,
            finished_at = now(),
            channels_attempted = $2,
            messages_found = $3,
            snapshot = $4,
            stop_reason = $5
        WHERE id = $6 AND status = $7
        "#,
    )
    .bind(RunStatus::Success)
    .bind(channels_attempted)
    .bind(messages_found)
    .bind(snapshot)
    .bind(stop_reason)
    .bind(id)
    .bind(RunStatus::Running)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(sqlx::Error::RowNotFound);
    }
    Ok(())
}

/// Move a running run to `failed`, keeping the counts reached so far.
pub async fn mark_failed(
    pool: &PgPool,
    id: i64,
    error: &str,
    channels_attempted: i32,
    messages_found: i32,
) -> Result<(), sqlx::Error> {
    let result = sqlx::query(
        r#"
        UPDATE ingest_runs
        SET status = $1,
            finished_at = now(),
            channels_attempted = $2,
            messages_found = $3,
            error = $4
        WHERE id = $5 AND status = $6
        "#,
    )
    .bind(RunStatus::Failed)
    .bind(channels_attempted)
    .bind(messages_found)
    .bind(error)
    .bind(id)
    .bind(RunStatus::Running)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(sqlx::Error::RowNotFound);
    }
    Ok(())
}

/// Most recently started successful run that carries a snapshot.
pub async fn latest_success(pool: &PgPool) -> Result<Option<Run>, sqlx::Error> {
    sqlx::query_as::<_, Run>(
        r#"
        SELECT id, trigger_kind, status, started_at, finished_at,
               channels_attempted, messages_found, snapshot, stop_reason, error
        FROM ingest_runs
        WHERE status = $1 AND snapshot IS NOT NULL
        ORDER BY started_at DESC, id DESC
        LIMIT 1
        "#
    )
    .bind(RunStatus::Success)
    .fetch_optional(pool)
    .await
}

/// Most recently started run regardless of status.
pub async fn latest(pool: &PgPool) -> Result<Option<Run>, sqlx::Error> {
    sqlx::query_as::<_, Run>(
        r#"
        SELECT id, trigger_kind, status, started_at, finished_at,
               channels_attempted, messages_found, snapshot, stop_reason, error
        FROM ingest_runs
        ORDER BY started_at DESC, id DESC
        LIMIT 1
        "#
    )
    .fetch_optional(pool)
    .await
}

pub async fn get_by_id(pool: &PgPool, id: i64) -> Result<Option<Run>, sqlx::Error> {
    sqlx::query_as::<_, Run>(
        r#"
        SELECT id, trigger_kind, status, started_at, finished_at,
               channels_attempted, messages_found, snapshot, stop_reason, error
        FROM ingest_runs
        WHERE id = $1
        "#
    )
    .bind(id)
    .fetch_optional(pool)
    .await
}

/// Recent runs, newest first, without their snapshots.
pub async fn list_recent(pool: &PgPool, limit: i64) -> Result<Vec<Run>, sqlx::Error> {
    sqlx::query_as::<_, Run>(
        r#"
        SELECT id, trigger_kind, status, started_at, finished_at,
               channels_attempted, messages_found, NULL::jsonb AS snapshot,
               stop_reason, error
        FROM ingest_runs
        ORDER BY started_at DESC, id DESC
        LIMIT $1
        "#,
    )
    .bind(limit)
    .fetch_all(pool)
    .await
}
