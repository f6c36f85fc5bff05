use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use chrono::Utc;
use gleaner_core::types::{RunTrigger, Snapshot, StopReason};
use sqlx::PgPool;

use crate::models::{Run, RunStatus};
use crate::queries::runs;

#[async_trait]
pub trait RunLedger: Send + Sync {
    /// Record a new run in `running` state. Committed before returning.
    async fn start_run(&self, trigger: RunTrigger) -> Result<Run, sqlx::Error>;

    /// Terminal success. Early-stopped runs land here too, tagged with the reason.
    async fn complete_run(
        &self,
        run_id: i64,
        snapshot: &Snapshot,
        stop_reason: Option<StopReason>,
    ) -> Result<(), sqlx::Error>;

    /// Terminal failure. No snapshot is written.
    async fn fail_run(
        &self,
        run_id: i64,
        error: &str,
        channels_attempted: usize,
        messages_found: usize,
    ) -> Result<(), sqlx::Error>;

    async fn latest_success(&self) -> Result<Option<Run>, sqlx::Error>;

    async fn latest_status(&self) -> Result<Option<Run>, sqlx::Error>;

    async fn get_run(&self, run_id: i64) -> Result<Option<Run>, sqlx::Error>;

    async fn list_recent(&self, limit: usize) -> Result<Vec<Run>, sqlx::Error>;
}

#[derive(Clone)]
pub struct PgLedger {
    pool: PgPool,
}

impl PgLedger {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RunLedger for PgLedger {
    async fn start_run(&self, trigger: RunTrigger) -> Result<Run, sqlx::Error> {
        runs::create(&self.pool, trigger.as_str()).await
    }

    async fn complete_run(
        &self,
        run_id: i64,
        snapshot: &Snapshot,
        stop_reason: Option<StopReason>,
    ) -> Result<(), sqlx::Error> {
        let payload =
            serde_json::to_value(snapshot).map_err(|err| sqlx::Error::Encode(Box::new(err)))?;
        runs::mark_success(
            &self.pool,
            run_id,
            snapshot.chats_count as i32,
            snapshot.messages_count as i32,
            payload,
            stop_reason.as_ref().map(StopReason::as_str),
        )
        .await
    }

    async fn fail_run(
        &self,
        run_id: i64,
        error: &str,
        channels_attempted: usize,
        messages_found: usize,
    ) -> Result<(), sqlx::Error> {
        runs::mark_failed(
            &self.pool,
            run_id,
            error,
            channels_attempted as i32,
            messages_found as i32,
        )
        .await
    }

    async fn latest_success(&self) -> Result<Option<Run>, sqlx::Error> {
        runs::latest_success(&self.pool).await
    }

    async fn latest_status(&self) -> Result<Option<Run>, sqlx::Error> {
        runs::latest(&self.pool).await
    }

    async fn get_run(&self, run_id: i64) -> Result<Option<Run>, sqlx::Error> {
        runs::get_by_id(&self.pool, run_id).await
    }

    async fn list_recent(&self, limit: usize) -> Result<Vec<Run>, sqlx::Error> {
        runs::list_recent(&self.pool, limit as i64).await
    }
}

#[derive(Default)]
pub struct MemoryLedger {
    runs: Mutex<Vec<Run>>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    fn update<F>(&self, run_id: i64, apply: F) -> Result<(), sqlx::Error>
    where
        F: FnOnce(&mut Run) -> Result<(), sqlx::Error>,
    {
        let mut runs = self.runs.lock().unwrap_or_else(PoisonError::into_inner);
        match runs
            .iter_mut()
            .find(|run| run.id == run_id && run.status == RunStatus::Running)
        {
            Some(run) => apply(run),
            None => Err(sqlx::Error::RowNotFound),
        }
    }

    fn newest<P>(&self, predicate: P) -> Option<Run>
    where
        P: Fn(&Run) -> bool,
    {
        let runs = self.runs.lock().unwrap_or_else(PoisonError::into_inner);
        runs.iter()
            .filter(|run| predicate(run))
            .max_by_key(|run| (run.started_at, run.id))
            .cloned()
    }
}

#[async_trait]
impl RunLedger for MemoryLedger {
    async fn start_run(&self, trigger: RunTrigger) -> Result<Run, sqlx::Error> {
        let mut runs = self.runs.lock().unwrap_or_else(PoisonError::into_inner);
        let run = Run {
            id: runs.last().map(|run| run.id + 1).unwrap_or(1),
            trigger_kind: trigger.as_str().to_string(),
            status: RunStatus::Running,
            started_at: Utc::now(),
            finished_at: None,
            channels_attempted: 0,
            messages_found: 0,
            snapshot: None,
            stop_reason: None,
            error: None,
        };
        runs.push(run.clone());
        Ok(run)
    }

    async fn complete_run(
        &self,
        run_id: i64,
        snapshot: &Snapshot,
        stop_reason: Option<StopReason>,
    ) -> Result<(), sqlx::Error> {
        let payload =
            serde_json::to_value(snapshot).map_err(|err| sqlx::Error::Encode(Box::new(err)))?;
        self.update(run_id, |run| {
            run.status = RunStatus::Success;
            run.finished_at = Some(Utc::now());
            run.channels_attempted = snapshot.chats_count as i32;
            run.messages_found = snapshot.messages_count as i32;
            run.snapshot = Some(payload);
            run.stop_reason = stop_reason.map(|reason| reason.as_str().to_string());
            Ok(())
        })
    }

    async fn fail_run(
        &self,
        run_id: i64,
        error: &str,
        channels_attempted: usize,
        messages_found: usize,
    ) -> Result<(), sqlx::Error> {
        self.update(run_id, |run| {
            run.status = RunStatus::Failed;
            run.finished_at = Some(Utc::now());
            run.channels_attempted = channels_attempted as i32;
            run.messages_found = messages_found as i32;
            run.error = Some(error.to_string());
            Ok(())
        })
    }

    async fn latest_success(&self) -> Result<Option<Run>, sqlx::Error> {
        Ok(self.newest(|run| run.status == RunStatus::Success && run.snapshot.is_some()))
    }

    async fn latest_status(&self) -> Result<Option<Run>, sqlx::Error> {
        Ok(self.newest(|_| true))
    }

    async fn get_run(&self, run_id: i64) -> Result<Option<Run>, sqlx::Error> {
        let runs = self.runs.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(runs.iter().find(|run| run.id == run_id).cloned())
    }

    async fn list_recent(&self, limit: usize) -> Result<Vec<Run>, sqlx::Error> {
        let runs = self.runs.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(runs
            .iter()
            .rev()
            .take(limit)
            .cloned()
            .map(|mut run| {
                run.snapshot = None;
                run
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use gleaner_core::types::MessageRecord;

    fn snapshot_with(ids: &[i64]) -> Snapshot {
        let messages = ids
            .iter()
            .map(|id| MessageRecord {
                channel: "alpha".to_string(),
                channel_title: "Alpha".to_string(),
                message_id: *id,
                timestamp: Utc.with_ymd_and_hms(2025, 3, 1, 9, 0, 0).unwrap(),
                text: "eth breaking out".to_string(),
                sender_name: None,
                sender_username: None,
            })
            .collect();
        Snapshot::new(2, 1, messages)
    }

    #[tokio::test]
    async fn test_start_run_is_running_with_zero_counts() {
        let ledger = MemoryLedger::new();
        let run = ledger.start_run(RunTrigger::Scheduled).await.unwrap();

        assert_eq!(run.status, RunStatus::Running);
        assert_eq!(run.channels_attempted, 0);
        assert_eq!(run.messages_found, 0);
        assert!(run.finished_at.is_none());
        assert!(run.snapshot.is_none());
        assert!(!run.is_terminal());
    }

    #[tokio::test]
    async fn test_run_ids_increase() {
        let ledger = MemoryLedger::new();
        let first = ledger.start_run(RunTrigger::Scheduled).await.unwrap();
        let second = ledger.start_run(RunTrigger::Manual).await.unwrap();
        assert!(second.id > first.id);
    }

    #[tokio::test]
    async fn test_latest_success_absent_without_success() {
        let ledger = MemoryLedger::new();
        assert!(ledger.latest_success().await.unwrap().is_none());

        let run = ledger.start_run(RunTrigger::Scheduled).await.unwrap();
        assert!(ledger.latest_success().await.unwrap().is_none());

        ledger.fail_run(run.id, "no channels configured", 0, 0).await.unwrap();
        assert!(ledger.latest_success().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_latest_success_returns_newest_snapshot() {
        let ledger = MemoryLedger::new();

        let first = ledger.start_run(RunTrigger::Scheduled).await.unwrap();
        ledger
            .complete_run(first.id, &snapshot_with(&[1]), None)
            .await
            .unwrap();
        let latest = ledger.latest_success().await.unwrap().unwrap();
        assert_eq!(latest.id, first.id);

        let second = ledger.start_run(RunTrigger::Manual).await.unwrap();
        ledger
            .complete_run(second.id, &snapshot_with(&[2, 3]), None)
            .await
            .unwrap();

        let latest = ledger.latest_success().await.unwrap().unwrap();
        assert_eq!(latest.id, second.id);
        let snapshot = latest.snapshot().unwrap().unwrap();
        assert_eq!(snapshot.messages_count, 2);
        assert_eq!(snapshot.messages[0].message_id, 2);
    }

    #[tokio::test]
    async fn test_failed_run_after_success_keeps_old_snapshot() {
        let ledger = MemoryLedger::new();
        let ok = ledger.start_run(RunTrigger::Scheduled).await.unwrap();
        ledger.complete_run(ok.id, &snapshot_with(&[1]), None).await.unwrap();

        let bad = ledger.start_run(RunTrigger::Scheduled).await.unwrap();
        ledger.fail_run(bad.id, "database unavailable", 3, 12).await.unwrap();

        assert_eq!(ledger.latest_success().await.unwrap().unwrap().id, ok.id);

        let status = ledger.latest_status().await.unwrap().unwrap();
        assert_eq!(status.id, bad.id);
        assert_eq!(status.status, RunStatus::Failed);
        assert_eq!(status.channels_attempted, 3);
        assert_eq!(status.messages_found, 12);
        assert_eq!(status.error.as_deref(), Some("database unavailable"));
        assert!(status.snapshot.is_none());
    }

    #[tokio::test]
    async fn test_complete_run_records_stop_reason() {
        let ledger = MemoryLedger::new();
        let run = ledger.start_run(RunTrigger::Scheduled).await.unwrap();
        ledger
            .complete_run(run.id, &snapshot_with(&[1]), Some(StopReason::RateLimited))
            .await
            .unwrap();

        let stored = ledger.get_run(run.id).await.unwrap().unwrap();
        assert_eq!(stored.status, RunStatus::Success);
        assert_eq!(stored.stop_reason.as_deref(), Some("rate_limited"));
        assert!(stored.finished_at.is_some());
        assert!(stored.error.is_none());
    }

    #[tokio::test]
    async fn test_terminal_run_is_not_mutated_again() {
        let ledger = MemoryLedger::new();
        let run = ledger.start_run(RunTrigger::Scheduled).await.unwrap();
        ledger.fail_run(run.id, "boom", 0, 0).await.unwrap();

        let err = ledger
            .complete_run(run.id, &snapshot_with(&[1]), None)
            .await
            .unwrap_err();
        assert!(matches!(err, sqlx::Error::RowNotFound));
        assert_eq!(
            ledger.get_run(run.id).await.unwrap().unwrap().status,
            RunStatus::Failed
        );
    }

    #[tokio::test]
    async fn test_list_recent_newest_first_without_snapshots() {
        let ledger = MemoryLedger::new();
        for _ in 0..3 {
            let run = ledger.start_run(RunTrigger::Scheduled).await.unwrap();
            ledger.complete_run(run.id, &snapshot_with(&[1]), None).await.unwrap();
        }

        let recent = ledger.list_recent(2).await.unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].id, 3);
        assert_eq!(recent[1].id, 2);
        assert!(recent.iter().all(|run| run.snapshot.is_none()));
    }
}
