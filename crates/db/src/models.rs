use chrono::{DateTime, Utc};
use gleaner_core::types::Snapshot;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "run_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Running,
    Success,
    Failed,
}

/// One ingestion run as recorded in the ledger.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Run {
    pub id: i64,
    pub trigger_kind: String,
    pub status: RunStatus,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub channels_attempted: i32,
    pub messages_found: i32,
    pub snapshot: Option<serde_json::Value>,
    pub stop_reason: Option<String>,
    pub error: Option<String>,
}

impl Run {
    /// Decode the stored snapshot, if any.
    pub fn snapshot(&self) -> Option<Result<Snapshot, serde_json::Error>> {
        self.snapshot
            .clone()
            .map(serde_json::from_value::<Snapshot>)
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self.status, RunStatus::Running)
    }
}
