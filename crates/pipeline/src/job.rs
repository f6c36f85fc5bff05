use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use db::RunLedger;
use gleaner_core::channels::load_channels;
use gleaner_core::config::{ChannelSource, ConfigError, Settings};
use gleaner_core::types::{RunTrigger, Snapshot, StopReason};

use crate::orchestrator::{Orchestrator, OrchestratorConfig, RunParams};
use crate::session::{SessionBusy, SessionLease, SharedSession};

#[derive(Debug, thiserror::Error)]
pub enum JobError {
    #[error(transparent)]
    Busy(#[from] SessionBusy),

    #[error("ledger error: {0}")]
    Ledger(#[from] sqlx::Error),

    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    #[error("no channels configured")]
    NoChannels,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    pub run_id: i64,
    pub channels_attempted: usize,
    pub messages_found: usize,
    pub stop_reason: Option<StopReason>,
}

#[derive(Clone)]
pub struct IngestJob {
    session: SharedSession,
    ledger: Arc<dyn RunLedger>,
    channel_source: ChannelSource,
    parse_days: i64,
    config: OrchestratorConfig,
}

impl IngestJob {
    pub fn new(
        session: SharedSession,
        ledger: Arc<dyn RunLedger>,
        channel_source: ChannelSource,
        parse_days: i64,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            session,
            ledger,
            channel_source,
            parse_days,
            config,
        }
    }

    pub fn from_settings(
        settings: &Settings,
        session: SharedSession,
        ledger: Arc<dyn RunLedger>,
    ) -> Self {
        Self::new(
            session,
            ledger,
            settings.channel_source.clone(),
            settings.parse_days,
            OrchestratorConfig::from_settings(settings),
        )
    }

    pub fn session(&self) -> &SharedSession {
        &self.session
    }

    /// Run to completion on the current task. Rejected if a run holds the session.
    pub async fn run(&self, trigger: RunTrigger) -> Result<RunReport, JobError> {
        let lease = self.session.try_acquire()?;
        self.run_with(&lease, trigger).await
    }

    /// Take the session now and run on a background task.
    pub fn trigger(
        &self,
        trigger: RunTrigger,
    ) -> Result<JoinHandle<Result<RunReport, JobError>>, SessionBusy> {
        let lease = self.session.try_acquire()?;
        let job = self.clone();
        Ok(tokio::spawn(async move {
            let result = job.run_with(&lease, trigger).await;
            if let Err(err) = &result {
                error!(error = %err, trigger = trigger.as_str(), "ingestion run failed");
            }
            result
        }))
    }

    async fn run_with(
        &self,
        lease: &SessionLease,
        trigger: RunTrigger,
    ) -> Result<RunReport, JobError> {
        let run = self.ledger.start_run(trigger).await?;
        info!(run_id = run.id, trigger = trigger.as_str(), "ingestion run started");

        let mut progress = (0usize, 0usize);
        match self.execute(lease, run.id, &mut progress).await {
            Ok(report) => Ok(report),
            Err(err) => {
                let (channels, messages) = progress;
                if let Err(mark_err) = self
                    .ledger
                    .fail_run(run.id, &err.to_string(), channels, messages)
                    .await
                {
                    warn!(run_id = run.id, error = %mark_err, "failed to mark run as failed");
                }
                Err(err)
            }
        }
    }

    async fn execute(
        &self,
        lease: &SessionLease,
        run_id: i64,
        progress: &mut (usize, usize),
    ) -> Result<RunReport, JobError> {
        let channels = load_channels(&self.channel_source)?;
        if channels.is_empty() {
            return Err(JobError::NoChannels);
        }

        let params = RunParams {
            channels: &channels,
            cutoff_days: self.parse_days,
            max_messages_per_channel: None,
            min_length_override: None,
        };
        let outcome = Orchestrator::new(lease, &self.config).run(&params).await;

        let channels_attempted = outcome.channels_attempted();
        let stop_reason = outcome.completion.stop_reason();
        *progress = (channels_attempted, outcome.messages.len());

        let snapshot = Snapshot::new(self.parse_days, channels_attempted, outcome.messages);
        let messages_found = snapshot.messages.len();
        self.ledger.complete_run(run_id, &snapshot, stop_reason).await?;

        info!(
            run_id,
            channels_attempted,
            messages_found,
            stop_reason = stop_reason.map(|reason| reason.as_str()),
            "ingestion run finished"
        );

        Ok(RunReport {
            run_id,
            channels_attempted,
            messages_found,
            stop_reason,
        })
    }
}
