use std::future::Future;
use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tracing::{error, info};

use gleaner_core::types::RunTrigger;

use crate::job::{IngestJob, JobError};

/// Run `job` every `interval` until `shutdown` resolves.
///
/// The first tick fires immediately only when `run_on_start` is set. A tick
/// that finds the session busy is skipped.
pub async fn run_periodic<F>(job: IngestJob, interval: Duration, run_on_start: bool, shutdown: F)
where
    F: Future<Output = ()>,
{
    // tokio rejects a zero period.
    let interval = interval.max(Duration::from_secs(1));
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    if !run_on_start {
        ticker.tick().await;
    }
    tokio::pin!(shutdown);

    info!(interval_secs = interval.as_secs(), run_on_start, "scheduler started");
    loop {
        tokio::select! {
            _ = &mut shutdown => {
                info!("scheduler stopping");
                return;
            }
            _ = ticker.tick() => {
                match job.run(RunTrigger::Scheduled).await {
                    Ok(report) => info!(
                        run_id = report.run_id,
                        messages = report.messages_found,
                        "scheduled run done"
                    ),
                    Err(JobError::Busy(_)) => info!("run already in progress, skipping tick"),
                    Err(err) => error!(error = %err, "scheduled run failed"),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orchestrator::OrchestratorConfig;
    use crate::session::SharedSession;
    use crate::testing::ScriptedClient;
    use db::{MemoryLedger, RunLedger};
    use gleaner_core::config::ChannelSource;
    use std::sync::Arc;

    fn job(ledger: Arc<MemoryLedger>) -> IngestJob {
        let client = Arc::new(ScriptedClient::new());
        client.channel("alpha", None, vec![]);
        let config = OrchestratorConfig {
            pacing: Duration::ZERO,
            reconnect_every: 100,
            reconnect_pause: Duration::ZERO,
            error_reconnect_delay: Duration::ZERO,
            min_message_length: 10,
        };
        IngestJob::new(
            SharedSession::new(client),
            ledger,
            ChannelSource::Inline(vec!["alpha".to_string()]),
            2,
            config,
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_on_start_fires_immediately_then_on_interval() {
        let ledger = Arc::new(MemoryLedger::new());
        let hour = Duration::from_secs(3600);

        run_periodic(
            job(ledger.clone()),
            hour,
            true,
            tokio::time::sleep(hour + Duration::from_secs(60)),
        )
        .await;

        assert_eq!(ledger.list_recent(10).await.unwrap().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_without_run_on_start_waits_one_interval() {
        let ledger = Arc::new(MemoryLedger::new());
        let hour = Duration::from_secs(3600);

        run_periodic(
            job(ledger.clone()),
            hour,
            false,
            tokio::time::sleep(Duration::from_secs(1800)),
        )
        .await;
        assert!(ledger.latest_status().await.unwrap().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_interval_is_clamped() {
        let ledger = Arc::new(MemoryLedger::new());

        run_periodic(
            job(ledger.clone()),
            Duration::ZERO,
            false,
            tokio::time::sleep(Duration::from_millis(2500)),
        )
        .await;

        assert_eq!(ledger.list_recent(10).await.unwrap().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_busy_tick_is_skipped() {
        let ledger = Arc::new(MemoryLedger::new());
        let job = job(ledger.clone());
        let _lease = job.session().try_acquire().unwrap();

        run_periodic(
            job.clone(),
            Duration::from_secs(60),
            true,
            tokio::time::sleep(Duration::from_secs(150)),
        )
        .await;
        assert!(ledger.latest_status().await.unwrap().is_none());
    }
}
