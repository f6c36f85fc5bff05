use anyhow::Result;
use clap::Parser;
use db::{PgLedger, RunLedger};
use gateway::GatewayClient;
use gleaner_core::config::Settings;
use gleaner_core::types::RunTrigger;
use pipeline::{job::IngestJob, scheduler, session::SharedSession};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Debug, Parser)]
#[command(name = "gleaner-worker")]
#[command(about = "Periodic chat ingestion worker", version)]
struct Args {
    /// Run a single ingestion and exit.
    #[arg(long)]
    once: bool,
    /// Fire the first scheduled run immediately.
    #[arg(long)]
    run_on_start: bool,
}

impl Args {
    /// Trigger recorded for a `--once` run, which an operator starts by hand.
    fn single_run(&self) -> Option<RunTrigger> {
        self.once.then_some(RunTrigger::Manual)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .json()
        .init();

    let args = Args::parse();
    let settings = Settings::from_env()?;

    let db = PgPoolOptions::new()
        .max_connections(5)
        .connect(&settings.database_url)
        .await?;
    db::migrate(&db).await?;

    let ledger: Arc<dyn RunLedger> = Arc::new(PgLedger::new(db));
    let client = GatewayClient::new(&settings.gateway_url, settings.session_token.clone())?;
    let session = SharedSession::new(Arc::new(client));
    let job = IngestJob::from_settings(&settings, session.clone(), ledger);

    if let Some(trigger) = args.single_run() {
        info!("worker running a single ingestion");
        let result = job.run(trigger).await;
        session.shutdown().await;
        let report = result?;
        info!(
            run_id = report.run_id,
            channels = report.channels_attempted,
            messages = report.messages_found,
            stop_reason = report.stop_reason.map(|reason| reason.as_str()),
            "worker finished"
        );
        return Ok(());
    }

    info!(
        interval_secs = settings.run_interval.as_secs(),
        "worker starting"
    );
    scheduler::run_periodic(
        job,
        settings.run_interval,
        args.run_on_start || settings.run_on_start,
        async {
            if let Err(err) = tokio::signal::ctrl_c().await {
                warn!(error = %err, "failed to listen for shutdown signal");
                std::future::pending::<()>().await;
            }
        },
    )
    .await;

    session.shutdown().await;
    info!("worker stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_default_to_periodic() {
        let args = Args::try_parse_from(["gleaner-worker"]).unwrap();
        assert!(!args.once);
        assert!(!args.run_on_start);
        assert!(args.single_run().is_none());
    }

    #[test]
    fn test_args_once() {
        let args = Args::try_parse_from(["gleaner-worker", "--once"]).unwrap();
        assert!(args.once);
        assert_eq!(args.single_run(), Some(RunTrigger::Manual));
    }

    #[test]
    fn test_args_reject_unknown_flag() {
        assert!(Args::try_parse_from(["gleaner-worker", "--forever"]).is_err());
    }
}
