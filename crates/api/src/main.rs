use axum::{middleware::from_fn, Router};
use sqlx::postgres::PgPoolOptions;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tracing::{info, warn};

mod error;
mod middleware;
mod routes;
mod state;

use crate::middleware::request_id::request_id;
use crate::state::AppState;
use db::{PgLedger, RunLedger};
use gateway::GatewayClient;
use gleaner_core::config::Settings;
use pipeline::{job::IngestJob, preview::Previewer, scheduler, session::SharedSession};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .json()
        .init();

    let settings = Settings::from_env()?;
    info!(?settings, "configuration loaded");

    let db = PgPoolOptions::new()
        .max_connections(10)
        .connect(&settings.database_url)
        .await?;
    db::migrate(&db).await?;

    let ledger: Arc<dyn RunLedger> = Arc::new(PgLedger::new(db));
    let client = GatewayClient::new(&settings.gateway_url, settings.session_token.clone())?;
    let session = SharedSession::new(Arc::new(client));

    let job = IngestJob::from_settings(&settings, session.clone(), ledger.clone());
    let state = AppState {
        ledger,
        job: job.clone(),
        previewer: Previewer::from_settings(&settings, session.clone()),
    };

    let (stop_tx, stop_rx) = oneshot::channel::<()>();
    let scheduler = tokio::spawn(scheduler::run_periodic(
        job,
        settings.run_interval,
        settings.run_on_start,
        async move {
            let _ = stop_rx.await;
        },
    ));

    let app = Router::new()
        .merge(routes::health_router())
        .merge(routes::v1_router(state))
        .layer(from_fn(request_id));

    let addr: SocketAddr = settings.api_bind.parse()?;
    info!(%addr, "starting api");

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    let _ = stop_tx.send(());
    if let Err(err) = scheduler.await {
        warn!(error = %err, "scheduler task ended abnormally");
    }
    session.shutdown().await;
    info!("api stopped");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(error = %err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("shutdown signal received");
}
