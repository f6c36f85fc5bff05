pub mod health;
pub mod preview;
pub mod runs;
pub mod snapshot;

use axum::Router;

use crate::state::AppState;

pub fn v1_router(state: AppState) -> Router {
    Router::new()
        .merge(snapshot::router(state.clone()))
        .merge(runs::router(state.clone()))
        .merge(preview::router(state))
}

pub fn health_router() -> Router {
    health::router()
}
