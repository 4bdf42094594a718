pub mod admin;
pub mod draws;
pub mod health;
pub mod rounds;
pub mod webhook;

use crate::db::Repository;
use crate::domain::Ledger;
use crate::engine::RoundLedger;
use axum::{
    routing::{get, post},
    Router,
};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::Notify;
use tower_http::cors::{Any, CorsLayer};

#[derive(Clone)]
pub struct AppState {
    pub repo: Arc<Repository>,
    pub pot: Arc<RoundLedger>,
    /// Wake handles for the watchers, keyed by ledger; webhook nudges
    /// trigger an immediate poll instead of waiting out the cadence.
    pub wakes: Arc<BTreeMap<Ledger, Arc<Notify>>>,
}

pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health::health))
        .route("/ready", get(health::ready))
        .route("/v1/rounds/current", get(rounds::get_current_round))
        .route("/v1/draws", get(draws::list_draws))
        .route("/v1/draws/:round_id", get(draws::get_draw))
        .route("/v1/admin/finalize", post(admin::finalize))
        .route("/v1/webhook/:ledger", post(webhook::nudge))
        .layer(cors)
        .with_state(state)
}
