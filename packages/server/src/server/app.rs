//! Application setup and server configuration.

use std::sync::Arc;

use axum::{
    extract::Extension,
    routing::{get, post},
    Router,
};
use sqlx::PgPool;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::domains::dispatch::{DispatchEngine, DispatchService, PgChargeLog, PgLeadTransitions};
use crate::domains::notifications::outbox::{NotificationOutbox, PgOutbox};
use crate::domains::notifications::BroadcastNotifier;
use crate::kernel::ServerDeps;
use crate::server::routes::{health_handler, submit_lead_handler};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub db_pool: PgPool,
    pub dispatch: Arc<DispatchService>,
    pub broadcast: Arc<BroadcastNotifier>,
    pub sms_blast_enabled: bool,
}

/// Build the Axum application router.
///
/// Wires the charge cascade and the broadcast notifier over the Postgres
/// stores; the outbox worker runs separately (see `main`).
pub fn build_app(config: &Config, deps: Arc<ServerDeps>) -> Router {
    let pool = deps.db_pool.clone();
    let outbox: Arc<dyn NotificationOutbox> = Arc::new(PgOutbox::new(pool.clone()));

    let leads = Arc::new(PgLeadTransitions::new(pool.clone()));
    let engine = DispatchEngine::new(
        leads.clone(),
        Arc::new(PgChargeLog::new(pool.clone())),
        deps.payments.clone(),
        outbox.clone(),
        deps.ranker.clone(),
    );
    let dispatch = Arc::new(DispatchService::new(
        engine,
        leads,
        outbox.clone(),
        config.admin_email.clone(),
    ));
    let broadcast = Arc::new(BroadcastNotifier::new(outbox, deps.geocoder.clone()));

    let state = AppState {
        db_pool: pool,
        dispatch,
        broadcast,
        sms_blast_enabled: config.sms_blast_enabled,
    };

    Router::new()
        .route("/health", get(health_handler))
        .route("/api/leads", post(submit_lead_handler))
        .layer(Extension(state))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}
