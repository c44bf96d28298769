//! Application setup and server configuration.

use std::sync::Arc;
use std::time::Duration;

use axum::http::{
    header::{AUTHORIZATION, CONTENT_TYPE},
    Method,
};
use axum::middleware;
use axum::routing::{delete, get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::monitors::RetentionCleaner;
use crate::registry::OperationRegistry;
use crate::services::{BotService, JobService};
use crate::store::Store;

use super::middleware::admin_auth_middleware;
use super::routes::{admin, bots, health, jobs, metrics, operations};

/// Shared application state, cheap to clone: every field is itself an
/// `Arc`-backed handle or a `Clone`-able service wrapping a connection pool.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub store: Store,
    pub jobs: JobService,
    pub bots: BotService,
    pub registry: OperationRegistry,
    pub cleaner: Arc<RetentionCleaner>,
}

/// Builds the Axum router: public job/bot/operation/health endpoints plus
/// an admin-gated subset behind [`admin_auth_middleware`]. The admin token
/// check happens once, in the middleware; handlers never re-check it.
pub fn build_app(state: AppState) -> Router {
    let admin_routes = Router::new()
        .route("/jobs/populate", post(jobs::populate))
        .route("/jobs/:id/release", post(jobs::release))
        .route("/bots/:id/assign-operation", post(bots::assign_operation))
        .route("/bots/:id", delete(bots::soft_delete))
        .route("/bots/:id/reset", post(bots::reset))
        .route("/admin/cleanup", post(admin::cleanup))
        .route("/admin/cleanup/status", get(admin::cleanup_status))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            admin_auth_middleware,
        ));

    let public_routes = Router::new()
        .route("/jobs", get(jobs::list))
        .route("/jobs/:id", get(jobs::get))
        .route("/jobs/claim", post(jobs::claim))
        .route("/jobs/:id/start", post(jobs::start))
        .route("/jobs/:id/complete", post(jobs::complete))
        .route("/jobs/:id/fail", post(jobs::fail))
        .route("/bots/register", post(bots::register))
        .route("/bots/heartbeat", post(bots::heartbeat))
        .route("/bots", get(bots::list))
        .route("/operations", get(operations::list))
        .route("/metrics/summary", get(metrics::summary))
        .route("/healthz", get(health::healthz))
        .route("/", get(health::root));

    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST, Method::DELETE])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE]);

    Router::new()
        .merge(admin_routes)
        .merge(public_routes)
        .layer(TimeoutLayer::new(Duration::from_secs(30)))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
