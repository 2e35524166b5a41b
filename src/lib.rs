pub mod config;
pub mod db;
pub mod error;
pub mod export;
pub mod handlers;
pub mod matcher;
pub mod middleware;
pub mod models;
pub mod offline_queue;
pub mod reconciler;
pub mod repository;
pub mod sqlite_repo;
pub mod strength;
pub mod urlmatch;
pub mod usage;
pub mod util;

use axum::{
    middleware as axum_middleware,
    routing::{get, post},
    Router,
};
use middleware::rate_limit::RateLimiter;
use repository::CredentialStore;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn CredentialStore>,
    pub rate_limiter: RateLimiter,
    pub max_sync_batch: usize,
}

fn credential_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/api/v1/credentials",
            get(handlers::credentials::list).post(handlers::credentials::create),
        )
        .route(
            "/api/v1/credentials/export",
            get(handlers::transfer::export),
        )
        .route(
            "/api/v1/credentials/import",
            post(handlers::transfer::import),
        )
        .route(
            "/api/v1/credentials/shared",
            get(handlers::credentials::shared_with_me),
        )
        .route(
            "/api/v1/credentials/site/:domain",
            get(handlers::credentials::list_by_site),
        )
        .route(
            "/api/v1/credentials/:id",
            get(handlers::credentials::get)
                .put(handlers::credentials::update)
                .delete(handlers::credentials::delete),
        )
        .route(
            "/api/v1/credentials/:id/strength",
            get(handlers::credentials::strength),
        )
        .route(
            "/api/v1/credentials/:id/share",
            post(handlers::credentials::share),
        )
}

fn autofill_routes() -> Router<AppState> {
    Router::new()
        .route("/api/v1/autofill", get(handlers::autofill::find_matches))
        .route(
            "/api/v1/autofill/usage/:id",
            post(handlers::autofill::record_usage),
        )
}

fn sync_routes() -> Router<AppState> {
    Router::new().route("/api/v1/sync", post(handlers::sync::sync))
}

fn form_profile_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/api/v1/forms",
            get(handlers::forms::list).post(handlers::forms::create),
        )
        .route(
            "/api/v1/forms/:id",
            get(handlers::forms::get)
                .put(handlers::forms::update)
                .delete(handlers::forms::delete),
        )
}

fn health_routes() -> Router<AppState> {
    Router::new().route("/health", get(handlers::health::health_check))
}

fn admin_routes() -> Router<AppState> {
    Router::new()
        .route("/admin/metrics", get(handlers::admin::get_metrics))
        .layer(axum_middleware::from_fn(
            middleware::admin_auth::require_admin_token,
        ))
}

/// Build the full application router (used by main and tests).
pub fn build_app(state: AppState) -> Router {
    let authenticated = credential_routes()
        .merge(autofill_routes())
        .merge(sync_routes())
        .merge(form_profile_routes())
        .layer(axum_middleware::from_fn(middleware::auth::require_owner));

    Router::new()
        .merge(authenticated)
        .merge(health_routes())
        .merge(admin_routes())
        .with_state(state)
}
