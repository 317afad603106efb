//! HTTP router construction.

use std::sync::Arc;

use axum::http::HeaderValue;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tracing::warn;

use crate::state::AppState;
use crate::{api, live};

/// Build the application router with all routes and middleware.
pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = cors_layer(&state.config.server.cors_origin);

    Router::new()
        .route("/health", get(api::health))
        .route("/ws", get(live::ws_upgrade))
        .route("/api/code/repo", post(api::add_repository))
        .route(
            "/api/code/repo/{*uri}",
            get(api::get_repository).delete(api::delete_repository),
        )
        .route("/api/code/repos", get(api::list_repositories))
        .route("/api/code/repoCloneStatus/{*uri}", get(api::clone_status))
        .route("/api/code/repoStatus/{*uri}", get(api::repository_status))
        .route("/api/code/repoIndex/{*uri}", post(api::index_repository))
        .route("/api/code/jobs/metrics", get(api::job_metrics))
        .layer(cors)
        .with_state(state)
}

fn cors_layer(origin: &str) -> CorsLayer {
    if origin == "*" {
        return CorsLayer::permissive();
    }
    match origin.parse::<HeaderValue>() {
        Ok(value) => CorsLayer::new()
            .allow_origin(value)
            .allow_methods(Any)
            .allow_headers(Any),
        Err(e) => {
            warn!(origin, error = %e, "invalid CORS_ORIGIN, allowing any origin");
            CorsLayer::permissive()
        }
    }
}
