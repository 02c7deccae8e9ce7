//! API Router configuration

use super::handlers;
use super::state::AppState;
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Create the main API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health_check))
        // Runs
        .route("/run", post(handlers::submit_run))
        .route(
            "/run/:id",
            get(handlers::get_run).delete(handlers::delete_run),
        )
        .route("/run/:id/input", post(handlers::provide_input))
        .route("/run/:id/stream", get(handlers::stream_run))
        .route("/runs", get(handlers::list_runs))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}
