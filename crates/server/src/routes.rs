//! Route configuration.

use crate::handlers;
use crate::ratelimit::ip_rate_limit_middleware;
use crate::state::AppState;
use axum::Router;
use axum::middleware;
use axum::routing::{get, post};
use tower_http::trace::TraceLayer;

/// Create the application router.
pub fn create_router(state: AppState) -> Router {
    let rate_limit_state = state.rate_limit.clone();

    // Middleware layers are applied in reverse order (outermost first).
    // Order of execution: TraceLayer -> IP rate limit -> Handler
    Router::new()
        // Health check (intentionally unauthenticated for load balancers)
        .route("/health", get(handlers::health_check))
        // Registration and proxied fetch
        .route("/file", post(handlers::create_file))
        .route(
            "/file/{id}",
            get(handlers::fetch_file).delete(handlers::delete_file),
        )
        .layer(middleware::from_fn_with_state(
            rate_limit_state,
            ip_rate_limit_middleware,
        ))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
