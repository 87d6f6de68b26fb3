//! API Routes
//!
//! Configures the Axum router with all cache service endpoints.

use axum::{
    routing::{delete, get, post, put},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use super::handlers::{
    clear_handler, create_cache_handler, delete_handler, flush_handler, get_handler,
    health_handler, list_caches_handler, reset_stats_handler, set_handler, stats_handler,
    AppState,
};

/// Creates the main router with all endpoints configured.
///
/// # Endpoints
/// - `GET /health` - Health check endpoint
/// - `GET /caches` - List open caches
/// - `POST /caches` - Open a cache with explicit settings
/// - `PUT /caches/:name/entries` - Store a key-value pair, opening the cache if needed
/// - `GET /caches/:name/entries/:key` - Retrieve a value by key
/// - `DELETE /caches/:name/entries/:key` - Delete a key
/// - `DELETE /caches/:name` - Clear a cache
/// - `GET /caches/:name/stats` - Get cache statistics
/// - `POST /caches/:name/stats/reset` - Reset cache statistics
/// - `POST /caches/:name/flush` - Checkpoint a cache now
///
/// # Middleware
/// - CORS: Allows any origin (configurable for production)
/// - Tracing: Logs all requests for debugging
pub fn create_router(state: AppState) -> Router {
    // Configure CORS middleware
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_handler))
        .route("/caches", get(list_caches_handler).post(create_cache_handler))
        .route("/caches/:name", delete(clear_handler))
        .route("/caches/:name/entries", put(set_handler))
        .route(
            "/caches/:name/entries/:key",
            get(get_handler).delete(delete_handler),
        )
        .route("/caches/:name/stats", get(stats_handler))
        .route("/caches/:name/stats/reset", post(reset_stats_handler))
        .route("/caches/:name/flush", post(flush_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
