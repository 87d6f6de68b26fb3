//! API Handlers
//!
//! HTTP request handlers for each cache service endpoint.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    Json,
};

use crate::cache::CacheStatsReport;
use crate::config::{validate_name, Config};
use crate::error::{CacheError, Result};
use crate::models::{
    CacheListResponse, CreateCacheRequest, FlushResponse, GetResponse, HealthResponse,
    MessageResponse, SetRequest,
};
use crate::persistent::PersistentCache;
use crate::registry::CacheRegistry;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Named caches of this server
    pub registry: Arc<CacheRegistry>,
}

impl AppState {
    pub fn new(registry: CacheRegistry) -> Self {
        Self {
            registry: Arc::new(registry),
        }
    }

    /// Creates a new AppState from configuration.
    pub fn from_config(config: &Config) -> Self {
        Self::new(CacheRegistry::from_config(config))
    }

    /// Looks up an open cache; unknown names are a 404.
    async fn existing(&self, name: &str) -> Result<PersistentCache> {
        self.registry
            .get(name)
            .await
            .ok_or_else(|| CacheError::NotFound(format!("cache '{}'", name)))
    }

    /// Opens `name` with the server defaults if it is not open yet.
    async fn open(&self, name: &str) -> Result<PersistentCache> {
        validate_name(name).map_err(|e| CacheError::InvalidRequest(e.to_string()))?;
        self.registry.get_or_open(name).await
    }
}

/// Handler for GET /caches
pub async fn list_caches_handler(State(state): State<AppState>) -> Json<CacheListResponse> {
    Json(CacheListResponse {
        caches: state.registry.names().await,
    })
}

/// Handler for POST /caches
///
/// Opens a cache with explicit settings. Returns the stats of the cache, which
/// may already have been open with other settings.
pub async fn create_cache_handler(
    State(state): State<AppState>,
    Json(req): Json<CreateCacheRequest>,
) -> Result<Json<CacheStatsReport>> {
    let config = req
        .into_config(state.registry.defaults())
        .map_err(|e| CacheError::InvalidRequest(e.to_string()))?;
    let cache = state.registry.open(config).await?;
    Ok(Json(cache.stats()))
}

/// Handler for PUT /caches/:name/entries
pub async fn set_handler(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Json(req): Json<SetRequest>,
) -> Result<Json<MessageResponse>> {
    // Validate request
    if let Some(error_msg) = req.validate() {
        return Err(CacheError::InvalidRequest(error_msg));
    }

    let cache = state.open(&name).await?;
    cache.set(req.key.clone(), req.value);

    Ok(Json(MessageResponse::for_key(
        format!("Key '{}' set successfully", req.key),
        name,
        req.key,
    )))
}

/// Handler for GET /caches/:name/entries/:key
pub async fn get_handler(
    State(state): State<AppState>,
    Path((name, key)): Path<(String, String)>,
) -> Result<Json<GetResponse>> {
    let cache = state.existing(&name).await?;
    let entry = cache
        .get_entry(&key)
        .ok_or_else(|| CacheError::NotFound(key.clone()))?;

    Ok(Json(GetResponse::new(key, entry)))
}

/// Handler for DELETE /caches/:name/entries/:key
pub async fn delete_handler(
    State(state): State<AppState>,
    Path((name, key)): Path<(String, String)>,
) -> Result<Json<MessageResponse>> {
    let cache = state.existing(&name).await?;
    if !cache.delete(&key) {
        return Err(CacheError::NotFound(key));
    }

    Ok(Json(MessageResponse::for_key(
        format!("Key '{}' deleted successfully", key),
        name,
        key,
    )))
}

/// Handler for DELETE /caches/:name
pub async fn clear_handler(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<MessageResponse>> {
    state.existing(&name).await?.clear();
    Ok(Json(MessageResponse::new("Cache cleared", name)))
}

/// Handler for GET /caches/:name/stats
pub async fn stats_handler(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<CacheStatsReport>> {
    Ok(Json(state.existing(&name).await?.stats()))
}

/// Handler for POST /caches/:name/stats/reset
pub async fn reset_stats_handler(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<MessageResponse>> {
    state.existing(&name).await?.reset_stats();
    Ok(Json(MessageResponse::new("Statistics reset", name)))
}

/// Handler for POST /caches/:name/flush
pub async fn flush_handler(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<FlushResponse>> {
    let outcome = state.existing(&name).await?.flush().await?;
    Ok(Json(FlushResponse::new(name, outcome)))
}

/// Handler for GET /health
pub async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse::healthy(state.registry.names().await.len()))
}
