//! Response DTOs for the cache service API
//!
//! Defines the structure of outgoing HTTP response bodies.

use serde::Serialize;
use serde_json::Value;

use crate::cache::CacheEntry;
use crate::persistence::SaveOutcome;

/// Response body for reading an entry (GET /caches/:name/entries/:key)
#[derive(Debug, Clone, Serialize)]
pub struct GetResponse {
    pub key: String,
    pub value: Value,
    pub usage_count: u64,
    pub write_timestamp: u64,
}

impl GetResponse {
    pub fn new(key: impl Into<String>, entry: CacheEntry) -> Self {
        Self {
            key: key.into(),
            value: entry.value,
            usage_count: entry.usage_count,
            write_timestamp: entry.write_timestamp,
        }
    }
}

/// Generic acknowledgement naming the cache and optionally the key acted on
#[derive(Debug, Clone, Serialize)]
pub struct MessageResponse {
    /// Success message
    pub message: String,
    pub cache: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>, cache: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            cache: cache.into(),
            key: None,
        }
    }

    pub fn for_key(
        message: impl Into<String>,
        cache: impl Into<String>,
        key: impl Into<String>,
    ) -> Self {
        Self {
            key: Some(key.into()),
            ..Self::new(message, cache)
        }
    }
}

/// Response body for listing caches (GET /caches)
#[derive(Debug, Clone, Serialize)]
pub struct CacheListResponse {
    pub caches: Vec<String>,
}

/// Response body for a forced checkpoint (POST /caches/:name/flush)
#[derive(Debug, Clone, Serialize)]
pub struct FlushResponse {
    pub cache: String,
    /// "full", "incremental", "skipped", "disabled" or "failed"
    pub outcome: &'static str,
    pub entries_written: usize,
    pub entries_removed: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl FlushResponse {
    pub fn new(cache: impl Into<String>, outcome: SaveOutcome) -> Self {
        let cache = cache.into();
        let (label, written, removed, error) = match outcome {
            SaveOutcome::Full { entries } => ("full", entries, 0, None),
            SaveOutcome::Incremental { changed, removed } => ("incremental", changed, removed, None),
            SaveOutcome::Skipped => ("skipped", 0, 0, None),
            SaveOutcome::Disabled => ("disabled", 0, 0, None),
            SaveOutcome::Failed(err) => ("failed", 0, 0, Some(err)),
        };
        Self {
            cache,
            outcome: label,
            entries_written: written,
            entries_removed: removed,
            error,
        }
    }
}

/// Response body for the health check endpoint (GET /health)
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Health status ("healthy")
    pub status: String,
    pub caches: usize,
}

impl HealthResponse {
    pub fn healthy(caches: usize) -> Self {
        Self {
            status: "healthy".to_string(),
            caches,
        }
    }
}
