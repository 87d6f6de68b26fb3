//! Request DTOs for the cache service API
//!
//! Defines the structure of incoming HTTP request bodies.

use std::time::Duration;

use serde::Deserialize;
use serde_json::Value;

use crate::cache::{MAX_KEY_LENGTH, MAX_VALUE_SIZE};
use crate::config::{CacheConfig, Config, ExpiryProfile};
use crate::error::Result;

/// Request body for storing an entry (PUT /caches/:name/entries)
#[derive(Debug, Clone, Deserialize)]
pub struct SetRequest {
    /// The cache key
    pub key: String,
    /// The value to store, any JSON
    pub value: Value,
}

impl SetRequest {
    /// Validates the request data
    ///
    /// Returns an error message if validation fails, None if valid.
    pub fn validate(&self) -> Option<String> {
        if self.key.is_empty() {
            return Some("Key cannot be empty".to_string());
        }
        if self.key.len() > MAX_KEY_LENGTH {
            return Some(format!(
                "Key exceeds maximum length of {} bytes",
                MAX_KEY_LENGTH
            ));
        }
        let size = serde_json::to_vec(&self.value).map_or(usize::MAX, |v| v.len());
        if size > MAX_VALUE_SIZE {
            return Some(format!(
                "Value exceeds maximum size of {} bytes",
                MAX_VALUE_SIZE
            ));
        }
        None
    }
}

/// Request body for opening a cache with explicit settings (POST /caches)
#[derive(Debug, Clone, Deserialize)]
pub struct CreateCacheRequest {
    pub name: String,
    #[serde(default)]
    pub max_size: Option<usize>,
    /// Explicit TTL in seconds; takes precedence over `profile`
    #[serde(default)]
    pub expiry_secs: Option<u64>,
    /// "standard" (7 days) or "short" (1 hour)
    #[serde(default)]
    pub profile: Option<String>,
    #[serde(default)]
    pub enable_persistence: Option<bool>,
}

impl CreateCacheRequest {
    /// Overlays the request on the server defaults.
    pub fn into_config(self, defaults: &Config) -> Result<CacheConfig> {
        let mut config = defaults.cache_config(self.name);
        if let Some(profile) = self.profile {
            config = config.with_profile(profile.parse::<ExpiryProfile>()?);
        }
        if let Some(secs) = self.expiry_secs {
            config = config.with_expiry(Duration::from_secs(secs));
        }
        if let Some(max_size) = self.max_size {
            config = config.with_max_size(max_size);
        }
        if let Some(enabled) = self.enable_persistence {
            config = config.with_persistence(enabled);
        }
        config.validate()?;
        Ok(config)
    }
}
