//! Configuration Module
//!
//! Handles server configuration loaded from environment variables and the
//! per-cache construction parameters derived from it.

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::error::{CacheError, Result};

// == Defaults ==
/// Default maximum number of entries per cache
pub const DEFAULT_MAX_SIZE: usize = 500;

/// Standard expiry profile (7 days)
pub const STANDARD_EXPIRY: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// Short expiry profile (1 hour)
pub const SHORT_EXPIRY: Duration = Duration::from_secs(60 * 60);

/// Fraction of capacity removed by one eviction run
pub const DEFAULT_EVICTION_RATIO: f64 = 0.2;

/// Lower bound of the checkpoint debounce window
pub const DEFAULT_DEBOUNCE_MIN: Duration = Duration::from_millis(1000);

/// Upper bound of the checkpoint debounce window
pub const DEFAULT_DEBOUNCE_MAX: Duration = Duration::from_millis(3000);

/// Consecutive incremental snapshots written before the next save is forced full
pub const DEFAULT_COMPACT_AFTER: u32 = 32;

const MAX_NAME_LENGTH: usize = 64;

// == Expiry Profile ==
/// Recognized expiry presets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExpiryProfile {
    /// Seven days
    #[default]
    Standard,
    /// One hour
    Short,
}

impl ExpiryProfile {
    pub fn duration(self) -> Duration {
        match self {
            ExpiryProfile::Standard => STANDARD_EXPIRY,
            ExpiryProfile::Short => SHORT_EXPIRY,
        }
    }
}

impl FromStr for ExpiryProfile {
    type Err = CacheError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "standard" => Ok(ExpiryProfile::Standard),
            "short" => Ok(ExpiryProfile::Short),
            other => Err(CacheError::Config(format!("unknown expiry profile '{}'", other))),
        }
    }
}

// == Cache Config ==
/// Construction parameters for a single named cache.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Cache name, also namespaces the durable record
    pub name: String,
    /// Maximum number of entries
    pub max_size: usize,
    /// Entry time-to-live
    pub expiry: Duration,
    /// Whether snapshots are written to and read from the backend
    pub enable_persistence: bool,
    /// Fraction of `max_size` evicted at once
    pub eviction_ratio: f64,
    /// Shortest checkpoint debounce window
    pub debounce_min: Duration,
    /// Longest checkpoint debounce window
    pub debounce_max: Duration,
    /// Incremental snapshots allowed before a full rewrite
    pub compact_after: u32,
}

impl CacheConfig {
    /// Creates a config with the standard (7 day) expiry profile.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            max_size: DEFAULT_MAX_SIZE,
            expiry: STANDARD_EXPIRY,
            enable_persistence: true,
            eviction_ratio: DEFAULT_EVICTION_RATIO,
            debounce_min: DEFAULT_DEBOUNCE_MIN,
            debounce_max: DEFAULT_DEBOUNCE_MAX,
            compact_after: DEFAULT_COMPACT_AFTER,
        }
    }

    /// Creates a config with the short (1 hour) expiry profile.
    pub fn short_lived(name: impl Into<String>) -> Self {
        Self::new(name).with_profile(ExpiryProfile::Short)
    }

    pub fn with_max_size(mut self, max_size: usize) -> Self {
        self.max_size = max_size;
        self
    }

    pub fn with_expiry(mut self, expiry: Duration) -> Self {
        self.expiry = expiry;
        self
    }

    pub fn with_profile(mut self, profile: ExpiryProfile) -> Self {
        self.expiry = profile.duration();
        self
    }

    pub fn with_persistence(mut self, enabled: bool) -> Self {
        self.enable_persistence = enabled;
        self
    }

    pub fn with_eviction_ratio(mut self, ratio: f64) -> Self {
        self.eviction_ratio = ratio;
        self
    }

    pub fn with_debounce(mut self, min: Duration, max: Duration) -> Self {
        self.debounce_min = min;
        self.debounce_max = max;
        self
    }

    pub fn with_compact_after(mut self, compact_after: u32) -> Self {
        self.compact_after = compact_after;
        self
    }

    // == Validate ==
    /// Rejects parameters the cache cannot operate with.
    pub fn validate(&self) -> Result<()> {
        validate_name(&self.name)?;
        if self.max_size == 0 {
            return Err(CacheError::Config("max_size must be at least 1".to_string()));
        }
        if self.expiry.is_zero() {
            return Err(CacheError::Config("expiry must be greater than zero".to_string()));
        }
        if !(self.eviction_ratio > 0.0 && self.eviction_ratio <= 1.0) {
            return Err(CacheError::Config(format!(
                "eviction_ratio must be in (0, 1], got {}",
                self.eviction_ratio
            )));
        }
        if self.debounce_min > self.debounce_max {
            return Err(CacheError::Config(
                "debounce_min must not exceed debounce_max".to_string(),
            ));
        }
        if self.compact_after == 0 {
            return Err(CacheError::Config("compact_after must be at least 1".to_string()));
        }
        Ok(())
    }
}

/// Cache names become part of record file names, so only a safe alphabet is accepted.
pub fn validate_name(name: &str) -> Result<()> {
    let valid = !name.is_empty()
        && name.len() <= MAX_NAME_LENGTH
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if valid {
        Ok(())
    } else {
        Err(CacheError::Config(format!(
            "cache name '{}' must match [A-Za-z0-9_-]{{1,{}}}",
            name, MAX_NAME_LENGTH
        )))
    }
}

// == Server Config ==
/// Server configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP server port
    pub server_port: u16,
    /// Directory holding snapshot records
    pub data_dir: PathBuf,
    /// Default capacity for caches opened without explicit settings
    pub max_size: usize,
    /// Default TTL in seconds
    pub expiry_secs: u64,
    /// Whether caches persist by default
    pub enable_persistence: bool,
    /// Fraction of capacity removed per eviction run
    pub eviction_ratio: f64,
    /// Debounce window lower bound in milliseconds
    pub debounce_min_ms: u64,
    /// Debounce window upper bound in milliseconds
    pub debounce_max_ms: u64,
    /// Incremental snapshots before a full rewrite
    pub compact_after: u32,
    /// Expired-entry sweep interval in seconds, 0 disables the sweep
    pub sweep_interval: u64,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `SERVER_PORT` - HTTP server port (default: 3000)
    /// - `DATA_DIR` - Snapshot directory (default: ./data)
    /// - `MAX_SIZE` - Default cache capacity (default: 500)
    /// - `EXPIRY_SECS` - Default TTL in seconds (default: 604800)
    /// - `ENABLE_PERSISTENCE` - Persist caches (default: true)
    /// - `EVICTION_RATIO` - Eviction batch fraction (default: 0.2)
    /// - `DEBOUNCE_MIN_MS` / `DEBOUNCE_MAX_MS` - Checkpoint window bounds (default: 1000 / 3000)
    /// - `COMPACT_AFTER` - Incremental snapshots per full rewrite (default: 32)
    /// - `SWEEP_INTERVAL` - Expiry sweep frequency in seconds (default: 0, disabled)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            server_port: env_or("SERVER_PORT", defaults.server_port),
            data_dir: env::var("DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.data_dir),
            max_size: env_or("MAX_SIZE", defaults.max_size),
            expiry_secs: env_or("EXPIRY_SECS", defaults.expiry_secs),
            enable_persistence: env_or("ENABLE_PERSISTENCE", defaults.enable_persistence),
            eviction_ratio: env_or("EVICTION_RATIO", defaults.eviction_ratio),
            debounce_min_ms: env_or("DEBOUNCE_MIN_MS", defaults.debounce_min_ms),
            debounce_max_ms: env_or("DEBOUNCE_MAX_MS", defaults.debounce_max_ms),
            compact_after: env_or("COMPACT_AFTER", defaults.compact_after),
            sweep_interval: env_or("SWEEP_INTERVAL", defaults.sweep_interval),
        }
    }

    /// Builds the cache settings used for `name` when no explicit settings are given.
    pub fn cache_config(&self, name: impl Into<String>) -> CacheConfig {
        CacheConfig::new(name)
            .with_max_size(self.max_size)
            .with_expiry(Duration::from_secs(self.expiry_secs))
            .with_persistence(self.enable_persistence)
            .with_eviction_ratio(self.eviction_ratio)
            .with_debounce(
                Duration::from_millis(self.debounce_min_ms),
                Duration::from_millis(self.debounce_max_ms),
            )
            .with_compact_after(self.compact_after)
    }

    /// Fails fast on defaults no cache could be built from.
    pub fn validate(&self) -> Result<()> {
        self.cache_config("defaults").validate()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_port: 3000,
            data_dir: PathBuf::from("./data"),
            max_size: DEFAULT_MAX_SIZE,
            expiry_secs: STANDARD_EXPIRY.as_secs(),
            enable_persistence: true,
            eviction_ratio: DEFAULT_EVICTION_RATIO,
            debounce_min_ms: DEFAULT_DEBOUNCE_MIN.as_millis() as u64,
            debounce_max_ms: DEFAULT_DEBOUNCE_MAX.as_millis() as u64,
            compact_after: DEFAULT_COMPACT_AFTER,
            sweep_interval: 0,
        }
    }
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
