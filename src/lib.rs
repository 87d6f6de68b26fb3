//! Cachepoint - A bounded cache with incremental checkpointing
//!
//! Keeps up to `max_size` entries per named cache, evicting the least used in
//! batches, expiring entries lazily after their TTL, and persisting state in the
//! background by writing only what changed since the last checkpoint.

pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod models;
pub mod persistence;
pub mod persistent;
pub mod registry;
pub mod tasks;

pub use api::AppState;
pub use config::{CacheConfig, Config};
pub use error::{CacheError, Result};
pub use persistent::PersistentCache;
pub use registry::CacheRegistry;
pub use tasks::spawn_sweep_task;
