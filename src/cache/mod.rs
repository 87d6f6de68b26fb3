//! Cache Module
//!
//! Provides the in-memory store with TTL expiration and usage-aware batch eviction.

mod clock;
mod entry;
mod eviction;
mod select;
mod stats;
mod store;


// Re-export public types
pub use clock::{current_timestamp_ms, Clock, ManualClock, SystemClock};
pub use entry::CacheEntry;
pub use eviction::{eviction_order, EvictionPolicy};
pub use select::select_lowest;
pub use stats::{CacheStats, CacheStatsReport};
pub use store::{CacheStore, Lookup};

// == Public Constants ==
/// Maximum allowed key length in bytes
pub const MAX_KEY_LENGTH: usize = 256;

/// Maximum allowed serialized value size in bytes
pub const MAX_VALUE_SIZE: usize = 1024 * 1024; // 1 MB
