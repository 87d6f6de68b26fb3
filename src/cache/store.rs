//! Cache Store Module
//!
//! Synchronous cache engine combining HashMap storage with usage-aware batch
//! eviction and lazy TTL expiration. Persistence is layered on top by
//! [`crate::PersistentCache`]; nothing in here performs I/O.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::SeedableRng;
use serde_json::Value;
use tracing::debug;

use crate::cache::{CacheEntry, CacheStats, CacheStatsReport, Clock, EvictionPolicy, SystemClock};
use crate::config::CacheConfig;
use crate::error::Result;

// == Lookup ==
/// Result of a read.
#[derive(Debug, Clone, PartialEq)]
pub enum Lookup {
    /// Entry found and fresh; carries a copy with the updated usage count
    Hit(CacheEntry),
    /// No entry under the key
    Missing,
    /// Entry was stale and has been removed
    Expired,
}

impl Lookup {
    pub fn into_entry(self) -> Option<CacheEntry> {
        match self {
            Lookup::Hit(entry) => Some(entry),
            Lookup::Missing | Lookup::Expired => None,
        }
    }

    pub fn into_value(self) -> Option<Value> {
        self.into_entry().map(|entry| entry.value)
    }
}

// == Cache Store ==
#[derive(Debug)]
pub struct CacheStore {
    /// Key-value storage
    entries: HashMap<String, CacheEntry>,
    /// Performance statistics
    stats: CacheStats,
    /// Construction parameters
    config: CacheConfig,
    eviction: EvictionPolicy,
    clock: Arc<dyn Clock>,
    rng: StdRng,
}

impl CacheStore {
    // == Constructor ==
    /// Creates an empty store after validating `config`.
    pub fn new(config: CacheConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            entries: HashMap::new(),
            stats: CacheStats::new(),
            eviction: EvictionPolicy::new(config.eviction_ratio),
            config,
            clock: Arc::new(SystemClock),
            rng: StdRng::from_entropy(),
        })
    }

    /// Replaces the time source.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Makes eviction victim selection reproducible.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    // == Get ==
    /// Retrieves an entry by key.
    ///
    /// A fresh entry has its usage count bumped and counts as a hit.
    /// A stale entry is removed on the spot and counts as a miss.
    pub fn get(&mut self, key: &str) -> Lookup {
        let now = self.clock.now_ms();
        let expiry = self.config.expiry;

        match self.entries.get_mut(key) {
            Some(entry) if entry.is_expired(now, expiry) => {
                self.entries.remove(key);
                self.stats.record_miss();
                debug!(cache = %self.config.name, key, "Expired entry removed on read");
                Lookup::Expired
            }
            Some(entry) => {
                entry.record_use();
                let hit = entry.clone();
                self.stats.record_hit();
                Lookup::Hit(hit)
            }
            None => {
                self.stats.record_miss();
                Lookup::Missing
            }
        }
    }

    // == Peek ==
    /// Looks at an entry without touching usage, stats or expiry.
    pub fn peek(&self, key: &str) -> Option<&CacheEntry> {
        self.entries.get(key)
    }

    // == Set ==
    /// Stores a value, resetting its usage count.
    ///
    /// Inserting a new key into a full store first evicts a batch of the
    /// lowest-valued entries. Returns the evicted keys.
    pub fn set(&mut self, key: String, value: Value) -> Vec<String> {
        let now = self.clock.now_ms();

        let evicted = if self.entries.contains_key(&key) {
            Vec::new()
        } else {
            self.evict(now)
        };

        self.entries.insert(key, CacheEntry::new(value, now));
        self.stats.record_set();
        evicted
    }

    fn evict(&mut self, now: u64) -> Vec<String> {
        let evicted = self
            .eviction
            .evict(&mut self.entries, self.config.max_size, &mut self.rng);
        if !evicted.is_empty() {
            self.stats.record_cleanup(evicted.len(), now);
            debug!(
                cache = %self.config.name,
                evicted = evicted.len(),
                remaining = self.entries.len(),
                "Capacity reached, evicted lowest-valued entries"
            );
        }
        evicted
    }

    // == Delete ==
    /// Removes an entry by key. Returns whether it existed.
    pub fn delete(&mut self, key: &str) -> bool {
        let removed = self.entries.remove(key).is_some();
        if removed {
            self.stats.record_delete();
        }
        removed
    }

    // == Clear ==
    /// Removes every entry. Statistics are kept.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    // == Sweep Expired ==
    /// Removes all expired entries. Returns the number removed.
    pub fn sweep_expired(&mut self) -> usize {
        let now = self.clock.now_ms();
        let expiry = self.config.expiry;
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.is_expired(now, expiry));
        before - self.entries.len()
    }

    // == Entries View ==
    /// Owned copy of the current contents, used for checkpointing.
    pub fn entries_view(&self) -> HashMap<String, CacheEntry> {
        self.entries.clone()
    }

    // == Restore ==
    /// Installs state recovered from snapshots, replacing current contents.
    ///
    /// Restored state larger than the capacity is trimmed by the eviction order.
    pub fn restore(&mut self, entries: HashMap<String, CacheEntry>) {
        self.entries = entries;
        for entry in self.entries.values_mut() {
            entry.usage_count = entry.usage_count.max(1);
        }

        let trimmed = self
            .eviction
            .trim(&mut self.entries, self.config.max_size, &mut self.rng);
        if !trimmed.is_empty() {
            debug!(
                cache = %self.config.name,
                trimmed = trimmed.len(),
                "Restored state exceeded capacity"
            );
        }
    }

    // == Stats ==
    /// Returns current cache statistics.
    pub fn stats(&self) -> CacheStatsReport {
        CacheStatsReport::from_stats(
            &self.config.name,
            &self.stats,
            self.entries.len(),
            self.config.max_size,
            self.config.expiry.as_millis() as u64,
            self.config.enable_persistence,
        )
    }

    pub fn reset_stats(&mut self) {
        self.stats.reset();
    }

    pub fn expiry(&self) -> Duration {
        self.config.expiry
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
