//! Cache Registry Module
//!
//! Owns the named caches of a process. Passed by reference to whatever needs a
//! cache instead of living in global state.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::config::{CacheConfig, Config};
use crate::error::Result;
use crate::persistence::{FileBackend, SaveOutcome, SnapshotBackend};
use crate::persistent::PersistentCache;

#[derive(Debug)]
pub struct CacheRegistry {
    /// Settings for caches opened by name only
    defaults: Config,
    backend: Option<Arc<dyn SnapshotBackend>>,
    caches: RwLock<HashMap<String, PersistentCache>>,
}

impl CacheRegistry {
    pub fn new(defaults: Config, backend: Option<Arc<dyn SnapshotBackend>>) -> Self {
        Self {
            defaults,
            backend,
            caches: RwLock::new(HashMap::new()),
        }
    }

    /// Registry persisting to `config.data_dir`, or purely in memory when
    /// persistence is disabled.
    pub fn from_config(config: &Config) -> Self {
        let backend: Option<Arc<dyn SnapshotBackend>> = if config.enable_persistence {
            Some(Arc::new(FileBackend::new(&config.data_dir)))
        } else {
            None
        };
        Self::new(config.clone(), backend)
    }

    pub fn defaults(&self) -> &Config {
        &self.defaults
    }

    // == Open ==
    /// Returns the cache called `config.name`, creating it from `config` if needed.
    ///
    /// An already open cache is returned as is; `config` is ignored in that case.
    pub async fn open(&self, config: CacheConfig) -> Result<PersistentCache> {
        config.validate()?;
        if let Some(existing) = self.caches.read().await.get(&config.name) {
            return Ok(existing.clone());
        }

        let mut caches = self.caches.write().await;
        if let Some(existing) = caches.get(&config.name) {
            return Ok(existing.clone());
        }

        let name = config.name.clone();
        let cache = match &self.backend {
            Some(backend) => PersistentCache::open(config, backend.clone()).await?,
            None => PersistentCache::in_memory(config)?,
        };
        caches.insert(name.clone(), cache.clone());
        info!(cache = %name, total = caches.len(), "Cache registered");
        Ok(cache)
    }

    /// Returns the cache called `name`, creating it with the default settings if needed.
    pub async fn get_or_open(&self, name: &str) -> Result<PersistentCache> {
        self.open(self.defaults.cache_config(name)).await
    }

    pub async fn get(&self, name: &str) -> Option<PersistentCache> {
        self.caches.read().await.get(name).cloned()
    }

    /// Sorted names of all open caches.
    pub async fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.caches.read().await.keys().cloned().collect();
        names.sort();
        names
    }

    pub async fn caches(&self) -> Vec<PersistentCache> {
        self.caches.read().await.values().cloned().collect()
    }

    // == Flush All ==
    /// Checkpoints every cache now. Returns how many checkpoints failed.
    pub async fn flush_all(&self) -> usize {
        let mut failures = 0;
        for cache in self.caches().await {
            match cache.flush().await {
                Ok(SaveOutcome::Failed(_)) | Err(_) => failures += 1,
                Ok(_) => {}
            }
        }
        failures
    }

    // == Close All ==
    /// Flushes and stops every cache's checkpoint task.
    pub async fn close_all(&self) {
        for cache in self.caches().await {
            if let Err(err) = cache.close().await {
                warn!(cache = %cache.name(), error = %err, "Cache did not close cleanly");
            }
        }
    }
}
