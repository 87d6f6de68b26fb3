//! Persistent Cache Module
//!
//! Cloneable handle tying a [`CacheStore`] to its checkpoint task.
//!
//! Reads and writes run synchronously under a single mutex and return before any
//! I/O happens; each mutation only posts a request to the checkpoint task, which
//! flushes once the cache has been quiet for the debounce window.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::cache::{CacheEntry, CacheStatsReport, CacheStore, Lookup};
use crate::config::CacheConfig;
use crate::error::{CacheError, Result};
use crate::persistence::{Persistence, SaveOutcome, SnapshotBackend};
use crate::tasks::{spawn_checkpoint_task, CheckpointCommand};

/// Locks a shared store, recovering the data if a holder panicked.
pub(crate) fn lock_store(store: &Mutex<CacheStore>) -> MutexGuard<'_, CacheStore> {
    store.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Debug)]
struct Shared {
    store: Arc<Mutex<CacheStore>>,
    /// Absent when persistence is disabled
    checkpoints: Option<mpsc::UnboundedSender<CheckpointCommand>>,
    task: Mutex<Option<JoinHandle<()>>>,
}

// == Persistent Cache ==
#[derive(Debug, Clone)]
pub struct PersistentCache {
    inner: Arc<Shared>,
}

impl PersistentCache {
    // == Open ==
    /// Creates a cache from `config`, restoring any prior snapshots from `backend`.
    ///
    /// Falls back to a purely in-memory cache when the config disables persistence.
    pub async fn open(config: CacheConfig, backend: Arc<dyn SnapshotBackend>) -> Result<Self> {
        let store = CacheStore::new(config)?;
        Self::from_store(store, Some(backend)).await
    }

    /// Creates a cache that never touches a backend.
    pub fn in_memory(config: CacheConfig) -> Result<Self> {
        let store = CacheStore::new(config.with_persistence(false))?;
        Ok(Self::detached(store))
    }

    /// Wraps a pre-built store, e.g. one with a custom clock or seed.
    pub async fn from_store(
        mut store: CacheStore,
        backend: Option<Arc<dyn SnapshotBackend>>,
    ) -> Result<Self> {
        let backend = match backend {
            Some(backend) if store.config().enable_persistence => backend,
            _ => return Ok(Self::detached(store)),
        };

        let config = store.config().clone();
        let persistence = Persistence::new(&config.name, backend, config.compact_after);

        let restored = persistence.load().await;
        if !restored.is_empty() {
            store.restore(restored);
        }

        let store = Arc::new(Mutex::new(store));
        let (tx, rx) = mpsc::unbounded_channel();
        let task = spawn_checkpoint_task(store.clone(), persistence, rx);

        info!(
            cache = %config.name,
            entries = lock_store(&store).len(),
            max_size = config.max_size,
            "Cache opened with persistence"
        );

        Ok(Self {
            inner: Arc::new(Shared {
                store,
                checkpoints: Some(tx),
                task: Mutex::new(Some(task)),
            }),
        })
    }

    fn detached(store: CacheStore) -> Self {
        debug!(cache = %store.name(), "Cache opened in memory only");
        Self {
            inner: Arc::new(Shared {
                store: Arc::new(Mutex::new(store)),
                checkpoints: None,
                task: Mutex::new(None),
            }),
        }
    }

    fn store(&self) -> MutexGuard<'_, CacheStore> {
        lock_store(&self.inner.store)
    }

    fn send(&self, command: CheckpointCommand) -> bool {
        match &self.inner.checkpoints {
            Some(tx) => tx.send(command).is_ok(),
            None => false,
        }
    }

    fn request_checkpoint(&self) {
        self.send(CheckpointCommand::Schedule);
    }

    pub fn name(&self) -> String {
        self.store().name().to_string()
    }

    pub fn config(&self) -> CacheConfig {
        self.store().config().clone()
    }

    pub fn is_persistent(&self) -> bool {
        self.inner.checkpoints.is_some()
    }

    // == Get ==
    /// Returns the value under `key` if present and fresh.
    pub fn get(&self, key: &str) -> Option<Value> {
        self.get_entry(key).map(|entry| entry.value)
    }

    /// Returns a copy of the entry under `key` if present and fresh.
    pub fn get_entry(&self, key: &str) -> Option<CacheEntry> {
        let lookup = self.store().get(key);
        if lookup == Lookup::Expired {
            self.request_checkpoint();
        }
        lookup.into_entry()
    }

    // == Set ==
    pub fn set(&self, key: impl Into<String>, value: impl Into<Value>) {
        self.store().set(key.into(), value.into());
        self.request_checkpoint();
    }

    // == Delete ==
    /// Removes `key`. Returns whether it existed.
    pub fn delete(&self, key: &str) -> bool {
        let removed = self.store().delete(key);
        self.request_checkpoint();
        removed
    }

    // == Clear ==
    /// Empties the cache and immediately rewrites the record as an empty full snapshot.
    pub fn clear(&self) {
        self.store().clear();
        self.send(CheckpointCommand::Reset);
    }

    // == Sweep Expired ==
    /// Removes every expired entry. Returns the number removed.
    pub fn sweep_expired(&self) -> usize {
        let removed = self.store().sweep_expired();
        if removed > 0 {
            self.request_checkpoint();
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.store().len()
    }

    pub fn is_empty(&self) -> bool {
        self.store().is_empty()
    }

    pub fn stats(&self) -> CacheStatsReport {
        self.store().stats()
    }

    pub fn reset_stats(&self) {
        self.store().reset_stats();
    }

    // == Flush ==
    /// Checkpoints now, bypassing the debounce window.
    pub async fn flush(&self) -> Result<SaveOutcome> {
        if !self.is_persistent() {
            return Ok(SaveOutcome::Disabled);
        }

        let (reply_tx, reply_rx) = oneshot::channel();
        if !self.send(CheckpointCommand::Flush(reply_tx)) {
            return Err(CacheError::Internal("checkpoint task has stopped".to_string()));
        }
        reply_rx
            .await
            .map_err(|_| CacheError::Internal("checkpoint task has stopped".to_string()))
    }

    // == Close ==
    /// Flushes and stops the checkpoint task. Later mutations stay in memory only.
    pub async fn close(&self) -> Result<SaveOutcome> {
        let outcome = self.flush().await;

        let task = self
            .inner
            .task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(task) = task {
            task.abort();
        }
        outcome
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::ManualClock;
    use crate::persistence::MemoryBackend;
    use serde_json::json;
    use std::time::Duration;

    async fn persistent(name: &str, backend: Arc<MemoryBackend>) -> PersistentCache {
        PersistentCache::open(CacheConfig::new(name), backend)
            .await
            .unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_set_get_roundtrip() {
        let cache = persistent("c", Arc::new(MemoryBackend::new())).await;

        cache.set("greeting", json!({"en": "hello"}));
        assert_eq!(cache.get("greeting"), Some(json!({"en": "hello"})));
        assert_eq!(cache.get_entry("greeting").unwrap().usage_count, 3);
        assert_eq!(cache.get("missing"), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_mutations_flush_after_quiet_period() {
        let backend = Arc::new(MemoryBackend::new());
        let cache = persistent("c", backend.clone()).await;

        for i in 0..100 {
            cache.set(format!("k{}", i), i);
        }
        tokio::time::sleep(Duration::from_millis(900)).await;
        assert_eq!(backend.writes(), 0);

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(backend.writes(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reopen_restores_state() {
        let backend = Arc::new(MemoryBackend::new());
        let cache = persistent("c", backend.clone()).await;

        cache.set("a", "1");
        cache.set("b", "2");
        cache.get("a");
        cache.flush().await.unwrap();

        cache.delete("b");
        cache.set("c", "3");
        assert_eq!(
            cache.flush().await.unwrap(),
            SaveOutcome::Incremental { changed: 1, removed: 1 }
        );
        cache.close().await.unwrap();

        let reopened = persistent("c", backend).await;
        assert_eq!(reopened.len(), 2);
        assert_eq!(reopened.get_entry("a").unwrap().usage_count, 3);
        assert_eq!(reopened.get("b"), None);
        assert_eq!(reopened.get("c"), Some(json!("3")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_flush_twice_writes_once() {
        let backend = Arc::new(MemoryBackend::new());
        let cache = persistent("c", backend.clone()).await;
        cache.set("a", 1);

        assert_eq!(cache.flush().await.unwrap(), SaveOutcome::Full { entries: 1 });
        assert_eq!(cache.flush().await.unwrap(), SaveOutcome::Skipped);
        assert_eq!(backend.writes(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_clear_rewrites_record() {
        let backend = Arc::new(MemoryBackend::new());
        let cache = persistent("c", backend.clone()).await;
        cache.set("a", 1);
        cache.flush().await.unwrap();

        cache.clear();
        tokio::time::sleep(Duration::from_millis(10)).await;

        assert_eq!(backend.writes(), 2);
        let reopened = persistent("c", backend).await;
        assert!(reopened.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_read_schedules_checkpoint() {
        let backend = Arc::new(MemoryBackend::new());
        let clock = Arc::new(ManualClock::new(0));
        let store = CacheStore::new(
            CacheConfig::new("ttl").with_expiry(Duration::from_millis(100)),
        )
        .unwrap()
        .with_clock(clock.clone());
        let cache = PersistentCache::from_store(store, Some(backend.clone()))
            .await
            .unwrap();

        cache.set("x", 1);
        cache.flush().await.unwrap();

        clock.advance(Duration::from_millis(150));
        assert_eq!(cache.get("x"), None);
        assert_eq!(cache.stats().misses, 1);
        assert_eq!(cache.len(), 0);

        tokio::time::sleep(Duration::from_millis(1100)).await;
        assert_eq!(backend.writes(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_disabled_persistence_never_writes() {
        let backend = Arc::new(MemoryBackend::new());
        let cache = PersistentCache::open(CacheConfig::new("off").with_persistence(false), backend.clone())
            .await
            .unwrap();

        for i in 0..1000 {
            cache.set(format!("k{}", i), i);
        }
        tokio::time::sleep(Duration::from_secs(10)).await;

        assert!(!cache.is_persistent());
        assert_eq!(cache.flush().await.unwrap(), SaveOutcome::Disabled);
        assert_eq!(backend.writes(), 0);
        assert_eq!(cache.len(), 500);
    }

    #[test]
    fn test_in_memory_without_runtime() {
        let cache = PersistentCache::in_memory(CacheConfig::new("mem").with_max_size(2)).unwrap();
        cache.set("a", 1);
        cache.set("b", 2);
        cache.set("c", 3);

        assert_eq!(cache.len(), 2);
        assert_eq!(cache.stats().cleanups, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_corrupt_record_starts_empty() {
        let backend = Arc::new(MemoryBackend::new());
        backend.push_raw("cachepoint_c", "garbage");

        let cache = persistent("c", backend.clone()).await;
        assert!(cache.is_empty());

        cache.set("a", 1);
        assert_eq!(cache.flush().await.unwrap(), SaveOutcome::Full { entries: 1 });
        assert_eq!(persistent("c", backend).await.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_checkpoint_is_retried_on_next_flush() {
        let backend = Arc::new(MemoryBackend::new());
        let cache = persistent("c", backend.clone()).await;
        cache.set("a", 1);

        backend.set_failing(true);
        assert!(matches!(cache.flush().await.unwrap(), SaveOutcome::Failed(_)));
        // Callers of set/get never see the failure
        cache.set("b", 2);
        assert_eq!(cache.get("a"), Some(json!(1)));

        backend.set_failing(false);
        assert_eq!(cache.flush().await.unwrap(), SaveOutcome::Full { entries: 2 });
    }
}
