//! Incremental Persistence Module
//!
//! Writes only what changed since the last successful save, diffing against a
//! shadow copy of the state that save wrote.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::cache::CacheEntry;
use crate::error::{CacheError, Result};
use crate::persistence::{record_key, replay, Snapshot, SnapshotBackend};

// == Save Outcome ==
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveOutcome {
    /// Whole state written, replacing the record
    Full { entries: usize },
    /// Only the delta was appended
    Incremental { changed: usize, removed: usize },
    /// Nothing changed since the last save; no I/O
    Skipped,
    /// Persistence is off for this cache
    Disabled,
    /// The write failed; shadow state left untouched
    Failed(String),
}

// == Persistence ==
#[derive(Debug)]
pub struct Persistence {
    name: String,
    key: String,
    backend: Option<Arc<dyn SnapshotBackend>>,
    /// State as of the last successful write
    last_saved: Option<HashMap<String, CacheEntry>>,
    compact_after: u32,
    incrementals: u32,
    /// A write failed part-way; the record may hold a torn line
    needs_full: bool,
}

impl Persistence {
    pub fn new(name: &str, backend: Arc<dyn SnapshotBackend>, compact_after: u32) -> Self {
        Self {
            name: name.to_string(),
            key: record_key(name),
            backend: Some(backend),
            last_saved: None,
            compact_after,
            incrementals: 0,
            needs_full: false,
        }
    }

    /// A layer whose save and load do nothing.
    pub fn disabled(name: &str) -> Self {
        Self {
            name: name.to_string(),
            key: record_key(name),
            backend: None,
            last_saved: None,
            compact_after: u32::MAX,
            incrementals: 0,
            needs_full: false,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.backend.is_some()
    }

    pub fn record_key(&self) -> &str {
        &self.key
    }

    /// Forgets the shadow state so the next save is full.
    pub fn reset(&mut self) {
        self.last_saved = None;
        self.incrementals = 0;
    }

    // == Save ==
    /// Persists `view`, writing a delta when a previous save exists.
    ///
    /// On error the shadow state is unchanged and the next attempt rewrites the
    /// whole record, replacing anything the failed write left behind.
    pub async fn save(&mut self, view: HashMap<String, CacheEntry>) -> Result<SaveOutcome> {
        let Some(backend) = self.backend.clone() else {
            return Ok(SaveOutcome::Disabled);
        };

        let (snapshot, outcome) = match &self.last_saved {
            Some(prev) if !self.needs_full && *prev == view => return Ok(SaveOutcome::Skipped),
            Some(prev) if !self.needs_full && self.incrementals < self.compact_after => {
                let changed: Vec<(String, CacheEntry)> = view
                    .iter()
                    .filter(|(key, entry)| prev.get(*key) != Some(*entry))
                    .map(|(key, entry)| (key.clone(), entry.clone()))
                    .collect();
                let removed: Vec<String> = prev
                    .keys()
                    .filter(|key| !view.contains_key(*key))
                    .cloned()
                    .collect();
                let outcome = SaveOutcome::Incremental {
                    changed: changed.len(),
                    removed: removed.len(),
                };
                (Snapshot::incremental(changed, removed), outcome)
            }
            _ => {
                let entries: Vec<(String, CacheEntry)> = view
                    .iter()
                    .map(|(key, entry)| (key.clone(), entry.clone()))
                    .collect();
                let outcome = SaveOutcome::Full {
                    entries: entries.len(),
                };
                (Snapshot::full(entries), outcome)
            }
        };

        if let Err(err) = backend.write(&self.key, &snapshot).await {
            self.needs_full = true;
            return Err(err);
        }

        self.needs_full = false;
        match outcome {
            SaveOutcome::Incremental { .. } => self.incrementals += 1,
            _ => self.incrementals = 0,
        }
        self.last_saved = Some(view);
        Ok(outcome)
    }

    // == Checkpoint ==
    /// Saves and logs; failures never reach the caller.
    pub async fn checkpoint(&mut self, view: HashMap<String, CacheEntry>) -> SaveOutcome {
        match self.save(view).await {
            Ok(outcome) => {
                debug!(cache = %self.name, ?outcome, "Checkpoint complete");
                outcome
            }
            Err(err) => {
                warn!(cache = %self.name, error = %err, "Checkpoint failed, will retry on next flush");
                SaveOutcome::Failed(err.to_string())
            }
        }
    }

    // == Load ==
    /// Reconstructs state from every stored snapshot.
    ///
    /// Corrupt or unreadable records are logged and treated as absent.
    pub async fn load(&self) -> HashMap<String, CacheEntry> {
        let Some(backend) = &self.backend else {
            return HashMap::new();
        };

        match backend.read(&self.key).await {
            Ok(records) => {
                let count = records.len();
                let state = replay(records);
                if count > 0 {
                    info!(
                        cache = %self.name,
                        snapshots = count,
                        entries = state.len(),
                        "Restored cache from snapshots"
                    );
                }
                state
            }
            Err(CacheError::CorruptRecord(key)) => {
                warn!(cache = %self.name, record = %key, "Corrupt snapshot record, starting empty");
                HashMap::new()
            }
            Err(err) => {
                warn!(cache = %self.name, error = %err, "Could not read snapshots, starting empty");
                HashMap::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::MemoryBackend;
    use serde_json::json;

    fn view(pairs: &[(&str, i64)]) -> HashMap<String, CacheEntry> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), CacheEntry::new(json!(v), 100)))
            .collect()
    }

    fn layer(compact_after: u32) -> (Persistence, Arc<MemoryBackend>) {
        let backend = Arc::new(MemoryBackend::new());
        (Persistence::new("t", backend.clone(), compact_after), backend)
    }

    #[tokio::test]
    async fn test_first_save_is_full() {
        let (mut persistence, backend) = layer(32);

        let outcome = persistence.save(view(&[("a", 1), ("b", 2)])).await.unwrap();
        assert_eq!(outcome, SaveOutcome::Full { entries: 2 });
        assert_eq!(backend.writes(), 1);
    }

    #[tokio::test]
    async fn test_second_identical_save_is_skipped() {
        let (mut persistence, backend) = layer(32);

        persistence.save(view(&[("a", 1)])).await.unwrap();
        let outcome = persistence.save(view(&[("a", 1)])).await.unwrap();

        assert_eq!(outcome, SaveOutcome::Skipped);
        assert_eq!(backend.writes(), 1);
    }

    #[tokio::test]
    async fn test_incremental_contains_only_delta() {
        let (mut persistence, backend) = layer(32);

        persistence.save(view(&[("a", 1), ("b", 2), ("c", 3)])).await.unwrap();
        let outcome = persistence
            .save(view(&[("a", 1), ("b", 20), ("d", 4)]))
            .await
            .unwrap();

        assert_eq!(outcome, SaveOutcome::Incremental { changed: 2, removed: 1 });

        let records = backend.read("cachepoint_t").await.unwrap();
        assert_eq!(records.len(), 2);
        let mut keys: Vec<&str> = records[1].entries.iter().map(|(k, _)| k.as_str()).collect();
        keys.sort_unstable();
        assert_eq!(keys, vec!["b", "d"]);
        assert_eq!(records[1].removed, vec!["c".to_string()]);
    }

    #[tokio::test]
    async fn test_usage_change_counts_as_modified() {
        let (mut persistence, _) = layer(32);
        let mut state = view(&[("a", 1)]);
        persistence.save(state.clone()).await.unwrap();

        state.get_mut("a").unwrap().record_use();
        let outcome = persistence.save(state).await.unwrap();
        assert_eq!(outcome, SaveOutcome::Incremental { changed: 1, removed: 0 });
    }

    #[tokio::test]
    async fn test_failure_keeps_shadow() {
        let (mut persistence, backend) = layer(32);
        persistence.save(view(&[("a", 1)])).await.unwrap();

        backend.set_failing(true);
        let outcome = persistence.checkpoint(view(&[("a", 1), ("b", 2)])).await;
        assert!(matches!(outcome, SaveOutcome::Failed(_)));

        backend.set_failing(false);
        let outcome = persistence.save(view(&[("a", 1), ("b", 2)])).await.unwrap();
        assert_eq!(outcome, SaveOutcome::Full { entries: 2 });

        // Back to deltas once the record is whole again
        let outcome = persistence.save(view(&[("a", 1), ("b", 3)])).await.unwrap();
        assert_eq!(outcome, SaveOutcome::Incremental { changed: 1, removed: 0 });

        let restored = persistence.load().await;
        assert_eq!(restored, view(&[("a", 1), ("b", 3)]));
    }

    #[tokio::test]
    async fn test_unchanged_state_rewritten_after_failure() {
        let (mut persistence, backend) = layer(32);
        persistence.save(view(&[("a", 1)])).await.unwrap();

        backend.set_failing(true);
        persistence.checkpoint(view(&[("a", 1), ("b", 2)])).await;
        backend.set_failing(false);

        // Same state as the last good save, but the record may be damaged
        let outcome = persistence.save(view(&[("a", 1)])).await.unwrap();
        assert_eq!(outcome, SaveOutcome::Full { entries: 1 });
    }

    /// File backend whose next write leaves half a line behind and fails.
    #[derive(Debug)]
    struct TearingBackend {
        inner: crate::persistence::FileBackend,
        tear_next: std::sync::atomic::AtomicBool,
    }

    #[async_trait::async_trait]
    impl SnapshotBackend for TearingBackend {
        async fn write(&self, key: &str, snapshot: &Snapshot) -> Result<()> {
            if self.tear_next.swap(false, std::sync::atomic::Ordering::SeqCst) {
                let line = serde_json::to_string(snapshot)?;
                let mut contents = std::fs::read_to_string(self.inner.record_path(key))?;
                contents.push_str(&line[..line.len() / 2]);
                std::fs::write(self.inner.record_path(key), contents)?;
                return Err(CacheError::Io(std::io::Error::new(
                    std::io::ErrorKind::Other,
                    "disk full",
                )));
            }
            self.inner.write(key, snapshot).await
        }

        async fn read(&self, key: &str) -> Result<Vec<Snapshot>> {
            self.inner.read(key).await
        }
    }

    #[tokio::test]
    async fn test_torn_append_is_replaced_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let backend = Arc::new(TearingBackend {
            inner: crate::persistence::FileBackend::new(dir.path()),
            tear_next: std::sync::atomic::AtomicBool::new(false),
        });
        let mut persistence = Persistence::new("t", backend.clone(), 32);
        persistence.save(view(&[("a", 1), ("b", 2)])).await.unwrap();

        backend.tear_next.store(true, std::sync::atomic::Ordering::SeqCst);
        let outcome = persistence.checkpoint(view(&[("a", 1), ("b", 2), ("c", 3)])).await;
        assert!(matches!(outcome, SaveOutcome::Failed(_)));

        let outcome = persistence
            .save(view(&[("a", 1), ("b", 2), ("d", 4)]))
            .await
            .unwrap();
        assert_eq!(outcome, SaveOutcome::Full { entries: 3 });

        let reader = Persistence::new("t", backend, 32);
        assert_eq!(reader.load().await, view(&[("a", 1), ("b", 2), ("d", 4)]));
    }

    #[tokio::test]
    async fn test_failed_first_save_stays_full() {
        let (mut persistence, backend) = layer(32);
        backend.set_failing(true);
        persistence.checkpoint(view(&[("a", 1)])).await;

        backend.set_failing(false);
        let outcome = persistence.save(view(&[("a", 1)])).await.unwrap();
        assert_eq!(outcome, SaveOutcome::Full { entries: 1 });
    }

    #[tokio::test]
    async fn test_compaction_after_limit() {
        let (mut persistence, backend) = layer(2);

        persistence.save(view(&[("a", 1)])).await.unwrap();
        persistence.save(view(&[("a", 2)])).await.unwrap();
        persistence.save(view(&[("a", 3)])).await.unwrap();
        assert_eq!(backend.record_len("cachepoint_t"), 3);

        let outcome = persistence.save(view(&[("a", 4)])).await.unwrap();
        assert_eq!(outcome, SaveOutcome::Full { entries: 1 });
        assert_eq!(backend.record_len("cachepoint_t"), 1);
    }

    #[tokio::test]
    async fn test_reset_forces_full() {
        let (mut persistence, _) = layer(32);
        persistence.save(view(&[("a", 1)])).await.unwrap();

        persistence.reset();
        let outcome = persistence.save(HashMap::new()).await.unwrap();
        assert_eq!(outcome, SaveOutcome::Full { entries: 0 });
        assert!(persistence.load().await.is_empty());
    }

    #[tokio::test]
    async fn test_disabled_is_noop() {
        let mut persistence = Persistence::disabled("off");

        assert!(!persistence.is_enabled());
        assert_eq!(
            persistence.save(view(&[("a", 1)])).await.unwrap(),
            SaveOutcome::Disabled
        );
        assert!(persistence.load().await.is_empty());
    }

    #[tokio::test]
    async fn test_corrupt_record_loads_empty() {
        let (persistence, backend) = layer(32);
        backend.push_raw("cachepoint_t", "{oops");

        assert!(persistence.load().await.is_empty());
    }
}
