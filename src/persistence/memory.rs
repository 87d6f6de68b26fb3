//! Memory Backend Module
//!
//! Keeps records in process, serialized exactly as the file backend would.
//! Counts writes and can be told to fail, which makes it the backend of choice
//! for exercising checkpoint behaviour.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;

use crate::error::{CacheError, Result};
use crate::persistence::{Snapshot, SnapshotBackend, SnapshotKind};

#[derive(Debug, Default)]
pub struct MemoryBackend {
    records: Mutex<HashMap<String, Vec<String>>>,
    writes: AtomicUsize,
    failing: AtomicBool,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Successful writes so far.
    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// Makes every following write fail until switched back.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Appends a raw line to a record, bypassing serialization.
    pub fn push_raw(&self, key: &str, line: impl Into<String>) {
        self.lock().entry(key.to_string()).or_default().push(line.into());
    }

    /// Number of snapshots currently held for `key`.
    pub fn record_len(&self, key: &str) -> usize {
        self.lock().get(key).map_or(0, Vec::len)
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Vec<String>>> {
        self.records.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl SnapshotBackend for MemoryBackend {
    async fn write(&self, key: &str, snapshot: &Snapshot) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(CacheError::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                "memory backend set to fail",
            )));
        }

        let line = serde_json::to_string(snapshot)?;
        {
            let mut records = self.lock();
            let record = records.entry(key.to_string()).or_default();
            if snapshot.kind == SnapshotKind::Full {
                record.clear();
            }
            record.push(line);
        }
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn read(&self, key: &str) -> Result<Vec<Snapshot>> {
        let lines = self.lock().get(key).cloned().unwrap_or_default();
        lines
            .iter()
            .map(|line| {
                serde_json::from_str(line).map_err(|_| CacheError::CorruptRecord(key.to_string()))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_counts_writes_and_replaces_on_full() {
        let backend = MemoryBackend::new();

        backend.write("k", &Snapshot::full(Vec::new())).await.unwrap();
        backend
            .write("k", &Snapshot::incremental(Vec::new(), vec!["x".into()]))
            .await
            .unwrap();
        assert_eq!(backend.record_len("k"), 2);

        backend.write("k", &Snapshot::full(Vec::new())).await.unwrap();
        assert_eq!(backend.record_len("k"), 1);
        assert_eq!(backend.writes(), 3);
    }

    #[tokio::test]
    async fn test_failing_writes() {
        let backend = MemoryBackend::new();
        backend.set_failing(true);

        assert!(backend.write("k", &Snapshot::full(Vec::new())).await.is_err());
        assert_eq!(backend.writes(), 0);
        assert_eq!(backend.record_len("k"), 0);
    }

    #[tokio::test]
    async fn test_corrupt_raw_line() {
        let backend = MemoryBackend::new();
        backend.push_raw("k", "not json");

        assert!(matches!(
            backend.read("k").await,
            Err(CacheError::CorruptRecord(_))
        ));
    }
}
