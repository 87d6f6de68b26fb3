//! Backend Module
//!
//! Interface to the durable store that holds snapshot records.

use async_trait::async_trait;

use crate::error::Result;
use crate::persistence::Snapshot;

/// Prefix of every durable record key.
pub const RECORD_PREFIX: &str = "cachepoint_";

/// Durable record key for the cache called `name`.
pub fn record_key(name: &str) -> String {
    format!("{}{}", RECORD_PREFIX, name)
}

/// Durable storage for snapshot records.
///
/// A record is an ordered list of snapshots. Writing a full snapshot replaces the
/// record; writing an incremental one appends to it.
#[async_trait]
pub trait SnapshotBackend: Send + Sync + std::fmt::Debug {
    /// Persists `snapshot` under `key`.
    async fn write(&self, key: &str, snapshot: &Snapshot) -> Result<()>;

    /// Returns the record's snapshots in write order, empty if there is none.
    ///
    /// Fails with `CacheError::CorruptRecord` when the record cannot be parsed.
    async fn read(&self, key: &str) -> Result<Vec<Snapshot>>;
}
