//! Persistence Module
//!
//! Durable snapshots of cache state: the record format, the backends that store
//! it, and the incremental layer that decides what to write.

mod backend;
mod file;
mod incremental;
mod memory;
mod snapshot;

pub use backend::{record_key, SnapshotBackend, RECORD_PREFIX};
pub use file::FileBackend;
pub use incremental::{Persistence, SaveOutcome};
pub use memory::MemoryBackend;
pub use snapshot::{replay, Snapshot, SnapshotKind};
