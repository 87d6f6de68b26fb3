//! Snapshot Module
//!
//! Durable record format: a full snapshot followed by any number of incremental ones.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::cache::CacheEntry;

// == Snapshot Kind ==
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SnapshotKind {
    /// Every entry; replaces prior state on load
    Full,
    /// Entries changed since the previous snapshot; merged on load
    Incremental,
}

// == Snapshot ==
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub entries: Vec<(String, CacheEntry)>,
    pub kind: SnapshotKind,
    pub saved_at: DateTime<Utc>,
    /// Keys deleted since the previous snapshot
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub removed: Vec<String>,
}

impl Snapshot {
    pub fn full(entries: Vec<(String, CacheEntry)>) -> Self {
        Self {
            entries,
            kind: SnapshotKind::Full,
            saved_at: Utc::now(),
            removed: Vec::new(),
        }
    }

    pub fn incremental(entries: Vec<(String, CacheEntry)>, removed: Vec<String>) -> Self {
        Self {
            entries,
            kind: SnapshotKind::Incremental,
            saved_at: Utc::now(),
            removed,
        }
    }

    // == Apply ==
    /// Folds this snapshot into `state`.
    pub fn apply_to(self, state: &mut HashMap<String, CacheEntry>) {
        if self.kind == SnapshotKind::Full {
            state.clear();
        }
        for key in &self.removed {
            state.remove(key);
        }
        state.extend(self.entries);
    }
}

/// Rebuilds cache state from records in write order.
///
/// Incremental records with no preceding full record merge into empty state.
pub fn replay(snapshots: Vec<Snapshot>) -> HashMap<String, CacheEntry> {
    let mut state = HashMap::new();
    for snapshot in snapshots {
        snapshot.apply_to(&mut state);
    }
    state
}
