//! Eviction Policy Module
//!
//! Removes the least valuable entries in batches once the store is full.
//! Value is ranked by usage count first and write time second, so rarely read
//! entries go before popular ones and older entries before newer ones.

use std::cmp::Ordering;
use std::collections::HashMap;

use rand::Rng;

use crate::cache::select::select_lowest;
use crate::cache::CacheEntry;
use crate::config::DEFAULT_EVICTION_RATIO;

// == Eviction Policy ==
#[derive(Debug, Clone, Copy)]
pub struct EvictionPolicy {
    /// Fraction of capacity removed by one run
    ratio: f64,
}

impl Default for EvictionPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_EVICTION_RATIO)
    }
}

impl EvictionPolicy {
    pub fn new(ratio: f64) -> Self {
        Self { ratio }
    }

    pub fn ratio(&self) -> f64 {
        self.ratio
    }

    // == Batch Size ==
    /// Number of entries one run removes for a store of `max_size`.
    pub fn batch_size(&self, max_size: usize) -> usize {
        ((max_size as f64 * self.ratio).ceil() as usize).max(1)
    }

    // == Evict ==
    /// Frees room for one more entry by removing a batch of the lowest-valued entries.
    ///
    /// Does nothing while the store is still below `max_size`. Returns the removed keys.
    pub fn evict<R: Rng + ?Sized>(
        &self,
        entries: &mut HashMap<String, CacheEntry>,
        max_size: usize,
        rng: &mut R,
    ) -> Vec<String> {
        if entries.len() < max_size {
            return Vec::new();
        }
        let k = self.batch_size(max_size).min(entries.len());
        remove_lowest(entries, k, rng)
    }

    // == Trim ==
    /// Removes just enough of the lowest-valued entries to get down to `limit`.
    pub fn trim<R: Rng + ?Sized>(
        &self,
        entries: &mut HashMap<String, CacheEntry>,
        limit: usize,
        rng: &mut R,
    ) -> Vec<String> {
        let excess = entries.len().saturating_sub(limit);
        remove_lowest(entries, excess, rng)
    }
}

/// Eviction order: lower usage first, then older write first.
pub fn eviction_order(a: &CacheEntry, b: &CacheEntry) -> Ordering {
    (a.usage_count, a.write_timestamp).cmp(&(b.usage_count, b.write_timestamp))
}

fn remove_lowest<R: Rng + ?Sized>(
    entries: &mut HashMap<String, CacheEntry>,
    k: usize,
    rng: &mut R,
) -> Vec<String> {
    if k == 0 {
        return Vec::new();
    }

    let candidates: Vec<(&String, &CacheEntry)> = entries.iter().collect();
    let victims: Vec<String> = select_lowest(candidates, k, |a, b| eviction_order(a.1, b.1), rng)
        .into_iter()
        .map(|(key, _)| key.clone())
        .collect();

    for key in &victims {
        entries.remove(key);
    }
    victims
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use serde_json::json;

    fn entry(usage: u64, ts: u64) -> CacheEntry {
        CacheEntry {
            value: json!(null),
            write_timestamp: ts,
            usage_count: usage,
        }
    }

    fn populated(n: u64) -> HashMap<String, CacheEntry> {
        (0..n).map(|i| (format!("k{}", i), entry(1, i))).collect()
    }

    #[test]
    fn test_batch_size() {
        let policy = EvictionPolicy::default();
        assert_eq!(policy.batch_size(500), 100);
        assert_eq!(policy.batch_size(3), 1);
        assert_eq!(policy.batch_size(11), 3);
        assert_eq!(EvictionPolicy::new(1.0).batch_size(7), 7);
    }

    #[test]
    fn test_evict_noop_below_capacity() {
        let mut rng = StdRng::seed_from_u64(0);
        let mut entries = populated(4);

        let removed = EvictionPolicy::default().evict(&mut entries, 5, &mut rng);
        assert!(removed.is_empty());
        assert_eq!(entries.len(), 4);
    }

    #[test]
    fn test_evict_removes_oldest_batch() {
        let mut rng = StdRng::seed_from_u64(0);
        let mut entries = populated(10);

        let mut removed = EvictionPolicy::default().evict(&mut entries, 10, &mut rng);
        removed.sort();
        assert_eq!(removed, vec!["k0".to_string(), "k1".to_string()]);
        assert_eq!(entries.len(), 8);
    }

    #[test]
    fn test_evict_prefers_low_usage_over_age() {
        let mut rng = StdRng::seed_from_u64(0);
        let mut entries = HashMap::new();
        entries.insert("old_popular".to_string(), entry(9, 1));
        entries.insert("new_unused".to_string(), entry(1, 50));
        entries.insert("mid".to_string(), entry(3, 10));

        let removed = EvictionPolicy::default().evict(&mut entries, 3, &mut rng);
        assert_eq!(removed, vec!["new_unused".to_string()]);
        assert!(entries.contains_key("old_popular"));
    }

    #[test]
    fn test_evict_bounded_by_store_size() {
        let mut rng = StdRng::seed_from_u64(0);
        let mut entries = populated(2);

        // ratio 1.0 on max 2 would remove 2; never more than present
        let removed = EvictionPolicy::new(1.0).evict(&mut entries, 2, &mut rng);
        assert_eq!(removed.len(), 2);
        assert!(entries.is_empty());
    }

    #[test]
    fn test_trim_to_limit() {
        let mut rng = StdRng::seed_from_u64(0);
        let mut entries = populated(10);

        let removed = EvictionPolicy::default().trim(&mut entries, 6, &mut rng);
        assert_eq!(removed.len(), 4);
        assert_eq!(entries.len(), 6);
        for i in 4..10 {
            assert!(entries.contains_key(&format!("k{}", i)));
        }

        let none = EvictionPolicy::default().trim(&mut entries, 6, &mut rng);
        assert!(none.is_empty());
    }
}
