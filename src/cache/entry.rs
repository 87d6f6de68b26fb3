//! Cache Entry Module
//!
//! Defines the structure for individual cache entries with usage tracking.

use std::time::Duration;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

// == Cache Entry ==
/// Represents a single cache entry with value and metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheEntry {
    /// The stored value
    pub value: Value,
    /// Last write timestamp (Unix milliseconds)
    pub write_timestamp: u64,
    /// Successful reads since the last write, starting at 1
    #[serde(default = "initial_usage", deserialize_with = "usage_at_least_one")]
    pub usage_count: u64,
}

impl CacheEntry {
    // == Constructor ==
    /// Creates a fresh entry written at `now_ms`.
    pub fn new(value: Value, now_ms: u64) -> Self {
        Self {
            value,
            write_timestamp: now_ms,
            usage_count: initial_usage(),
        }
    }

    // == Age ==
    /// Milliseconds since the entry was written.
    pub fn age_ms(&self, now_ms: u64) -> u64 {
        now_ms.saturating_sub(self.write_timestamp)
    }

    // == Is Expired ==
    /// Checks if the entry has outlived `expiry`.
    ///
    /// Boundary condition: an entry is expired once its age reaches the expiry,
    /// so it is never served after the TTL has fully elapsed.
    pub fn is_expired(&self, now_ms: u64, expiry: Duration) -> bool {
        u128::from(self.age_ms(now_ms)) >= expiry.as_millis()
    }

    // == Record Use ==
    /// Increments the usage counter after a successful read.
    pub fn record_use(&mut self) {
        self.usage_count = self.usage_count.saturating_add(1);
    }
}

fn initial_usage() -> u64 {
    1
}

// Records written before usage tracking existed carry no counter, or a zero one.
fn usage_at_least_one<'de, D>(deserializer: D) -> std::result::Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<u64>::deserialize(deserializer)?;
    Ok(raw.unwrap_or(1).max(1))
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_entry_creation() {
        let entry = CacheEntry::new(json!("hola"), 1_000);

        assert_eq!(entry.value, json!("hola"));
        assert_eq!(entry.write_timestamp, 1_000);
        assert_eq!(entry.usage_count, 1);
    }

    #[test]
    fn test_entry_expiration() {
        let entry = CacheEntry::new(json!(1), 1_000);
        let expiry = Duration::from_millis(100);

        assert!(!entry.is_expired(1_050, expiry));
        assert!(entry.is_expired(1_150, expiry));
    }

    #[test]
    fn test_expiration_boundary_condition() {
        let entry = CacheEntry::new(json!(1), 1_000);

        // Entry should be expired once age == expiry
        assert!(entry.is_expired(1_100, Duration::from_millis(100)));
        assert!(!entry.is_expired(1_099, Duration::from_millis(100)));
    }

    #[test]
    fn test_clock_behind_write_is_not_expired() {
        let entry = CacheEntry::new(json!(1), 5_000);
        assert_eq!(entry.age_ms(4_000), 0);
        assert!(!entry.is_expired(4_000, Duration::from_millis(1)));
    }

    #[test]
    fn test_record_use() {
        let mut entry = CacheEntry::new(json!(1), 0);
        entry.record_use();
        entry.record_use();
        assert_eq!(entry.usage_count, 3);
    }

    #[test]
    fn test_serialized_field_names() {
        let entry = CacheEntry::new(json!({"text": "bonjour"}), 42);
        let encoded = serde_json::to_value(&entry).unwrap();

        assert_eq!(encoded["writeTimestamp"], json!(42));
        assert_eq!(encoded["usageCount"], json!(1));
        assert_eq!(encoded["value"]["text"], json!("bonjour"));
    }

    #[test]
    fn test_missing_usage_count_migrates_to_one() {
        let entry: CacheEntry =
            serde_json::from_str(r#"{"value":"x","writeTimestamp":10}"#).unwrap();
        assert_eq!(entry.usage_count, 1);

        let zero: CacheEntry =
            serde_json::from_str(r#"{"value":"x","writeTimestamp":10,"usageCount":0}"#).unwrap();
        assert_eq!(zero.usage_count, 1);

        let null: CacheEntry =
            serde_json::from_str(r#"{"value":"x","writeTimestamp":10,"usageCount":null}"#)
                .unwrap();
        assert_eq!(null.usage_count, 1);
    }
}
