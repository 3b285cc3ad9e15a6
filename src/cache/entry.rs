//! Cache Entry Module
//!
//! Defines the structure for individual cached images.

use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::cache::{CacheKey, Descriptor};

// == Cache Entry ==
/// A cached image together with the descriptor it was derived from.
///
/// Serialized in camelCase so save files stay readable by the browser UI.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheEntry {
    /// Derived key under which the entry is stored
    pub key: CacheKey,
    /// Compressed image as a `data:` URL
    pub image_url: String,
    /// Creation timestamp (Unix milliseconds)
    #[serde(rename = "timestamp")]
    pub created_at: u64,
    /// Echo of the source attributes, used to detect key collisions
    pub descriptor: Descriptor,
}

impl CacheEntry {
    // == Constructor ==
    /// Creates an entry stamped with the current time.
    pub fn new(key: CacheKey, image_url: String, descriptor: Descriptor) -> Self {
        Self {
            key,
            image_url,
            created_at: current_timestamp_ms(),
            descriptor,
        }
    }

    // == Age ==
    /// Milliseconds elapsed since the entry was written, relative to `now`.
    pub fn age_ms(&self, now: u64) -> u64 {
        now.saturating_sub(self.created_at)
    }

    // == Is Older Than ==
    /// True when `created_at < now - max_age_ms`.
    ///
    /// An entry sitting exactly on the boundary is retained.
    pub fn is_older_than(&self, max_age_ms: u64, now: u64) -> bool {
        match now.checked_sub(max_age_ms) {
            Some(cutoff) => self.created_at < cutoff,
            None => false,
        }
    }
}

// == Utility Functions ==
/// Returns current Unix timestamp in milliseconds.
pub fn current_timestamp_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;

    fn entry_at(created_at: u64) -> CacheEntry {
        let descriptor = Descriptor::Scene("park".to_string());
        CacheEntry {
            key: descriptor.derive_key(),
            image_url: "data:image/png;base64,AA==".to_string(),
            created_at,
            descriptor,
        }
    }

    #[test]
    fn test_entry_creation_stamps_now() {
        let before = current_timestamp_ms();
        let descriptor = Descriptor::Scene("cafe".to_string());
        let entry = CacheEntry::new(descriptor.derive_key(), "x".to_string(), descriptor);
        let after = current_timestamp_ms();

        assert!(entry.created_at >= before && entry.created_at <= after);
        assert!(entry.key.as_str().starts_with("bg_"));
    }

    #[test]
    fn test_is_older_than_boundary() {
        let now = 10_000;
        // created_at == now - max_age is retained
        assert!(!entry_at(9_000).is_older_than(1_000, now));
        // one millisecond earlier is evicted
        assert!(entry_at(8_999).is_older_than(1_000, now));
        // newer entries are retained
        assert!(!entry_at(9_500).is_older_than(1_000, now));
    }

    #[test]
    fn test_is_older_than_large_age_never_underflows() {
        assert!(!entry_at(0).is_older_than(u64::MAX, 5));
    }

    #[test]
    fn test_age_ms() {
        assert_eq!(entry_at(4_000).age_ms(10_000), 6_000);
        assert_eq!(entry_at(12_000).age_ms(10_000), 0);
    }

    #[test]
    fn test_entry_serializes_camel_case() {
        let json = serde_json::to_value(entry_at(42)).unwrap();
        assert_eq!(json["timestamp"], 42);
        assert!(json.get("imageUrl").is_some());
        assert_eq!(json["descriptor"], "park");
    }
}
