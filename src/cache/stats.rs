//! Cache Statistics Module
//!
//! Tracks image cache counters: lookups, evictions and dropped writes.

use serde::Serialize;

// == Cache Stats ==
/// Image cache counters and per-namespace entry counts.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CacheStats {
    /// Number of cached character portraits
    pub character_images: usize,
    /// Number of cached backgrounds
    pub background_images: usize,
    /// Sum of both namespaces
    pub total_cached: usize,
    /// Lookups that found an entry
    pub hits: u64,
    /// Lookups that found nothing (or a colliding descriptor)
    pub misses: u64,
    /// Entries removed by age-based eviction
    pub evictions: u64,
    /// Writes abandoned after the quota retry also failed
    pub dropped_writes: u64,
}

impl CacheStats {
    // == Constructor ==
    pub fn new() -> Self {
        Self::default()
    }

    // == Hit Rate ==
    /// Returns hits / (hits + misses), or 0.0 if no lookups have been made.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }

    pub fn record_hit(&mut self) {
        self.hits += 1;
    }

    pub fn record_miss(&mut self) {
        self.misses += 1;
    }

    pub fn record_evictions(&mut self, count: usize) {
        self.evictions += count as u64;
    }

    pub fn record_dropped_write(&mut self) {
        self.dropped_writes += 1;
    }

    // == Update Entry Counts ==
    pub fn set_counts(&mut self, character_images: usize, background_images: usize) {
        self.character_images = character_images;
        self.background_images = background_images;
        self.total_cached = character_images + background_images;
    }
}
