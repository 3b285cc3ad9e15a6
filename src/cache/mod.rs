//! Cache Module
//!
//! Namespaced image cache with deterministic key derivation, mandatory
//! compression on write, and age-based eviction, persisted to a
//! size-limited key-value store.

mod compress;
mod entry;
mod key;
mod local_store;
mod stats;
mod store;


use serde::{Deserialize, Serialize};

// Re-export public types
pub use compress::{compress, compress_async, Compressed};
pub use entry::{current_timestamp_ms, CacheEntry};
pub use key::{rolling_hash, CacheKey, CharacterDescriptor, Descriptor};
pub use local_store::{LocalStore, StoreError};
pub use stats::CacheStats;
pub use store::{ImageCache, PutOutcome};

// == Public Constants ==
/// Cache-format version tag; a stored tag that differs clears the cache.
pub const CACHE_VERSION: &str = "1.0.0";

/// Age threshold used when a write hits the storage quota (24 hours).
pub const QUOTA_EVICTION_AGE_MS: u64 = 24 * 60 * 60 * 1000;

/// Store key of the character portrait map.
pub const CHARACTER_IMAGES_KEY: &str = "ai_galgame_character_images";

/// Store key of the background image map.
pub const BACKGROUND_IMAGES_KEY: &str = "ai_galgame_background_images";

/// Store key of the cache-format version tag.
pub const IMAGE_CACHE_VERSION_KEY: &str = "ai_galgame_image_cache_version";

// == Namespace ==
/// Logically separate key spaces, cleared and evicted independently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Namespace {
    Character,
    Background,
}

impl Namespace {
    pub const ALL: [Namespace; 2] = [Namespace::Character, Namespace::Background];

    /// Prefix prepended to derived keys.
    pub fn key_prefix(self) -> &'static str {
        match self {
            Namespace::Character => "char_",
            Namespace::Background => "bg_",
        }
    }

    /// Key under which the namespace map is persisted.
    pub fn store_key(self) -> &'static str {
        match self {
            Namespace::Character => CHARACTER_IMAGES_KEY,
            Namespace::Background => BACKGROUND_IMAGES_KEY,
        }
    }

    /// Compression quality used on the primary write path.
    ///
    /// Backgrounds use high-fidelity mode (lossless, larger cap).
    pub fn primary_quality(self) -> f32 {
        match self {
            Namespace::Character => 0.7,
            Namespace::Background => 0.98,
        }
    }

    /// More aggressive quality used when retrying after a quota failure.
    pub fn fallback_quality(self) -> f32 {
        match self {
            Namespace::Character => 0.5,
            Namespace::Background => 0.95,
        }
    }
}
