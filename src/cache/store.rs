//! Image Cache Store Module
//!
//! Namespaced cache engine: one JSON map per namespace persisted in the
//! local store, mandatory compression on write, and age-based eviction
//! with a single compressed retry when the store runs out of room.

use std::collections::BTreeMap;

use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, error, info, warn};

use crate::cache::{
    compress_async, current_timestamp_ms, CacheEntry, CacheKey, CacheStats, CharacterDescriptor,
    Descriptor, LocalStore, Namespace, StoreError, CACHE_VERSION, IMAGE_CACHE_VERSION_KEY,
    QUOTA_EVICTION_AGE_MS,
};

// == Namespace Map ==
/// One namespace as stored: readable entries plus any entries that could
/// not be decoded, which are written back unchanged.
#[derive(Debug, Default)]
struct NamespaceMap {
    entries: BTreeMap<CacheKey, CacheEntry>,
    unreadable: BTreeMap<String, Value>,
}

/// Entry layout written by earlier clients, still found in old save files.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct LegacyEntry {
    image_url: String,
    timestamp: u64,
    scene_description: Option<String>,
    profile: Option<LegacyProfile>,
}

#[derive(Deserialize)]
struct LegacyProfile {
    #[serde(default)]
    nickname: String,
    #[serde(default)]
    appearance: String,
}

impl LegacyEntry {
    /// Rebuilds the descriptor from what the old layout kept. Portraits only
    /// recorded nickname and appearance, so the result never matches a full
    /// descriptor and the next verified lookup regenerates the image.
    fn into_entry(self, namespace: Namespace, key: CacheKey) -> Option<CacheEntry> {
        let descriptor = match namespace {
            Namespace::Background => Descriptor::Scene(self.scene_description?),
            Namespace::Character => {
                let profile = self.profile?;
                Descriptor::Character(CharacterDescriptor {
                    nickname: profile.nickname,
                    gender: String::new(),
                    appearance: profile.appearance,
                    settings: String::new(),
                })
            }
        };
        Some(CacheEntry {
            key,
            image_url: self.image_url,
            created_at: self.timestamp,
            descriptor,
        })
    }
}

fn decode_entry(namespace: Namespace, key: &str, value: &Value) -> Option<CacheEntry> {
    let key = CacheKey::from_stored(key.to_string());
    if let Ok(mut entry) = CacheEntry::deserialize(value) {
        entry.key = key;
        return Some(entry);
    }
    LegacyEntry::deserialize(value)
        .ok()?
        .into_entry(namespace, key)
}

// == Put Outcome ==
/// What happened to a write. A dropped write is not an error for callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PutOutcome {
    /// Persisted on the first attempt
    Stored,
    /// Persisted after evicting old entries and recompressing
    StoredAfterEviction,
    /// Abandoned; the next lookup will miss
    Dropped,
}

// == Image Cache ==
/// Character portrait and background image cache.
#[derive(Debug)]
pub struct ImageCache {
    /// Backing key-value store, shared with the rest of the session
    store: LocalStore,
    /// Lookup and eviction counters
    stats: CacheStats,
}

impl ImageCache {
    // == Constructor ==
    /// Opens the cache over `store`, clearing it if the stored format
    /// version differs from [`CACHE_VERSION`].
    pub fn open(store: LocalStore) -> Self {
        let mut cache = Self {
            store,
            stats: CacheStats::new(),
        };

        match cache.store.get(IMAGE_CACHE_VERSION_KEY) {
            Some(version) if version == CACHE_VERSION => {}
            Some(version) => {
                info!(
                    "Image cache version {} differs from {}, clearing",
                    version, CACHE_VERSION
                );
                cache.clear_all();
                cache.write_version();
            }
            None => cache.write_version(),
        }
        cache
    }

    fn write_version(&self) {
        if let Err(e) = self.store.set(IMAGE_CACHE_VERSION_KEY, CACHE_VERSION) {
            warn!("Failed to record image cache version: {}", e);
        }
    }

    /// Decodes one namespace entry by entry. Fails only when the stored
    /// value is not a JSON object at all.
    fn load_map(&self, namespace: Namespace) -> Result<NamespaceMap, StoreError> {
        let Some(raw) = self.store.get(namespace.store_key()) else {
            return Ok(NamespaceMap::default());
        };
        let values: BTreeMap<String, Value> =
            serde_json::from_str(&raw).map_err(|e| StoreError::Corrupt {
                key: namespace.store_key().to_string(),
                reason: e.to_string(),
            })?;

        let mut map = NamespaceMap::default();
        for (key, value) in values {
            match decode_entry(namespace, &key, &value) {
                Some(entry) => {
                    map.entries.insert(entry.key.clone(), entry);
                }
                None => {
                    warn!("Keeping unreadable {:?} cache entry {} as is", namespace, key);
                    map.unreadable.insert(key, value);
                }
            }
        }
        Ok(map)
    }

    /// [`load_map`](Self::load_map) for lookups, where an unreadable
    /// namespace reads as empty.
    fn read_map(&self, namespace: Namespace) -> NamespaceMap {
        self.load_map(namespace).unwrap_or_else(|e| {
            error!("Failed to read {:?} image cache: {}", namespace, e);
            NamespaceMap::default()
        })
    }

    fn save_map(&self, namespace: Namespace, map: &NamespaceMap) -> Result<(), StoreError> {
        let mut values = map.unreadable.clone();
        for (key, entry) in &map.entries {
            let value =
                serde_json::to_value(entry).map_err(|e| StoreError::Persist(e.to_string()))?;
            values.insert(key.as_str().to_string(), value);
        }
        let json =
            serde_json::to_string(&values).map_err(|e| StoreError::Persist(e.to_string()))?;
        self.store.set(namespace.store_key(), json)
    }

    fn write_entry(
        &self,
        key: &CacheKey,
        image_url: String,
        descriptor: &Descriptor,
    ) -> Result<(), StoreError> {
        let namespace = descriptor.namespace();
        let mut map = self.load_map(namespace)?;
        map.entries.insert(
            key.clone(),
            CacheEntry::new(key.clone(), image_url, descriptor.clone()),
        );
        self.save_map(namespace, &map)
    }

    // == Put ==
    /// Compresses `payload` and stores it under the key derived from `descriptor`.
    ///
    /// On a quota failure, entries older than 24 hours are evicted and the
    /// write is retried once at the namespace's fallback quality. If that
    /// also fails the write is dropped.
    pub async fn put(&mut self, descriptor: &Descriptor, payload: &str) -> PutOutcome {
        let namespace = descriptor.namespace();
        let key = descriptor.derive_key();

        let compressed = compress_async(payload.to_string(), namespace.primary_quality()).await;
        match self.write_entry(&key, compressed, descriptor) {
            Ok(()) => {
                debug!("Image cached with key: {}", key);
                return PutOutcome::Stored;
            }
            Err(StoreError::QuotaExceeded { needed, quota }) => {
                warn!(
                    "Storage quota exceeded caching {} ({} > {}), cleaning up old cache",
                    key, needed, quota
                );
            }
            Err(e) => {
                error!("Failed to cache image {}: {}", key, e);
                self.stats.record_dropped_write();
                return PutOutcome::Dropped;
            }
        }

        self.evict_older_than(QUOTA_EVICTION_AGE_MS);

        let compressed = compress_async(payload.to_string(), namespace.fallback_quality()).await;
        match self.write_entry(&key, compressed, descriptor) {
            Ok(()) => {
                info!("Image cached after cleanup with key: {}", key);
                PutOutcome::StoredAfterEviction
            }
            Err(e) => {
                error!("Failed to cache image {} after cleanup: {}", key, e);
                self.stats.record_dropped_write();
                PutOutcome::Dropped
            }
        }
    }

    // == Get ==
    /// Pure lookup by key. Never triggers regeneration or counters.
    pub fn get(&self, namespace: Namespace, key: &CacheKey) -> Option<CacheEntry> {
        self.read_map(namespace).entries.remove(key)
    }

    // == Get Verified ==
    /// Looks up the entry for `descriptor`, treating a stored entry whose
    /// descriptor differs (a hash collision) as a miss.
    pub fn get_verified(&mut self, descriptor: &Descriptor) -> Option<CacheEntry> {
        let key = descriptor.derive_key();
        match self.get(descriptor.namespace(), &key) {
            Some(entry) if &entry.descriptor == descriptor => {
                debug!("Image found in cache: {}", key);
                self.stats.record_hit();
                Some(entry)
            }
            Some(_) => {
                warn!("Cache key collision on {}, treating as miss", key);
                self.stats.record_miss();
                None
            }
            None => {
                debug!("Image not found in cache: {}", key);
                self.stats.record_miss();
                None
            }
        }
    }

    // == Evict Older Than ==
    /// Removes entries older than `max_age_ms` from both namespaces.
    ///
    /// Returns the number of entries removed.
    pub fn evict_older_than(&mut self, max_age_ms: u64) -> usize {
        self.evict_older_than_at(max_age_ms, current_timestamp_ms())
    }

    /// [`evict_older_than`](Self::evict_older_than) against an explicit clock.
    pub fn evict_older_than_at(&mut self, max_age_ms: u64, now: u64) -> usize {
        let mut removed = 0;
        for namespace in Namespace::ALL {
            let mut map = match self.load_map(namespace) {
                Ok(map) => map,
                Err(e) => {
                    error!("Skipping {:?} cache during eviction: {}", namespace, e);
                    continue;
                }
            };
            let before = map.entries.len();
            map.entries.retain(|_, entry| !entry.is_older_than(max_age_ms, now));
            let count = before - map.entries.len();
            if count > 0 {
                if let Err(e) = self.save_map(namespace, &map) {
                    error!("Failed to persist {:?} cache after eviction: {}", namespace, e);
                    continue;
                }
                removed += count;
            }
        }
        self.stats.record_evictions(removed);
        info!("Image cache cleanup completed, {} entries removed", removed);
        removed
    }

    // == Clear ==
    /// Drops every entry of one namespace.
    pub fn clear(&mut self, namespace: Namespace) {
        match self.store.remove(namespace.store_key()) {
            Ok(_) => info!("{:?} image cache cleared", namespace),
            Err(e) => error!("Failed to clear {:?} image cache: {}", namespace, e),
        }
    }

    /// Drops both namespaces.
    pub fn clear_all(&mut self) {
        for namespace in Namespace::ALL {
            self.clear(namespace);
        }
    }

    // == Stats ==
    pub fn stats(&self) -> CacheStats {
        let mut stats = self.stats.clone();
        stats.set_counts(
            self.len(Namespace::Character),
            self.len(Namespace::Background),
        );
        stats
    }

    // == Length ==
    pub fn len(&self, namespace: Namespace) -> usize {
        self.read_map(namespace).entries.len()
    }

    pub fn is_empty(&self) -> bool {
        Namespace::ALL.iter().all(|ns| self.len(*ns) == 0)
    }

    /// Handle to the backing store.
    pub fn store(&self) -> &LocalStore {
        &self.store
    }

    #[cfg(test)]
    pub(crate) fn insert_raw(&self, entry: CacheEntry) {
        let namespace = entry.descriptor.namespace();
        let mut map = self.load_map(namespace).unwrap();
        map.entries.insert(entry.key.clone(), entry);
        self.save_map(namespace, &map).unwrap();
    }
}
