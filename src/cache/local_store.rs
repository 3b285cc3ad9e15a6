//! Local Store Module
//!
//! A size-limited string key-value store, optionally mirrored to a JSON
//! file. Cloning a `LocalStore` yields another handle to the same data.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use thiserror::Error;
use tracing::{debug, info};

use crate::error::AppError;

// == Store Error ==
#[derive(Error, Debug)]
pub enum StoreError {
    /// The write would push the store past its byte quota
    #[error("quota exceeded: {needed} bytes needed, quota is {quota}")]
    QuotaExceeded { needed: usize, quota: usize },

    /// The backing file could not be read or written
    #[error("persistence failed: {0}")]
    Persist(String),

    /// A stored value could not be decoded and was left untouched
    #[error("stored value for {key} is unreadable: {reason}")]
    Corrupt { key: String, reason: String },
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::QuotaExceeded { .. } => AppError::StorageQuota(err.to_string()),
            StoreError::Persist(msg) => AppError::Internal(msg),
            StoreError::Corrupt { .. } => AppError::Internal(err.to_string()),
        }
    }
}

#[derive(Debug)]
struct Inner {
    items: BTreeMap<String, String>,
    quota_bytes: usize,
    path: Option<PathBuf>,
}

impl Inner {
    fn used_bytes(&self) -> usize {
        self.items.iter().map(|(k, v)| k.len() + v.len()).sum()
    }

    fn persist(&self) -> Result<(), StoreError> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let json =
            serde_json::to_string(&self.items).map_err(|e| StoreError::Persist(e.to_string()))?;
        fs::write(path, json).map_err(|e| StoreError::Persist(e.to_string()))
    }
}

// == Local Store ==
/// Process-wide key-value store with a byte quota.
///
/// Size is accounted as the sum of key and value lengths, like browser
/// local storage.
#[derive(Debug, Clone)]
pub struct LocalStore {
    inner: Arc<Mutex<Inner>>,
}

impl LocalStore {
    // == Constructors ==
    /// Creates an empty in-memory store.
    pub fn in_memory(quota_bytes: usize) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                items: BTreeMap::new(),
                quota_bytes,
                path: None,
            })),
        }
    }

    /// Opens a store mirrored to `path`, loading existing contents if the file exists.
    pub fn open(path: impl AsRef<Path>, quota_bytes: usize) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        let items = if path.exists() {
            let raw = fs::read_to_string(&path).map_err(|e| StoreError::Persist(e.to_string()))?;
            serde_json::from_str(&raw).map_err(|e| StoreError::Persist(e.to_string()))?
        } else {
            BTreeMap::new()
        };
        info!("Opened local store at {} ({} keys)", path.display(), items.len());

        Ok(Self {
            inner: Arc::new(Mutex::new(Inner {
                items,
                quota_bytes,
                path: Some(path),
            })),
        })
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // == Get ==
    pub fn get(&self, key: &str) -> Option<String> {
        self.lock().items.get(key).cloned()
    }

    // == Set ==
    /// Stores `value` under `key`, failing if the quota would be exceeded.
    ///
    /// A rejected write, or one the backing file refused, leaves the
    /// previous value in place.
    pub fn set(&self, key: &str, value: impl Into<String>) -> Result<(), StoreError> {
        let value = value.into();
        let mut inner = self.lock();

        let existing = inner.items.get(key).map(|v| key.len() + v.len()).unwrap_or(0);
        let needed = inner.used_bytes() - existing + key.len() + value.len();
        if needed > inner.quota_bytes {
            return Err(StoreError::QuotaExceeded {
                needed,
                quota: inner.quota_bytes,
            });
        }

        let previous = inner.items.insert(key.to_string(), value);
        if let Err(e) = inner.persist() {
            match previous {
                Some(previous) => inner.items.insert(key.to_string(), previous),
                None => inner.items.remove(key),
            };
            return Err(e);
        }
        debug!("Store set {} ({} bytes used)", key, needed);
        Ok(())
    }

    // == Remove ==
    /// Removes `key`, returning true if it was present.
    pub fn remove(&self, key: &str) -> Result<bool, StoreError> {
        let mut inner = self.lock();
        let Some(previous) = inner.items.remove(key) else {
            return Ok(false);
        };
        if let Err(e) = inner.persist() {
            inner.items.insert(key.to_string(), previous);
            return Err(e);
        }
        Ok(true)
    }

    // == Keys ==
    pub fn keys(&self) -> Vec<String> {
        self.lock().items.keys().cloned().collect()
    }

    pub fn used_bytes(&self) -> usize {
        self.lock().used_bytes()
    }

    pub fn quota_bytes(&self) -> usize {
        self.lock().quota_bytes
    }

    pub fn len(&self) -> usize {
        self.lock().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().items.is_empty()
    }
}
