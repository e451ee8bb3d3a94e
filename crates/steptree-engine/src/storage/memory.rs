//! In-memory state cache.

use std::{
    collections::HashMap,
    sync::RwLock,
    time::{Duration, Instant},
};

use async_trait::async_trait;
use steptree_core::{Cache, CacheError};

struct Entry {
    value: String,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.is_none_or(|at| at > now)
    }
}

/// In-memory cache implementation.
///
/// Useful for development and single-process deployments.
/// Data is lost on restart. Expired entries are dropped lazily on read.
pub struct MemoryCache {
    entries: RwLock<HashMap<String, Entry>>,
}

impl MemoryCache {
    /// Create a new in-memory cache.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Number of stored entries, including expired ones not yet evicted.
    ///
    /// # Errors
    /// Returns error if the lock is poisoned.
    pub fn len(&self) -> Result<usize, CacheError> {
        Ok(self
            .entries
            .read()
            .map_err(|e| CacheError::Internal(e.to_string()))?
            .len())
    }

    /// Whether the cache holds no entries.
    ///
    /// # Errors
    /// Returns error if the lock is poisoned.
    pub fn is_empty(&self) -> Result<bool, CacheError> {
        Ok(self.len()? == 0)
    }
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Cache for MemoryCache {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let now = Instant::now();
        {
            let entries = self
                .entries
                .read()
                .map_err(|e| CacheError::Internal(e.to_string()))?;
            match entries.get(key) {
                None => return Ok(None),
                Some(entry) if entry.is_live(now) => return Ok(Some(entry.value.clone())),
                Some(_) => {}
            }
        }

        let mut entries = self
            .entries
            .write()
            .map_err(|e| CacheError::Internal(e.to_string()))?;
        if entries.get(key).is_some_and(|entry| !entry.is_live(now)) {
            entries.remove(key);
        }
        Ok(None)
    }

    async fn set(&self, key: &str, value: String, ttl: Option<Duration>) -> Result<(), CacheError> {
        let expires_at = ttl.map(|ttl| Instant::now() + ttl);
        self.entries
            .write()
            .map_err(|e| CacheError::Internal(e.to_string()))?
            .insert(key.to_string(), Entry { value, expires_at });
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        self.entries
            .write()
            .map_err(|e| CacheError::Internal(e.to_string()))?
            .remove(key);
        Ok(())
    }
}
