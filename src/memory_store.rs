//! In-process key/value store
//!
//! Implements [`KeyValueStore`] on a shared hash map with per-key expiry.
//! Used for tests and single-node deployments without Redis.

use crate::error::{LinkError, Result};
use crate::store::KeyValueStore;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};
use tracing::debug;

/// Stored hash with optional expiry
#[derive(Clone, Default)]
struct StoredHash {
    fields: HashMap<String, String>,
    expires_at: Option<Instant>,
}

impl StoredHash {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.map(|at| at <= now).unwrap_or(false)
    }
}

/// Store statistics for monitoring
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryStoreStats {
    pub total_keys: usize,
    pub hits: u64,
    pub misses: u64,
}

/// Shared in-memory hash store
#[derive(Default)]
pub struct MemoryStore {
    storage: Arc<RwLock<HashMap<String, StoredHash>>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_stats(&self) -> MemoryStoreStats {
        let total_keys = self.storage.read().map(|s| s.len()).unwrap_or(0);
        MemoryStoreStats {
            total_keys,
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }

    /// Remaining time to live of a key, if it has one
    pub fn ttl_of(&self, key: &str) -> Option<Duration> {
        let storage = self.storage.read().ok()?;
        let expires_at = storage.get(key)?.expires_at?;
        Some(expires_at.saturating_duration_since(Instant::now()))
    }

    /// Drop every expired key
    pub fn cleanup_expired(&self) -> usize {
        let now = Instant::now();
        match self.storage.write() {
            Ok(mut storage) => {
                let before = storage.len();
                storage.retain(|_, hash| !hash.is_expired(now));
                let removed = before - storage.len();
                if removed > 0 {
                    debug!("Removed {} expired keys", removed);
                }
                removed
            }
            Err(_) => 0,
        }
    }
}

fn poisoned<T>(_: T) -> LinkError {
    LinkError::StoreError("memory store lock poisoned".to_string())
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn hget_all(&self, key: &str) -> Result<HashMap<String, String>> {
        let now = Instant::now();
        let found = {
            let storage = self.storage.read().map_err(poisoned)?;
            match storage.get(key) {
                Some(hash) if !hash.is_expired(now) => Some(hash.fields.clone()),
                Some(_) => None,
                None => None,
            }
        };

        match found {
            Some(fields) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Ok(fields)
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                let mut storage = self.storage.write().map_err(poisoned)?;
                if storage.get(key).map(|h| h.is_expired(now)).unwrap_or(false) {
                    debug!("Expired key removed on read: {}", key);
                    storage.remove(key);
                }
                Ok(HashMap::new())
            }
        }
    }

    async fn hset(&self, key: &str, fields: Vec<(String, String)>) -> Result<()> {
        let now = Instant::now();
        let mut storage = self.storage.write().map_err(poisoned)?;
        let hash = storage.entry(key.to_string()).or_default();
        if hash.is_expired(now) {
            *hash = StoredHash::default();
        }
        hash.fields.extend(fields);
        Ok(())
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<()> {
        let mut storage = self.storage.write().map_err(poisoned)?;
        if let Some(hash) = storage.get_mut(key) {
            hash.expires_at = Some(Instant::now() + ttl);
        }
        Ok(())
    }

    async fn del(&self, key: &str) -> Result<bool> {
        let mut storage = self.storage.write().map_err(poisoned)?;
        Ok(storage.remove(key).is_some())
    }
}
