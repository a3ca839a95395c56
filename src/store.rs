//! Cache entry storage
//!
//! The key/value engine itself (Redis in production) is external and only
//! consumed through [`KeyValueStore`]. [`CacheEntryStore`] maps cache entries
//! onto hashes keyed by `(iri, language)`.

use crate::codec::json;
use crate::error::{LinkError, Result};
use crate::models::{CacheControl, CacheEntry, CacheRequest};
use async_trait::async_trait;
use futures_util::future::join_all;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

const KEY_PREFIX: &str = "link-cache:entry";

const FIELD_IRI: &str = "iri";
const FIELD_STATUS: &str = "status";
const FIELD_CACHE_CONTROL: &str = "cacheControl";
const FIELD_CONTENTS: &str = "contents";

/// Hash-capable key/value store with expiry
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// All fields of a hash; empty when the key does not exist
    async fn hget_all(&self, key: &str) -> Result<HashMap<String, String>>;

    /// Set hash fields, replacing existing values
    async fn hset(&self, key: &str, fields: Vec<(String, String)>) -> Result<()>;

    /// Expire a key after `ttl`
    async fn expire(&self, key: &str, ttl: Duration) -> Result<()>;

    /// Delete a key, returning whether it existed
    async fn del(&self, key: &str) -> Result<bool>;
}

/// Reads and writes [`CacheEntry`] values by `(iri, language)`
#[derive(Clone)]
pub struct CacheEntryStore {
    backend: Arc<dyn KeyValueStore>,
    ttl: Option<Duration>,
}

impl CacheEntryStore {
    /// Create a store
    ///
    /// # Arguments
    /// * `backend` - Underlying key/value engine
    /// * `ttl` - Expiry applied to every written entry, if any
    pub fn new(backend: Arc<dyn KeyValueStore>, ttl: Option<Duration>) -> Self {
        CacheEntryStore { backend, ttl }
    }

    pub fn ttl(&self) -> Option<Duration> {
        self.ttl
    }

    /// Storage key for an entry
    pub fn key(iri: &str, lang: &str) -> String {
        format!("{}:{}:{}", KEY_PREFIX, lang, iri)
    }

    /// Look up a single entry
    pub async fn get(&self, iri: &str, lang: &str) -> Result<Option<CacheEntry>> {
        let key = Self::key(iri, lang);
        let fields = self.backend.hget_all(&key).await?;
        if fields.is_empty() {
            return Ok(None);
        }
        decode_entry(iri, fields).map(Some)
    }

    /// Look up many entries concurrently, one result per request in order
    pub async fn get_many(&self, requests: &[CacheRequest], lang: &str) -> Vec<Result<Option<CacheEntry>>> {
        join_all(requests.iter().map(|r| self.get(&r.iri, lang))).await
    }

    /// Write an entry, applying the configured TTL
    pub async fn set(&self, entry: &CacheEntry, lang: &str) -> Result<()> {
        let key = Self::key(&entry.iri, lang);
        let contents = entry
            .contents
            .as_ref()
            .map(json::slice_to_string)
            .unwrap_or_default();

        self.backend
            .hset(
                &key,
                vec![
                    (FIELD_IRI.to_string(), entry.iri.clone()),
                    (FIELD_STATUS.to_string(), entry.status.to_string()),
                    (FIELD_CACHE_CONTROL.to_string(), entry.cache_control.as_str().to_string()),
                    (FIELD_CONTENTS.to_string(), contents),
                ],
            )
            .await?;

        if let Some(ttl) = self.ttl {
            self.backend.expire(&key, ttl).await?;
        }
        debug!("Stored cache entry: key={}, status={}", key, entry.status);
        Ok(())
    }

    /// Remove an entry
    pub async fn clear(&self, iri: &str, lang: &str) -> Result<bool> {
        self.backend.del(&Self::key(iri, lang)).await
    }
}

fn decode_entry(iri: &str, mut fields: HashMap<String, String>) -> Result<CacheEntry> {
    let status = fields
        .get(FIELD_STATUS)
        .and_then(|s| s.parse::<u16>().ok())
        .ok_or_else(|| LinkError::StoreError(format!("entry for {} has no valid status", iri)))?;

    let cache_control = fields
        .get(FIELD_CACHE_CONTROL)
        .and_then(|c| CacheControl::parse(c))
        .ok_or_else(|| LinkError::StoreError(format!("entry for {} has no valid cacheControl", iri)))?;

    let contents = match fields.remove(FIELD_CONTENTS) {
        Some(text) if !text.is_empty() => Some(
            json::slice_from_str(&text)
                .map_err(|e| LinkError::StoreError(format!("entry for {} has invalid contents: {}", iri, e)))?,
        ),
        _ => None,
    };

    let iri = fields.remove(FIELD_IRI).unwrap_or_else(|| iri.to_string());
    Ok(CacheEntry::new(iri, status, cache_control, contents))
}
