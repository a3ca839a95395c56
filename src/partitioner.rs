//! Bulk partitioner
//!
//! Classifies every requested resource by what the cache already knows about
//! it, so only the remainder has to be authorized by a backend.

use crate::metrics::LinkMetrics;
use crate::models::{CacheEntry, CacheRequest};
use crate::store::CacheEntryStore;
use std::sync::Arc;
use tracing::{debug, warn};

/// Name of the response header carrying partition statistics
pub const LINK_CACHE_HEADER: &str = "link-cache";

/// Counts from a single partition pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PartitionStats {
    pub items: usize,
    pub cached_public: usize,
    pub cached_not_public: usize,
    pub not_cached: usize,
}

impl PartitionStats {
    fn ratio(&self, count: usize) -> f64 {
        if self.items == 0 {
            0.0
        } else {
            count as f64 / self.items as f64
        }
    }

    /// Value of the `Link-Cache` response header
    ///
    /// Format: `items=<n>; public=<r>; cached=<r>; authorized=<r>` with
    /// ratios rounded to two decimals.
    pub fn link_cache_header(&self) -> String {
        format!(
            "items={}; public={:.2}; cached={:.2}; authorized={:.2}",
            self.items,
            self.ratio(self.cached_public),
            self.ratio(self.cached_public + self.cached_not_public),
            self.ratio(self.cached_not_public + self.not_cached),
        )
    }
}

/// Result of partitioning a bulk request
#[derive(Debug, Clone, Default)]
pub struct Partition {
    /// Entries that can be served straight from the cache
    pub cached_public: Vec<CacheEntry>,
    /// Known resources that still need backend authorization
    pub cached_not_public: Vec<CacheRequest>,
    /// Resources the cache has nothing usable for
    pub not_cached: Vec<CacheRequest>,
    pub stats: PartitionStats,
}

impl Partition {
    /// Requests that must go to a backend, in request order per class
    pub fn remainder(&self) -> Vec<CacheRequest> {
        self.cached_not_public
            .iter()
            .chain(self.not_cached.iter())
            .cloned()
            .collect()
    }
}

/// Splits bulk requests into cached and uncached resources
pub struct BulkPartitioner {
    store: Option<CacheEntryStore>,
    metrics: Arc<LinkMetrics>,
}

impl BulkPartitioner {
    /// Create a partitioner
    ///
    /// # Arguments
    /// * `store` - Cache entry store, or `None` when caching is disabled
    /// * `metrics` - Shared metrics collector
    pub fn new(store: Option<CacheEntryStore>, metrics: Arc<LinkMetrics>) -> Self {
        BulkPartitioner { store, metrics }
    }

    /// Classify every request for `lang`
    ///
    /// Store lookups run concurrently. A failed lookup is logged and treated
    /// as a miss; it never fails the partition.
    pub async fn partition(&self, requests: &[CacheRequest], lang: &str) -> Partition {
        let mut partition = Partition::default();
        partition.stats.items = requests.len();

        let store = match &self.store {
            Some(store) => store,
            None => {
                debug!("Cache disabled, {} resources not cached", requests.len());
                partition.not_cached = requests.to_vec();
                partition.stats.not_cached = requests.len();
                self.metrics.record_partition(0, 0, requests.len());
                return partition;
            }
        };

        let lookups = store.get_many(requests, lang).await;

        for (request, lookup) in requests.iter().zip(lookups) {
            match lookup {
                Ok(Some(entry)) if entry.status != 200 => {
                    debug!("Cached entry for {} has status {}, treating as miss", request.iri, entry.status);
                    partition.not_cached.push(request.clone());
                }
                Ok(Some(entry)) if entry.is_public_hit() => {
                    partition.cached_public.push(entry);
                }
                Ok(Some(_)) => {
                    partition.cached_not_public.push(request.clone());
                }
                Ok(None) => {
                    partition.not_cached.push(request.clone());
                }
                Err(e) => {
                    warn!("Cache lookup failed for {}: {}", request.iri, e);
                    self.metrics.record_cache_error();
                    partition.not_cached.push(request.clone());
                }
            }
        }

        partition.stats.cached_public = partition.cached_public.len();
        partition.stats.cached_not_public = partition.cached_not_public.len();
        partition.stats.not_cached = partition.not_cached.len();

        self.metrics.record_partition(
            partition.stats.cached_public,
            partition.stats.cached_not_public,
            partition.stats.not_cached,
        );
        debug!("Partitioned bulk request: {}", partition.stats.link_cache_header());

        partition
    }
}
