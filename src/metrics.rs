//! Metrics collection for the bulk pipeline
//!
//! Thread-safe counters using atomic operations. Tracks bulk requests, cache
//! classification, backend calls, write-back and latencies.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Metrics collector for the bulk pipeline
///
/// All operations are thread-safe using atomic operations.
#[derive(Debug, Default)]
pub struct LinkMetrics {
    // Request statistics
    bulk_requests: AtomicU64,
    failed_bulk_requests: AtomicU64,
    resources_requested: AtomicU64,

    // Cache classification
    cache_public_hits: AtomicU64,
    cache_not_public: AtomicU64,
    cache_misses: AtomicU64,
    cache_errors: AtomicU64,

    // Backend statistics
    backend_calls: AtomicU64,
    failed_backend_calls: AtomicU64,
    decode_errors: AtomicU64,

    // Write-back statistics
    entries_written: AtomicU64,
    write_errors: AtomicU64,
    write_backs_skipped: AtomicU64,

    // Bytes and latency (microseconds)
    bytes_to_client: AtomicU64,
    total_request_duration_us: AtomicU64,
    total_backend_duration_us: AtomicU64,
}

/// Snapshot of metrics at a point in time
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub bulk_requests: u64,
    pub failed_bulk_requests: u64,
    pub resources_requested: u64,

    pub cache_public_hits: u64,
    pub cache_not_public: u64,
    pub cache_misses: u64,
    pub cache_errors: u64,

    pub backend_calls: u64,
    pub failed_backend_calls: u64,
    pub decode_errors: u64,

    pub entries_written: u64,
    pub write_errors: u64,
    pub write_backs_skipped: u64,

    pub bytes_to_client: u64,
    pub total_request_duration_us: u64,
    pub total_backend_duration_us: u64,
}

impl LinkMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a bulk request for `resources` resources
    pub fn record_bulk_request(&self, resources: usize) {
        self.bulk_requests.fetch_add(1, Ordering::Relaxed);
        self.resources_requested
            .fetch_add(resources as u64, Ordering::Relaxed);
    }

    pub fn record_failed_bulk_request(&self) {
        self.failed_bulk_requests.fetch_add(1, Ordering::Relaxed);
    }

    /// Record the outcome of partitioning
    pub fn record_partition(&self, public: usize, not_public: usize, missing: usize) {
        self.cache_public_hits
            .fetch_add(public as u64, Ordering::Relaxed);
        self.cache_not_public
            .fetch_add(not_public as u64, Ordering::Relaxed);
        self.cache_misses.fetch_add(missing as u64, Ordering::Relaxed);
    }

    pub fn record_cache_error(&self) {
        self.cache_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a backend call
    ///
    /// # Arguments
    /// * `success` - Whether the backend answered with a usable response
    pub fn record_backend_call(&self, success: bool) {
        self.backend_calls.fetch_add(1, Ordering::Relaxed);
        if !success {
            self.failed_backend_calls.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_decode_error(&self) {
        self.decode_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Record the outcome of a write-back pass
    pub fn record_write_back(&self, written: usize, failed: usize) {
        self.entries_written
            .fetch_add(written as u64, Ordering::Relaxed);
        self.write_errors.fetch_add(failed as u64, Ordering::Relaxed);
    }

    /// Record a write-back skipped because the response was not fully sent
    pub fn record_write_back_skipped(&self) {
        self.write_backs_skipped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_bytes_to_client(&self, bytes: u64) {
        self.bytes_to_client.fetch_add(bytes, Ordering::Relaxed);
    }

    pub fn record_request_duration(&self, duration: Duration) {
        self.total_request_duration_us
            .fetch_add(duration.as_micros() as u64, Ordering::Relaxed);
    }

    pub fn record_backend_duration(&self, duration: Duration) {
        self.total_backend_duration_us
            .fetch_add(duration.as_micros() as u64, Ordering::Relaxed);
    }

    /// Get a snapshot of current metrics
    ///
    /// Fields are loaded independently, so a snapshot taken under load may
    /// not be perfectly consistent across fields.
    pub fn get_stats(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            bulk_requests: self.bulk_requests.load(Ordering::Relaxed),
            failed_bulk_requests: self.failed_bulk_requests.load(Ordering::Relaxed),
            resources_requested: self.resources_requested.load(Ordering::Relaxed),
            cache_public_hits: self.cache_public_hits.load(Ordering::Relaxed),
            cache_not_public: self.cache_not_public.load(Ordering::Relaxed),
            cache_misses: self.cache_misses.load(Ordering::Relaxed),
            cache_errors: self.cache_errors.load(Ordering::Relaxed),
            backend_calls: self.backend_calls.load(Ordering::Relaxed),
            failed_backend_calls: self.failed_backend_calls.load(Ordering::Relaxed),
            decode_errors: self.decode_errors.load(Ordering::Relaxed),
            entries_written: self.entries_written.load(Ordering::Relaxed),
            write_errors: self.write_errors.load(Ordering::Relaxed),
            write_backs_skipped: self.write_backs_skipped.load(Ordering::Relaxed),
            bytes_to_client: self.bytes_to_client.load(Ordering::Relaxed),
            total_request_duration_us: self.total_request_duration_us.load(Ordering::Relaxed),
            total_backend_duration_us: self.total_backend_duration_us.load(Ordering::Relaxed),
        }
    }

    /// Reset all metrics to zero
    pub fn reset(&self) {
        for counter in [
            &self.bulk_requests,
            &self.failed_bulk_requests,
            &self.resources_requested,
            &self.cache_public_hits,
            &self.cache_not_public,
            &self.cache_misses,
            &self.cache_errors,
            &self.backend_calls,
            &self.failed_backend_calls,
            &self.decode_errors,
            &self.entries_written,
            &self.write_errors,
            &self.write_backs_skipped,
            &self.bytes_to_client,
            &self.total_request_duration_us,
            &self.total_backend_duration_us,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
    }
}

impl MetricsSnapshot {
    /// Share of requested resources served as public cache hits (0.0 to 100.0)
    pub fn public_hit_rate(&self) -> f64 {
        if self.resources_requested == 0 {
            0.0
        } else {
            (self.cache_public_hits as f64 / self.resources_requested as f64) * 100.0
        }
    }

    pub fn avg_request_duration_ms(&self) -> f64 {
        if self.bulk_requests == 0 {
            0.0
        } else {
            (self.total_request_duration_us as f64 / self.bulk_requests as f64) / 1000.0
        }
    }

    pub fn avg_backend_duration_ms(&self) -> f64 {
        if self.backend_calls == 0 {
            0.0
        } else {
            (self.total_backend_duration_us as f64 / self.backend_calls as f64) / 1000.0
        }
    }

    /// Backend failure rate as a percentage (0.0 to 100.0)
    pub fn backend_failure_rate(&self) -> f64 {
        if self.backend_calls == 0 {
            0.0
        } else {
            (self.failed_backend_calls as f64 / self.backend_calls as f64) * 100.0
        }
    }
}
