//! Prometheus metrics for cache clear operations

use prometheus::{CounterVec, Encoder, HistogramOpts, HistogramVec, Opts, Registry, TextEncoder};
use std::sync::Arc;

/// Metrics for cache clear operations
#[derive(Clone)]
pub struct ClearMetrics {
    /// Total number of clear requests by tenant
    pub clear_requests_total: Arc<CounterVec>,

    /// Total number of clear requests by result (success/failure)
    pub clear_requests_by_result: Arc<CounterVec>,

    /// Total number of cache entries removed
    pub cleared_entries_total: Arc<CounterVec>,

    /// Duration of clear operations
    pub clear_duration_seconds: Arc<HistogramVec>,

    /// Authentication failures
    pub clear_auth_failures_total: Arc<CounterVec>,
}

impl ClearMetrics {
    /// Create metrics registered in `registry`
    pub fn with_registry(registry: &Registry) -> Result<Self, prometheus::Error> {
        let clear_requests_total = CounterVec::new(
            Opts::new(
                "link_cache_clear_requests_total",
                "Total number of cache clear requests",
            ),
            &["tenant"],
        )?;
        registry.register(Box::new(clear_requests_total.clone()))?;

        let clear_requests_by_result = CounterVec::new(
            Opts::new(
                "link_cache_clear_requests_by_result",
                "Total number of cache clear requests by result",
            ),
            &["tenant", "result"],
        )?;
        registry.register(Box::new(clear_requests_by_result.clone()))?;

        let cleared_entries_total = CounterVec::new(
            Opts::new(
                "link_cache_cleared_entries_total",
                "Total number of cache entries removed",
            ),
            &["tenant"],
        )?;
        registry.register(Box::new(cleared_entries_total.clone()))?;

        let clear_duration_seconds = HistogramVec::new(
            HistogramOpts::new(
                "link_cache_clear_duration_seconds",
                "Duration of cache clear operations in seconds",
            )
            .buckets(vec![
                0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0,
            ]),
            &["tenant"],
        )?;
        registry.register(Box::new(clear_duration_seconds.clone()))?;

        let clear_auth_failures_total = CounterVec::new(
            Opts::new(
                "link_cache_clear_auth_failures_total",
                "Total number of cache clear authentication failures",
            ),
            &["reason"],
        )?;
        registry.register(Box::new(clear_auth_failures_total.clone()))?;

        Ok(Self {
            clear_requests_total: Arc::new(clear_requests_total),
            clear_requests_by_result: Arc::new(clear_requests_by_result),
            cleared_entries_total: Arc::new(cleared_entries_total),
            clear_duration_seconds: Arc::new(clear_duration_seconds),
            clear_auth_failures_total: Arc::new(clear_auth_failures_total),
        })
    }

    pub fn record_request(&self, tenant: &str) {
        self.clear_requests_total.with_label_values(&[tenant]).inc();
    }

    /// Record clear result
    pub fn record_result(&self, tenant: &str, success: bool) {
        let result = if success { "success" } else { "failure" };
        self.clear_requests_by_result
            .with_label_values(&[tenant, result])
            .inc();
    }

    pub fn record_cleared_entries(&self, tenant: &str, count: usize) {
        self.cleared_entries_total
            .with_label_values(&[tenant])
            .inc_by(count as f64);
    }

    pub fn record_duration(&self, tenant: &str, duration_secs: f64) {
        self.clear_duration_seconds
            .with_label_values(&[tenant])
            .observe(duration_secs);
    }

    /// Record authentication failure (`missing_token` or `invalid_token`)
    pub fn record_auth_failure(&self, reason: &str) {
        self.clear_auth_failures_total
            .with_label_values(&[reason])
            .inc();
    }
}

/// Render every metric in `registry` in the Prometheus text format
pub fn gather_text(registry: &Registry) -> String {
    let mut buffer = Vec::new();
    if TextEncoder::new()
        .encode(&registry.gather(), &mut buffer)
        .is_err()
    {
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}
