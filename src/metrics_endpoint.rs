//! Metrics HTTP Endpoint
//!
//! Serves the pipeline counters and the cache clear metrics in Prometheus
//! text format on a separate listener.

use crate::clear_metrics::gather_text;
use crate::metrics::{LinkMetrics, MetricsSnapshot};
use http::header::{HeaderValue, CONTENT_TYPE};
use http_body_util::Full;
use hyper::body::Bytes;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use prometheus::Registry;
use std::fmt::Write;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info};

/// Metrics endpoint server
pub struct MetricsEndpoint {
    metrics: Arc<LinkMetrics>,
    registry: Registry,
    addr: SocketAddr,
}

impl MetricsEndpoint {
    /// Create a new metrics endpoint
    ///
    /// # Arguments
    /// * `metrics` - Shared pipeline metrics
    /// * `registry` - Prometheus registry holding the clear metrics
    /// * `addr` - Address to bind the HTTP server to
    pub fn new(metrics: Arc<LinkMetrics>, registry: Registry, addr: SocketAddr) -> Self {
        Self {
            metrics,
            registry,
            addr,
        }
    }

    /// Start the metrics endpoint server
    ///
    /// Runs until the process is terminated.
    pub async fn start(self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let listener = TcpListener::bind(self.addr).await?;
        info!("Metrics available at http://{}/metrics", self.addr);

        loop {
            let (stream, _) = listener.accept().await?;
            let io = TokioIo::new(stream);
            let metrics = Arc::clone(&self.metrics);
            let registry = self.registry.clone();

            tokio::task::spawn(async move {
                let service = service_fn(move |req| {
                    let metrics = Arc::clone(&metrics);
                    let registry = registry.clone();
                    async move { handle_request(req, metrics, registry).await }
                });

                if let Err(err) = http1::Builder::new().serve_connection(io, service).await {
                    error!("Error serving metrics connection: {:?}", err);
                }
            });
        }
    }
}

async fn handle_request(
    req: Request<hyper::body::Incoming>,
    metrics: Arc<LinkMetrics>,
    registry: Registry,
) -> Result<Response<Full<Bytes>>, hyper::Error> {
    let response = match req.uri().path() {
        "/metrics" => {
            let mut body = format_prometheus_metrics(&metrics.get_stats());
            body.push_str(&gather_text(&registry));
            text_response(StatusCode::OK, "text/plain; version=0.0.4; charset=utf-8", body)
        }
        "/health" => text_response(StatusCode::OK, "application/json", r#"{"status":"healthy"}"#.to_string()),
        _ => text_response(StatusCode::NOT_FOUND, "text/plain", "404 Not Found".to_string()),
    };
    Ok(response)
}

fn text_response(status: StatusCode, content_type: &'static str, body: String) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(Bytes::from(body)));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
    response
}

fn push_metric(output: &mut String, name: &str, kind: &str, help: &str, value: impl std::fmt::Display) {
    let _ = writeln!(output, "# HELP link_cache_{} {}", name, help);
    let _ = writeln!(output, "# TYPE link_cache_{} {}", name, kind);
    let _ = writeln!(output, "link_cache_{} {}\n", name, value);
}

/// Format pipeline metrics in Prometheus exposition format
fn format_prometheus_metrics(snapshot: &MetricsSnapshot) -> String {
    let mut output = String::new();

    // Requests
    push_metric(&mut output, "bulk_requests_total", "counter", "Total number of bulk requests", snapshot.bulk_requests);
    push_metric(&mut output, "failed_bulk_requests_total", "counter", "Bulk requests answered with an error", snapshot.failed_bulk_requests);
    push_metric(&mut output, "resources_requested_total", "counter", "Resources requested across all bulk requests", snapshot.resources_requested);

    // Cache
    push_metric(&mut output, "cache_public_hits_total", "counter", "Resources served from the cache", snapshot.cache_public_hits);
    push_metric(&mut output, "cache_not_public_total", "counter", "Cached resources that needed authorization", snapshot.cache_not_public);
    push_metric(&mut output, "cache_misses_total", "counter", "Resources without a usable cache entry", snapshot.cache_misses);
    push_metric(&mut output, "cache_errors_total", "counter", "Failed cache lookups", snapshot.cache_errors);
    push_metric(&mut output, "cache_public_hit_rate", "gauge", "Public hit rate percentage", format!("{:.2}", snapshot.public_hit_rate()));

    // Backends
    push_metric(&mut output, "backend_calls_total", "counter", "Calls made to backend services", snapshot.backend_calls);
    push_metric(&mut output, "failed_backend_calls_total", "counter", "Backend calls that failed", snapshot.failed_backend_calls);
    push_metric(&mut output, "decode_errors_total", "counter", "Backend bodies that could not be decoded", snapshot.decode_errors);
    push_metric(&mut output, "backend_failure_rate", "gauge", "Backend failure rate percentage", format!("{:.2}", snapshot.backend_failure_rate()));

    // Write-back
    push_metric(&mut output, "entries_written_total", "counter", "Entries written back to the cache", snapshot.entries_written);
    push_metric(&mut output, "write_errors_total", "counter", "Failed cache writes", snapshot.write_errors);
    push_metric(&mut output, "write_backs_skipped_total", "counter", "Write-backs skipped after a client abort", snapshot.write_backs_skipped);

    push_metric(&mut output, "bytes_to_client_total", "counter", "Total bytes sent to clients", snapshot.bytes_to_client);

    // Latency (milliseconds)
    push_metric(&mut output, "request_duration_ms_avg", "gauge", "Average bulk request duration in milliseconds", format!("{:.2}", snapshot.avg_request_duration_ms()));
    push_metric(&mut output, "backend_duration_ms_avg", "gauge", "Average backend call duration in milliseconds", format!("{:.2}", snapshot.avg_backend_duration_ms()));

    output
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_prometheus_metrics() {
        let metrics = LinkMetrics::new();
        metrics.record_bulk_request(4);
        metrics.record_partition(3, 0, 1);
        metrics.record_backend_call(true);
        metrics.record_backend_call(false);
        metrics.record_write_back(2, 1);
        metrics.record_bytes_to_client(1500);

        let output = format_prometheus_metrics(&metrics.get_stats());
        assert!(output.contains("link_cache_bulk_requests_total 1\n"));
        assert!(output.contains("link_cache_resources_requested_total 4\n"));
        assert!(output.contains("link_cache_cache_public_hits_total 3\n"));
        assert!(output.contains("link_cache_cache_misses_total 1\n"));
        assert!(output.contains("link_cache_failed_backend_calls_total 1\n"));
        assert!(output.contains("link_cache_entries_written_total 2\n"));
        assert!(output.contains("link_cache_bytes_to_client_total 1500\n"));
        assert!(output.contains("link_cache_cache_public_hit_rate 75.00\n"));
        assert!(output.contains("# TYPE link_cache_bulk_requests_total counter"));
        assert!(output.contains("# TYPE link_cache_backend_failure_rate gauge"));
    }

    #[test]
    fn test_format_prometheus_metrics_empty() {
        let output = format_prometheus_metrics(&LinkMetrics::new().get_stats());
        assert!(output.contains("link_cache_bulk_requests_total 0\n"));
        assert!(output.contains("link_cache_cache_public_hit_rate 0.00\n"));
    }

    #[test]
    fn test_text_response() {
        let response = text_response(StatusCode::NOT_FOUND, "text/plain", "nope".to_string());
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(response.headers().get("content-type").unwrap(), "text/plain");
    }
}
