//! Link cache server
//!
//! Loads configuration, sets up logging, and serves the bulk and cache clear
//! endpoints.

use anyhow::Context;
use link_cache::clear_metrics::ClearMetrics;
use link_cache::memory_store::MemoryStore;
use link_cache::proxy::ProxyComponents;
use link_cache::{BulkProxy, LinkConfig, LinkServer, MetricsEndpoint};
use prometheus::Registry;
use std::env;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

/// Interval between sweeps of expired in-memory entries
const CLEANUP_INTERVAL: Duration = Duration::from_secs(60);

/// # Usage
/// ```bash
/// # Start with default config (link_cache.yaml)
/// cargo run
///
/// # Start with custom config
/// cargo run -- /path/to/config.yaml
/// ```
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .with_target(false)
        .with_thread_ids(true)
        .with_line_number(true)
        .init();

    info!("Starting link cache");

    let config_path = env::args()
        .nth(1)
        .unwrap_or_else(|| "link_cache.yaml".to_string());
    info!("Loading configuration from: {}", config_path);

    let config = LinkConfig::from_file(&config_path)
        .with_context(|| format!("failed to load configuration from {}", config_path))?;
    info!("Configuration loaded successfully");
    for line in config.summary() {
        info!("  - {}", line);
    }

    let listen_address: SocketAddr = config
        .listen_address
        .parse()
        .with_context(|| format!("invalid listen_address {}", config.listen_address))?;

    let store = Arc::new(MemoryStore::new());
    let sweeper = Arc::clone(&store);
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(CLEANUP_INTERVAL);
        loop {
            interval.tick().await;
            let removed = sweeper.cleanup_expired();
            if removed > 0 {
                info!("Removed {} expired cache entries", removed);
            }
        }
    });

    let registry = Registry::new();
    let clear_metrics = ClearMetrics::with_registry(&registry).context("failed to register clear metrics")?;

    let components = ProxyComponents::from_config(&config, store)?;
    let config = Arc::new(config);
    let proxy = Arc::new(BulkProxy::new(Arc::clone(&config), components)?.with_clear_metrics(clear_metrics));

    if let Some(endpoint) = config.metrics_endpoint.as_ref().filter(|e| e.enabled) {
        let addr: SocketAddr = endpoint
            .address
            .parse()
            .with_context(|| format!("invalid metrics address {}", endpoint.address))?;
        let metrics_server = MetricsEndpoint::new(proxy.metrics(), registry, addr);
        tokio::spawn(async move {
            if let Err(e) = metrics_server.start().await {
                error!("Metrics endpoint stopped: {}", e);
            }
        });
    }

    LinkServer::new(proxy, listen_address)
        .start()
        .await
        .map_err(|e| anyhow::anyhow!("server stopped: {}", e))
}
