//! Link Cache
//!
//! Edge cache and aggregation layer for a multi-tenant linked-data platform.
//! Clients ask for many resources in one bulk request; the cache answers the
//! publicly cacheable ones itself, asks the backend services to authorize and
//! render the rest, streams every result back as newline-delimited JSON, and
//! writes cacheable answers back once the client has received them.
//!
//! # Overview
//!
//! Resource data is modelled as [`DataSlice`]s: maps from record id to
//! [`Record`], where every field holds an ordered list of [`Value`]s. Slices
//! travel as JSON documents or as hextuple lines, see [`codec`].
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use link_cache::memory_store::MemoryStore;
//! use link_cache::proxy::ProxyComponents;
//! use link_cache::{BulkProxy, LinkConfig};
//! use std::sync::Arc;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = LinkConfig::from_file("link_cache.yaml")?;
//! let components = ProxyComponents::from_config(&config, Arc::new(MemoryStore::new()))?;
//! let proxy = BulkProxy::new(Arc::new(config), components)?;
//!
//! let stats = proxy.metrics().get_stats();
//! println!("Bulk requests: {}", stats.bulk_requests);
//! # Ok(())
//! # }
//! ```
//!
//! # Architecture
//!
//! - [`BulkPartitioner`]: splits requested resources into public hits,
//!   cached-but-private entries and misses
//! - [`BackendAuthorizer`]: fetches the remainder from the owning backend services
//! - [`ResponseAssembler`]: streams the response and performs write-back
//! - [`CacheEntryStore`]: cache entries on top of a [`KeyValueStore`]
//! - [`BulkProxy`]: runs the pipeline for one request
//! - [`LinkServer`]: HTTP/1 surface
//! - [`LinkMetrics`]: runtime counters, exported by [`MetricsEndpoint`]
//!
//! # Configuration
//!
//! ```yaml
//! listen_address: "0.0.0.0:3080"
//! cache_ttl: 3600
//! default_language: en
//! default_tenant: demo
//! tenants:
//!   - name: demo
//!     website_iri: "https://demo.example.com/"
//! services:
//!   - name: data
//!     url: "http://127.0.0.1:3000"
//!     bulk: true
//! ```
//!
//! See [`LinkConfig`] for every option.

pub mod authorizer;
pub mod backend;
pub mod clear_metrics;
pub mod codec;
pub mod config;
pub mod data_slice;
pub mod error;
pub mod iri;
pub mod memory_store;
pub mod metrics;
pub mod metrics_endpoint;
pub mod models;
pub mod multilingual;
pub mod partitioner;
pub mod proxy;
pub mod record;
pub mod response_assembler;
pub mod routing;
pub mod scope;
pub mod server;
pub mod store;
pub mod tenant;
pub mod value;
pub mod vocab;

// Re-export commonly used types
pub use authorizer::BackendAuthorizer;
pub use config::LinkConfig;
pub use data_slice::DataSlice;
pub use error::{LinkError, Result};
pub use metrics::{LinkMetrics, MetricsSnapshot};
pub use metrics_endpoint::MetricsEndpoint;
pub use models::{CacheControl, CacheEntry, CacheRequest};
pub use partitioner::{BulkPartitioner, Partition, PartitionStats};
pub use proxy::{BulkProxy, BulkRequest, BulkResponse};
pub use record::{Record, RecordBuilder};
pub use response_assembler::ResponseAssembler;
pub use server::LinkServer;
pub use store::{CacheEntryStore, KeyValueStore};
pub use value::Value;
