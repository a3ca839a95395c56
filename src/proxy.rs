//! Bulk proxy: wires the partitioner, authorizer and assembler together
//!
//! This module contains the request handling behind the HTTP surface: it
//! parses bulk and cache clear requests, resolves the tenant and language,
//! and runs the pipeline.

use crate::authorizer::{BackendAuthorizer, LoggingSessionUpdater, SessionUpdater};
use crate::backend::{BackendClient, BackendHeaders, HttpBackendClient};
use crate::clear_metrics::ClearMetrics;
use crate::config::LinkConfig;
use crate::error::{LinkError, Result};
use crate::metrics::LinkMetrics;
use crate::models::CacheRequest;
use crate::partitioner::BulkPartitioner;
use crate::response_assembler::{ResponseAssembler, ResponseStream, WriteBackReport};
use crate::routing::ServiceRouter;
use crate::scope::{PrefixSource, RandomPrefix};
use crate::store::{CacheEntryStore, KeyValueStore};
use crate::tenant::{StaticTenantResolver, TenantResolver};
use bytes::Bytes;
use http::{HeaderMap, StatusCode};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Form key carrying requested resources
pub const RESOURCE_PARAM: &str = "resource[]";
/// Form key selecting the language of entries to clear
pub const LANG_PARAM: &str = "lang";

/// Pluggable parts of the proxy
pub struct ProxyComponents {
    pub kv: Arc<dyn KeyValueStore>,
    pub client: Arc<dyn BackendClient>,
    pub tenants: Arc<dyn TenantResolver>,
    pub prefixes: Arc<dyn PrefixSource>,
    pub session: Arc<dyn SessionUpdater>,
}

impl ProxyComponents {
    /// Production components: HTTP backends, configured tenants, random prefixes
    pub fn from_config(config: &LinkConfig, kv: Arc<dyn KeyValueStore>) -> Result<Self> {
        Ok(ProxyComponents {
            kv,
            client: Arc::new(HttpBackendClient::with_timeout(config.backend_timeout())?),
            tenants: Arc::new(StaticTenantResolver::from_config(config)?),
            prefixes: Arc::new(RandomPrefix::default()),
            session: Arc::new(LoggingSessionUpdater),
        })
    }
}

/// An incoming bulk request
#[derive(Debug, Clone)]
pub struct BulkRequest {
    /// Tenant path segment, if the request carried one
    pub tenant: Option<String>,
    pub headers: HeaderMap,
    /// `application/x-www-form-urlencoded` body
    pub body: Bytes,
}

/// A bulk response whose body is still being produced
pub struct BulkResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: ResponseStream,
    /// Resolves once write-back has finished or was skipped
    pub completion: JoinHandle<Option<WriteBackReport>>,
}

/// Cache clear response body
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClearResponse {
    pub success: bool,
    pub cleared_count: usize,
    pub message: String,
}

/// Serves bulk and cache clear requests
pub struct BulkProxy {
    config: Arc<LinkConfig>,
    metrics: Arc<LinkMetrics>,
    tenants: Arc<dyn TenantResolver>,
    store: CacheEntryStore,
    partitioner: BulkPartitioner,
    authorizer: BackendAuthorizer,
    assembler: ResponseAssembler,
    clear_metrics: Option<ClearMetrics>,
}

impl BulkProxy {
    /// Create a new BulkProxy
    ///
    /// # Arguments
    /// * `config` - Validated configuration
    /// * `components` - Store, backend client and the other pluggable parts
    pub fn new(config: Arc<LinkConfig>, components: ProxyComponents) -> Result<Self> {
        let metrics = Arc::new(LinkMetrics::new());
        let store = CacheEntryStore::new(components.kv, config.cache_ttl());
        let cache = if config.enable_cache {
            Some(store.clone())
        } else {
            None
        };

        let authorizer = BackendAuthorizer::new(
            ServiceRouter::from_config(&config)?,
            components.client,
            components.prefixes,
            components.session,
            metrics.clone(),
        );

        Ok(BulkProxy {
            partitioner: BulkPartitioner::new(cache.clone(), metrics.clone()),
            assembler: ResponseAssembler::new(cache, metrics.clone(), config.response_channel_capacity),
            authorizer,
            tenants: components.tenants,
            store,
            metrics,
            config,
            clear_metrics: None,
        })
    }

    /// Enable Prometheus metrics for cache clear requests
    pub fn with_clear_metrics(mut self, metrics: ClearMetrics) -> Self {
        self.clear_metrics = Some(metrics);
        self
    }

    pub fn config(&self) -> &LinkConfig {
        &self.config
    }

    pub fn metrics(&self) -> Arc<LinkMetrics> {
        Arc::clone(&self.metrics)
    }

    /// Handle a bulk request
    ///
    /// 1. Resolve the tenant and parse the requested resources
    /// 2. Partition them against the cache
    /// 3. Authorize the remainder at the backends
    /// 4. Start streaming the response; write-back follows delivery
    ///
    /// # Returns
    /// * `Ok(BulkResponse)` - Headers plus a streaming body
    /// * `Err(LinkError)` - Tenant, parse or bulk backend failure
    pub async fn handle_bulk(&self, request: BulkRequest) -> Result<BulkResponse> {
        let start_time = Instant::now();
        let result = self.run_bulk(request, start_time).await;
        if let Err(e) = &result {
            warn!("Bulk request failed: {}", e);
            self.metrics.record_failed_bulk_request();
        }
        result
    }

    async fn run_bulk(&self, request: BulkRequest, start_time: Instant) -> Result<BulkResponse> {
        let tenant = self.tenants.resolve(request.tenant.as_deref()).await?;
        let resources = parse_resources(&request.body)?;
        let lang = request_language(&request.headers, &self.config.default_language);
        self.metrics.record_bulk_request(resources.len());

        debug!(
            "Bulk request: tenant={}, lang={}, resources={}",
            tenant.name,
            lang,
            resources.len()
        );

        let partition = self.partitioner.partition(&resources, &lang).await;

        let backend_headers =
            BackendHeaders::from_request(&request.headers).with_website_iri(tenant.website_iri.as_str());
        let authorized = self
            .authorizer
            .authorize(&partition.remainder(), &backend_headers)
            .await?;

        let headers = self.assembler.build_response_header(&partition.stats)?;
        let compact_website = if self.config.compact_output {
            Some(tenant.website_iri.to_string())
        } else {
            None
        };
        let (body, completion) =
            self.assembler
                .assemble(partition.cached_public, authorized, lang, compact_website);

        let duration = start_time.elapsed();
        self.metrics.record_request_duration(duration);
        info!(
            "Bulk request served: tenant={}, {}, duration={:?}",
            tenant.name,
            partition.stats.link_cache_header(),
            duration
        );

        Ok(BulkResponse {
            status: StatusCode::OK,
            headers,
            body,
            completion,
        })
    }

    /// Handle a cache clear request
    ///
    /// Removes the entries for every `resource[]` in the form body, in the
    /// `lang` given there or the default language.
    pub async fn handle_clear(&self, tenant: Option<String>, headers: &HeaderMap, body: &Bytes) -> Result<ClearResponse> {
        let start_time = Instant::now();
        let tenant_label = tenant.clone().unwrap_or_else(|| "default".to_string());

        if let Err(e) = self.check_auth(headers) {
            if let Some(metrics) = &self.clear_metrics {
                metrics.record_auth_failure(if headers.contains_key(http::header::AUTHORIZATION) {
                    "invalid_token"
                } else {
                    "missing_token"
                });
            }
            return Err(e);
        }

        self.tenants.resolve(tenant.as_deref()).await?;
        if let Some(metrics) = &self.clear_metrics {
            metrics.record_request(&tenant_label);
        }

        let resources = parse_resources(body)?;
        let lang = form_value(body, LANG_PARAM).unwrap_or_else(|| self.config.default_language.clone());

        let mut cleared = 0;
        let mut failure = None;
        for resource in &resources {
            match self.store.clear(&resource.iri, &lang).await {
                Ok(true) => cleared += 1,
                Ok(false) => {}
                Err(e) => {
                    warn!("Failed to clear {}: {}", resource.iri, e);
                    failure = Some(e);
                }
            }
        }

        if let Some(metrics) = &self.clear_metrics {
            metrics.record_result(&tenant_label, failure.is_none());
            metrics.record_cleared_entries(&tenant_label, cleared);
            metrics.record_duration(&tenant_label, start_time.elapsed().as_secs_f64());
        }
        if let Some(e) = failure {
            return Err(e);
        }

        info!("Cleared {} of {} cache entries for lang={}", cleared, resources.len(), lang);
        Ok(ClearResponse {
            success: true,
            cleared_count: cleared,
            message: format!("Cleared {} cache entries", cleared),
        })
    }

    /// Check the bearer token required by cache clear requests
    fn check_auth(&self, headers: &HeaderMap) -> Result<()> {
        let expected = match &self.config.clear_token {
            Some(token) => token,
            None => return Ok(()),
        };

        let token = headers
            .get(http::header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "));

        match token {
            Some(token) if token == expected => Ok(()),
            _ => Err(LinkError::Unauthorized(
                "Invalid or missing authentication token".to_string(),
            )),
        }
    }
}

/// Requested resources from a form body, in order
pub fn parse_resources(body: &[u8]) -> Result<Vec<CacheRequest>> {
    if std::str::from_utf8(body).is_err() {
        return Err(LinkError::ParseError("request body is not valid UTF-8".to_string()));
    }
    Ok(url::form_urlencoded::parse(body)
        .filter(|(key, _)| key == RESOURCE_PARAM)
        .map(|(_, value)| CacheRequest::from_param(&value))
        .filter(|request| !request.iri.is_empty())
        .collect())
}

fn form_value(body: &[u8], name: &str) -> Option<String> {
    url::form_urlencoded::parse(body)
        .find(|(key, _)| key == name)
        .map(|(_, value)| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

/// Language of a request: the first `Accept-Language` tag, else `default`
pub fn request_language(headers: &HeaderMap, default: &str) -> String {
    headers
        .get(http::header::ACCEPT_LANGUAGE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|tag| tag.split(';').next().unwrap_or_default().trim())
        .filter(|tag| !tag.is_empty() && *tag != "*")
        .map(str::to_string)
        .unwrap_or_else(|| default.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::HeaderValue;

    #[test]
    fn test_parse_resources() {
        let body = b"resource%5B%5D=https%3A%2F%2Fdemo.test%2Fa%2F&resource%5B%5D=https%3A%2F%2Fdemo.test%2Fb%23x&other=1";
        let resources = parse_resources(body).unwrap();
        assert_eq!(
            resources,
            vec![
                CacheRequest::new("https://demo.test/a"),
                CacheRequest::new("https://demo.test/b"),
            ]
        );
    }

    #[test]
    fn test_parse_resources_empty_body() {
        assert!(parse_resources(b"").unwrap().is_empty());
    }

    #[test]
    fn test_parse_resources_invalid_utf8() {
        assert!(matches!(
            parse_resources(&[0xff, 0xfe]),
            Err(LinkError::ParseError(_))
        ));
    }

    #[test]
    fn test_form_value() {
        assert_eq!(form_value(b"lang=nl&resource%5B%5D=x", LANG_PARAM), Some("nl".to_string()));
        assert_eq!(form_value(b"lang=", LANG_PARAM), None);
    }

    #[test]
    fn test_request_language() {
        let mut headers = HeaderMap::new();
        assert_eq!(request_language(&headers, "en"), "en");

        headers.insert("accept-language", HeaderValue::from_static("nl-NL;q=0.9, en"));
        assert_eq!(request_language(&headers, "en"), "nl-NL");

        headers.insert("accept-language", HeaderValue::from_static("*"));
        assert_eq!(request_language(&headers, "en"), "en");
    }
}
