//! Backend clients for authorizing resources the cache cannot serve
//!
//! Bulk-capable services receive one `POST /link-lib/bulk` per group;
//! all others receive one `GET` per resource, issued concurrently.

use crate::codec::BodyFormat;
use crate::error::{LinkError, Result};
use crate::models::CacheControl;
use crate::routing::BackendService;
use async_trait::async_trait;
use futures_util::future::join_all;
use http::HeaderMap;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

/// Path of the bulk endpoint on bulk-capable services
pub const BULK_PATH: &str = "/link-lib/bulk";

pub const HEADER_DEVICE_ID: &str = "x-device-id";
pub const HEADER_WEBSITE_IRI: &str = "website-iri";
pub const HEADER_NEW_AUTHORIZATION: &str = "new-authorization";
pub const HEADER_NEW_REFRESH_TOKEN: &str = "new-refresh-token";

/// Client headers forwarded to every backend call
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BackendHeaders {
    pub authorization: Option<String>,
    pub device_id: Option<String>,
    pub website_iri: Option<String>,
    pub accept_language: Option<String>,
    pub accept: Option<String>,
}

impl BackendHeaders {
    /// Collect the forwarded headers from an incoming request
    ///
    /// The website IRI is left unset; it belongs to the tenant, see
    /// [`BackendHeaders::with_website_iri`].
    pub fn from_request(headers: &HeaderMap) -> Self {
        let get = |name: &str| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        };
        BackendHeaders {
            authorization: get(http::header::AUTHORIZATION.as_str()),
            device_id: get(HEADER_DEVICE_ID),
            website_iri: None,
            accept_language: get(http::header::ACCEPT_LANGUAGE.as_str()),
            accept: get(http::header::ACCEPT.as_str()),
        }
    }

    /// Same headers with the website IRI of the resolved tenant
    ///
    /// A `Website-IRI` sent by the client is never forwarded.
    pub fn with_website_iri(mut self, website_iri: &str) -> Self {
        self.website_iri = Some(website_iri.to_string());
        self
    }

    fn apply(&self, mut request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        let pairs = [
            (http::header::AUTHORIZATION.as_str(), &self.authorization),
            (HEADER_DEVICE_ID, &self.device_id),
            (HEADER_WEBSITE_IRI, &self.website_iri),
            (http::header::ACCEPT_LANGUAGE.as_str(), &self.accept_language),
            (http::header::ACCEPT.as_str(), &self.accept),
        ];
        for (name, value) in pairs {
            if let Some(value) = value {
                request = request.header(name, value);
            }
        }
        request
    }
}

/// Session credentials a backend rotated while answering
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RotatedCredentials {
    pub authorization: String,
    pub refresh_token: Option<String>,
}

impl RotatedCredentials {
    fn from_response(headers: &reqwest::header::HeaderMap) -> Option<Self> {
        let authorization = headers
            .get(HEADER_NEW_AUTHORIZATION)?
            .to_str()
            .ok()?
            .to_string();
        let refresh_token = headers
            .get(HEADER_NEW_REFRESH_TOKEN)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        Some(RotatedCredentials {
            authorization,
            refresh_token,
        })
    }
}

/// One resource as answered by a backend, body still undecoded
#[derive(Debug, Clone, PartialEq)]
pub struct BackendItem {
    pub iri: String,
    pub status: u16,
    pub cache_control: CacheControl,
    pub body: Option<String>,
    pub format: BodyFormat,
}

/// Everything one backend call produced
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BackendBatch {
    pub items: Vec<BackendItem>,
    pub rotated_credentials: Option<RotatedCredentials>,
}

/// Fetches resources from a backend service on behalf of the client
#[async_trait]
pub trait BackendClient: Send + Sync {
    /// Fetch `iris` from `service`
    ///
    /// # Returns
    /// * `Ok(BackendBatch)` with one item per resource; per-resource failures
    ///   are reported as item statuses
    /// * `Err(LinkError::BulkBackend)` if a bulk call itself failed
    async fn fetch(
        &self,
        service: &BackendService,
        iris: &[String],
        headers: &BackendHeaders,
    ) -> Result<BackendBatch>;
}

#[derive(Serialize)]
struct BulkRequestBody<'a> {
    resources: &'a [String],
}

#[derive(Deserialize)]
struct BulkResponseItem {
    iri: String,
    status: u16,
    /// Cache-Control directives, read like the HTTP header
    #[serde(rename = "cacheControl", default)]
    cache_control: Option<String>,
    #[serde(default)]
    body: Option<String>,
}

impl BulkResponseItem {
    fn into_item(self, format: BodyFormat) -> BackendItem {
        BackendItem {
            cache_control: CacheControl::from_header(self.cache_control.as_deref()),
            iri: self.iri,
            status: self.status,
            body: self.body,
            format,
        }
    }
}

/// [`BackendClient`] speaking HTTP through a shared reqwest client
#[derive(Clone)]
pub struct HttpBackendClient {
    client: Client,
}

impl HttpBackendClient {
    /// Create a client with the given request timeout
    pub fn with_timeout(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .pool_max_idle_per_host(10)
            .pool_idle_timeout(Duration::from_secs(90))
            .tcp_nodelay(true)
            .build()
            .map_err(|e| LinkError::HttpError(format!("Failed to create HTTP client: {}", e)))?;

        Ok(HttpBackendClient { client })
    }

    /// One bulk call for all `iris`
    async fn fetch_bulk(
        &self,
        service: &BackendService,
        iris: &[String],
        headers: &BackendHeaders,
    ) -> Result<BackendBatch> {
        let url = service.url_for(BULK_PATH)?;
        debug!("Bulk call to service {} for {} resources", service.name, iris.len());

        let request = headers.apply(self.client.post(url).json(&BulkRequestBody { resources: iris }));
        let response = request.send().await.map_err(|e| {
            warn!("Bulk call to service {} failed: {}", service.name, e);
            LinkError::bulk_backend(&service.name, 502)
        })?;

        let status = response.status().as_u16();
        if status != 200 {
            warn!("Bulk call to service {} returned status {}", service.name, status);
            return Err(LinkError::bulk_backend(&service.name, status));
        }

        let rotated_credentials = RotatedCredentials::from_response(response.headers());
        let format = BodyFormat::from_content_type(
            response
                .headers()
                .get(reqwest::header::CONTENT_TYPE)
                .and_then(|v| v.to_str().ok()),
        );

        let items: Vec<BulkResponseItem> = response.json().await.map_err(|e| {
            warn!("Bulk response from service {} is not valid: {}", service.name, e);
            LinkError::bulk_backend(&service.name, 502)
        })?;

        Ok(BackendBatch {
            items: items
                .into_iter()
                .map(|item| item.into_item(format))
                .collect(),
            rotated_credentials,
        })
    }

    /// One GET per resource, issued concurrently
    async fn fetch_each(
        &self,
        service: &BackendService,
        iris: &[String],
        headers: &BackendHeaders,
    ) -> BackendBatch {
        let results = join_all(iris.iter().map(|iri| self.fetch_single(service, iri, headers))).await;

        let mut batch = BackendBatch::default();
        for (item, rotated) in results {
            if rotated.is_some() {
                batch.rotated_credentials = rotated;
            }
            batch.items.push(item);
        }
        batch
    }

    async fn fetch_single(
        &self,
        service: &BackendService,
        iri: &str,
        headers: &BackendHeaders,
    ) -> (BackendItem, Option<RotatedCredentials>) {
        let failed = |status: u16| BackendItem {
            iri: iri.to_string(),
            status,
            cache_control: CacheControl::Private,
            body: None,
            format: BodyFormat::default(),
        };

        let url = match resource_path(iri).and_then(|path| service.url_for(&path)) {
            Ok(url) => url,
            Err(e) => {
                warn!("Cannot route {} to service {}: {}", iri, service.name, e);
                return (failed(400), None);
            }
        };

        debug!("Fetching {} from {}", iri, url);
        let response = match headers.apply(self.client.get(url)).send().await {
            Ok(response) => response,
            Err(e) => {
                warn!("Request for {} to service {} failed: {}", iri, service.name, e);
                return (failed(502), None);
            }
        };

        let status = response.status().as_u16();
        let rotated = RotatedCredentials::from_response(response.headers());
        let header = |name: reqwest::header::HeaderName| {
            response
                .headers()
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        };
        let cache_control = CacheControl::from_header(header(reqwest::header::CACHE_CONTROL).as_deref());
        let format = BodyFormat::from_content_type(header(reqwest::header::CONTENT_TYPE).as_deref());

        let body = match response.text().await {
            Ok(text) if !text.is_empty() => Some(text),
            Ok(_) => None,
            Err(e) => {
                warn!("Failed to read body for {}: {}", iri, e);
                return (failed(502), rotated);
            }
        };

        (
            BackendItem {
                iri: iri.to_string(),
                status,
                cache_control,
                body,
                format,
            },
            rotated,
        )
    }
}

#[async_trait]
impl BackendClient for HttpBackendClient {
    async fn fetch(
        &self,
        service: &BackendService,
        iris: &[String],
        headers: &BackendHeaders,
    ) -> Result<BackendBatch> {
        if service.bulk {
            self.fetch_bulk(service, iris, headers).await
        } else {
            Ok(self.fetch_each(service, iris, headers).await)
        }
    }
}

/// Path and query of a resource IRI, as requested from a service
fn resource_path(iri: &str) -> Result<String> {
    let url = Url::parse(iri).map_err(|e| LinkError::InvalidIri(format!("{}: {}", iri, e)))?;
    Ok(match url.query() {
        Some(query) => format!("{}?{}", url.path(), query),
        None => url.path().to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::HeaderValue;

    #[test]
    fn test_headers_from_request() {
        let mut headers = HeaderMap::new();
        headers.insert("authorization", HeaderValue::from_static("Bearer abc"));
        headers.insert("x-device-id", HeaderValue::from_static("device-1"));
        headers.insert("accept-language", HeaderValue::from_static("nl, en;q=0.5"));
        headers.insert("cookie", HeaderValue::from_static("secret"));
        headers.insert("website-iri", HeaderValue::from_static("https://client.test/"));

        let forwarded = BackendHeaders::from_request(&headers);
        assert_eq!(forwarded.authorization.as_deref(), Some("Bearer abc"));
        assert_eq!(forwarded.device_id.as_deref(), Some("device-1"));
        assert_eq!(forwarded.accept_language.as_deref(), Some("nl, en;q=0.5"));
        assert_eq!(forwarded.website_iri, None);
    }

    #[test]
    fn test_tenant_website_iri_wins() {
        let mut incoming = HeaderMap::new();
        incoming.insert("website-iri", HeaderValue::from_static("https://client.test/"));

        let forwarded = BackendHeaders::from_request(&incoming).with_website_iri("https://tenant.test/");
        assert_eq!(forwarded.website_iri.as_deref(), Some("https://tenant.test/"));
    }

    #[test]
    fn test_resource_path() {
        assert_eq!(resource_path("https://demo.test/posts/1").unwrap(), "/posts/1");
        assert_eq!(resource_path("https://demo.test/search?q=a").unwrap(), "/search?q=a");
        assert!(resource_path("not an iri").is_err());
    }

    #[test]
    fn test_bulk_item_defaults() {
        let items: Vec<BulkResponseItem> =
            serde_json::from_str(r#"[{"iri":"https://demo.test/1","status":404}]"#).unwrap();
        assert_eq!(items[0].cache_control, CacheControl::Private);
        assert!(items[0].body.is_none());
    }

    #[test]
    fn test_bulk_item_cache_control_is_lenient() {
        let items: Vec<BulkResponseItem> = serde_json::from_str(
            r#"[
                {"iri": "https://a.test/1", "status": 200, "cacheControl": "public"},
                {"iri": "https://a.test/2", "status": 200, "cacheControl": "no-store"},
                {"iri": "https://a.test/3", "status": 200, "cacheControl": "public, max-age=60"},
                {"iri": "https://a.test/4", "status": 200, "cacheControl": "immutable"},
                {"iri": "https://a.test/5", "status": 200}
            ]"#,
        )
        .unwrap();
        let controls: Vec<CacheControl> = items
            .into_iter()
            .map(|item| item.into_item(BodyFormat::Empathy).cache_control)
            .collect();
        assert_eq!(
            controls,
            vec![
                CacheControl::Public,
                CacheControl::NoCache,
                CacheControl::Public,
                CacheControl::Private,
                CacheControl::Private,
            ]
        );
    }
}
