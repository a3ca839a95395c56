//! Backend authorizer
//!
//! Resolves every resource the cache could not serve publicly by asking the
//! responsible backend on behalf of the client, then turns the answers into
//! cache entries.

use crate::backend::{BackendBatch, BackendClient, BackendHeaders, BackendItem, RotatedCredentials};
use crate::error::Result;
use crate::iri;
use crate::metrics::LinkMetrics;
use crate::models::{CacheEntry, CacheRequest};
use crate::routing::{BackendService, ServiceRouter};
use crate::scope::{scope_local_ids, PrefixSource};
use futures_util::future::join_all;
use indexmap::IndexMap;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Receives session credentials rotated by a backend
pub trait SessionUpdater: Send + Sync {
    fn update(&self, credentials: &RotatedCredentials);
}

/// Session updater that only records the rotation in the log
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingSessionUpdater;

impl SessionUpdater for LoggingSessionUpdater {
    fn update(&self, credentials: &RotatedCredentials) {
        info!(
            "Backend rotated session credentials (refresh token: {})",
            credentials.refresh_token.is_some()
        );
    }
}

/// Authorizes uncached resources against the backends
pub struct BackendAuthorizer {
    router: ServiceRouter,
    client: Arc<dyn BackendClient>,
    prefixes: Arc<dyn PrefixSource>,
    session: Arc<dyn SessionUpdater>,
    metrics: Arc<LinkMetrics>,
}

impl BackendAuthorizer {
    pub fn new(
        router: ServiceRouter,
        client: Arc<dyn BackendClient>,
        prefixes: Arc<dyn PrefixSource>,
        session: Arc<dyn SessionUpdater>,
        metrics: Arc<LinkMetrics>,
    ) -> Self {
        BackendAuthorizer {
            router,
            client,
            prefixes,
            session,
            metrics,
        }
    }

    /// Fetch entries for `requests` from their backends
    ///
    /// Requests are grouped per service and the groups are fetched
    /// concurrently. An empty request list makes no backend call.
    ///
    /// # Returns
    /// * `Ok(Vec<CacheEntry>)` with one entry per requested resource
    /// * `Err(LinkError::BulkBackend)` if any bulk call failed
    pub async fn authorize(&self, requests: &[CacheRequest], headers: &BackendHeaders) -> Result<Vec<CacheEntry>> {
        if requests.is_empty() {
            debug!("Nothing to authorize");
            return Ok(Vec::new());
        }

        let groups = self.group(requests);
        debug!("Authorizing {} resources across {} services", requests.len(), groups.len());

        let calls = groups.values().map(|(service, iris)| async move {
            let start = Instant::now();
            let result = self.client.fetch(service, iris, headers).await;
            self.metrics.record_backend_call(result.is_ok());
            self.metrics.record_backend_duration(start.elapsed());
            result
        });
        let results = join_all(calls).await;

        let mut entries = Vec::with_capacity(requests.len());
        for ((_, iris), result) in groups.values().zip(results) {
            let batch = result?;
            self.rotate_session(&batch);
            entries.extend(self.entries_for(iris, batch));
        }
        Ok(entries)
    }

    fn group(&self, requests: &[CacheRequest]) -> IndexMap<String, (BackendService, Vec<String>)> {
        let mut groups: IndexMap<String, (BackendService, Vec<String>)> = IndexMap::new();
        for request in requests {
            let service = self.router.route(&request.iri);
            groups
                .entry(service.name.clone())
                .or_insert_with(|| (service.clone(), Vec::new()))
                .1
                .push(request.iri.clone());
        }
        groups
    }

    fn rotate_session(&self, batch: &BackendBatch) {
        if let Some(credentials) = &batch.rotated_credentials {
            self.session.update(credentials);
        }
    }

    /// Convert a batch into entries, reporting requested resources the
    /// backend left out as failed
    fn entries_for(&self, iris: &[String], batch: BackendBatch) -> Vec<CacheEntry> {
        let mut answered = HashSet::with_capacity(batch.items.len());
        let mut entries: Vec<CacheEntry> = batch
            .items
            .into_iter()
            .map(|mut item| {
                item.iri = iri::normalize_request_iri(&item.iri);
                answered.insert(item.iri.clone());
                self.entry_from_item(item)
            })
            .collect();

        for iri in iris.iter().filter(|iri| !answered.contains(*iri)) {
            warn!("Backend did not answer for {}", iri);
            entries.push(CacheEntry::failed(iri.clone(), 502));
        }
        entries
    }

    /// Scope blank nodes in the item body and decode it
    ///
    /// Only successful items carry graph data; the body of a failed item is
    /// dropped and its own status kept.
    fn entry_from_item(&self, item: BackendItem) -> CacheEntry {
        let body = match item.body {
            Some(body) if (200..300).contains(&item.status) => body,
            Some(_) => {
                debug!("Ignoring body of {} with status {}", item.iri, item.status);
                return CacheEntry::new(item.iri, item.status, item.cache_control, None);
            }
            None => return CacheEntry::new(item.iri, item.status, item.cache_control, None),
        };

        let prefix = self.prefixes.next_prefix();
        let scoped = scope_local_ids(&body, &prefix);
        match item.format.decode(&scoped) {
            Ok(slice) => {
                let contents = if slice.is_empty() { None } else { Some(slice) };
                CacheEntry::new(item.iri, item.status, item.cache_control, contents)
            }
            Err(e) => {
                warn!("Failed to decode backend body for {}: {}", item.iri, e);
                self.metrics.record_decode_error();
                CacheEntry::failed(item.iri, 502)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::BodyFormat;
    use crate::config::{LinkConfig, ServiceConfig};
    use crate::error::LinkError;
    use crate::models::CacheControl;
    use crate::scope::SequentialPrefix;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Answers every resource from a fixed body, recording each call
    struct StaticBackend {
        body: Option<String>,
        status: u16,
        iri_suffix: &'static str,
        fail_service: Option<String>,
        calls: Mutex<Vec<(String, Vec<String>)>>,
    }

    impl StaticBackend {
        fn new(body: Option<&str>) -> Self {
            StaticBackend {
                body: body.map(str::to_string),
                status: 200,
                iri_suffix: "",
                fail_service: None,
                calls: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl BackendClient for StaticBackend {
        async fn fetch(
            &self,
            service: &BackendService,
            iris: &[String],
            _headers: &BackendHeaders,
        ) -> Result<BackendBatch> {
            self.calls
                .lock()
                .unwrap()
                .push((service.name.clone(), iris.to_vec()));
            if self.fail_service.as_deref() == Some(service.name.as_str()) {
                return Err(LinkError::bulk_backend(&service.name, 500));
            }
            Ok(BackendBatch {
                items: iris
                    .iter()
                    .map(|iri| BackendItem {
                        iri: format!("{}{}", iri, self.iri_suffix),
                        status: self.status,
                        cache_control: CacheControl::Public,
                        body: self.body.as_ref().map(|b| b.replace("IRI", iri)),
                        format: BodyFormat::Empathy,
                    })
                    .collect(),
                rotated_credentials: Some(RotatedCredentials {
                    authorization: "Bearer new".to_string(),
                    refresh_token: None,
                }),
            })
        }
    }

    #[derive(Default)]
    struct RecordingSession {
        updates: Mutex<usize>,
    }

    impl SessionUpdater for RecordingSession {
        fn update(&self, _credentials: &RotatedCredentials) {
            *self.updates.lock().unwrap() += 1;
        }
    }

    fn router() -> ServiceRouter {
        let config = LinkConfig {
            services: vec![
                ServiceConfig {
                    name: "data".to_string(),
                    url: "http://data.svc".to_string(),
                    bulk: true,
                    paths: Vec::new(),
                },
                ServiceConfig {
                    name: "tokens".to_string(),
                    url: "http://tokens.svc".to_string(),
                    bulk: false,
                    paths: vec!["/tokens".to_string()],
                },
            ],
            ..Default::default()
        };
        ServiceRouter::from_config(&config).unwrap()
    }

    fn authorizer(backend: Arc<StaticBackend>, session: Arc<RecordingSession>) -> BackendAuthorizer {
        BackendAuthorizer::new(
            router(),
            backend,
            Arc::new(SequentialPrefix::new()),
            session,
            Arc::new(LinkMetrics::new()),
        )
    }

    const BODY: &str = r#"{"IRI":{"_id":{"type":"id","v":"IRI"},"http://schema.org/about":{"type":"lid","v":"_:b0"}}}
{"_:b0":{"_id":{"type":"lid","v":"_:b0"},"http://schema.org/name":{"type":"s","v":"x"}}}"#;

    #[tokio::test]
    async fn test_empty_remainder_makes_no_calls() {
        let backend = Arc::new(StaticBackend::new(Some(BODY)));
        let authorizer = authorizer(backend.clone(), Arc::default());
        let entries = authorizer.authorize(&[], &BackendHeaders::default()).await.unwrap();
        assert!(entries.is_empty());
        assert!(backend.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_groups_by_service() {
        let backend = Arc::new(StaticBackend::new(Some(BODY)));
        let session = Arc::new(RecordingSession::default());
        let authorizer = authorizer(backend.clone(), session.clone());
        let requests = vec![
            CacheRequest::new("https://demo.test/posts/1"),
            CacheRequest::new("https://demo.test/tokens/a"),
            CacheRequest::new("https://demo.test/posts/2"),
        ];

        let entries = authorizer.authorize(&requests, &BackendHeaders::default()).await.unwrap();
        assert_eq!(entries.len(), 3);

        let calls = backend.calls.lock().unwrap();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].0, "data");
        assert_eq!(calls[0].1.len(), 2);
        assert_eq!(calls[1].0, "tokens");
        assert_eq!(*session.updates.lock().unwrap(), 2);
    }

    #[tokio::test]
    async fn test_blank_nodes_are_scoped_per_item() {
        let backend = Arc::new(StaticBackend::new(Some(BODY)));
        let authorizer = authorizer(backend, Arc::default());
        let requests = vec![
            CacheRequest::new("https://demo.test/posts/1"),
            CacheRequest::new("https://demo.test/posts/2"),
        ];

        let entries = authorizer.authorize(&requests, &BackendHeaders::default()).await.unwrap();
        let first = entries[0].contents.as_ref().unwrap();
        let second = entries[1].contents.as_ref().unwrap();
        assert!(first.contains("_:p0_b0"));
        assert!(second.contains("_:p1_b0"));
        assert!(!first.contains("_:b0"));
    }

    #[tokio::test]
    async fn test_decode_failure_becomes_502() {
        let backend = Arc::new(StaticBackend::new(Some("{not json")));
        let authorizer = authorizer(backend, Arc::default());
        let entries = authorizer
            .authorize(&[CacheRequest::new("https://demo.test/posts/1")], &BackendHeaders::default())
            .await
            .unwrap();
        assert_eq!(entries[0].status, 502);
        assert!(entries[0].contents.is_none());
    }

    #[tokio::test]
    async fn test_bodyless_item_has_no_contents() {
        let backend = Arc::new(StaticBackend::new(None));
        let authorizer = authorizer(backend, Arc::default());
        let entries = authorizer
            .authorize(&[CacheRequest::new("https://demo.test/posts/1")], &BackendHeaders::default())
            .await
            .unwrap();
        assert_eq!(entries[0].status, 200);
        assert!(entries[0].contents.is_none());
    }

    #[tokio::test]
    async fn test_failed_bulk_call_fails_request() {
        let mut backend = StaticBackend::new(Some(BODY));
        backend.fail_service = Some("data".to_string());
        let authorizer = authorizer(Arc::new(backend), Arc::default());
        let result = authorizer
            .authorize(
                &[
                    CacheRequest::new("https://demo.test/posts/1"),
                    CacheRequest::new("https://demo.test/tokens/a"),
                ],
                &BackendHeaders::default(),
            )
            .await;
        assert_eq!(result, Err(LinkError::bulk_backend("data", 500)));
    }

    #[tokio::test]
    async fn test_failed_item_keeps_its_status() {
        let mut backend = StaticBackend::new(Some("Not Found"));
        backend.status = 404;
        let metrics = Arc::new(LinkMetrics::new());
        let authorizer = BackendAuthorizer::new(
            router(),
            Arc::new(backend),
            Arc::new(SequentialPrefix::new()),
            Arc::new(RecordingSession::default()),
            metrics.clone(),
        );
        let entries = authorizer
            .authorize(&[CacheRequest::new("https://demo.test/posts/1")], &BackendHeaders::default())
            .await
            .unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].status, 404);
        assert!(entries[0].contents.is_none());
        assert_eq!(metrics.get_stats().decode_errors, 0);
    }

    #[tokio::test]
    async fn test_trailing_slash_answer_matches_request() {
        let mut backend = StaticBackend::new(Some(BODY));
        backend.iri_suffix = "/";
        let authorizer = authorizer(Arc::new(backend), Arc::default());
        let entries = authorizer
            .authorize(&[CacheRequest::new("https://demo.test/posts/1")], &BackendHeaders::default())
            .await
            .unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].iri, "https://demo.test/posts/1");
        assert_eq!(entries[0].status, 200);
    }
}
