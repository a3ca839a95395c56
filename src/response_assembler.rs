//! Response assembler for streaming bulk results to the client
//!
//! Every entry becomes one line of newline-delimited compact JSON. Lines go
//! through a bounded channel to the client; once the client has consumed the
//! whole body, authorized entries that may be shared are written back to the
//! cache.

use crate::codec::{json, EMPATHY_NDJSON};
use crate::data_slice::DataSlice;
use crate::error::{LinkError, Result};
use crate::metrics::LinkMetrics;
use crate::models::CacheEntry;
use crate::partitioner::{PartitionStats, LINK_CACHE_HEADER};
use crate::record::RecordBuilder;
use crate::store::CacheEntryStore;
use crate::value::Value;
use crate::vocab;
use bytes::Bytes;
use futures_util::future::join_all;
use futures_util::Stream;
use http::{HeaderMap, HeaderValue};
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Outcome of writing authorized entries back to the cache
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WriteBackReport {
    pub written: usize,
    pub failed: usize,
    /// Entries not eligible for caching
    pub skipped: usize,
}

/// Response body; yields lines until the producer is done
///
/// Reaching the end of the stream signals the producer that the body was
/// fully delivered. Dropping the stream early suppresses write-back.
pub struct ResponseStream {
    lines: mpsc::Receiver<Bytes>,
    finished: Option<oneshot::Sender<()>>,
}

impl Stream for ResponseStream {
    type Item = Bytes;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Bytes>> {
        match self.lines.poll_recv(cx) {
            Poll::Ready(None) => {
                if let Some(finished) = self.finished.take() {
                    let _ = finished.send(());
                }
                Poll::Ready(None)
            }
            other => other,
        }
    }
}

/// Streams bulk results and performs the deferred write-back
pub struct ResponseAssembler {
    store: Option<CacheEntryStore>,
    metrics: Arc<LinkMetrics>,
    channel_capacity: usize,
}

impl ResponseAssembler {
    /// Create a new ResponseAssembler
    ///
    /// # Arguments
    /// * `store` - Store receiving write-backs, or `None` when caching is disabled
    /// * `metrics` - Shared metrics collector
    /// * `channel_capacity` - Lines buffered ahead of the client
    pub fn new(store: Option<CacheEntryStore>, metrics: Arc<LinkMetrics>, channel_capacity: usize) -> Self {
        ResponseAssembler {
            store,
            metrics,
            channel_capacity: channel_capacity.max(1),
        }
    }

    /// Build response headers for the client
    pub fn build_response_header(&self, stats: &PartitionStats) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(http::header::CONTENT_TYPE, HeaderValue::from_static(EMPATHY_NDJSON));
        headers.insert(
            LINK_CACHE_HEADER,
            HeaderValue::from_str(&stats.link_cache_header())
                .map_err(|e| LinkError::InternalError(format!("Invalid header value: {}", e)))?,
        );
        Ok(headers)
    }

    /// Start streaming `cached_public` then `authorized` entries
    ///
    /// # Arguments
    /// * `compact_website` - Website IRI to shorten output against, if any
    ///
    /// # Returns
    /// The body stream and a handle resolving to the write-back report, or
    /// `None` when the client did not receive the whole body.
    pub fn assemble(
        &self,
        cached_public: Vec<CacheEntry>,
        authorized: Vec<CacheEntry>,
        lang: String,
        compact_website: Option<String>,
    ) -> (ResponseStream, JoinHandle<Option<WriteBackReport>>) {
        let (tx, rx) = mpsc::channel(self.channel_capacity);
        let (finished_tx, finished_rx) = oneshot::channel();

        let store = self.store.clone();
        let metrics = self.metrics.clone();

        let producer = tokio::spawn(async move {
            let mut sent = 0u64;
            let mut delivered = true;
            for entry in cached_public.iter().chain(authorized.iter()) {
                let line = match entry_line(entry, compact_website.as_deref()) {
                    Ok(line) => line,
                    Err(e) => {
                        warn!("Skipping unencodable entry {}: {}", entry.iri, e);
                        continue;
                    }
                };
                let len = line.len() as u64;
                if tx.send(line).await.is_err() {
                    delivered = false;
                    break;
                }
                sent += len;
            }
            drop(tx);
            metrics.record_bytes_to_client(sent);

            if !delivered || finished_rx.await.is_err() {
                debug!("Client went away before the body was sent, skipping write-back");
                metrics.record_write_back_skipped();
                return None;
            }

            let report = write_back(store.as_ref(), &authorized, &lang).await;
            metrics.record_write_back(report.written, report.failed);
            if report.written > 0 || report.failed > 0 {
                info!(
                    "Write-back done: written={}, failed={}, skipped={}",
                    report.written, report.failed, report.skipped
                );
            }
            Some(report)
        });

        (
            ResponseStream {
                lines: rx,
                finished: Some(finished_tx),
            },
            producer,
        )
    }

    /// Write cacheable entries to the store under `lang`
    pub async fn write_back(&self, entries: &[CacheEntry], lang: &str) -> WriteBackReport {
        write_back(self.store.as_ref(), entries, lang).await
    }
}

async fn write_back(store: Option<&CacheEntryStore>, entries: &[CacheEntry], lang: &str) -> WriteBackReport {
    let store = match store {
        Some(store) => store,
        None => {
            return WriteBackReport {
                skipped: entries.len(),
                ..Default::default()
            }
        }
    };

    let cacheable: Vec<&CacheEntry> = entries.iter().filter(|e| e.is_cacheable()).collect();
    let mut report = WriteBackReport {
        skipped: entries.len() - cacheable.len(),
        ..Default::default()
    };

    let results = join_all(cacheable.iter().map(|entry| store.set(entry, lang))).await;
    for (entry, result) in cacheable.iter().zip(results) {
        match result {
            Ok(()) => report.written += 1,
            Err(e) => {
                warn!("Failed to write back {}: {}", entry.iri, e);
                report.failed += 1;
            }
        }
    }
    report
}

/// Slice standing in for an entry without contents
pub fn status_slice(entry: &CacheEntry) -> Result<DataSlice> {
    let record = RecordBuilder::new(Value::global(entry.iri.as_str()))?
        .field(vocab::HTTP_STATUS_CODE, Value::Int32(entry.status.to_string()))
        .build();
    Ok(DataSlice::from_records(vec![record]))
}

/// Encode one entry as a response line, newline included
pub fn entry_line(entry: &CacheEntry, compact_website: Option<&str>) -> Result<Bytes> {
    let slice = match &entry.contents {
        Some(contents) if !contents.is_empty() => contents.clone(),
        _ => status_slice(entry)?,
    };
    let slice = match compact_website {
        Some(website) => slice.compact(Some(website)),
        None => slice,
    };

    let mut line = json::slice_to_string(&slice);
    line.push('\n');
    Ok(Bytes::from(line))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory_store::MemoryStore;
    use crate::models::CacheControl;
    use futures_util::StreamExt;

    fn contents(iri: &str) -> DataSlice {
        DataSlice::from_records(vec![RecordBuilder::new(Value::global(iri))
            .unwrap()
            .field("http://schema.org/name", Value::string("x"))
            .build()])
    }

    fn assembler() -> (ResponseAssembler, CacheEntryStore, Arc<LinkMetrics>) {
        let store = CacheEntryStore::new(Arc::new(MemoryStore::new()), None);
        let metrics = Arc::new(LinkMetrics::new());
        (ResponseAssembler::new(Some(store.clone()), metrics.clone(), 2), store, metrics)
    }

    #[test]
    fn test_build_response_header() {
        let (assembler, _, _) = assembler();
        let stats = PartitionStats {
            items: 2,
            cached_public: 1,
            cached_not_public: 0,
            not_cached: 1,
        };
        let headers = assembler.build_response_header(&stats).unwrap();
        assert_eq!(headers.get("content-type").unwrap(), EMPATHY_NDJSON);
        assert_eq!(
            headers.get("link-cache").unwrap(),
            "items=2; public=0.50; cached=0.50; authorized=0.50"
        );
    }

    #[test]
    fn test_entry_line_without_contents() {
        let entry = CacheEntry::failed("https://a.test/1", 404);
        let line = entry_line(&entry, None).unwrap();
        assert!(line.ends_with(b"\n"));

        let slice = json::slice_from_str(std::str::from_utf8(&line).unwrap().trim()).unwrap();
        let record = slice.get("https://a.test/1").unwrap();
        assert_eq!(record.get(vocab::HTTP_STATUS_CODE), &[Value::Int32("404".to_string())]);
    }

    #[test]
    fn test_entry_line_compacted() {
        let entry = CacheEntry::new("https://a.test/1", 200, CacheControl::Public, Some(contents("https://a.test/1")));
        let line = entry_line(&entry, Some("https://a.test/")).unwrap();
        let text = std::str::from_utf8(&line).unwrap();
        assert!(text.contains("\"/1\""));
        assert!(!text.contains("https://a.test/1"));
    }

    #[tokio::test]
    async fn test_stream_order_and_write_back() {
        let (assembler, store, metrics) = assembler();
        let public = CacheEntry::new("https://a.test/1", 200, CacheControl::Public, Some(contents("https://a.test/1")));
        let shared = CacheEntry::new("https://a.test/2", 200, CacheControl::NoCache, Some(contents("https://a.test/2")));
        let private = CacheEntry::new("https://a.test/3", 200, CacheControl::Private, Some(contents("https://a.test/3")));
        let missing = CacheEntry::failed("https://a.test/4", 404);

        let (stream, completion) = assembler.assemble(
            vec![public],
            vec![shared.clone(), private, missing],
            "en".to_string(),
            None,
        );
        let lines: Vec<Bytes> = stream.collect().await;
        assert_eq!(lines.len(), 4);
        assert!(std::str::from_utf8(&lines[0]).unwrap().contains("https://a.test/1"));
        assert!(std::str::from_utf8(&lines[3]).unwrap().contains("https://a.test/4"));

        let report = completion.await.unwrap().unwrap();
        assert_eq!(
            report,
            WriteBackReport {
                written: 1,
                failed: 0,
                skipped: 2
            }
        );
        assert_eq!(store.get("https://a.test/2", "en").await.unwrap(), Some(shared));
        assert_eq!(store.get("https://a.test/3", "en").await.unwrap(), None);
        assert_eq!(metrics.get_stats().entries_written, 1);
    }

    #[tokio::test]
    async fn test_no_write_back_when_client_aborts() {
        let (assembler, store, metrics) = assembler();
        let authorized: Vec<CacheEntry> = (0..10)
            .map(|i| {
                let iri = format!("https://a.test/{}", i);
                CacheEntry::new(iri.clone(), 200, CacheControl::Public, Some(contents(&iri)))
            })
            .collect();

        let (mut stream, completion) = assembler.assemble(Vec::new(), authorized, "en".to_string(), None);
        assert!(stream.next().await.is_some());
        drop(stream);

        assert_eq!(completion.await.unwrap(), None);
        assert_eq!(store.get("https://a.test/0", "en").await.unwrap(), None);
        assert_eq!(metrics.get_stats().write_backs_skipped, 1);
    }

    #[tokio::test]
    async fn test_write_back_without_store() {
        let assembler = ResponseAssembler::new(None, Arc::new(LinkMetrics::new()), 4);
        let entries = vec![CacheEntry::new("https://a.test/1", 200, CacheControl::Public, None)];
        let report = assembler.write_back(&entries, "en").await;
        assert_eq!(report.skipped, 1);
        assert_eq!(report.written, 0);
    }
}
