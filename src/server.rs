//! HTTP/1 listener for the bulk and cache clear endpoints
//!
//! Routes:
//! - `POST [/{tenant}]/link-lib/bulk`
//! - `POST [/{tenant}]/link-lib/cache/clear`

use crate::error::LinkError;
use crate::proxy::{BulkProxy, BulkRequest, ClearResponse};
use bytes::Bytes;
use futures_util::StreamExt;
use http::header::{HeaderValue, CACHE_CONTROL, CONTENT_TYPE};
use http::{Method, Request, Response, StatusCode};
use http_body_util::combinators::UnsyncBoxBody;
use http_body_util::{BodyExt, Full, StreamBody};
use hyper::body::{Frame, Incoming};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{debug, error, info};

const BULK_SUFFIX: &str = "/link-lib/bulk";
const CLEAR_SUFFIX: &str = "/link-lib/cache/clear";

type ResponseBody = UnsyncBoxBody<Bytes, Infallible>;

/// Endpoint addressed by a request path
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    Bulk { tenant: Option<String> },
    Clear { tenant: Option<String> },
    NotFound,
}

impl Route {
    /// Match a request path against the known endpoints
    pub fn from_path(path: &str) -> Route {
        if let Some(prefix) = path.strip_suffix(BULK_SUFFIX) {
            if let Some(tenant) = tenant_segment(prefix) {
                return Route::Bulk { tenant };
            }
        }
        if let Some(prefix) = path.strip_suffix(CLEAR_SUFFIX) {
            if let Some(tenant) = tenant_segment(prefix) {
                return Route::Clear { tenant };
            }
        }
        Route::NotFound
    }
}

/// `""` is the default tenant, `"/name"` a named one; anything deeper is no match
fn tenant_segment(prefix: &str) -> Option<Option<String>> {
    if prefix.is_empty() {
        return Some(None);
    }
    let name = prefix.strip_prefix('/')?;
    if name.is_empty() || name.contains('/') {
        return None;
    }
    Some(Some(name.to_string()))
}

/// Serves a [`BulkProxy`] over HTTP/1
pub struct LinkServer {
    proxy: Arc<BulkProxy>,
    addr: SocketAddr,
}

impl LinkServer {
    pub fn new(proxy: Arc<BulkProxy>, addr: SocketAddr) -> Self {
        Self { proxy, addr }
    }

    /// Accept connections until the process is terminated
    pub async fn start(self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let listener = TcpListener::bind(self.addr).await?;
        info!("Link cache listening on http://{}", self.addr);
        self.serve(listener).await
    }

    /// Serve connections from an already bound listener
    pub async fn serve(self, listener: TcpListener) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        loop {
            let (stream, peer) = listener.accept().await?;
            debug!("Accepted connection from {}", peer);
            let io = TokioIo::new(stream);
            let proxy = Arc::clone(&self.proxy);

            tokio::task::spawn(async move {
                let service = service_fn(move |req| {
                    let proxy = Arc::clone(&proxy);
                    async move { Ok::<_, Infallible>(handle_request(req, proxy).await) }
                });

                if let Err(err) = http1::Builder::new().serve_connection(io, service).await {
                    error!("Error serving connection: {:?}", err);
                }
            });
        }
    }
}

async fn handle_request(req: Request<Incoming>, proxy: Arc<BulkProxy>) -> Response<ResponseBody> {
    let route = Route::from_path(req.uri().path());
    if route == Route::NotFound {
        return error_response(StatusCode::NOT_FOUND, "Not found");
    }
    if req.method() != Method::POST {
        return error_response(StatusCode::METHOD_NOT_ALLOWED, "Only POST is allowed");
    }

    let (parts, body) = req.into_parts();
    let body = match body.collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) => {
            debug!("Failed to read request body: {}", e);
            return error_response(StatusCode::BAD_REQUEST, "Unreadable request body");
        }
    };

    match route {
        Route::Bulk { tenant } => {
            let request = BulkRequest {
                tenant,
                headers: parts.headers,
                body,
            };
            match proxy.handle_bulk(request).await {
                Ok(bulk) => {
                    let frames = bulk.body.map(|line| Ok::<_, Infallible>(Frame::data(line)));
                    let mut response = Response::new(BodyExt::boxed_unsync(StreamBody::new(frames)));
                    *response.status_mut() = bulk.status;
                    *response.headers_mut() = bulk.headers;
                    response
                }
                Err(e) => link_error_response(&e),
            }
        }
        Route::Clear { tenant } => match proxy.handle_clear(tenant, &parts.headers, &body).await {
            Ok(cleared) => json_response(StatusCode::OK, &cleared),
            Err(e) => {
                let status = status_of(&e);
                json_response(
                    status,
                    &ClearResponse {
                        success: false,
                        cleared_count: 0,
                        message: e.to_string(),
                    },
                )
            }
        },
        Route::NotFound => error_response(StatusCode::NOT_FOUND, "Not found"),
    }
}

fn status_of(error: &LinkError) -> StatusCode {
    StatusCode::from_u16(error.to_http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
}

fn full(body: impl Into<Bytes>) -> ResponseBody {
    BodyExt::boxed_unsync(Full::new(body.into()))
}

fn link_error_response(error: &LinkError) -> Response<ResponseBody> {
    error_response(status_of(error), &error.to_string())
}

fn error_response(status: StatusCode, message: &str) -> Response<ResponseBody> {
    let mut response = Response::new(full(message.to_string()));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("text/plain; charset=utf-8"));
    response
}

fn json_response(status: StatusCode, body: &ClearResponse) -> Response<ResponseBody> {
    let json = match serde_json::to_string(body) {
        Ok(json) => json,
        Err(e) => return error_response(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string()),
    };
    let mut response = Response::new(full(json));
    *response.status_mut() = status;
    let headers = response.headers_mut();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-cache, no-store, must-revalidate"));
    response
}
