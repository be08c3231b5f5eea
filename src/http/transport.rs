//! Request/response types and the reqwest-backed transport.

use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use futures_util::future::BoxFuture;
use reqwest::header::HeaderMap;
use reqwest::{Method, StatusCode};
use thiserror::Error;
use tower::util::BoxCloneService;
use tower::Service;
use url::Url;

use crate::http::resolver::TimedResolver;
use crate::observability::ClientMetrics;

/// Upper bound on a single request, including draining the body.
pub const CLIENT_TIMEOUT: Duration = Duration::from_secs(10);

/// One request issued by a worker.
#[derive(Debug, Clone)]
pub struct PingRequest {
    pub method: Method,
    pub url: Url,
    pub headers: HeaderMap,
}

impl PingRequest {
    pub fn get(url: Url) -> Self {
        Self {
            method: Method::GET,
            url,
            headers: HeaderMap::new(),
        }
    }

    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }
}

/// What is kept of a response once its body has been drained.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PingResponse {
    pub status: StatusCode,
    pub body_len: usize,
}

/// A request that produced no response.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("client error: {0}")]
    Request(#[from] reqwest::Error),

    #[error("client error: {0}")]
    Io(#[from] std::io::Error),
}

/// The fully instrumented, cloneable ping client.
pub type PingService = BoxCloneService<PingRequest, PingResponse, TransportError>;

/// Transport issuing requests with a shared `reqwest::Client`.
#[derive(Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }

    /// Client for one target: fixed timeout, certificates not verified, DNS
    /// lookups timed into `dns_duration_seconds`.
    pub fn for_target(target: &str, metrics: &ClientMetrics, timeout: Duration) -> Result<Self, TransportError> {
        let resolver = TimedResolver::new(metrics.dns_duration(target, "dns_done"));
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .danger_accept_invalid_certs(true)
            .dns_resolver(Arc::new(resolver))
            .build()?;

        Ok(Self::new(client))
    }
}

impl Service<PingRequest> for ReqwestTransport {
    type Response = PingResponse;
    type Error = TransportError;
    type Future = BoxFuture<'static, Result<PingResponse, TransportError>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: PingRequest) -> Self::Future {
        let client = self.client.clone();
        Box::pin(async move {
            let response = client
                .request(req.method, req.url)
                .headers(req.headers)
                .send()
                .await?;
            let status = response.status();

            // Drain the body so the connection can go back to the pool.
            let body_len = match response.bytes().await {
                Ok(body) => body.len(),
                Err(e) => {
                    tracing::debug!(error = %e, "Failed to drain response body");
                    0
                }
            };

            Ok(PingResponse { status, body_len })
        })
    }
}
