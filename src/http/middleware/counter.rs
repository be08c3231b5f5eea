//! Completed request counter.

use std::sync::Arc;
use std::task::{Context, Poll};

use futures_util::future::BoxFuture;
use tower::{Layer, Service};

use crate::http::transport::{PingRequest, PingResponse, TransportError};
use crate::observability::ClientMetrics;

/// Layer counting `requests_total{target,code,method}`.
///
/// Any response counts, whatever its status; transport errors do not.
#[derive(Clone)]
pub struct CounterLayer {
    metrics: ClientMetrics,
    target: Arc<str>,
}

impl CounterLayer {
    pub fn new(metrics: &ClientMetrics, target: &str) -> Self {
        Self {
            metrics: metrics.clone(),
            target: Arc::from(target),
        }
    }
}

impl<S> Layer<S> for CounterLayer {
    type Service = Counted<S>;

    fn layer(&self, inner: S) -> Self::Service {
        Counted {
            inner,
            metrics: self.metrics.clone(),
            target: self.target.clone(),
        }
    }
}

#[derive(Clone)]
pub struct Counted<S> {
    inner: S,
    metrics: ClientMetrics,
    target: Arc<str>,
}

impl<S> Service<PingRequest> for Counted<S>
where
    S: Service<PingRequest, Response = PingResponse, Error = TransportError>,
    S::Future: Send + 'static,
{
    type Response = PingResponse;
    type Error = TransportError;
    type Future = BoxFuture<'static, Result<PingResponse, TransportError>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: PingRequest) -> Self::Future {
        let method = req.method.clone();
        let metrics = self.metrics.clone();
        let target = self.target.clone();
        let fut = self.inner.call(req);

        Box::pin(async move {
            let response = fut.await?;
            metrics
                .requests_total(&target, response.status.as_u16(), method.as_str())
                .increment(1);
            Ok(response)
        })
    }
}
