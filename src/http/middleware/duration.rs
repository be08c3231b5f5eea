//! Request duration histogram.

use std::task::{Context, Poll};
use std::time::Instant;

use futures_util::future::BoxFuture;
use metrics::Histogram;
use tower::{Layer, Service};

use crate::http::transport::{PingRequest, PingResponse, TransportError};
use crate::observability::ClientMetrics;

/// Layer observing `request_duration_seconds{target}` for completed requests.
#[derive(Clone)]
pub struct DurationLayer {
    histogram: Histogram,
}

impl DurationLayer {
    pub fn new(metrics: &ClientMetrics, target: &str) -> Self {
        Self {
            histogram: metrics.request_duration(target),
        }
    }
}

impl<S> Layer<S> for DurationLayer {
    type Service = Timed<S>;

    fn layer(&self, inner: S) -> Self::Service {
        Timed {
            inner,
            histogram: self.histogram.clone(),
        }
    }
}

#[derive(Clone)]
pub struct Timed<S> {
    inner: S,
    histogram: Histogram,
}

impl<S> Service<PingRequest> for Timed<S>
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
        let histogram = self.histogram.clone();
        let start = Instant::now();
        let fut = self.inner.call(req);

        Box::pin(async move {
            let response = fut.await?;
            histogram.record(start.elapsed().as_secs_f64());
            Ok(response)
        })
    }
}
