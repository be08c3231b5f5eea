//! In-flight request gauge.

use std::task::{Context, Poll};

use futures_util::future::BoxFuture;
use metrics::Gauge;
use tower::{Layer, Service};

use crate::http::transport::{PingRequest, PingResponse, TransportError};
use crate::observability::ClientMetrics;

/// Layer tracking `in_flight_requests{target}`.
#[derive(Clone)]
pub struct InFlightLayer {
    gauge: Gauge,
}

impl InFlightLayer {
    pub fn new(metrics: &ClientMetrics, target: &str) -> Self {
        Self {
            gauge: metrics.in_flight(target),
        }
    }
}

impl<S> Layer<S> for InFlightLayer {
    type Service = InFlight<S>;

    fn layer(&self, inner: S) -> Self::Service {
        InFlight {
            inner,
            gauge: self.gauge.clone(),
        }
    }
}

#[derive(Clone)]
pub struct InFlight<S> {
    inner: S,
    gauge: Gauge,
}

/// Holds one unit of the gauge; released on drop, whatever the outcome.
struct InFlightGuard(Gauge);

impl InFlightGuard {
    fn acquire(gauge: Gauge) -> Self {
        gauge.increment(1.0);
        Self(gauge)
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.0.decrement(1.0);
    }
}

impl<S> Service<PingRequest> for InFlight<S>
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
        let guard = InFlightGuard::acquire(self.gauge.clone());
        let fut = self.inner.call(req);
        Box::pin(async move {
            let _guard = guard;
            fut.await
        })
    }
}
