//! Instrumentation layers around the ping transport.
//!
//! Stages, outermost first: in-flight gauge, completion counter, duration
//! histogram. Each one is an independent tower layer and can wrap any
//! `Service<PingRequest>`.

mod counter;
mod duration;
mod in_flight;

pub use counter::{Counted, CounterLayer};
pub use duration::{DurationLayer, Timed};
pub use in_flight::{InFlight, InFlightLayer};

use tower::util::BoxCloneService;
use tower::{Service, ServiceBuilder};

use crate::http::transport::{PingRequest, PingResponse, PingService, TransportError};
use crate::observability::ClientMetrics;

/// Wrap `transport` with every instrumentation stage for `target`.
pub fn instrumented<S>(target: &str, metrics: &ClientMetrics, transport: S) -> PingService
where
    S: Service<PingRequest, Response = PingResponse, Error = TransportError> + Clone + Send + 'static,
    S::Future: Send + 'static,
{
    let service = ServiceBuilder::new()
        .layer(InFlightLayer::new(metrics, target))
        .layer(CounterLayer::new(metrics, target))
        .layer(DurationLayer::new(metrics, target))
        .service(transport);

    BoxCloneService::new(service)
}
