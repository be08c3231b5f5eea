//! Demo HTTP server producing nested traces.
//!
//! # Data Flow
//! ```text
//! GET / (traceparent?)
//!     → track_requests: in-flight gauge, latency, counter, access log
//!     → handle_root: `handler` span, child of the remote parent if any
//!         → chain of up to 11 `recurse` spans, each sleeping in [min, max)
//! ```
//!
//! Pointing the traffic generator at this server with tracing enabled shows
//! client and server spans of one trace in the same tree.

use std::time::{Duration, Instant};

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::get,
    Extension, Router,
};
use metrics::{Counter, Gauge, Histogram, Label};
use opentelemetry::trace::{SpanKind, TraceContextExt, TraceId, Tracer as _};
use opentelemetry::{Context, KeyValue};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tower_http::trace::TraceLayer;

use crate::observability::{MetricsError, MetricsRegistry};
use crate::trace::{extract_context, Tracer};

pub const API_REQUESTS_TOTAL: &str = "api_requests_total";
pub const API_REQUESTS_LATENCY: &str = "api_requests_latency";
pub const API_REQUESTS_IN_FLIGHT: &str = "api_requests_in_flight";

/// Shape of the `recurse` span chain.
#[derive(Debug, Clone)]
pub struct RecurseConfig {
    pub min_sleep: Duration,
    /// Exclusive upper bound; ignored unless above `min_sleep`.
    pub max_sleep: Duration,
    /// Most `recurse` spans one request may open.
    pub max_depth: usize,
    /// Chance of going one level deeper after each step.
    pub continue_probability: f64,
}

impl Default for RecurseConfig {
    fn default() -> Self {
        Self {
            min_sleep: Duration::from_millis(200),
            max_sleep: Duration::from_millis(1000),
            max_depth: 11,
            continue_probability: 0.5,
        }
    }
}

/// Metrics recorded by the demo server.
#[derive(Clone, Debug)]
pub struct ServerMetrics {
    registry: MetricsRegistry,
}

impl ServerMetrics {
    pub fn register(registry: &MetricsRegistry) -> Result<Self, MetricsError> {
        registry.describe_counter(API_REQUESTS_TOTAL, "A counter for requests to the wrapped handler.")?;
        registry.describe_histogram(API_REQUESTS_LATENCY, "A histogram of latencies for requests.")?;
        registry.describe_gauge(API_REQUESTS_IN_FLIGHT, "A gauge of requests currently being served.")?;

        Ok(Self {
            registry: registry.clone(),
        })
    }

    pub fn requests_total(&self, code: u16, method: &str) -> Counter {
        self.registry.counter(
            API_REQUESTS_TOTAL,
            vec![
                Label::new("code", code.to_string()),
                Label::new("method", method.to_string()),
            ],
        )
    }

    pub fn latency(&self) -> Histogram {
        self.registry.histogram(API_REQUESTS_LATENCY, Vec::new())
    }

    pub fn in_flight(&self) -> Gauge {
        self.registry.gauge(API_REQUESTS_IN_FLIGHT, Vec::new())
    }

    pub fn registry(&self) -> &MetricsRegistry {
        &self.registry
    }
}

#[derive(Clone)]
pub struct TraceServerState {
    pub tracer: Tracer,
    pub metrics: ServerMetrics,
    pub recurse: RecurseConfig,
}

pub fn router(state: TraceServerState) -> Router {
    Router::new()
        .route("/", get(handle_root))
        .route("/metrics", get(handle_metrics))
        .fallback(handle_not_found)
        .layer(middleware::from_fn_with_state(state.clone(), track_requests))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn handle_root(State(state): State<TraceServerState>, headers: HeaderMap) -> impl IntoResponse {
    let parent = extract_context(&headers);
    let span = state
        .tracer
        .span_builder("handler")
        .with_kind(SpanKind::Server)
        .start_with_context(&state.tracer, &parent);
    let cx = parent.with_span(span);
    let trace_id = cx.span().span_context().trace_id();

    let depth = recurse(&state.tracer, &cx, &state.recurse, StdRng::from_entropy()).await;
    cx.span().end();

    (Extension(trace_id), format!("trace_id={} depth={}\n", trace_id, depth))
}

async fn handle_not_found() -> StatusCode {
    StatusCode::NOT_FOUND
}

async fn handle_metrics(State(state): State<TraceServerState>) -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.registry().render(),
    )
}

/// Sleep length in milliseconds, drawn from `[min, max)`.
fn sleep_millis<R: Rng>(rng: &mut R, min: Duration, max: Duration) -> u64 {
    let min = min.as_millis() as u64;
    let max = max.as_millis() as u64;
    if max > min {
        rng.gen_range(min..max)
    } else {
        min
    }
}

/// Open a chain of nested `recurse` spans under `parent`; returns its length.
pub async fn recurse(tracer: &Tracer, parent: &Context, config: &RecurseConfig, mut rng: StdRng) -> usize {
    let p = config.continue_probability.clamp(0.0, 1.0);

    let mut open: Vec<Context> = Vec::new();
    let mut parent = parent.clone();

    while open.len() < config.max_depth.max(1) {
        let sleep = sleep_millis(&mut rng, config.min_sleep, config.max_sleep);
        let span = tracer
            .span_builder("recurse")
            .with_attributes([
                KeyValue::new("duration", sleep as i64),
                KeyValue::new("depth", open.len() as i64 + 1),
            ])
            .start_with_context(tracer, &parent);
        tokio::time::sleep(Duration::from_millis(sleep)).await;

        parent = parent.with_span(span);
        open.push(parent.clone());

        if !rng.gen_bool(p) {
            break;
        }
    }

    let depth = open.len();
    // Innermost spans end first.
    while let Some(cx) = open.pop() {
        cx.span().end();
    }
    depth
}

async fn track_requests(State(state): State<TraceServerState>, request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();

    let in_flight = state.metrics.in_flight();
    in_flight.increment(1.0);
    let start = Instant::now();

    let response = next.run(request).await;

    in_flight.decrement(1.0);
    state.metrics.latency().record(start.elapsed().as_secs_f64());
    let status = response.status().as_u16();
    state.metrics.requests_total(status, method.as_str()).increment(1);

    let trace_id = response
        .extensions()
        .get::<TraceId>()
        .map(ToString::to_string)
        .unwrap_or_default();
    tracing::info!(trace_id = %trace_id, path = %path, method = %method, status, "request");

    response
}
