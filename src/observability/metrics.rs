//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Own an explicitly constructed Prometheus recorder
//! - Define the ping client metrics
//! - Render the registry in Prometheus text format
//!
//! # Metrics
//! - `requests_total` (counter): completed requests by target, code, method
//! - `in_flight_requests` (gauge): requests currently executing, by target
//! - `dns_duration_seconds` (histogram): DNS lookup latency by target, event
//! - `tls_duration_seconds` (histogram): TLS handshake latency by target, event
//! - `request_duration_seconds` (histogram): request latency by target
//!
//! # Design Decisions
//! - The recorder is never installed globally; each registry is independent,
//!   so every test gets a fresh one
//! - Describing the same metric name twice is an error (fail fast at startup)
//! - Histogram buckets are fixed when the registry is built

use std::collections::HashSet;
use std::fmt;
use std::sync::{Arc, Mutex};

use metrics::{Counter, Gauge, Histogram, Key, KeyName, Label, Level, Metadata, Recorder, SharedString, Unit};
use metrics_exporter_prometheus::{BuildError, Matcher, PrometheusBuilder, PrometheusHandle, PrometheusRecorder};
use thiserror::Error;

pub const REQUESTS_TOTAL: &str = "requests_total";
pub const IN_FLIGHT_REQUESTS: &str = "in_flight_requests";
pub const DNS_DURATION: &str = "dns_duration_seconds";
pub const TLS_DURATION: &str = "tls_duration_seconds";
pub const REQUEST_DURATION: &str = "request_duration_seconds";

/// Prometheus client default buckets.
pub const DEFAULT_BUCKETS: &[f64] = &[0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0];

fn metadata() -> Metadata<'static> {
    Metadata::new(module_path!(), Level::INFO, Some(module_path!()))
}

/// Errors raised while building or populating a registry.
#[derive(Debug, Error)]
pub enum MetricsError {
    #[error("invalid metrics configuration: {0}")]
    Build(#[from] BuildError),

    #[error("metric '{0}' is already registered")]
    Duplicate(String),
}

/// A process-local metrics registry backed by a Prometheus recorder.
#[derive(Clone)]
pub struct MetricsRegistry {
    inner: Arc<RegistryInner>,
}

struct RegistryInner {
    recorder: PrometheusRecorder,
    handle: PrometheusHandle,
    described: Mutex<HashSet<String>>,
}

impl MetricsRegistry {
    /// Build a registry; `buckets` overrides the default buckets per metric name.
    pub fn new(buckets: &[(&str, &[f64])]) -> Result<Self, MetricsError> {
        let mut builder = PrometheusBuilder::new().set_buckets(DEFAULT_BUCKETS)?;
        for (name, values) in buckets {
            builder = builder.set_buckets_for_metric(Matcher::Full(name.to_string()), values)?;
        }

        let recorder = builder.build_recorder();
        let handle = recorder.handle();

        Ok(Self {
            inner: Arc::new(RegistryInner {
                recorder,
                handle,
                described: Mutex::new(HashSet::new()),
            }),
        })
    }

    fn claim(&self, name: &'static str) -> Result<(), MetricsError> {
        let mut described = self.inner.described.lock().expect("metrics registry mutex poisoned");
        if !described.insert(name.to_string()) {
            return Err(MetricsError::Duplicate(name.to_string()));
        }
        Ok(())
    }

    pub fn describe_counter(&self, name: &'static str, help: &'static str) -> Result<(), MetricsError> {
        self.claim(name)?;
        self.inner
            .recorder
            .describe_counter(KeyName::from(name), None, SharedString::from(help));
        Ok(())
    }

    pub fn describe_gauge(&self, name: &'static str, help: &'static str) -> Result<(), MetricsError> {
        self.claim(name)?;
        self.inner
            .recorder
            .describe_gauge(KeyName::from(name), None, SharedString::from(help));
        Ok(())
    }

    pub fn describe_histogram(&self, name: &'static str, help: &'static str) -> Result<(), MetricsError> {
        self.claim(name)?;
        self.inner
            .recorder
            .describe_histogram(KeyName::from(name), Some(Unit::Seconds), SharedString::from(help));
        Ok(())
    }

    pub fn counter(&self, name: &'static str, labels: Vec<Label>) -> Counter {
        let key = Key::from_parts(name, labels);
        self.inner.recorder.register_counter(&key, &metadata())
    }

    pub fn gauge(&self, name: &'static str, labels: Vec<Label>) -> Gauge {
        let key = Key::from_parts(name, labels);
        self.inner.recorder.register_gauge(&key, &metadata())
    }

    pub fn histogram(&self, name: &'static str, labels: Vec<Label>) -> Histogram {
        let key = Key::from_parts(name, labels);
        self.inner.recorder.register_histogram(&key, &metadata())
    }

    /// Render every metric in Prometheus text exposition format.
    pub fn render(&self) -> String {
        self.inner.handle.render()
    }
}

impl fmt::Debug for MetricsRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let described = self.inner.described.lock().map(|d| d.len()).unwrap_or_default();
        f.debug_struct("MetricsRegistry").field("described", &described).finish()
    }
}

/// Handles for the metrics recorded by the ping client.
#[derive(Clone, Debug)]
pub struct ClientMetrics {
    registry: MetricsRegistry,
}

impl ClientMetrics {
    /// Bucket overrides to pass to [`MetricsRegistry::new`].
    pub const HISTOGRAM_BUCKETS: &'static [(&'static str, &'static [f64])] = &[
        (DNS_DURATION, &[0.005, 0.01, 0.025, 0.05]),
        (TLS_DURATION, &[0.05, 0.1, 0.25, 0.5]),
    ];

    /// Describe the client metrics in `registry`.
    ///
    /// Fails if any of them was already registered.
    pub fn register(registry: &MetricsRegistry) -> Result<Self, MetricsError> {
        registry.describe_counter(REQUESTS_TOTAL, "A counter for requests from the wrapped client.")?;
        registry.describe_gauge(IN_FLIGHT_REQUESTS, "A gauge of in-flight requests for the wrapped client.")?;
        registry.describe_histogram(DNS_DURATION, "Trace dns latency histogram.")?;
        registry.describe_histogram(TLS_DURATION, "Trace tls latency histogram.")?;
        registry.describe_histogram(REQUEST_DURATION, "A histogram of request latencies.")?;

        Ok(Self {
            registry: registry.clone(),
        })
    }

    pub fn in_flight(&self, target: &str) -> Gauge {
        self.registry
            .gauge(IN_FLIGHT_REQUESTS, vec![Label::new("target", target.to_string())])
    }

    pub fn requests_total(&self, target: &str, code: u16, method: &str) -> Counter {
        self.registry.counter(
            REQUESTS_TOTAL,
            vec![
                Label::new("target", target.to_string()),
                Label::new("code", code.to_string()),
                Label::new("method", method.to_string()),
            ],
        )
    }

    pub fn request_duration(&self, target: &str) -> Histogram {
        self.registry
            .histogram(REQUEST_DURATION, vec![Label::new("target", target.to_string())])
    }

    pub fn dns_duration(&self, target: &str, event: &'static str) -> Histogram {
        self.registry.histogram(
            DNS_DURATION,
            vec![Label::new("target", target.to_string()), Label::new("event", event)],
        )
    }

    pub fn registry(&self) -> &MetricsRegistry {
        &self.registry
    }
}

/// Find the value of the sample line for `name` carrying every `labels` pair.
///
/// Used by tests to read back rendered metrics.
pub fn sample_value(rendered: &str, name: &str, labels: &[(&str, &str)]) -> Option<f64> {
    rendered
        .lines()
        .filter(|line| !line.starts_with('#'))
        .filter(|line| line.starts_with(&format!("{}{{", name)) || line.starts_with(&format!("{} ", name)))
        .find(|line| {
            labels
                .iter()
                .all(|(k, v)| line.contains(&format!("{}=\"{}\"", k, v)))
        })
        .and_then(|line| line.rsplit(' ').next())
        .and_then(|value| value.parse().ok())
}
