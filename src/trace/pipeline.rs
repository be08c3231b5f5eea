//! Tracer provider assembly.
//!
//! Every binary builds its provider here: an optional console processor
//! first, then an optional batched OTLP/HTTP exporter. The SDK hands each
//! processor its own copy of a span, so neither can alter the other's view.

use std::time::Duration;

use opentelemetry_otlp::{SpanExporter, WithExportConfig};
use opentelemetry_sdk::trace::SdkTracerProvider;
use opentelemetry_sdk::Resource;
use thiserror::Error;

use crate::trace::debug::DebugProcessor;

/// Tracer handed out by the SDK provider.
pub type Tracer = <SdkTracerProvider as opentelemetry::trace::TracerProvider>::Tracer;

/// Upper bound on one export request.
pub const EXPORT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
pub enum TraceError {
    #[error("failed to build span exporter for '{endpoint}': {reason}")]
    Exporter { endpoint: String, reason: String },
}

/// OTLP/HTTP (protobuf) span exporter posting to `endpoint`, used as given.
pub fn otlp_exporter(endpoint: &str) -> Result<SpanExporter, TraceError> {
    SpanExporter::builder()
        .with_http()
        .with_endpoint(endpoint)
        .with_timeout(EXPORT_TIMEOUT)
        .build()
        .map_err(|e| TraceError::Exporter {
            endpoint: endpoint.to_string(),
            reason: e.to_string(),
        })
}

/// Build a provider for `service_name` with the given processors.
pub fn tracer_provider(
    service_name: &str,
    debug: Option<DebugProcessor>,
    exporter_endpoint: Option<&str>,
) -> Result<SdkTracerProvider, TraceError> {
    let resource = Resource::builder()
        .with_service_name(service_name.to_string())
        .build();
    let mut builder = SdkTracerProvider::builder().with_resource(resource);

    if let Some(debug) = debug {
        builder = builder.with_span_processor(debug);
    }
    if let Some(endpoint) = exporter_endpoint {
        builder = builder.with_batch_exporter(otlp_exporter(endpoint)?);
        tracing::info!(endpoint, "Exporting spans over OTLP/HTTP");
    }

    Ok(builder.build())
}
