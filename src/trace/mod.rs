//! Distributed trace spans on top of the OpenTelemetry SDK.
//!
//! # Data Flow
//! ```text
//! tracer.span_builder(..).start_with_context(..)
//!     → SdkTracerProvider fans on_start out to every span processor
//!         → debug.rs: register in registry.rs, walk ancestry, print line
//!         → batch exporter: ignored until end
//! span end / drop
//!     → on_end to every processor
//!         → debug.rs: mark ended (and print, in end mode)
//!         → batch exporter: queue, batch, OTLP/HTTP to the collector
//! ```
//!
//! Trace context crosses process boundaries through the W3C `traceparent`
//! header (propagation.rs).

pub mod debug;
pub mod pipeline;
pub mod propagation;
pub mod registry;

pub use debug::{DebugProcessor, RenderMode, SharedBuffer};
pub use pipeline::{otlp_exporter, tracer_provider, TraceError, Tracer};
pub use propagation::{extract_context, extract_traceparent, inject_context, TRACEPARENT};
pub use registry::{SpanRecord, SpanRegistry};
