//! Console span processor that prints spans as an indented tree.
//!
//! Every span becomes one line, `<scope>::<name>{k=v, ...}`, indented once
//! per registered ancestor:
//!
//! ```text
//! zombie::zombie.main{}
//!   zombie::zombie.pingerTask{worker=0, target=api, delay=1000, jitter=0.2}
//!     zombie::zombie.ping{target=localhost:8080, http.method=GET, ...}
//! ```
//!
//! In [`RenderMode::Start`] the line is written when the span starts and only
//! shows the attributes known at that moment. [`RenderMode::End`] waits for
//! the span to end and appends `latency=<ms>`.

use std::fmt;
use std::fs::File;
use std::io::{self, LineWriter, Write};
use std::path::Path;
use std::sync::{Arc, Mutex};

use opentelemetry::{Context, KeyValue};
use opentelemetry_sdk::error::{OTelSdkError, OTelSdkResult};
use opentelemetry_sdk::trace::{Span, SpanData, SpanProcessor};

pub use crate::config::RenderMode;
use crate::trace::registry::{SpanRecord, SpanRegistry};

const DEFAULT_INDENT: &str = "  ";

/// Open the output named in config: "stdout", "stderr", or a file path.
pub fn open_output(target: &str) -> io::Result<Box<dyn Write + Send>> {
    match target {
        "stdout" | "-" => Ok(Box::new(io::stdout())),
        "stderr" => Ok(Box::new(io::stderr())),
        path => Ok(Box::new(LineWriter::new(File::create(Path::new(path))?))),
    }
}

/// Builder for [`DebugProcessor`]. Defaults to stdout and two-space indent.
pub struct DebugProcessorBuilder {
    out: Box<dyn Write + Send>,
    indent: String,
    render: RenderMode,
}

impl Default for DebugProcessorBuilder {
    fn default() -> Self {
        Self {
            out: Box::new(io::stdout()),
            indent: DEFAULT_INDENT.to_string(),
            render: RenderMode::Start,
        }
    }
}

impl DebugProcessorBuilder {
    pub fn with_writer(mut self, out: impl Write + Send + 'static) -> Self {
        self.out = Box::new(out);
        self
    }

    pub fn with_boxed_writer(mut self, out: Box<dyn Write + Send>) -> Self {
        self.out = out;
        self
    }

    pub fn with_indent(mut self, indent: impl Into<String>) -> Self {
        self.indent = indent.into();
        self
    }

    pub fn with_render(mut self, render: RenderMode) -> Self {
        self.render = render;
        self
    }

    pub fn build(self) -> DebugProcessor {
        DebugProcessor {
            indent: self.indent,
            render: self.render,
            state: Mutex::new(DebugState {
                spans: SpanRegistry::new(),
                out: self.out,
            }),
        }
    }
}

struct DebugState {
    spans: SpanRegistry,
    out: Box<dyn Write + Send>,
}

/// Span processor writing the span tree to a writer.
///
/// Registry updates, ancestry walks and writes all happen under one lock, so
/// lines from concurrent workers never interleave.
pub struct DebugProcessor {
    indent: String,
    render: RenderMode,
    state: Mutex<DebugState>,
}

impl fmt::Debug for DebugProcessor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DebugProcessor")
            .field("indent", &self.indent)
            .field("render", &self.render)
            .finish_non_exhaustive()
    }
}

impl DebugProcessor {
    pub fn builder() -> DebugProcessorBuilder {
        DebugProcessorBuilder::default()
    }

    fn line(&self, depth: usize, record: &SpanRecord, latency_ms: Option<u128>) -> String {
        let mut attributes = format_attributes(&record.attributes);
        if let Some(ms) = latency_ms {
            if !attributes.is_empty() {
                attributes.push_str(", ");
            }
            attributes.push_str(&format!("latency={}", ms));
        }

        format!(
            "{}{}::{}{{{}}}\n",
            self.indent.repeat(depth),
            record.scope,
            record.name,
            attributes
        )
    }
}

fn write_line(out: &mut dyn Write, line: &str) {
    if let Err(e) = out.write_all(line.as_bytes()) {
        tracing::warn!(error = %e, "Failed to write span line");
    }
}

/// `k=v` pairs joined by `, `, in insertion order.
pub fn format_attributes(attributes: &[KeyValue]) -> String {
    attributes
        .iter()
        .map(|kv| format!("{}={}", kv.key.as_str(), kv.value))
        .collect::<Vec<_>>()
        .join(", ")
}

impl SpanProcessor for DebugProcessor {
    fn on_start(&self, span: &mut Span, _cx: &Context) {
        // Non-recording spans carry no data to render.
        let Some(data) = span.exported_data() else {
            return;
        };
        let mut state = self.state.lock().expect("debug processor mutex poisoned");
        let record = SpanRecord::started(&data);
        let depth = state.spans.depth_from(record.id, record.parent);

        if self.render == RenderMode::Start {
            let line = self.line(depth, &record, None);
            write_line(&mut *state.out, &line);
        }

        state.spans.register(record);
    }

    fn on_end(&self, span: SpanData) {
        let mut state = self.state.lock().expect("debug processor mutex poisoned");
        let record = state.spans.finish(&span).clone();

        if self.render == RenderMode::End {
            let depth = state.spans.depth(record.id);
            let latency = span
                .end_time
                .duration_since(span.start_time)
                .map(|d| d.as_millis())
                .unwrap_or_default();
            let line = self.line(depth, &record, Some(latency));
            write_line(&mut *state.out, &line);
        }
    }

    fn force_flush(&self) -> OTelSdkResult {
        self.state
            .lock()
            .expect("debug processor mutex poisoned")
            .out
            .flush()
            .map_err(|e| OTelSdkError::InternalFailure(format!("flush span output: {}", e)))
    }

    fn shutdown(&self) -> OTelSdkResult {
        self.force_flush()
    }
}

/// A cloneable in-memory writer, handy for capturing rendered trees.
#[derive(Clone, Default)]
pub struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

impl SharedBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().expect("buffer mutex poisoned")).into_owned()
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().expect("buffer mutex poisoned").extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use opentelemetry::trace::{
        Span as _, SpanContext, SpanId, TraceContextExt, TraceFlags, TraceId, TraceState, Tracer as _,
        TracerProvider as _,
    };
    use opentelemetry_sdk::trace::SdkTracerProvider;

    fn provider(buffer: &SharedBuffer, render: RenderMode) -> SdkTracerProvider {
        let processor = DebugProcessor::builder()
            .with_writer(buffer.clone())
            .with_render(render)
            .build();
        SdkTracerProvider::builder().with_span_processor(processor).build()
    }

    #[test]
    fn test_renders_nested_tree() {
        let buffer = SharedBuffer::new();
        let provider = provider(&buffer, RenderMode::Start);
        let tracer = provider.tracer("zombie");

        let a = Context::current_with_span(tracer.start("a"));
        let b = a.with_span(
            tracer
                .span_builder("b")
                .with_attributes([KeyValue::new("worker", 1i64)])
                .start_with_context(&tracer, &a),
        );
        let _c = tracer
            .span_builder("c")
            .with_attributes([KeyValue::new("k", "v"), KeyValue::new("n", 2i64)])
            .start_with_context(&tracer, &b);

        assert_eq!(
            buffer.contents(),
            "zombie::a{}\n  zombie::b{worker=1}\n    zombie::c{k=v, n=2}\n"
        );
    }

    #[test]
    fn test_unknown_parent_renders_at_root() {
        let buffer = SharedBuffer::new();
        let provider = provider(&buffer, RenderMode::Start);
        let tracer = provider.tracer("svc");
        let remote = SpanContext::new(
            TraceId::from_hex("4bf92f3577b34da6a3ce929d0e0e4736").unwrap(),
            SpanId::from_hex("00f067aa0ba902b7").unwrap(),
            TraceFlags::SAMPLED,
            true,
            TraceState::default(),
        );
        let parent = Context::new().with_remote_span_context(remote);

        let _x = tracer.start_with_context("x", &parent);

        assert_eq!(buffer.contents(), "svc::x{}\n");
    }

    #[test]
    fn test_start_mode_renders_start_snapshot() {
        let buffer = SharedBuffer::new();
        let provider = provider(&buffer, RenderMode::Start);
        let tracer = provider.tracer("svc");

        let mut span = tracer.start("work");
        span.set_attribute(KeyValue::new("late", true));
        span.end();

        assert_eq!(buffer.contents(), "svc::work{}\n");
    }

    #[test]
    fn test_end_mode_renders_final_attributes_and_latency() {
        let buffer = SharedBuffer::new();
        let provider = provider(&buffer, RenderMode::End);
        let tracer = provider.tracer("svc");

        let parent = Context::current_with_span(tracer.start("parent"));
        let mut child = tracer.start_with_context("child", &parent);
        child.set_attribute(KeyValue::new("late", true));
        child.end();
        parent.span().end();

        let contents = buffer.contents();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("  svc::child{late=true, latency="));
        assert!(lines[1].starts_with("svc::parent{latency="));
    }

    #[test]
    fn test_custom_indent() {
        let buffer = SharedBuffer::new();
        let processor = DebugProcessor::builder()
            .with_writer(buffer.clone())
            .with_indent("|-")
            .build();
        let provider = SdkTracerProvider::builder().with_span_processor(processor).build();
        let tracer = provider.tracer("s");

        let root = Context::current_with_span(tracer.start("root"));
        let _child = tracer.start_with_context("child", &root);

        assert_eq!(buffer.contents(), "s::root{}\n|-s::child{}\n");
    }

    #[test]
    fn test_format_attributes() {
        let attributes = [
            KeyValue::new("target", "api"),
            KeyValue::new("delay", 1000i64),
            KeyValue::new("jitter", 0.2),
        ];
        assert_eq!(format_attributes(&attributes), "target=api, delay=1000, jitter=0.2");
        assert_eq!(format_attributes(&[]), "");
    }
}
