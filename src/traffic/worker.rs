//! The per-worker ping loop.
//!
//! # Loop
//! ```text
//! shutdown? → sleep(jitter(delay)) (interruptible) → GET through the
//! instrumented service under a `zombie.ping` span → emit PingResult
//! ```
//!
//! # Design Decisions
//! - Failed requests are recorded, never retried; the next iteration is the retry
//! - Shutdown is observed before every iteration and during the sleep; an
//!   in-flight request is left to finish (bounded by the client timeout)

use std::sync::Arc;
use std::time::Instant;

use opentelemetry::trace::{SpanKind, Status, TraceContextExt, Tracer as _};
use opentelemetry::{Context, KeyValue};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tokio::sync::{broadcast, mpsc};
use tokio::time;
use tower::{Service, ServiceExt};

use crate::http::{PingRequest, PingService};
use crate::lifecycle::shutdown::is_triggered;
use crate::trace::{inject_context, Tracer};
use crate::traffic::jitter::jitter;
use crate::traffic::result::PingResult;
use crate::traffic::target::TargetSpec;

/// One worker looping over a single target.
pub struct Pinger {
    target: Arc<TargetSpec>,
    worker: usize,
    service: PingService,
    tracer: Option<Tracer>,
    parent: Context,
    results: mpsc::UnboundedSender<PingResult>,
    rng: StdRng,
}

impl Pinger {
    pub fn new(
        target: Arc<TargetSpec>,
        worker: usize,
        service: PingService,
        results: mpsc::UnboundedSender<PingResult>,
    ) -> Self {
        Self {
            target,
            worker,
            service,
            tracer: None,
            parent: Context::new(),
            results,
            rng: StdRng::from_entropy(),
        }
    }

    /// Trace this worker's pings under `parent`.
    pub fn with_tracer(mut self, tracer: Tracer, parent: Context) -> Self {
        self.tracer = Some(tracer);
        self.parent = parent;
        self
    }

    pub fn with_rng(mut self, rng: StdRng) -> Self {
        self.rng = rng;
        self
    }

    /// Run until shutdown is signalled or the result receiver is gone.
    pub async fn run(mut self, mut shutdown: broadcast::Receiver<()>) {
        let task = match &self.tracer {
            Some(tracer) => {
                let span = tracer
                    .span_builder("zombie.pingerTask")
                    .with_attributes([
                        KeyValue::new("worker", self.worker as i64),
                        KeyValue::new("target", self.target.name.clone()),
                        KeyValue::new("delay", self.target.delay.as_millis() as i64),
                        KeyValue::new("jitter", self.target.jitter),
                    ])
                    .start_with_context(tracer, &self.parent);
                self.parent.with_span(span)
            }
            None => self.parent.clone(),
        };

        tracing::debug!(target_name = %self.target.name, worker = self.worker, "Pinger starting");

        loop {
            if is_triggered(&mut shutdown) {
                break;
            }

            let delay = jitter(self.target.delay, self.target.jitter, &mut self.rng);
            tokio::select! {
                _ = time::sleep(delay) => {}
                _ = shutdown.recv() => break,
            }

            let result = self.ping_once(&task).await;
            if self.results.send(result).is_err() {
                tracing::debug!(target_name = %self.target.name, worker = self.worker, "Result receiver dropped");
                break;
            }
        }

        if self.tracer.is_some() {
            task.span().end();
        }
        tracing::debug!(target_name = %self.target.name, worker = self.worker, "Pinger stopped");
    }

    /// Issue one request and describe its outcome.
    pub async fn ping_once(&mut self, parent: &Context) -> PingResult {
        let mut request = PingRequest::get(self.target.url.clone()).with_headers(self.target.headers.clone());

        let cx = self.tracer.as_ref().map(|tracer| {
            let span = tracer
                .span_builder("zombie.ping")
                .with_kind(SpanKind::Client)
                .with_attributes([
                    KeyValue::new("target", self.target.host()),
                    KeyValue::new("http.method", request.method.to_string()),
                    KeyValue::new("http.url", request.url.to_string()),
                ])
                .start_with_context(tracer, parent);
            parent.with_span(span)
        });

        if let Some(cx) = &cx {
            inject_context(cx, &mut request.headers);
        }

        let method = request.method.to_string();
        let url = request.url.to_string();
        let start = Instant::now();
        let outcome = match self.service.ready().await {
            Ok(service) => service.call(request).await,
            Err(e) => Err(e),
        };
        let latency = start.elapsed();

        let status = match outcome {
            Ok(response) => {
                let code = response.status.as_u16();
                if let Some(cx) = &cx {
                    cx.span().set_attribute(KeyValue::new("http.status_code", code as i64));
                }
                Some(code)
            }
            Err(e) => {
                tracing::warn!(target_name = %self.target.name, worker = self.worker, error = %e, "Ping failed");
                if let Some(cx) = &cx {
                    let span = cx.span();
                    span.record_error(&e);
                    span.set_status(Status::error(e.to_string()));
                }
                None
            }
        };

        let trace_id = cx.as_ref().map(|cx| {
            let span = cx.span();
            span.end();
            span.span_context().trace_id()
        });

        PingResult {
            name: self.target.name.clone(),
            worker: self.worker,
            method,
            status,
            url,
            latency,
            trace_id,
        }
    }
}
