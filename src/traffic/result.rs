use std::time::Duration;

use opentelemetry::trace::TraceId;

/// Outcome of one ping attempt.
#[derive(Debug, Clone, PartialEq)]
pub struct PingResult {
    pub name: String,
    pub worker: usize,
    pub method: String,
    /// `None` when the request produced no response.
    pub status: Option<u16>,
    pub url: String,
    pub latency: Duration,
    pub trace_id: Option<TraceId>,
}

impl PingResult {
    pub fn is_success(&self) -> bool {
        self.status.is_some()
    }

    /// Emit the result as one structured log event.
    pub fn log(&self) {
        let trace_id = self.trace_id.map(|id| id.to_string()).unwrap_or_default();
        match self.status {
            Some(status) => tracing::info!(
                name = %self.name,
                worker = self.worker,
                method = %self.method,
                status,
                url = %self.url,
                latency_ms = self.latency.as_millis() as u64,
                trace_id = %trace_id,
                "ping"
            ),
            None => tracing::info!(
                name = %self.name,
                worker = self.worker,
                method = %self.method,
                url = %self.url,
                latency_ms = self.latency.as_millis() as u64,
                trace_id = %trace_id,
                "ping failed"
            ),
        }
    }
}
