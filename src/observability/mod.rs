//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Workers and binaries produce:
//!     → logging.rs (structured log events via `tracing`)
//!     → metrics.rs (counters, gauges, histograms)
//!
//! Consumers:
//!     → stdout (logfmt-like or JSON lines)
//!     → admin API `/metrics` (Prometheus scrape)
//! ```
//!
//! Span trees are a separate concern, see [`crate::trace`].
//!
//! # Design Decisions
//! - The metrics registry is constructed explicitly and passed by reference;
//!   nothing is installed as a global recorder
//! - Metrics are cheap (atomic increments behind cloned handles)

pub mod logging;
pub mod metrics;

pub use self::logging::{init_logging, LogFormat, LoggingError};
pub use self::metrics::{ClientMetrics, MetricsError, MetricsRegistry};
