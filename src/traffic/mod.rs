//! Traffic generation.
//!
//! # Data Flow
//! ```text
//! TargetConfig → target.rs (defaults resolved) → engine.rs
//!     → one instrumented PingService per target
//!     → max(1, workers) × worker.rs Pinger
//!         → jitter.rs delay → request → PingResult on the results channel
//! ```
//!
//! # Design Decisions
//! - Workers are independent; nothing is ordered across workers or targets
//! - The engine does not supervise: failures never stop a worker
//! - Metrics are injected, never looked up from a global registry

pub mod engine;
pub mod jitter;
pub mod result;
pub mod target;
pub mod worker;

pub use engine::{resolve_targets, EngineError, RunningEngine, TrafficEngine};
pub use jitter::{jitter, jitter_with};
pub use result::PingResult;
pub use target::{TargetError, TargetSpec, DEFAULT_DELAY, DEFAULT_JITTER};
pub use worker::Pinger;
