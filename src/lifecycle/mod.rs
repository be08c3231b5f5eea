//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Load config → Print summary → Initialize logging, metrics, tracing
//!     → Start admin API → Start traffic engine
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → shutdown.rs trigger
//!
//! Shutdown (shutdown.rs):
//!     Trigger → Workers stop at next loop iteration → Join → Flush spans → Exit
//! ```
//!
//! # Design Decisions
//! - One process-wide shutdown signal, observed cooperatively
//! - In-flight requests are never aborted; the HTTP client timeout bounds the drain

pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::Shutdown;
