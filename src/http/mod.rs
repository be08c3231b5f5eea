//! HTTP client side of the traffic generator.
//!
//! # Data Flow
//! ```text
//! Pinger
//!     → middleware::InFlight   (in_flight_requests{target})
//!     → middleware::Counted    (requests_total{target,code,method})
//!     → middleware::Timed      (request_duration_seconds{target})
//!     → transport::ReqwestTransport
//!         → resolver::TimedResolver (dns_duration_seconds{target,event})
//!         → target
//! ```
//!
//! # Design Decisions
//! - Every stage is a tower `Service<PingRequest>`, so any stage can wrap a
//!   stub transport in tests
//! - The transport always drains the response body before returning

pub mod middleware;
pub mod resolver;
pub mod transport;

pub use middleware::instrumented;
pub use transport::{PingRequest, PingResponse, PingService, ReqwestTransport, TransportError};
