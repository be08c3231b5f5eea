//! Synthetic HTTP traffic generator with span-tree rendering.

pub mod admin;
pub mod config;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod trace;
pub mod trace_server;
pub mod traffic;

pub use config::schema::ZombieConfig;
pub use lifecycle::Shutdown;
pub use traffic::{PingResult, TrafficEngine};
