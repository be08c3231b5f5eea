//! Configuration schema definitions.
//!
//! All types derive Serde traits for deserialization from the TOML config file.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Root configuration for the traffic generator.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ZombieConfig {
    /// Administrative API settings. Absent means disabled.
    pub api: Option<ApiConfig>,

    /// Span rendering and export settings.
    pub tracing: TracingConfig,

    /// Endpoints to generate traffic against.
    pub targets: Vec<TargetConfig>,
}

impl ZombieConfig {
    /// True if at least one target participates in tracing.
    pub fn some_otel(&self) -> bool {
        self.targets.iter().any(|t| t.otel_enabled)
    }

    /// The admin API config, only when it is enabled.
    pub fn enabled_api(&self) -> Option<&ApiConfig> {
        self.api.as_ref().filter(|api| api.enabled)
    }
}

/// Administrative API configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Serve the admin API.
    pub enabled: bool,

    /// Bind address (e.g., "127.0.0.1:9090").
    pub addr: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            addr: "127.0.0.1:9090".to_string(),
        }
    }
}

/// When the debug processor writes a span line.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RenderMode {
    /// Render attributes known when the span starts.
    #[default]
    Start,
    /// Render final attributes when the span ends, with `latency=<ms>` appended.
    End,
}

/// Tracing configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TracingConfig {
    /// Where the span tree is written: a file path, "stdout" or "stderr".
    pub debug_output: String,

    /// Indentation repeated once per ancestry level.
    pub indent: String,

    /// Render spans at start or at end.
    pub render: RenderMode,

    /// Optional OTLP/HTTP traces URL, e.g. `http://localhost:4318/v1/traces`.
    pub exporter_endpoint: Option<String>,

    /// `service.name` resource attribute.
    pub service_name: String,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            debug_output: "traces.txt".to_string(),
            indent: "  ".to_string(),
            render: RenderMode::Start,
            exporter_endpoint: None,
            service_name: "zombie".to_string(),
        }
    }
}

/// One endpoint to ping.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TargetConfig {
    /// Display name. Defaults to the URL.
    #[serde(default)]
    pub name: Option<String>,

    /// URL requested with GET on every iteration.
    pub url: String,

    /// Base delay between pings in milliseconds (<= 0 uses the default).
    #[serde(default)]
    pub delay: i64,

    /// Fractional spread applied to the delay (<= 0 uses the default).
    #[serde(default)]
    pub jitter: f64,

    /// Number of concurrent workers (<= 0 means one).
    #[serde(default)]
    pub workers: i64,

    /// Extra request headers.
    #[serde(default)]
    pub headers: BTreeMap<String, String>,

    /// Create spans and propagate trace context for this target.
    #[serde(default)]
    pub otel_enabled: bool,
}

impl TargetConfig {
    /// A target with only a URL; everything else defaulted.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            name: None,
            url: url.into(),
            delay: 0,
            jitter: 0.0,
            workers: 0,
            headers: BTreeMap::new(),
            otel_enabled: false,
        }
    }
}
