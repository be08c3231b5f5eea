//! Zombie: synthetic HTTP traffic generator.
//!
//! # Architecture Overview
//!
//! ```text
//!   config.toml ──▶ config ──▶ traffic::TrafficEngine
//!                                  │
//!                    ┌─────────────┼─────────────┐
//!                    ▼             ▼             ▼
//!                 Pinger        Pinger        Pinger     (per target × workers)
//!                    │             │             │
//!                    ▼             ▼             ▼
//!         http::instrumented (in-flight → counter → duration → reqwest)
//!                    │                           │
//!                    ▼                           ▼
//!        observability::metrics          SdkTracerProvider
//!                    │                     │            │
//!                    ▼                     ▼            ▼
//!            admin `/metrics`      DebugProcessor   batch + OTLP/HTTP
//!                                  (traces.txt)     (collector)
//! ```

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use opentelemetry::trace::{TraceContextExt, Tracer as _, TracerProvider as _};
use opentelemetry::Context;
use opentelemetry_sdk::trace::SdkTracerProvider;
use tokio::net::TcpListener;
use tokio::sync::mpsc;

use zombie::admin::{self, AdminState};
use zombie::config::{load_config, ZombieConfig};
use zombie::http::transport::CLIENT_TIMEOUT;
use zombie::lifecycle::{signals, startup, Shutdown};
use zombie::observability::{init_logging, ClientMetrics, LogFormat, MetricsRegistry};
use zombie::trace::debug::open_output;
use zombie::trace::{tracer_provider, DebugProcessor};
use zombie::traffic::{resolve_targets, PingResult, TrafficEngine};

#[derive(Parser)]
#[command(name = "zombie")]
#[command(about = "Generates synthetic HTTP traffic against configured targets", long_about = None)]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(short, long)]
    config: PathBuf,

    /// Disable colors in the start-up summary
    #[arg(long)]
    no_color: bool,

    /// Log format: logfmt or json
    #[arg(long, default_value = "logfmt")]
    format: String,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        eprintln!("zombie: {}", e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config(&cli.config)?;
    print!("{}", startup::summary(&config, !cli.no_color));

    let format: LogFormat = cli.format.parse()?;
    init_logging(format, "zombie=info")?;

    let registry = MetricsRegistry::new(ClientMetrics::HISTOGRAM_BUCKETS)?;
    let metrics = ClientMetrics::register(&registry)?;
    let targets = resolve_targets(&config.targets)?;

    let provider = build_provider(&config)?;
    let tracer = provider.as_ref().map(|p| p.tracer("zombie"));
    let root: Option<Context> = tracer
        .as_ref()
        .map(|t| Context::current_with_span(t.start("zombie.main")));

    let shutdown = Shutdown::new();

    if let Some(api) = config.enabled_api() {
        let state = AdminState::new(registry.clone(), targets.clone());
        let addr = api.addr.clone();
        let rx = shutdown.subscribe();
        tokio::spawn(async move {
            let result = match TcpListener::bind(&addr).await {
                Ok(listener) => admin::serve(listener, state, rx).await,
                Err(e) => Err(e),
            };
            if let Err(e) = result {
                tracing::error!(address = %addr, error = %e, "Admin API failed");
            }
        });
    }

    let (results_tx, mut results_rx) = mpsc::unbounded_channel::<PingResult>();
    let printer = tokio::spawn(async move {
        while let Some(result) = results_rx.recv().await {
            result.log();
        }
    });

    let mut engine = TrafficEngine::new(targets, metrics, results_tx);
    if let Some(tracer) = &tracer {
        engine = engine.with_tracer(tracer.clone(), root.clone().unwrap_or_default());
    }
    let mut running = engine.start(&shutdown)?;
    drop(engine);
    tracing::info!(workers = running.worker_count(), "Traffic engine started");

    let signal = signals::wait_for_shutdown().await?;
    tracing::info!(signal, "Shutdown signal received, draining workers");
    shutdown.trigger();

    let drain = CLIENT_TIMEOUT + Duration::from_secs(1);
    if tokio::time::timeout(drain, running.join()).await.is_err() {
        tracing::warn!(timeout_secs = drain.as_secs(), "Workers did not stop in time, aborting");
        running.abort();
        running.join().await;
    }
    let _ = printer.await;

    if let Some(cx) = root {
        cx.span().end();
    }
    if let Some(provider) = provider {
        // Shutdown blocks until the batch exporter has drained.
        match tokio::task::spawn_blocking(move || provider.shutdown()).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::warn!(error = %e, "Failed to flush spans"),
            Err(e) => tracing::warn!(error = %e, "Span flush task failed"),
        }
    }

    tracing::info!("Shutdown complete");
    Ok(())
}

/// Span processors are only set up when some target is traced.
fn build_provider(config: &ZombieConfig) -> Result<Option<SdkTracerProvider>, Box<dyn std::error::Error>> {
    if !config.some_otel() {
        return Ok(None);
    }

    let out = open_output(&config.tracing.debug_output)?;
    let debug = DebugProcessor::builder()
        .with_boxed_writer(out)
        .with_indent(config.tracing.indent.clone())
        .with_render(config.tracing.render)
        .build();
    let provider = tracer_provider(
        &config.tracing.service_name,
        Some(debug),
        config.tracing.exporter_endpoint.as_deref(),
    )?;

    Ok(Some(provider))
}
