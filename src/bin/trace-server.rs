//! Demo HTTP server emitting nested spans for every request.

use clap::Parser;
use opentelemetry::trace::TracerProvider as _;
use tokio::net::TcpListener;

use zombie::lifecycle::{signals, Shutdown};
use zombie::observability::{init_logging, LogFormat, MetricsRegistry};
use zombie::trace::{tracer_provider, DebugProcessor};
use zombie::trace_server::{router, RecurseConfig, ServerMetrics, TraceServerState};

#[derive(Parser)]
#[command(name = "trace-server")]
#[command(about = "HTTP server producing nested traces for every request", long_about = None)]
struct Cli {
    /// Listen address
    #[arg(long, default_value = "0.0.0.0:8080")]
    addr: String,

    /// OTLP/HTTP traces URL, e.g. http://localhost:4318/v1/traces
    #[arg(long)]
    trace: Option<String>,

    /// Log format: logfmt or json
    #[arg(long, default_value = "logfmt")]
    format: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let format: LogFormat = cli.format.parse()?;
    init_logging(format, "zombie=info,trace_server=info")?;

    let registry = MetricsRegistry::new(&[])?;
    let metrics = ServerMetrics::register(&registry)?;

    let provider = tracer_provider("trace-server", Some(DebugProcessor::builder().build()), cli.trace.as_deref())?;

    let state = TraceServerState {
        tracer: provider.tracer("trace-server"),
        metrics,
        recurse: RecurseConfig::default(),
    };

    let listener = TcpListener::bind(&cli.addr).await?;
    tracing::info!(address = %listener.local_addr()?, "trace-server listening");

    let shutdown = Shutdown::new();
    let mut rx = shutdown.subscribe();
    let server = tokio::spawn(async move {
        axum::serve(listener, router(state))
            .with_graceful_shutdown(async move {
                let _ = rx.recv().await;
            })
            .await
    });

    let signal = signals::wait_for_shutdown().await?;
    tracing::info!(signal, "Shutdown signal received");
    shutdown.trigger();

    server.await??;
    match tokio::task::spawn_blocking(move || provider.shutdown()).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => tracing::warn!(error = %e, "Failed to flush spans"),
        Err(e) => tracing::warn!(error = %e, "Span flush task failed"),
    }

    tracing::info!("Shutdown complete");
    Ok(())
}
