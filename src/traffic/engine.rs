//! Worker fan-out and supervision.

use std::sync::Arc;

use opentelemetry::Context;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinSet;

use crate::config::TargetConfig;
use crate::http::transport::CLIENT_TIMEOUT;
use crate::http::{instrumented, PingService, ReqwestTransport, TransportError};
use crate::lifecycle::Shutdown;
use crate::observability::ClientMetrics;
use crate::trace::Tracer;
use crate::traffic::result::PingResult;
use crate::traffic::target::{TargetError, TargetSpec};
use crate::traffic::worker::Pinger;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("target {index}: {source}")]
    Target {
        index: usize,
        #[source]
        source: TargetError,
    },

    #[error("target '{name}': failed to build client: {source}")]
    Transport {
        name: String,
        #[source]
        source: TransportError,
    },
}

/// Resolve every configured target, failing on the first bad one.
pub fn resolve_targets(configs: &[TargetConfig]) -> Result<Vec<TargetSpec>, EngineError> {
    configs
        .iter()
        .enumerate()
        .map(|(index, config)| {
            TargetSpec::from_config(config).map_err(|source| EngineError::Target { index, source })
        })
        .collect()
}

/// Starts `workers` pingers per target and hands back their join handle.
pub struct TrafficEngine {
    targets: Vec<Arc<TargetSpec>>,
    metrics: ClientMetrics,
    results: mpsc::UnboundedSender<PingResult>,
    tracer: Option<Tracer>,
    parent: Context,
    transport: Option<PingService>,
}

impl TrafficEngine {
    pub fn new(
        targets: Vec<TargetSpec>,
        metrics: ClientMetrics,
        results: mpsc::UnboundedSender<PingResult>,
    ) -> Self {
        Self {
            targets: targets.into_iter().map(Arc::new).collect(),
            metrics,
            results,
            tracer: None,
            parent: Context::new(),
            transport: None,
        }
    }

    /// Trace targets that opted in, under `parent`.
    pub fn with_tracer(mut self, tracer: Tracer, parent: Context) -> Self {
        self.tracer = Some(tracer);
        self.parent = parent;
        self
    }

    /// Replace the reqwest transport under every target's instrumentation.
    pub fn with_transport(mut self, transport: PingService) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn targets(&self) -> &[Arc<TargetSpec>] {
        &self.targets
    }

    pub fn start(&self, shutdown: &Shutdown) -> Result<RunningEngine, EngineError> {
        let mut tasks = JoinSet::new();

        for target in &self.targets {
            let base = match &self.transport {
                Some(transport) => transport.clone(),
                None => {
                    let transport = ReqwestTransport::for_target(&target.name, &self.metrics, CLIENT_TIMEOUT)
                        .map_err(|source| EngineError::Transport {
                            name: target.name.clone(),
                            source,
                        })?;
                    PingService::new(transport)
                }
            };
            let service = instrumented(&target.name, &self.metrics, base);

            tracing::info!(
                target_name = %target.name,
                url = %target.url,
                workers = target.workers,
                traced = target.traced,
                "Starting workers"
            );

            for worker in 0..target.workers {
                let mut pinger = Pinger::new(target.clone(), worker, service.clone(), self.results.clone());
                if target.traced {
                    if let Some(tracer) = &self.tracer {
                        pinger = pinger.with_tracer(tracer.clone(), self.parent.clone());
                    }
                }

                // Subscribe before spawning so an early trigger is never missed.
                let rx = shutdown.subscribe();
                tasks.spawn(pinger.run(rx));
            }
        }

        let workers = tasks.len();
        Ok(RunningEngine { tasks, workers })
    }
}

/// Workers started by [`TrafficEngine::start`].
pub struct RunningEngine {
    tasks: JoinSet<()>,
    workers: usize,
}

impl RunningEngine {
    pub fn worker_count(&self) -> usize {
        self.workers
    }

    /// Wait for every worker to exit.
    pub async fn join(&mut self) {
        while let Some(result) = self.tasks.join_next().await {
            if let Err(e) = result {
                tracing::error!(error = %e, "Worker task failed");
            }
        }
        tracing::info!(workers = self.workers, "All workers stopped");
    }

    /// Abort workers that are still running.
    pub fn abort(&mut self) {
        self.tasks.abort_all();
    }
}
