//! DNS resolver that times every lookup.

use std::net::SocketAddr;
use std::time::Instant;

use metrics::Histogram;
use reqwest::dns::{Addrs, Name, Resolve, Resolving};

/// Resolves through the system resolver and records lookup latency.
pub struct TimedResolver {
    histogram: Histogram,
}

impl TimedResolver {
    pub fn new(histogram: Histogram) -> Self {
        Self { histogram }
    }
}

impl Resolve for TimedResolver {
    fn resolve(&self, name: Name) -> Resolving {
        let histogram = self.histogram.clone();
        Box::pin(async move {
            let start = Instant::now();
            let addrs: Vec<SocketAddr> = tokio::net::lookup_host((name.as_str(), 0)).await?.collect();
            histogram.record(start.elapsed().as_secs_f64());

            tracing::trace!(host = name.as_str(), count = addrs.len(), "Resolved host");
            let addrs: Addrs = Box::new(addrs.into_iter());
            Ok(addrs)
        })
    }
}
