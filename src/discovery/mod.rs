//! Dock Discovery
//!
//! Keeps the persisted docks and pools in line with what the backends
//! report. A discoverer is initialized once, then the loop runs
//! discover/report every interval until it is cancelled:
//!
//! ```text
//!   init ──► ┌─► discover ──► report ──► sleep ─┐
//!            └───────────────────────────────────┘
//! ```
//!
//! Errors of either step go to the error channel; the loop keeps running.
//! Cancellation is observed between passes and during the sleep, never in
//! the middle of a pass.

pub mod attach;
pub mod metrics;
pub mod provision;

pub use attach::AttachDockDiscoverer;
pub use metrics::{BackendMetrics, DiscoveryMetrics};
pub use provision::ProvisionDockDiscoverer;

use crate::error::{Error, Result};
use async_trait::async_trait;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Interval between passes unless configured
pub const DEFAULT_DISCOVERY_INTERVAL: Duration = Duration::from_secs(60);

/// Deterministic dock id from a host and a per-dock discriminator
pub fn dock_id(host: &str, discriminator: &str) -> String {
    let seed = format!("{}:{}", host, discriminator);
    Uuid::new_v5(&Uuid::NAMESPACE_OID, seed.as_bytes()).to_string()
}

#[async_trait]
pub trait DockDiscoverer: Send {
    async fn init(&mut self) -> Result<()>;

    async fn discover(&mut self) -> Result<()>;

    async fn report(&mut self) -> Result<()>;
}

/// Loop controls shared with the process
#[derive(Clone)]
pub struct DiscoveryContext {
    pub stop: CancellationToken,
    pub errors: mpsc::Sender<Error>,
    pub interval: Duration,
    pub metrics: Option<DiscoveryMetrics>,
}

impl DiscoveryContext {
    pub fn new(stop: CancellationToken, errors: mpsc::Sender<Error>) -> Self {
        Self {
            stop,
            errors,
            interval: DEFAULT_DISCOVERY_INTERVAL,
            metrics: None,
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_metrics(mut self, metrics: DiscoveryMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    async fn raise(&self, e: Error) {
        if let Some(metrics) = &self.metrics {
            metrics.failures.inc();
        }
        if self.errors.send(e).await.is_err() {
            warn!("Discovery error channel closed");
        }
    }
}

/// Run discover/report passes until `ctx.stop` is cancelled
pub async fn discover_and_report<D>(discoverer: &mut D, ctx: &DiscoveryContext)
where
    D: DockDiscoverer + ?Sized,
{
    info!("Discovery loop started, interval = {:?}", ctx.interval);
    loop {
        if ctx.stop.is_cancelled() {
            break;
        }

        if let Err(e) = discoverer.discover().await {
            ctx.raise(e).await;
        }
        if let Err(e) = discoverer.report().await {
            ctx.raise(e).await;
        }
        if let Some(metrics) = &ctx.metrics {
            metrics.passes.inc();
        }
        debug!("Discovery pass finished");

        tokio::select! {
            _ = ctx.stop.cancelled() => break,
            _ = tokio::time::sleep(ctx.interval) => {}
        }
    }
    info!("Discovery loop stopped");
}
