//! Discovery Metrics
//!
//! - `dock_discovery_passes_total`: completed discover/report cycles
//! - `dock_discovery_failures_total`: errors raised by discover or report
//! - `dock_discovered_pools`: pools seen available in the last pass
//! - `dock_unavailable_pools`: persisted pools missing from the last pass
//! - `dock_backend_metric`: latest sample of each backend metric, labelled by
//!   dock, instance, metric name and unit

use crate::domain::model::Metric;
use crate::error::{Error, Result};
use prometheus::{GaugeVec, IntCounter, IntGauge, Opts, Registry};

#[derive(Clone)]
pub struct DiscoveryMetrics {
    pub passes: IntCounter,
    pub failures: IntCounter,
    pub discovered_pools: IntGauge,
    pub unavailable_pools: IntGauge,
}

fn metric_error(e: prometheus::Error) -> Error {
    Error::Internal(format!("metric registration failed: {}", e))
}

impl DiscoveryMetrics {
    /// Create the metrics and register them with `registry`
    pub fn register(registry: &Registry) -> Result<Self> {
        let metrics = Self {
            passes: IntCounter::new(
                "dock_discovery_passes_total",
                "Total number of discovery passes",
            )
            .map_err(metric_error)?,
            failures: IntCounter::new(
                "dock_discovery_failures_total",
                "Total number of failed discover or report steps",
            )
            .map_err(metric_error)?,
            discovered_pools: IntGauge::new(
                "dock_discovered_pools",
                "Pools reported available by the last discovery pass",
            )
            .map_err(metric_error)?,
            unavailable_pools: IntGauge::new(
                "dock_unavailable_pools",
                "Persisted pools not seen by the last discovery pass",
            )
            .map_err(metric_error)?,
        };

        registry
            .register(Box::new(metrics.passes.clone()))
            .map_err(metric_error)?;
        registry
            .register(Box::new(metrics.failures.clone()))
            .map_err(metric_error)?;
        registry
            .register(Box::new(metrics.discovered_pools.clone()))
            .map_err(metric_error)?;
        registry
            .register(Box::new(metrics.unavailable_pools.clone()))
            .map_err(metric_error)?;
        Ok(metrics)
    }
}

/// Last collected backend samples, exported as one gauge family
#[derive(Clone)]
pub struct BackendMetrics {
    pub samples: GaugeVec,
}

impl BackendMetrics {
    pub fn register(registry: &Registry) -> Result<Self> {
        let samples = GaugeVec::new(
            Opts::new("dock_backend_metric", "Latest sample reported by a backend"),
            &["dock", "instance", "metric", "unit"],
        )
        .map_err(metric_error)?;
        registry
            .register(Box::new(samples.clone()))
            .map_err(metric_error)?;
        Ok(Self { samples })
    }

    pub fn record(&self, dock: &str, metrics: &[Metric]) {
        for metric in metrics {
            let instance = if metric.instance_name.is_empty() {
                &metric.instance_id
            } else {
                &metric.instance_name
            };
            self.samples
                .with_label_values(&[dock, instance, &metric.name, &metric.unit])
                .set(metric.value);
        }
    }
}
