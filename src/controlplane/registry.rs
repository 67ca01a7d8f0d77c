//! Driver Registry
//!
//! Maps driver kinds to constructors and keeps one configured block driver
//! per dock name. Construction and setup run under the cache lock, so two
//! callers asking for the same dock at once never build two instances.
//!
//! Replication and metric drivers have their own constructor tables. They
//! are built per call and never cached. Replication falls back to the sample
//! driver for kinds without one; metrics have no fallback.

use crate::controlplane::drivers::{
    DriverKind, OceanStorDriver, OceanStorMetricDriver, OceanStorReplicationDriver,
    SampleDriver, SampleFileShareDriver, SampleMetricDriver, SampleReplicationDriver,
};
use crate::domain::model::Metric;
use crate::domain::ports::{
    FileShareDriver, FileShareDriverRef, MetricDriver, MetricDriverRef, ReplicationDriver,
    ReplicationDriverRef, VolumeDriver, VolumeDriverRef,
};
use crate::error::{Error, Result};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, error, info};

/// Builds an unconfigured block driver
pub type DriverFactory = Arc<dyn Fn() -> Box<dyn VolumeDriver> + Send + Sync>;

/// Builds an unconfigured file-share driver
pub type FileShareFactory = Arc<dyn Fn() -> Box<dyn FileShareDriver> + Send + Sync>;

/// Builds an unconfigured replication driver
pub type ReplicationFactory = Arc<dyn Fn() -> Box<dyn ReplicationDriver> + Send + Sync>;

/// Builds an unconfigured metric driver
pub type MetricFactory = Arc<dyn Fn() -> Box<dyn MetricDriver> + Send + Sync>;

/// Constructor tables plus the per-dock driver cache
pub struct DriverRegistry {
    factories: HashMap<DriverKind, DriverFactory>,
    file_share_factories: HashMap<DriverKind, FileShareFactory>,
    replication_factories: HashMap<DriverKind, ReplicationFactory>,
    metric_factories: HashMap<DriverKind, MetricFactory>,
    instances: Mutex<HashMap<String, VolumeDriverRef>>,
}

impl Default for DriverRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl DriverRegistry {
    /// Registry with every built-in driver kind
    pub fn new() -> Self {
        let mut registry = Self::empty();
        registry.register(
            DriverKind::Sample,
            Arc::new(|| Box::new(SampleDriver::new()) as Box<dyn VolumeDriver>),
        );
        registry.register(
            DriverKind::HuaweiOceanStorBlock,
            Arc::new(|| Box::new(OceanStorDriver::new()) as Box<dyn VolumeDriver>),
        );
        registry.register_file_share(
            DriverKind::SampleFileShare,
            Arc::new(|| Box::new(SampleFileShareDriver) as Box<dyn FileShareDriver>),
        );
        registry.register_replication(
            DriverKind::Sample,
            Arc::new(|| Box::new(SampleReplicationDriver) as Box<dyn ReplicationDriver>),
        );
        registry.register_replication(
            DriverKind::HuaweiOceanStorBlock,
            Arc::new(|| Box::new(OceanStorReplicationDriver) as Box<dyn ReplicationDriver>),
        );
        registry.register_metrics(
            DriverKind::Sample,
            Arc::new(|| Box::new(SampleMetricDriver::default()) as Box<dyn MetricDriver>),
        );
        registry.register_metrics(
            DriverKind::HuaweiOceanStorBlock,
            Arc::new(|| Box::new(OceanStorMetricDriver::new()) as Box<dyn MetricDriver>),
        );
        registry
    }

    /// Registry without constructors
    pub fn empty() -> Self {
        Self {
            factories: HashMap::new(),
            file_share_factories: HashMap::new(),
            replication_factories: HashMap::new(),
            metric_factories: HashMap::new(),
            instances: Mutex::new(HashMap::new()),
        }
    }

    /// Install or replace the constructor of a block driver kind
    pub fn register(&mut self, kind: DriverKind, factory: DriverFactory) {
        self.factories.insert(kind, factory);
    }

    /// Install or replace the constructor of a file-share driver kind
    pub fn register_file_share(&mut self, kind: DriverKind, factory: FileShareFactory) {
        self.file_share_factories.insert(kind, factory);
    }

    pub fn register_replication(&mut self, kind: DriverKind, factory: ReplicationFactory) {
        self.replication_factories.insert(kind, factory);
    }

    pub fn register_metrics(&mut self, kind: DriverKind, factory: MetricFactory) {
        self.metric_factories.insert(kind, factory);
    }

    /// Return the driver of `dock_name`, building and configuring it on first use
    ///
    /// A driver whose setup fails is dropped, so the next call retries.
    pub async fn init(
        &self,
        kind: DriverKind,
        config_path: &str,
        dock_name: &str,
    ) -> Result<VolumeDriverRef> {
        let mut instances = self.instances.lock().await;
        if let Some(driver) = instances.get(dock_name) {
            debug!("Reusing {} driver of dock {}", kind, dock_name);
            return Ok(driver.clone());
        }

        if kind.is_file_share() {
            return Err(Error::Validation(format!(
                "{} is a file-share driver and has no block operations",
                kind
            )));
        }
        let factory = self
            .factories
            .get(&kind)
            .or_else(|| self.factories.get(&DriverKind::Sample))
            .ok_or_else(|| Error::BackendUnavailable {
                backend: kind.to_string(),
            })?;

        let mut driver = factory();
        if let Err(e) = driver.setup(config_path).await {
            error!("Setup of {} driver for dock {} failed: {}", kind, dock_name, e);
            return Err(e);
        }

        let driver: VolumeDriverRef = Arc::from(driver);
        instances.insert(dock_name.to_string(), driver.clone());
        info!("Initialized {} driver for dock {}", kind, dock_name);
        Ok(driver)
    }

    /// Build and configure a file-share driver; these are never cached
    pub async fn init_file_share(
        &self,
        kind: DriverKind,
        config_path: &str,
    ) -> Result<FileShareDriverRef> {
        let factory =
            self.file_share_factories
                .get(&kind)
                .ok_or_else(|| Error::BackendUnavailable {
                    backend: kind.to_string(),
                })?;

        let mut driver = factory();
        driver.setup(config_path).await?;
        Ok(Arc::from(driver))
    }

    /// Release a driver obtained from [`init`](Self::init)
    pub async fn clean(&self, driver: &VolumeDriverRef) -> Result<()> {
        if !driver.requires_teardown() {
            return Ok(());
        }
        driver.unset().await
    }

    pub async fn clean_file_share(&self, driver: &FileShareDriverRef) -> Result<()> {
        driver.unset().await
    }

    /// Forget the cached driver of a dock
    pub async fn remove(&self, dock_name: &str) -> Option<VolumeDriverRef> {
        self.instances.lock().await.remove(dock_name)
    }

    /// Number of cached drivers
    pub async fn cached(&self) -> usize {
        self.instances.lock().await.len()
    }

    /// Drop every cached driver and release its backend session
    pub async fn clean_all(&self) {
        let drained: Vec<(String, VolumeDriverRef)> =
            self.instances.lock().await.drain().collect();
        for (dock_name, driver) in drained {
            if let Err(e) = driver.unset().await {
                error!("Release driver of dock {} failed: {}", dock_name, e);
            }
        }
    }

    // =========================================================================
    // Replication & Metrics
    // =========================================================================

    /// Build and configure the replication driver of `kind`
    ///
    /// Kinds without a replication driver get the sample one.
    pub async fn init_replication(
        &self,
        kind: DriverKind,
        config_path: &str,
    ) -> Result<ReplicationDriverRef> {
        let factory = self
            .replication_factories
            .get(&kind)
            .or_else(|| self.replication_factories.get(&DriverKind::Sample))
            .ok_or_else(|| Error::BackendUnavailable {
                backend: kind.to_string(),
            })?;

        let mut driver = factory();
        driver.setup(config_path).await?;
        debug!("Initialized {} replication driver", kind);
        Ok(Arc::from(driver))
    }

    pub async fn clean_replication(&self, driver: &ReplicationDriverRef) -> Result<()> {
        driver.unset().await
    }

    /// Build and configure the metric driver of `kind`
    pub async fn init_metrics(&self, kind: DriverKind, config_path: &str) -> Result<MetricDriverRef> {
        let factory = self
            .metric_factories
            .get(&kind)
            .ok_or_else(|| Error::BackendUnavailable {
                backend: format!("{} metrics", kind),
            })?;

        let mut driver = factory();
        driver.setup(config_path).await?;
        debug!("Initialized {} metric driver", kind);
        Ok(Arc::from(driver))
    }

    pub async fn clean_metrics(&self, driver: &MetricDriverRef) -> Result<()> {
        driver.teardown().await
    }

    /// One collection through a freshly built metric driver of `kind`
    pub async fn collect_metrics(&self, kind: DriverKind, config_path: &str) -> Result<Vec<Metric>> {
        let driver = self.init_metrics(kind, config_path).await?;
        let collected = driver.collect_metrics().await;
        if let Err(e) = self.clean_metrics(&driver).await {
            error!("Teardown of {} metric driver failed: {}", kind, e);
        }
        collected
    }
}
