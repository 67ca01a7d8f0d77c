//! Provision Dock Discovery
//!
//! One dock per enabled backend. Every pass lists the pools of each dock
//! through its driver. Pools keep the id they were first persisted with,
//! matched by name within the dock, and pools that drop out of a listing
//! are reported unavailable instead of being deleted.

use super::{dock_id, DiscoveryMetrics, DockDiscoverer};
use crate::config::DockConfig;
use crate::controlplane::drivers::DriverKind;
use crate::controlplane::registry::DriverRegistry;
use crate::domain::model::{
    Dock, DockType, PoolStatus, ReplicationType, StoragePool, KEY_HOST_REPLICATION_DRIVER,
};
use crate::error::{Error, Result};
use crate::store::{ListOptions, StoreRef};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::{error, info, warn};

pub struct ProvisionDockDiscoverer {
    config: Arc<DockConfig>,
    registry: Arc<DriverRegistry>,
    store: StoreRef,
    metrics: Option<DiscoveryMetrics>,
    hostname: String,
    /// Backend config path per dock name
    config_paths: HashMap<String, String>,
    docks: Vec<Dock>,
    pools: Vec<StoragePool>,
}

impl ProvisionDockDiscoverer {
    pub fn new(config: Arc<DockConfig>, registry: Arc<DriverRegistry>, store: StoreRef) -> Self {
        let hostname = config.hostname();
        Self {
            config,
            registry,
            store,
            metrics: None,
            hostname,
            config_paths: HashMap::new(),
            docks: Vec::new(),
            pools: Vec::new(),
        }
    }

    pub fn with_metrics(mut self, metrics: DiscoveryMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn docks(&self) -> &[Dock] {
        &self.docks
    }

    /// Pools found by the last pass, unavailable ones included
    pub fn pools(&self) -> &[StoragePool] {
        &self.pools
    }

    async fn list_dock_pools(&self, dock: &Dock) -> Result<Vec<StoragePool>> {
        let kind = DriverKind::from_name(&dock.driver_name);
        let config_path = self
            .config_paths
            .get(&dock.name)
            .map(String::as_str)
            .unwrap_or_default();

        if kind.is_file_share() {
            let driver = self.registry.init_file_share(kind, config_path).await?;
            let listed = driver.list_pools().await;
            if let Err(e) = self.registry.clean_file_share(&driver).await {
                warn!("Clean {} driver of dock {} failed: {}", kind, dock.name, e);
            }
            return listed;
        }

        let driver = self.registry.init(kind, config_path, &dock.name).await?;
        let listed = driver.list_pools().await;
        if let Err(e) = self.registry.clean(&driver).await {
            warn!("Clean {} driver of dock {} failed: {}", kind, dock.name, e);
        }
        let mut pools = listed?;

        let (replication_type, replication_driver) =
            if self.config.supports_array_replication(&dock.name) {
                (ReplicationType::Array, dock.driver_name.clone())
            } else {
                (
                    ReplicationType::Host,
                    dock.metadata
                        .get(KEY_HOST_REPLICATION_DRIVER)
                        .cloned()
                        .unwrap_or_default(),
                )
            };

        for pool in &mut pools {
            let persisted = self
                .store
                .list_pools(
                    &ListOptions::default()
                        .filter("name", pool.name.clone())
                        .filter("dockId", dock.id.clone()),
                )
                .await;
            if let Some(existing) = persisted.ok().and_then(|p| p.into_iter().next()) {
                pool.id = existing.id;
            }
            pool.replication_type = replication_type;
            pool.replication_driver_name = replication_driver.clone();
        }
        Ok(pools)
    }
}

#[async_trait]
impl DockDiscoverer for ProvisionDockDiscoverer {
    async fn init(&mut self) -> Result<()> {
        self.docks.clear();
        for backend in self.config.enabled() {
            self.config_paths
                .insert(backend.name.clone(), backend.config_path.clone());

            let mut dock = Dock {
                id: dock_id(&self.hostname, &backend.name),
                name: backend.name.clone(),
                description: backend.description.clone(),
                driver_name: backend.driver_name.clone(),
                endpoint: self.config.api_endpoint.clone(),
                node_id: self.hostname.clone(),
                dock_type: DockType::Provisioner,
                metadata: BTreeMap::from([(
                    KEY_HOST_REPLICATION_DRIVER.to_string(),
                    self.config.host_based_replication_driver.clone(),
                )]),
                created_at: None,
                updated_at: None,
            };

            let persisted = self
                .store
                .list_docks(&ListOptions::default().filter("name", dock.name.clone()))
                .await;
            if let Some(existing) = persisted.ok().and_then(|d| d.into_iter().next()) {
                dock.id = existing.id;
            }

            info!("Serving backend {} as dock {}", dock.name, dock.id);
            self.docks.push(dock);
        }
        Ok(())
    }

    async fn discover(&mut self) -> Result<()> {
        self.pools.clear();

        let persisted = self
            .store
            .list_pools(&ListOptions::default())
            .await
            .map_err(|e| Error::Internal(format!("can not read pools in db: {}", e)))?;

        let mut stale: HashMap<String, BTreeMap<String, StoragePool>> = self
            .docks
            .iter()
            .map(|d| (d.id.clone(), BTreeMap::new()))
            .collect();
        for mut pool in persisted {
            if let Some(of_dock) = stale.get_mut(&pool.dock_id) {
                pool.status = PoolStatus::Unavailable;
                of_dock.insert(pool.id.clone(), pool);
            }
        }

        let mut found = Vec::new();
        for dock in &self.docks {
            let pools = match self.list_dock_pools(dock).await {
                Ok(pools) => pools,
                Err(e) => {
                    error!(
                        "List pools of dock {} ({}) failed: {}",
                        dock.name, dock.driver_name, e
                    );
                    continue;
                }
            };
            if pools.is_empty() {
                warn!("The pool of dock {} is empty!", dock.id);
            }

            let of_dock = stale.entry(dock.id.clone()).or_default();
            for mut pool in pools {
                info!("Backend {} discovered pool {}", dock.driver_name, pool.name);
                of_dock.remove(&pool.id);
                pool.dock_id = dock.id.clone();
                pool.status = PoolStatus::Available;
                found.push(pool);
            }
            found.extend(std::mem::take(of_dock).into_values());
        }

        let unavailable = found
            .iter()
            .filter(|p| p.status == PoolStatus::Unavailable)
            .count();
        if let Some(metrics) = &self.metrics {
            metrics
                .discovered_pools
                .set((found.len() - unavailable) as i64);
            metrics.unavailable_pools.set(unavailable as i64);
        }

        if found.is_empty() {
            return Err(Error::NoPoolsDiscovered);
        }
        self.pools = found;
        Ok(())
    }

    async fn report(&mut self) -> Result<()> {
        for dock in &self.docks {
            if let Err(e) = self.store.create_dock(dock.clone()).await {
                error!("When create dock {} in db: {}", dock.id, e);
                return Err(e);
            }
        }
        for pool in &self.pools {
            if let Err(e) = self.store.create_pool(pool.clone()).await {
                error!("When create pool {} in db: {}", pool.id, e);
                return Err(e);
            }
        }
        Ok(())
    }
}
