//! Dock Service - Provisioning operations of a dock
//!
//! Resolves the driver serving a request through the owning dock, runs the
//! driver operation and persists the outcome:
//! - Volumes: create, delete, extend
//! - Attachments: create, delete (zoning through the driver)
//! - Snapshots: create, delete
//! - Replication: create, delete, enable, disable, failover
//! - Metrics: one collection per dock
//!
//! Every record passes through a transitional status before the driver is
//! called, and lands in either its settled status or an error status.

use crate::config::DockConfig;
use crate::controlplane::drivers::DriverKind;
use crate::controlplane::registry::DriverRegistry;
use crate::domain::model::{
    AccessProtocol, AttachMode, AttachmentStatus, Metric, Replication, ReplicationType,
    SnapshotStatus, Volume, VolumeAttachment, VolumeSnapshot, VolumeStatus,
};
use crate::domain::ports::{
    CreateReplicationOpts, CreateVolumeAttachmentOpts, CreateVolumeOpts,
    CreateVolumeSnapshotOpts, DeleteVolumeOpts, DeleteVolumeSnapshotOpts, ExtendVolumeOpts,
    ReplicationDriverRef, ReplicationOpts, VolumeDriverRef,
};
use crate::error::{Error, Result};
use crate::store::{ListOptions, StoreRef};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Callers may leave record ids empty and have one assigned
fn assign_id(id: &mut String) {
    if id.is_empty() {
        *id = Uuid::new_v4().to_string();
    }
}

// =============================================================================
// Requests
// =============================================================================

/// Attach a volume to a registered host
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttachVolumeRequest {
    pub id: String,
    pub volume_id: String,
    pub host_id: String,
    #[serde(default)]
    pub attach_mode: AttachMode,
    #[serde(default)]
    pub context: String,
}

/// Detach a volume by attachment id
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetachVolumeRequest {
    pub id: String,
    #[serde(default)]
    pub context: String,
}

// =============================================================================
// Dock Service
// =============================================================================

pub struct DockService {
    config: Arc<DockConfig>,
    registry: Arc<DriverRegistry>,
    store: StoreRef,
    /// Serializes attach and detach of one volume
    volume_locks: DashMap<String, Arc<Mutex<()>>>,
}

impl DockService {
    pub fn new(config: Arc<DockConfig>, registry: Arc<DriverRegistry>, store: StoreRef) -> Self {
        Self {
            config,
            registry,
            store,
            volume_locks: DashMap::new(),
        }
    }

    fn volume_lock(&self, volume_id: &str) -> Arc<Mutex<()>> {
        self.volume_locks
            .entry(volume_id.to_string())
            .or_default()
            .clone()
    }

    /// Run `op` against the driver of `dock_id`, releasing the driver afterwards
    async fn with_driver<T, F, Fut>(&self, dock_id: &str, op: F) -> Result<T>
    where
        F: FnOnce(VolumeDriverRef) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let dock = self.store.get_dock(dock_id).await?;
        let kind = DriverKind::from_name(&dock.driver_name);
        let config_path = self
            .config
            .backend(&dock.name)
            .map(|b| b.config_path.as_str())
            .unwrap_or_default();

        let driver = self.registry.init(kind, config_path, &dock.name).await?;
        let result = op(driver.clone()).await;
        if let Err(e) = self.registry.clean(&driver).await {
            warn!("Clean {} driver of dock {} failed: {}", kind, dock.name, e);
        }
        result
    }

    async fn dock_of_pool(&self, pool_id: &str) -> Result<String> {
        Ok(self.store.get_pool(pool_id).await?.dock_id)
    }

    // =========================================================================
    // Volumes
    // =========================================================================

    pub async fn create_volume(&self, mut opts: CreateVolumeOpts) -> Result<Volume> {
        assign_id(&mut opts.id);
        let pool = self.store.get_pool(&opts.pool_id).await?;
        if opts.dock_id.is_empty() {
            opts.dock_id = pool.dock_id.clone();
        }
        if opts.pool_name.is_empty() {
            opts.pool_name = pool.name.clone();
        }
        if opts.size <= 0 {
            return Err(Error::Validation(format!(
                "volume size must be positive, got {}",
                opts.size
            )));
        }
        if let Some(snapshot_id) = opts.snapshot_id.as_deref().filter(|s| !s.is_empty()) {
            let snapshot = self.store.get_snapshot(snapshot_id).await?;
            if snapshot.status != SnapshotStatus::Available {
                return Err(Error::Validation(format!(
                    "snapshot {} is not available",
                    snapshot_id
                )));
            }
        }

        let mut record = self
            .store
            .create_volume(Volume {
                id: opts.id.clone(),
                tenant_id: opts.tenant_id.clone(),
                name: opts.name.clone(),
                description: opts.description.clone(),
                size: opts.size,
                availability_zone: opts.availability_zone.clone(),
                status: VolumeStatus::Creating,
                pool_id: opts.pool_id.clone(),
                profile_id: opts.profile_id.clone(),
                snapshot_id: opts.snapshot_id.clone().unwrap_or_default(),
                metadata: opts.metadata.clone(),
                multi_attach: pool.multi_attach,
                ..Default::default()
            })
            .await?;

        let dock_id = opts.dock_id.clone();
        let created = self
            .with_driver(&dock_id, |driver| async move { driver.create_volume(&opts).await })
            .await;

        match created {
            Ok(volume) => {
                record.metadata.extend(volume.metadata);
                record.identifier = volume.identifier;
                record.size = volume.size;
                record.status = VolumeStatus::Available;
                let record = self.store.update_volume(record).await?;
                info!("Created volume {} in pool {}", record.id, record.pool_id);
                Ok(record)
            }
            Err(e) => {
                error!("Create volume {} failed: {}", record.id, e);
                record.status = VolumeStatus::Error;
                self.store.update_volume(record).await?;
                Err(e)
            }
        }
    }

    pub async fn delete_volume(&self, opts: DeleteVolumeOpts) -> Result<()> {
        let mut record = self.store.get_volume(&opts.id).await?;
        if record.attached {
            return Err(Error::Validation(format!(
                "volume {} is attached and can not be deleted",
                record.id
            )));
        }
        let snapshots = self
            .store
            .list_snapshots(&ListOptions::default().filter("volumeId", record.id.clone()))
            .await?;
        if !snapshots.is_empty() {
            return Err(Error::Validation(format!(
                "volume {} still has {} snapshot(s)",
                record.id,
                snapshots.len()
            )));
        }

        let dock_id = if opts.dock_id.is_empty() {
            self.dock_of_pool(&record.pool_id).await?
        } else {
            opts.dock_id.clone()
        };
        record.status = VolumeStatus::Deleting;
        let record = self.store.update_volume(record).await?;

        let opts = DeleteVolumeOpts {
            metadata: record.metadata.clone(),
            dock_id: dock_id.clone(),
            ..opts
        };
        let deleted = self
            .with_driver(&dock_id, |driver| async move { driver.delete_volume(&opts).await })
            .await;

        match deleted {
            Ok(()) => {
                self.store.delete_volume(&record.id).await?;
                self.volume_locks.remove(&record.id);
                info!("Deleted volume {}", record.id);
                Ok(())
            }
            Err(e) => {
                error!("Delete volume {} failed: {}", record.id, e);
                let mut record = record;
                record.status = VolumeStatus::ErrorDeleting;
                self.store.update_volume(record).await?;
                Err(e)
            }
        }
    }

    pub async fn extend_volume(&self, opts: ExtendVolumeOpts) -> Result<Volume> {
        let mut record = self.store.get_volume(&opts.id).await?;
        if !matches!(record.status, VolumeStatus::Available | VolumeStatus::InUse) {
            return Err(Error::Validation(format!(
                "volume {} is {:?}, only available or in-use volumes can be extended",
                record.id, record.status
            )));
        }
        if opts.size <= record.size {
            return Err(Error::Validation(format!(
                "new size {} must exceed current size {}",
                opts.size, record.size
            )));
        }

        let dock_id = if opts.dock_id.is_empty() {
            self.dock_of_pool(&record.pool_id).await?
        } else {
            opts.dock_id.clone()
        };
        let settled = record.status;
        record.status = VolumeStatus::Extending;
        let mut record = self.store.update_volume(record).await?;

        let opts = ExtendVolumeOpts {
            metadata: record.metadata.clone(),
            dock_id: dock_id.clone(),
            ..opts
        };
        let extended = self
            .with_driver(&dock_id, |driver| async move { driver.extend_volume(&opts).await })
            .await;

        match extended {
            Ok(volume) => {
                record.size = volume.size;
                record.status = settled;
                let record = self.store.update_volume(record).await?;
                info!("Extended volume {} to {}GB", record.id, record.size);
                Ok(record)
            }
            Err(e) => {
                error!("Extend volume {} failed: {}", record.id, e);
                record.status = VolumeStatus::ErrorExtending;
                self.store.update_volume(record).await?;
                Err(e)
            }
        }
    }

    // =========================================================================
    // Attachments
    // =========================================================================

    pub async fn create_volume_attachment(
        &self,
        mut req: AttachVolumeRequest,
    ) -> Result<VolumeAttachment> {
        assign_id(&mut req.id);
        let lock = self.volume_lock(&req.volume_id);
        let _guard = lock.lock().await;

        let volume = self.store.get_volume(&req.volume_id).await?;
        let attachable = volume.status == VolumeStatus::Available
            || (volume.status == VolumeStatus::InUse && volume.multi_attach);
        if !attachable {
            return Err(Error::Validation(format!(
                "volume {} is {:?} and can not be attached",
                volume.id, volume.status
            )));
        }
        if volume.attached && !volume.multi_attach {
            return Err(Error::Validation(format!(
                "volume {} is already attached and does not allow multi-attach",
                volume.id
            )));
        }

        let existing = self
            .store
            .list_attachments(
                &ListOptions::default()
                    .filter("volumeId", volume.id.clone())
                    .filter("hostId", req.host_id.clone()),
            )
            .await?;
        if !existing.is_empty() {
            return Err(Error::ResourceExists {
                kind: "volume attachment".into(),
                name: format!("{}@{}", volume.id, req.host_id),
            });
        }

        let host = self.store.get_host(&req.host_id).await?;
        let pool = self.store.get_pool(&volume.pool_id).await?;
        let access_protocol = pool
            .extras
            .io_connectivity
            .access_protocol
            .unwrap_or(AccessProtocol::Iscsi);

        let mut record = self
            .store
            .create_attachment(VolumeAttachment {
                id: req.id.clone(),
                host_id: host.id.clone(),
                volume_id: volume.id.clone(),
                access_protocol,
                attach_mode: req.attach_mode,
                status: AttachmentStatus::Creating,
                connection_info: None,
                created_at: None,
                updated_at: None,
            })
            .await?;

        let opts = CreateVolumeAttachmentOpts {
            id: req.id,
            volume_id: volume.id.clone(),
            pool_id: pool.id.clone(),
            access_protocol,
            host_info: host.host_info(),
            metadata: volume.metadata.clone(),
            dock_id: pool.dock_id.clone(),
            driver_name: String::new(),
            context: req.context,
        };
        let connected = self
            .with_driver(&pool.dock_id, |driver| async move {
                driver.initialize_connection(&opts).await
            })
            .await;

        match connected {
            Ok(info) => {
                record.connection_info = Some(info);
                record.status = AttachmentStatus::Available;
                let record = self.store.update_attachment(record).await?;

                let mut volume = volume;
                volume.attached = true;
                volume.status = VolumeStatus::InUse;
                self.store.update_volume(volume).await?;

                info!(
                    "Attached volume {} to host {} over {}",
                    record.volume_id, host.host_name, access_protocol
                );
                Ok(record)
            }
            Err(e) => {
                error!(
                    "Attach volume {} to host {} failed: {}",
                    volume.id, host.host_name, e
                );
                record.status = AttachmentStatus::Error;
                self.store.update_attachment(record).await?;
                Err(e)
            }
        }
    }

    pub async fn delete_volume_attachment(&self, req: DetachVolumeRequest) -> Result<()> {
        let record = self.store.get_attachment(&req.id).await?;
        let lock = self.volume_lock(&record.volume_id);
        let _guard = lock.lock().await;

        let mut record = self.store.get_attachment(&req.id).await?;
        let volume = self.store.get_volume(&record.volume_id).await?;
        let host = self.store.get_host(&record.host_id).await?;
        let pool = self.store.get_pool(&volume.pool_id).await?;

        record.status = AttachmentStatus::Deleting;
        let mut record = self.store.update_attachment(record).await?;

        let opts = CreateVolumeAttachmentOpts {
            id: record.id.clone(),
            volume_id: volume.id.clone(),
            pool_id: pool.id.clone(),
            access_protocol: record.access_protocol,
            host_info: host.host_info(),
            metadata: volume.metadata.clone(),
            dock_id: pool.dock_id.clone(),
            driver_name: String::new(),
            context: req.context,
        };
        let terminated = self
            .with_driver(&pool.dock_id, |driver| async move {
                driver.terminate_connection(&opts).await
            })
            .await;

        if let Err(e) = terminated {
            error!(
                "Detach volume {} from host {} failed: {}",
                volume.id, host.host_name, e
            );
            record.status = AttachmentStatus::ErrorDeleting;
            self.store.update_attachment(record).await?;
            return Err(e);
        }

        self.store.delete_attachment(&record.id).await?;
        let remaining = self
            .store
            .list_attachments(&ListOptions::default().filter("volumeId", volume.id.clone()))
            .await?;
        if remaining.is_empty() {
            let mut volume = volume;
            volume.attached = false;
            volume.status = VolumeStatus::Available;
            self.store.update_volume(volume).await?;
        }
        info!("Detached volume {} from host {}", record.volume_id, host.host_name);
        Ok(())
    }

    // =========================================================================
    // Snapshots
    // =========================================================================

    pub async fn create_snapshot(
        &self,
        mut opts: CreateVolumeSnapshotOpts,
    ) -> Result<VolumeSnapshot> {
        assign_id(&mut opts.id);
        let volume = self.store.get_volume(&opts.volume_id).await?;
        if !matches!(volume.status, VolumeStatus::Available | VolumeStatus::InUse) {
            return Err(Error::Validation(format!(
                "volume {} is {:?} and can not be snapshotted",
                volume.id, volume.status
            )));
        }
        let dock_id = if opts.dock_id.is_empty() {
            self.dock_of_pool(&volume.pool_id).await?
        } else {
            opts.dock_id.clone()
        };

        let mut record = self
            .store
            .create_snapshot(VolumeSnapshot {
                id: opts.id.clone(),
                tenant_id: volume.tenant_id.clone(),
                name: opts.name.clone(),
                description: opts.description.clone(),
                volume_id: volume.id.clone(),
                size: 0,
                status: SnapshotStatus::Creating,
                ..Default::default()
            })
            .await?;

        let opts = CreateVolumeSnapshotOpts {
            metadata: volume.metadata.clone(),
            dock_id: dock_id.clone(),
            ..opts
        };
        let created = self
            .with_driver(&dock_id, |driver| async move { driver.create_snapshot(&opts).await })
            .await;

        match created {
            Ok(snapshot) => {
                record.metadata = snapshot.metadata;
                record.size = snapshot.size;
                record.status = SnapshotStatus::Available;
                let record = self.store.update_snapshot(record).await?;
                info!("Created snapshot {} of volume {}", record.id, record.volume_id);
                Ok(record)
            }
            Err(e) => {
                error!("Create snapshot {} failed: {}", record.id, e);
                record.status = SnapshotStatus::Error;
                self.store.update_snapshot(record).await?;
                Err(e)
            }
        }
    }

    pub async fn delete_snapshot(&self, opts: DeleteVolumeSnapshotOpts) -> Result<()> {
        let mut record = self.store.get_snapshot(&opts.id).await?;
        let dock_id = if opts.dock_id.is_empty() {
            let volume = self.store.get_volume(&record.volume_id).await?;
            self.dock_of_pool(&volume.pool_id).await?
        } else {
            opts.dock_id.clone()
        };

        record.status = SnapshotStatus::Deleting;
        let mut record = self.store.update_snapshot(record).await?;

        let opts = DeleteVolumeSnapshotOpts {
            volume_id: record.volume_id.clone(),
            metadata: record.metadata.clone(),
            dock_id: dock_id.clone(),
            ..opts
        };
        let deleted = self
            .with_driver(&dock_id, |driver| async move { driver.delete_snapshot(&opts).await })
            .await;

        match deleted {
            Ok(()) => {
                self.store.delete_snapshot(&record.id).await?;
                info!("Deleted snapshot {}", record.id);
                Ok(())
            }
            Err(e) => {
                error!("Delete snapshot {} failed: {}", record.id, e);
                record.status = SnapshotStatus::ErrorDeleting;
                self.store.update_snapshot(record).await?;
                Err(e)
            }
        }
    }

    // =========================================================================
    // Replication
    // =========================================================================

    /// Run `op` against the replication driver serving `primary_volume_id`
    ///
    /// Pools replicated by their array use the array's driver and backend
    /// config; the rest use the host-based driver named on the pool.
    async fn with_replication_driver<T, F, Fut>(
        &self,
        primary_volume_id: &str,
        op: F,
    ) -> Result<(ReplicationType, T)>
    where
        F: FnOnce(ReplicationDriverRef) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let volume = self.store.get_volume(primary_volume_id).await?;
        let pool = self.store.get_pool(&volume.pool_id).await?;
        let kind = DriverKind::from_name(&pool.replication_driver_name);
        let config_path = match pool.replication_type {
            ReplicationType::Array => {
                let dock = self.store.get_dock(&pool.dock_id).await?;
                self.config
                    .backend(&dock.name)
                    .map(|b| b.config_path.clone())
                    .unwrap_or_default()
            }
            ReplicationType::Host => String::new(),
        };

        let driver = self.registry.init_replication(kind, &config_path).await?;
        let result = op(driver.clone()).await;
        if let Err(e) = self.registry.clean_replication(&driver).await {
            warn!("Clean {} replication driver failed: {}", kind, e);
        }
        result.map(|value| (pool.replication_type, value))
    }

    pub async fn create_replication(&self, mut opts: CreateReplicationOpts) -> Result<Replication> {
        assign_id(&mut opts.id);
        let primary = self.store.get_volume(&opts.primary_volume_id).await?;
        let secondary = self.store.get_volume(&opts.secondary_volume_id).await?;
        for volume in [&primary, &secondary] {
            if !matches!(volume.status, VolumeStatus::Available | VolumeStatus::InUse) {
                return Err(Error::Validation(format!(
                    "volume {} is {:?} and can not be replicated",
                    volume.id, volume.status
                )));
            }
        }
        opts.primary_volume_metadata = primary.metadata.clone();
        opts.secondary_volume_metadata = secondary.metadata.clone();

        let replicated = self
            .with_replication_driver(&primary.id, |driver| async move {
                driver.create_replication(&opts).await
            })
            .await;
        match replicated {
            Ok((replication_type, mut replication)) => {
                replication.replication_type = replication_type;
                info!(
                    "Replicating volume {} to {} ({:?})",
                    primary.id, secondary.id, replication_type
                );
                Ok(replication)
            }
            Err(e) => {
                error!("Replicate volume {} failed: {}", primary.id, e);
                Err(e)
            }
        }
    }

    pub async fn delete_replication(&self, opts: ReplicationOpts) -> Result<()> {
        let volume_id = opts.primary_volume_id.clone();
        self.with_replication_driver(&volume_id, |driver| async move {
            driver.delete_replication(&opts).await
        })
        .await?;
        info!("Deleted replication of volume {}", volume_id);
        Ok(())
    }

    pub async fn enable_replication(&self, opts: ReplicationOpts) -> Result<()> {
        let volume_id = opts.primary_volume_id.clone();
        self.with_replication_driver(&volume_id, |driver| async move {
            driver.enable_replication(&opts).await
        })
        .await?;
        info!("Enabled replication of volume {}", volume_id);
        Ok(())
    }

    pub async fn disable_replication(&self, opts: ReplicationOpts) -> Result<()> {
        let volume_id = opts.primary_volume_id.clone();
        self.with_replication_driver(&volume_id, |driver| async move {
            driver.disable_replication(&opts).await
        })
        .await?;
        info!("Disabled replication of volume {}", volume_id);
        Ok(())
    }

    pub async fn failover_replication(&self, opts: ReplicationOpts) -> Result<()> {
        let volume_id = opts.primary_volume_id.clone();
        let volume = self.store.get_volume(&volume_id).await?;
        if volume.attached && !opts.allow_attached_volume {
            return Err(Error::Validation(format!(
                "volume {} is attached; failover needs allowAttachedVolume",
                volume_id
            )));
        }
        self.with_replication_driver(&volume_id, |driver| async move {
            driver.failover_replication(&opts).await
        })
        .await?;
        info!("Failed over replication of volume {}", volume_id);
        Ok(())
    }

    // =========================================================================
    // Metrics & Lifecycle
    // =========================================================================

    /// Collect backend metrics of one dock
    pub async fn collect_metrics(&self, dock_id: &str) -> Result<Vec<Metric>> {
        let dock = self.store.get_dock(dock_id).await?;
        let kind = DriverKind::from_name(&dock.driver_name);
        let config_path = self
            .config
            .backend(&dock.name)
            .map(|b| b.config_path.as_str())
            .unwrap_or_default();
        self.registry.collect_metrics(kind, config_path).await
    }

    /// Release every driver this process configured
    pub async fn shutdown(&self) {
        self.registry.clean_all().await;
        info!("Released storage drivers");
    }
}
