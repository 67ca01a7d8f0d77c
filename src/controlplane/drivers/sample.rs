//! Sample Drivers
//!
//! In-memory block, file-share, replication and metric drivers. They back
//! docks whose driver name is `sample` (or unknown) and let a dock run end
//! to end without an array.

use super::pool_capacity_metrics;
use crate::domain::model::{
    AccessProtocol, ConnectionInfo, FibreChannelConnection, IscsiConnection, Metric,
    PoolExtras, PoolStatus, Replication, ReplicationStatus, ReplicationType, StoragePool,
    Volume, VolumeSnapshot, VolumeStatus, SnapshotStatus, DEFAULT_AVAILABILITY_ZONE,
    KEY_LUN_ID, KEY_SNAPSHOT_ID,
};
use crate::domain::ports::{
    CreateReplicationOpts, CreateVolumeAttachmentOpts, CreateVolumeOpts,
    CreateVolumeSnapshotOpts, DeleteVolumeAttachmentOpts, DeleteVolumeOpts,
    DeleteVolumeSnapshotOpts, ExtendVolumeOpts, FileShareDriver, MetricDriver, PoolSource,
    ReplicationDriver, ReplicationOpts, VolumeDriver,
};
use crate::error::{Error, Result};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicI64, AtomicU32, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};

const SAMPLE_TARGET_IQN: &str = "iqn.2017-10.io.opensds:volume:00000001";
const SAMPLE_TARGET_PORTAL: &str = "127.0.0.1:3260";
const SAMPLE_TARGET_WWN: &str = "4201378dcd5a7db8";

/// Replication metadata key naming the pair on the sample backend
pub const KEY_SAMPLE_PAIR_ID: &str = "samplePairId";

fn sample_pool(id: &str, name: &str, total: i64, free: i64, storage_type: &str) -> StoragePool {
    StoragePool {
        id: id.into(),
        name: name.into(),
        total_capacity: total,
        free_capacity: free,
        availability_zone: DEFAULT_AVAILABILITY_ZONE.into(),
        storage_type: storage_type.into(),
        extras: PoolExtras::default(),
        status: PoolStatus::Available,
        ..Default::default()
    }
}

// =============================================================================
// Block Driver
// =============================================================================

/// In-memory block driver
#[derive(Default)]
pub struct SampleDriver {
    volumes: RwLock<BTreeMap<String, Volume>>,
    snapshots: RwLock<BTreeMap<String, VolumeSnapshot>>,
    next_lun: AtomicI64,
    unset_calls: Arc<AtomicU32>,
}

impl SampleDriver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Driver counting its `unset` calls into a shared counter
    pub fn with_unset_counter(unset_calls: Arc<AtomicU32>) -> Self {
        Self {
            unset_calls,
            ..Self::default()
        }
    }

    /// Number of `unset` calls seen so far
    pub fn unset_calls(&self) -> u32 {
        self.unset_calls.load(Ordering::SeqCst)
    }

    async fn volume(&self, id: &str) -> Result<Volume> {
        self.volumes
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| Error::not_found("volume", id))
    }
}

#[async_trait]
impl PoolSource for SampleDriver {
    async fn list_pools(&self) -> Result<Vec<StoragePool>> {
        Ok(vec![
            sample_pool(
                "084bf71e-a102-11e7-88a8-e31fe6d52248",
                "sample-pool-01",
                100,
                90,
                "block",
            ),
            sample_pool(
                "a594b8ac-a103-11e7-985f-d723bcf01b5f",
                "sample-pool-02",
                200,
                170,
                "block",
            ),
        ])
    }
}

#[async_trait]
impl VolumeDriver for SampleDriver {
    async fn setup(&mut self, config_path: &str) -> Result<()> {
        debug!("Sample driver setup, config = {:?}", config_path);
        Ok(())
    }

    async fn unset(&self) -> Result<()> {
        self.unset_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn create_volume(&self, opts: &CreateVolumeOpts) -> Result<Volume> {
        let lun_id = self.next_lun.fetch_add(1, Ordering::SeqCst);
        let volume = Volume {
            id: opts.id.clone(),
            tenant_id: opts.tenant_id.clone(),
            name: opts.name.clone(),
            description: opts.description.clone(),
            size: opts.size,
            availability_zone: opts.availability_zone.clone(),
            status: VolumeStatus::Available,
            pool_id: opts.pool_id.clone(),
            profile_id: opts.profile_id.clone(),
            snapshot_id: opts.snapshot_id.clone().unwrap_or_default(),
            metadata: BTreeMap::from([(KEY_LUN_ID.to_string(), lun_id.to_string())]),
            ..Default::default()
        };
        self.volumes
            .write()
            .await
            .insert(volume.id.clone(), volume.clone());
        info!("Sample driver created volume {}", volume.id);
        Ok(volume)
    }

    async fn pull_volume(&self, volume_id: &str) -> Result<Volume> {
        self.volume(volume_id).await
    }

    async fn delete_volume(&self, opts: &DeleteVolumeOpts) -> Result<()> {
        self.volumes
            .write()
            .await
            .remove(&opts.id)
            .map(|_| ())
            .ok_or_else(|| Error::not_found("volume", &opts.id))
    }

    async fn extend_volume(&self, opts: &ExtendVolumeOpts) -> Result<Volume> {
        let mut volumes = self.volumes.write().await;
        let volume = volumes
            .get_mut(&opts.id)
            .ok_or_else(|| Error::not_found("volume", &opts.id))?;
        if opts.size <= volume.size {
            return Err(Error::Validation(format!(
                "new size {} must exceed current size {}",
                opts.size, volume.size
            )));
        }
        volume.size = opts.size;
        Ok(volume.clone())
    }

    async fn initialize_connection(
        &self,
        opts: &CreateVolumeAttachmentOpts,
    ) -> Result<ConnectionInfo> {
        let volume = self.volume(&opts.volume_id).await?;
        let target_lun = volume
            .lun_id()
            .and_then(|l| l.parse().ok())
            .unwrap_or_default();

        Ok(match opts.access_protocol {
            AccessProtocol::Iscsi => ConnectionInfo::Iscsi(IscsiConnection {
                target_discovered: true,
                target_iqns: vec![SAMPLE_TARGET_IQN.into()],
                target_portals: vec![SAMPLE_TARGET_PORTAL.into()],
                target_lun,
                discard: false,
            }),
            AccessProtocol::FibreChannel => {
                let initiators = opts
                    .host_info
                    .initiators_by_protocol(AccessProtocol::FibreChannel);
                ConnectionInfo::FibreChannel(FibreChannelConnection {
                    target_discovered: true,
                    target_wwns: vec![SAMPLE_TARGET_WWN.into()],
                    volume_id: opts.volume_id.clone(),
                    initiator_target_map: initiators
                        .into_iter()
                        .map(|wwn| (wwn, vec![SAMPLE_TARGET_WWN.to_string()]))
                        .collect(),
                    host_name: opts.host_info.host.clone(),
                    target_lun,
                })
            }
        })
    }

    async fn terminate_connection(&self, _opts: &DeleteVolumeAttachmentOpts) -> Result<()> {
        Ok(())
    }

    async fn create_snapshot(&self, opts: &CreateVolumeSnapshotOpts) -> Result<VolumeSnapshot> {
        self.volume(&opts.volume_id).await?;
        let snapshot = VolumeSnapshot {
            id: opts.id.clone(),
            name: opts.name.clone(),
            description: opts.description.clone(),
            volume_id: opts.volume_id.clone(),
            size: 0,
            status: SnapshotStatus::Available,
            metadata: BTreeMap::from([(KEY_SNAPSHOT_ID.to_string(), opts.id.clone())]),
            ..Default::default()
        };
        self.snapshots
            .write()
            .await
            .insert(snapshot.id.clone(), snapshot.clone());
        Ok(snapshot)
    }

    async fn pull_snapshot(&self, snapshot_id: &str) -> Result<VolumeSnapshot> {
        self.snapshots
            .read()
            .await
            .get(snapshot_id)
            .cloned()
            .ok_or_else(|| Error::not_found("snapshot", snapshot_id))
    }

    async fn delete_snapshot(&self, opts: &DeleteVolumeSnapshotOpts) -> Result<()> {
        self.snapshots
            .write()
            .await
            .remove(&opts.id)
            .map(|_| ())
            .ok_or_else(|| Error::not_found("snapshot", &opts.id))
    }
}

// =============================================================================
// File Share Driver
// =============================================================================

/// File-share driver reporting one fixed pool
#[derive(Debug, Default)]
pub struct SampleFileShareDriver;

#[async_trait]
impl PoolSource for SampleFileShareDriver {
    async fn list_pools(&self) -> Result<Vec<StoragePool>> {
        Ok(vec![sample_pool(
            "b6e4d93c-a104-11e7-9ec0-2f0d3ce2a8e1",
            "sample-share-pool",
            300,
            280,
            "file",
        )])
    }
}

#[async_trait]
impl FileShareDriver for SampleFileShareDriver {
    async fn setup(&mut self, _config_path: &str) -> Result<()> {
        Ok(())
    }

    async fn unset(&self) -> Result<()> {
        Ok(())
    }
}

// =============================================================================
// Replication Driver
// =============================================================================

/// Replication driver that accepts every request
///
/// Used for host-based replication hints it does not know and for block
/// kinds without array replication.
#[derive(Debug, Default)]
pub struct SampleReplicationDriver;

impl SampleReplicationDriver {
    fn pair_id(opts: &ReplicationOpts) -> Result<&str> {
        opts.metadata
            .get(KEY_SAMPLE_PAIR_ID)
            .map(String::as_str)
            .ok_or_else(|| Error::InvalidMetadata(format!("missing {}", KEY_SAMPLE_PAIR_ID)))
    }
}

#[async_trait]
impl ReplicationDriver for SampleReplicationDriver {
    async fn setup(&mut self, config_path: &str) -> Result<()> {
        debug!("Sample replication driver setup, config = {:?}", config_path);
        Ok(())
    }

    async fn unset(&self) -> Result<()> {
        Ok(())
    }

    async fn create_replication(&self, opts: &CreateReplicationOpts) -> Result<Replication> {
        if opts.primary_volume_id == opts.secondary_volume_id {
            return Err(Error::Validation(
                "primary and secondary volume must differ".into(),
            ));
        }
        info!(
            "Sample driver replicating {} to {}",
            opts.primary_volume_id, opts.secondary_volume_id
        );
        Ok(Replication {
            id: opts.id.clone(),
            name: opts.name.clone(),
            primary_volume_id: opts.primary_volume_id.clone(),
            secondary_volume_id: opts.secondary_volume_id.clone(),
            replication_type: ReplicationType::Host,
            status: ReplicationStatus::Available,
            metadata: BTreeMap::from([(KEY_SAMPLE_PAIR_ID.to_string(), opts.id.clone())]),
        })
    }

    async fn delete_replication(&self, opts: &ReplicationOpts) -> Result<()> {
        debug!("Sample driver deleting pair {}", Self::pair_id(opts)?);
        Ok(())
    }

    async fn enable_replication(&self, opts: &ReplicationOpts) -> Result<()> {
        debug!("Sample driver enabling pair {}", Self::pair_id(opts)?);
        Ok(())
    }

    async fn disable_replication(&self, opts: &ReplicationOpts) -> Result<()> {
        debug!("Sample driver disabling pair {}", Self::pair_id(opts)?);
        Ok(())
    }

    async fn failover_replication(&self, opts: &ReplicationOpts) -> Result<()> {
        debug!("Sample driver failing over pair {}", Self::pair_id(opts)?);
        Ok(())
    }
}

// =============================================================================
// Metric Driver
// =============================================================================

/// Reports the capacity of the sample block pools
#[derive(Default)]
pub struct SampleMetricDriver {
    pools: SampleDriver,
}

#[async_trait]
impl MetricDriver for SampleMetricDriver {
    async fn setup(&mut self, _config_path: &str) -> Result<()> {
        Ok(())
    }

    async fn teardown(&self) -> Result<()> {
        Ok(())
    }

    async fn collect_metrics(&self) -> Result<Vec<Metric>> {
        let pools = self.pools.list_pools().await?;
        Ok(pool_capacity_metrics(&pools))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::{HostInfo, Initiator};
    use assert_matches::assert_matches;

    fn create_opts(id: &str) -> CreateVolumeOpts {
        CreateVolumeOpts {
            id: id.into(),
            name: id.into(),
            size: 1,
            pool_id: "084bf71e-a102-11e7-88a8-e31fe6d52248".into(),
            pool_name: "sample-pool-01".into(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_volume_lifecycle() {
        let driver = SampleDriver::new();

        let volume = driver.create_volume(&create_opts("v1")).await.unwrap();
        assert_eq!(volume.status, VolumeStatus::Available);
        assert_eq!(volume.lun_id(), Some("0"));

        let extended = driver
            .extend_volume(&ExtendVolumeOpts {
                id: "v1".into(),
                size: 4,
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(extended.size, 4);
        assert_eq!(driver.pull_volume("v1").await.unwrap().size, 4);

        driver
            .delete_volume(&DeleteVolumeOpts {
                id: "v1".into(),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_matches!(
            driver.pull_volume("v1").await,
            Err(Error::ObjectNotFound { .. })
        );
    }

    #[tokio::test]
    async fn test_fc_connection_maps_host_ports() {
        let driver = SampleDriver::new();
        driver.create_volume(&create_opts("v1")).await.unwrap();

        let info = driver
            .initialize_connection(&CreateVolumeAttachmentOpts {
                id: "a1".into(),
                volume_id: "v1".into(),
                pool_id: String::new(),
                access_protocol: AccessProtocol::FibreChannel,
                host_info: HostInfo {
                    host: "compute-1".into(),
                    initiators: vec![Initiator {
                        port_name: "21000024ff000001".into(),
                        protocol: AccessProtocol::FibreChannel,
                    }],
                    ..Default::default()
                },
                metadata: BTreeMap::new(),
                dock_id: String::new(),
                driver_name: String::new(),
                context: String::new(),
            })
            .await
            .unwrap();

        assert_eq!(info.protocol(), AccessProtocol::FibreChannel);
        let ConnectionInfo::FibreChannel(conn) = info else {
            panic!("expected FC connection");
        };
        assert!(conn.initiator_target_map.contains_key("21000024ff000001"));
    }

    #[tokio::test]
    async fn test_snapshot_requires_volume() {
        let driver = SampleDriver::new();
        let result = driver
            .create_snapshot(&CreateVolumeSnapshotOpts {
                id: "s1".into(),
                volume_id: "missing".into(),
                ..Default::default()
            })
            .await;
        assert_matches!(result, Err(Error::ObjectNotFound { .. }));
    }

    #[tokio::test]
    async fn test_file_share_pools() {
        let pools = SampleFileShareDriver.list_pools().await.unwrap();
        assert_eq!(pools.len(), 1);
        assert_eq!(pools[0].storage_type, "file");
    }

    #[tokio::test]
    async fn test_replication_pair_round_trip() {
        let driver = SampleReplicationDriver;
        let replication = driver
            .create_replication(&CreateReplicationOpts {
                id: "r1".into(),
                primary_volume_id: "v1".into(),
                secondary_volume_id: "v2".into(),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(replication.status, ReplicationStatus::Available);

        let opts = ReplicationOpts {
            id: "r1".into(),
            metadata: replication.metadata.clone(),
            ..Default::default()
        };
        driver.enable_replication(&opts).await.unwrap();
        driver.failover_replication(&opts).await.unwrap();
        driver.delete_replication(&opts).await.unwrap();

        assert_matches!(
            driver
                .disable_replication(&ReplicationOpts {
                    id: "r1".into(),
                    ..Default::default()
                })
                .await,
            Err(Error::InvalidMetadata(_))
        );
    }

    #[tokio::test]
    async fn test_replication_to_itself_rejected() {
        let result = SampleReplicationDriver
            .create_replication(&CreateReplicationOpts {
                id: "r1".into(),
                primary_volume_id: "v1".into(),
                secondary_volume_id: "v1".into(),
                ..Default::default()
            })
            .await;
        assert_matches!(result, Err(Error::Validation(_)));
    }

    #[tokio::test]
    async fn test_metrics_cover_every_pool() {
        let metrics = SampleMetricDriver::default().collect_metrics().await.unwrap();
        assert_eq!(metrics.len(), 6);
        assert!(metrics
            .iter()
            .any(|m| m.instance_name == "sample-pool-02" && m.name == "free_capacity" && m.value == 170.0));
    }
}
