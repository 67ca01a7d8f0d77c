//! Volume & Snapshot Provisioning
//!
//! LUN and snapshot lifecycle on one array. Volume creation is serialized
//! per driver instance by the mutex that also owns the LUN id pool; cloning
//! from a snapshot creates the target LUN, waits for it to come online and
//! runs a LUN copy, deleting the target again if any of that fails.

use super::config::OceanStorConfig;
use super::session::{
    encode_name, gb_to_sector, sector_to_gb, truncate_description, ArraySession,
    CreateLunParams, Lun, DEFAULT_COPY_SPEED,
};
use crate::allocation::LunIdPool;
use crate::domain::model::{
    Identifier, PoolStatus, StoragePool, Volume, VolumeSnapshot, DEFAULT_AVAILABILITY_ZONE,
    KEY_LUN_ID, KEY_SNAPSHOT_ID,
};
use crate::domain::ports::{
    CreateVolumeOpts, CreateVolumeSnapshotOpts, DeleteVolumeOpts, DeleteVolumeSnapshotOpts,
    ExtendVolumeOpts,
};
use crate::error::{Error, Result};
use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Volume metadata key selecting the LUN copy speed
pub const KEY_COPY_SPEED: &str = "copyspeed";

const DURABLE_NAME_FORMAT: &str = "NAA";

/// Poll `check` every `interval` until it yields `true` or `timeout` passes
///
/// An error from `check` ends the wait immediately.
pub(crate) async fn poll_until<F, Fut>(
    operation: &str,
    interval: Duration,
    timeout: Duration,
    mut check: F,
) -> Result<()>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<bool>>,
{
    let deadline = Instant::now() + timeout;
    loop {
        if check().await? {
            return Ok(());
        }
        if Instant::now() >= deadline {
            return Err(Error::Timeout {
                operation: operation.to_string(),
                duration: timeout,
            });
        }
        tokio::time::sleep(interval).await;
    }
}

pub(super) fn required_metadata<'a>(metadata: &'a BTreeMap<String, String>, key: &str) -> Result<&'a str> {
    metadata
        .get(key)
        .map(String::as_str)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| Error::InvalidMetadata(format!("missing {}", key)))
}

// =============================================================================
// Volume Provisioner
// =============================================================================

/// LUN and snapshot operations of one array
pub struct VolumeProvisioner {
    session: Arc<dyn ArraySession>,
    config: Arc<OceanStorConfig>,
    /// Creation lock; holds the LUN id pool when ids are limited
    creation: Mutex<Option<LunIdPool>>,
}

impl VolumeProvisioner {
    pub fn new(
        session: Arc<dyn ArraySession>,
        config: Arc<OceanStorConfig>,
        lun_ids: Option<LunIdPool>,
    ) -> Self {
        Self {
            session,
            config,
            creation: Mutex::new(lun_ids),
        }
    }

    pub fn session(&self) -> &Arc<dyn ArraySession> {
        &self.session
    }

    /// Free LUN ids currently known, when ids are limited
    pub async fn available_lun_ids(&self) -> Option<usize> {
        self.creation.lock().await.as_ref().map(LunIdPool::len)
    }

    // -------------------------------------------------------------------------
    // Volumes
    // -------------------------------------------------------------------------

    pub async fn create_volume(&self, opts: &CreateVolumeOpts) -> Result<Volume> {
        let mut lun_ids = self.creation.lock().await;

        if let Some(snapshot_id) = opts.snapshot_id.as_deref().filter(|s| !s.is_empty()) {
            return self
                .create_volume_from_snapshot(&mut lun_ids, opts, snapshot_id)
                .await;
        }

        let lun = self.create_lun(&mut lun_ids, opts).await?;
        info!("Created volume {} as LUN {}", opts.id, lun.id);
        Ok(self.volume_from_lun(opts, &lun))
    }

    async fn create_lun(
        &self,
        lun_ids: &mut Option<LunIdPool>,
        opts: &CreateVolumeOpts,
    ) -> Result<Lun> {
        let pool_id = self.session.get_pool_id_by_name(&opts.pool_name).await?;
        let params = CreateLunParams {
            name: encode_name(&opts.id),
            description: truncate_description(&opts.description),
            pool_id,
            capacity: gb_to_sector(opts.size),
            policy: self.config.provisioning_policy(&opts.pool_name)?,
            id: None,
        };

        match lun_ids {
            Some(pool) => {
                let session = Arc::clone(&self.session);
                pool.allocate(&*self.session, |id| {
                    let session = Arc::clone(&session);
                    let params = CreateLunParams {
                        id: Some(id),
                        ..params.clone()
                    };
                    async move { session.create_lun(&params).await }
                })
                .await
            }
            None => self.session.create_lun(&params).await,
        }
    }

    async fn create_volume_from_snapshot(
        &self,
        lun_ids: &mut Option<LunIdPool>,
        opts: &CreateVolumeOpts,
        snapshot_id: &str,
    ) -> Result<Volume> {
        let flag = |key: &str| opts.metadata.get(key).map(String::as_str) == Some("true");
        if flag("hypermetro") && flag("replication_enabled") {
            return Err(Error::Validation(
                "Hypermetro and Replication can not be used in the same volume_type".into(),
            ));
        }

        let snapshot = self
            .session
            .get_snapshot_by_name(&encode_name(snapshot_id))
            .await?;

        let lun = self.create_lun(lun_ids, opts).await?;

        let ready = self.wait_lun_ready(&lun.id).await;
        if let Err(e) = ready {
            error!("Volume {} never became ready: {}", opts.id, e);
            self.remove_target(lun_ids, &lun.id).await;
            return Err(e);
        }

        if let Err(e) = self.copy_volume(opts, &snapshot.id, &lun.id).await {
            error!("Copy snapshot {} to volume {} failed: {}", snapshot_id, opts.id, e);
            self.remove_target(lun_ids, &lun.id).await;
            return Err(e);
        }

        info!("Created volume {} from snapshot {}", opts.id, snapshot_id);
        Ok(self.volume_from_lun(opts, &lun))
    }

    async fn wait_lun_ready(&self, lun_id: &str) -> Result<()> {
        let session = &self.session;
        poll_until(
            "lun ready",
            self.config.lun_ready_wait_interval(),
            self.config.lun_ready_wait_timeout(),
            || async move {
                let lun = session.get_lun(lun_id).await?;
                if lun.is_faulty() {
                    return Err(Error::Internal(format!(
                        "LUN {} is faulty (running status {})",
                        lun_id, lun.running_status
                    )));
                }
                Ok::<_, Error>(lun.is_ready())
            },
        )
        .await
    }

    async fn copy_volume(&self, opts: &CreateVolumeOpts, source_id: &str, target_id: &str) -> Result<()> {
        let speed = opts
            .metadata
            .get(KEY_COPY_SPEED)
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_COPY_SPEED);

        let copy_id = self
            .session
            .create_lun_copy(&encode_name(&opts.id), source_id, target_id, speed)
            .await?;

        if let Err(e) = self.session.start_lun_copy(&copy_id).await {
            if let Err(cleanup) = self.session.delete_lun_copy(&copy_id).await {
                warn!("Delete LUN copy {} failed: {}", copy_id, cleanup);
            }
            return Err(e);
        }

        // The array refuses to delete a copy job until it has finished
        let session = &self.session;
        let copy_id = copy_id.as_str();
        poll_until(
            "lun copy",
            self.config.lun_copy_wait_interval(),
            self.config.lun_copy_wait_timeout(),
            || async move {
                match session.delete_lun_copy(copy_id).await {
                    Ok(()) => Ok::<_, Error>(true),
                    Err(e) => {
                        debug!("LUN copy {} not finished: {}", copy_id, e);
                        Ok(false)
                    }
                }
            },
        )
        .await
    }

    async fn remove_target(&self, lun_ids: &mut Option<LunIdPool>, lun_id: &str) {
        match self.session.delete_lun(lun_id).await {
            Ok(()) => {
                if let (Some(pool), Ok(id)) = (lun_ids.as_mut(), lun_id.parse()) {
                    pool.insert(id);
                }
            }
            Err(e) => warn!("Delete LUN {} after failed clone: {}", lun_id, e),
        }
    }

    fn volume_from_lun(&self, opts: &CreateVolumeOpts, lun: &Lun) -> Volume {
        Volume {
            id: opts.id.clone(),
            tenant_id: opts.tenant_id.clone(),
            name: opts.name.clone(),
            description: opts.description.clone(),
            size: sector_to_gb(lun.capacity),
            availability_zone: opts.availability_zone.clone(),
            pool_id: opts.pool_id.clone(),
            profile_id: opts.profile_id.clone(),
            snapshot_id: opts.snapshot_id.clone().unwrap_or_default(),
            metadata: BTreeMap::from([(KEY_LUN_ID.to_string(), lun.id.clone())]),
            identifier: Some(Identifier {
                durable_name: lun.wwn.clone(),
                durable_name_format: DURABLE_NAME_FORMAT.into(),
            }),
            ..Default::default()
        }
    }

    pub async fn pull_volume(&self, volume_id: &str) -> Result<Volume> {
        let lun = self.session.get_lun_by_name(&encode_name(volume_id)).await?;
        Ok(Volume {
            id: volume_id.to_string(),
            name: lun.name.clone(),
            description: lun.description.clone(),
            size: sector_to_gb(lun.capacity),
            availability_zone: lun.parent_name.clone(),
            metadata: BTreeMap::from([(KEY_LUN_ID.to_string(), lun.id.clone())]),
            identifier: Some(Identifier {
                durable_name: lun.wwn,
                durable_name_format: DURABLE_NAME_FORMAT.into(),
            }),
            ..Default::default()
        })
    }

    pub async fn delete_volume(&self, opts: &DeleteVolumeOpts) -> Result<()> {
        let lun_id = required_metadata(&opts.metadata, KEY_LUN_ID)?;
        if let Err(e) = self.session.delete_lun(lun_id).await {
            error!("Delete volume {} failed: {}", opts.id, e);
            return Err(e);
        }
        info!("Removed volume {}", opts.id);

        if let Some(pool) = self.creation.lock().await.as_mut() {
            match lun_id.parse() {
                Ok(id) => {
                    pool.insert(id);
                }
                Err(_) => warn!("LUN id {} of volume {} is not numeric", lun_id, opts.id),
            }
        }
        Ok(())
    }

    pub async fn extend_volume(&self, opts: &ExtendVolumeOpts) -> Result<Volume> {
        let lun_id = required_metadata(&opts.metadata, KEY_LUN_ID)?;
        self.session
            .extend_lun(lun_id, gb_to_sector(opts.size))
            .await?;
        info!("Extended volume {} to {} GB", opts.id, opts.size);

        Ok(Volume {
            id: opts.id.clone(),
            name: opts.name.clone(),
            description: opts.description.clone(),
            size: opts.size,
            availability_zone: opts.availability_zone.clone(),
            metadata: opts.metadata.clone(),
            ..Default::default()
        })
    }

    // -------------------------------------------------------------------------
    // Snapshots
    // -------------------------------------------------------------------------

    pub async fn create_snapshot(&self, opts: &CreateVolumeSnapshotOpts) -> Result<VolumeSnapshot> {
        let lun_id = required_metadata(&opts.metadata, KEY_LUN_ID)?;
        let snapshot = self
            .session
            .create_snapshot(
                lun_id,
                &encode_name(&opts.id),
                &truncate_description(&opts.description),
            )
            .await?;
        info!("Created snapshot {} of volume {}", opts.id, opts.volume_id);

        Ok(VolumeSnapshot {
            id: opts.id.clone(),
            name: opts.name.clone(),
            description: opts.description.clone(),
            volume_id: opts.volume_id.clone(),
            size: 0,
            metadata: BTreeMap::from([(KEY_SNAPSHOT_ID.to_string(), snapshot.id)]),
            ..Default::default()
        })
    }

    pub async fn pull_snapshot(&self, snapshot_id: &str) -> Result<VolumeSnapshot> {
        let snapshot = self
            .session
            .get_snapshot_by_name(&encode_name(snapshot_id))
            .await?;
        Ok(VolumeSnapshot {
            id: snapshot_id.to_string(),
            name: snapshot.name,
            description: snapshot.description,
            volume_id: snapshot.parent_id,
            size: 0,
            metadata: BTreeMap::from([(KEY_SNAPSHOT_ID.to_string(), snapshot.id)]),
            ..Default::default()
        })
    }

    pub async fn delete_snapshot(&self, opts: &DeleteVolumeSnapshotOpts) -> Result<()> {
        let id = required_metadata(&opts.metadata, KEY_SNAPSHOT_ID)?;
        if let Err(e) = self.session.delete_snapshot(id).await {
            error!("Delete volume snapshot {} failed: {}", opts.id, e);
            return Err(e);
        }
        info!("Removed volume snapshot {}", opts.id);
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Pools
    // -------------------------------------------------------------------------

    /// Array pools that are named in the configuration
    pub async fn list_pools(&self) -> Result<Vec<StoragePool>> {
        let pools = self.session.list_storage_pools().await?;
        Ok(pools
            .into_iter()
            .filter_map(|p| {
                let props = self.config.pool.get(&p.name)?;
                let seed = format!("{}:{}", self.config.auth_options.endpoints, p.id);
                let availability_zone = if props.availability_zone.is_empty() {
                    DEFAULT_AVAILABILITY_ZONE.to_string()
                } else {
                    props.availability_zone.clone()
                };
                Some(StoragePool {
                    id: Uuid::new_v5(&Uuid::NAMESPACE_OID, seed.as_bytes()).to_string(),
                    name: p.name,
                    total_capacity: sector_to_gb(p.user_total_capacity),
                    free_capacity: sector_to_gb(p.user_free_capacity),
                    availability_zone,
                    storage_type: props.storage_type.clone(),
                    multi_attach: props.multi_attach,
                    extras: props.extras.clone(),
                    status: PoolStatus::Available,
                    ..Default::default()
                })
            })
            .collect())
    }
}
