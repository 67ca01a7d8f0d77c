//! Huawei OceanStor Block Driver
//!
//! Drives an OceanStor array through its device-manager REST API:
//! - [`session`]: the array operations the driver needs, as a trait
//! - [`rest`]: the REST implementation of that trait
//! - [`provision`]: LUN, snapshot and clone workflows
//! - [`connection`]: host zoning for iSCSI and Fibre Channel
//! - [`metrics`]: pool capacity samples
//! - [`replication`]: array replication placeholder
//!
//! One driver instance serves one dock. `setup` loads the backend YAML,
//! logs in and, when LUN ids are limited, scans the array once to seed the
//! id pool.

pub mod config;
pub mod connection;
pub mod metrics;
pub mod provision;
pub mod replication;
pub mod rest;
pub mod session;

#[cfg(test)]
pub(crate) mod simulator;

pub use config::{AuthOptions, OceanStorConfig, PoolProperties, DEFAULT_CONFIG_PATH};
pub use connection::ConnectionManager;
pub use metrics::OceanStorMetricDriver;
pub use provision::VolumeProvisioner;
pub use replication::OceanStorReplicationDriver;
pub use rest::RestClient;
pub use session::ArraySession;

use crate::allocation::LunIdPool;
use crate::domain::model::{ConnectionInfo, StoragePool, Volume, VolumeSnapshot};
use crate::domain::ports::{
    CreateVolumeAttachmentOpts, CreateVolumeOpts, CreateVolumeSnapshotOpts,
    DeleteVolumeAttachmentOpts, DeleteVolumeOpts, DeleteVolumeSnapshotOpts, ExtendVolumeOpts,
    PoolSource, VolumeDriver,
};
use crate::error::{Error, Result};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{info, warn};

/// Opens an array session for a loaded configuration
pub type SessionFactory =
    Box<dyn Fn(&OceanStorConfig) -> Result<Arc<dyn ArraySession>> + Send + Sync>;

fn rest_session(config: &OceanStorConfig) -> Result<Arc<dyn ArraySession>> {
    Ok(Arc::new(RestClient::new(&config.auth_options)?))
}

struct Backend {
    session: Arc<dyn ArraySession>,
    provisioner: VolumeProvisioner,
    connections: ConnectionManager,
}

/// OceanStor implementation of [`VolumeDriver`]
pub struct OceanStorDriver {
    open_session: SessionFactory,
    backend: Option<Backend>,
}

impl Default for OceanStorDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl OceanStorDriver {
    /// Driver talking to the array over REST
    pub fn new() -> Self {
        Self::with_session_factory(Box::new(rest_session))
    }

    pub fn with_session_factory(open_session: SessionFactory) -> Self {
        Self {
            open_session,
            backend: None,
        }
    }

    /// Configure the driver from an already loaded configuration
    pub async fn setup_with_config(&mut self, config: OceanStorConfig) -> Result<()> {
        config.validate()?;
        let session = (self.open_session)(&config)?;
        session.login().await?;

        let lun_ids = match config.lun_id_range()? {
            Some(range) => {
                let mut pool = LunIdPool::new(range);
                pool.refresh(&*session).await?;
                info!(
                    "LUN ids limited to {}, {} currently free",
                    range,
                    pool.len()
                );
                Some(pool)
            }
            None => None,
        };

        let config = Arc::new(config);
        self.backend = Some(Backend {
            provisioner: VolumeProvisioner::new(session.clone(), config.clone(), lun_ids),
            connections: ConnectionManager::new(session.clone(), config),
            session,
        });
        Ok(())
    }

    /// Free LUN ids currently known, when ids are limited
    pub async fn available_lun_ids(&self) -> Option<usize> {
        match &self.backend {
            Some(backend) => backend.provisioner.available_lun_ids().await,
            None => None,
        }
    }

    fn backend(&self) -> Result<&Backend> {
        self.backend
            .as_ref()
            .ok_or_else(|| Error::Internal("oceanstor driver used before setup".into()))
    }
}

#[async_trait]
impl PoolSource for OceanStorDriver {
    async fn list_pools(&self) -> Result<Vec<StoragePool>> {
        self.backend()?.provisioner.list_pools().await
    }
}

#[async_trait]
impl VolumeDriver for OceanStorDriver {
    async fn setup(&mut self, config_path: &str) -> Result<()> {
        let path = if config_path.is_empty() {
            DEFAULT_CONFIG_PATH
        } else {
            config_path
        };
        let config = OceanStorConfig::load(path)?;
        self.setup_with_config(config).await?;
        info!("OceanStor driver ready, config = {}", path);
        Ok(())
    }

    async fn unset(&self) -> Result<()> {
        match &self.backend {
            Some(backend) => backend.session.logout().await,
            None => {
                warn!("Unset called on an OceanStor driver that was never set up");
                Ok(())
            }
        }
    }

    /// The session is shared by every user of the cached instance
    fn requires_teardown(&self) -> bool {
        false
    }

    async fn create_volume(&self, opts: &CreateVolumeOpts) -> Result<Volume> {
        self.backend()?.provisioner.create_volume(opts).await
    }

    async fn pull_volume(&self, volume_id: &str) -> Result<Volume> {
        self.backend()?.provisioner.pull_volume(volume_id).await
    }

    async fn delete_volume(&self, opts: &DeleteVolumeOpts) -> Result<()> {
        self.backend()?.provisioner.delete_volume(opts).await
    }

    async fn extend_volume(&self, opts: &ExtendVolumeOpts) -> Result<Volume> {
        self.backend()?.provisioner.extend_volume(opts).await
    }

    async fn initialize_connection(
        &self,
        opts: &CreateVolumeAttachmentOpts,
    ) -> Result<ConnectionInfo> {
        self.backend()?.connections.initialize_connection(opts).await
    }

    async fn terminate_connection(&self, opts: &DeleteVolumeAttachmentOpts) -> Result<()> {
        self.backend()?.connections.terminate_connection(opts).await
    }

    async fn create_snapshot(&self, opts: &CreateVolumeSnapshotOpts) -> Result<VolumeSnapshot> {
        self.backend()?.provisioner.create_snapshot(opts).await
    }

    async fn pull_snapshot(&self, snapshot_id: &str) -> Result<VolumeSnapshot> {
        self.backend()?.provisioner.pull_snapshot(snapshot_id).await
    }

    async fn delete_snapshot(&self, opts: &DeleteVolumeSnapshotOpts) -> Result<()> {
        self.backend()?.provisioner.delete_snapshot(opts).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::KEY_LUN_ID;
    use crate::domain::ports::VolumeGroupOpts;
    use assert_matches::assert_matches;
    use super::simulator::FakeArray;
    use std::io::Write;

    const CONFIG: &str = r#"
auth_options:
  endpoints: "https://10.0.0.10:8088/deviceManager/rest"
  username: admin
  password: secret
pool:
  StoragePool001:
    storage_type: block
target_ip: 192.168.1.10
lun_id_range_min: 1
lun_id_range_max: 5
lun_ready_wait_interval_secs: 0
lun_ready_wait_timeout_secs: 0
"#;

    fn driver_on(array: &Arc<FakeArray>) -> OceanStorDriver {
        let array = array.clone();
        OceanStorDriver::with_session_factory(Box::new(move |_: &OceanStorConfig| {
            let session: Arc<dyn ArraySession> = array.clone();
            Ok::<_, crate::error::Error>(session)
        }))
    }

    fn config_file(raw: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(raw.as_bytes()).unwrap();
        file
    }

    #[tokio::test]
    async fn test_setup_seeds_lun_pool() {
        let array = Arc::new(FakeArray::new());
        array.occupy_lun_id(0);
        array.occupy_lun_id(2);
        let file = config_file(CONFIG);

        let mut driver = driver_on(&array);
        driver.setup(file.path().to_str().unwrap()).await.unwrap();

        assert_eq!(driver.available_lun_ids().await, Some(4));
    }

    #[tokio::test]
    async fn test_setup_fails_on_login() {
        let array = Arc::new(FakeArray::new());
        array.fail("login");
        let file = config_file(CONFIG);

        let mut driver = driver_on(&array);
        let result = driver.setup(file.path().to_str().unwrap()).await;

        assert_matches!(result, Err(Error::Backend { .. }));
        assert_matches!(driver.list_pools().await, Err(Error::Internal(_)));
    }

    #[tokio::test]
    async fn test_setup_missing_file() {
        let array = Arc::new(FakeArray::new());
        let mut driver = driver_on(&array);

        let result = driver.setup("/nonexistent/oceanstor.yaml").await;
        assert_matches!(result, Err(Error::Configuration(_)));
    }

    #[tokio::test]
    async fn test_volume_lifecycle_through_driver() {
        let array = Arc::new(FakeArray::new());
        let file = config_file(CONFIG);
        let mut driver = driver_on(&array);
        driver.setup(file.path().to_str().unwrap()).await.unwrap();

        let pools = driver.list_pools().await.unwrap();
        assert_eq!(pools.len(), 1);

        let volume = driver
            .create_volume(&CreateVolumeOpts {
                id: "v1".into(),
                name: "v1".into(),
                size: 1,
                pool_id: pools[0].id.clone(),
                pool_name: pools[0].name.clone(),
                ..Default::default()
            })
            .await
            .unwrap();
        let lun_id: i64 = volume.metadata[KEY_LUN_ID].parse().unwrap();
        assert!((1..=5).contains(&lun_id));

        driver
            .delete_volume(&DeleteVolumeOpts {
                id: volume.id.clone(),
                metadata: volume.metadata.clone(),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(driver.available_lun_ids().await, Some(5));

        driver.unset().await.unwrap();
    }

    #[tokio::test]
    async fn test_volume_groups_not_implemented() {
        let array = Arc::new(FakeArray::new());
        let file = config_file(CONFIG);
        let mut driver = driver_on(&array);
        driver.setup(file.path().to_str().unwrap()).await.unwrap();

        let result = driver.create_volume_group(&VolumeGroupOpts::default()).await;
        assert_matches!(result, Err(Error::NotImplemented { .. }));
    }
}
