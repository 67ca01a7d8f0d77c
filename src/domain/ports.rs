//! Domain Ports - Core trait definitions for the storage dock
//!
//! These traits define the boundaries between the dock's orchestration logic
//! and vendor backends. Each driver kind implements [`VolumeDriver`];
//! file-share backends implement the narrower [`FileShareDriver`]. Both
//! expose [`PoolSource`] so discovery treats them uniformly.

use crate::domain::model::{
    AccessProtocol, ConnectionInfo, HostInfo, Metric, Replication, StoragePool, Volume,
    VolumeSnapshot,
};
use crate::error::{Error, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

// =============================================================================
// Operation Options
// =============================================================================

/// Options for `CreateVolume`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateVolumeOpts {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Requested size in GB
    pub size: i64,
    #[serde(default)]
    pub availability_zone: String,
    #[serde(default)]
    pub tenant_id: String,
    pub pool_id: String,
    pub pool_name: String,
    #[serde(default)]
    pub profile_id: String,
    /// Source snapshot; when set the volume is cloned from it
    #[serde(default)]
    pub snapshot_id: Option<String>,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
    #[serde(default)]
    pub dock_id: String,
    #[serde(default)]
    pub driver_name: String,
    /// Serialized request context
    #[serde(default)]
    pub context: String,
}

/// Options for `DeleteVolume`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteVolumeOpts {
    pub id: String,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
    #[serde(default)]
    pub dock_id: String,
    #[serde(default)]
    pub driver_name: String,
    #[serde(default)]
    pub context: String,
}

/// Options for `ExtendVolume`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtendVolumeOpts {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// New size in GB
    pub size: i64,
    #[serde(default)]
    pub availability_zone: String,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
    #[serde(default)]
    pub dock_id: String,
    #[serde(default)]
    pub driver_name: String,
    #[serde(default)]
    pub context: String,
}

/// Options for `CreateVolumeAttachment`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateVolumeAttachmentOpts {
    pub id: String,
    pub volume_id: String,
    #[serde(default)]
    pub pool_id: String,
    pub access_protocol: AccessProtocol,
    pub host_info: HostInfo,
    /// Volume metadata, carries the backend LUN id
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
    #[serde(default)]
    pub dock_id: String,
    #[serde(default)]
    pub driver_name: String,
    #[serde(default)]
    pub context: String,
}

/// Options for `DeleteVolumeAttachment`
pub type DeleteVolumeAttachmentOpts = CreateVolumeAttachmentOpts;

/// Options for `CreateSnapshot`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateVolumeSnapshotOpts {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub volume_id: String,
    #[serde(default)]
    pub size: i64,
    /// Parent volume metadata, carries the backend LUN id
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
    #[serde(default)]
    pub dock_id: String,
    #[serde(default)]
    pub driver_name: String,
    #[serde(default)]
    pub context: String,
}

/// Options for `DeleteSnapshot`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteVolumeSnapshotOpts {
    pub id: String,
    #[serde(default)]
    pub volume_id: String,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
    #[serde(default)]
    pub dock_id: String,
    #[serde(default)]
    pub driver_name: String,
    #[serde(default)]
    pub context: String,
}

/// Options for snapshot attach/detach
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotAttachmentOpts {
    pub id: String,
    pub snapshot_id: String,
    pub access_protocol: AccessProtocol,
    pub host_info: HostInfo,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

/// Options for volume group operations
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VolumeGroupOpts {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub pool_id: String,
    #[serde(default)]
    pub add_volumes: Vec<String>,
    #[serde(default)]
    pub remove_volumes: Vec<String>,
}

/// Consistency group of volumes
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VolumeGroup {
    pub id: String,
    pub name: String,
    pub status: String,
    pub pool_id: String,
    pub volumes: Vec<String>,
}

/// Options for `CreateReplication`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateReplicationOpts {
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub primary_volume_id: String,
    pub secondary_volume_id: String,
    /// Metadata of the primary volume, carrying its backend ids
    #[serde(default)]
    pub primary_volume_metadata: BTreeMap<String, String>,
    #[serde(default)]
    pub secondary_volume_metadata: BTreeMap<String, String>,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
    #[serde(default)]
    pub context: String,
}

/// Options for delete, enable, disable and failover of a replication
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplicationOpts {
    pub id: String,
    pub primary_volume_id: String,
    /// Metadata returned when the replication was created
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
    /// Failover only: also fail over volumes that are attached
    #[serde(default)]
    pub allow_attached_volume: bool,
    /// Failover only: backend taking over, empty for the configured one
    #[serde(default)]
    pub secondary_backend_id: String,
    #[serde(default)]
    pub context: String,
}

// =============================================================================
// Pool Source Port
// =============================================================================

/// Anything that can report its capacity pools
#[async_trait]
pub trait PoolSource: Send + Sync {
    /// List the pools currently offered by the backend
    async fn list_pools(&self) -> Result<Vec<StoragePool>>;
}

// =============================================================================
// Volume Driver Port
// =============================================================================

/// Port for block-storage backends
///
/// A driver is constructed empty, configured once through [`setup`], shared
/// behind an `Arc` for the lifetime of its dock, and released through
/// [`unset`].
///
/// [`setup`]: VolumeDriver::setup
/// [`unset`]: VolumeDriver::unset
#[async_trait]
pub trait VolumeDriver: PoolSource {
    /// Load configuration and open backend sessions
    async fn setup(&mut self, config_path: &str) -> Result<()>;

    /// Release backend sessions
    async fn unset(&self) -> Result<()>;

    /// Whether `unset` has anything to release for this kind
    fn requires_teardown(&self) -> bool {
        true
    }

    async fn create_volume(&self, opts: &CreateVolumeOpts) -> Result<Volume>;

    async fn pull_volume(&self, volume_id: &str) -> Result<Volume>;

    async fn delete_volume(&self, opts: &DeleteVolumeOpts) -> Result<()>;

    async fn extend_volume(&self, opts: &ExtendVolumeOpts) -> Result<Volume>;

    async fn initialize_connection(
        &self,
        opts: &CreateVolumeAttachmentOpts,
    ) -> Result<ConnectionInfo>;

    async fn terminate_connection(&self, opts: &DeleteVolumeAttachmentOpts) -> Result<()>;

    async fn create_snapshot(&self, opts: &CreateVolumeSnapshotOpts) -> Result<VolumeSnapshot>;

    async fn pull_snapshot(&self, snapshot_id: &str) -> Result<VolumeSnapshot>;

    async fn delete_snapshot(&self, opts: &DeleteVolumeSnapshotOpts) -> Result<()>;

    async fn initialize_snapshot_connection(
        &self,
        _opts: &SnapshotAttachmentOpts,
    ) -> Result<ConnectionInfo> {
        Err(Error::not_implemented("InitializeSnapshotConnection"))
    }

    async fn terminate_snapshot_connection(&self, _opts: &SnapshotAttachmentOpts) -> Result<()> {
        Err(Error::not_implemented("TerminateSnapshotConnection"))
    }

    async fn create_volume_group(&self, _opts: &VolumeGroupOpts) -> Result<VolumeGroup> {
        Err(Error::not_implemented("CreateVolumeGroup"))
    }

    async fn update_volume_group(&self, _opts: &VolumeGroupOpts) -> Result<VolumeGroup> {
        Err(Error::not_implemented("UpdateVolumeGroup"))
    }

    async fn delete_volume_group(&self, _opts: &VolumeGroupOpts) -> Result<()> {
        Err(Error::not_implemented("DeleteVolumeGroup"))
    }
}

// =============================================================================
// File Share Driver Port
// =============================================================================

/// Port for file-share backends, used by discovery only
#[async_trait]
pub trait FileShareDriver: PoolSource {
    async fn setup(&mut self, config_path: &str) -> Result<()>;

    async fn unset(&self) -> Result<()>;
}

// =============================================================================
// Replication Driver Port
// =============================================================================

/// Port for drivers that mirror a volume onto a second one
///
/// Array kinds replicate inside the array; host kinds replicate from the
/// attached node. Both are built per call and released afterwards.
#[async_trait]
pub trait ReplicationDriver: Send + Sync {
    async fn setup(&mut self, config_path: &str) -> Result<()>;

    async fn unset(&self) -> Result<()>;

    async fn create_replication(&self, opts: &CreateReplicationOpts) -> Result<Replication>;

    async fn delete_replication(&self, opts: &ReplicationOpts) -> Result<()>;

    async fn enable_replication(&self, opts: &ReplicationOpts) -> Result<()>;

    async fn disable_replication(&self, opts: &ReplicationOpts) -> Result<()>;

    async fn failover_replication(&self, opts: &ReplicationOpts) -> Result<()>;
}

// =============================================================================
// Metric Driver Port
// =============================================================================

/// Port for backends that report performance and capacity samples
#[async_trait]
pub trait MetricDriver: Send + Sync {
    async fn setup(&mut self, config_path: &str) -> Result<()>;

    async fn teardown(&self) -> Result<()>;

    /// Collect one sample per metric for every resource the backend exposes
    async fn collect_metrics(&self) -> Result<Vec<Metric>>;
}

// =============================================================================
// Type Aliases for Arc'd Traits
// =============================================================================

pub type VolumeDriverRef = Arc<dyn VolumeDriver>;
pub type FileShareDriverRef = Arc<dyn FileShareDriver>;
pub type ReplicationDriverRef = Arc<dyn ReplicationDriver>;
pub type MetricDriverRef = Arc<dyn MetricDriver>;
