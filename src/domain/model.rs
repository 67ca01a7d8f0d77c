//! Domain Model - Records managed by the dock
//!
//! Docks, pools, volumes, snapshots, attachments and hosts as they are
//! persisted, plus the protocol-tagged connection descriptors handed back
//! to attach callers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::str::FromStr;

use crate::error::Error;

/// Metadata key carrying the backend LUN id of a volume
pub const KEY_LUN_ID: &str = "lunId";

/// Metadata key carrying the backend snapshot id of a snapshot
pub const KEY_SNAPSHOT_ID: &str = "snapshotId";

/// Dock metadata key naming the host-based replication driver
pub const KEY_HOST_REPLICATION_DRIVER: &str = "HostReplicationDriver";

/// Availability zone assigned to pools that don't configure one
pub const DEFAULT_AVAILABILITY_ZONE: &str = "default";

// =============================================================================
// Enumerations
// =============================================================================

/// Role of a dock process
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DockType {
    Provisioner,
    Attacher,
}

impl std::fmt::Display for DockType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DockType::Provisioner => write!(f, "provisioner"),
            DockType::Attacher => write!(f, "attacher"),
        }
    }
}

impl FromStr for DockType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "provisioner" => Ok(DockType::Provisioner),
            "attacher" => Ok(DockType::Attacher),
            other => Err(Error::Configuration(format!("unknown dock type: {}", other))),
        }
    }
}

/// Pool availability as seen by the last discovery pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PoolStatus {
    #[default]
    Available,
    Unavailable,
}

/// Where replication for a pool is carried out
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReplicationType {
    #[default]
    Host,
    Array,
}

/// SAN access protocol
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessProtocol {
    Iscsi,
    FibreChannel,
}

impl std::fmt::Display for AccessProtocol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AccessProtocol::Iscsi => write!(f, "iscsi"),
            AccessProtocol::FibreChannel => write!(f, "fibre_channel"),
        }
    }
}

impl FromStr for AccessProtocol {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "iscsi" => Ok(AccessProtocol::Iscsi),
            "fibre_channel" | "fc" => Ok(AccessProtocol::FibreChannel),
            other => Err(Error::UnsupportedProtocol {
                protocol: other.to_string(),
            }),
        }
    }
}

/// Backing allocation of a new volume
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ProvisioningPolicy {
    #[default]
    Thick,
    Thin,
}

impl std::fmt::Display for ProvisioningPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProvisioningPolicy::Thick => write!(f, "Thick"),
            ProvisioningPolicy::Thin => write!(f, "Thin"),
        }
    }
}

impl FromStr for ProvisioningPolicy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "" | "thick" => Ok(ProvisioningPolicy::Thick),
            "thin" => Ok(ProvisioningPolicy::Thin),
            other => Err(Error::Configuration(format!(
                "unknown provisioning policy: {}",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum VolumeStatus {
    #[default]
    Creating,
    Available,
    InUse,
    Deleting,
    Extending,
    Error,
    ErrorDeleting,
    ErrorExtending,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SnapshotStatus {
    #[default]
    Creating,
    Available,
    Deleting,
    Error,
    ErrorDeleting,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AttachmentStatus {
    #[default]
    Creating,
    Available,
    Deleting,
    Error,
    ErrorDeleting,
}

/// Read/write mode of an attachment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttachMode {
    #[default]
    Rw,
    Ro,
}

// =============================================================================
// Dock & Pool
// =============================================================================

/// A registered backend endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Dock {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub driver_name: String,
    pub endpoint: String,
    pub node_id: String,
    #[serde(rename = "type")]
    pub dock_type: DockType,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataStorage {
    #[serde(default)]
    pub provisioning_policy: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IoConnectivity {
    #[serde(default)]
    pub access_protocol: Option<AccessProtocol>,
}

/// Pool capability properties, taken from backend configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PoolExtras {
    #[serde(default)]
    pub data_storage: DataStorage,
    #[serde(default)]
    pub io_connectivity: IoConnectivity,
}

/// Capacity unit owned by a dock
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoragePool {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub dock_id: String,
    /// Total capacity in GB
    pub total_capacity: i64,
    /// Free capacity in GB
    pub free_capacity: i64,
    pub availability_zone: String,
    #[serde(default)]
    pub storage_type: String,
    #[serde(default)]
    pub multi_attach: bool,
    #[serde(default)]
    pub replication_type: ReplicationType,
    #[serde(default)]
    pub replication_driver_name: String,
    #[serde(default)]
    pub extras: PoolExtras,
    #[serde(default)]
    pub status: PoolStatus,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

// =============================================================================
// Volume & Snapshot
// =============================================================================

/// Additional world-wide identifier of a resource
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identifier {
    pub durable_name: String,
    pub durable_name_format: String,
}

/// A provisioned block device
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Volume {
    pub id: String,
    #[serde(default)]
    pub tenant_id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Size in GB
    pub size: i64,
    #[serde(default)]
    pub availability_zone: String,
    #[serde(default)]
    pub status: VolumeStatus,
    #[serde(default)]
    pub pool_id: String,
    #[serde(default)]
    pub profile_id: String,
    #[serde(default)]
    pub snapshot_id: String,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
    #[serde(default)]
    pub identifier: Option<Identifier>,
    #[serde(default)]
    pub attached: bool,
    #[serde(default)]
    pub multi_attach: bool,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Volume {
    /// Backend LUN id recorded at creation
    pub fn lun_id(&self) -> Option<&str> {
        self.metadata.get(KEY_LUN_ID).map(String::as_str)
    }
}

/// Point-in-time copy reference
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VolumeSnapshot {
    pub id: String,
    #[serde(default)]
    pub tenant_id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub volume_id: String,
    /// Always 0 for backends without incremental size tracking
    pub size: i64,
    #[serde(default)]
    pub status: SnapshotStatus,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

// =============================================================================
// Hosts & Attachments
// =============================================================================

/// An initiator port of a host
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Initiator {
    pub port_name: String,
    pub protocol: AccessProtocol,
}

/// Host identity as passed to drivers
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HostInfo {
    /// Host name, used to derive the backend host object name
    pub host: String,
    #[serde(default)]
    pub ip: String,
    #[serde(default)]
    pub os_type: String,
    #[serde(default)]
    pub initiators: Vec<Initiator>,
}

impl HostInfo {
    /// First initiator for a protocol (the IQN for iSCSI)
    pub fn initiator(&self, protocol: AccessProtocol) -> Option<&str> {
        self.initiators
            .iter()
            .find(|i| i.protocol == protocol)
            .map(|i| i.port_name.as_str())
    }

    /// All initiators for a protocol (the WWNs for Fibre Channel)
    pub fn initiators_by_protocol(&self, protocol: AccessProtocol) -> Vec<String> {
        self.initiators
            .iter()
            .filter(|i| i.protocol == protocol)
            .map(|i| i.port_name.clone())
            .collect()
    }
}

/// A registered compute host
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Host {
    pub id: String,
    pub host_name: String,
    #[serde(default)]
    pub ip: String,
    #[serde(default)]
    pub os_type: String,
    #[serde(default)]
    pub availability_zones: Vec<String>,
    #[serde(default)]
    pub initiators: Vec<Initiator>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Host {
    pub fn host_info(&self) -> HostInfo {
        HostInfo {
            host: self.host_name.clone(),
            ip: self.ip.clone(),
            os_type: self.os_type.clone(),
            initiators: self.initiators.clone(),
        }
    }
}

/// iSCSI connection descriptor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IscsiConnection {
    pub target_discovered: bool,
    #[serde(rename = "targetIQN")]
    pub target_iqns: Vec<String>,
    pub target_portals: Vec<String>,
    pub target_lun: i64,
    pub discard: bool,
}

/// Fibre Channel connection descriptor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FibreChannelConnection {
    pub target_discovered: bool,
    #[serde(rename = "targetWWNs")]
    pub target_wwns: Vec<String>,
    pub volume_id: String,
    pub initiator_target_map: BTreeMap<String, Vec<String>>,
    pub host_name: String,
    pub target_lun: i64,
}

/// Protocol-tagged connection data returned by attach
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "driverVolumeType", content = "connectionData", rename_all = "snake_case")]
pub enum ConnectionInfo {
    Iscsi(IscsiConnection),
    FibreChannel(FibreChannelConnection),
}

impl ConnectionInfo {
    pub fn protocol(&self) -> AccessProtocol {
        match self {
            ConnectionInfo::Iscsi(_) => AccessProtocol::Iscsi,
            ConnectionInfo::FibreChannel(_) => AccessProtocol::FibreChannel,
        }
    }

    pub fn target_lun(&self) -> i64 {
        match self {
            ConnectionInfo::Iscsi(c) => c.target_lun,
            ConnectionInfo::FibreChannel(c) => c.target_lun,
        }
    }
}

/// A host-to-volume path
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VolumeAttachment {
    pub id: String,
    pub host_id: String,
    pub volume_id: String,
    pub access_protocol: AccessProtocol,
    #[serde(default)]
    pub attach_mode: AttachMode,
    #[serde(default)]
    pub status: AttachmentStatus,
    #[serde(default)]
    pub connection_info: Option<ConnectionInfo>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

// =============================================================================
// Replication & Metrics
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplicationStatus {
    #[default]
    Creating,
    Available,
    Enabled,
    Disabled,
    FailedOver,
    Deleting,
    Error,
}

/// A primary/secondary volume pair kept in sync by a replication driver
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Replication {
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub primary_volume_id: String,
    pub secondary_volume_id: String,
    #[serde(default)]
    pub replication_type: ReplicationType,
    #[serde(default)]
    pub status: ReplicationStatus,
    /// Driver-private data, returned on every later call
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

/// One sample collected by a metric driver
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Metric {
    /// Resource the sample describes, e.g. a pool id
    pub instance_id: String,
    #[serde(default)]
    pub instance_name: String,
    pub name: String,
    pub unit: String,
    pub value: f64,
    pub timestamp: DateTime<Utc>,
}
