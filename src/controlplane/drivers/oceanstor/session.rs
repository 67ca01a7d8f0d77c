//! Array Session Port
//!
//! Authenticated access to one OceanStor array: LUNs, snapshots, LUN copies,
//! hosts, initiators, zoning groups, pools and target ports. The REST client
//! in [`super::rest`] is the production implementation; tests drive the
//! provisioner and the connection manager through an in-memory array.
//!
//! Lookup methods return [`Error::ObjectNotFound`] when the object is absent,
//! `create_lun` with an explicit id returns [`Error::IdInUse`] on collision,
//! and everything else the array rejects surfaces as [`Error::Backend`].

use crate::allocation::LunInventory;
use crate::domain::model::{HostInfo, ProvisioningPolicy};
use crate::error::Result;
use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

// =============================================================================
// Constants
// =============================================================================

/// Bytes per array sector
pub const SECTOR_SIZE: i64 = 512;

/// Longest object name the array accepts
pub const MAX_NAME_LENGTH: usize = 31;

/// Longest description the array accepts
pub const MAX_DESCRIPTION_LENGTH: usize = 170;

/// Health status of a healthy LUN
pub const STATUS_HEALTH_NORMAL: &str = "1";

/// Health status of a LUN the array has given up on
pub const STATUS_HEALTH_FAULTY: &str = "2";

/// Running status of an online LUN or initiator
pub const STATUS_RUNNING_ONLINE: &str = "27";

pub const PREFIX_HOST_GROUP: &str = "OpenSDS_HostGroup_";
pub const PREFIX_LUN_GROUP: &str = "OpenSDS_LunGroup_";
pub const PREFIX_MAPPING_VIEW: &str = "OpenSDS_MappingView_";

/// iSCSI portal port
pub const ISCSI_PORT: u16 = 3260;

/// Default LUN copy speed (medium)
pub const DEFAULT_COPY_SPEED: i32 = 2;

// =============================================================================
// Array Objects
// =============================================================================

/// A LUN as reported by the array
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Lun {
    pub id: String,
    pub name: String,
    pub description: String,
    /// Capacity in sectors
    pub capacity: i64,
    pub wwn: String,
    pub health_status: String,
    pub running_status: String,
    /// Owning storage pool id
    pub parent_id: String,
    /// Owning storage pool name
    pub parent_name: String,
}

impl Lun {
    /// Healthy and online
    pub fn is_ready(&self) -> bool {
        self.health_status == STATUS_HEALTH_NORMAL && self.running_status == STATUS_RUNNING_ONLINE
    }

    pub fn is_faulty(&self) -> bool {
        self.health_status == STATUS_HEALTH_FAULTY
    }
}

/// Parameters for a new LUN
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateLunParams {
    pub name: String,
    pub description: String,
    pub pool_id: String,
    /// Capacity in sectors
    pub capacity: i64,
    pub policy: ProvisioningPolicy,
    /// Explicit LUN id; the array picks one when absent
    pub id: Option<i64>,
}

/// A storage pool as reported by the array
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArrayPool {
    pub id: String,
    pub name: String,
    /// Sectors
    pub user_total_capacity: i64,
    /// Sectors
    pub user_free_capacity: i64,
}

/// A snapshot as reported by the array
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArraySnapshot {
    pub id: String,
    pub name: String,
    pub description: String,
    /// Source LUN id
    pub parent_id: String,
}

/// An iSCSI initiator registration
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IscsiInitiator {
    pub iqn: String,
    /// Host the initiator is bound to
    pub parent_id: Option<String>,
}

/// A Fibre Channel initiator port
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FcInitiator {
    pub wwn: String,
    pub running_status: String,
    /// Host the port is bound to
    pub parent_id: Option<String>,
}

impl FcInitiator {
    pub fn is_online(&self) -> bool {
        self.running_status == STATUS_RUNNING_ONLINE
    }
}

/// Target ports and the initiator-to-target map of a set of FC initiators
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FcTargets {
    pub target_wwns: Vec<String>,
    pub initiator_target_map: BTreeMap<String, Vec<String>>,
}

// =============================================================================
// Session Port
// =============================================================================

/// Authenticated session with one array
#[async_trait]
pub trait ArraySession: Send + Sync {
    async fn login(&self) -> Result<()>;

    async fn logout(&self) -> Result<()>;

    // --- LUNs ---------------------------------------------------------------

    async fn create_lun(&self, params: &CreateLunParams) -> Result<Lun>;

    async fn get_lun(&self, id: &str) -> Result<Lun>;

    async fn get_lun_by_name(&self, name: &str) -> Result<Lun>;

    async fn delete_lun(&self, id: &str) -> Result<()>;

    /// Resize to `capacity` sectors
    async fn extend_lun(&self, id: &str, capacity: i64) -> Result<()>;

    /// Ids of the LUNs at positions `[start, end)` ordered by id
    async fn list_lun_ids(&self, start: i64, end: i64) -> Result<Vec<i64>>;

    // --- Pools --------------------------------------------------------------

    async fn list_storage_pools(&self) -> Result<Vec<ArrayPool>>;

    async fn get_pool_id_by_name(&self, name: &str) -> Result<String> {
        self.list_storage_pools()
            .await?
            .into_iter()
            .find(|p| p.name == name)
            .map(|p| p.id)
            .ok_or_else(|| crate::error::Error::not_found("storage pool", name))
    }

    // --- Snapshots ----------------------------------------------------------

    /// Create and activate a snapshot of `lun_id`
    async fn create_snapshot(
        &self,
        lun_id: &str,
        name: &str,
        description: &str,
    ) -> Result<ArraySnapshot>;

    async fn get_snapshot_by_name(&self, name: &str) -> Result<ArraySnapshot>;

    async fn delete_snapshot(&self, id: &str) -> Result<()>;

    // --- LUN copy -----------------------------------------------------------

    /// Returns the copy job id
    async fn create_lun_copy(
        &self,
        name: &str,
        source_id: &str,
        target_id: &str,
        speed: i32,
    ) -> Result<String>;

    async fn start_lun_copy(&self, id: &str) -> Result<()>;

    /// Fails while the copy is still running
    async fn delete_lun_copy(&self, id: &str) -> Result<()>;

    // --- Hosts --------------------------------------------------------------

    /// Host id by array host name
    async fn get_host_id_by_name(&self, name: &str) -> Result<String>;

    /// Create a host object named `name`; returns its id
    async fn add_host(&self, name: &str, host: &HostInfo) -> Result<String>;

    async fn delete_host(&self, host_id: &str) -> Result<()>;

    // --- Initiators ---------------------------------------------------------

    async fn get_iscsi_initiator(&self, iqn: &str) -> Result<IscsiInitiator>;

    async fn add_iscsi_initiator(&self, iqn: &str) -> Result<()>;

    async fn add_iscsi_initiator_to_host(&self, iqn: &str, host_id: &str) -> Result<()>;

    async fn remove_iscsi_from_host(&self, iqn: &str) -> Result<()>;

    async fn host_iscsi_initiators(&self, host_id: &str) -> Result<Vec<String>>;

    async fn get_fc_initiator(&self, wwn: &str) -> Result<FcInitiator>;

    async fn add_fc_port_to_host(&self, wwn: &str, host_id: &str) -> Result<()>;

    async fn remove_fc_from_host(&self, wwn: &str) -> Result<()>;

    async fn host_fc_initiators(&self, host_id: &str) -> Result<Vec<String>>;

    async fn get_ini_targ_map(&self, wwns: &[String]) -> Result<FcTargets>;

    // --- Host groups --------------------------------------------------------

    async fn find_host_group(&self, name: &str) -> Result<String>;

    async fn create_host_group(&self, name: &str) -> Result<String>;

    async fn host_group_hosts(&self, group_id: &str) -> Result<Vec<String>>;

    async fn add_host_to_host_group(&self, group_id: &str, host_id: &str) -> Result<()>;

    async fn remove_host_from_host_group(&self, group_id: &str, host_id: &str) -> Result<()>;

    async fn delete_host_group(&self, group_id: &str) -> Result<()>;

    // --- LUN groups ---------------------------------------------------------

    async fn find_lun_group(&self, name: &str) -> Result<String>;

    async fn create_lun_group(&self, name: &str) -> Result<String>;

    async fn lun_group_luns(&self, group_id: &str) -> Result<Vec<String>>;

    async fn add_lun_to_lun_group(&self, group_id: &str, lun_id: &str) -> Result<()>;

    async fn remove_lun_from_lun_group(&self, group_id: &str, lun_id: &str) -> Result<()>;

    async fn delete_lun_group(&self, group_id: &str) -> Result<()>;

    // --- Mapping views ------------------------------------------------------

    async fn find_mapping_view(&self, name: &str) -> Result<String>;

    async fn create_mapping_view(&self, name: &str) -> Result<String>;

    async fn mapping_view_has_host_group(&self, view_id: &str, group_id: &str) -> Result<bool>;

    async fn mapping_view_has_lun_group(&self, view_id: &str, group_id: &str) -> Result<bool>;

    async fn associate_host_group(&self, view_id: &str, group_id: &str) -> Result<()>;

    async fn associate_lun_group(&self, view_id: &str, group_id: &str) -> Result<()>;

    async fn remove_host_group_from_view(&self, view_id: &str, group_id: &str) -> Result<()>;

    async fn remove_lun_group_from_view(&self, view_id: &str, group_id: &str) -> Result<()>;

    async fn delete_mapping_view(&self, view_id: &str) -> Result<()>;

    // --- Mapping results ----------------------------------------------------

    /// LUN number the host sees for `lun_id`
    async fn get_host_lun_id(&self, host_id: &str, lun_id: &str) -> Result<i64>;

    /// Raw iSCSI target port ids (`"0+iqn...,t,0x01"`)
    async fn list_iscsi_target_ports(&self) -> Result<Vec<String>>;
}

#[async_trait]
impl<S> LunInventory for S
where
    S: ArraySession + ?Sized,
{
    async fn lun_ids_by_range(&self, start: i64, end: i64) -> Result<Vec<i64>> {
        self.list_lun_ids(start, end).await
    }
}

// =============================================================================
// Naming & Units
// =============================================================================

fn hex_digest(input: &str) -> String {
    Sha256::digest(input.as_bytes())
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect()
}

/// Array object name for a dock resource id
///
/// Keeps the id's first `-` segment as a readable prefix and fills the rest
/// of the 31 bytes with a digest of the full id. The prefix is cut at a
/// char boundary so multibyte ids never exceed the limit.
pub fn encode_name(id: &str) -> String {
    let mut name = String::with_capacity(MAX_NAME_LENGTH);
    for c in id.split('-').next().unwrap_or_default().chars() {
        if name.len() + c.len_utf8() > MAX_NAME_LENGTH / 2 {
            break;
        }
        name.push(c);
    }
    name.push('-');

    let digest = hex_digest(id);
    let remaining = MAX_NAME_LENGTH.saturating_sub(name.len());
    name.push_str(digest.get(..remaining).unwrap_or(&digest));
    name
}

/// Array host name for a compute host name
pub fn encode_host_name(host: &str) -> String {
    let allowed = |c: char| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.');
    if host.len() > MAX_NAME_LENGTH || host.is_empty() || !host.chars().all(allowed) {
        let digest = hex_digest(host);
        return digest[..MAX_NAME_LENGTH].to_string();
    }
    host.to_string()
}

pub fn truncate_description(description: &str) -> String {
    description.chars().take(MAX_DESCRIPTION_LENGTH).collect()
}

pub fn sector_to_gb(sectors: i64) -> i64 {
    sectors * SECTOR_SIZE / (1 << 30)
}

pub fn gb_to_sector(gb: i64) -> i64 {
    gb * ((1 << 30) / SECTOR_SIZE)
}

/// IQN and IP of an iSCSI target port id such as
/// `0+iqn.2006-08.com.huawei:oceanstor:21000022a10a2a39::20400:192.168.1.10,t,0x0101`
pub fn parse_target_port(port_id: &str) -> Option<(String, String)> {
    let head = port_id.split(',').next()?;
    let iqn = head.split('+').nth(1)?;
    let ip = iqn.rsplit(':').next()?;
    if ip.is_empty() {
        return None;
    }
    Some((iqn.to_string(), ip.to_string()))
}

pub fn host_group_name(host_id: &str) -> String {
    format!("{}{}", PREFIX_HOST_GROUP, host_id)
}

pub fn lun_group_name(host_id: &str) -> String {
    format!("{}{}", PREFIX_LUN_GROUP, host_id)
}

pub fn mapping_view_name(host_id: &str) -> String {
    format!("{}{}", PREFIX_MAPPING_VIEW, host_id)
}
