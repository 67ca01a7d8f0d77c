//! SAN Connection Management
//!
//! Establishes and tears down host-to-LUN paths on the array. A host sees a
//! LUN through a chain of zoning objects, all named after the array host id:
//!
//! ```text
//!   host ──► host group ──┐
//!                         ├──► mapping view
//!   LUN  ──► lun group  ──┘
//! ```
//!
//! Attach creates whatever part of the chain is missing. Detach unwinds it
//! only once the host's lun group is empty, so every LUN of a host shares one
//! set of groups. Both directions check before they mutate, which makes them
//! safe to repeat. Attach and detach of one array are serialized.

use super::config::OceanStorConfig;
use super::provision::required_metadata;
use super::session::{
    encode_host_name, host_group_name, lun_group_name, mapping_view_name, parse_target_port,
    ArraySession, ISCSI_PORT,
};
use crate::domain::model::{
    AccessProtocol, ConnectionInfo, FibreChannelConnection, HostInfo, IscsiConnection, KEY_LUN_ID,
};
use crate::domain::ports::{CreateVolumeAttachmentOpts, DeleteVolumeAttachmentOpts};
use crate::error::{Error, Result};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

fn absent_if_not_found<T>(result: Result<T>) -> Result<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(e) if e.is_not_found() => Ok(None),
        Err(e) => Err(e),
    }
}

fn ignore_not_found(result: Result<()>) -> Result<()> {
    absent_if_not_found(result).map(|_| ())
}

/// Zoning objects of one host, as found on the array
#[derive(Debug, Default)]
struct MappedObjects {
    host_id: String,
    host_group: Option<String>,
    lun_group: Option<String>,
    view: Option<String>,
}

/// Attach/detach state machine of one array
pub struct ConnectionManager {
    session: Arc<dyn ArraySession>,
    config: Arc<OceanStorConfig>,
    zoning: Mutex<()>,
}

impl ConnectionManager {
    pub fn new(session: Arc<dyn ArraySession>, config: Arc<OceanStorConfig>) -> Self {
        Self {
            session,
            config,
            zoning: Mutex::new(()),
        }
    }

    // =========================================================================
    // Attach
    // =========================================================================

    pub async fn initialize_connection(
        &self,
        opts: &CreateVolumeAttachmentOpts,
    ) -> Result<ConnectionInfo> {
        let _zoning = self.zoning.lock().await;
        let lun_id = required_metadata(&opts.metadata, KEY_LUN_ID)?;
        let host = &opts.host_info;

        let host_id = self.ensure_host(host).await.map_err(|e| {
            error!("Add host failed, host name = {}, error: {}", host.host, e);
            e
        })?;

        let fc_wwns = match opts.access_protocol {
            AccessProtocol::Iscsi => {
                self.register_iscsi_initiator(host, &host_id).await?;
                Vec::new()
            }
            AccessProtocol::FibreChannel => self.register_fc_initiators(host, &host_id).await?,
        };

        let host_group = self.ensure_host_group(&host_id).await?;
        let lun_group = self.ensure_lun_group(&host_id, lun_id).await?;
        self.ensure_mapping_view(&host_id, &host_group, &lun_group)
            .await
            .map_err(|e| {
                error!(
                    "Do mapping failed, lun id = {}, host group = {}, host id = {}, error: {}",
                    lun_id, host_group, host_id, e
                );
                e
            })?;

        let target_lun = self.session.get_host_lun_id(&host_id, lun_id).await?;
        info!(
            "Attached LUN {} to host {} ({}) as host LUN {}",
            lun_id, host.host, opts.access_protocol, target_lun
        );

        match opts.access_protocol {
            AccessProtocol::Iscsi => {
                let (iqn, ip) = self.iscsi_target().await?;
                Ok(ConnectionInfo::Iscsi(IscsiConnection {
                    target_discovered: true,
                    target_iqns: vec![iqn],
                    target_portals: vec![format!("{}:{}", ip, ISCSI_PORT)],
                    target_lun,
                    discard: false,
                }))
            }
            AccessProtocol::FibreChannel => {
                let targets = self.session.get_ini_targ_map(&fc_wwns).await?;
                Ok(ConnectionInfo::FibreChannel(FibreChannelConnection {
                    target_discovered: true,
                    target_wwns: targets.target_wwns,
                    volume_id: opts.volume_id.clone(),
                    initiator_target_map: targets.initiator_target_map,
                    host_name: host.host.clone(),
                    target_lun,
                }))
            }
        }
    }

    async fn ensure_host(&self, host: &HostInfo) -> Result<String> {
        let name = encode_host_name(&host.host);
        match absent_if_not_found(self.session.get_host_id_by_name(&name).await)? {
            Some(id) => Ok(id),
            None => {
                let id = self.session.add_host(&name, host).await?;
                info!("Created array host {} ({}) for {}", name, id, host.host);
                Ok(id)
            }
        }
    }

    async fn register_iscsi_initiator(&self, host: &HostInfo, host_id: &str) -> Result<()> {
        let iqn = host.initiator(AccessProtocol::Iscsi).ok_or_else(|| {
            Error::Validation(format!("host {} has no iSCSI initiator", host.host))
        })?;

        match absent_if_not_found(self.session.get_iscsi_initiator(iqn).await)? {
            Some(initiator) => match initiator.parent_id {
                Some(parent) if parent == host_id => return Ok(()),
                Some(parent) => {
                    return Err(Error::InitiatorConflict {
                        initiator: iqn.to_string(),
                        host_id: parent,
                    })
                }
                None => {}
            },
            None => self.session.add_iscsi_initiator(iqn).await?,
        }

        self.session
            .add_iscsi_initiator_to_host(iqn, host_id)
            .await
            .map_err(|e| {
                error!(
                    "Add initiator to host failed, host id = {}, initiator = {}, error: {}",
                    host_id, iqn, e
                );
                e
            })
    }

    /// Bind the host's online FC ports; returns the ports usable for the path
    async fn register_fc_initiators(&self, host: &HostInfo, host_id: &str) -> Result<Vec<String>> {
        let mut to_add = Vec::new();
        let mut usable = Vec::new();

        for wwn in host.initiators_by_protocol(AccessProtocol::FibreChannel) {
            let initiator = match absent_if_not_found(self.session.get_fc_initiator(&wwn).await)? {
                Some(initiator) => initiator,
                None => {
                    warn!("FC initiator {} does not exist", wwn);
                    continue;
                }
            };
            if !initiator.is_online() {
                warn!("FC initiator {} is not online", wwn);
                continue;
            }
            match initiator.parent_id {
                None => to_add.push(wwn.clone()),
                Some(parent) if parent != host_id => {
                    return Err(Error::InitiatorConflict {
                        initiator: wwn,
                        host_id: parent,
                    })
                }
                Some(_) => {}
            }
            usable.push(wwn);
        }

        if usable.is_empty() {
            return Err(Error::Validation(format!(
                "host {} has no online Fibre Channel initiator",
                host.host
            )));
        }

        for wwn in &to_add {
            self.session.add_fc_port_to_host(wwn, host_id).await?;
        }
        Ok(usable)
    }

    async fn ensure_host_group(&self, host_id: &str) -> Result<String> {
        let name = host_group_name(host_id);
        let group = match absent_if_not_found(self.session.find_host_group(&name).await)? {
            Some(id) => id,
            None => self.session.create_host_group(&name).await?,
        };

        if !self
            .session
            .host_group_hosts(&group)
            .await?
            .iter()
            .any(|h| h == host_id)
        {
            self.session.add_host_to_host_group(&group, host_id).await?;
        }
        Ok(group)
    }

    async fn ensure_lun_group(&self, host_id: &str, lun_id: &str) -> Result<String> {
        let name = lun_group_name(host_id);
        let group = match absent_if_not_found(self.session.find_lun_group(&name).await)? {
            Some(id) => id,
            None => self.session.create_lun_group(&name).await?,
        };

        if !self
            .session
            .lun_group_luns(&group)
            .await?
            .iter()
            .any(|l| l == lun_id)
        {
            self.session.add_lun_to_lun_group(&group, lun_id).await?;
        }
        Ok(group)
    }

    async fn ensure_mapping_view(
        &self,
        host_id: &str,
        host_group: &str,
        lun_group: &str,
    ) -> Result<String> {
        let name = mapping_view_name(host_id);
        let view = match absent_if_not_found(self.session.find_mapping_view(&name).await)? {
            Some(id) => id,
            None => self.session.create_mapping_view(&name).await?,
        };

        if !self
            .session
            .mapping_view_has_host_group(&view, host_group)
            .await?
        {
            self.session.associate_host_group(&view, host_group).await?;
        }
        if !self
            .session
            .mapping_view_has_lun_group(&view, lun_group)
            .await?
        {
            self.session.associate_lun_group(&view, lun_group).await?;
        }
        Ok(view)
    }

    /// Target port whose IQN carries the configured target address
    async fn iscsi_target(&self) -> Result<(String, String)> {
        let target_ip = &self.config.target_ip;
        self.session
            .list_iscsi_target_ports()
            .await?
            .iter()
            .filter_map(|port| parse_target_port(port))
            .find(|(_, ip)| ip == target_ip)
            .ok_or_else(|| {
                Error::Configuration(format!(
                    "Not find configuration targetIp: {} in device",
                    target_ip
                ))
            })
    }

    // =========================================================================
    // Detach
    // =========================================================================

    pub async fn terminate_connection(&self, opts: &DeleteVolumeAttachmentOpts) -> Result<()> {
        let _zoning = self.zoning.lock().await;
        let host = &opts.host_info;
        let lun_id = opts
            .metadata
            .get(KEY_LUN_ID)
            .map(String::as_str)
            .filter(|l| !l.is_empty());

        let mapped = match self.mapped_objects(host).await? {
            Some(mapped) => mapped,
            None => {
                warn!("host({}) has been removed already, ignore it.", host.host);
                return Ok(());
            }
        };
        let host_id = mapped.host_id.as_str();

        if let Some(lun_group) = &mapped.lun_group {
            let members = absent_if_not_found(self.session.lun_group_luns(lun_group).await)?
                .unwrap_or_default();
            let mut remaining = members.len();
            if let Some(lun_id) = lun_id.filter(|l| members.iter().any(|m| m == l)) {
                ignore_not_found(self.session.remove_lun_from_lun_group(lun_group, lun_id).await)?;
                remaining -= 1;
            }
            if remaining > 0 {
                debug!(
                    "Lun group {} of host {} still holds {} LUNs",
                    lun_group, host_id, remaining
                );
                return Ok(());
            }
        }

        self.clear_zoning(&mapped).await?;
        self.release_initiators(host, host_id, opts.access_protocol)
            .await?;

        let iscsi_left = self.session.host_iscsi_initiators(host_id).await?;
        let fc_left = self.session.host_fc_initiators(host_id).await?;
        if !iscsi_left.is_empty() || !fc_left.is_empty() {
            info!(
                "Host {} keeps {} iSCSI and {} FC initiators",
                host_id,
                iscsi_left.len(),
                fc_left.len()
            );
            return Ok(());
        }

        ignore_not_found(self.session.delete_host(host_id).await)?;
        info!("Removed host {} ({})", host.host, host_id);
        Ok(())
    }

    async fn mapped_objects(&self, host: &HostInfo) -> Result<Option<MappedObjects>> {
        let name = encode_host_name(&host.host);
        let host_id = match absent_if_not_found(self.session.get_host_id_by_name(&name).await)? {
            Some(id) => id,
            None => return Ok(None),
        };

        Ok(Some(MappedObjects {
            lun_group: absent_if_not_found(
                self.session.find_lun_group(&lun_group_name(&host_id)).await,
            )?,
            host_group: absent_if_not_found(
                self.session.find_host_group(&host_group_name(&host_id)).await,
            )?,
            view: absent_if_not_found(
                self.session
                    .find_mapping_view(&mapping_view_name(&host_id))
                    .await,
            )?,
            host_id,
        }))
    }

    /// Unwind view, lun group and host group of a host whose lun group is empty
    async fn clear_zoning(&self, mapped: &MappedObjects) -> Result<()> {
        if let Some(view) = &mapped.view {
            if let Some(lun_group) = &mapped.lun_group {
                if self.session.mapping_view_has_lun_group(view, lun_group).await? {
                    ignore_not_found(self.session.remove_lun_group_from_view(view, lun_group).await)?;
                }
            }
            if let Some(host_group) = &mapped.host_group {
                if self
                    .session
                    .mapping_view_has_host_group(view, host_group)
                    .await?
                {
                    ignore_not_found(
                        self.session
                            .remove_host_group_from_view(view, host_group)
                            .await,
                    )?;
                }
            }
            ignore_not_found(self.session.delete_mapping_view(view).await)?;
        }

        if let Some(lun_group) = &mapped.lun_group {
            ignore_not_found(self.session.delete_lun_group(lun_group).await)?;
        }

        if let Some(host_group) = &mapped.host_group {
            let mut hosts = absent_if_not_found(self.session.host_group_hosts(host_group).await)?
                .unwrap_or_default();
            if hosts.iter().any(|h| *h == mapped.host_id) {
                ignore_not_found(
                    self.session
                        .remove_host_from_host_group(host_group, &mapped.host_id)
                        .await,
                )?;
                hosts.retain(|h| *h != mapped.host_id);
            }
            if hosts.is_empty() {
                ignore_not_found(self.session.delete_host_group(host_group).await)?;
            }
        }
        Ok(())
    }

    /// Unbind the initiators of `protocol` this host registered
    async fn release_initiators(
        &self,
        host: &HostInfo,
        host_id: &str,
        protocol: AccessProtocol,
    ) -> Result<()> {
        match protocol {
            AccessProtocol::Iscsi => {
                let bound = self.session.host_iscsi_initiators(host_id).await?;
                if let Some(iqn) = host.initiator(AccessProtocol::Iscsi) {
                    if bound.iter().any(|b| b == iqn) {
                        ignore_not_found(self.session.remove_iscsi_from_host(iqn).await)?;
                    }
                }
            }
            AccessProtocol::FibreChannel => {
                let bound = self.session.host_fc_initiators(host_id).await?;
                for wwn in host.initiators_by_protocol(AccessProtocol::FibreChannel) {
                    if bound.contains(&wwn) {
                        ignore_not_found(self.session.remove_fc_from_host(&wwn).await)?;
                    }
                }
            }
        }
        Ok(())
    }
}
