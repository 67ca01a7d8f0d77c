//! In-memory array for driver tests
//!
//! Keeps LUNs, snapshots, copy jobs, hosts, initiators and zoning objects in
//! plain maps, records every mutating call and can be told to fail an
//! operation, delay LUN readiness or keep copy jobs running for a while.

use super::session::{
    ArrayPool, ArraySession, ArraySnapshot, CreateLunParams, FcInitiator, FcTargets,
    IscsiInitiator, Lun, STATUS_HEALTH_NORMAL, STATUS_RUNNING_ONLINE,
};
use crate::domain::model::HostInfo;
use crate::error::{Error, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{BTreeMap, BTreeSet, HashSet};

const STATUS_RUNNING_INITIALIZING: &str = "53";

#[derive(Debug, Default)]
struct Group {
    name: String,
    members: BTreeSet<String>,
}

#[derive(Debug, Default)]
struct View {
    name: String,
    host_groups: BTreeSet<String>,
    lun_groups: BTreeSet<String>,
}

#[derive(Debug)]
struct CopyJob {
    target: String,
    started: bool,
    remaining_polls: u32,
}

#[derive(Debug, Default)]
struct ArrayState {
    next_object_id: u64,
    pools: Vec<ArrayPool>,
    luns: BTreeMap<i64, Lun>,
    /// Polls left before a LUN reports online
    warming: BTreeMap<String, u32>,
    snapshots: BTreeMap<String, ArraySnapshot>,
    copies: BTreeMap<String, CopyJob>,
    hosts: BTreeMap<String, String>,
    iscsi: BTreeMap<String, Option<String>>,
    fc: BTreeMap<String, FcInitiator>,
    fc_links: BTreeMap<String, Vec<String>>,
    host_groups: BTreeMap<String, Group>,
    lun_groups: BTreeMap<String, Group>,
    views: BTreeMap<String, View>,
    host_lun_ids: BTreeMap<(String, String), i64>,
    target_ports: Vec<String>,
    lun_ready_after: u32,
    /// Health reported by LUNs created from now on
    new_lun_health: Option<String>,
    copy_polls: u32,
}

impl ArrayState {
    fn next_id(&mut self) -> String {
        self.next_object_id += 1;
        self.next_object_id.to_string()
    }

    fn lun_mut(&mut self, id: &str) -> Result<&mut Lun> {
        id.parse::<i64>()
            .ok()
            .and_then(|n| self.luns.get_mut(&n))
            .ok_or_else(|| Error::not_found("lun", id))
    }

    fn find_group(groups: &BTreeMap<String, Group>, name: &str, kind: &str) -> Result<String> {
        groups
            .iter()
            .find(|(_, g)| g.name == name)
            .map(|(id, _)| id.clone())
            .ok_or_else(|| Error::not_found(kind, name))
    }

    fn is_mapped(&self, host_id: &str, lun_id: &str) -> bool {
        self.views.values().any(|view| {
            view.host_groups.iter().any(|hg| {
                self.host_groups
                    .get(hg)
                    .map_or(false, |g| g.members.contains(host_id))
            }) && view.lun_groups.iter().any(|lg| {
                self.lun_groups
                    .get(lg)
                    .map_or(false, |g| g.members.contains(lun_id))
            })
        })
    }
}

/// In-memory stand-in for an OceanStor array
#[derive(Default)]
pub struct FakeArray {
    state: Mutex<ArrayState>,
    failing: Mutex<HashSet<&'static str>>,
    mutations: Mutex<Vec<String>>,
}

impl FakeArray {
    pub fn new() -> Self {
        let array = Self::default();
        array.add_pool("0", "StoragePool001", 100, 80);
        array
    }

    pub fn add_pool(&self, id: &str, name: &str, total_gb: i64, free_gb: i64) {
        let sectors_per_gb = (1 << 30) / 512;
        self.state.lock().pools.push(ArrayPool {
            id: id.into(),
            name: name.into(),
            user_total_capacity: total_gb * sectors_per_gb,
            user_free_capacity: free_gb * sectors_per_gb,
        });
    }

    pub fn remove_pool(&self, name: &str) {
        self.state.lock().pools.retain(|p| p.name != name);
    }

    /// Occupy a LUN id without going through the driver
    pub fn occupy_lun_id(&self, id: i64) {
        self.state.lock().luns.insert(
            id,
            Lun {
                id: id.to_string(),
                name: format!("external-{}", id),
                health_status: STATUS_HEALTH_NORMAL.into(),
                running_status: STATUS_RUNNING_ONLINE.into(),
                ..Default::default()
            },
        );
    }

    pub fn add_fc_initiator(&self, wwn: &str, online: bool, targets: &[&str]) {
        let mut state = self.state.lock();
        state.fc.insert(
            wwn.into(),
            FcInitiator {
                wwn: wwn.into(),
                running_status: if online { STATUS_RUNNING_ONLINE.into() } else { "28".into() },
                parent_id: None,
            },
        );
        state
            .fc_links
            .insert(wwn.into(), targets.iter().map(|t| t.to_string()).collect());
    }

    pub fn bind_iscsi_initiator(&self, iqn: &str, host_id: &str) {
        self.state
            .lock()
            .iscsi
            .insert(iqn.into(), Some(host_id.into()));
    }

    pub fn add_target_port(&self, port_id: &str) {
        self.state.lock().target_ports.push(port_id.into());
    }

    /// Make every call of `op` fail with a backend error
    pub fn fail(&self, op: &'static str) {
        self.failing.lock().insert(op);
    }

    /// LUNs created from now on report online after `polls` reads
    pub fn set_lun_ready_after(&self, polls: u32) {
        self.state.lock().lun_ready_after = polls;
    }

    /// LUNs created from now on report `status` as their health
    pub fn set_new_lun_health(&self, status: &str) {
        self.state.lock().new_lun_health = Some(status.into());
    }

    /// Copy jobs refuse deletion for `polls` attempts after start
    pub fn set_copy_polls(&self, polls: u32) {
        self.state.lock().copy_polls = polls;
    }

    pub fn mutations(&self) -> Vec<String> {
        self.mutations.lock().clone()
    }

    pub fn clear_mutations(&self) {
        self.mutations.lock().clear();
    }

    pub fn lun_ids(&self) -> Vec<i64> {
        self.state.lock().luns.keys().copied().collect()
    }

    pub fn lun_count(&self) -> usize {
        self.state.lock().luns.len()
    }

    pub fn copy_count(&self) -> usize {
        self.state.lock().copies.len()
    }

    pub fn host_count(&self) -> usize {
        self.state.lock().hosts.len()
    }

    pub fn host_group_count(&self) -> usize {
        self.state.lock().host_groups.len()
    }

    pub fn lun_group_count(&self) -> usize {
        self.state.lock().lun_groups.len()
    }

    pub fn view_count(&self) -> usize {
        self.state.lock().views.len()
    }

    fn check(&self, op: &'static str) -> Result<()> {
        if self.failing.lock().contains(op) {
            return Err(Error::Backend {
                code: 50331651,
                description: format!("injected failure in {}", op),
            });
        }
        Ok(())
    }

    fn mutate(&self, op: &'static str, target: &str) -> Result<()> {
        self.check(op)?;
        self.mutations.lock().push(format!("{} {}", op, target));
        Ok(())
    }
}

#[async_trait]
impl ArraySession for FakeArray {
    async fn login(&self) -> Result<()> {
        self.check("login")
    }

    async fn logout(&self) -> Result<()> {
        self.check("logout")
    }

    async fn create_lun(&self, params: &CreateLunParams) -> Result<Lun> {
        self.mutate("create_lun", &params.name)?;
        let mut state = self.state.lock();
        let id = match params.id {
            Some(id) if state.luns.contains_key(&id) => return Err(Error::IdInUse { id }),
            Some(id) => id,
            None => state.luns.keys().next_back().map_or(0, |last| last + 1),
        };

        let warming = state.lun_ready_after;
        let lun = Lun {
            id: id.to_string(),
            name: params.name.clone(),
            description: params.description.clone(),
            capacity: params.capacity,
            wwn: format!("6{:031x}", id),
            health_status: state
                .new_lun_health
                .clone()
                .unwrap_or_else(|| STATUS_HEALTH_NORMAL.into()),
            running_status: STATUS_RUNNING_ONLINE.into(),
            parent_id: params.pool_id.clone(),
            parent_name: state
                .pools
                .iter()
                .find(|p| p.id == params.pool_id)
                .map(|p| p.name.clone())
                .unwrap_or_default(),
        };
        if warming > 0 {
            state.warming.insert(lun.id.clone(), warming);
        }
        state.luns.insert(id, lun.clone());
        Ok(lun)
    }

    async fn get_lun(&self, id: &str) -> Result<Lun> {
        self.check("get_lun")?;
        let mut state = self.state.lock();
        let warming = match state.warming.get_mut(id) {
            Some(left) if *left > 0 => {
                *left -= 1;
                true
            }
            _ => false,
        };
        let mut lun = state.lun_mut(id)?.clone();
        if warming {
            lun.running_status = STATUS_RUNNING_INITIALIZING.into();
        }
        Ok(lun)
    }

    async fn get_lun_by_name(&self, name: &str) -> Result<Lun> {
        self.check("get_lun_by_name")?;
        self.state
            .lock()
            .luns
            .values()
            .find(|l| l.name == name)
            .cloned()
            .ok_or_else(|| Error::not_found("lun", name))
    }

    async fn delete_lun(&self, id: &str) -> Result<()> {
        self.mutate("delete_lun", id)?;
        let mut state = self.state.lock();
        let numeric = id.parse::<i64>().unwrap_or(-1);
        state
            .luns
            .remove(&numeric)
            .map(|_| ())
            .ok_or_else(|| Error::not_found("lun", id))
    }

    async fn extend_lun(&self, id: &str, capacity: i64) -> Result<()> {
        self.mutate("extend_lun", id)?;
        self.state.lock().lun_mut(id)?.capacity = capacity;
        Ok(())
    }

    async fn list_lun_ids(&self, start: i64, end: i64) -> Result<Vec<i64>> {
        self.check("list_lun_ids")?;
        Ok(self
            .state
            .lock()
            .luns
            .keys()
            .skip(start as usize)
            .take((end - start) as usize)
            .copied()
            .collect())
    }

    async fn list_storage_pools(&self) -> Result<Vec<ArrayPool>> {
        self.check("list_storage_pools")?;
        Ok(self.state.lock().pools.clone())
    }

    async fn create_snapshot(
        &self,
        lun_id: &str,
        name: &str,
        description: &str,
    ) -> Result<ArraySnapshot> {
        self.mutate("create_snapshot", name)?;
        let mut state = self.state.lock();
        state.lun_mut(lun_id)?;
        let snapshot = ArraySnapshot {
            id: state.next_id(),
            name: name.into(),
            description: description.into(),
            parent_id: lun_id.into(),
        };
        state.snapshots.insert(snapshot.id.clone(), snapshot.clone());
        Ok(snapshot)
    }

    async fn get_snapshot_by_name(&self, name: &str) -> Result<ArraySnapshot> {
        self.check("get_snapshot_by_name")?;
        self.state
            .lock()
            .snapshots
            .values()
            .find(|s| s.name == name)
            .cloned()
            .ok_or_else(|| Error::not_found("snapshot", name))
    }

    async fn delete_snapshot(&self, id: &str) -> Result<()> {
        self.mutate("delete_snapshot", id)?;
        self.state
            .lock()
            .snapshots
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| Error::not_found("snapshot", id))
    }

    async fn create_lun_copy(
        &self,
        name: &str,
        _source_id: &str,
        target_id: &str,
        _speed: i32,
    ) -> Result<String> {
        self.mutate("create_lun_copy", name)?;
        let mut state = self.state.lock();
        let id = state.next_id();
        let remaining_polls = state.copy_polls;
        state.copies.insert(
            id.clone(),
            CopyJob {
                target: target_id.into(),
                started: false,
                remaining_polls,
            },
        );
        Ok(id)
    }

    async fn start_lun_copy(&self, id: &str) -> Result<()> {
        self.mutate("start_lun_copy", id)?;
        let mut state = self.state.lock();
        let job = state
            .copies
            .get_mut(id)
            .ok_or_else(|| Error::not_found("lun copy", id))?;
        job.started = true;
        Ok(())
    }

    async fn delete_lun_copy(&self, id: &str) -> Result<()> {
        self.mutate("delete_lun_copy", id)?;
        let mut state = self.state.lock();
        let job = state
            .copies
            .get_mut(id)
            .ok_or_else(|| Error::not_found("lun copy", id))?;
        if job.started && job.remaining_polls > 0 {
            job.remaining_polls -= 1;
            return Err(Error::Backend {
                code: 1077950181,
                description: format!("LUN copy to {} is still running", job.target),
            });
        }
        state.copies.remove(id);
        Ok(())
    }

    async fn get_host_id_by_name(&self, name: &str) -> Result<String> {
        self.check("get_host_id_by_name")?;
        self.state
            .lock()
            .hosts
            .iter()
            .find(|(_, n)| n.as_str() == name)
            .map(|(id, _)| id.clone())
            .ok_or_else(|| Error::not_found("host", name))
    }

    async fn add_host(&self, name: &str, _host: &HostInfo) -> Result<String> {
        self.mutate("add_host", name)?;
        let mut state = self.state.lock();
        let id = state.next_id();
        state.hosts.insert(id.clone(), name.into());
        Ok(id)
    }

    async fn delete_host(&self, host_id: &str) -> Result<()> {
        self.mutate("delete_host", host_id)?;
        self.state
            .lock()
            .hosts
            .remove(host_id)
            .map(|_| ())
            .ok_or_else(|| Error::not_found("host", host_id))
    }

    async fn get_iscsi_initiator(&self, iqn: &str) -> Result<IscsiInitiator> {
        self.check("get_iscsi_initiator")?;
        self.state
            .lock()
            .iscsi
            .get(iqn)
            .map(|parent| IscsiInitiator {
                iqn: iqn.into(),
                parent_id: parent.clone(),
            })
            .ok_or_else(|| Error::not_found("iscsi initiator", iqn))
    }

    async fn add_iscsi_initiator(&self, iqn: &str) -> Result<()> {
        self.mutate("add_iscsi_initiator", iqn)?;
        self.state.lock().iscsi.insert(iqn.into(), None);
        Ok(())
    }

    async fn add_iscsi_initiator_to_host(&self, iqn: &str, host_id: &str) -> Result<()> {
        self.mutate("add_iscsi_initiator_to_host", iqn)?;
        let mut state = self.state.lock();
        let parent = state
            .iscsi
            .get_mut(iqn)
            .ok_or_else(|| Error::not_found("iscsi initiator", iqn))?;
        *parent = Some(host_id.into());
        Ok(())
    }

    async fn remove_iscsi_from_host(&self, iqn: &str) -> Result<()> {
        self.mutate("remove_iscsi_from_host", iqn)?;
        let mut state = self.state.lock();
        let parent = state
            .iscsi
            .get_mut(iqn)
            .ok_or_else(|| Error::not_found("iscsi initiator", iqn))?;
        *parent = None;
        Ok(())
    }

    async fn host_iscsi_initiators(&self, host_id: &str) -> Result<Vec<String>> {
        self.check("host_iscsi_initiators")?;
        Ok(self
            .state
            .lock()
            .iscsi
            .iter()
            .filter(|(_, parent)| parent.as_deref() == Some(host_id))
            .map(|(iqn, _)| iqn.clone())
            .collect())
    }

    async fn get_fc_initiator(&self, wwn: &str) -> Result<FcInitiator> {
        self.check("get_fc_initiator")?;
        self.state
            .lock()
            .fc
            .get(wwn)
            .cloned()
            .ok_or_else(|| Error::not_found("fc initiator", wwn))
    }

    async fn add_fc_port_to_host(&self, wwn: &str, host_id: &str) -> Result<()> {
        self.mutate("add_fc_port_to_host", wwn)?;
        let mut state = self.state.lock();
        let initiator = state
            .fc
            .get_mut(wwn)
            .ok_or_else(|| Error::not_found("fc initiator", wwn))?;
        initiator.parent_id = Some(host_id.into());
        Ok(())
    }

    async fn remove_fc_from_host(&self, wwn: &str) -> Result<()> {
        self.mutate("remove_fc_from_host", wwn)?;
        let mut state = self.state.lock();
        let initiator = state
            .fc
            .get_mut(wwn)
            .ok_or_else(|| Error::not_found("fc initiator", wwn))?;
        initiator.parent_id = None;
        Ok(())
    }

    async fn host_fc_initiators(&self, host_id: &str) -> Result<Vec<String>> {
        self.check("host_fc_initiators")?;
        Ok(self
            .state
            .lock()
            .fc
            .values()
            .filter(|i| i.parent_id.as_deref() == Some(host_id))
            .map(|i| i.wwn.clone())
            .collect())
    }

    async fn get_ini_targ_map(&self, wwns: &[String]) -> Result<FcTargets> {
        self.check("get_ini_targ_map")?;
        let state = self.state.lock();
        let mut targets = FcTargets::default();
        for wwn in wwns {
            let ports = state.fc_links.get(wwn).cloned().unwrap_or_default();
            for port in &ports {
                if !targets.target_wwns.contains(port) {
                    targets.target_wwns.push(port.clone());
                }
            }
            targets.initiator_target_map.insert(wwn.clone(), ports);
        }
        Ok(targets)
    }

    async fn find_host_group(&self, name: &str) -> Result<String> {
        self.check("find_host_group")?;
        ArrayState::find_group(&self.state.lock().host_groups, name, "host group")
    }

    async fn create_host_group(&self, name: &str) -> Result<String> {
        self.mutate("create_host_group", name)?;
        let mut state = self.state.lock();
        let id = state.next_id();
        state.host_groups.insert(
            id.clone(),
            Group {
                name: name.into(),
                ..Default::default()
            },
        );
        Ok(id)
    }

    async fn host_group_hosts(&self, group_id: &str) -> Result<Vec<String>> {
        self.check("host_group_hosts")?;
        self.state
            .lock()
            .host_groups
            .get(group_id)
            .map(|g| g.members.iter().cloned().collect())
            .ok_or_else(|| Error::not_found("host group", group_id))
    }

    async fn add_host_to_host_group(&self, group_id: &str, host_id: &str) -> Result<()> {
        self.mutate("add_host_to_host_group", group_id)?;
        self.state
            .lock()
            .host_groups
            .get_mut(group_id)
            .ok_or_else(|| Error::not_found("host group", group_id))?
            .members
            .insert(host_id.into());
        Ok(())
    }

    async fn remove_host_from_host_group(&self, group_id: &str, host_id: &str) -> Result<()> {
        self.mutate("remove_host_from_host_group", group_id)?;
        self.state
            .lock()
            .host_groups
            .get_mut(group_id)
            .ok_or_else(|| Error::not_found("host group", group_id))?
            .members
            .remove(host_id);
        Ok(())
    }

    async fn delete_host_group(&self, group_id: &str) -> Result<()> {
        self.mutate("delete_host_group", group_id)?;
        self.state
            .lock()
            .host_groups
            .remove(group_id)
            .map(|_| ())
            .ok_or_else(|| Error::not_found("host group", group_id))
    }

    async fn find_lun_group(&self, name: &str) -> Result<String> {
        self.check("find_lun_group")?;
        ArrayState::find_group(&self.state.lock().lun_groups, name, "lun group")
    }

    async fn create_lun_group(&self, name: &str) -> Result<String> {
        self.mutate("create_lun_group", name)?;
        let mut state = self.state.lock();
        let id = state.next_id();
        state.lun_groups.insert(
            id.clone(),
            Group {
                name: name.into(),
                ..Default::default()
            },
        );
        Ok(id)
    }

    async fn lun_group_luns(&self, group_id: &str) -> Result<Vec<String>> {
        self.check("lun_group_luns")?;
        self.state
            .lock()
            .lun_groups
            .get(group_id)
            .map(|g| g.members.iter().cloned().collect())
            .ok_or_else(|| Error::not_found("lun group", group_id))
    }

    async fn add_lun_to_lun_group(&self, group_id: &str, lun_id: &str) -> Result<()> {
        self.mutate("add_lun_to_lun_group", group_id)?;
        self.state
            .lock()
            .lun_groups
            .get_mut(group_id)
            .ok_or_else(|| Error::not_found("lun group", group_id))?
            .members
            .insert(lun_id.into());
        Ok(())
    }

    async fn remove_lun_from_lun_group(&self, group_id: &str, lun_id: &str) -> Result<()> {
        self.mutate("remove_lun_from_lun_group", group_id)?;
        self.state
            .lock()
            .lun_groups
            .get_mut(group_id)
            .ok_or_else(|| Error::not_found("lun group", group_id))?
            .members
            .remove(lun_id);
        Ok(())
    }

    async fn delete_lun_group(&self, group_id: &str) -> Result<()> {
        self.mutate("delete_lun_group", group_id)?;
        self.state
            .lock()
            .lun_groups
            .remove(group_id)
            .map(|_| ())
            .ok_or_else(|| Error::not_found("lun group", group_id))
    }

    async fn find_mapping_view(&self, name: &str) -> Result<String> {
        self.check("find_mapping_view")?;
        self.state
            .lock()
            .views
            .iter()
            .find(|(_, v)| v.name == name)
            .map(|(id, _)| id.clone())
            .ok_or_else(|| Error::not_found("mapping view", name))
    }

    async fn create_mapping_view(&self, name: &str) -> Result<String> {
        self.mutate("create_mapping_view", name)?;
        let mut state = self.state.lock();
        let id = state.next_id();
        state.views.insert(
            id.clone(),
            View {
                name: name.into(),
                ..Default::default()
            },
        );
        Ok(id)
    }

    async fn mapping_view_has_host_group(&self, view_id: &str, group_id: &str) -> Result<bool> {
        self.check("mapping_view_has_host_group")?;
        Ok(self
            .state
            .lock()
            .views
            .get(view_id)
            .map_or(false, |v| v.host_groups.contains(group_id)))
    }

    async fn mapping_view_has_lun_group(&self, view_id: &str, group_id: &str) -> Result<bool> {
        self.check("mapping_view_has_lun_group")?;
        Ok(self
            .state
            .lock()
            .views
            .get(view_id)
            .map_or(false, |v| v.lun_groups.contains(group_id)))
    }

    async fn associate_host_group(&self, view_id: &str, group_id: &str) -> Result<()> {
        self.mutate("associate_host_group", view_id)?;
        self.state
            .lock()
            .views
            .get_mut(view_id)
            .ok_or_else(|| Error::not_found("mapping view", view_id))?
            .host_groups
            .insert(group_id.into());
        Ok(())
    }

    async fn associate_lun_group(&self, view_id: &str, group_id: &str) -> Result<()> {
        self.mutate("associate_lun_group", view_id)?;
        self.state
            .lock()
            .views
            .get_mut(view_id)
            .ok_or_else(|| Error::not_found("mapping view", view_id))?
            .lun_groups
            .insert(group_id.into());
        Ok(())
    }

    async fn remove_host_group_from_view(&self, view_id: &str, group_id: &str) -> Result<()> {
        self.mutate("remove_host_group_from_view", view_id)?;
        self.state
            .lock()
            .views
            .get_mut(view_id)
            .ok_or_else(|| Error::not_found("mapping view", view_id))?
            .host_groups
            .remove(group_id);
        Ok(())
    }

    async fn remove_lun_group_from_view(&self, view_id: &str, group_id: &str) -> Result<()> {
        self.mutate("remove_lun_group_from_view", view_id)?;
        self.state
            .lock()
            .views
            .get_mut(view_id)
            .ok_or_else(|| Error::not_found("mapping view", view_id))?
            .lun_groups
            .remove(group_id);
        Ok(())
    }

    async fn delete_mapping_view(&self, view_id: &str) -> Result<()> {
        self.mutate("delete_mapping_view", view_id)?;
        self.state
            .lock()
            .views
            .remove(view_id)
            .map(|_| ())
            .ok_or_else(|| Error::not_found("mapping view", view_id))
    }

    async fn get_host_lun_id(&self, host_id: &str, lun_id: &str) -> Result<i64> {
        self.check("get_host_lun_id")?;
        let mut state = self.state.lock();
        if !state.is_mapped(host_id, lun_id) {
            return Err(Error::not_found("host lun", lun_id));
        }
        let key = (host_id.to_string(), lun_id.to_string());
        if let Some(id) = state.host_lun_ids.get(&key) {
            return Ok(*id);
        }
        let next = state
            .host_lun_ids
            .keys()
            .filter(|(h, _)| h == host_id)
            .count() as i64
            + 1;
        state.host_lun_ids.insert(key, next);
        Ok(next)
    }

    async fn list_iscsi_target_ports(&self) -> Result<Vec<String>> {
        self.check("list_iscsi_target_ports")?;
        Ok(self.state.lock().target_ports.clone())
    }
}
