//! In-Memory Store
//!
//! [`Store`] backed by one `DashMap` per record type. Docks and pools are
//! upserted on create, since discovery reports the same records every pass;
//! other record types conflict on an existing id.

use super::{ListOptions, Record, Store};
use crate::domain::model::{
    Dock, Host, StoragePool, Volume, VolumeAttachment, VolumeSnapshot,
};
use crate::error::{Error, Result};
use async_trait::async_trait;
use chrono::Utc;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

/// One record table
struct Table<T: Record> {
    rows: DashMap<String, T>,
}

impl<T: Record> Default for Table<T> {
    fn default() -> Self {
        Self {
            rows: DashMap::new(),
        }
    }
}

impl<T: Record> Table<T> {
    fn create(&self, mut record: T) -> Result<T> {
        if record.id().is_empty() {
            return Err(Error::Validation(format!("{} id must not be empty", T::KIND)));
        }
        let now = Utc::now();
        match self.rows.entry(record.id().to_string()) {
            Entry::Occupied(mut existing) => {
                if !T::UPSERT {
                    return Err(Error::ResourceExists {
                        kind: T::KIND.into(),
                        name: record.id().into(),
                    });
                }
                let created_at = *existing.get_mut().timestamps().0;
                let (created, updated) = record.timestamps();
                *created = created_at.or(Some(now));
                *updated = Some(now);
                existing.insert(record.clone());
            }
            Entry::Vacant(slot) => {
                let (created, updated) = record.timestamps();
                *created = Some(now);
                *updated = None;
                slot.insert(record.clone());
            }
        }
        Ok(record)
    }

    fn get(&self, id: &str) -> Result<T> {
        self.rows
            .get(id)
            .map(|r| r.value().clone())
            .ok_or_else(|| Error::ResourceNotFound {
                kind: T::KIND.into(),
                name: id.into(),
            })
    }

    fn update(&self, mut record: T) -> Result<T> {
        let mut row = self
            .rows
            .get_mut(record.id())
            .ok_or_else(|| Error::ResourceNotFound {
                kind: T::KIND.into(),
                name: record.id().into(),
            })?;
        let created_at = *row.timestamps().0;
        let (created, updated) = record.timestamps();
        *created = created_at;
        *updated = Some(Utc::now());
        *row = record.clone();
        Ok(record)
    }

    fn delete(&self, id: &str) -> Result<()> {
        self.rows
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| Error::ResourceNotFound {
                kind: T::KIND.into(),
                name: id.into(),
            })
    }

    fn list(&self, opts: &ListOptions) -> Result<Vec<T>> {
        let all: Vec<T> = self.rows.iter().map(|r| r.value().clone()).collect();
        opts.apply(all)
    }
}

/// Process-local [`Store`]
#[derive(Default)]
pub struct MemoryStore {
    docks: Table<Dock>,
    pools: Table<StoragePool>,
    volumes: Table<Volume>,
    snapshots: Table<VolumeSnapshot>,
    attachments: Table<VolumeAttachment>,
    hosts: Table<Host>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn create_dock(&self, dock: Dock) -> Result<Dock> {
        self.docks.create(dock)
    }

    async fn get_dock(&self, id: &str) -> Result<Dock> {
        self.docks.get(id)
    }

    async fn update_dock(&self, dock: Dock) -> Result<Dock> {
        self.docks.update(dock)
    }

    async fn delete_dock(&self, id: &str) -> Result<()> {
        self.docks.delete(id)
    }

    async fn list_docks(&self, opts: &ListOptions) -> Result<Vec<Dock>> {
        self.docks.list(opts)
    }

    async fn create_pool(&self, pool: StoragePool) -> Result<StoragePool> {
        self.pools.create(pool)
    }

    async fn get_pool(&self, id: &str) -> Result<StoragePool> {
        self.pools.get(id)
    }

    async fn update_pool(&self, pool: StoragePool) -> Result<StoragePool> {
        self.pools.update(pool)
    }

    async fn delete_pool(&self, id: &str) -> Result<()> {
        self.pools.delete(id)
    }

    async fn list_pools(&self, opts: &ListOptions) -> Result<Vec<StoragePool>> {
        self.pools.list(opts)
    }

    async fn create_volume(&self, volume: Volume) -> Result<Volume> {
        self.volumes.create(volume)
    }

    async fn get_volume(&self, id: &str) -> Result<Volume> {
        self.volumes.get(id)
    }

    async fn update_volume(&self, volume: Volume) -> Result<Volume> {
        self.volumes.update(volume)
    }

    async fn delete_volume(&self, id: &str) -> Result<()> {
        self.volumes.delete(id)
    }

    async fn list_volumes(&self, opts: &ListOptions) -> Result<Vec<Volume>> {
        self.volumes.list(opts)
    }

    async fn create_snapshot(&self, snapshot: VolumeSnapshot) -> Result<VolumeSnapshot> {
        self.snapshots.create(snapshot)
    }

    async fn get_snapshot(&self, id: &str) -> Result<VolumeSnapshot> {
        self.snapshots.get(id)
    }

    async fn update_snapshot(&self, snapshot: VolumeSnapshot) -> Result<VolumeSnapshot> {
        self.snapshots.update(snapshot)
    }

    async fn delete_snapshot(&self, id: &str) -> Result<()> {
        self.snapshots.delete(id)
    }

    async fn list_snapshots(&self, opts: &ListOptions) -> Result<Vec<VolumeSnapshot>> {
        self.snapshots.list(opts)
    }

    async fn create_attachment(&self, attachment: VolumeAttachment) -> Result<VolumeAttachment> {
        self.attachments.create(attachment)
    }

    async fn get_attachment(&self, id: &str) -> Result<VolumeAttachment> {
        self.attachments.get(id)
    }

    async fn update_attachment(&self, attachment: VolumeAttachment) -> Result<VolumeAttachment> {
        self.attachments.update(attachment)
    }

    async fn delete_attachment(&self, id: &str) -> Result<()> {
        self.attachments.delete(id)
    }

    async fn list_attachments(&self, opts: &ListOptions) -> Result<Vec<VolumeAttachment>> {
        self.attachments.list(opts)
    }

    async fn create_host(&self, host: Host) -> Result<Host> {
        self.hosts.create(host)
    }

    async fn get_host(&self, id: &str) -> Result<Host> {
        self.hosts.get(id)
    }

    async fn update_host(&self, host: Host) -> Result<Host> {
        self.hosts.update(host)
    }

    async fn delete_host(&self, id: &str) -> Result<()> {
        self.hosts.delete(id)
    }

    async fn list_hosts(&self, opts: &ListOptions) -> Result<Vec<Host>> {
        self.hosts.list(opts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::{DockType, VolumeStatus};
    use assert_matches::assert_matches;
    use std::collections::BTreeMap;

    fn dock(id: &str, name: &str) -> Dock {
        Dock {
            id: id.into(),
            name: name.into(),
            description: String::new(),
            driver_name: "sample".into(),
            endpoint: "localhost:50050".into(),
            node_id: "node-1".into(),
            dock_type: DockType::Provisioner,
            metadata: BTreeMap::new(),
            created_at: None,
            updated_at: None,
        }
    }

    #[tokio::test]
    async fn test_dock_create_is_upsert() {
        let store = MemoryStore::new();

        let first = store.create_dock(dock("d1", "sample")).await.unwrap();
        let mut changed = dock("d1", "sample");
        changed.description = "refreshed".into();
        let second = store.create_dock(changed).await.unwrap();

        assert_eq!(second.created_at, first.created_at);
        assert!(second.updated_at.is_some());
        assert_eq!(store.get_dock("d1").await.unwrap().description, "refreshed");
        assert_eq!(store.list_docks(&ListOptions::default()).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_volume_create_conflicts() {
        let store = MemoryStore::new();
        let volume = Volume {
            id: "v1".into(),
            name: "v1".into(),
            ..Default::default()
        };

        store.create_volume(volume.clone()).await.unwrap();
        assert_matches!(
            store.create_volume(volume).await,
            Err(Error::ResourceExists { .. })
        );
    }

    #[tokio::test]
    async fn test_update_and_delete() {
        let store = MemoryStore::new();
        let mut volume = store
            .create_volume(Volume {
                id: "v1".into(),
                name: "v1".into(),
                ..Default::default()
            })
            .await
            .unwrap();

        volume.status = VolumeStatus::Available;
        store.update_volume(volume).await.unwrap();
        assert_eq!(
            store.get_volume("v1").await.unwrap().status,
            VolumeStatus::Available
        );

        store.delete_volume("v1").await.unwrap();
        assert_matches!(
            store.get_volume("v1").await,
            Err(Error::ResourceNotFound { .. })
        );
        assert_matches!(
            store.update_volume(Volume::default()).await,
            Err(Error::ResourceNotFound { .. })
        );
        assert_matches!(
            store.delete_volume("v1").await,
            Err(Error::ResourceNotFound { .. })
        );
    }

    #[tokio::test]
    async fn test_list_with_filter() {
        let store = MemoryStore::new();
        store.create_dock(dock("d1", "alpha")).await.unwrap();
        store.create_dock(dock("d2", "beta")).await.unwrap();

        let found = store
            .list_docks(&ListOptions::default().filter("name", "beta"))
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, "d2");
    }

    #[tokio::test]
    async fn test_empty_id_rejected() {
        let store = MemoryStore::new();
        assert_matches!(
            store.create_host(Host::default()).await,
            Err(Error::Validation(_))
        );
    }
}
