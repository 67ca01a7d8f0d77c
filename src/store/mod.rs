//! Persistence
//!
//! The [`Store`] port through which the dock persists docks, pools, volumes,
//! snapshots, attachments and hosts, and [`MemoryStore`], its in-process
//! implementation.

pub mod memory;

pub use memory::MemoryStore;

use crate::domain::model::{
    Dock, Host, StoragePool, Volume, VolumeAttachment, VolumeSnapshot,
};
use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::sync::Arc;

// =============================================================================
// List Options
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDir {
    #[default]
    Asc,
    Desc,
}

/// Filtering, ordering and paging of a list call
///
/// Filter and sort keys are field names as records serialize them
/// (`name`, `dockId`, `status`, ...). Records sort by id when no key is set.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListOptions {
    #[serde(default)]
    pub filters: BTreeMap<String, String>,
    #[serde(default)]
    pub sort_key: Option<String>,
    #[serde(default)]
    pub sort_dir: SortDir,
    #[serde(default)]
    pub offset: usize,
    #[serde(default)]
    pub limit: Option<usize>,
}

impl ListOptions {
    pub fn filter(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.filters.insert(key.into(), value.into());
        self
    }

    pub fn sort_by(mut self, key: impl Into<String>, dir: SortDir) -> Self {
        self.sort_key = Some(key.into());
        self.sort_dir = dir;
        self
    }

    pub fn page(mut self, offset: usize, limit: usize) -> Self {
        self.offset = offset;
        self.limit = Some(limit);
        self
    }

    /// Apply filters, ordering and paging to a full table scan
    ///
    /// Fails when a record can not be serialized for field access.
    pub fn apply<T: Record>(&self, records: Vec<T>) -> Result<Vec<T>> {
        let mut rows = Vec::with_capacity(records.len());
        for record in records {
            let value = serde_json::to_value(&record)?;
            let matches = self
                .filters
                .iter()
                .all(|(key, want)| field_text(&value, key).as_deref() == Some(want.as_str()));
            if matches {
                rows.push((record, value));
            }
        }

        match &self.sort_key {
            Some(key) => rows.sort_by(|(_, a), (_, b)| compare_field(a.get(key), b.get(key))),
            None => rows.sort_by(|(a, _), (b, _)| a.id().cmp(b.id())),
        }
        if self.sort_dir == SortDir::Desc {
            rows.reverse();
        }

        Ok(rows
            .into_iter()
            .skip(self.offset)
            .take(self.limit.unwrap_or(usize::MAX))
            .map(|(r, _)| r)
            .collect())
    }
}

fn field_text(value: &serde_json::Value, key: &str) -> Option<String> {
    match value.get(key)? {
        serde_json::Value::String(s) => Some(s.clone()),
        serde_json::Value::Null => None,
        other => Some(other.to_string()),
    }
}

fn compare_field(a: Option<&serde_json::Value>, b: Option<&serde_json::Value>) -> Ordering {
    use serde_json::Value;
    match (a, b) {
        (Some(Value::Number(x)), Some(Value::Number(y))) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        (Some(Value::Bool(x)), Some(Value::Bool(y))) => x.cmp(y),
        (None | Some(Value::Null), None | Some(Value::Null)) => Ordering::Equal,
        (None | Some(Value::Null), _) => Ordering::Less,
        (_, None | Some(Value::Null)) => Ordering::Greater,
        (Some(x), Some(y)) => x.to_string().cmp(&y.to_string()),
    }
}

// =============================================================================
// Records
// =============================================================================

/// A persisted record type
pub trait Record: Clone + Serialize + Send + Sync + 'static {
    /// Resource kind used in errors
    const KIND: &'static str;

    /// Creating an existing id replaces it instead of conflicting
    const UPSERT: bool = false;

    fn id(&self) -> &str;

    fn timestamps(&mut self) -> (&mut Option<DateTime<Utc>>, &mut Option<DateTime<Utc>>);
}

macro_rules! record {
    ($ty:ty, $kind:literal, $upsert:literal) => {
        impl Record for $ty {
            const KIND: &'static str = $kind;
            const UPSERT: bool = $upsert;

            fn id(&self) -> &str {
                &self.id
            }

            fn timestamps(
                &mut self,
            ) -> (&mut Option<DateTime<Utc>>, &mut Option<DateTime<Utc>>) {
                (&mut self.created_at, &mut self.updated_at)
            }
        }
    };
}

record!(Dock, "dock", true);
record!(StoragePool, "pool", true);
record!(Volume, "volume", false);
record!(VolumeSnapshot, "snapshot", false);
record!(VolumeAttachment, "attachment", false);
record!(Host, "host", false);

// =============================================================================
// Store Port
// =============================================================================

/// Persistence collaborator of the dock
#[async_trait]
pub trait Store: Send + Sync {
    async fn create_dock(&self, dock: Dock) -> Result<Dock>;
    async fn get_dock(&self, id: &str) -> Result<Dock>;
    async fn update_dock(&self, dock: Dock) -> Result<Dock>;
    async fn delete_dock(&self, id: &str) -> Result<()>;
    async fn list_docks(&self, opts: &ListOptions) -> Result<Vec<Dock>>;

    async fn create_pool(&self, pool: StoragePool) -> Result<StoragePool>;
    async fn get_pool(&self, id: &str) -> Result<StoragePool>;
    async fn update_pool(&self, pool: StoragePool) -> Result<StoragePool>;
    async fn delete_pool(&self, id: &str) -> Result<()>;
    async fn list_pools(&self, opts: &ListOptions) -> Result<Vec<StoragePool>>;

    async fn create_volume(&self, volume: Volume) -> Result<Volume>;
    async fn get_volume(&self, id: &str) -> Result<Volume>;
    async fn update_volume(&self, volume: Volume) -> Result<Volume>;
    async fn delete_volume(&self, id: &str) -> Result<()>;
    async fn list_volumes(&self, opts: &ListOptions) -> Result<Vec<Volume>>;

    async fn create_snapshot(&self, snapshot: VolumeSnapshot) -> Result<VolumeSnapshot>;
    async fn get_snapshot(&self, id: &str) -> Result<VolumeSnapshot>;
    async fn update_snapshot(&self, snapshot: VolumeSnapshot) -> Result<VolumeSnapshot>;
    async fn delete_snapshot(&self, id: &str) -> Result<()>;
    async fn list_snapshots(&self, opts: &ListOptions) -> Result<Vec<VolumeSnapshot>>;

    async fn create_attachment(&self, attachment: VolumeAttachment) -> Result<VolumeAttachment>;
    async fn get_attachment(&self, id: &str) -> Result<VolumeAttachment>;
    async fn update_attachment(&self, attachment: VolumeAttachment) -> Result<VolumeAttachment>;
    async fn delete_attachment(&self, id: &str) -> Result<()>;
    async fn list_attachments(&self, opts: &ListOptions) -> Result<Vec<VolumeAttachment>>;

    async fn create_host(&self, host: Host) -> Result<Host>;
    async fn get_host(&self, id: &str) -> Result<Host>;
    async fn update_host(&self, host: Host) -> Result<Host>;
    async fn delete_host(&self, id: &str) -> Result<()>;
    async fn list_hosts(&self, opts: &ListOptions) -> Result<Vec<Host>>;
}

pub type StoreRef = Arc<dyn Store>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::PoolStatus;

    fn pool(id: &str, name: &str, dock: &str, free: i64) -> StoragePool {
        StoragePool {
            id: id.into(),
            name: name.into(),
            dock_id: dock.into(),
            free_capacity: free,
            ..Default::default()
        }
    }

    fn pools() -> Vec<StoragePool> {
        vec![
            pool("c", "gold", "dock-1", 30),
            pool("a", "silver", "dock-1", 10),
            pool("b", "gold", "dock-2", 20),
            StoragePool {
                status: PoolStatus::Unavailable,
                ..pool("d", "bronze", "dock-1", 40)
            },
        ]
    }

    fn ids(rows: &[StoragePool]) -> Vec<&str> {
        rows.iter().map(|p| p.id.as_str()).collect()
    }

    #[test]
    fn test_default_order_is_by_id() {
        let rows = ListOptions::default().apply(pools()).unwrap();
        assert_eq!(ids(&rows), vec!["a", "b", "c", "d"]);
    }

    #[test]
    fn test_filters_match_serialized_fields() {
        let rows = ListOptions::default()
            .filter("name", "gold")
            .filter("dockId", "dock-1")
            .apply(pools())
            .unwrap();
        assert_eq!(ids(&rows), vec!["c"]);

        let rows = ListOptions::default()
            .filter("status", "unavailable")
            .apply(pools())
            .unwrap();
        assert_eq!(ids(&rows), vec!["d"]);

        let rows = ListOptions::default()
            .filter("freeCapacity", "20")
            .apply(pools())
            .unwrap();
        assert_eq!(ids(&rows), vec!["b"]);
    }

    #[test]
    fn test_sort_and_page() {
        let rows = ListOptions::default()
            .sort_by("freeCapacity", SortDir::Desc)
            .apply(pools())
            .unwrap();
        assert_eq!(ids(&rows), vec!["d", "c", "b", "a"]);

        let rows = ListOptions::default()
            .sort_by("name", SortDir::Asc)
            .page(1, 2)
            .apply(pools())
            .unwrap();
        assert_eq!(ids(&rows), vec!["c", "b"]);

        let rows = ListOptions::default().page(10, 5).apply(pools()).unwrap();
        assert!(rows.is_empty());
    }

    /// Record whose serialization always fails
    #[derive(Clone)]
    struct Opaque {
        id: String,
        created_at: Option<DateTime<Utc>>,
        updated_at: Option<DateTime<Utc>>,
    }

    impl Serialize for Opaque {
        fn serialize<S: serde::Serializer>(&self, _: S) -> std::result::Result<S::Ok, S::Error> {
            Err(serde::ser::Error::custom("opaque record"))
        }
    }

    record!(Opaque, "opaque", false);

    #[test]
    fn test_unserializable_record_is_an_error() {
        let rows = vec![Opaque {
            id: "x".into(),
            created_at: None,
            updated_at: None,
        }];

        let result = ListOptions::default().filter("name", "x").apply(rows);

        assert!(matches!(result, Err(crate::error::Error::JsonParse(_))));
    }
}
