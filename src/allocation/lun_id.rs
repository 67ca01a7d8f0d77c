//! LUN ID Pool
//!
//! Bounded-range identifier pool for arrays that need explicit LUN ids.
//! The pool tracks ids believed free within `[min, max]`, rebuilds that set
//! from a windowed scan of the array, and drives a bounded create-with-id
//! retry: one pass over the known-free ids, one refresh, one more pass.

use crate::error::{Error, Result};
use async_trait::async_trait;
use std::collections::BTreeSet;
use std::future::Future;
use tracing::{debug, info, warn};

// =============================================================================
// Constants
// =============================================================================

/// Number of LUNs fetched per scan window
pub const LUN_SCAN_WINDOW: i64 = 500;

// =============================================================================
// Range
// =============================================================================

/// Closed LUN id range `[min, max]`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LunIdRange {
    pub min: i64,
    pub max: i64,
}

impl LunIdRange {
    /// Build a range from backend configuration
    ///
    /// Returns `Ok(None)` when `max` is zero, which means ids are not limited.
    pub fn from_config(min: i64, max: i64) -> Result<Option<Self>> {
        if min < 0 || max < 0 {
            return Err(Error::Configuration(format!(
                "specified lun ID range [{}-{}] is invalid",
                min, max
            )));
        }
        if max == 0 {
            return Ok(None);
        }
        if min > max {
            return Err(Error::Configuration(format!(
                "specified lun ID range [{}-{}] is invalid",
                min, max
            )));
        }
        Ok(Some(Self { min, max }))
    }

    #[inline]
    pub fn contains(&self, id: i64) -> bool {
        id >= self.min && id <= self.max
    }

    pub fn len(&self) -> u64 {
        (self.max - self.min + 1) as u64
    }

    pub fn is_empty(&self) -> bool {
        false
    }
}

impl std::fmt::Display for LunIdRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}-{}]", self.min, self.max)
    }
}

// =============================================================================
// Inventory Port
// =============================================================================

/// Source of the LUN ids currently present on an array
#[async_trait]
pub trait LunInventory: Send + Sync {
    /// LUN ids at positions `[start, end)` of the array's listing ordered by id
    async fn lun_ids_by_range(&self, start: i64, end: i64) -> Result<Vec<i64>>;
}

// =============================================================================
// LUN ID Pool
// =============================================================================

/// Set of LUN ids believed free within a configured range
#[derive(Debug)]
pub struct LunIdPool {
    range: LunIdRange,
    free: BTreeSet<i64>,
    refreshes: u64,
}

impl LunIdPool {
    /// Create an empty pool; call [`refresh`](Self::refresh) before use
    pub fn new(range: LunIdRange) -> Self {
        Self {
            range,
            free: BTreeSet::new(),
            refreshes: 0,
        }
    }

    pub fn range(&self) -> LunIdRange {
        self.range
    }

    pub fn len(&self) -> usize {
        self.free.len()
    }

    pub fn is_empty(&self) -> bool {
        self.free.is_empty()
    }

    pub fn contains(&self, id: i64) -> bool {
        self.free.contains(&id)
    }

    /// Number of backend scans performed so far
    pub fn refreshes(&self) -> u64 {
        self.refreshes
    }

    /// Return an id to the pool; ids outside the range are ignored
    pub fn insert(&mut self, id: i64) -> bool {
        if !self.range.contains(id) {
            return false;
        }
        self.free.insert(id)
    }

    pub fn remove(&mut self, id: i64) -> bool {
        self.free.remove(&id)
    }

    /// Rebuild the free set from the array
    ///
    /// Starts from the full range and removes every in-range id found on the
    /// array. Windows lying entirely below `min` are skipped; the scan stops
    /// at the first window or id lying beyond `max`.
    pub async fn refresh<I>(&mut self, inventory: &I) -> Result<()>
    where
        I: LunInventory + ?Sized,
    {
        self.refreshes += 1;
        self.free = (self.range.min..=self.range.max).collect();

        let mut window = 0i64;
        'scan: loop {
            let start = window * LUN_SCAN_WINDOW;
            let ids = inventory
                .lun_ids_by_range(start, start + LUN_SCAN_WINDOW)
                .await
                .map_err(|e| {
                    warn!("Batch query volumes error: {}", e);
                    e
                })?;
            window += 1;

            let (first, last) = match (ids.first(), ids.last()) {
                (Some(&first), Some(&last)) => (first, last),
                _ => break,
            };

            if last < self.range.min {
                continue;
            }
            if first > self.range.max {
                break;
            }

            for id in ids {
                if !self.free.remove(&id) && id > self.range.max {
                    break 'scan;
                }
            }
        }

        info!(
            "Refreshed LUN id pool {}: {} of {} ids available",
            self.range,
            self.free.len(),
            self.range.len()
        );
        Ok(())
    }

    /// Run `attempt` with candidate ids until one succeeds
    ///
    /// Ids rejected as already in use are dropped from the pool and the next
    /// one is tried. Any other error aborts immediately. When the known-free
    /// ids run out the pool is refreshed once and tried once more; after that
    /// the call fails with [`Error::NoLunIdAvailable`].
    pub async fn allocate<I, T, F, Fut>(&mut self, inventory: &I, mut attempt: F) -> Result<T>
    where
        I: LunInventory + ?Sized,
        F: FnMut(i64) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut refreshed = false;
        if self.free.is_empty() {
            self.refresh(inventory).await?;
            refreshed = true;
        }

        if let Some(created) = self.try_each(&mut attempt).await? {
            return Ok(created);
        }

        if !refreshed {
            self.refresh(inventory).await?;
            if let Some(created) = self.try_each(&mut attempt).await? {
                return Ok(created);
            }
        }

        warn!("Cannot find available id between {}", self.range);
        Err(Error::NoLunIdAvailable {
            min: self.range.min,
            max: self.range.max,
        })
    }

    async fn try_each<T, F, Fut>(&mut self, attempt: &mut F) -> Result<Option<T>>
    where
        F: FnMut(i64) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let candidates: Vec<i64> = self.free.iter().copied().collect();
        for id in candidates {
            match attempt(id).await {
                Ok(created) => {
                    self.free.remove(&id);
                    debug!("Allocated LUN id {}", id);
                    return Ok(Some(created));
                }
                Err(e) if e.is_id_in_use() => {
                    warn!("Id {} already in use, try next one.", id);
                    self.free.remove(&id);
                }
                Err(e) => return Err(e),
            }
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Array listing backed by a sorted id list
    struct FakeInventory {
        ids: Mutex<Vec<i64>>,
        scans: AtomicUsize,
    }

    impl FakeInventory {
        fn new(mut ids: Vec<i64>) -> Self {
            ids.sort_unstable();
            Self {
                ids: Mutex::new(ids),
                scans: AtomicUsize::new(0),
            }
        }

        fn add(&self, id: i64) {
            let mut ids = self.ids.lock();
            ids.push(id);
            ids.sort_unstable();
        }
    }

    #[async_trait]
    impl LunInventory for FakeInventory {
        async fn lun_ids_by_range(&self, start: i64, end: i64) -> Result<Vec<i64>> {
            self.scans.fetch_add(1, Ordering::SeqCst);
            let ids = self.ids.lock();
            Ok(ids
                .iter()
                .skip(start as usize)
                .take((end - start) as usize)
                .copied()
                .collect())
        }
    }

    async fn pool_for(min: i64, max: i64, inventory: &FakeInventory) -> LunIdPool {
        let range = LunIdRange::from_config(min, max).unwrap().unwrap();
        let mut pool = LunIdPool::new(range);
        pool.refresh(inventory).await.unwrap();
        pool
    }

    #[test]
    fn test_range_from_config() {
        assert_eq!(LunIdRange::from_config(0, 0).unwrap(), None);
        assert_eq!(
            LunIdRange::from_config(10, 20).unwrap(),
            Some(LunIdRange { min: 10, max: 20 })
        );
        assert_matches!(LunIdRange::from_config(-1, 20), Err(Error::Configuration(_)));
        assert_matches!(LunIdRange::from_config(30, 20), Err(Error::Configuration(_)));
    }

    #[tokio::test]
    async fn test_refresh_removes_ids_in_use() {
        let inventory = FakeInventory::new(vec![1, 2, 100, 101, 250, 4000]);
        let pool = pool_for(100, 300, &inventory).await;

        assert!(!pool.contains(100));
        assert!(!pool.contains(101));
        assert!(!pool.contains(250));
        assert!(pool.contains(102));
        assert_eq!(pool.len(), 201 - 3);
    }

    #[tokio::test]
    async fn test_refresh_spans_multiple_windows() {
        // 1200 LUNs occupying ids 0..1200, range straddles the second and third window
        let inventory = FakeInventory::new((0..1200).collect());
        let pool = pool_for(900, 1300, &inventory).await;

        assert_eq!(pool.len(), 100);
        assert!(pool.contains(1200));
        assert!(!pool.contains(1199));
    }

    #[tokio::test]
    async fn test_refresh_stops_past_range() {
        let inventory = FakeInventory::new((0..3000).collect());
        let _pool = pool_for(10, 20, &inventory).await;

        // First window already reaches past max
        assert_eq!(inventory.scans.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_allocate_skips_id_in_use() {
        let inventory = FakeInventory::new(vec![100]);
        let mut pool = pool_for(100, 102, &inventory).await;

        let id = pool
            .allocate(&inventory, |id| async move { Ok(id) })
            .await
            .unwrap();

        assert!(id == 101 || id == 102);
        assert!(!pool.contains(id));
    }

    #[tokio::test]
    async fn test_allocate_retries_on_conflict() {
        let inventory = FakeInventory::new(vec![]);
        let mut pool = pool_for(100, 102, &inventory).await;

        // The array has 100 but the pool doesn't know yet
        inventory.add(100);
        let id = pool
            .allocate(&inventory, |id| async move {
                if id == 100 {
                    Err(Error::IdInUse { id })
                } else {
                    Ok(id)
                }
            })
            .await
            .unwrap();

        assert_eq!(id, 101);
        assert!(!pool.contains(100));
        assert_eq!(pool.refreshes(), 1);
    }

    #[tokio::test]
    async fn test_allocate_all_conflicts_refreshes_once() {
        let inventory = FakeInventory::new(vec![]);
        let mut pool = pool_for(100, 102, &inventory).await;
        let attempts = AtomicUsize::new(0);

        let result: Result<i64> = pool
            .allocate(&inventory, |id| {
                attempts.fetch_add(1, Ordering::SeqCst);
                async move { Err(Error::IdInUse { id }) }
            })
            .await;

        assert_matches!(result, Err(Error::NoLunIdAvailable { min: 100, max: 102 }));
        // Initial refresh plus exactly one retry refresh
        assert_eq!(pool.refreshes(), 2);
        // Two passes over three ids
        assert_eq!(attempts.load(Ordering::SeqCst), 6);
    }

    #[tokio::test]
    async fn test_allocate_from_empty_pool_refreshes_once() {
        let inventory = FakeInventory::new(vec![]);
        let range = LunIdRange::from_config(5, 6).unwrap().unwrap();
        let mut pool = LunIdPool::new(range);

        let result: Result<i64> = pool
            .allocate(&inventory, |id| async move { Err(Error::IdInUse { id }) })
            .await;

        assert_matches!(result, Err(Error::NoLunIdAvailable { .. }));
        assert_eq!(pool.refreshes(), 1);
    }

    #[tokio::test]
    async fn test_allocate_aborts_on_other_errors() {
        let inventory = FakeInventory::new(vec![]);
        let mut pool = pool_for(1, 3, &inventory).await;

        let result: Result<i64> = pool
            .allocate(&inventory, |_| async move {
                Err(Error::Backend {
                    code: 50331651,
                    description: "pool capacity insufficient".into(),
                })
            })
            .await;

        assert_matches!(result, Err(Error::Backend { .. }));
        assert_eq!(pool.len(), 3);
        assert_eq!(pool.refreshes(), 1);
    }

    #[tokio::test]
    async fn test_allocate_never_leaves_range() {
        for (min, max) in [(0, 4), (7, 7), (498, 503), (1000, 1010)] {
            let inventory = FakeInventory::new(vec![min, max + 1, max + 2]);
            let mut pool = pool_for(min, max, &inventory).await;

            loop {
                match pool.allocate(&inventory, |id| async move { Ok(id) }).await {
                    Ok(id) => {
                        assert!(id >= min && id <= max, "{} outside [{}-{}]", id, min, max);
                        inventory.add(id);
                    }
                    Err(e) => {
                        assert_matches!(e, Error::NoLunIdAvailable { .. });
                        break;
                    }
                }
            }
        }
    }

    #[test]
    fn test_insert_ignores_out_of_range() {
        let mut pool = LunIdPool::new(LunIdRange { min: 10, max: 20 });
        assert!(pool.insert(15));
        assert!(!pool.insert(9));
        assert!(!pool.insert(21));
        assert_eq!(pool.len(), 1);
    }
}
