//! Storage Driver Adapters
//!
//! Provides the drivers a dock can be configured with:
//! - OceanStor: Huawei block arrays over the device-manager REST API, with
//!   capacity metrics and a replication placeholder
//! - Sample: in-memory block, file-share, replication and metric drivers

pub mod oceanstor;
pub mod sample;

pub use oceanstor::{OceanStorDriver, OceanStorMetricDriver, OceanStorReplicationDriver};
pub use sample::{
    SampleDriver, SampleFileShareDriver, SampleMetricDriver, SampleReplicationDriver,
};

use crate::domain::model::{Metric, StoragePool};
use chrono::Utc;
use serde::{Deserialize, Serialize};

/// Driver names as they appear in the dock configuration
pub const SAMPLE_DRIVER: &str = "sample";
pub const OCEANSTOR_BLOCK_DRIVER: &str = "huawei_oceanstor_block";
pub const SAMPLE_FILE_SHARE_DRIVER: &str = "sample_fileshare";

/// Kind of driver a dock runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DriverKind {
    Sample,
    HuaweiOceanStorBlock,
    SampleFileShare,
}

impl DriverKind {
    /// Map a configured driver name; unknown names fall back to the sample driver
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_lowercase().as_str() {
            OCEANSTOR_BLOCK_DRIVER => DriverKind::HuaweiOceanStorBlock,
            SAMPLE_FILE_SHARE_DRIVER => DriverKind::SampleFileShare,
            _ => DriverKind::Sample,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            DriverKind::Sample => SAMPLE_DRIVER,
            DriverKind::HuaweiOceanStorBlock => OCEANSTOR_BLOCK_DRIVER,
            DriverKind::SampleFileShare => SAMPLE_FILE_SHARE_DRIVER,
        }
    }

    /// File-share kinds are only ever asked for pools
    pub fn is_file_share(&self) -> bool {
        matches!(self, DriverKind::SampleFileShare)
    }
}

impl std::fmt::Display for DriverKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Capacity samples of a pool listing: total and free GB, used percent
pub fn pool_capacity_metrics(pools: &[StoragePool]) -> Vec<Metric> {
    let now = Utc::now();
    let sample = |pool: &StoragePool, name: &str, unit: &str, value: f64| Metric {
        instance_id: pool.id.clone(),
        instance_name: pool.name.clone(),
        name: name.to_string(),
        unit: unit.to_string(),
        value,
        timestamp: now,
    };

    pools
        .iter()
        .flat_map(|pool| {
            let total = pool.total_capacity as f64;
            let free = pool.free_capacity as f64;
            let used_percent = if total > 0.0 {
                (total - free) / total * 100.0
            } else {
                0.0
            };
            [
                sample(pool, "total_capacity", "GB", total),
                sample(pool, "free_capacity", "GB", free),
                sample(pool, "used_capacity_rate", "percent", used_percent),
            ]
        })
        .collect()
}
