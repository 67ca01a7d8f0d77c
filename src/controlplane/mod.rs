//! Control Plane Module
//!
//! Driver adapters, the per-dock driver registry and the dock service that
//! turns provisioning requests into driver calls plus persisted state.

pub mod dock;
pub mod drivers;
pub mod registry;

pub use dock::{AttachVolumeRequest, DetachVolumeRequest, DockService};
pub use drivers::{
    DriverKind, OceanStorDriver, OceanStorMetricDriver, OceanStorReplicationDriver,
    SampleDriver, SampleFileShareDriver, SampleMetricDriver, SampleReplicationDriver,
};
pub use registry::{
    DriverFactory, DriverRegistry, FileShareFactory, MetricFactory, ReplicationFactory,
};
