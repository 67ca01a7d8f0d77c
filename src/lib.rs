//! Storage Dock - Control plane of a storage dock
//!
//! Serves configured storage backends to a provisioning control plane:
//! vendor drivers behind one port, per-dock driver instances, volume and
//! snapshot provisioning with backend LUN id allocation, SAN zoning for
//! iSCSI and Fibre Channel hosts, and a discovery loop that keeps the
//! persisted docks and pools in line with what the backends report.
//! Replication and metric drivers come from kind-keyed tables in the same
//! registry.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────────┐
//! │                              Dock Process                            │
//! ├──────────────────────────────────────────────────────────────────────┤
//! │  ┌──────────────────┐   ┌──────────────────┐   ┌──────────────────┐  │
//! │  │   Dock Service   │   │    Discovery     │   │      Store       │  │
//! │  │  (volumes, zones)│   │  (docks, pools)  │◄─►│  (records)       │  │
//! │  └────────┬─────────┘   └────────┬─────────┘   └──────────────────┘  │
//! │           └──────────┬───────────┘                                   │
//! │             ┌────────┴─────────┐                                     │
//! │             │ Driver Registry  │  one instance per dock name         │
//! │             └────────┬─────────┘                                     │
//! ├──────────────────────┼───────────────────────────────────────────────┤
//! │  ┌───────────────────┴──────────┐   ┌─────────────────────────────┐  │
//! │  │  OceanStor (REST session,    │   │  Sample block / file-share  │  │
//! │  │  LUN id pool, zoning)        │   │  (in-memory)                │  │
//! │  └──────────────────────────────┘   └─────────────────────────────┘  │
//! └──────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//!
//! - [`allocation`]: Backend LUN id pool
//! - [`config`]: Dock configuration
//! - [`controlplane`]: Drivers, driver registry and dock service
//! - [`discovery`]: Provisioner and attacher dock discovery
//! - [`domain`]: Records and driver ports
//! - [`error`]: Error types and handling
//! - [`store`]: Persistence port and in-memory store

pub mod allocation;
pub mod config;
pub mod controlplane;
pub mod discovery;
pub mod domain;
pub mod error;
pub mod store;

// Re-export commonly used types
pub use allocation::{LunIdPool, LunIdRange};

pub use config::{BackendProperties, DockConfig, LocalHost};

pub use controlplane::{
    AttachVolumeRequest, DetachVolumeRequest, DockService, DriverKind, DriverRegistry,
    OceanStorDriver, SampleDriver, SampleFileShareDriver,
};

pub use discovery::{
    discover_and_report, AttachDockDiscoverer, BackendMetrics, DiscoveryContext,
    DiscoveryMetrics, DockDiscoverer, ProvisionDockDiscoverer,
};

pub use domain::model::{
    AccessProtocol, ConnectionInfo, Dock, DockType, Host, StoragePool, Volume,
    VolumeAttachment, VolumeSnapshot,
};

pub use domain::ports::{
    FileShareDriver, MetricDriver, PoolSource, ReplicationDriver, VolumeDriver, VolumeDriverRef,
};

pub use error::{Error, ErrorAction, ErrorKind, Result};

pub use store::{ListOptions, MemoryStore, Store, StoreRef};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
