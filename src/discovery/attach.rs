//! Attach Dock Discovery
//!
//! Registers the node this process runs on as an attacher dock, carrying
//! what a provisioner needs to zone volumes to it.

use super::{dock_id, DockDiscoverer};
use crate::config::DockConfig;
use crate::domain::model::{Dock, DockType};
use crate::error::{Error, Result};
use crate::store::StoreRef;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::net::IpAddr;
use std::sync::Arc;
use tokio::net::UdpSocket;
use tracing::{debug, error, info};

pub const KEY_PLATFORM: &str = "Platform";
pub const KEY_OS_TYPE: &str = "OsType";
pub const KEY_HOST_IP: &str = "HostIp";
pub const KEY_INITIATOR: &str = "Initiator";
pub const KEY_WWPNS: &str = "WWPNS";

const ATTACHER_DRIVER: &str = "attacher";
const INITIATOR_NAME_FILE: &str = "/etc/iscsi/initiatorname.iscsi";

/// Address of the interface the default route leaves through
///
/// Connecting a UDP socket sends nothing; it only selects the source address.
async fn detect_host_ip() -> Option<IpAddr> {
    let socket = UdpSocket::bind("0.0.0.0:0").await.ok()?;
    socket.connect("8.8.8.8:80").await.ok()?;
    let ip = socket.local_addr().ok()?.ip();
    (!ip.is_unspecified()).then_some(ip)
}

/// IQN from an open-iscsi `initiatorname.iscsi` file
fn parse_initiator_name(raw: &str) -> Option<String> {
    raw.lines()
        .map(str::trim)
        .filter(|l| !l.starts_with('#'))
        .find_map(|l| l.strip_prefix("InitiatorName="))
        .map(|iqn| iqn.trim().to_string())
        .filter(|iqn| !iqn.is_empty())
}

pub struct AttachDockDiscoverer {
    config: Arc<DockConfig>,
    store: StoreRef,
    hostname: String,
    dock: Option<Dock>,
}

impl AttachDockDiscoverer {
    pub fn new(config: Arc<DockConfig>, store: StoreRef) -> Self {
        let hostname = config.hostname();
        Self {
            config,
            store,
            hostname,
            dock: None,
        }
    }

    /// Dock built by the last discover
    pub fn dock(&self) -> Option<&Dock> {
        self.dock.as_ref()
    }

    async fn host_ip(&self) -> String {
        if !self.config.bind_ip.is_empty() {
            return self.config.bind_ip.clone();
        }
        match detect_host_ip().await {
            Some(ip) => ip.to_string(),
            None => {
                debug!("No routable address found, reporting loopback");
                "127.0.0.1".to_string()
            }
        }
    }

    async fn initiator(&self) -> String {
        if !self.config.local_host.iscsi_initiator.is_empty() {
            return self.config.local_host.iscsi_initiator.clone();
        }
        match tokio::fs::read_to_string(INITIATOR_NAME_FILE).await {
            Ok(raw) => parse_initiator_name(&raw).unwrap_or_default(),
            Err(e) => {
                debug!("No iSCSI initiator name in {}: {}", INITIATOR_NAME_FILE, e);
                String::new()
            }
        }
    }
}

#[async_trait]
impl DockDiscoverer for AttachDockDiscoverer {
    async fn init(&mut self) -> Result<()> {
        info!("Serving node {} as attacher dock", self.hostname);
        Ok(())
    }

    async fn discover(&mut self) -> Result<()> {
        let metadata = BTreeMap::from([
            (KEY_PLATFORM.to_string(), std::env::consts::ARCH.to_string()),
            (KEY_OS_TYPE.to_string(), std::env::consts::OS.to_string()),
            (KEY_HOST_IP.to_string(), self.host_ip().await),
            (KEY_INITIATOR.to_string(), self.initiator().await),
            (
                KEY_WWPNS.to_string(),
                self.config.local_host.wwpns.join(","),
            ),
        ]);

        self.dock = Some(Dock {
            id: dock_id(&self.hostname, self.config.endpoint_ip()),
            name: self.hostname.clone(),
            description: String::new(),
            driver_name: ATTACHER_DRIVER.to_string(),
            endpoint: self.config.api_endpoint.clone(),
            node_id: self.hostname.clone(),
            dock_type: DockType::Attacher,
            metadata,
            created_at: None,
            updated_at: None,
        });
        Ok(())
    }

    async fn report(&mut self) -> Result<()> {
        let dock = self
            .dock
            .clone()
            .ok_or_else(|| Error::Internal("attacher dock reported before discovery".into()))?;
        if let Err(e) = self.store.create_dock(dock).await {
            error!("When create attacher dock in db: {}", e);
            return Err(e);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LocalHost;
    use crate::store::{ListOptions, MemoryStore, Store};
    use assert_matches::assert_matches;

    fn config() -> Arc<DockConfig> {
        Arc::new(DockConfig {
            api_endpoint: "192.168.0.5:50050".into(),
            bind_ip: "10.1.1.7".into(),
            local_host: LocalHost {
                hostname: "compute-1".into(),
                iscsi_initiator: "iqn.1993-08.org.debian:01:c0ffee".into(),
                wwpns: vec!["21000024ff2e1a2b".into(), "21000024ff2e1a2c".into()],
            },
            ..Default::default()
        })
    }

    #[test]
    fn test_parse_initiator_name() {
        let raw = "## generated\n#InitiatorName=iqn.old\nInitiatorName=iqn.1993-08.org.debian:01:abc\n";
        assert_eq!(
            parse_initiator_name(raw).as_deref(),
            Some("iqn.1993-08.org.debian:01:abc")
        );
        assert_eq!(parse_initiator_name("# nothing here\n"), None);
    }

    #[tokio::test]
    async fn test_discover_and_report() {
        let store = Arc::new(MemoryStore::new());
        let mut discoverer = AttachDockDiscoverer::new(config(), store.clone());
        discoverer.init().await.unwrap();
        discoverer.discover().await.unwrap();
        discoverer.report().await.unwrap();

        let docks = store.list_docks(&ListOptions::default()).await.unwrap();
        assert_eq!(docks.len(), 1);
        let dock = &docks[0];
        assert_eq!(dock.id, dock_id("compute-1", "192.168.0.5"));
        assert_eq!(dock.dock_type, DockType::Attacher);
        assert_eq!(dock.node_id, "compute-1");
        assert_eq!(dock.metadata[KEY_HOST_IP], "10.1.1.7");
        assert_eq!(dock.metadata[KEY_INITIATOR], "iqn.1993-08.org.debian:01:c0ffee");
        assert_eq!(dock.metadata[KEY_WWPNS], "21000024ff2e1a2b,21000024ff2e1a2c");
        assert_eq!(dock.metadata[KEY_OS_TYPE], std::env::consts::OS);
    }

    #[tokio::test]
    async fn test_repeated_passes_keep_one_dock() {
        let store = Arc::new(MemoryStore::new());
        let mut discoverer = AttachDockDiscoverer::new(config(), store.clone());
        for _ in 0..3 {
            discoverer.discover().await.unwrap();
            discoverer.report().await.unwrap();
        }

        assert_eq!(store.list_docks(&ListOptions::default()).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_report_before_discover() {
        let store = Arc::new(MemoryStore::new());
        let mut discoverer = AttachDockDiscoverer::new(config(), store);
        assert_matches!(discoverer.report().await, Err(Error::Internal(_)));
    }
}
