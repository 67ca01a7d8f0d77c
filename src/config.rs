//! Dock Configuration
//!
//! The process-level YAML file: which backends this dock serves, where
//! each backend's own configuration lives, and how the local host
//! identifies itself to attach callers.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::warn;

pub const DEFAULT_DOCK_CONFIG_PATH: &str = "/etc/opensds/opensds.yaml";

/// One configured backend
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct BackendProperties {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub driver_name: String,
    /// Backend YAML; empty selects the driver's default path
    #[serde(default)]
    pub config_path: String,
    /// The array replicates pools itself
    #[serde(default)]
    pub support_replication: bool,
}

/// Identity of the node an attach dock runs on
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct LocalHost {
    /// Overrides the detected host name
    #[serde(default)]
    pub hostname: String,
    #[serde(default)]
    pub iscsi_initiator: String,
    #[serde(default)]
    pub wwpns: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct DockConfig {
    /// Endpoint the dock service is reachable on, `host:port`
    #[serde(default = "default_api_endpoint")]
    pub api_endpoint: String,
    #[serde(default)]
    pub enabled_backends: Vec<String>,
    #[serde(default)]
    pub backends: Vec<BackendProperties>,
    #[serde(default)]
    pub host_based_replication_driver: String,
    #[serde(default = "default_discovery_interval")]
    pub discovery_interval_secs: u64,
    /// Address reported by the attach dock; detected when empty
    #[serde(default)]
    pub bind_ip: String,
    #[serde(default)]
    pub local_host: LocalHost,
}

fn default_api_endpoint() -> String {
    "localhost:50050".to_string()
}

fn default_discovery_interval() -> u64 {
    60
}

impl Default for DockConfig {
    fn default() -> Self {
        Self {
            api_endpoint: default_api_endpoint(),
            enabled_backends: Vec::new(),
            backends: Vec::new(),
            host_based_replication_driver: String::new(),
            discovery_interval_secs: default_discovery_interval(),
            bind_ip: String::new(),
            local_host: LocalHost::default(),
        }
    }
}

impl DockConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            Error::Configuration(format!(
                "failed to read {}: {}",
                path.as_ref().display(),
                e
            ))
        })?;
        Self::from_yaml(&raw)
    }

    pub fn from_yaml(raw: &str) -> Result<Self> {
        let config: DockConfig = serde_yaml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.discovery_interval_secs == 0 {
            return Err(Error::Configuration(
                "discovery_interval_secs must be positive".into(),
            ));
        }
        if self.api_endpoint.rsplit_once(':').is_none() {
            return Err(Error::Configuration(format!(
                "api_endpoint {} is not host:port",
                self.api_endpoint
            )));
        }
        let mut seen = std::collections::HashSet::new();
        for backend in &self.backends {
            if !seen.insert(backend.name.as_str()) {
                return Err(Error::Configuration(format!(
                    "backend {} is configured twice",
                    backend.name
                )));
            }
        }
        Ok(())
    }

    pub fn backend(&self, name: &str) -> Option<&BackendProperties> {
        self.backends.iter().find(|b| b.name == name)
    }

    /// Enabled backends in configured order; unknown names are skipped
    pub fn enabled(&self) -> Vec<&BackendProperties> {
        self.enabled_backends
            .iter()
            .filter_map(|name| {
                let backend = self.backend(name).filter(|b| !b.name.is_empty());
                if backend.is_none() {
                    warn!("Enabled backend {} is not configured, skipping", name);
                }
                backend
            })
            .collect()
    }

    pub fn supports_array_replication(&self, backend_name: &str) -> bool {
        self.backend(backend_name)
            .map_or(false, |b| b.support_replication)
    }

    pub fn discovery_interval(&self) -> Duration {
        Duration::from_secs(self.discovery_interval_secs)
    }

    /// Host part of `api_endpoint`
    pub fn endpoint_ip(&self) -> &str {
        self.api_endpoint
            .rsplit_once(':')
            .map_or(self.api_endpoint.as_str(), |(host, _)| host)
    }

    /// Configured host name, else the one the system reports
    pub fn hostname(&self) -> String {
        if !self.local_host.hostname.is_empty() {
            return self.local_host.hostname.clone();
        }
        std::env::var("HOSTNAME")
            .ok()
            .filter(|h| !h.is_empty())
            .or_else(|| {
                std::fs::read_to_string("/etc/hostname")
                    .ok()
                    .map(|h| h.trim().to_string())
                    .filter(|h| !h.is_empty())
            })
            .unwrap_or_else(|| "localhost".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use std::io::Write;

    const SAMPLE: &str = r#"
api_endpoint: 192.168.0.5:50050
enabled_backends: [oceanstor-1, sample, missing]
backends:
  - name: oceanstor-1
    description: Primary array
    driver_name: huawei_oceanstor_block
    config_path: /etc/opensds/driver/oceanstor-1.yaml
    support_replication: true
  - name: sample
    driver_name: sample
host_based_replication_driver: drbd
local_host:
  hostname: compute-1
  iscsi_initiator: iqn.1993-08.org.debian:01:compute1
  wwpns: ["21000024ff000001"]
"#;

    #[test]
    fn test_parse_dock_config() {
        let config = DockConfig::from_yaml(SAMPLE).unwrap();

        let enabled: Vec<_> = config.enabled().iter().map(|b| b.name.clone()).collect();
        assert_eq!(enabled, vec!["oceanstor-1", "sample"]);
        assert!(config.supports_array_replication("oceanstor-1"));
        assert!(!config.supports_array_replication("sample"));
        assert_eq!(config.discovery_interval(), Duration::from_secs(60));
        assert_eq!(config.endpoint_ip(), "192.168.0.5");
        assert_eq!(config.hostname(), "compute-1");
    }

    #[test]
    fn test_duplicate_backend_rejected() {
        let raw = SAMPLE.replace("- name: sample", "- name: oceanstor-1");
        assert_matches!(DockConfig::from_yaml(&raw), Err(Error::Configuration(_)));
    }

    #[test]
    fn test_zero_interval_rejected() {
        let raw = format!("{}\ndiscovery_interval_secs: 0\n", SAMPLE);
        assert_matches!(DockConfig::from_yaml(&raw), Err(Error::Configuration(_)));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();

        let config = DockConfig::load(file.path()).unwrap();
        assert_eq!(config.backends.len(), 2);
        assert_eq!(config.host_based_replication_driver, "drbd");
    }
}
