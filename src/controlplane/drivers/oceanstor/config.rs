//! OceanStor backend configuration
//!
//! Loaded from the per-backend YAML file named by the dock configuration.

use crate::allocation::LunIdRange;
use crate::domain::model::{PoolExtras, ProvisioningPolicy};
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

/// Used when the dock configuration names no file for this backend
pub const DEFAULT_CONFIG_PATH: &str = "/etc/opensds/driver/huawei_oceanstor_block.yaml";

/// Device-manager credentials and endpoints
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct AuthOptions {
    /// Comma separated list of device-manager URLs, tried in order
    pub endpoints: String,
    pub username: String,
    #[serde(default)]
    pub password: String,
    /// Skip TLS certificate verification
    #[serde(default = "default_insecure")]
    pub insecure: bool,
}

fn default_insecure() -> bool {
    true
}

impl AuthOptions {
    pub fn endpoint_list(&self) -> Vec<String> {
        self.endpoints
            .split(',')
            .map(str::trim)
            .filter(|e| !e.is_empty())
            .map(|e| e.trim_end_matches('/').to_string())
            .collect()
    }
}

/// Static properties of one configured pool
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct PoolProperties {
    #[serde(default)]
    pub storage_type: String,
    #[serde(default)]
    pub availability_zone: String,
    #[serde(default)]
    pub multi_attach: bool,
    #[serde(default)]
    pub extras: PoolExtras,
}

/// Configuration of one OceanStor array
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct OceanStorConfig {
    pub auth_options: AuthOptions,
    /// Pools exposed by this dock, keyed by array pool name
    #[serde(default)]
    pub pool: BTreeMap<String, PoolProperties>,
    /// Address of the iSCSI target portal handed to hosts
    #[serde(default)]
    pub target_ip: String,
    #[serde(default)]
    pub lun_id_range_min: i64,
    /// Zero leaves LUN id selection to the array
    #[serde(default)]
    pub lun_id_range_max: i64,
    #[serde(default = "default_lun_ready_wait_interval")]
    pub lun_ready_wait_interval_secs: u64,
    #[serde(default = "default_lun_ready_wait_timeout")]
    pub lun_ready_wait_timeout_secs: u64,
    #[serde(default = "default_lun_copy_wait_interval")]
    pub lun_copy_wait_interval_secs: u64,
    #[serde(default = "default_lun_copy_wait_timeout")]
    pub lun_copy_wait_timeout_secs: u64,
}

fn default_lun_ready_wait_interval() -> u64 {
    5
}

fn default_lun_ready_wait_timeout() -> u64 {
    600
}

fn default_lun_copy_wait_interval() -> u64 {
    5
}

fn default_lun_copy_wait_timeout() -> u64 {
    3600
}

impl OceanStorConfig {
    /// Read and validate a YAML configuration file
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
        let config: OceanStorConfig = serde_yaml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.auth_options.endpoint_list().is_empty() {
            return Err(Error::Configuration(
                "auth_options.endpoints must name at least one endpoint".into(),
            ));
        }
        self.lun_id_range()?;
        Ok(())
    }

    /// Configured LUN id range; `None` when ids are not limited
    pub fn lun_id_range(&self) -> Result<Option<LunIdRange>> {
        LunIdRange::from_config(self.lun_id_range_min, self.lun_id_range_max)
    }

    /// Provisioning policy of a pool, `Thick` unless configured
    pub fn provisioning_policy(&self, pool_name: &str) -> Result<ProvisioningPolicy> {
        self.pool
            .get(pool_name)
            .and_then(|p| p.extras.data_storage.provisioning_policy.as_deref())
            .unwrap_or_default()
            .parse()
    }

    pub fn lun_ready_wait_interval(&self) -> Duration {
        Duration::from_secs(self.lun_ready_wait_interval_secs)
    }

    pub fn lun_ready_wait_timeout(&self) -> Duration {
        Duration::from_secs(self.lun_ready_wait_timeout_secs)
    }

    pub fn lun_copy_wait_interval(&self) -> Duration {
        Duration::from_secs(self.lun_copy_wait_interval_secs)
    }

    pub fn lun_copy_wait_timeout(&self) -> Duration {
        Duration::from_secs(self.lun_copy_wait_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::AccessProtocol;
    use assert_matches::assert_matches;
    use std::io::Write;

    const SAMPLE: &str = r#"
auth_options:
  endpoints: "https://10.0.0.10:8088/deviceManager/rest, https://10.0.0.11:8088/deviceManager/rest"
  username: admin
  password: secret
  insecure: true
pool:
  StoragePool001:
    storage_type: block
    availability_zone: az-1
    multi_attach: true
    extras:
      dataStorage:
        provisioningPolicy: Thin
      ioConnectivity:
        accessProtocol: fibre_channel
  StoragePool002:
    storage_type: block
target_ip: 192.168.1.10
lun_id_range_min: 100
lun_id_range_max: 200
"#;

    #[test]
    fn test_parse_config() {
        let config = OceanStorConfig::from_yaml(SAMPLE).unwrap();

        assert_eq!(config.auth_options.endpoint_list().len(), 2);
        assert_eq!(config.pool.len(), 2);
        assert_eq!(
            config.provisioning_policy("StoragePool001").unwrap(),
            ProvisioningPolicy::Thin
        );
        assert_eq!(
            config.provisioning_policy("StoragePool002").unwrap(),
            ProvisioningPolicy::Thick
        );
        assert_eq!(
            config.pool["StoragePool001"].extras.io_connectivity.access_protocol,
            Some(AccessProtocol::FibreChannel)
        );
        assert_eq!(
            config.lun_id_range().unwrap(),
            Some(LunIdRange { min: 100, max: 200 })
        );
        assert_eq!(config.lun_ready_wait_timeout(), Duration::from_secs(600));
        assert_eq!(config.lun_copy_wait_timeout(), Duration::from_secs(3600));
    }

    #[test]
    fn test_invalid_range_rejected() {
        let raw = SAMPLE.replace("lun_id_range_min: 100", "lun_id_range_min: 300");
        assert_matches!(OceanStorConfig::from_yaml(&raw), Err(Error::Configuration(_)));

        let raw = SAMPLE.replace("lun_id_range_min: 100", "lun_id_range_min: -1");
        assert_matches!(OceanStorConfig::from_yaml(&raw), Err(Error::Configuration(_)));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();

        let config = OceanStorConfig::load(file.path()).unwrap();
        assert_eq!(config.target_ip, "192.168.1.10");

        assert_matches!(
            OceanStorConfig::load("/nonexistent/oceanstor.yaml"),
            Err(Error::Configuration(_))
        );
    }
}
