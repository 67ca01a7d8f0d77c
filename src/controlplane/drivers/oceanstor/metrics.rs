//! OceanStor capacity metrics
//!
//! Opens its own array session, independent of the block driver serving the
//! dock, and reports total, free and used capacity of the configured pools.

use super::config::{OceanStorConfig, DEFAULT_CONFIG_PATH};
use super::provision::VolumeProvisioner;
use super::{rest_session, SessionFactory};
use crate::controlplane::drivers::pool_capacity_metrics;
use crate::domain::model::Metric;
use crate::domain::ports::MetricDriver;
use crate::error::{Error, Result};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, warn};

pub struct OceanStorMetricDriver {
    open_session: SessionFactory,
    pools: Option<VolumeProvisioner>,
}

impl Default for OceanStorMetricDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl OceanStorMetricDriver {
    pub fn new() -> Self {
        Self::with_session_factory(Box::new(rest_session))
    }

    pub fn with_session_factory(open_session: SessionFactory) -> Self {
        Self {
            open_session,
            pools: None,
        }
    }
}

#[async_trait]
impl MetricDriver for OceanStorMetricDriver {
    async fn setup(&mut self, config_path: &str) -> Result<()> {
        let path = if config_path.is_empty() {
            DEFAULT_CONFIG_PATH
        } else {
            config_path
        };
        let config = OceanStorConfig::load(path)?;
        config.validate()?;
        let session = (self.open_session)(&config)?;
        session.login().await?;

        self.pools = Some(VolumeProvisioner::new(session, Arc::new(config), None));
        debug!("OceanStor metric driver ready, config = {}", path);
        Ok(())
    }

    async fn teardown(&self) -> Result<()> {
        match &self.pools {
            Some(pools) => pools.session().logout().await,
            None => {
                warn!("Teardown called on an OceanStor metric driver that was never set up");
                Ok(())
            }
        }
    }

    async fn collect_metrics(&self) -> Result<Vec<Metric>> {
        let pools = self
            .pools
            .as_ref()
            .ok_or_else(|| Error::Internal("oceanstor metric driver used before setup".into()))?
            .list_pools()
            .await?;
        Ok(pool_capacity_metrics(&pools))
    }
}
