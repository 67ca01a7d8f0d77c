//! OceanStor array replication
//!
//! Remote replication pairs are not driven yet; every pair operation reports
//! `NotImplemented` so callers can tell it apart from a backend failure.

use crate::domain::model::Replication;
use crate::domain::ports::{CreateReplicationOpts, ReplicationDriver, ReplicationOpts};
use crate::error::{Error, Result};
use async_trait::async_trait;
use tracing::debug;

#[derive(Debug, Default)]
pub struct OceanStorReplicationDriver;

#[async_trait]
impl ReplicationDriver for OceanStorReplicationDriver {
    async fn setup(&mut self, config_path: &str) -> Result<()> {
        debug!("OceanStor replication driver setup, config = {:?}", config_path);
        Ok(())
    }

    async fn unset(&self) -> Result<()> {
        Ok(())
    }

    async fn create_replication(&self, _opts: &CreateReplicationOpts) -> Result<Replication> {
        Err(Error::not_implemented("CreateReplication"))
    }

    async fn delete_replication(&self, _opts: &ReplicationOpts) -> Result<()> {
        Err(Error::not_implemented("DeleteReplication"))
    }

    async fn enable_replication(&self, _opts: &ReplicationOpts) -> Result<()> {
        Err(Error::not_implemented("EnableReplication"))
    }

    async fn disable_replication(&self, _opts: &ReplicationOpts) -> Result<()> {
        Err(Error::not_implemented("DisableReplication"))
    }

    async fn failover_replication(&self, _opts: &ReplicationOpts) -> Result<()> {
        Err(Error::not_implemented("FailoverReplication"))
    }
}
