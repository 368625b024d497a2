//! Command-line host
//!
//! Provides the execution context when an action is run from a shell instead of by
//! the change-control service: the action log goes to tracing, device commands go
//! over eAPI and store clients use the framed protocol.

use crate::config::DeviceConfig;
use crate::context::{ArgBag, ExecutionContext};
use crate::device::{CommandResponse, DeviceChannel, EapiChannel};
use crate::store::{FramedStoreClient, StoreClient, StoreTarget};
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info};

/// Log target of the operator-visible action log
pub const ALOG_TARGET: &str = "alog";

pub struct CliContext {
    args: ArgBag,
    device: Option<Box<dyn DeviceChannel>>,
    source_store: Option<Arc<dyn StoreClient>>,
}

impl CliContext {
    pub fn new(args: ArgBag) -> Self {
        Self {
            args,
            device: None,
            source_store: None,
        }
    }

    pub fn with_device(mut self, config: &DeviceConfig) -> Result<Self> {
        let channel = EapiChannel::new(config)?;
        info!("Device {} reachable over {}", config.address, channel.name());
        self.device = Some(Box::new(channel));
        Ok(self)
    }

    /// Connect to the local store up front so the action gets a ready client
    pub async fn with_source_store(mut self, target: &StoreTarget) -> Result<Self> {
        let client = FramedStoreClient::connect(target)
            .await
            .with_context(|| format!("connecting to local store {}", target.address))?;
        self.source_store = Some(Arc::new(client));
        Ok(self)
    }
}

#[async_trait]
impl ExecutionContext for CliContext {
    fn args(&self) -> &ArgBag {
        &self.args
    }

    fn alog(&self, message: &str) {
        info!(target: ALOG_TARGET, "{}", message);
    }

    async fn run_device_cmds(&self, cmds: &[String]) -> Result<Vec<CommandResponse>> {
        let device = self
            .device
            .as_ref()
            .ok_or_else(|| anyhow!("no device configured; pass --device or set [device]"))?;
        debug!("Running {} commands over {}", cmds.len(), device.name());
        device.run_cmds(cmds).await
    }

    fn cv_client(&self) -> Result<Arc<dyn StoreClient>> {
        self.source_store
            .clone()
            .ok_or_else(|| anyhow!("no local store; pass --source or set [source_store]"))
    }

    async fn connect_store(&self, target: &StoreTarget) -> Result<Arc<dyn StoreClient>> {
        let client = FramedStoreClient::connect(target).await?;
        Ok(Arc::new(client))
    }
}
