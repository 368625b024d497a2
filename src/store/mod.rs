//! Key-value store clients
//!
//! Actions talk to the store only through [`StoreClient`]. The framed client is the
//! network implementation used by the CLI host.

mod framed;

pub use framed::FramedStoreClient;

use anyhow::Result;
use async_trait::async_trait;
use ccaction_shared::{Batch, PublishRequest, Query};
use futures::stream::BoxStream;
use serde::Deserialize;
use std::path::PathBuf;

/// Response stream of a `get`, one batch of notifications at a time
pub type BatchStream = BoxStream<'static, Result<Batch>>;

#[async_trait]
pub trait StoreClient: Send + Sync {
    /// Read the given queries; notifications arrive in store order
    async fn get(&self, queries: Vec<Query>) -> Result<BatchStream>;

    /// Write notifications, returning once the store has accepted them
    async fn publish(&self, request: PublishRequest) -> Result<()>;

    /// Release the connection; the client is not used afterwards
    async fn close(&self) -> Result<()> {
        Ok(())
    }
}

/// Where and how to reach a store
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct StoreTarget {
    /// `host:port`
    pub address: String,
    /// File holding the bearer token sent with every request
    #[serde(default)]
    pub token_file: Option<PathBuf>,
    /// PEM certificate to trust; plaintext TCP when absent
    #[serde(default)]
    pub ca_file: Option<PathBuf>,
}

impl StoreTarget {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            token_file: None,
            ca_file: None,
        }
    }

    pub fn with_token_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.token_file = Some(path.into());
        self
    }

    pub fn with_ca_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.ca_file = Some(path.into());
        self
    }
}
