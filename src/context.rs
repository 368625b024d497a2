//! Execution context handed to every action
//!
//! The host builds one context per invocation and passes it by reference. It is the
//! only way an action reaches its arguments, the operator log, the device and the
//! store.

use crate::device::CommandResponse;
use crate::error::UserWarning;
use crate::store::{StoreClient, StoreTarget};
use anyhow::Result;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Immutable string arguments for one invocation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArgBag {
    values: BTreeMap<String, String>,
}

impl ArgBag {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    /// Look up an argument the action cannot run without
    pub fn require(&self, key: &str) -> Result<&str, UserWarning> {
        self.get(key).ok_or_else(|| UserWarning::missing_argument(key))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for ArgBag {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            values: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

/// Parse a `KEY=VALUE` pair; the value may itself contain `=`
pub fn parse_arg_pair(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(format!("expected KEY=VALUE, got '{}'", raw)),
    }
}

/// Capabilities the host provides to an action
#[async_trait]
pub trait ExecutionContext: Send + Sync {
    /// Arguments for this invocation
    fn args(&self) -> &ArgBag;

    /// Write a line to the operator-visible action log
    fn alog(&self, message: &str);

    /// Run an ordered batch of commands on the target device
    ///
    /// Each command only runs if the ones before it succeeded; one response comes
    /// back per command, in order.
    async fn run_device_cmds(&self, cmds: &[String]) -> Result<Vec<CommandResponse>>;

    /// Pre-authenticated client for the local store
    fn cv_client(&self) -> Result<Arc<dyn StoreClient>>;

    /// Build a client for another store
    async fn connect_store(&self, target: &StoreTarget) -> Result<Arc<dyn StoreClient>>;
}
