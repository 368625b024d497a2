//! Device command execution
//!
//! A [`DeviceChannel`] runs an ordered batch of CLI commands on one device and
//! returns one [`CommandResponse`] per command.

mod eapi;

pub use eapi::EapiChannel;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// Outcome of one command in a batch
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CommandResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<JsonValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CommandResponse {
    pub fn ok(response: JsonValue) -> Self {
        Self {
            response: Some(response),
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            response: None,
            error: Some(error.into()),
        }
    }

    /// The error text, if there is a non-empty one
    pub fn error_text(&self) -> Option<&str> {
        self.error.as_deref().filter(|e| !e.is_empty())
    }
}

/// First non-empty error in a batch; later commands depend on earlier ones
pub fn first_error(responses: &[CommandResponse]) -> Option<&str> {
    responses.iter().find_map(CommandResponse::error_text)
}

/// Runs command batches on a device with fail-stop semantics
#[async_trait]
pub trait DeviceChannel: Send + Sync {
    async fn run_cmds(&self, cmds: &[String]) -> Result<Vec<CommandResponse>>;

    /// Human-readable name for this channel
    fn name(&self) -> &'static str;
}
