//! eAPI device channel
//!
//! Sends the batch as one JSON-RPC `runCmds` call. The switch stops at the first
//! failing command and reports the results it did produce in `error.data`.

use super::{CommandResponse, DeviceChannel};
use crate::config::DeviceConfig;
use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use serde_json::{json, Value as JsonValue};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::debug;

/// Error text for commands skipped after an earlier failure
pub const NOT_EXECUTED: &str = "not executed";

pub struct EapiChannel {
    client: reqwest::Client,
    endpoint: String,
    username: String,
    password: String,
    next_id: AtomicU64,
}

impl EapiChannel {
    pub fn new(config: &DeviceConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .danger_accept_invalid_certs(!config.verify_tls)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("building eAPI HTTP client")?;

        Ok(Self {
            client,
            endpoint: format!("https://{}/command-api", config.address),
            username: config.username.clone(),
            password: config.password.clone(),
            next_id: AtomicU64::new(0),
        })
    }
}

#[async_trait]
impl DeviceChannel for EapiChannel {
    async fn run_cmds(&self, cmds: &[String]) -> Result<Vec<CommandResponse>> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        let body = json!({
            "jsonrpc": "2.0",
            "method": "runCmds",
            "params": { "version": 1, "cmds": cmds, "format": "json" },
            "id": id.to_string(),
        });

        debug!("eAPI runCmds id={} ({} commands) -> {}", id, cmds.len(), self.endpoint);

        let reply: JsonValue = self
            .client
            .post(&self.endpoint)
            .basic_auth(&self.username, Some(&self.password))
            .json(&body)
            .send()
            .await
            .with_context(|| format!("sending eAPI request to {}", self.endpoint))?
            .error_for_status()?
            .json()
            .await
            .context("decoding eAPI reply")?;

        responses_from_reply(cmds.len(), &reply)
    }

    fn name(&self) -> &'static str {
        "eapi"
    }
}

/// Map a JSON-RPC reply onto one response per submitted command
pub fn responses_from_reply(count: usize, reply: &JsonValue) -> Result<Vec<CommandResponse>> {
    if let Some(results) = reply.get("result").and_then(JsonValue::as_array) {
        return Ok(results.iter().cloned().map(CommandResponse::ok).collect());
    }

    let error = reply
        .get("error")
        .ok_or_else(|| anyhow!("eAPI reply has neither result nor error"))?;
    let message = error
        .get("message")
        .and_then(JsonValue::as_str)
        .unwrap_or("command failed")
        .to_string();
    let data = error
        .get("data")
        .and_then(JsonValue::as_array)
        .cloned()
        .unwrap_or_default();

    let mut failed = false;
    let mut responses = Vec::with_capacity(count);
    for i in 0..count {
        if failed {
            responses.push(CommandResponse::failed(NOT_EXECUTED));
            continue;
        }
        match data.get(i) {
            Some(entry) => match command_errors(entry) {
                Some(text) => {
                    failed = true;
                    responses.push(CommandResponse::failed(text));
                }
                None => responses.push(CommandResponse::ok(entry.clone())),
            },
            None => {
                failed = true;
                responses.push(CommandResponse::failed(message.clone()));
            }
        }
    }

    if !failed {
        bail!("eAPI reported an error but every command succeeded: {}", message);
    }
    Ok(responses)
}

fn command_errors(entry: &JsonValue) -> Option<String> {
    let errors: Vec<&str> = entry
        .get("errors")?
        .as_array()?
        .iter()
        .filter_map(JsonValue::as_str)
        .collect();
    if errors.is_empty() {
        None
    } else {
        Some(errors.join("; "))
    }
}
