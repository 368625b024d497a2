//! Login to the destination server

use crate::config::SyncSettings;
use crate::error::UserWarning;
use crate::transport::fetch_peer_certificate;
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use serde::Serialize;
use serde_json::Value as JsonValue;
use std::time::Duration;
use tracing::debug;

pub const LOGIN_PATH: &str = "/web/login/authenticate.do";
pub const BAD_CREDENTIALS: &str = "The provided credentials are incorrect.";

/// What a successful login yields
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    /// Session id, used as the store bearer token
    pub token: String,
    /// PEM certificate the server presents, used as the store trust anchor
    pub certificate: String,
}

#[async_trait]
pub trait Authenticator: Send + Sync {
    async fn login(&self, host: &str, username: &str, password: &str) -> Result<Credentials>;
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct LoginRequest<'a> {
    user_id: &'a str,
    password: &'a str,
}

/// Logs in over HTTPS and fetches the server certificate directly
///
/// Certificates are not validated on either connection; the certificate fetched here
/// is what later connections trust.
pub struct CvpAuthenticator {
    timeout: Duration,
    cert_port: u16,
}

impl CvpAuthenticator {
    pub fn new(settings: &SyncSettings) -> Self {
        Self {
            timeout: settings.login_timeout(),
            cert_port: settings.cert_port,
        }
    }

    /// The login POST for `host`
    pub fn login_request(
        &self,
        client: &reqwest::Client,
        host: &str,
        username: &str,
        password: &str,
    ) -> Result<reqwest::Request> {
        let url = format!("https://{}{}", host, LOGIN_PATH);
        let body = serde_json::to_string(&LoginRequest {
            user_id: username,
            password,
        })?;

        client
            .post(&url)
            .header(ACCEPT, "application/json")
            .header(CONTENT_TYPE, "application/json")
            .timeout(self.timeout)
            .body(body)
            .build()
            .with_context(|| format!("building login request for {}", url))
    }
}

#[async_trait]
impl Authenticator for CvpAuthenticator {
    async fn login(&self, host: &str, username: &str, password: &str) -> Result<Credentials> {
        let client = reqwest::Client::builder()
            .danger_accept_invalid_certs(true)
            .build()
            .context("building login HTTP client")?;

        let request = self.login_request(&client, host, username, password)?;
        let url = request.url().clone();
        debug!("Logging in to {} as {}", url, username);
        let reply: JsonValue = client
            .execute(request)
            .await
            .with_context(|| format!("sending login request to {}", url))?
            .json()
            .await
            .context("decoding login response")?;

        // no certificate is fetched for a rejected login
        let token = session_id(&reply)?;
        let certificate = fetch_peer_certificate(host, self.cert_port).await?;
        Ok(Credentials { token, certificate })
    }
}

/// Pull the session id out of a login response
///
/// A missing id means the credentials were refused. An id that is not a string is a
/// malformed reply and fatal.
pub fn session_id(reply: &JsonValue) -> Result<String> {
    match reply.get("sessionId") {
        Some(JsonValue::String(id)) => Ok(id.clone()),
        Some(other) => bail!("login reply carries a non-string sessionId: {}", other),
        None => Err(UserWarning::new(BAD_CREDENTIALS).into()),
    }
}
