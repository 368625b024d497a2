//! Host configuration
//!
//! Defaults match what the actions expect on a change-control host; a TOML file can
//! override any of them and command-line flags override the file.

use crate::store::StoreTarget;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Configuration for the CLI host
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct HostConfig {
    /// Device the image preload runs against
    pub device: Option<DeviceConfig>,
    /// Local store, used as the sync source
    pub source_store: Option<StoreTarget>,
    pub sync: SyncSettings,
}

impl HostConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        toml::from_str(&raw).with_context(|| format!("parsing config {}", path.display()))
    }
}

/// eAPI endpoint of a device
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DeviceConfig {
    /// `host` or `host:port` of the management interface
    pub address: String,
    pub username: String,
    #[serde(default)]
    pub password: String,
    /// Validate the device certificate; management certificates are usually self-signed
    #[serde(default)]
    pub verify_tls: bool,
    #[serde(default = "default_device_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_device_timeout_secs() -> u64 {
    // image copies over slow links take a while
    600
}

impl DeviceConfig {
    pub fn new(
        address: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            address: address.into(),
            username: username.into(),
            password: password.into(),
            verify_tls: false,
            timeout_secs: default_device_timeout_secs(),
        }
    }
}

/// Where the template sync keeps its files and how it logs in
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SyncSettings {
    /// Directory for the token, certificate and backup files
    pub work_dir: PathBuf,
    /// Port the destination serves its certificate on
    pub cert_port: u16,
    pub login_timeout_secs: u64,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            work_dir: PathBuf::from("/tmp"),
            cert_port: 8443,
            login_timeout_secs: 10,
        }
    }
}

impl SyncSettings {
    pub fn token_path(&self) -> PathBuf {
        self.work_dir.join("token.txt")
    }

    pub fn cert_path(&self) -> PathBuf {
        self.work_dir.join("cert.crt")
    }

    pub fn backup_path(&self, role: &str) -> PathBuf {
        self.work_dir.join(format!("backup{}.json", role))
    }

    pub fn login_timeout(&self) -> Duration {
        Duration::from_secs(self.login_timeout_secs)
    }
}
