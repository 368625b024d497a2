//! TLS transport and server certificate retrieval

use crate::transport::traits::{TransportConnector, TransportStream};
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use base64::Engine;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio_native_tls::native_tls;
use tokio_native_tls::TlsStream;

const PEM_LINE_WIDTH: usize = 64;

#[async_trait]
impl TransportStream for TlsStream<TcpStream> {
    async fn shutdown(&mut self) -> Result<()> {
        AsyncWriteExt::shutdown(self).await?;
        Ok(())
    }
}

/// Connects over TLS, trusting only the given CA certificate
pub struct TlsConnector {
    address: String,
    domain: String,
    ca_pem: Vec<u8>,
}

impl TlsConnector {
    /// `address` is `host:port`; the host part is used for SNI and name checks
    pub fn new(address: impl Into<String>, ca_pem: Vec<u8>) -> Self {
        let address = address.into();
        let domain = host_of(&address).to_string();
        Self {
            address,
            domain,
            ca_pem,
        }
    }
}

#[async_trait]
impl TransportConnector for TlsConnector {
    type Stream = TlsStream<TcpStream>;

    async fn connect(&self) -> Result<Self::Stream> {
        let ca = native_tls::Certificate::from_pem(&self.ca_pem).context("parsing CA certificate")?;
        let connector = native_tls::TlsConnector::builder()
            .add_root_certificate(ca)
            .disable_built_in_roots(true)
            .build()?;
        let connector = tokio_native_tls::TlsConnector::from(connector);

        let tcp = TcpStream::connect(&self.address)
            .await
            .with_context(|| format!("connecting to {}", self.address))?;
        connector
            .connect(&self.domain, tcp)
            .await
            .with_context(|| format!("TLS handshake with {}", self.address))
    }

    fn name(&self) -> &'static str {
        "tls"
    }
}

/// Host part of a `host:port` string
pub fn host_of(address: &str) -> &str {
    address.split(':').next().unwrap_or(address)
}

/// Fetch the certificate a server presents, without validating it, as PEM text
pub async fn fetch_peer_certificate(host: &str, port: u16) -> Result<String> {
    let connector = native_tls::TlsConnector::builder()
        .danger_accept_invalid_certs(true)
        .danger_accept_invalid_hostnames(true)
        .build()?;
    let connector = tokio_native_tls::TlsConnector::from(connector);

    let tcp = TcpStream::connect((host, port))
        .await
        .with_context(|| format!("connecting to {}:{}", host, port))?;
    let tls = connector
        .connect(host, tcp)
        .await
        .with_context(|| format!("TLS handshake with {}:{}", host, port))?;

    let cert = tls
        .get_ref()
        .peer_certificate()?
        .ok_or_else(|| anyhow!("{}:{} presented no certificate", host, port))?;
    Ok(pem_encode_certificate(&cert.to_der()?))
}

/// Wrap a DER certificate in PEM armor with 64-column base64 lines
pub fn pem_encode_certificate(der: &[u8]) -> String {
    let encoded = base64::engine::general_purpose::STANDARD.encode(der);
    let mut pem = String::from("-----BEGIN CERTIFICATE-----\n");
    for line in encoded.as_bytes().chunks(PEM_LINE_WIDTH) {
        // base64 output is ASCII
        pem.push_str(&String::from_utf8_lossy(line));
        pem.push('\n');
    }
    pem.push_str("-----END CERTIFICATE-----\n");
    pem
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pem_wraps_at_64_columns() {
        let der = vec![0xABu8; 100];
        let pem = pem_encode_certificate(&der);
        let lines: Vec<&str> = pem.lines().collect();

        assert_eq!(lines.first(), Some(&"-----BEGIN CERTIFICATE-----"));
        assert_eq!(lines.last(), Some(&"-----END CERTIFICATE-----"));
        // 100 bytes -> 136 base64 chars -> 64 + 64 + 8
        assert_eq!(lines[1].len(), 64);
        assert_eq!(lines[2].len(), 64);
        assert_eq!(lines[3].len(), 8);
        assert!(pem.ends_with('\n'));
    }

    #[test]
    fn test_host_of() {
        assert_eq!(host_of("cvp.example.com:443"), "cvp.example.com");
        assert_eq!(host_of("cvp.example.com"), "cvp.example.com");
    }

    #[test]
    fn test_tls_connector_uses_host_for_sni() {
        let connector = TlsConnector::new("cvp.example.com:8443", Vec::new());
        assert_eq!(connector.domain, "cvp.example.com");
        assert_eq!(connector.name(), "tls");
    }
}
