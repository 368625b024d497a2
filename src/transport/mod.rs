//! Byte transports used by the store client and the certificate fetch

pub mod tcp;
pub mod tls;
pub mod traits;

pub use tcp::TcpConnector;
pub use tls::{fetch_peer_certificate, TlsConnector};
pub use traits::{TransportConnector, TransportStream};
