// synctray-api: Async Rust client for the Syncthing REST API

pub mod client;
pub mod endpoint;
pub mod error;
pub mod models;
pub mod tls;
pub mod transport;

pub use client::RestClient;
pub use endpoint::{ApiRequest, BasicAuth, DaemonTarget, Endpoint, Method};
pub use error::{Error, ErrorKind};
pub use tls::{PinnedCertificate, TlsErrorKind};
pub use transport::{Transport, TransportConfig};
