// Transport seam and shared reqwest client construction.
//
// The connection engine only sees the `Transport` trait: "send this
// request, give me the body bytes". `RestClient` is the real
// implementation; tests substitute a scripted one.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;

use crate::endpoint::ApiRequest;
use crate::error::Error;
use crate::tls::PinnedCertificate;

const USER_AGENT: &str = concat!("synctray/", env!("CARGO_PKG_VERSION"));

/// Performs authenticated requests against the daemon.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send the request and return the raw response body.
    ///
    /// Cancellation is done by dropping the returned future.
    async fn execute(&self, request: ApiRequest) -> Result<Bytes, Error>;

    /// Replace the set of tolerated TLS validation failures.
    ///
    /// `None` restores standard verification.
    fn pin_certificate(&self, pinned: Option<PinnedCertificate>) -> Result<(), Error>;
}

/// Shared transport configuration for building HTTP clients.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    pub timeout: Duration,
    pub pinned: Option<PinnedCertificate>,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            pinned: None,
        }
    }
}

impl TransportConfig {
    /// Build a `reqwest::Client` from this config.
    pub fn build_client(&self) -> Result<reqwest::Client, Error> {
        let mut builder = reqwest::Client::builder()
            .timeout(self.timeout)
            .user_agent(USER_AGENT);

        if let Some(ref pinned) = self.pinned {
            builder = builder.use_preconfigured_tls(pinned.client_config()?);
        }

        builder
            .build()
            .map_err(|e| Error::Tls(format!("failed to build HTTP client: {e}")))
    }

    pub fn with_pinned(mut self, pinned: Option<PinnedCertificate>) -> Self {
        self.pinned = pinned;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_client_builds() {
        let config = TransportConfig::default();
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert!(config.build_client().is_ok());
    }
}
