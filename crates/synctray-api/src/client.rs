// REST client for the daemon API
//
// Wraps `reqwest::Client` with the daemon's auth headers, status mapping
// and timeout classification. The inner client lives behind an
// `ArcSwap` so certificate pinning can be changed while requests using
// the previous client are still in flight.

use std::sync::Arc;

use arc_swap::ArcSwap;
use async_trait::async_trait;
use bytes::Bytes;
use secrecy::ExposeSecret;
use tracing::{debug, trace};

use crate::endpoint::{ApiRequest, Method};
use crate::error::Error;
use crate::tls::PinnedCertificate;
use crate::transport::{Transport, TransportConfig};

const API_KEY_HEADER: &str = "X-API-Key";
const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// HTTP client for the daemon's REST API.
pub struct RestClient {
    http: ArcSwap<reqwest::Client>,
    config: TransportConfig,
}

impl RestClient {
    /// Create a client from a `TransportConfig`.
    pub fn new(config: TransportConfig) -> Result<Self, Error> {
        let http = config.build_client()?;
        Ok(Self {
            http: ArcSwap::from_pointee(http),
            config,
        })
    }

    /// Create a client around a pre-built `reqwest::Client`.
    pub fn with_client(http: reqwest::Client) -> Self {
        Self {
            http: ArcSwap::from_pointee(http),
            config: TransportConfig::default(),
        }
    }

    /// Send a request and return the body bytes on a 2xx response.
    pub async fn send(&self, request: &ApiRequest) -> Result<Bytes, Error> {
        let method = request.method();
        debug!("{} {}", method, request.url);

        let http = self.http.load_full();
        let mut builder = match method {
            Method::Get => http.get(request.url.clone()),
            Method::Post => http.post(request.url.clone()),
        };

        builder = builder
            .header(API_KEY_HEADER, request.api_key.expose_secret())
            .header(reqwest::header::CONTENT_TYPE, FORM_CONTENT_TYPE);

        if let Some(ref auth) = request.credentials {
            builder = builder.basic_auth(&auth.user, Some(auth.password.expose_secret()));
        }

        let timeout = request.timeout.unwrap_or(self.config.timeout);
        builder = builder.timeout(timeout);

        let resp = builder
            .send()
            .await
            .map_err(|e| classify_transport(e, timeout))?;

        let status = resp.status();
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN
        {
            return Err(Error::Unauthorized {
                status: status.as_u16(),
            });
        }

        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            let message = body.trim();
            return Err(Error::Http {
                status: status.as_u16(),
                message: message.chars().take(200).collect(),
            });
        }

        let body = resp
            .bytes()
            .await
            .map_err(|e| classify_transport(e, timeout))?;
        trace!(bytes = body.len(), endpoint = %request.endpoint, "response received");
        Ok(body)
    }

    /// Rebuild the inner client with a different pinned certificate.
    pub fn set_pinned(&self, pinned: Option<PinnedCertificate>) -> Result<(), Error> {
        let config = self.config.clone().with_pinned(pinned);
        let http = config.build_client()?;
        self.http.store(Arc::new(http));
        Ok(())
    }
}

fn classify_transport(err: reqwest::Error, timeout: std::time::Duration) -> Error {
    if err.is_timeout() {
        Error::Timeout {
            timeout_secs: timeout.as_secs(),
        }
    } else {
        Error::Transport(err)
    }
}

#[async_trait]
impl Transport for RestClient {
    async fn execute(&self, request: ApiRequest) -> Result<Bytes, Error> {
        self.send(&request).await
    }

    fn pin_certificate(&self, pinned: Option<PinnedCertificate>) -> Result<(), Error> {
        self.set_pinned(pinned)
    }
}
