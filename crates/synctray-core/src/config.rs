// ── Runtime connection settings ──
//
// These types describe *how* to reach a daemon. They carry credential data
// and polling cadence but never touch disk; synctray-config (or any other
// caller) builds a `ConnectionSettings` and hands it to the engine.

use std::path::PathBuf;
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use url::Url;

use synctray_api::{BasicAuth, DaemonTarget};

use crate::error::CoreError;

/// Settings for one daemon connection.
#[derive(Debug, Clone)]
pub struct ConnectionSettings {
    /// Daemon GUI/REST address, e.g. `http://127.0.0.1:8384`.
    pub url: Option<Url>,
    /// API key sent as `X-API-Key`.
    pub api_key: SecretString,
    /// Basic-auth credentials, when GUI authentication is enabled.
    pub credentials: Option<BasicAuth>,
    /// Explicit path of the daemon's HTTPS certificate. When unset, the
    /// certificate is looked up in the daemon's config directory.
    pub https_cert: Option<PathBuf>,
    /// Connections/traffic poll cadence.
    pub traffic_poll_interval: Duration,
    /// Directory statistics poll cadence.
    pub dir_stats_poll_interval: Duration,
    /// Device statistics poll cadence.
    pub dev_stats_poll_interval: Duration,
    /// Daemon error poll cadence.
    pub errors_poll_interval: Duration,
    /// Auto-reconnect delay. Zero disables auto-reconnect.
    pub reconnect_interval: Duration,
    /// Client-side timeout for ordinary requests.
    pub request_timeout: Duration,
    /// Client-side timeout for the events long poll. Expiry means
    /// "no news", not failure.
    pub events_timeout: Duration,
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            url: None,
            api_key: SecretString::from(String::new()),
            credentials: None,
            https_cert: None,
            traffic_poll_interval: Duration::from_millis(2000),
            dir_stats_poll_interval: Duration::from_millis(60_000),
            dev_stats_poll_interval: Duration::from_millis(60_000),
            errors_poll_interval: Duration::from_millis(30_000),
            reconnect_interval: Duration::ZERO,
            request_timeout: Duration::from_secs(30),
            events_timeout: Duration::from_secs(75),
        }
    }
}

impl ConnectionSettings {
    pub fn new(url: Url, api_key: SecretString) -> Self {
        Self {
            url: Some(url),
            api_key,
            ..Self::default()
        }
    }

    /// Validate that both URL and API key are present and build the
    /// request target.
    pub fn target(&self) -> Result<DaemonTarget, CoreError> {
        let url = self
            .url
            .clone()
            .ok_or(CoreError::ConfigInsufficient { missing: "URL" })?;
        if self.api_key.expose_secret().is_empty() {
            return Err(CoreError::ConfigInsufficient { missing: "API key" });
        }
        Ok(DaemonTarget::new(url, self.api_key.clone()).with_credentials(self.credentials.clone()))
    }

    /// Whether switching from `self` to `next` needs a full reconnect.
    ///
    /// Poll intervals and timeouts apply on the fly; the address, the
    /// credentials and the certificate do not.
    pub fn requires_reconnect(&self, next: &Self) -> bool {
        self.url != next.url
            || self.api_key.expose_secret() != next.api_key.expose_secret()
            || !same_credentials(self.credentials.as_ref(), next.credentials.as_ref())
            || self.https_cert != next.https_cert
    }
}

fn same_credentials(a: Option<&BasicAuth>, b: Option<&BasicAuth>) -> bool {
    match (a, b) {
        (None, None) => true,
        (Some(a), Some(b)) => {
            a.user == b.user && a.password.expose_secret() == b.password.expose_secret()
        }
        _ => false,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn settings() -> ConnectionSettings {
        ConnectionSettings::new(
            Url::parse("http://127.0.0.1:8384").unwrap(),
            SecretString::from("key"),
        )
    }

    #[test]
    fn empty_api_key_is_insufficient() {
        let mut s = settings();
        s.api_key = SecretString::from(String::new());
        assert!(matches!(
            s.target(),
            Err(CoreError::ConfigInsufficient { missing: "API key" })
        ));
    }

    #[test]
    fn missing_url_is_insufficient() {
        let s = ConnectionSettings::default();
        assert!(matches!(
            s.target(),
            Err(CoreError::ConfigInsufficient { missing: "URL" })
        ));
    }

    #[test]
    fn interval_change_does_not_require_reconnect() {
        let a = settings();
        let mut b = settings();
        b.traffic_poll_interval = Duration::from_secs(10);
        b.reconnect_interval = Duration::from_secs(5);
        assert!(!a.requires_reconnect(&b));
    }

    #[test]
    fn credential_change_requires_reconnect() {
        let a = settings();
        let mut b = settings();
        b.credentials = Some(BasicAuth {
            user: "admin".into(),
            password: SecretString::from("pw"),
        });
        assert!(a.requires_reconnect(&b));

        let mut c = settings();
        c.api_key = SecretString::from("other");
        assert!(a.requires_reconnect(&c));
    }
}
